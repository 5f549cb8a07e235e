use anyhow::{bail, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::workflows::TransitionPolicy;

/// Upper bound for lock and session timeouts: one year
pub const MAX_TIMEOUT_MINUTES: u64 = 365 * 24 * 60;
/// Upper bound for the overdue review threshold: one year
pub const MAX_OVERDUE_THRESHOLD_HOURS: u64 = 365 * 24;

// Out-of-range values saturate instead of panicking; `validate` rejects them first.
fn minutes(value: u64) -> chrono::Duration {
    i64::try_from(value)
        .ok()
        .and_then(chrono::Duration::try_minutes)
        .unwrap_or(chrono::Duration::MAX)
}

fn hours(value: u64) -> chrono::Duration {
    i64::try_from(value)
        .ok()
        .and_then(chrono::Duration::try_hours)
        .unwrap_or(chrono::Duration::MAX)
}

/// Main configuration structure for the workflow core
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct WorkflowConfig {
    /// Editing session and lock timeouts
    pub locking: LockingConfig,
    /// Reviewer delegation and reporting
    pub delegation: DelegationConfig,
    /// Transition engine guard
    pub workflow: TransitionConfig,
    /// Bulk operation behaviour
    pub bulk: BulkConfig,
    /// Logging settings
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct LockingConfig {
    /// Idle time after which a session expires; reset by activity
    pub idle_timeout_minutes: u64,
    /// Lifetime of a review lock, independent of activity
    pub hard_lock_timeout_minutes: u64,
    /// Period of the background cleanup sweep
    pub cleanup_interval_seconds: u64,
    /// Active sessions one user may hold across all products
    pub max_sessions_per_user: usize,
    /// Share of the idle timeout after which callers are told to renew
    pub renew_threshold_percent: u8,
}

impl Default for LockingConfig {
    fn default() -> Self {
        Self {
            idle_timeout_minutes: 30,
            hard_lock_timeout_minutes: 120,
            cleanup_interval_seconds: 300, // 5 minutes
            max_sessions_per_user: 5,
            renew_threshold_percent: 80,
        }
    }
}

impl LockingConfig {
    pub fn idle_timeout(&self) -> chrono::Duration {
        minutes(self.idle_timeout_minutes)
    }

    pub fn hard_lock_timeout(&self) -> chrono::Duration {
        minutes(self.hard_lock_timeout_minutes)
    }

    pub fn cleanup_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.cleanup_interval_seconds)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct DelegationConfig {
    /// Time in review after which a product is reported overdue
    pub overdue_review_threshold_hours: u64,
}

impl Default for DelegationConfig {
    fn default() -> Self {
        Self {
            overdue_review_threshold_hours: 72, // 3 days
        }
    }
}

impl DelegationConfig {
    pub fn overdue_review_threshold(&self) -> chrono::Duration {
        hours(self.overdue_review_threshold_hours)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct TransitionConfig {
    pub transition_policy: TransitionPolicy,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct BulkConfig {
    /// Write one summary audit entry per batch
    pub record_summary: bool,
}

impl Default for BulkConfig {
    fn default() -> Self {
        Self {
            record_summary: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Default filter when RUST_LOG is not set
    pub log_level: String,
    /// Emit JSON lines instead of human-readable output
    pub json_logs: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: true,
        }
    }
}

impl WorkflowConfig {
    /// Load configuration from multiple sources with precedence:
    /// 1. Default values
    /// 2. Configuration file (product-workflow.toml)
    /// 3. Environment variables (prefixed with PRODUCT_WORKFLOW__)
    pub fn load() -> Result<Self> {
        let mut builder = Config::builder();

        if Path::new("product-workflow.toml").exists() {
            builder = builder.add_source(File::with_name("product-workflow"));
        }

        builder = builder.add_source(
            Environment::with_prefix("PRODUCT_WORKFLOW")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let workflow_config: WorkflowConfig = builder.build()?.try_deserialize()?;
        workflow_config.validate()?;
        Ok(workflow_config)
    }

    /// Load from an explicit file, without environment overrides
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self> {
        let workflow_config: WorkflowConfig = Config::builder()
            .add_source(File::from(path.as_ref()))
            .build()?
            .try_deserialize()?;
        workflow_config.validate()?;
        Ok(workflow_config)
    }

    /// Save configuration to file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let toml_content = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_content)?;
        Ok(())
    }

    /// Load .env file if it exists
    pub fn load_env_file() -> Result<()> {
        if Path::new(".env").exists() {
            dotenvy::dotenv()?;
            tracing::info!("Loaded environment variables from .env file");
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        let locking = &self.locking;
        if locking.idle_timeout_minutes == 0 || locking.idle_timeout_minutes > MAX_TIMEOUT_MINUTES
        {
            bail!("locking.idle_timeout_minutes must be within 1..={MAX_TIMEOUT_MINUTES}");
        }
        if locking.hard_lock_timeout_minutes == 0
            || locking.hard_lock_timeout_minutes > MAX_TIMEOUT_MINUTES
        {
            bail!("locking.hard_lock_timeout_minutes must be within 1..={MAX_TIMEOUT_MINUTES}");
        }
        if locking.cleanup_interval_seconds == 0 {
            bail!("locking.cleanup_interval_seconds must be greater than zero");
        }
        if locking.max_sessions_per_user == 0 {
            bail!("locking.max_sessions_per_user must be greater than zero");
        }
        if locking.renew_threshold_percent == 0 || locking.renew_threshold_percent > 100 {
            bail!("locking.renew_threshold_percent must be within 1..=100");
        }
        let overdue_hours = self.delegation.overdue_review_threshold_hours;
        if overdue_hours == 0 || overdue_hours > MAX_OVERDUE_THRESHOLD_HOURS {
            bail!(
                "delegation.overdue_review_threshold_hours must be within 1..={MAX_OVERDUE_THRESHOLD_HOURS}"
            );
        }
        Ok(())
    }
}

/// Global configuration instance
static CONFIG: std::sync::LazyLock<Result<WorkflowConfig, anyhow::Error>> =
    std::sync::LazyLock::new(|| {
        let _ = WorkflowConfig::load_env_file();
        WorkflowConfig::load()
    });

/// Get the global configuration
pub fn config() -> Result<&'static WorkflowConfig> {
    CONFIG
        .as_ref()
        .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))
}

/// Initialize configuration (called at startup)
pub fn init_config() -> Result<()> {
    let _config = config()?;
    tracing::info!("Configuration loaded successfully");
    Ok(())
}
