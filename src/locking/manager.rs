use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::stats::{LockManagerStats, LockStatsSnapshot};
use super::sweeper::SweepTask;
use super::types::{
    AcquireOutcome, AcquireRequest, DenialReason, EditingLock, EditingSession,
    ForceReleaseReport, LockDenial, LockType, SessionInvalidReason, SessionValidation,
    SweepReport,
};
use crate::clock::SharedClock;
use crate::config::LockingConfig;

/// Session and lock tables. Ended sessions stay as inactive tombstones until
/// the next sweep so late callers get `Inactive` rather than `NotFound`.
#[derive(Debug, Default)]
pub(super) struct LockTables {
    sessions: HashMap<String, EditingSession>,
    locks: HashMap<String, EditingLock>,
}

impl LockTables {
    fn active_session_on<'a>(
        &'a self,
        product_id: &'a str,
    ) -> impl Iterator<Item = &'a EditingSession> + 'a {
        self.sessions
            .values()
            .filter(move |session| session.is_active && session.product_id == product_id)
    }

    /// Mark a session ended, optionally dropping the product lock if its owner ended.
    /// Sessions swept or expired on acquire leave the lock to its hard expiry.
    fn terminate(&mut self, session_id: &str, release_lock: bool) -> Option<EditingSession> {
        let session = self.sessions.get_mut(session_id)?;
        if !session.is_active {
            return None;
        }
        session.is_active = false;
        let ended = session.clone();

        if release_lock {
            let owns_lock = self
                .locks
                .get(&ended.product_id)
                .map(|lock| lock.locked_by == ended.user_id)
                .unwrap_or(false);
            if owns_lock {
                self.locks.remove(&ended.product_id);
            }
        }

        Some(ended)
    }

    fn expire_lock_if_due(&mut self, product_id: &str, now: DateTime<Utc>) -> Option<EditingLock> {
        let expired = self
            .locks
            .get(product_id)
            .map(|lock| lock.is_expired(now))
            .unwrap_or(false);

        if expired {
            self.locks.remove(product_id)
        } else {
            None
        }
    }

    fn expire_idle_sessions_on(
        &mut self,
        product_id: &str,
        now: DateTime<Utc>,
        idle_timeout: Duration,
    ) -> usize {
        let stale: Vec<String> = self
            .active_session_on(product_id)
            .filter(|session| session.is_idle_expired(now, idle_timeout))
            .map(|session| session.session_id.clone())
            .collect();

        for session_id in &stale {
            self.terminate(session_id, false);
        }
        stale.len()
    }
}

pub(super) struct LockManagerInner {
    pub(super) tables: Mutex<LockTables>,
    pub(super) clock: SharedClock,
    pub(super) config: LockingConfig,
    pub(super) stats: LockManagerStats,
}

impl LockManagerInner {
    /// Remove idle sessions, ended tombstones and hard-expired locks
    pub(super) async fn sweep(&self) -> SweepReport {
        let now = self.clock.now();
        let idle_timeout = self.config.idle_timeout();
        let mut report = SweepReport::default();

        {
            let mut tables = self.tables.lock().await;

            tables.sessions.retain(|_, session| {
                if !session.is_active {
                    report.purged_sessions += 1;
                    false
                } else if session.is_idle_expired(now, idle_timeout) {
                    debug!(
                        session_id = %session.session_id,
                        product_id = %session.product_id,
                        user_id = %session.user_id,
                        "Sweeping idle editing session"
                    );
                    report.expired_sessions += 1;
                    false
                } else {
                    true
                }
            });

            tables.locks.retain(|product_id, lock| {
                if lock.is_expired(now) {
                    debug!(
                        product_id = %product_id,
                        locked_by = %lock.locked_by,
                        "Sweeping expired editing lock"
                    );
                    report.expired_locks += 1;
                    false
                } else {
                    true
                }
            });
        }

        self.stats.record_sessions_expired(report.expired_sessions);
        self.stats.record_locks_expired(report.expired_locks);
        report
    }
}

/// Grants editing sessions and review locks on products.
///
/// Every read-modify-write of the session and lock tables happens under a single
/// mutex, so acquisitions never interleave with the cleanup sweep. Denials are
/// returned as [`AcquireOutcome::Denied`] values rather than errors.
pub struct LockManager {
    pub(super) inner: Arc<LockManagerInner>,
    pub(super) sweep_task: Mutex<Option<SweepTask>>,
}

impl std::fmt::Debug for LockManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LockManager")
            .field("config", &self.inner.config)
            .field("clock", &self.inner.clock)
            .finish_non_exhaustive()
    }
}

impl LockManager {
    pub fn new(config: LockingConfig, clock: SharedClock) -> Self {
        Self {
            inner: Arc::new(LockManagerInner {
                tables: Mutex::new(LockTables::default()),
                clock,
                config,
                stats: LockManagerStats::new(),
            }),
            sweep_task: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &LockingConfig {
        &self.inner.config
    }

    pub async fn acquire(&self, request: AcquireRequest) -> AcquireOutcome {
        let now = self.inner.clock.now();
        let idle_timeout = self.inner.config.idle_timeout();
        let is_admin = request.user_role.is_admin();
        let mut tables = self.inner.tables.lock().await;

        if let Some(expired) = tables.expire_lock_if_due(&request.product_id, now) {
            self.inner.stats.record_locks_expired(1);
            info!(
                product_id = %expired.product_id,
                locked_by = %expired.locked_by,
                expired_at = %expired.expires_at,
                "Removed expired editing lock"
            );
        }

        let idle = tables.expire_idle_sessions_on(&request.product_id, now, idle_timeout);
        if idle > 0 {
            self.inner.stats.record_sessions_expired(idle);
        }

        if let Some(lock) = tables.locks.get(&request.product_id) {
            if lock.locked_by != request.user_id && !is_admin {
                let denial = LockDenial {
                    reason: DenialReason::LockedByOther,
                    message: format!(
                        "Product {} is being reviewed by {} until {}",
                        lock.product_id,
                        lock.locked_by,
                        lock.expires_at.to_rfc3339()
                    ),
                    conflicting_session: tables
                        .active_session_on(&request.product_id)
                        .find(|session| session.user_id == lock.locked_by)
                        .cloned(),
                    conflicting_lock: Some(lock.clone()),
                };
                return self.deny(&request, denial);
            }
        }

        if !is_admin {
            let conflicting = tables
                .active_session_on(&request.product_id)
                .find(|session| session.user_id != request.user_id)
                .cloned();

            if let Some(session) = conflicting {
                let denial = LockDenial {
                    reason: DenialReason::SessionConflict,
                    message: format!(
                        "Product {} is being edited by {}",
                        session.product_id, session.user_id
                    ),
                    conflicting_lock: tables.locks.get(&request.product_id).cloned(),
                    conflicting_session: Some(session),
                };
                return self.deny(&request, denial);
            }
        }

        let existing = tables.sessions.values_mut().find(|session| {
            session.is_active
                && session.product_id == request.product_id
                && session.user_id == request.user_id
        });
        if let Some(session) = existing {
            session.last_activity = now;
            self.inner.stats.record_renewed();
            debug!(
                session_id = %session.session_id,
                product_id = %request.product_id,
                user_id = %request.user_id,
                "Existing editing session renewed on acquire"
            );
            return AcquireOutcome::Granted {
                session_id: session.session_id.clone(),
                lock_type: session.lock_type,
                renewed: true,
            };
        }

        let max_sessions = self.inner.config.max_sessions_per_user;
        let active_for_user = tables
            .sessions
            .values()
            .filter(|session| {
                session.user_id == request.user_id && session.is_live(now, idle_timeout)
            })
            .count();
        if active_for_user >= max_sessions {
            let denial = LockDenial {
                reason: DenialReason::SessionLimitExceeded,
                message: format!(
                    "User {} already holds {} of {} allowed editing sessions",
                    request.user_id, active_for_user, max_sessions
                ),
                conflicting_session: None,
                conflicting_lock: None,
            };
            return self.deny(&request, denial);
        }

        let lock_type = LockType::for_request(request.user_role, request.current_workflow_state);
        let session = EditingSession {
            session_id: Uuid::new_v4().to_string(),
            product_id: request.product_id.clone(),
            user_id: request.user_id.clone(),
            user_role: request.user_role,
            started_at: now,
            last_activity: now,
            lock_type,
            is_active: true,
            metadata: request.metadata.clone(),
        };

        if lock_type == LockType::Review {
            let hard_timeout = self.inner.config.hard_lock_timeout();
            tables
                .locks
                .entry(request.product_id.clone())
                .or_insert_with(|| EditingLock {
                    product_id: request.product_id.clone(),
                    locked_by: request.user_id.clone(),
                    lock_type,
                    locked_at: now,
                    expires_at: now
                        .checked_add_signed(hard_timeout)
                        .unwrap_or(DateTime::<Utc>::MAX_UTC),
                });
        }

        let session_id = session.session_id.clone();
        tables.sessions.insert(session_id.clone(), session);
        self.inner.stats.record_granted();

        info!(
            session_id = %session_id,
            product_id = %request.product_id,
            user_id = %request.user_id,
            lock_type = ?lock_type,
            "Editing session granted"
        );

        AcquireOutcome::Granted {
            session_id,
            lock_type,
            renewed: false,
        }
    }

    fn deny(&self, request: &AcquireRequest, denial: LockDenial) -> AcquireOutcome {
        self.inner.stats.record_denied();
        info!(
            product_id = %request.product_id,
            user_id = %request.user_id,
            reason = denial.reason.code(),
            conflicting_user = denial.conflicting_user(),
            "Editing session denied"
        );
        AcquireOutcome::Denied(denial)
    }

    /// Record activity on a session, restarting its idle countdown
    pub async fn renew(&self, session_id: &str) -> bool {
        let now = self.inner.clock.now();
        let idle_timeout = self.inner.config.idle_timeout();
        let mut tables = self.inner.tables.lock().await;

        let Some(session) = tables.sessions.get_mut(session_id) else {
            return false;
        };
        if !session.is_active {
            return false;
        }
        if session.is_idle_expired(now, idle_timeout) {
            tables.terminate(session_id, true);
            self.inner.stats.record_sessions_expired(1);
            return false;
        }

        session.last_activity = now;
        self.inner.stats.record_renewed();
        true
    }

    /// Check that a session is usable by `user_id`. An idle-expired session is
    /// terminated as a side effect, together with the lock it held.
    pub async fn validate(&self, session_id: &str, user_id: &str) -> SessionValidation {
        let now = self.inner.clock.now();
        let idle_timeout = self.inner.config.idle_timeout();
        let mut tables = self.inner.tables.lock().await;

        let Some(session) = tables.sessions.get(session_id) else {
            return SessionValidation::Invalid {
                reason: SessionInvalidReason::NotFound,
            };
        };
        if !session.is_active {
            return SessionValidation::Invalid {
                reason: SessionInvalidReason::Inactive,
            };
        }
        if session.user_id != user_id {
            return SessionValidation::Invalid {
                reason: SessionInvalidReason::WrongUser,
            };
        }

        let idle = session.idle_for(now);
        if idle > idle_timeout {
            tables.terminate(session_id, true);
            self.inner.stats.record_sessions_expired(1);
            info!(
                session_id = %session_id,
                user_id = %user_id,
                idle_minutes = idle.num_minutes(),
                "Editing session expired after inactivity"
            );
            return SessionValidation::Invalid {
                reason: SessionInvalidReason::IdleTimeout,
            };
        }

        let threshold = i128::from(self.inner.config.renew_threshold_percent);
        let should_renew = i128::from(idle.num_milliseconds()) * 100
            > i128::from(idle_timeout.num_milliseconds()) * threshold;
        SessionValidation::Valid { should_renew }
    }

    /// End a session owned by `user_id`, releasing the product lock if they hold it
    pub async fn release(&self, session_id: &str, user_id: &str) -> bool {
        let mut tables = self.inner.tables.lock().await;

        let owned_and_active = tables
            .sessions
            .get(session_id)
            .map(|session| session.is_active && session.user_id == user_id)
            .unwrap_or(false);
        if !owned_and_active {
            return false;
        }

        if let Some(session) = tables.terminate(session_id, true) {
            self.inner.stats.record_released();
            info!(
                session_id = %session_id,
                product_id = %session.product_id,
                user_id = %user_id,
                "Editing session released"
            );
        }
        true
    }

    /// End every session on a product and clear its lock, whoever owns them
    pub async fn force_release(&self, product_id: &str, acting_user_id: &str) -> ForceReleaseReport {
        let mut tables = self.inner.tables.lock().await;

        let session_ids: Vec<String> = tables
            .active_session_on(product_id)
            .map(|session| session.session_id.clone())
            .collect();
        let sessions_terminated: Vec<EditingSession> = session_ids
            .iter()
            .filter_map(|session_id| tables.terminate(session_id, false))
            .collect();
        let lock_cleared = tables.locks.remove(product_id);
        drop(tables);

        self.inner.stats.record_force_release();
        warn!(
            product_id = %product_id,
            acting_user = %acting_user_id,
            sessions_terminated = sessions_terminated.len(),
            lock_owner = lock_cleared.as_ref().map(|lock| lock.locked_by.as_str()),
            "Editing sessions force released"
        );

        ForceReleaseReport {
            product_id: product_id.to_string(),
            released_by: acting_user_id.to_string(),
            sessions_terminated,
            lock_cleared,
        }
    }

    /// Run one cleanup pass now, outside the periodic schedule
    pub async fn sweep(&self) -> SweepReport {
        self.inner.sweep().await
    }

    pub async fn session(&self, session_id: &str) -> Option<EditingSession> {
        self.inner.tables.lock().await.sessions.get(session_id).cloned()
    }

    /// Live sessions on a product, oldest first
    pub async fn sessions_for_product(&self, product_id: &str) -> Vec<EditingSession> {
        let now = self.inner.clock.now();
        let idle_timeout = self.inner.config.idle_timeout();
        let tables = self.inner.tables.lock().await;

        let mut sessions: Vec<EditingSession> = tables
            .active_session_on(product_id)
            .filter(|session| session.is_live(now, idle_timeout))
            .cloned()
            .collect();
        sessions.sort_by_key(|session| session.started_at);
        sessions
    }

    /// Current lock on a product, ignoring one that has already expired
    pub async fn lock_for_product(&self, product_id: &str) -> Option<EditingLock> {
        let now = self.inner.clock.now();
        self.inner
            .tables
            .lock()
            .await
            .locks
            .get(product_id)
            .filter(|lock| !lock.is_expired(now))
            .cloned()
    }

    pub async fn active_session_count(&self, user_id: &str) -> usize {
        let now = self.inner.clock.now();
        let idle_timeout = self.inner.config.idle_timeout();
        self.inner
            .tables
            .lock()
            .await
            .sessions
            .values()
            .filter(|session| session.user_id == user_id && session.is_live(now, idle_timeout))
            .count()
    }

    pub fn stats(&self) -> LockStatsSnapshot {
        self.inner.stats.snapshot()
    }

    pub fn log_stats(&self) {
        self.inner.stats.log_stats();
    }
}

impl Drop for LockManager {
    fn drop(&mut self) {
        if let Some(task) = self.sweep_task.get_mut().take() {
            task.abort();
        }
    }
}
