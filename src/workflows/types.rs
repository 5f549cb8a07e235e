use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Fixed approval pipeline a product moves through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowState {
    Draft,
    Review,
    Approved,
    Published,
    Rejected,
    Synced,
}

impl WorkflowState {
    pub const ALL: [WorkflowState; 6] = [
        WorkflowState::Draft,
        WorkflowState::Review,
        WorkflowState::Approved,
        WorkflowState::Published,
        WorkflowState::Rejected,
        WorkflowState::Synced,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowState::Draft => "draft",
            WorkflowState::Review => "review",
            WorkflowState::Approved => "approved",
            WorkflowState::Published => "published",
            WorkflowState::Rejected => "rejected",
            WorkflowState::Synced => "synced",
        }
    }

    /// Forward moves of the approval graph
    pub fn successors(&self) -> &'static [WorkflowState] {
        match self {
            WorkflowState::Draft => &[WorkflowState::Review],
            WorkflowState::Review => &[WorkflowState::Approved, WorkflowState::Rejected],
            WorkflowState::Approved => &[WorkflowState::Published],
            WorkflowState::Published => &[WorkflowState::Synced],
            WorkflowState::Rejected => &[WorkflowState::Draft],
            WorkflowState::Synced => &[],
        }
    }
}

impl fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Role already resolved by the caller. Only `Admin` changes behaviour here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Admin,
    Reviewer,
    Editor,
    Viewer,
}

impl UserRole {
    pub fn is_admin(&self) -> bool {
        matches!(self, UserRole::Admin)
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            UserRole::Admin => "admin",
            UserRole::Reviewer => "reviewer",
            UserRole::Editor => "editor",
            UserRole::Viewer => "viewer",
        };
        f.write_str(name)
    }
}

/// User acting on the workflow, with the role the caller authenticated
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: String,
    pub role: UserRole,
}

impl Actor {
    pub fn new(user_id: impl Into<String>, role: UserRole) -> Self {
        Self {
            user_id: user_id.into(),
            role,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub state: WorkflowState,
    pub timestamp: DateTime<Utc>,
    pub user_id: String,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowProduct {
    pub id: String,
    pub current_state: WorkflowState,
    pub history: Vec<HistoryEntry>,
    pub assigned_reviewer: Option<String>,
    pub submitted_by: String,
    pub rejection_reason: Option<String>,
}

impl WorkflowProduct {
    /// New product in `Draft`, with the initial history entry already recorded
    pub fn new(id: impl Into<String>, submitted_by: impl Into<String>, at: DateTime<Utc>) -> Self {
        let submitted_by = submitted_by.into();
        Self {
            id: id.into(),
            current_state: WorkflowState::Draft,
            history: vec![HistoryEntry {
                state: WorkflowState::Draft,
                timestamp: at,
                user_id: submitted_by.clone(),
                comment: None,
            }],
            assigned_reviewer: None,
            submitted_by,
            rejection_reason: None,
        }
    }

    pub fn with_reviewer(mut self, reviewer_id: impl Into<String>) -> Self {
        self.assigned_reviewer = Some(reviewer_id.into());
        self
    }

    pub fn last_entry(&self) -> Option<&HistoryEntry> {
        self.history.last()
    }

    /// Timestamp of the most recent transition
    pub fn last_transition_at(&self) -> Option<DateTime<Utc>> {
        self.history.last().map(|entry| entry.timestamp)
    }

    /// `current_state` matches the last entry and timestamps never go backwards
    pub fn history_is_consistent(&self) -> bool {
        let state_matches = self
            .history
            .last()
            .map(|entry| entry.state == self.current_state)
            .unwrap_or(false);

        state_matches
            && self
                .history
                .windows(2)
                .all(|pair| pair[0].timestamp <= pair[1].timestamp)
    }

    pub(crate) fn push_history(
        &mut self,
        state: WorkflowState,
        timestamp: DateTime<Utc>,
        user_id: &str,
        comment: Option<String>,
    ) {
        // Keep history non-decreasing even if a caller's clock steps back
        let timestamp = match self.last_transition_at() {
            Some(last) if last > timestamp => last,
            _ => timestamp,
        };

        self.history.push(HistoryEntry {
            state,
            timestamp,
            user_id: user_id.to_string(),
            comment,
        });
        self.current_state = state;
    }
}
