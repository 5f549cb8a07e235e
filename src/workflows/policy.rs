use serde::{Deserialize, Serialize};

use super::types::WorkflowState;

/// Guard applied by the transition engine before a move is recorded.
///
/// `Permissive` accepts any target, including backwards moves such as
/// `Published -> Draft`. `Strict` only accepts the edges of
/// [`WorkflowState::successors`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionPolicy {
    #[default]
    Permissive,
    Strict,
}

impl TransitionPolicy {
    pub fn allows(&self, from: WorkflowState, to: WorkflowState) -> bool {
        match self {
            TransitionPolicy::Permissive => true,
            TransitionPolicy::Strict => from.successors().contains(&to),
        }
    }
}
