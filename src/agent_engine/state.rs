use std::time::Duration;

use crate::config::LoopTimingConfig;
use crate::planner::types::{PendingAction, TurnResponse};

/// States of the turn loop.
#[derive(Debug, Clone, PartialEq)]
pub enum LoopState {
    /// Holding a model response that has not been inspected yet.
    AwaitingResponse(TurnResponse),
    /// One action taken from the response identified by `response_id`.
    ExecutingAction {
        pending: PendingAction,
        response_id: String,
    },
    /// The model stopped asking for actions. Absorbing.
    Terminated(TurnResponse),
}

impl LoopState {
    pub fn name(&self) -> &'static str {
        match self {
            LoopState::AwaitingResponse(_) => "awaiting_response",
            LoopState::ExecutingAction { .. } => "executing_action",
            LoopState::Terminated(_) => "terminated",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopConfig {
    /// Pause between an action and the observation capture.
    pub settle_delay: Duration,
    /// Length of a model-requested `wait`.
    pub wait_interval: Duration,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            settle_delay: Duration::from_secs(1),
            wait_interval: Duration::from_secs(2),
        }
    }
}

impl From<&LoopTimingConfig> for LoopConfig {
    fn from(cfg: &LoopTimingConfig) -> Self {
        Self {
            settle_delay: Duration::from_millis(cfg.settle_ms),
            wait_interval: Duration::from_millis(cfg.wait_ms),
        }
    }
}
