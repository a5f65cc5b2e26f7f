// Maps one model action onto surface operations.
use std::time::Duration;

use crate::errors::{ScreenLoopError, ScreenLoopResult};
use crate::executor::input::normalize_key;
use crate::planner::types::ActionDescriptor;
use crate::surface::{MouseButton, Surface};

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ActionOutcome {
    Completed,
    /// The surface rejected the action; the loop carries on.
    Failed { error: String },
    Waited { milliseconds: u64 },
    /// `screenshot`: the loop captures after every action anyway.
    Skipped,
    Unrecognized { kind: String },
}

impl ActionOutcome {
    pub fn is_success(&self) -> bool {
        !matches!(self, ActionOutcome::Failed { .. } | ActionOutcome::Unrecognized { .. })
    }
}

pub struct ActionExecutor {
    wait_interval: Duration,
}

impl ActionExecutor {
    pub fn new(wait_interval: Duration) -> Self {
        Self { wait_interval }
    }

    /// Performs `action` against `surface`.
    ///
    /// Per-action failures come back as `ActionOutcome::Failed`; only a lost
    /// surface (or any other fatal error) is returned as `Err`.
    pub async fn execute(
        &self,
        surface: &mut dyn Surface,
        action: &ActionDescriptor,
    ) -> ScreenLoopResult<ActionOutcome> {
        match self.dispatch(surface, action).await {
            Ok(outcome) => Ok(outcome),
            Err(e) if !e.is_fatal() => {
                tracing::warn!(
                    error = %e,
                    action = %action.to_value(),
                    "action failed; continuing"
                );
                Ok(ActionOutcome::Failed { error: e.to_string() })
            }
            Err(e) => Err(e),
        }
    }

    async fn dispatch(
        &self,
        surface: &mut dyn Surface,
        action: &ActionDescriptor,
    ) -> ScreenLoopResult<ActionOutcome> {
        match action {
            ActionDescriptor::Click { x, y, button } => {
                let normalized = MouseButton::normalize(button);
                tracing::info!(x, y, requested = %button, button = ?normalized, "action: click");
                surface.click(*x, *y, normalized).await?;
            }
            ActionDescriptor::Scroll { x, y, scroll_x, scroll_y } => {
                tracing::info!(x, y, scroll_x, scroll_y, "action: scroll");
                surface.move_and_scroll(*x, *y, *scroll_x, *scroll_y).await?;
            }
            ActionDescriptor::Keypress { keys } => {
                for key in keys {
                    let key = normalize_key(key);
                    tracing::info!(key = %key, "action: keypress");
                    surface.press_key(&key).await?;
                }
            }
            ActionDescriptor::Type { text } => {
                tracing::info!(chars = text.chars().count(), "action: type");
                surface.type_text(text).await?;
            }
            ActionDescriptor::Wait => {
                let milliseconds = self.wait_interval.as_millis() as u64;
                tracing::info!(ms = milliseconds, "action: wait");
                tokio::time::sleep(self.wait_interval).await;
                return Ok(ActionOutcome::Waited { milliseconds });
            }
            ActionDescriptor::Screenshot => {
                tracing::info!("action: screenshot");
                return Ok(ActionOutcome::Skipped);
            }
            ActionDescriptor::Unknown { kind, raw } => {
                let err = ScreenLoopError::UnrecognizedAction(kind.clone());
                tracing::warn!(error = %err, raw = %raw, "no surface operation performed");
                return Ok(ActionOutcome::Unrecognized { kind: kind.clone() });
            }
        }
        Ok(ActionOutcome::Completed)
    }
}
