pub mod browser;
pub mod container;
pub mod docker;
pub mod observation;

use async_trait::async_trait;

use crate::errors::ScreenLoopResult;
use crate::planner::types::DisplaySpec;

pub use observation::Observation;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MouseButton {
    Left,
    Right,
}

impl MouseButton {
    /// `left` and `right` map to themselves (case-insensitive); anything else is a left click.
    pub fn normalize(requested: &str) -> Self {
        if requested.eq_ignore_ascii_case("right") {
            MouseButton::Right
        } else {
            MouseButton::Left
        }
    }
}

/// Capabilities a controllable surface (browser page, container desktop) must expose.
///
/// Operations return `ActionExecution` for failures scoped to one call and
/// `SurfaceUnavailable` when the surface itself is gone.
#[async_trait]
pub trait Surface: Send {
    fn display(&self) -> DisplaySpec;

    async fn click(&mut self, x: i32, y: i32, button: MouseButton) -> ScreenLoopResult<()>;

    async fn move_and_scroll(&mut self, x: i32, y: i32, dx: i32, dy: i32) -> ScreenLoopResult<()>;

    /// `key` has already been through `executor::input::normalize_key`.
    async fn press_key(&mut self, key: &str) -> ScreenLoopResult<()>;

    async fn type_text(&mut self, text: &str) -> ScreenLoopResult<()>;

    /// Current full-surface image. Must not change surface state.
    async fn capture_image(&mut self) -> ScreenLoopResult<Observation>;

    /// Releases the surface. Called by the bootstrap once the loop is over.
    async fn close(&mut self) -> ScreenLoopResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_buttons_become_left() {
        assert_eq!(MouseButton::normalize("left"), MouseButton::Left);
        assert_eq!(MouseButton::normalize("right"), MouseButton::Right);
        assert_eq!(MouseButton::normalize("RIGHT"), MouseButton::Right);
        for other in ["middle", "wheel", "back", "forward", ""] {
            assert_eq!(MouseButton::normalize(other), MouseButton::Left, "{other}");
        }
    }
}
