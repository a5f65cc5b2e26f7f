use async_trait::async_trait;

use crate::errors::ScreenLoopResult;
use crate::planner::types::{DisplaySpec, TurnRequest, TurnResponse};
use crate::surface::Observation;

/// The remote action-planning model. Constructed once by the bootstrap and
/// handed to the turn loop by reference.
#[async_trait]
pub trait Planner: Send + Sync {
    /// Returns the planner's identifier, used in logs.
    fn name(&self) -> &str;

    /// Opening request carrying the task prompt and first observation.
    /// Called by the bootstrap, never by the turn loop.
    async fn begin(
        &self,
        task: &str,
        observation: &Observation,
        display: DisplaySpec,
    ) -> ScreenLoopResult<TurnResponse>;

    /// Returns the outcome of one action and gets the next turn.
    async fn submit(&self, request: &TurnRequest) -> ScreenLoopResult<TurnResponse>;
}
