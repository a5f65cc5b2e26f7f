use crate::agent_engine::history::{HistoryEntry, SessionHistory};
use crate::agent_engine::loop_control::LoopController;
use crate::agent_engine::state::{LoopConfig, LoopState};
use crate::errors::ScreenLoopResult;
use crate::executor::dispatcher::{ActionExecutor, ActionOutcome};
use crate::executor::safety::SafetyGate;
use crate::planner::provider::Planner;
use crate::planner::types::{PendingAction, TurnRequest, TurnResponse};
use crate::surface::Surface;

/// Drives the request/act/observe cycle for one session.
///
/// Owns the continuation reference for its lifetime; the planner, surface and
/// gate are borrowed from the bootstrap, which also tears the surface down.
pub struct TurnLoop<'a> {
    planner: &'a dyn Planner,
    surface: &'a mut dyn Surface,
    gate: &'a dyn SafetyGate,
    executor: ActionExecutor,
    control: LoopController,
    history: SessionHistory,
    config: LoopConfig,
    continuation: Option<String>,
    turn: u32,
}

impl<'a> TurnLoop<'a> {
    pub fn new(
        planner: &'a dyn Planner,
        surface: &'a mut dyn Surface,
        gate: &'a dyn SafetyGate,
        config: LoopConfig,
        control: LoopController,
        history: SessionHistory,
    ) -> Self {
        Self {
            planner,
            surface,
            gate,
            executor: ActionExecutor::new(config.wait_interval),
            control,
            history,
            config,
            continuation: None,
            turn: 0,
        }
    }

    pub fn history(&self) -> &SessionHistory {
        &self.history
    }

    pub fn turns(&self) -> u32 {
        self.turn
    }

    pub fn continuation(&self) -> Option<&str> {
        self.continuation.as_deref()
    }

    /// Runs from the bootstrap response until the model stops issuing actions.
    pub async fn run(&mut self, initial: TurnResponse) -> ScreenLoopResult<TurnResponse> {
        tracing::info!(
            planner = self.planner.name(),
            session = %self.history.session_id,
            response = %initial.id,
            "turn loop started"
        );
        let mut state = LoopState::AwaitingResponse(initial);
        loop {
            state = match self.step(state).await? {
                LoopState::Terminated(response) => {
                    tracing::info!(
                        turns = self.turn,
                        session = %self.history.session_id,
                        "turn loop ended"
                    );
                    return Ok(response);
                }
                next => next,
            };
        }
    }

    /// Performs exactly one state transition.
    pub async fn step(&mut self, state: LoopState) -> ScreenLoopResult<LoopState> {
        tracing::debug!(state = state.name(), turn = self.turn, "step");
        match state {
            LoopState::AwaitingResponse(mut response) => {
                self.continuation = Some(response.id.clone());
                self.record_model_turn(&response);
                match response.take_first_pending() {
                    Some(pending) => Ok(LoopState::ExecutingAction {
                        pending,
                        response_id: response.id,
                    }),
                    None => {
                        tracing::info!(response = %response.id, "no computer call; terminating");
                        self.history.record(
                            HistoryEntry::new(self.turn, "final").content(response.final_text()),
                        );
                        Ok(LoopState::Terminated(response))
                    }
                }
            }
            LoopState::ExecutingAction { pending, response_id } => {
                let next = self.execute_turn(pending, response_id).await?;
                Ok(LoopState::AwaitingResponse(next))
            }
            terminated @ LoopState::Terminated(_) => Ok(terminated),
        }
    }

    async fn execute_turn(
        &mut self,
        pending: PendingAction,
        response_id: String,
    ) -> ScreenLoopResult<TurnResponse> {
        self.turn += 1;
        let turn = self.turn;
        tracing::info!(
            turn,
            call_id = %pending.call_id,
            kind = pending.action.kind(),
            safety_checks = pending.pending_safety_checks.len(),
            "executing action"
        );

        let acknowledged = self.control.guard(self.gate.acknowledge(&pending)).await?;
        if !acknowledged.is_empty() {
            self.history.record(
                HistoryEntry::new(turn, "safety")
                    .call_id(&pending.call_id)
                    .data(serde_json::to_value(&acknowledged)?),
            );
        }

        let outcome = self
            .control
            .guard(self.executor.execute(&mut *self.surface, &pending.action))
            .await?;
        self.record_outcome(turn, &pending, &outcome);

        self.control.sleep(self.config.settle_delay).await?;
        let observation = self.surface.capture_image().await?;
        tracing::debug!(turn, bytes = observation.len(), "observation captured");

        let request = TurnRequest {
            previous_response_id: response_id,
            call_id: pending.call_id,
            acknowledged_safety_checks: acknowledged,
            observation,
            display: self.surface.display(),
        };
        let next = self.control.guard(self.planner.submit(&request)).await?;
        tracing::info!(turn, response = %next.id, pending = next.pending.len(), "planner replied");
        Ok(next)
    }

    fn record_model_turn(&mut self, response: &TurnResponse) {
        for summary in &response.reasoning {
            tracing::info!(turn = self.turn, summary = %summary, "model reasoning");
        }
        for text in &response.output_text {
            tracing::info!(turn = self.turn, text = %text, "model message");
        }
        let calls: Vec<_> = response
            .pending
            .iter()
            .map(|p| serde_json::json!({ "call_id": p.call_id, "action": p.action }))
            .collect();
        self.history.record(
            HistoryEntry::new(self.turn, "model")
                .content(response.id.clone())
                .data(serde_json::json!({
                    "computer_calls": calls,
                    "reasoning": response.reasoning,
                    "output_text": response.output_text,
                })),
        );
    }

    fn record_outcome(&mut self, turn: u32, pending: &PendingAction, outcome: &ActionOutcome) {
        if outcome.is_success() {
            tracing::info!(turn, call_id = %pending.call_id, ?outcome, "action done");
        } else {
            tracing::warn!(turn, call_id = %pending.call_id, ?outcome, "action did not apply");
        }
        self.history.record(
            HistoryEntry::new(turn, "action")
                .call_id(&pending.call_id)
                .data(serde_json::json!({
                    "action": pending.action,
                    "result": outcome,
                })),
        );
    }
}
