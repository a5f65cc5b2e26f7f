// Scripted planner and recording surface shared by unit tests.
use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::errors::{ScreenLoopError, ScreenLoopResult};
use crate::planner::provider::Planner;
use crate::planner::types::{
    ActionDescriptor, DisplaySpec, Environment, PendingAction, SafetyCheck, TurnRequest,
    TurnResponse,
};
use crate::surface::{MouseButton, Observation, Surface};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SurfaceCall {
    Click(i32, i32, MouseButton),
    MoveAndScroll(i32, i32, i32, i32),
    PressKey(String),
    TypeText(String),
    Capture,
}

#[derive(Default)]
pub struct RecordingSurface {
    pub calls: Vec<SurfaceCall>,
    pub fail_clicks: bool,
    pub gone: bool,
}

impl RecordingSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn captures(&self) -> usize {
        self.calls.iter().filter(|c| **c == SurfaceCall::Capture).count()
    }

    pub fn actions(&self) -> Vec<SurfaceCall> {
        self.calls
            .iter()
            .filter(|c| **c != SurfaceCall::Capture)
            .cloned()
            .collect()
    }

    fn check(&self) -> ScreenLoopResult<()> {
        if self.gone {
            return Err(ScreenLoopError::SurfaceUnavailable("page closed".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl Surface for RecordingSurface {
    fn display(&self) -> DisplaySpec {
        DisplaySpec { width: 1024, height: 768, environment: Environment::Browser }
    }

    async fn click(&mut self, x: i32, y: i32, button: MouseButton) -> ScreenLoopResult<()> {
        self.check()?;
        self.calls.push(SurfaceCall::Click(x, y, button));
        if self.fail_clicks {
            return Err(ScreenLoopError::ActionExecution("element detached".into()));
        }
        Ok(())
    }

    async fn move_and_scroll(&mut self, x: i32, y: i32, dx: i32, dy: i32) -> ScreenLoopResult<()> {
        self.check()?;
        self.calls.push(SurfaceCall::MoveAndScroll(x, y, dx, dy));
        Ok(())
    }

    async fn press_key(&mut self, key: &str) -> ScreenLoopResult<()> {
        self.check()?;
        self.calls.push(SurfaceCall::PressKey(key.to_string()));
        Ok(())
    }

    async fn type_text(&mut self, text: &str) -> ScreenLoopResult<()> {
        self.check()?;
        self.calls.push(SurfaceCall::TypeText(text.to_string()));
        Ok(())
    }

    async fn capture_image(&mut self) -> ScreenLoopResult<Observation> {
        self.check()?;
        self.calls.push(SurfaceCall::Capture);
        Ok(Observation::new(format!("frame-{}", self.captures()).into_bytes()))
    }
}

/// Replays canned responses and records every request it receives.
#[derive(Default)]
pub struct ScriptedPlanner {
    responses: Mutex<VecDeque<ScreenLoopResult<TurnResponse>>>,
    pub requests: Mutex<Vec<TurnRequest>>,
}

impl ScriptedPlanner {
    pub fn new(responses: Vec<TurnResponse>) -> Self {
        Self::with_results(responses.into_iter().map(Ok).collect())
    }

    pub fn with_results(responses: Vec<ScreenLoopResult<TurnResponse>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn recorded(&self) -> Vec<TurnRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Planner for ScriptedPlanner {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn begin(
        &self,
        _task: &str,
        _observation: &Observation,
        _display: DisplaySpec,
    ) -> ScreenLoopResult<TurnResponse> {
        self.next()
    }

    async fn submit(&self, request: &TurnRequest) -> ScreenLoopResult<TurnResponse> {
        self.requests.lock().unwrap().push(request.clone());
        self.next()
    }
}

impl ScriptedPlanner {
    fn next(&self) -> ScreenLoopResult<TurnResponse> {
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ScreenLoopError::Planning("script exhausted".into())))
    }
}

pub fn pending(call_id: &str, action: ActionDescriptor) -> PendingAction {
    PendingAction {
        call_id: call_id.into(),
        action,
        pending_safety_checks: Vec::new(),
    }
}

pub fn checks(n: usize) -> Vec<SafetyCheck> {
    (0..n)
        .map(|i| SafetyCheck {
            id: format!("sc_{i}"),
            code: Some("malicious_instructions".into()),
            message: Some(format!("check {i}")),
        })
        .collect()
}

pub fn turn(id: &str, actions: Vec<PendingAction>) -> TurnResponse {
    TurnResponse {
        id: id.into(),
        pending: actions,
        ..Default::default()
    }
}

pub fn final_turn(id: &str, text: &str) -> TurnResponse {
    TurnResponse {
        id: id.into(),
        output_text: vec![text.into()],
        ..Default::default()
    }
}
