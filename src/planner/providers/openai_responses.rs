use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::config::PlannerConfig;
use crate::errors::{ScreenLoopError, ScreenLoopResult};
use crate::planner::provider::Planner;
use crate::planner::types::{
    ActionDescriptor, DisplaySpec, PendingAction, SafetyCheck, TurnRequest, TurnResponse,
};
use crate::surface::Observation;

/// Planner backed by the Responses API `computer_use_preview` tool.
pub struct ResponsesPlanner {
    api_base: String,
    api_key: String,
    model: String,
    reasoning_summary: String,
    truncation: String,
    client: reqwest::Client,
}

impl ResponsesPlanner {
    pub fn new(cfg: &PlannerConfig, api_key: String) -> ScreenLoopResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()?;
        Ok(Self {
            api_base: cfg.api_base.clone(),
            api_key,
            model: cfg.model.clone(),
            reasoning_summary: cfg.reasoning_summary.clone(),
            truncation: cfg.truncation.clone(),
            client,
        })
    }

    fn tools(display: DisplaySpec) -> Value {
        json!([{
            "type": "computer_use_preview",
            "display_width": display.width,
            "display_height": display.height,
            "environment": display.environment,
        }])
    }

    fn initial_body(&self, task: &str, observation: &Observation, display: DisplaySpec) -> Value {
        let mut body = json!({
            "model": self.model,
            "tools": Self::tools(display),
            "input": [{
                "role": "user",
                "content": [
                    { "type": "input_text", "text": task },
                    { "type": "input_image", "image_url": observation.to_data_url() },
                ],
            }],
            "truncation": self.truncation,
        });
        if !self.reasoning_summary.is_empty() {
            body["reasoning"] = json!({ "summary": self.reasoning_summary });
        }
        body
    }

    fn followup_body(&self, request: &TurnRequest) -> ScreenLoopResult<Value> {
        let acknowledged = serde_json::to_value(&request.acknowledged_safety_checks)?;
        Ok(json!({
            "model": self.model,
            "previous_response_id": request.previous_response_id,
            "tools": Self::tools(request.display),
            "input": [{
                "call_id": request.call_id,
                "type": "computer_call_output",
                "acknowledged_safety_checks": acknowledged,
                "output": {
                    "type": "input_image",
                    "image_url": request.observation.to_data_url(),
                },
            }],
            "truncation": self.truncation,
        }))
    }

    async fn post(&self, body: Value) -> ScreenLoopResult<TurnResponse> {
        tracing::debug!(model = %self.model, "sending planning request");
        tracing::debug!(
            body = %serde_json::to_string(&sanitize_for_log(&body)).unwrap_or_default(),
            "request body (sanitized, base64 omitted)"
        );

        let response = self
            .client
            .post(&self.api_base)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let err_body = response.text().await.unwrap_or_default();
            return Err(ScreenLoopError::PlanningStatus {
                status: status.as_u16(),
                body: err_body,
            });
        }

        let value: Value = response
            .json()
            .await
            .map_err(|e| ScreenLoopError::Planning(format!("malformed response body: {e}")))?;
        let turn = parse_turn_response(value)?;
        tracing::info!(
            response = %turn.id,
            computer_calls = turn.pending.len(),
            messages = turn.output_text.len(),
            is_final = turn.is_final(),
            "planning response received"
        );
        Ok(turn)
    }
}

#[async_trait]
impl Planner for ResponsesPlanner {
    fn name(&self) -> &str {
        &self.model
    }

    async fn begin(
        &self,
        task: &str,
        observation: &Observation,
        display: DisplaySpec,
    ) -> ScreenLoopResult<TurnResponse> {
        self.post(self.initial_body(task, observation, display)).await
    }

    async fn submit(&self, request: &TurnRequest) -> ScreenLoopResult<TurnResponse> {
        let body = self.followup_body(request)?;
        self.post(body).await
    }
}

/// Builds a `TurnResponse` from a Responses API reply.
pub fn parse_turn_response(value: Value) -> ScreenLoopResult<TurnResponse> {
    if let Some(err) = value.get("error").filter(|e| !e.is_null()) {
        let msg = err["message"].as_str().unwrap_or("unknown error");
        return Err(ScreenLoopError::Planning(format!("model returned error: {msg}")));
    }

    let id = value["id"]
        .as_str()
        .ok_or_else(|| ScreenLoopError::Planning("response has no id".into()))?
        .to_string();
    let output = match value.get("output") {
        Some(Value::Array(items)) => items.clone(),
        Some(Value::Null) | None => Vec::new(),
        Some(_) => return Err(ScreenLoopError::Planning("response output is not an array".into())),
    };

    let mut turn = TurnResponse {
        id,
        ..Default::default()
    };
    for item in &output {
        match item["type"].as_str() {
            Some("computer_call") => turn.pending.push(parse_computer_call(item)?),
            Some("message") => turn.output_text.extend(texts(&item["content"], "output_text")),
            Some("reasoning") => turn.reasoning.extend(texts(&item["summary"], "summary_text")),
            other => tracing::debug!(item_type = ?other, "ignoring output item"),
        }
    }
    turn.output = output;
    Ok(turn)
}

fn parse_computer_call(item: &Value) -> ScreenLoopResult<PendingAction> {
    let call_id = item["call_id"]
        .as_str()
        .ok_or_else(|| ScreenLoopError::Planning("computer_call without call_id".into()))?
        .to_string();
    let action = ActionDescriptor::from_value(item.get("action").cloned().unwrap_or(Value::Null));
    let pending_safety_checks: Vec<SafetyCheck> = match item.get("pending_safety_checks") {
        Some(Value::Null) | None => Vec::new(),
        Some(checks) => serde_json::from_value(checks.clone())?,
    };
    Ok(PendingAction { call_id, action, pending_safety_checks })
}

fn texts(parts: &Value, part_type: &str) -> Vec<String> {
    parts
        .as_array()
        .map(|parts| {
            parts
                .iter()
                .filter(|p| p["type"].as_str() == Some(part_type))
                .filter_map(|p| p["text"].as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

/// Copy of `body` with data-URL images replaced, for debug logging.
fn sanitize_for_log(body: &Value) -> Value {
    match body {
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| match v {
                    Value::String(s) if k == "image_url" && s.starts_with("data:") => {
                        (k.clone(), Value::String("<omitted_base64_image>".into()))
                    }
                    other => (k.clone(), sanitize_for_log(other)),
                })
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(sanitize_for_log).collect()),
        other => other.clone(),
    }
}
