use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::surface::Observation;

/// Kind of surface the model is told it is operating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Environment {
    Browser,
    Mac,
    Windows,
    Ubuntu,
    Linux,
}

/// Display geometry declared to the model; fixed for a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplaySpec {
    pub width: u32,
    pub height: u32,
    pub environment: Environment,
}

/// One UI operation requested by the model.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionDescriptor {
    /// `button` is kept as sent; the executor normalizes it.
    Click { x: i32, y: i32, button: String },
    Scroll { x: i32, y: i32, scroll_x: i32, scroll_y: i32 },
    Keypress { keys: Vec<String> },
    Type { text: String },
    Wait,
    Screenshot,
    /// Anything we cannot map, kept whole for diagnostics.
    Unknown { kind: String, raw: Value },
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum KnownAction {
    Click {
        x: i32,
        y: i32,
        #[serde(default)]
        button: Option<String>,
    },
    Scroll {
        x: i32,
        y: i32,
        #[serde(default)]
        scroll_x: i32,
        #[serde(default)]
        scroll_y: i32,
    },
    Keypress {
        keys: Vec<String>,
    },
    Type {
        text: String,
    },
    Wait,
    Screenshot,
}

impl ActionDescriptor {
    pub fn from_value(raw: Value) -> Self {
        match serde_json::from_value::<KnownAction>(raw.clone()) {
            Ok(KnownAction::Click { x, y, button }) => ActionDescriptor::Click {
                x,
                y,
                button: button.unwrap_or_else(|| "left".into()),
            },
            Ok(KnownAction::Scroll { x, y, scroll_x, scroll_y }) => {
                ActionDescriptor::Scroll { x, y, scroll_x, scroll_y }
            }
            Ok(KnownAction::Keypress { keys }) => ActionDescriptor::Keypress { keys },
            Ok(KnownAction::Type { text }) => ActionDescriptor::Type { text },
            Ok(KnownAction::Wait) => ActionDescriptor::Wait,
            Ok(KnownAction::Screenshot) => ActionDescriptor::Screenshot,
            Err(_) => {
                let kind = raw
                    .get("type")
                    .and_then(Value::as_str)
                    .unwrap_or("<missing>")
                    .to_string();
                ActionDescriptor::Unknown { kind, raw }
            }
        }
    }

    pub fn kind(&self) -> &str {
        match self {
            ActionDescriptor::Click { .. } => "click",
            ActionDescriptor::Scroll { .. } => "scroll",
            ActionDescriptor::Keypress { .. } => "keypress",
            ActionDescriptor::Type { .. } => "type",
            ActionDescriptor::Wait => "wait",
            ActionDescriptor::Screenshot => "screenshot",
            ActionDescriptor::Unknown { kind, .. } => kind,
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            ActionDescriptor::Click { x, y, button } => {
                serde_json::json!({ "type": "click", "x": x, "y": y, "button": button })
            }
            ActionDescriptor::Scroll { x, y, scroll_x, scroll_y } => serde_json::json!({
                "type": "scroll", "x": x, "y": y, "scroll_x": scroll_x, "scroll_y": scroll_y,
            }),
            ActionDescriptor::Keypress { keys } => {
                serde_json::json!({ "type": "keypress", "keys": keys })
            }
            ActionDescriptor::Type { text } => serde_json::json!({ "type": "type", "text": text }),
            ActionDescriptor::Wait => serde_json::json!({ "type": "wait" }),
            ActionDescriptor::Screenshot => serde_json::json!({ "type": "screenshot" }),
            ActionDescriptor::Unknown { raw, .. } => raw.clone(),
        }
    }
}

impl Serialize for ActionDescriptor {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::ser::Serializer,
    {
        self.to_value().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ActionDescriptor {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::de::Deserializer<'de>,
    {
        Value::deserialize(deserializer).map(ActionDescriptor::from_value)
    }
}

/// A flagged risk attached to a requested action. Echoed back verbatim once acknowledged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SafetyCheck {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl SafetyCheck {
    pub fn reason(&self) -> &str {
        self.message
            .as_deref()
            .or(self.code.as_deref())
            .unwrap_or("no reason given")
    }
}

/// One action awaiting execution, correlated to the model turn by `call_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingAction {
    pub call_id: String,
    pub action: ActionDescriptor,
    #[serde(default)]
    pub pending_safety_checks: Vec<SafetyCheck>,
}

/// The model's reply to one request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TurnResponse {
    /// Continuation reference for the next request.
    pub id: String,
    /// Every computer call in response order. Only the first is ever executed.
    pub pending: Vec<PendingAction>,
    pub output_text: Vec<String>,
    pub reasoning: Vec<String>,
    /// Raw output items, kept for the final report.
    #[serde(default)]
    pub output: Vec<Value>,
}

impl TurnResponse {
    pub fn is_final(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn final_text(&self) -> String {
        self.output_text.join("\n")
    }

    /// Takes the first pending action and drops any others.
    pub fn take_first_pending(&mut self) -> Option<PendingAction> {
        if self.pending.is_empty() {
            return None;
        }
        let mut pending = std::mem::take(&mut self.pending).into_iter();
        let first = pending.next();
        let discarded = pending.count();
        if discarded > 0 {
            tracing::warn!(
                response = %self.id,
                discarded,
                "response carried more than one computer call; executing the first only"
            );
        }
        first
    }
}

/// Everything sent back to the model after one action.
#[derive(Debug, Clone)]
pub struct TurnRequest {
    pub previous_response_id: String,
    pub call_id: String,
    pub acknowledged_safety_checks: Vec<SafetyCheck>,
    pub observation: Observation,
    pub display: DisplaySpec,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_known_action_kinds() {
        assert_eq!(
            ActionDescriptor::from_value(
                json!({"type": "click", "x": 100, "y": 200, "button": "middle"})
            ),
            ActionDescriptor::Click { x: 100, y: 200, button: "middle".into() }
        );
        assert_eq!(
            ActionDescriptor::from_value(json!({
                "type": "scroll", "x": 50, "y": 60, "scroll_x": 0, "scroll_y": 300
            })),
            ActionDescriptor::Scroll { x: 50, y: 60, scroll_x: 0, scroll_y: 300 }
        );
        assert_eq!(
            ActionDescriptor::from_value(json!({"type": "keypress", "keys": ["CTRL", "L"]})),
            ActionDescriptor::Keypress { keys: vec!["CTRL".into(), "L".into()] }
        );
        assert_eq!(ActionDescriptor::from_value(json!({"type": "wait"})), ActionDescriptor::Wait);
        assert_eq!(
            ActionDescriptor::from_value(json!({"type": "screenshot"})),
            ActionDescriptor::Screenshot
        );
    }

    #[test]
    fn click_without_button_defaults_to_left() {
        assert_eq!(
            ActionDescriptor::from_value(json!({"type": "click", "x": 1, "y": 2})),
            ActionDescriptor::Click { x: 1, y: 2, button: "left".into() }
        );
    }

    #[test]
    fn unknown_and_malformed_actions_keep_raw_payload() {
        let drag = json!({"type": "drag", "path": [{"x": 1, "y": 2}, {"x": 3, "y": 4}]});
        match ActionDescriptor::from_value(drag.clone()) {
            ActionDescriptor::Unknown { kind, raw } => {
                assert_eq!(kind, "drag");
                assert_eq!(raw, drag);
            }
            other => panic!("expected unknown, got {other:?}"),
        }

        let broken_click = json!({"type": "click", "x": "left-ish"});
        match ActionDescriptor::from_value(broken_click.clone()) {
            ActionDescriptor::Unknown { kind, raw } => {
                assert_eq!(kind, "click");
                assert_eq!(raw, broken_click);
            }
            other => panic!("expected unknown, got {other:?}"),
        }

        match ActionDescriptor::from_value(json!({"x": 1})) {
            ActionDescriptor::Unknown { kind, .. } => assert_eq!(kind, "<missing>"),
            other => panic!("expected unknown, got {other:?}"),
        }
    }

    #[test]
    fn take_first_pending_discards_the_rest() {
        let mk = |id: &str| PendingAction {
            call_id: id.into(),
            action: ActionDescriptor::Wait,
            pending_safety_checks: vec![],
        };
        let mut resp = TurnResponse {
            id: "resp_1".into(),
            pending: vec![mk("call_a"), mk("call_b")],
            ..Default::default()
        };
        let first = resp.take_first_pending().unwrap();
        assert_eq!(first.call_id, "call_a");
        assert!(resp.pending.is_empty());
        assert!(resp.take_first_pending().is_none());
    }

    #[test]
    fn safety_check_reason_prefers_message() {
        let check = SafetyCheck {
            id: "sc_1".into(),
            code: Some("malicious_instructions".into()),
            message: Some("Page asks you to ignore the task".into()),
        };
        assert_eq!(check.reason(), "Page asks you to ignore the task");
        let bare = SafetyCheck { id: "sc_2".into(), code: None, message: None };
        assert_eq!(bare.reason(), "no reason given");
    }
}
