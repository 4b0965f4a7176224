use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

pub const DEFAULT_SETTING_VALUE: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuerySettings {
    pub num_searches: u32,
    pub num_rewordings: u32,
}

impl Default for QuerySettings {
    fn default() -> Self {
        Self {
            num_searches: DEFAULT_SETTING_VALUE,
            num_rewordings: DEFAULT_SETTING_VALUE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundMessage {
    Query {
        content: String,
        settings: QuerySettings,
    },
}

impl OutboundMessage {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ProgressUpdate {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub step: Option<u32>,
    #[serde(default)]
    pub total: Option<u32>,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ResearchStep {
    #[serde(default)]
    pub step_number: Option<u32>,
    #[serde(default)]
    pub query: String,
    #[serde(default)]
    pub analysis: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct EvaluationMetrics {
    pub accuracy: f64,
    pub completeness: f64,
    pub relevance: f64,
    pub clarity: f64,
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Evaluation {
    pub overall_score: f64,
    pub metrics: EvaluationMetrics,
    #[serde(default)]
    pub reasoning: String,
    #[serde(default)]
    pub action: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ResearchResult {
    #[serde(default)]
    pub answer: String,
    #[serde(default)]
    pub research_steps: Vec<ResearchStep>,
    #[serde(default)]
    pub session_id: String,
    #[serde(default, alias = "evaluation")]
    pub evaluation_result: Option<Evaluation>,
}

impl ResearchResult {
    /// Step numbers as displayed; steps sent without one are numbered by position.
    pub fn numbered_steps(&self) -> impl Iterator<Item = (u32, &ResearchStep)> {
        self.research_steps
            .iter()
            .enumerate()
            .map(|(idx, step)| (step.step_number.unwrap_or(idx as u32 + 1), step))
    }
}

/// Every message kind the server can push. Anything that does not decode into one of the
/// named kinds is surfaced as `System` so the client keeps running.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundEvent {
    Progress(ProgressUpdate),
    Result(Box<ResearchResult>),
    Error(String),
    ResearchStep(String),
    SearchResult(String),
    Thinking(String),
    System(String),
}

impl InboundEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Result(_) | Self::Error(_))
    }
}

pub fn parse_inbound(text: &str) -> InboundEvent {
    let value: Value = match serde_json::from_str(text) {
        Ok(value) => value,
        Err(err) => {
            warn!(error = %err, "inbound frame is not JSON");
            return InboundEvent::System(text.to_string());
        }
    };
    let Value::Object(mut object) = value else {
        warn!("inbound frame is not a JSON object");
        return InboundEvent::System(text.to_string());
    };
    let kind = match object.remove("type") {
        Some(Value::String(kind)) => kind,
        _ => {
            warn!("inbound frame has no type tag");
            return InboundEvent::System(payload_text(take_payload(object)));
        }
    };
    let payload = take_payload(object);
    debug!(kind = %kind, "inbound frame");

    match kind.as_str() {
        "progress" => match serde_json::from_value::<ProgressUpdate>(payload.clone()) {
            Ok(update) => InboundEvent::Progress(update),
            Err(err) => {
                warn!(error = %err, "progress payload did not decode");
                InboundEvent::System(payload_text(payload))
            }
        },
        "result" => match serde_json::from_value::<ResearchResult>(payload.clone()) {
            Ok(result) => InboundEvent::Result(Box::new(result)),
            Err(err) => {
                warn!(error = %err, "result payload did not decode");
                InboundEvent::System(payload_text(payload))
            }
        },
        "error" => InboundEvent::Error(error_text(payload)),
        "research_step" => InboundEvent::ResearchStep(payload_text(payload)),
        "search_result" => InboundEvent::SearchResult(payload_text(payload)),
        "thinking" => InboundEvent::Thinking(payload_text(payload)),
        other => {
            warn!(kind = %other, "unrecognized inbound message type");
            InboundEvent::System(payload_text(payload))
        }
    }
}

// `{type, content}` is the documented envelope; older servers put the fields at top level.
fn take_payload(mut object: Map<String, Value>) -> Value {
    match object.remove("content") {
        Some(content) => content,
        None if object.is_empty() => Value::Null,
        None => Value::Object(object),
    }
}

fn payload_text(payload: Value) -> String {
    match payload {
        Value::String(text) if !text.is_empty() => text,
        Value::Null | Value::String(_) => "Unknown message type".to_string(),
        Value::Object(ref object) => match object.get("message").and_then(Value::as_str) {
            Some(message) => message.to_string(),
            None => payload.to_string(),
        },
        other => other.to_string(),
    }
}

fn error_text(payload: Value) -> String {
    match payload {
        Value::String(text) => text,
        Value::Object(object) => object
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| Value::Object(object).to_string()),
        Value::Null => "Unknown error".to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
#[path = "../tests/unit/protocol_tests.rs"]
mod tests;
