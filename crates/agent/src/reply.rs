//! Untrusted upstream replies (orchestrator and sub-agent webhooks) are parsed into either a
//! complete [`AgentResponse`] or an explicit [`Unavailability`], never a half-filled object.

use std::fmt;

use serde_json::{Map, Value};

use chantier_core::domain::context::AgentContext;
use chantier_core::domain::intent::Intent;
use chantier_core::domain::response::AgentResponse;
use chantier_core::text::{looks_like_json_object, truncate_chars};

use crate::guardrails::{GuardrailDecision, GuardrailPolicy};

pub const POLITE_ACKNOWLEDGEMENT: &str = "D'accord, c'est note.";
pub const ORCHESTRATOR_DEFAULT_ACTION: &str = "agent_distant";
pub const SUBAGENT_DEFAULT_ACTION: &str = "sous_agent";
pub const DEFAULT_TTS_CHARS: usize = 200;

/// Why an upstream tier was skipped. Always resolved by falling back, never shown to the user.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Unavailability {
    NotConfigured,
    Timeout,
    Transport(String),
    Status(u16),
    MalformedBody(String),
    InvalidShape(&'static str),
    ErrorContent { reason_code: &'static str },
}

impl Unavailability {
    /// Stable tag for log fields.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::NotConfigured => "not_configured",
            Self::Timeout => "timeout",
            Self::Transport(_) => "transport",
            Self::Status(_) => "status",
            Self::MalformedBody(_) => "malformed_body",
            Self::InvalidShape(_) => "invalid_shape",
            Self::ErrorContent { .. } => "error_content",
        }
    }
}

impl fmt::Display for Unavailability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotConfigured => f.write_str("no webhook configured"),
            Self::Timeout => f.write_str("request timed out"),
            Self::Transport(detail) => write!(f, "transport failure: {detail}"),
            Self::Status(status) => write!(f, "upstream answered with status {status}"),
            Self::MalformedBody(detail) => write!(f, "reply body is not JSON: {detail}"),
            Self::InvalidShape(detail) => write!(f, "reply has an invalid shape: {detail}"),
            Self::ErrorContent { reason_code } => {
                write!(f, "reply disguises an upstream failure ({reason_code})")
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum ReplyVerdict {
    Accepted(AgentResponse),
    Unavailable(Unavailability),
}

impl ReplyVerdict {
    pub fn accepted(self) -> Option<AgentResponse> {
        match self {
            Self::Accepted(response) => Some(response),
            Self::Unavailable(_) => None,
        }
    }
}

/// Fields common to both reply kinds, after shape and content screening.
struct ScreenedReply {
    fields: Map<String, Value>,
    intent_label: String,
    message: String,
}

fn screen(value: Value, policy: &GuardrailPolicy) -> Result<ScreenedReply, Unavailability> {
    let Value::Object(fields) = value else {
        return Err(Unavailability::InvalidShape("reply is not an object"));
    };
    let Some(intent_label) = fields.get("intent").and_then(Value::as_str).map(str::to_string)
    else {
        return Err(Unavailability::InvalidShape("`intent` is missing or not a string"));
    };
    let Some(message) = fields.get("message").and_then(Value::as_str).map(str::to_string) else {
        return Err(Unavailability::InvalidShape("`message` is missing or not a string"));
    };

    let action = fields.get("action").and_then(Value::as_str);
    if let GuardrailDecision::Reject { reason_code, .. } = policy.evaluate_reply(action, &message)
    {
        return Err(Unavailability::ErrorContent { reason_code });
    }

    Ok(ScreenedReply { fields, intent_label, message })
}

fn non_empty_str<'a>(fields: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    fields.get(key).and_then(Value::as_str).filter(|value| !value.trim().is_empty())
}

fn object(fields: &Map<String, Value>, key: &str) -> Option<Map<String, Value>> {
    fields.get(key).and_then(Value::as_object).cloned()
}

fn context_from(fields: &Map<String, Value>) -> Option<AgentContext> {
    fields
        .get("context")
        .filter(|value| value.is_object())
        .and_then(|value| serde_json::from_value(value.clone()).ok())
}

/// A `message` that is itself a full reply, one level deep at most.
fn unwrap_nested(message: &str) -> Option<Map<String, Value>> {
    if !looks_like_json_object(message) {
        return None;
    }
    serde_json::from_str::<Map<String, Value>>(message.trim())
        .ok()
        .filter(|inner| inner.contains_key("intent"))
}

/// Text shown to the user. A blank or JSON-shaped message gives way to `tts`, then to a
/// fixed acknowledgement.
fn spoken_message(message: String, tts: Option<&str>) -> String {
    if !message.trim().is_empty() && !looks_like_json_object(&message) {
        return message;
    }
    tts.filter(|tts| !tts.trim().is_empty() && !looks_like_json_object(tts))
        .unwrap_or(POLITE_ACKNOWLEDGEMENT)
        .to_string()
}

/// Validate and repair a main orchestrator reply.
pub fn accept_orchestrator_reply(
    value: Value,
    policy: &GuardrailPolicy,
    text: &str,
    dossier_id: &str,
    now_ms: i64,
) -> ReplyVerdict {
    let reply = match screen(value, policy) {
        Ok(reply) => reply,
        Err(reason) => return ReplyVerdict::Unavailable(reason),
    };
    let Ok(intent) = reply.intent_label.parse::<Intent>() else {
        return ReplyVerdict::Unavailable(Unavailability::InvalidShape("unknown intent label"));
    };

    let fields = reply.fields;
    let mut message = reply.message;
    let mut tts = non_empty_str(&fields, "tts").map(str::to_string);
    let mut data = object(&fields, "data");

    if let Some(inner) = unwrap_nested(&message) {
        let inner_tts = non_empty_str(&inner, "tts").map(str::to_string);
        message = match non_empty_str(&inner, "message") {
            Some(inner_message) => inner_message.to_string(),
            None => inner_tts.clone().unwrap_or_default(),
        };
        if inner_tts.is_some() {
            tts = inner_tts;
        }
        if let Some(inner_data) = object(&inner, "data") {
            data.get_or_insert_with(Map::new).extend(inner_data);
        }
    }

    let tts = tts.filter(|tts| !looks_like_json_object(tts));
    let message = spoken_message(message, tts.as_deref());
    let tts = tts.unwrap_or_else(|| truncate_chars(&message, DEFAULT_TTS_CHARS));
    let context = context_from(&fields)
        .unwrap_or_else(|| AgentContext::for_turn(intent, None, text, dossier_id, now_ms));

    ReplyVerdict::Accepted(AgentResponse {
        success: fields.get("success").and_then(Value::as_bool).unwrap_or(true),
        intent,
        action: non_empty_str(&fields, "action").unwrap_or(ORCHESTRATOR_DEFAULT_ACTION).to_string(),
        message,
        tts: Some(tts),
        data,
        context: Some(context),
    })
}

/// Validate a handler sub-agent reply. The handler owns the intent; only shape and error
/// content are checked.
pub fn accept_subagent_reply(
    value: Value,
    policy: &GuardrailPolicy,
    intent: Intent,
    default_context: AgentContext,
) -> ReplyVerdict {
    let reply = match screen(value, policy) {
        Ok(reply) => reply,
        Err(reason) => return ReplyVerdict::Unavailable(reason),
    };
    let fields = reply.fields;

    ReplyVerdict::Accepted(AgentResponse {
        success: fields.get("success").and_then(Value::as_bool).unwrap_or(true),
        intent,
        action: non_empty_str(&fields, "action").unwrap_or(SUBAGENT_DEFAULT_ACTION).to_string(),
        message: spoken_message(reply.message, non_empty_str(&fields, "tts")),
        tts: non_empty_str(&fields, "tts").map(str::to_string),
        data: object(&fields, "data"),
        context: Some(context_from(&fields).unwrap_or(default_context)),
    })
}
