use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domain::context::AgentContext;
use crate::domain::intent::Intent;

/// Marker the UI watches for in `data.trigger` to start quote generation.
pub const DEVIS_TRIGGER: &str = "generate-devis";

/// The single outbound contract of a turn.
///
/// Handlers, the orchestrator adapter and the crash path all produce this shape. `message` is
/// always user-facing text, never a serialized object.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AgentResponse {
    pub success: bool,
    pub intent: Intent,
    pub action: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tts: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<AgentContext>,
}

impl AgentResponse {
    pub fn success(intent: Intent, action: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            success: true,
            intent,
            action: action.into(),
            message: message.into(),
            tts: None,
            data: None,
            context: None,
        }
    }

    pub fn failure(
        intent: Intent,
        action: impl Into<String>,
        message: impl Into<String>,
        tts: impl Into<String>,
    ) -> Self {
        Self {
            success: false,
            intent,
            action: action.into(),
            message: message.into(),
            tts: Some(tts.into()),
            data: None,
            context: None,
        }
    }

    pub fn with_tts(mut self, tts: impl Into<String>) -> Self {
        self.tts = Some(tts.into());
        self
    }

    pub fn with_context(mut self, context: AgentContext) -> Self {
        self.context = Some(context);
        self
    }

    pub fn with_data(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.data.get_or_insert_with(Map::new).insert(key.to_string(), value.into());
        self
    }

    /// Shallow merge; keys already present are overwritten by `extra`.
    pub fn merge_data(&mut self, extra: Map<String, Value>) {
        let data = self.data.get_or_insert_with(Map::new);
        for (key, value) in extra {
            data.insert(key, value);
        }
    }
}
