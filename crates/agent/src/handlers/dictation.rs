use async_trait::async_trait;

use serde_json::Value;

use chantier_core::domain::intent::Intent;
use chantier_core::domain::response::AgentResponse;

use super::{IntentHandler, Turn};

pub const ACTION_DICTATION: &str = "transcription_ajoutee";

/// Passthrough: the client appends the text to its running transcript. No backend call.
#[derive(Clone, Copy, Debug, Default)]
pub struct DictationHandler;

#[async_trait]
impl IntentHandler for DictationHandler {
    fn intent(&self) -> Intent {
        Intent::Dictation
    }

    async fn handle(&self, turn: &Turn<'_>) -> AgentResponse {
        let entity = turn.entity();
        AgentResponse::success(Intent::Dictation, ACTION_DICTATION, turn.text)
            .with_tts("Bien recu.")
            .with_data("entity", entity.clone().map_or(Value::Null, Value::String))
            .with_context(turn.next_context(Intent::Dictation, entity))
    }
}
