//! One handler per intent. Handlers never fail past their boundary: every internal problem
//! becomes a `success: false` response with a short French message and a distinct action tag.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use chantier_core::domain::context::AgentContext;
use chantier_core::domain::intent::{Intent, IntentResult};
use chantier_core::domain::response::AgentResponse;
use chantier_db::{DossierRepository, TranscriptRepository};

use crate::llm::LlmClient;
use crate::webhook::{SubAgent, SubAgentRequest};

pub mod correction;
pub mod devis;
pub mod dictation;
pub mod info;
pub mod readback;

pub use correction::CorrectionHandler;
pub use devis::DevisHandler;
pub use dictation::DictationHandler;
pub use info::InfoHandler;
pub use readback::ReadbackHandler;

pub const ACTION_NO_DOSSIER: &str = "erreur_pas_de_dossier";
pub const TTS_NO_DOSSIER: &str = "Selectionne un dossier d'abord.";

/// Everything a handler may need about the current turn.
#[derive(Clone, Copy, Debug)]
pub struct Turn<'a> {
    pub text: &'a str,
    pub dossier_id: &'a str,
    pub classification: &'a IntentResult,
    /// Previous turn, already filtered by the context TTL.
    pub context: Option<&'a AgentContext>,
    pub now_ms: i64,
}

impl Turn<'_> {
    pub fn has_dossier(&self) -> bool {
        !self.dossier_id.trim().is_empty()
    }

    pub fn entity(&self) -> Option<String> {
        self.classification.entity.clone()
    }

    pub fn next_context(&self, intent: Intent, entity: Option<String>) -> AgentContext {
        AgentContext::for_turn(intent, entity, self.text, self.dossier_id, self.now_ms)
    }

    pub(crate) fn sub_agent_request(
        &self,
        intent: Intent,
        entity: Option<String>,
    ) -> SubAgentRequest {
        SubAgentRequest {
            intent,
            text: self.text.to_string(),
            dossier_id: self.dossier_id.to_string(),
            entity: self.entity(),
            last_entity: self.context.and_then(|ctx| ctx.last_entity.clone()),
            last_transcription: self.context.and_then(|ctx| ctx.last_transcription.clone()),
            default_context: self.next_context(intent, entity),
        }
    }
}

pub(crate) fn missing_dossier(intent: Intent, message: &str) -> AgentResponse {
    AgentResponse::failure(intent, ACTION_NO_DOSSIER, message, TTS_NO_DOSSIER)
}

#[async_trait]
pub trait IntentHandler: Send + Sync {
    fn intent(&self) -> Intent;
    async fn handle(&self, turn: &Turn<'_>) -> AgentResponse;
}

/// Collaborators shared by the datastore- and LLM-backed handlers.
#[derive(Clone)]
pub struct HandlerDeps {
    pub transcripts: Arc<dyn TranscriptRepository>,
    pub dossiers: Arc<dyn DossierRepository>,
    pub llm: Option<Arc<dyn LlmClient>>,
    pub model: String,
    pub sub_agents: Arc<dyn SubAgent>,
    pub readback_tts_chars: usize,
}

#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<Intent, Box<dyn IntentHandler>>,
}

impl HandlerRegistry {
    /// All five intents wired to their local handlers.
    pub fn standard(deps: HandlerDeps) -> Self {
        let mut registry = Self::default();
        registry.register(DictationHandler);
        registry.register(ReadbackHandler::new(deps.clone()));
        registry.register(CorrectionHandler::new(deps.clone()));
        registry.register(DevisHandler);
        registry.register(InfoHandler::new(deps));
        registry
    }

    pub fn register<H>(&mut self, handler: H)
    where
        H: IntentHandler + 'static,
    {
        self.handlers.insert(handler.intent(), Box::new(handler));
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Route by the classified intent. Unregistered intents are treated as dictation.
    pub async fn dispatch(&self, turn: &Turn<'_>) -> AgentResponse {
        match self.handlers.get(&turn.classification.intent) {
            Some(handler) => handler.handle(turn).await,
            None => match self.handlers.get(&Intent::Dictation) {
                Some(handler) => handler.handle(turn).await,
                None => DictationHandler.handle(turn).await,
            },
        }
    }
}
