use async_trait::async_trait;
use tracing::{info, warn};

use chantier_core::domain::dossier::{concatenate_texts, DossierId};
use chantier_core::domain::intent::Intent;
use chantier_core::domain::response::AgentResponse;
use chantier_core::text::truncate_chars;

use super::{missing_dossier, HandlerDeps, IntentHandler, Turn};
use crate::llm::CompletionRequest;
use crate::reply::ReplyVerdict;

pub const ACTION_READBACK: &str = "relecture";
pub const ACTION_NO_TRANSCRIPT: &str = "aucune_transcription";
pub const ACTION_DATASTORE_ERROR: &str = "erreur_airtable";

fn extraction_prompt(entity: &str) -> String {
    format!(
        "Tu es un assistant de chantier. Extrais uniquement la partie du texte qui concerne \
         \"{entity}\". Si tu ne trouves rien de specifique, retourne le texte complet. \
         Reponds directement avec le texte extrait, sans explication."
    )
}

/// Reads stored transcripts back, optionally narrowed to one entity by the LLM.
pub struct ReadbackHandler {
    deps: HandlerDeps,
}

impl ReadbackHandler {
    pub fn new(deps: HandlerDeps) -> Self {
        Self { deps }
    }

    /// Falls back to the full text when there is no model, no entity or no usable answer.
    async fn narrow_to_entity(&self, full_text: String, entity: Option<&str>) -> String {
        let (Some(llm), Some(entity)) = (&self.deps.llm, entity) else {
            return full_text;
        };

        let request = CompletionRequest {
            model: self.deps.model.clone(),
            system: extraction_prompt(entity),
            user: full_text.clone(),
            temperature: 0.1,
            max_tokens: 1000,
        };
        match llm.complete(request).await {
            Ok(extracted) if !extracted.trim().is_empty() => extracted.trim().to_string(),
            Ok(_) => full_text,
            Err(error) => {
                warn!(
                    event_name = "readback.extraction_failed",
                    entity,
                    error = %error,
                    "entity extraction failed, reading everything back"
                );
                full_text
            }
        }
    }
}

#[async_trait]
impl IntentHandler for ReadbackHandler {
    fn intent(&self) -> Intent {
        Intent::Readback
    }

    async fn handle(&self, turn: &Turn<'_>) -> AgentResponse {
        if !turn.has_dossier() {
            return missing_dossier(
                Intent::Readback,
                "Selectionne un dossier d'abord pour que je puisse relire.",
            );
        }

        let request = turn.sub_agent_request(Intent::Readback, turn.entity());
        if let ReplyVerdict::Accepted(response) = self.deps.sub_agents.delegate(&request).await {
            return response;
        }

        let dossier_id = DossierId(turn.dossier_id.to_string());
        let records = match self.deps.transcripts.list_for_dossier(&dossier_id).await {
            Ok(records) => records,
            Err(error) => {
                warn!(
                    event_name = "readback.datastore_failed",
                    dossier_id = %turn.dossier_id,
                    error = %error,
                    "could not load transcripts"
                );
                return AgentResponse::failure(
                    Intent::Readback,
                    ACTION_DATASTORE_ERROR,
                    "Erreur de lecture des transcriptions.",
                    "Erreur de lecture.",
                );
            }
        };

        let full_text = concatenate_texts(&records);
        if full_text.is_empty() {
            return AgentResponse::success(
                Intent::Readback,
                ACTION_NO_TRANSCRIPT,
                "Aucune transcription trouvee pour ce dossier.",
            )
            .with_tts("Je n'ai aucune transcription pour ce dossier.")
            .with_context(turn.next_context(Intent::Readback, turn.entity()));
        }

        let entity = turn.entity();
        let readback = self.narrow_to_entity(full_text, entity.as_deref()).await;
        info!(
            event_name = "readback.completed",
            dossier_id = %turn.dossier_id,
            transcripts = records.len(),
            narrowed = entity.is_some(),
            "transcripts read back"
        );

        let tts = truncate_chars(&readback, self.deps.readback_tts_chars);
        AgentResponse::success(Intent::Readback, ACTION_READBACK, readback)
            .with_tts(tts)
            .with_data("transcriptions_count", records.len())
            .with_context(turn.next_context(Intent::Readback, entity))
    }
}
