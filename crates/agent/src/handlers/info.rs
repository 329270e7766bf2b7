use async_trait::async_trait;
use tracing::warn;

use chantier_core::domain::dossier::{concatenate_texts, Dossier, DossierId, TranscriptRecord};
use chantier_core::domain::intent::Intent;
use chantier_core::domain::response::AgentResponse;
use chantier_core::text::truncate_chars;

use super::{missing_dossier, HandlerDeps, IntentHandler, Turn};
use crate::llm::{CompletionRequest, LlmError};
use crate::reply::ReplyVerdict;

pub const ACTION_INFO: &str = "reponse_info";
pub const ACTION_RAW_INFO: &str = "info_brute";
pub const ACTION_LLM_ERROR: &str = "erreur_llm";
const TRANSCRIPT_PROMPT_CHARS: usize = 2000;

const INFO_SYSTEM_PROMPT: &str = "Tu es un assistant de chantier. Reponds factuellement et \
    brievement a la question de l'artisan en te basant UNIQUEMENT sur les donnees fournies. \
    Si tu ne trouves pas l'info, dis-le clairement.";

struct DossierFacts {
    nom: String,
    client: String,
    transcript_count: usize,
    photo_count: usize,
    text: String,
}

impl DossierFacts {
    fn new(dossier: Option<Dossier>, transcripts: &[TranscriptRecord]) -> Self {
        let (nom, client, photo_count) = match dossier {
            Some(dossier) => (dossier.nom, dossier.client, dossier.photo_count),
            None => (None, None, 0),
        };
        Self {
            nom: nom.unwrap_or_else(|| "?".to_string()),
            client: client.unwrap_or_else(|| "?".to_string()),
            transcript_count: transcripts.len(),
            photo_count,
            text: concatenate_texts(transcripts),
        }
    }

    fn summary(&self) -> String {
        format!(
            "Dossier: {}\nTranscriptions: {}\nPhotos: {}",
            self.nom, self.transcript_count, self.photo_count
        )
    }

    fn prompt(&self, question: &str) -> String {
        format!(
            "DONNEES DU DOSSIER:\nNom: {}\nClient: {}\nNombre de transcriptions: {}\n\
             Nombre de photos: {}\n\nTRANSCRIPTIONS:\n{}\n\nQUESTION: {question}",
            self.nom,
            self.client,
            self.transcript_count,
            self.photo_count,
            truncate_chars(&self.text, TRANSCRIPT_PROMPT_CHARS),
        )
    }
}

/// Answers questions about a dossier strictly from its stored data.
pub struct InfoHandler {
    deps: HandlerDeps,
}

impl InfoHandler {
    pub fn new(deps: HandlerDeps) -> Self {
        Self { deps }
    }

    /// Both reads run concurrently. A failed read degrades to "unknown" instead of failing.
    async fn load_facts(&self, dossier_id: &DossierId) -> DossierFacts {
        let (dossier, transcripts) = tokio::join!(
            self.deps.dossiers.find_by_id(dossier_id),
            self.deps.transcripts.list_for_dossier(dossier_id),
        );

        let dossier = dossier.unwrap_or_else(|error| {
            warn!(
                event_name = "info.dossier_unavailable",
                dossier_id = %dossier_id.as_str(),
                error = %error,
                "dossier metadata unavailable"
            );
            None
        });
        let transcripts = transcripts.unwrap_or_else(|error| {
            warn!(
                event_name = "info.transcripts_unavailable",
                dossier_id = %dossier_id.as_str(),
                error = %error,
                "transcripts unavailable"
            );
            Vec::new()
        });
        DossierFacts::new(dossier, &transcripts)
    }
}

#[async_trait]
impl IntentHandler for InfoHandler {
    fn intent(&self) -> Intent {
        Intent::Info
    }

    async fn handle(&self, turn: &Turn<'_>) -> AgentResponse {
        if !turn.has_dossier() {
            return missing_dossier(
                Intent::Info,
                "Selectionne un dossier pour que je puisse repondre.",
            );
        }

        let request = turn.sub_agent_request(Intent::Info, turn.entity());
        if let ReplyVerdict::Accepted(response) = self.deps.sub_agents.delegate(&request).await {
            return response;
        }

        let facts = self.load_facts(&DossierId(turn.dossier_id.to_string())).await;
        let context = turn.next_context(Intent::Info, turn.entity());

        let Some(llm) = &self.deps.llm else {
            let summary = facts.summary();
            return AgentResponse::success(Intent::Info, ACTION_RAW_INFO, summary.clone())
                .with_tts(summary)
                .with_context(context);
        };

        let request = CompletionRequest {
            model: self.deps.model.clone(),
            system: INFO_SYSTEM_PROMPT.to_string(),
            user: facts.prompt(turn.text),
            temperature: 0.2,
            max_tokens: 500,
        };
        let answer = match llm.complete(request).await {
            Ok(answer) => answer.trim().to_string(),
            Err(LlmError::EmptyCompletion) => "Pas de reponse.".to_string(),
            Err(error) => {
                warn!(
                    event_name = "info.llm_failed",
                    dossier_id = %turn.dossier_id,
                    error = %error,
                    "info answer failed"
                );
                return AgentResponse::failure(
                    Intent::Info,
                    ACTION_LLM_ERROR,
                    "Erreur lors de la recherche d'information.",
                    "Erreur lors de la recherche.",
                );
            }
        };

        let tts = truncate_chars(&answer, self.deps.readback_tts_chars);
        AgentResponse::success(Intent::Info, ACTION_INFO, answer)
            .with_tts(tts)
            .with_context(context)
    }
}
