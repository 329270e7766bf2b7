use async_trait::async_trait;
use tracing::{error, info};

use chantier_core::domain::dossier::{DossierId, NewTranscript};
use chantier_core::domain::intent::Intent;
use chantier_core::domain::response::AgentResponse;

use super::{missing_dossier, HandlerDeps, IntentHandler, Turn};
use crate::reply::ReplyVerdict;

pub const ACTION_CORRECTION: &str = "correction_enregistree";
pub const ACTION_SAVE_ERROR: &str = "erreur_sauvegarde";

/// Appends a correction row for later human review. Existing rows are never rewritten.
pub struct CorrectionHandler {
    deps: HandlerDeps,
}

impl CorrectionHandler {
    pub fn new(deps: HandlerDeps) -> Self {
        Self { deps }
    }
}

#[async_trait]
impl IntentHandler for CorrectionHandler {
    fn intent(&self) -> Intent {
        Intent::Correction
    }

    async fn handle(&self, turn: &Turn<'_>) -> AgentResponse {
        if !turn.has_dossier() {
            return missing_dossier(
                Intent::Correction,
                "Selectionne un dossier pour enregistrer la correction.",
            );
        }

        let previous_entity = turn.context.and_then(|ctx| ctx.last_entity.clone());
        let entity = turn.entity().or_else(|| previous_entity.clone());

        let request = turn.sub_agent_request(Intent::Correction, entity.clone());
        if let ReplyVerdict::Accepted(response) = self.deps.sub_agents.delegate(&request).await {
            return response;
        }

        let row = NewTranscript::correction(
            DossierId(turn.dossier_id.to_string()),
            previous_entity.as_deref(),
            turn.text,
        );
        let saved = match self.deps.transcripts.append(row).await {
            Ok(saved) => saved,
            Err(err) => {
                error!(
                    event_name = "correction.save_failed",
                    dossier_id = %turn.dossier_id,
                    error = %err,
                    "correction could not be saved"
                );
                return AgentResponse::failure(
                    Intent::Correction,
                    ACTION_SAVE_ERROR,
                    "Erreur lors de la sauvegarde de la correction.",
                    "Erreur de sauvegarde.",
                );
            }
        };

        info!(
            event_name = "correction.saved",
            dossier_id = %turn.dossier_id,
            transcript_id = %saved.id,
            "correction stored for review"
        );
        AgentResponse::success(
            Intent::Correction,
            ACTION_CORRECTION,
            format!("Correction enregistree : \"{}\". En attente de validation.", turn.text),
        )
        .with_tts("Correction enregistree. En attente de validation.")
        .with_data("transcription_id", saved.id)
        .with_context(turn.next_context(Intent::Correction, entity))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chantier_core::domain::context::AgentContext;
    use chantier_core::domain::dossier::TranscriptStatus;
    use chantier_core::domain::intent::Intent;
    use chantier_core::domain::response::AgentResponse;
    use chantier_db::repositories::DisabledDatastore;

    use super::{CorrectionHandler, ACTION_CORRECTION, ACTION_SAVE_ERROR};
    use crate::handlers::testing::{classification, transcript, FixedSubAgent, Fixture, NOW};
    use crate::handlers::{IntentHandler, Turn};
    use crate::reply::ReplyVerdict;

    fn previous() -> AgentContext {
        AgentContext::for_turn(
            Intent::Dictation,
            Some("salon".to_string()),
            "salon 5 par 4",
            "rec1",
            NOW - 1_000,
        )
    }

    #[tokio::test]
    async fn appends_a_correction_row_without_touching_the_original() {
        let original = transcript("t1", "rec1", "salon 5 par 4");
        let fixture = Fixture::with_transcripts(vec![original.clone()]);
        let handler = CorrectionHandler::new(fixture.deps(None));
        let result = classification(Intent::Correction, None);
        let ctx = previous();
        let turn = Turn {
            text: "non, 4 par 4",
            dossier_id: "rec1",
            classification: &result,
            context: Some(&ctx),
            now_ms: NOW,
        };

        let response = handler.handle(&turn).await;
        assert!(response.success);
        assert_eq!(response.action, ACTION_CORRECTION);
        assert_eq!(
            response.message,
            "Correction enregistree : \"non, 4 par 4\". En attente de validation."
        );
        assert_eq!(response.context.expect("context").last_entity.as_deref(), Some("salon"));

        let rows = fixture.transcripts.snapshot().await;
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0], original);
        assert_eq!(rows[1].statut, Some(TranscriptStatus::Correction));
        assert_eq!(rows[1].titre.as_deref(), Some("Correction — salon"));
        assert_eq!(response.data.expect("data")["transcription_id"], rows[1].id.as_str());
    }

    #[tokio::test]
    async fn save_failure_is_a_soft_error() {
        let fixture = Fixture::with_transcripts(Vec::new());
        let mut deps = fixture.deps(None);
        deps.transcripts = Arc::new(DisabledDatastore);
        let result = classification(Intent::Correction, None);
        let ctx = previous();
        let turn = Turn {
            text: "non, 4 par 4",
            dossier_id: "rec1",
            classification: &result,
            context: Some(&ctx),
            now_ms: NOW,
        };

        let response = CorrectionHandler::new(deps).handle(&turn).await;
        assert!(!response.success);
        assert_eq!(response.action, ACTION_SAVE_ERROR);
    }

    #[tokio::test]
    async fn accepted_sub_agent_reply_skips_local_write() {
        let mut fixture = Fixture::with_transcripts(Vec::new());
        let remote = AgentResponse::success(Intent::Correction, "correction_distante", "Corrige.");
        fixture.sub_agents = Arc::new(FixedSubAgent::answering(ReplyVerdict::Accepted(remote)));
        let handler = CorrectionHandler::new(fixture.deps(None));
        let result = classification(Intent::Correction, Some("salon"));
        let ctx = previous();
        let turn = Turn {
            text: "non, 4 par 4",
            dossier_id: "rec1",
            classification: &result,
            context: Some(&ctx),
            now_ms: NOW,
        };

        let response = handler.handle(&turn).await;
        assert_eq!(response.action, "correction_distante");
        assert!(fixture.transcripts.snapshot().await.is_empty());
        let requests = fixture.sub_agents.requests();
        assert_eq!(requests[0].last_transcription.as_deref(), Some("salon 5 par 4"));
    }
}
