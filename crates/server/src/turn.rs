use std::sync::Arc;

use axum::{body::Bytes, extract::State, http::StatusCode, routing::post, Json, Router};
use chantier_agent::{AgentRuntime, TurnRequest};
use chantier_core::domain::intent::Intent;
use chantier_core::domain::response::AgentResponse;
use serde_json::Value;
use tracing::{error, info};

pub const ACTION_EMPTY_TEXT: &str = "erreur";
pub const ACTION_CRASH_FALLBACK: &str = "fallback_erreur";
const CRASH_TTS: &str = "Erreur agent, dictee sauvegardee.";

#[derive(Clone)]
pub struct TurnState {
    runtime: Arc<AgentRuntime>,
}

pub fn router(runtime: Arc<AgentRuntime>) -> Router {
    Router::new().route("/api/agent", post(handle_turn)).with_state(TurnState { runtime })
}

/// Reads the raw body so that a malformed request still yields its dictated text.
pub async fn handle_turn(
    State(state): State<TurnState>,
    body: Bytes,
) -> (StatusCode, Json<AgentResponse>) {
    let request = match serde_json::from_slice::<TurnRequest>(&body) {
        Ok(request) => request,
        Err(error) => {
            error!(
                event_name = "turn.malformed_body",
                error = %error,
                "turn body unreadable, salvaging dictated text"
            );
            return (StatusCode::OK, Json(crash_fallback(salvage_text(&body))));
        }
    };

    if request.text.trim().is_empty() {
        return (StatusCode::BAD_REQUEST, Json(empty_text()));
    }

    let text = request.text.clone();
    let runtime = state.runtime.clone();
    match tokio::spawn(async move { runtime.handle_turn(request).await }).await {
        Ok(response) => {
            info!(
                event_name = "turn.completed",
                intent = %response.intent,
                action = %response.action,
                success = response.success,
                "turn answered"
            );
            (StatusCode::OK, Json(response))
        }
        Err(error) => {
            error!(
                event_name = "turn.crashed",
                error = %error,
                "turn processing aborted, salvaging dictated text"
            );
            (StatusCode::OK, Json(crash_fallback(text)))
        }
    }
}

fn empty_text() -> AgentResponse {
    AgentResponse {
        success: false,
        intent: Intent::Dictation,
        action: ACTION_EMPTY_TEXT.to_string(),
        message: "Texte vide".to_string(),
        tts: None,
        data: None,
        context: None,
    }
}

/// Dictation must survive a crash: whatever text was sent comes back as a dictation.
fn crash_fallback(text: String) -> AgentResponse {
    AgentResponse::success(Intent::Dictation, ACTION_CRASH_FALLBACK, text).with_tts(CRASH_TTS)
}

fn salvage_text(body: &[u8]) -> String {
    serde_json::from_slice::<Value>(body)
        .ok()
        .and_then(|value| value.get("text").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use axum::{
        body::{Body, Bytes},
        extract::State,
        http::{Request, StatusCode},
        Json,
    };
    use chantier_agent::classifier::{IntentClassifier, DEFAULT_CONFIDENCE_FLOOR};
    use chantier_agent::guardrails::GuardrailPolicy;
    use chantier_agent::handlers::{HandlerDeps, HandlerRegistry};
    use chantier_agent::orchestrator::OrchestratorAdapter;
    use chantier_agent::webhook::WebhookSubAgents;
    use chantier_agent::AgentRuntime;
    use chantier_core::domain::context::ContextWindow;
    use chantier_core::domain::intent::Intent;
    use chantier_db::repositories::{InMemoryDossierRepository, InMemoryTranscriptRepository};
    use tower::ServiceExt;

    use super::{handle_turn, router, TurnState, ACTION_CRASH_FALLBACK, ACTION_EMPTY_TEXT};

    fn runtime() -> Arc<AgentRuntime> {
        let policy = GuardrailPolicy::default();
        let sub_agents =
            WebhookSubAgents::new(Default::default(), Duration::from_secs(1), policy.clone())
                .expect("sub-agents");
        let orchestrator = OrchestratorAdapter::new(None, Duration::from_secs(1), policy.clone())
            .expect("orchestrator");
        let handlers = HandlerRegistry::standard(HandlerDeps {
            transcripts: Arc::new(InMemoryTranscriptRepository::default()),
            dossiers: Arc::new(InMemoryDossierRepository::default()),
            llm: None,
            model: "fast-model".to_string(),
            sub_agents: Arc::new(sub_agents),
            readback_tts_chars: 500,
        });
        Arc::new(AgentRuntime::new(
            Arc::new(orchestrator),
            IntentClassifier::new(None, "fast-model", DEFAULT_CONFIDENCE_FLOOR),
            handlers,
            policy,
            ContextWindow::default(),
        ))
    }

    fn state() -> State<TurnState> {
        State(TurnState { runtime: runtime() })
    }

    #[tokio::test]
    async fn empty_text_is_the_only_bad_request() {
        let (status, Json(response)) =
            handle_turn(state(), Bytes::from_static(br#"{"text":"   ","dossierId":"rec1"}"#))
                .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(!response.success);
        assert_eq!(response.intent, Intent::Dictation);
        assert_eq!(response.action, ACTION_EMPTY_TEXT);
        assert_eq!(response.message, "Texte vide");
    }

    #[tokio::test]
    async fn missing_text_is_a_bad_request() {
        let body = Bytes::from_static(br#"{"dossierId":"rec1"}"#);
        let (status, _) = handle_turn(state(), body).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn malformed_body_salvages_the_text() {
        let body = br#"{"text":"salon 5 par 4","dossierId":42}"#;
        let (status, Json(response)) = handle_turn(state(), Bytes::from_static(body)).await;

        assert_eq!(status, StatusCode::OK);
        assert!(response.success);
        assert_eq!(response.intent, Intent::Dictation);
        assert_eq!(response.action, ACTION_CRASH_FALLBACK);
        assert_eq!(response.message, "salon 5 par 4");
        assert_eq!(response.tts.as_deref(), Some("Erreur agent, dictee sauvegardee."));
    }

    #[tokio::test]
    async fn unparseable_body_still_answers_with_empty_dictation() {
        let (status, Json(response)) =
            handle_turn(state(), Bytes::from_static(b"not json at all")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(response.action, ACTION_CRASH_FALLBACK);
        assert_eq!(response.message, "");
    }

    #[tokio::test]
    async fn local_path_is_flagged_over_http() {
        let request = Request::post("/api/agent")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"text":"Chambre 1, 3,50 par 2,80","dossierId":"rec1"}"#))
            .expect("request");

        let response = router(runtime()).oneshot(request).await.expect("response");
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.expect("body");
        let payload: serde_json::Value = serde_json::from_slice(&bytes).expect("json");
        assert_eq!(payload["success"], true);
        assert_eq!(payload["intent"], "dictation");
        assert_eq!(payload["message"], "Chambre 1, 3,50 par 2,80");
        assert_eq!(payload["data"]["_fallback"], true);
        assert_eq!(payload["data"]["_fallback_reason"], "orchestrator_unavailable");
        assert_eq!(payload["context"]["lastIntent"], "dictation");
    }

    #[tokio::test]
    async fn partial_client_context_does_not_derail_the_turn() {
        let body = br#"{"text":"relis tout ce qui a ete dicte","dossierId":"rec1",
            "context":{"lastIntent":"dictation","lastEntity":"salon"}}"#;
        let (status, Json(response)) = handle_turn(state(), Bytes::from_static(body)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(response.intent, Intent::Readback);
        assert_ne!(response.action, ACTION_CRASH_FALLBACK);
        let data = response.data.expect("data");
        assert_eq!(data["_bypass"], "readback");
    }
}
