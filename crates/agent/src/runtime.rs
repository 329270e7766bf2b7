use std::sync::Arc;

use serde::{Deserialize, Deserializer};
use serde_json::{json, Map, Value};
use thiserror::Error;
use tracing::{error, info, warn};

use chantier_core::config::AppConfig;
use chantier_core::domain::context::{now_ms, AgentContext, ContextWindow};
use chantier_core::domain::intent::{Intent, IntentResult};
use chantier_core::domain::response::AgentResponse;
use chantier_core::text::truncate_chars;
use chantier_db::DatastoreRepositories;

use crate::classifier::IntentClassifier;
use crate::guardrails::GuardrailPolicy;
use crate::handlers::{HandlerDeps, HandlerRegistry, Turn};
use crate::llm::{LlmClient, LlmError, OpenAiCompatibleClient};
use crate::orchestrator::{OrchestratorAdapter, TurnDelegate};
use crate::reply::ReplyVerdict;
use crate::webhook::WebhookSubAgents;

pub const FALLBACK_REASON: &str = "orchestrator_unavailable";
const LOGGED_TEXT_CHARS: usize = 80;

/// Inbound turn, as posted by the client.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnRequest {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub dossier_id: Option<String>,
    #[serde(default, deserialize_with = "usable_context")]
    pub context: Option<AgentContext>,
}

/// Client-held context is untrusted; one that does not parse counts as absent.
fn usable_context<'de, D>(deserializer: D) -> Result<Option<AgentContext>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(|value| match serde_json::from_value(value) {
        Ok(context) => Some(context),
        Err(error) => {
            warn!(
                event_name = "turn.context_discarded",
                error = %error,
                "unreadable client context treated as absent"
            );
            None
        }
    }))
}

#[derive(Debug, Error)]
pub enum RuntimeBuildError {
    #[error("failed to build http client: {0}")]
    Http(#[from] reqwest::Error),
    #[error(transparent)]
    Llm(#[from] LlmError),
}

/// Per-turn routing: readback bypass, then the remote orchestrator, then the local
/// classifier and handlers.
pub struct AgentRuntime {
    orchestrator: Arc<dyn TurnDelegate>,
    classifier: IntentClassifier,
    handlers: HandlerRegistry,
    policy: GuardrailPolicy,
    context_window: ContextWindow,
}

impl AgentRuntime {
    pub fn new(
        orchestrator: Arc<dyn TurnDelegate>,
        classifier: IntentClassifier,
        handlers: HandlerRegistry,
        policy: GuardrailPolicy,
        context_window: ContextWindow,
    ) -> Self {
        Self { orchestrator, classifier, handlers, policy, context_window }
    }

    pub fn from_config(
        config: &AppConfig,
        repositories: &DatastoreRepositories,
    ) -> Result<Self, RuntimeBuildError> {
        let policy = GuardrailPolicy::default();
        let llm = OpenAiCompatibleClient::from_config(&config.llm, false)?
            .map(|client| Arc::new(client) as Arc<dyn LlmClient>);

        let orchestrator = OrchestratorAdapter::from_config(&config.orchestrator, policy.clone())?;
        let sub_agents = WebhookSubAgents::from_config(&config.orchestrator, policy.clone())?;
        let classifier = IntentClassifier::new(
            llm.clone(),
            config.llm.model.clone(),
            config.agent.confidence_floor,
        );
        let handlers = HandlerRegistry::standard(HandlerDeps {
            transcripts: repositories.transcripts.clone(),
            dossiers: repositories.dossiers.clone(),
            llm,
            model: config.llm.model.clone(),
            sub_agents: Arc::new(sub_agents),
            readback_tts_chars: config.agent.readback_tts_chars,
        });

        Ok(Self::new(
            Arc::new(orchestrator),
            classifier,
            handlers,
            policy,
            config.agent.context_window(),
        ))
    }

    pub async fn handle_turn(&self, request: TurnRequest) -> AgentResponse {
        self.handle_turn_at(request, now_ms()).await
    }

    pub async fn handle_turn_at(&self, request: TurnRequest, now_ms: i64) -> AgentResponse {
        let text = request.text.trim();
        let dossier_id = request.dossier_id.as_deref().unwrap_or_default().trim();
        let context = self.context_window.resolve_at(request.context, now_ms);

        if self.policy.is_readback_request(text) {
            let classification = IntentResult::certain(Intent::Readback, "readback bypass");
            let turn = Turn {
                text,
                dossier_id,
                classification: &classification,
                context: context.as_ref(),
                now_ms,
            };
            let mut response = self.handlers.dispatch(&turn).await;
            response.merge_data(flags(&[("_bypass", json!("readback"))]));
            info!(
                event_name = "turn.readback_bypass",
                dossier_id,
                action = %response.action,
                "readback routed locally without the orchestrator"
            );
            return response;
        }

        let verdict = self.orchestrator.attempt(text, dossier_id).await;
        if let ReplyVerdict::Accepted(response) = verdict {
            return response;
        }

        error!(
            event_name = "turn.local_fallback",
            dossier_id,
            text = %truncate_chars(text, LOGGED_TEXT_CHARS),
            "ORCHESTRATOR UNAVAILABLE, local fallback active"
        );
        let classification = self.classifier.classify(text, context.as_ref()).await;
        info!(
            event_name = "turn.classified",
            intent = %classification.intent,
            confidence = classification.confidence,
            entity = classification.entity.as_deref().unwrap_or_default(),
            "local classification"
        );

        let turn = Turn {
            text,
            dossier_id,
            classification: &classification,
            context: context.as_ref(),
            now_ms,
        };
        let mut response = self.handlers.dispatch(&turn).await;
        response.merge_data(flags(&[
            ("_fallback", json!(true)),
            ("_fallback_reason", json!(FALLBACK_REASON)),
        ]));
        response
    }
}

fn flags(entries: &[(&str, Value)]) -> Map<String, Value> {
    entries.iter().map(|(key, value)| (key.to_string(), value.clone())).collect()
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;

    use chantier_core::domain::context::{AgentContext, ContextWindow};
    use chantier_core::domain::intent::Intent;
    use chantier_core::domain::response::AgentResponse;

    use super::{AgentRuntime, TurnRequest, FALLBACK_REASON};
    use crate::classifier::{IntentClassifier, DEFAULT_CONFIDENCE_FLOOR};
    use crate::guardrails::GuardrailPolicy;
    use crate::handlers::testing::{transcript, Fixture, NOW};
    use crate::handlers::HandlerRegistry;
    use crate::llm::testing::ScriptedLlm;
    use crate::orchestrator::TurnDelegate;
    use crate::reply::{ReplyVerdict, Unavailability};

    struct CountingDelegate {
        calls: AtomicUsize,
        verdict: ReplyVerdict,
    }

    impl CountingDelegate {
        fn new(verdict: ReplyVerdict) -> Self {
            Self { calls: AtomicUsize::new(0), verdict }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl TurnDelegate for CountingDelegate {
        async fn attempt(&self, _text: &str, _dossier_id: &str) -> ReplyVerdict {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.verdict.clone()
        }
    }

    fn unavailable() -> Arc<CountingDelegate> {
        Arc::new(CountingDelegate::new(ReplyVerdict::Unavailable(Unavailability::Timeout)))
    }

    fn runtime(
        fixture: &Fixture,
        orchestrator: Arc<CountingDelegate>,
        llm: Option<Arc<ScriptedLlm>>,
    ) -> AgentRuntime {
        let llm = llm.map(|llm| llm as Arc<dyn crate::llm::LlmClient>);
        AgentRuntime::new(
            orchestrator,
            IntentClassifier::new(llm.clone(), "fast-model", DEFAULT_CONFIDENCE_FLOOR),
            HandlerRegistry::standard(fixture.deps(llm)),
            GuardrailPolicy::default(),
            ContextWindow::new(Duration::from_secs(300)),
        )
    }

    fn request(text: &str, context: Option<AgentContext>) -> TurnRequest {
        TurnRequest { text: text.to_string(), dossier_id: Some("rec1".to_string()), context }
    }

    #[tokio::test]
    async fn readback_request_never_reaches_the_orchestrator() {
        let long = "Chambre 1, 3,50 par 2,80, hauteur 2,48, enduit a reprendre. ".repeat(20);
        let fixture = Fixture::with_transcripts(vec![transcript("t1", "rec1", &long)]);
        let orchestrator = unavailable();
        let runtime = runtime(&fixture, orchestrator.clone(), None);

        let response =
            runtime.handle_turn_at(request("relis tout ce qui a été dicté", None), NOW).await;

        assert_eq!(orchestrator.calls(), 0);
        assert!(response.success);
        assert_eq!(response.intent, Intent::Readback);
        assert!(response.tts.as_ref().is_some_and(|tts| tts.chars().count() <= 500));
        let data = response.data.expect("data");
        assert_eq!(data["_bypass"], "readback");
        assert!(data.get("_fallback").is_none());
    }

    #[tokio::test]
    async fn accepted_orchestrator_reply_is_returned_unchanged() {
        let fixture = Fixture::with_transcripts(Vec::new());
        let remote = AgentResponse::success(Intent::Info, "agent_distant", "Il y a 3 photos.");
        let orchestrator =
            Arc::new(CountingDelegate::new(ReplyVerdict::Accepted(remote.clone())));
        let llm = Arc::new(ScriptedLlm::default());
        let runtime = runtime(&fixture, orchestrator.clone(), Some(llm.clone()));

        let response = runtime.handle_turn_at(request("combien de photos", None), NOW).await;

        assert_eq!(response, remote);
        assert_eq!(orchestrator.calls(), 1);
        assert!(llm.requests().is_empty());
    }

    #[tokio::test]
    async fn unavailable_orchestrator_falls_back_and_flags_the_response() {
        let fixture = Fixture::with_transcripts(Vec::new());
        let orchestrator = unavailable();
        let llm = Arc::new(ScriptedLlm::replying(&[
            r#"{"intent":"devis","confidence":0.95,"entity":null,"reasoning":"devis"}"#,
        ]));
        let runtime = runtime(&fixture, orchestrator.clone(), Some(llm));

        let response = runtime.handle_turn_at(request("genere le devis", None), NOW).await;

        assert_eq!(orchestrator.calls(), 1);
        assert_eq!(response.intent, Intent::Devis);
        let data = response.data.expect("data");
        assert_eq!(data["_fallback"], true);
        assert_eq!(data["_fallback_reason"], FALLBACK_REASON);
        assert_eq!(data["trigger"], "generate-devis");
    }

    #[tokio::test]
    async fn expired_context_is_treated_as_absent() {
        let fixture = Fixture::with_transcripts(Vec::new());
        let reply = r#"{"intent":"correction","confidence":0.95,"entity":"salon","reasoning":"c"}"#;
        let stale = AgentContext::for_turn(
            Intent::Dictation,
            Some("salon".to_string()),
            "salon 5 par 4",
            "rec1",
            NOW - 5 * 60_000 - 1,
        );

        let llm = Arc::new(ScriptedLlm::replying(&[reply]));
        let response = runtime(&fixture, unavailable(), Some(llm.clone()))
            .handle_turn_at(request("non en fait 4 par 4", Some(stale.clone())), NOW)
            .await;
        assert_eq!(response.intent, Intent::Dictation);
        assert!(!llm.requests()[0].system.contains("CONTEXTE PRECEDENT"));
        assert!(fixture.transcripts.snapshot().await.is_empty());

        let fresh = AgentContext { timestamp_ms: NOW - 60_000, ..stale };
        let llm = Arc::new(ScriptedLlm::replying(&[reply]));
        let response = runtime(&fixture, unavailable(), Some(llm))
            .handle_turn_at(request("non en fait 4 par 4", Some(fresh)), NOW)
            .await;
        assert_eq!(response.intent, Intent::Correction);
        assert_eq!(fixture.transcripts.snapshot().await.len(), 1);
    }

    #[tokio::test]
    async fn dimensions_without_request_are_dictated() {
        let fixture = Fixture::with_transcripts(Vec::new());
        let runtime = runtime(&fixture, unavailable(), None);
        let text = "Chambre 1, trois mètres cinquante par deux mètres quatre-vingts, \
                    hauteur deux mètres quarante-huit";

        let response = runtime.handle_turn_at(request(text, None), NOW).await;

        assert!(response.success);
        assert_eq!(response.intent, Intent::Dictation);
        assert_eq!(response.message, text);
        let context = response.context.expect("context");
        assert_eq!(context.last_intent, Some(Intent::Dictation));
        assert_eq!(context.timestamp_ms, NOW);
    }

    #[tokio::test]
    async fn request_text_is_trimmed_before_routing() {
        let fixture = Fixture::with_transcripts(Vec::new());
        let runtime = runtime(&fixture, unavailable(), None);
        let response = runtime.handle_turn_at(request("  salon 5 par 4 \n", None), NOW).await;
        assert_eq!(response.message, "salon 5 par 4");
    }

    #[test]
    fn turn_request_uses_client_field_names() {
        let parsed: TurnRequest = serde_json::from_str(
            r#"{"text":"salon","dossierId":"rec1","context":null}"#,
        )
        .expect("parse");
        assert_eq!(parsed.dossier_id.as_deref(), Some("rec1"));
        assert_eq!(parsed.context, None);
    }

    #[test]
    fn unreadable_context_is_dropped_not_rejected() {
        let parsed: TurnRequest = serde_json::from_str(
            r#"{"text":"relis le salon","dossierId":"rec1",
                "context":{"lastIntent":"dictation","lastEntity":"salon"}}"#,
        )
        .expect("partial context must not reject the turn");
        assert_eq!(parsed.text, "relis le salon");
        assert_eq!(parsed.context, None);

        let parsed: TurnRequest =
            serde_json::from_str(r#"{"text":"salon","context":"not-a-context"}"#).expect("parse");
        assert_eq!(parsed.context, None);
    }

    #[tokio::test]
    async fn readback_with_unreadable_context_is_still_routed() {
        let fixture = Fixture::with_transcripts(vec![transcript("t1", "rec1", "Salon 5 par 4")]);
        let orchestrator = unavailable();
        let runtime = runtime(&fixture, orchestrator.clone(), None);
        let request: TurnRequest = serde_json::from_str(
            r#"{"text":"relis tout ce qui a ete dicte","dossierId":"rec1",
                "context":{"lastIntent":"dictation","lastEntity":"salon"}}"#,
        )
        .expect("parse");

        let response = runtime.handle_turn_at(request, NOW).await;

        assert_eq!(orchestrator.calls(), 0);
        assert_eq!(response.intent, Intent::Readback);
        assert!(response.message.contains("Salon 5 par 4"));
    }
}
