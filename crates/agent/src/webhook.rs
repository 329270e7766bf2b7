use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::{debug, warn};

use chantier_core::config::OrchestratorConfig;
use chantier_core::domain::context::AgentContext;
use chantier_core::domain::intent::Intent;

use crate::guardrails::GuardrailPolicy;
use crate::reply::{accept_subagent_reply, ReplyVerdict, Unavailability};

/// POST a JSON payload and return the decoded JSON body of a 2xx answer.
///
/// Every failure mode is an [`Unavailability`]; the client timeout counts as one too.
pub(crate) async fn post_json(
    http: &Client,
    url: &str,
    payload: &Value,
) -> Result<Value, Unavailability> {
    let response = http.post(url).json(payload).send().await.map_err(|error| {
        if error.is_timeout() {
            Unavailability::Timeout
        } else {
            Unavailability::Transport(error.to_string())
        }
    })?;

    let status = response.status();
    if !status.is_success() {
        return Err(Unavailability::Status(status.as_u16()));
    }

    response.json::<Value>().await.map_err(|error| {
        if error.is_timeout() {
            Unavailability::Timeout
        } else {
            Unavailability::MalformedBody(error.to_string())
        }
    })
}

/// What a handler hands to its specialised remote agent.
#[derive(Clone, Debug, PartialEq)]
pub struct SubAgentRequest {
    pub intent: Intent,
    pub text: String,
    pub dossier_id: String,
    pub entity: Option<String>,
    pub last_entity: Option<String>,
    pub last_transcription: Option<String>,
    /// Context to attach when the remote agent does not return one.
    pub default_context: AgentContext,
}

impl SubAgentRequest {
    fn payload(&self) -> Value {
        let mut payload = json!({
            "text": self.text,
            "dossierId": self.dossier_id,
            "entity": self.entity,
        });
        if self.intent == Intent::Correction {
            payload["lastEntity"] = json!(self.last_entity);
            payload["lastTranscription"] = json!(self.last_transcription);
        }
        payload
    }
}

#[async_trait]
pub trait SubAgent: Send + Sync {
    async fn delegate(&self, request: &SubAgentRequest) -> ReplyVerdict;
}

/// Sub-agents reached over HTTP webhooks, one optional URL per intent.
pub struct WebhookSubAgents {
    http: Client,
    urls: HashMap<Intent, String>,
    policy: GuardrailPolicy,
}

impl WebhookSubAgents {
    pub fn new(
        urls: HashMap<Intent, String>,
        timeout: Duration,
        policy: GuardrailPolicy,
    ) -> Result<Self, reqwest::Error> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self { http, urls, policy })
    }

    pub fn from_config(
        config: &OrchestratorConfig,
        policy: GuardrailPolicy,
    ) -> Result<Self, reqwest::Error> {
        let urls = Intent::ALL
            .iter()
            .filter_map(|intent| {
                config.subagent_url(*intent).map(|url| (*intent, url.to_string()))
            })
            .collect();
        Self::new(urls, config.subagent_timeout(), policy)
    }

    pub fn configured_intents(&self) -> Vec<Intent> {
        let mut intents: Vec<_> = self.urls.keys().copied().collect();
        intents.sort_by_key(|intent| intent.as_str());
        intents
    }
}

#[async_trait]
impl SubAgent for WebhookSubAgents {
    async fn delegate(&self, request: &SubAgentRequest) -> ReplyVerdict {
        let Some(url) = self.urls.get(&request.intent) else {
            return ReplyVerdict::Unavailable(Unavailability::NotConfigured);
        };

        debug!(
            event_name = "subagent.request",
            intent = %request.intent,
            dossier_id = %request.dossier_id,
            "delegating to sub-agent webhook"
        );
        let verdict = match post_json(&self.http, url, &request.payload()).await {
            Ok(body) => accept_subagent_reply(
                body,
                &self.policy,
                request.intent,
                request.default_context.clone(),
            ),
            Err(reason) => ReplyVerdict::Unavailable(reason),
        };

        if let ReplyVerdict::Unavailable(reason) = &verdict {
            warn!(
                event_name = "subagent.unavailable",
                intent = %request.intent,
                reason = reason.reason(),
                detail = %reason,
                "sub-agent unavailable, using local handler"
            );
        }
        verdict
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::time::Duration;

    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use chantier_core::domain::context::AgentContext;
    use chantier_core::domain::intent::Intent;

    use super::{SubAgent, SubAgentRequest, WebhookSubAgents};
    use crate::guardrails::GuardrailPolicy;
    use crate::reply::{ReplyVerdict, Unavailability};

    fn request(intent: Intent) -> SubAgentRequest {
        SubAgentRequest {
            intent,
            text: "non, le salon fait 4 par 4".to_string(),
            dossier_id: "rec1".to_string(),
            entity: Some("salon".to_string()),
            last_entity: Some("salon".to_string()),
            last_transcription: Some("salon 5 par 4".to_string()),
            default_context: AgentContext::for_turn(intent, None, "x", "rec1", 1),
        }
    }

    fn agents(server: &MockServer, timeout: Duration) -> WebhookSubAgents {
        let urls = HashMap::from([
            (Intent::Correction, format!("{}/hooks/correction", server.uri())),
            (Intent::Info, format!("{}/hooks/info", server.uri())),
        ]);
        WebhookSubAgents::new(urls, timeout, GuardrailPolicy::default()).expect("client")
    }

    #[tokio::test]
    async fn correction_payload_carries_previous_turn() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/hooks/correction"))
            .and(body_partial_json(json!({
                "dossierId": "rec1",
                "lastEntity": "salon",
                "lastTranscription": "salon 5 par 4"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "intent": "correction",
                "action": "correction_enregistree",
                "message": "Correction notee."
            })))
            .expect(1)
            .mount(&server)
            .await;

        let subagents = agents(&server, Duration::from_secs(5));
        let response =
            subagents.delegate(&request(Intent::Correction)).await.accepted().expect("accepted");
        assert_eq!(response.intent, Intent::Correction);
        assert_eq!(response.action, "correction_enregistree");
    }

    #[tokio::test]
    async fn missing_url_is_not_configured() {
        let server = MockServer::start().await;
        let verdict =
            agents(&server, Duration::from_secs(5)).delegate(&request(Intent::Readback)).await;
        assert_eq!(verdict, ReplyVerdict::Unavailable(Unavailability::NotConfigured));
    }

    #[tokio::test]
    async fn non_success_status_is_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let subagents = agents(&server, Duration::from_secs(5));
        let verdict = subagents.delegate(&request(Intent::Info)).await;
        assert_eq!(verdict, ReplyVerdict::Unavailable(Unavailability::Status(500)));
    }

    #[tokio::test]
    async fn slow_webhook_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_delay(Duration::from_millis(500))
                    .set_body_json(json!({"intent": "info", "message": "trop tard"})),
            )
            .mount(&server)
            .await;

        let verdict =
            agents(&server, Duration::from_millis(50)).delegate(&request(Intent::Info)).await;
        assert_eq!(verdict, ReplyVerdict::Unavailable(Unavailability::Timeout));
    }

    #[tokio::test]
    async fn non_json_body_is_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let subagents = agents(&server, Duration::from_secs(5));
        let verdict = subagents.delegate(&request(Intent::Info)).await;
        assert!(matches!(verdict, ReplyVerdict::Unavailable(Unavailability::MalformedBody(_))));
    }
}
