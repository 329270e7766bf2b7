use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use tracing::{info, warn};

use chantier_core::config::OrchestratorConfig;
use chantier_core::domain::context::now_ms;

use crate::guardrails::GuardrailPolicy;
use crate::reply::{accept_orchestrator_reply, ReplyVerdict, Unavailability};
use crate::webhook::post_json;

/// The first tier of a turn: a remote agent that may answer the whole turn.
#[async_trait]
pub trait TurnDelegate: Send + Sync {
    async fn attempt(&self, text: &str, dossier_id: &str) -> ReplyVerdict;
}

pub struct OrchestratorAdapter {
    http: Client,
    url: Option<String>,
    policy: GuardrailPolicy,
}

impl OrchestratorAdapter {
    pub fn new(
        url: Option<String>,
        timeout: Duration,
        policy: GuardrailPolicy,
    ) -> Result<Self, reqwest::Error> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self { http, url, policy })
    }

    pub fn from_config(
        config: &OrchestratorConfig,
        policy: GuardrailPolicy,
    ) -> Result<Self, reqwest::Error> {
        Self::new(config.url.clone(), config.timeout(), policy)
    }

    pub fn is_configured(&self) -> bool {
        self.url.is_some()
    }
}

#[async_trait]
impl TurnDelegate for OrchestratorAdapter {
    async fn attempt(&self, text: &str, dossier_id: &str) -> ReplyVerdict {
        let Some(url) = self.url.as_deref() else {
            return ReplyVerdict::Unavailable(Unavailability::NotConfigured);
        };

        let payload = json!({ "text": text, "dossierId": dossier_id });
        let verdict = match post_json(&self.http, url, &payload).await {
            Ok(body) => accept_orchestrator_reply(body, &self.policy, text, dossier_id, now_ms()),
            Err(reason) => ReplyVerdict::Unavailable(reason),
        };

        match &verdict {
            ReplyVerdict::Accepted(response) => info!(
                event_name = "orchestrator.accepted",
                intent = %response.intent,
                action = %response.action,
                "orchestrator answered the turn"
            ),
            ReplyVerdict::Unavailable(reason) => warn!(
                event_name = "orchestrator.unavailable",
                reason = reason.reason(),
                detail = %reason,
                "orchestrator unavailable, falling back to local handlers"
            ),
        }
        verdict
    }
}
