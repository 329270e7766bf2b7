use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chantier_core::config::AppConfig;
use chrono::Utc;
use serde::Serialize;

/// Which upstreams are wired. Reported without calling them.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ComponentStatus {
    pub llm: bool,
    pub datastore: bool,
    pub orchestrator: bool,
}

impl ComponentStatus {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            llm: config.llm.is_configured(),
            datastore: config.datastore.is_configured(),
            orchestrator: config.orchestrator.url.is_some(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: HealthCheck,
    pub llm: HealthCheck,
    pub datastore: HealthCheck,
    pub orchestrator: HealthCheck,
    pub checked_at: String,
}

pub fn router(components: ComponentStatus) -> Router {
    Router::new().route("/health", get(health)).with_state(components)
}

pub async fn health(
    State(components): State<ComponentStatus>,
) -> (StatusCode, Json<HealthResponse>) {
    let payload = HealthResponse {
        status: "ready",
        service: HealthCheck {
            status: "ready",
            detail: "chantier-server runtime initialized".to_string(),
        },
        llm: component_check(
            components.llm,
            "classification and quote models available",
            "no api key: classification falls back to dictation, quotes are refused",
        ),
        datastore: component_check(
            components.datastore,
            "transcripts, dossiers and catalog reachable by configuration",
            "no credentials: datastore-backed handlers answer with soft errors",
        ),
        orchestrator: component_check(
            components.orchestrator,
            "remote orchestrator tried first on every turn",
            "no webhook: every turn uses the local classifier",
        ),
        checked_at: Utc::now().to_rfc3339(),
    };

    (StatusCode::OK, Json(payload))
}

fn component_check(configured: bool, enabled: &str, disabled: &str) -> HealthCheck {
    if configured {
        HealthCheck { status: "configured", detail: enabled.to_string() }
    } else {
        HealthCheck { status: "disabled", detail: disabled.to_string() }
    }
}
