use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use chantier_agent::QuoteGenerator;
use chantier_core::devis::{apply_edit, recompute_totals, EditError, LineEdit};
use chantier_core::domain::quote::Devis;
use chantier_core::errors::{ApplicationError, DomainError, InterfaceError};
use chantier_core::text::truncate_chars;
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

const TRANSCRIPT_PREVIEW_CHARS: usize = 200;

#[derive(Clone)]
pub struct DevisState {
    quotes: Arc<QuoteGenerator>,
}

#[derive(Debug, Default, Deserialize)]
pub struct GenerateDevisRequest {
    #[serde(default)]
    pub dossier_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct GenerateDevisResponse {
    pub success: bool,
    pub devis: Devis,
    pub transcription_utilisee: String,
    pub bordereau_lignes: usize,
}

#[derive(Debug, Deserialize)]
pub struct RecalculateRequest {
    pub devis: Devis,
    #[serde(default)]
    pub edit: Option<LineEdit>,
}

#[derive(Debug, Serialize)]
pub struct RecalculateResponse {
    pub success: bool,
    pub devis: Devis,
}

#[derive(Debug, Serialize)]
pub struct DevisError {
    pub success: bool,
    pub error: String,
    pub message: &'static str,
    pub correlation_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw: Option<String>,
}

type DevisResult<T> = Result<Json<T>, (StatusCode, Json<DevisError>)>;

pub fn router(quotes: Arc<QuoteGenerator>) -> Router {
    Router::new()
        .route("/api/generate-devis", post(generate_devis))
        .route("/api/devis/recalculate", post(recalculate_devis))
        .with_state(DevisState { quotes })
}

pub async fn generate_devis(
    State(state): State<DevisState>,
    Json(request): Json<GenerateDevisRequest>,
) -> DevisResult<GenerateDevisResponse> {
    let dossier_id = request.dossier_id.unwrap_or_default();
    let quote = state.quotes.generate(&dossier_id).await.map_err(|error| {
        let raw = error.raw_reply().map(str::to_string);
        let response = error_response(ApplicationError::from(error), raw);
        warn!(
            event_name = "devis.generation_failed",
            dossier_id = %dossier_id,
            status = response.0.as_u16(),
            correlation_id = %response.1.correlation_id,
            error = %response.1.error,
            "quote generation failed"
        );
        response
    })?;

    Ok(Json(GenerateDevisResponse {
        success: true,
        transcription_utilisee: format!(
            "{}...",
            truncate_chars(&quote.transcript, TRANSCRIPT_PREVIEW_CHARS)
        ),
        bordereau_lignes: quote.catalog_lines,
        devis: quote.devis,
    }))
}

/// Totals always come from the same recompute routine as generation, never from the client.
pub async fn recalculate_devis(
    Json(request): Json<RecalculateRequest>,
) -> DevisResult<RecalculateResponse> {
    let mut devis = request.devis;
    let outcome = match &request.edit {
        Some(edit) => apply_edit(&mut devis, edit),
        None => recompute_totals(&mut devis).map_err(EditError::from),
    };
    outcome.map_err(|error| {
        error_response(ApplicationError::from(DomainError::from(error)), None)
    })?;
    Ok(Json(RecalculateResponse { success: true, devis }))
}

fn error_response(
    error: ApplicationError,
    raw: Option<String>,
) -> (StatusCode, Json<DevisError>) {
    let interface = error.into_interface(Uuid::new_v4().simple().to_string());
    let status = match &interface {
        InterfaceError::BadRequest { .. } => StatusCode::BAD_REQUEST,
        InterfaceError::ServiceUnavailable { .. } => StatusCode::BAD_GATEWAY,
        InterfaceError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (
        status,
        Json(DevisError {
            success: false,
            error: interface.message().to_string(),
            message: interface.user_message(),
            correlation_id: interface.correlation_id().to_string(),
            raw,
        }),
    )
}
