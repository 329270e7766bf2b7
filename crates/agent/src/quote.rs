use std::sync::Arc;

use tracing::{error, info};

use chantier_core::config::AppConfig;
use chantier_core::devis::{
    parse_devis, quote_user_prompt, transcript_text, Catalog, CatalogReconciler, QuoteReconciler,
    ReconciliationReport, QUOTE_MAX_TOKENS, QUOTE_SYSTEM_PROMPT, QUOTE_TEMPERATURE,
};
use chantier_core::domain::dossier::DossierId;
use chantier_core::domain::quote::Devis;
use chantier_core::errors::QuoteError;
use chantier_db::{
    CatalogRepository, DatastoreRepositories, RepositoryError, TranscriptRepository,
};

use crate::llm::{CompletionRequest, LlmClient, LlmError, OpenAiCompatibleClient};

/// A reconciled quote plus what it was built from.
#[derive(Clone, Debug, PartialEq)]
pub struct GeneratedQuote {
    pub devis: Devis,
    pub transcript: String,
    pub catalog_lines: usize,
    pub report: ReconciliationReport,
}

pub struct QuoteGenerator {
    transcripts: Arc<dyn TranscriptRepository>,
    catalog: Arc<dyn CatalogRepository>,
    llm: Option<Arc<dyn LlmClient>>,
    model: String,
    reconciler: Arc<dyn QuoteReconciler>,
}

fn datastore_error(error: RepositoryError) -> QuoteError {
    match error {
        RepositoryError::NotConfigured(_) => QuoteError::MissingDatastore,
        other => QuoteError::Datastore(other.to_string()),
    }
}

impl QuoteGenerator {
    pub fn new(
        transcripts: Arc<dyn TranscriptRepository>,
        catalog: Arc<dyn CatalogRepository>,
        llm: Option<Arc<dyn LlmClient>>,
        model: impl Into<String>,
        reconciler: Arc<dyn QuoteReconciler>,
    ) -> Self {
        Self { transcripts, catalog, llm, model: model.into(), reconciler }
    }

    /// Uses the quote model and its longer timeout.
    pub fn from_config(
        config: &AppConfig,
        repositories: &DatastoreRepositories,
    ) -> Result<Self, LlmError> {
        let llm = OpenAiCompatibleClient::from_config(&config.llm, true)?
            .map(|client| Arc::new(client) as Arc<dyn LlmClient>);
        Ok(Self::new(
            repositories.transcripts.clone(),
            repositories.catalog.clone(),
            llm,
            config.llm.quote_model.clone(),
            Arc::new(CatalogReconciler::new(config.agent.room_suffixes())),
        ))
    }

    pub fn is_configured(&self) -> bool {
        self.llm.is_some()
    }

    /// One completion, then deterministic reconciliation. No partial or guessed quote is ever
    /// returned.
    pub async fn generate(&self, dossier_id: &str) -> Result<GeneratedQuote, QuoteError> {
        let dossier_id = dossier_id.trim();
        if dossier_id.is_empty() {
            return Err(QuoteError::MissingDossierId);
        }
        let Some(llm) = &self.llm else {
            return Err(QuoteError::MissingLlmKey);
        };

        let records = self
            .transcripts
            .list_for_dossier(&DossierId(dossier_id.to_string()))
            .await
            .map_err(datastore_error)?;
        let transcript = transcript_text(&records);
        if transcript.trim().is_empty() {
            return Err(QuoteError::EmptyTranscript(dossier_id.to_string()));
        }

        let catalog = Catalog::new(self.catalog.list_entries().await.map_err(datastore_error)?);
        if catalog.is_empty() {
            return Err(QuoteError::EmptyCatalog);
        }

        let request = CompletionRequest {
            model: self.model.clone(),
            system: QUOTE_SYSTEM_PROMPT.to_string(),
            user: quote_user_prompt(&transcript, &catalog.prompt_listing()),
            temperature: QUOTE_TEMPERATURE,
            max_tokens: QUOTE_MAX_TOKENS,
        };
        let content =
            llm.complete(request).await.map_err(|error| QuoteError::Llm(error.to_string()))?;

        let mut devis = parse_devis(&content).map_err(|error| {
            error!(
                event_name = "quote.unparseable",
                dossier_id,
                error = %error,
                "quote model did not return a valid quote"
            );
            error
        })?;
        let report = self.reconciler.reconcile(&mut devis, &catalog).map_err(|error| {
            error!(
                event_name = "quote.amount_overflow",
                dossier_id,
                error = %error,
                "quote model returned amounts out of range"
            );
            QuoteError::UnparseableReply { reason: error.to_string(), raw: content.clone() }
        })?;

        info!(
            event_name = "quote.generated",
            dossier_id,
            transcripts = records.len(),
            lines = devis.line_count(),
            repriced = report.repriced_lines,
            unmatched = report.unmatched_lines.len(),
            total_ht = %devis.total_ht,
            "pre-quote generated"
        );
        Ok(GeneratedQuote { devis, transcript, catalog_lines: catalog.len(), report })
    }
}
