use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::warn;

use chantier_core::config::DatastoreConfig;
use chantier_core::domain::catalog::PriceCatalogEntry;
use chantier_core::domain::dossier::{Dossier, DossierId, NewTranscript, TranscriptRecord};

pub mod catalog;
pub mod disabled;
pub mod dossier;
pub mod memory;
pub mod records;
pub mod transcript;

pub use catalog::HttpCatalogRepository;
pub use disabled::DisabledDatastore;
pub use dossier::HttpDossierRepository;
pub use memory::{
    InMemoryCatalogRepository, InMemoryDossierRepository, InMemoryTranscriptRepository,
};
pub use transcript::HttpTranscriptRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("datastore transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("datastore returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("decode error: {0}")]
    Decode(String),
    #[error("datastore is not configured: {0}")]
    NotConfigured(String),
}

/// Transcript rows of a dossier. Rows are appended, never edited.
#[async_trait]
pub trait TranscriptRepository: Send + Sync {
    async fn list_for_dossier(
        &self,
        dossier_id: &DossierId,
    ) -> Result<Vec<TranscriptRecord>, RepositoryError>;

    async fn append(&self, transcript: NewTranscript) -> Result<TranscriptRecord, RepositoryError>;
}

#[async_trait]
pub trait DossierRepository: Send + Sync {
    async fn find_by_id(&self, id: &DossierId) -> Result<Option<Dossier>, RepositoryError>;
}

#[async_trait]
pub trait CatalogRepository: Send + Sync {
    async fn list_entries(&self) -> Result<Vec<PriceCatalogEntry>, RepositoryError>;
}

/// The three repositories a running service needs, behind trait objects.
#[derive(Clone)]
pub struct DatastoreRepositories {
    pub transcripts: Arc<dyn TranscriptRepository>,
    pub dossiers: Arc<dyn DossierRepository>,
    pub catalog: Arc<dyn CatalogRepository>,
}

impl DatastoreRepositories {
    /// HTTP repositories when credentials are present, [`DisabledDatastore`] otherwise.
    pub fn from_config(config: &DatastoreConfig) -> Result<Self, RepositoryError> {
        if !config.is_configured() {
            warn!(
                event_name = "datastore.disabled",
                "datastore credentials missing, datastore-backed intents will fail soft"
            );
            return Ok(Self::disabled());
        }

        let client = crate::connect(config)?;
        Ok(Self {
            transcripts: Arc::new(HttpTranscriptRepository::new(
                client.clone(),
                config.transcripts_table.clone(),
            )),
            dossiers: Arc::new(HttpDossierRepository::new(
                client.clone(),
                config.dossiers_table.clone(),
            )),
            catalog: Arc::new(HttpCatalogRepository::new(client, config.catalog_table.clone())),
        })
    }

    pub fn disabled() -> Self {
        Self {
            transcripts: Arc::new(DisabledDatastore),
            dossiers: Arc::new(DisabledDatastore),
            catalog: Arc::new(DisabledDatastore),
        }
    }
}
