use chantier_core::domain::catalog::PriceCatalogEntry;
use chantier_core::domain::dossier::{Dossier, DossierId, NewTranscript, TranscriptRecord};

use super::{CatalogRepository, DossierRepository, RepositoryError, TranscriptRepository};

/// Stands in for every repository when no datastore credentials are configured, so callers
/// take their documented failure paths instead of panicking at start.
#[derive(Clone, Debug, Default)]
pub struct DisabledDatastore;

fn not_configured() -> RepositoryError {
    RepositoryError::NotConfigured("datastore.token and datastore.base_id are unset".to_string())
}

#[async_trait::async_trait]
impl TranscriptRepository for DisabledDatastore {
    async fn list_for_dossier(
        &self,
        _dossier_id: &DossierId,
    ) -> Result<Vec<TranscriptRecord>, RepositoryError> {
        Err(not_configured())
    }

    async fn append(
        &self,
        _transcript: NewTranscript,
    ) -> Result<TranscriptRecord, RepositoryError> {
        Err(not_configured())
    }
}

#[async_trait::async_trait]
impl DossierRepository for DisabledDatastore {
    async fn find_by_id(&self, _id: &DossierId) -> Result<Option<Dossier>, RepositoryError> {
        Err(not_configured())
    }
}

#[async_trait::async_trait]
impl CatalogRepository for DisabledDatastore {
    async fn list_entries(&self) -> Result<Vec<PriceCatalogEntry>, RepositoryError> {
        Err(not_configured())
    }
}

#[cfg(test)]
mod tests {
    use chantier_core::domain::dossier::DossierId;

    use super::DisabledDatastore;
    use crate::repositories::{CatalogRepository, RepositoryError, TranscriptRepository};

    #[tokio::test]
    async fn every_call_reports_missing_configuration() {
        let store = DisabledDatastore;
        let listed = store.list_for_dossier(&DossierId("d1".into())).await;
        assert!(matches!(listed, Err(RepositoryError::NotConfigured(_))));
        assert!(matches!(store.list_entries().await, Err(RepositoryError::NotConfigured(_))));
    }
}
