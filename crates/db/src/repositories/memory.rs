use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::RwLock;

use chantier_core::domain::catalog::PriceCatalogEntry;
use chantier_core::domain::dossier::{Dossier, DossierId, NewTranscript, TranscriptRecord};

use super::{CatalogRepository, DossierRepository, RepositoryError, TranscriptRepository};

#[derive(Default)]
pub struct InMemoryTranscriptRepository {
    rows: RwLock<Vec<TranscriptRecord>>,
    next_id: AtomicUsize,
}

impl InMemoryTranscriptRepository {
    pub fn with_rows(rows: Vec<TranscriptRecord>) -> Self {
        Self { next_id: AtomicUsize::new(rows.len()), rows: RwLock::new(rows) }
    }

    pub async fn snapshot(&self) -> Vec<TranscriptRecord> {
        self.rows.read().await.clone()
    }
}

#[async_trait::async_trait]
impl TranscriptRepository for InMemoryTranscriptRepository {
    async fn list_for_dossier(
        &self,
        dossier_id: &DossierId,
    ) -> Result<Vec<TranscriptRecord>, RepositoryError> {
        let rows = self.rows.read().await;
        Ok(rows.iter().filter(|row| &row.dossier_id == dossier_id).cloned().collect())
    }

    async fn append(&self, transcript: NewTranscript) -> Result<TranscriptRecord, RepositoryError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let row = TranscriptRecord {
            id: format!("mem-{id}"),
            dossier_id: transcript.dossier_id,
            titre: Some(transcript.titre),
            texte: transcript.texte,
            statut: Some(transcript.statut),
        };
        self.rows.write().await.push(row.clone());
        Ok(row)
    }
}

#[derive(Default)]
pub struct InMemoryDossierRepository {
    dossiers: RwLock<HashMap<String, Dossier>>,
}

impl InMemoryDossierRepository {
    pub async fn insert(&self, dossier: Dossier) {
        self.dossiers.write().await.insert(dossier.id.0.clone(), dossier);
    }
}

#[async_trait::async_trait]
impl DossierRepository for InMemoryDossierRepository {
    async fn find_by_id(&self, id: &DossierId) -> Result<Option<Dossier>, RepositoryError> {
        let dossiers = self.dossiers.read().await;
        Ok(dossiers.get(&id.0).cloned())
    }
}

#[derive(Default)]
pub struct InMemoryCatalogRepository {
    entries: RwLock<Vec<PriceCatalogEntry>>,
}

impl InMemoryCatalogRepository {
    pub fn with_entries(entries: Vec<PriceCatalogEntry>) -> Self {
        Self { entries: RwLock::new(entries) }
    }
}

#[async_trait::async_trait]
impl CatalogRepository for InMemoryCatalogRepository {
    async fn list_entries(&self) -> Result<Vec<PriceCatalogEntry>, RepositoryError> {
        Ok(self.entries.read().await.clone())
    }
}
