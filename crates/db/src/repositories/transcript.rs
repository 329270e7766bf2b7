use chantier_core::domain::dossier::{DossierId, NewTranscript, TranscriptRecord};
use tracing::info;

use super::records::{
    dossier_filter, transcript_from_record, transcript_to_fields, CreateRecords, NewRecord,
};
use super::{RepositoryError, TranscriptRepository};
use crate::DatastoreClient;

pub struct HttpTranscriptRepository {
    client: DatastoreClient,
    table: String,
}

impl HttpTranscriptRepository {
    pub fn new(client: DatastoreClient, table: impl Into<String>) -> Self {
        Self { client, table: table.into() }
    }
}

#[async_trait::async_trait]
impl TranscriptRepository for HttpTranscriptRepository {
    async fn list_for_dossier(
        &self,
        dossier_id: &DossierId,
    ) -> Result<Vec<TranscriptRecord>, RepositoryError> {
        let query = [("filterByFormula".to_string(), dossier_filter(dossier_id))];
        let records = self.client.list_records(&self.table, &query).await?;
        Ok(records.into_iter().map(|record| transcript_from_record(record, dossier_id)).collect())
    }

    async fn append(
        &self,
        transcript: NewTranscript,
    ) -> Result<TranscriptRecord, RepositoryError> {
        let record = NewRecord { fields: transcript_to_fields(&transcript) };
        let body = CreateRecords { records: vec![record] };
        let page = self.client.create_records(&self.table, &body).await?;
        let created = page.records.into_iter().next().ok_or_else(|| {
            RepositoryError::Decode("datastore create returned no record".to_string())
        })?;

        info!(
            event_name = "datastore.transcript_appended",
            dossier_id = %transcript.dossier_id.as_str(),
            record_id = %created.id,
            statut = transcript.statut.as_str(),
            "transcript row appended"
        );

        Ok(TranscriptRecord {
            id: created.id,
            dossier_id: transcript.dossier_id,
            titre: Some(transcript.titre),
            texte: transcript.texte,
            statut: Some(transcript.statut),
        })
    }
}
