use chantier_core::domain::dossier::{Dossier, DossierId};

use super::records::dossier_from_record;
use super::{DossierRepository, RepositoryError};
use crate::DatastoreClient;

pub struct HttpDossierRepository {
    client: DatastoreClient,
    table: String,
}

impl HttpDossierRepository {
    pub fn new(client: DatastoreClient, table: impl Into<String>) -> Self {
        Self { client, table: table.into() }
    }
}

#[async_trait::async_trait]
impl DossierRepository for HttpDossierRepository {
    async fn find_by_id(&self, id: &DossierId) -> Result<Option<Dossier>, RepositoryError> {
        let record = self.client.get_record(&self.table, id.as_str()).await?;
        Ok(record.map(dossier_from_record))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use chantier_core::domain::dossier::DossierId;

    use super::HttpDossierRepository;
    use crate::connection::connect_with_settings;
    use crate::repositories::DossierRepository;

    fn repository(server: &MockServer) -> HttpDossierRepository {
        let client = connect_with_settings(
            &server.uri(),
            "appTEST",
            "pat-test".to_string().into(),
            Duration::from_secs(5),
        )
        .expect("client");
        HttpDossierRepository::new(client, "Dossiers")
    }

    #[tokio::test]
    async fn finds_dossier_by_record_id() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/appTEST/Dossiers/recD1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "recD1",
                "fields": {"Nom du dossier": "2024-017 Dupont", "Client": "M. Dupont"}
            })))
            .mount(&server)
            .await;

        let dossier = repository(&server)
            .find_by_id(&DossierId("recD1".into()))
            .await
            .expect("find")
            .expect("present");
        assert_eq!(dossier.client.as_deref(), Some("M. Dupont"));
        assert_eq!(dossier.photo_count, 0);
    }

    #[tokio::test]
    async fn missing_dossier_is_none() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({"error": "NOT_FOUND"})))
            .mount(&server)
            .await;

        let found = repository(&server).find_by_id(&DossierId("nope".into())).await.expect("find");
        assert_eq!(found, None);
    }
}
