use chantier_core::domain::catalog::PriceCatalogEntry;

use super::records::{catalog_entry_from_record, FIELD_CATEGORIE};
use super::{CatalogRepository, RepositoryError};
use crate::DatastoreClient;

pub struct HttpCatalogRepository {
    client: DatastoreClient,
    table: String,
}

impl HttpCatalogRepository {
    pub fn new(client: DatastoreClient, table: impl Into<String>) -> Self {
        Self { client, table: table.into() }
    }
}

#[async_trait::async_trait]
impl CatalogRepository for HttpCatalogRepository {
    /// Catalog rows sorted by category; rows without an intitule are skipped.
    async fn list_entries(&self) -> Result<Vec<PriceCatalogEntry>, RepositoryError> {
        let query = [
            ("sort[0][field]".to_string(), FIELD_CATEGORIE.to_string()),
            ("sort[0][direction]".to_string(), "asc".to_string()),
        ];
        let records = self.client.list_records(&self.table, &query).await?;
        Ok(records
            .iter()
            .map(catalog_entry_from_record)
            .filter(|entry| !entry.intitule.trim().is_empty())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use rust_decimal::Decimal;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::HttpCatalogRepository;
    use crate::connection::connect_with_settings;
    use crate::repositories::CatalogRepository;

    #[tokio::test]
    async fn lists_catalog_sorted_by_category() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/appTEST/Bordereau"))
            .and(query_param("sort[0][field]", "Categorie"))
            .and(query_param("sort[0][direction]", "asc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "records": [
                    {"id": "b1", "fields": {
                        "Intitule": "Peinture murs", "Unite": "m2",
                        "Prix unitaire HT": 12, "Categorie": "Peinture"
                    }},
                    {"id": "b2", "fields": {
                        "Intitule": "Protection chantier", "Unite": "forfait",
                        "Prix unitaire HT": "150,00", "Categorie": "Prestations Communes"
                    }},
                    {"id": "b3", "fields": {"Unite": "m2"}}
                ]
            })))
            .mount(&server)
            .await;

        let client = connect_with_settings(
            &server.uri(),
            "appTEST",
            "pat-test".to_string().into(),
            Duration::from_secs(5),
        )
        .expect("client");
        let entries =
            HttpCatalogRepository::new(client, "Bordereau").list_entries().await.expect("list");

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].prix_ht, Decimal::new(12, 0));
        assert_eq!(entries[1].prix_ht, Decimal::new(150, 0));
        assert!(entries[1].is_common());
    }
}
