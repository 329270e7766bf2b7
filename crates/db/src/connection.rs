use std::time::Duration;

use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use chantier_core::config::DatastoreConfig;

use crate::repositories::records::{Record, RecordPage};
use crate::repositories::RepositoryError;

/// Upper bound on followed pages, so a datastore that keeps returning an offset cannot loop us.
const MAX_PAGES: usize = 100;

/// Authenticated handle on one base of the tabular datastore.
#[derive(Clone)]
pub struct DatastoreClient {
    http: Client,
    base_url: String,
    base_id: String,
    token: SecretString,
}

impl std::fmt::Debug for DatastoreClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatastoreClient")
            .field("base_url", &self.base_url)
            .field("base_id", &self.base_id)
            .finish_non_exhaustive()
    }
}

pub fn connect(config: &DatastoreConfig) -> Result<DatastoreClient, RepositoryError> {
    let (Some(token), Some(base_id)) = (&config.token, &config.base_id) else {
        return Err(RepositoryError::NotConfigured(
            "datastore.token and datastore.base_id are required".to_string(),
        ));
    };
    connect_with_settings(&config.base_url, base_id, token.clone(), config.timeout())
}

pub fn connect_with_settings(
    base_url: &str,
    base_id: &str,
    token: SecretString,
    timeout: Duration,
) -> Result<DatastoreClient, RepositoryError> {
    let http = Client::builder().timeout(timeout.max(Duration::from_secs(1))).build()?;
    Ok(DatastoreClient {
        http,
        base_url: base_url.trim_end_matches('/').to_string(),
        base_id: base_id.to_string(),
        token,
    })
}

impl DatastoreClient {
    fn table_url(&self, table: &str) -> String {
        format!("{}/{}/{}", self.base_url, self.base_id, table)
    }

    /// Every record of `table` matching `query`, following `offset` pagination to the end.
    pub async fn list_records(
        &self,
        table: &str,
        query: &[(String, String)],
    ) -> Result<Vec<Record>, RepositoryError> {
        let url = self.table_url(table);
        let mut records = Vec::new();
        let mut offset: Option<String> = None;

        for _ in 0..MAX_PAGES {
            let mut request = self.http.get(&url).bearer_auth(self.token.expose_secret());
            request = request.query(query);
            if let Some(offset) = &offset {
                request = request.query(&[("offset", offset)]);
            }

            let page: RecordPage = decode(request.send().await?).await?;
            debug!(
                event_name = "datastore.page_loaded",
                table,
                records = page.records.len(),
                has_more = page.offset.is_some(),
                "loaded datastore page"
            );
            records.extend(page.records);

            match page.offset {
                Some(next) if !next.is_empty() => offset = Some(next),
                _ => return Ok(records),
            }
        }

        Err(RepositoryError::Decode(format!(
            "table `{table}` returned more than {MAX_PAGES} pages"
        )))
    }

    /// A single record by id; `None` when the datastore answers 404.
    pub async fn get_record(
        &self,
        table: &str,
        record_id: &str,
    ) -> Result<Option<Record>, RepositoryError> {
        let url = format!("{}/{}", self.table_url(table), record_id);
        let response =
            self.http.get(&url).bearer_auth(self.token.expose_secret()).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        decode(response).await.map(Some)
    }

    pub async fn create_records<B: Serialize + ?Sized>(
        &self,
        table: &str,
        body: &B,
    ) -> Result<RecordPage, RepositoryError> {
        let url = self.table_url(table);
        let response =
            self.http.post(&url).bearer_auth(self.token.expose_secret()).json(body).send().await?;
        decode(response).await
    }
}

async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, RepositoryError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(RepositoryError::Status { status: status.as_u16(), body });
    }
    response.json::<T>().await.map_err(|error| RepositoryError::Decode(error.to_string()))
}
