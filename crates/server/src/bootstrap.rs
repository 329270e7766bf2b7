use std::sync::Arc;

use axum::Router;
use chantier_agent::{AgentRuntime, LlmError, QuoteGenerator, RuntimeBuildError};
use chantier_core::config::{AppConfig, ConfigError, LoadOptions};
use chantier_db::{DatastoreRepositories, RepositoryError};
use thiserror::Error;
use tracing::info;

use crate::{devis, health, turn};

pub struct Application {
    pub config: AppConfig,
    pub runtime: Arc<AgentRuntime>,
    pub quotes: Arc<QuoteGenerator>,
    pub components: health::ComponentStatus,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("datastore client setup failed: {0}")]
    Datastore(#[source] RepositoryError),
    #[error("agent runtime setup failed: {0}")]
    Runtime(#[from] RuntimeBuildError),
    #[error("quote model client setup failed: {0}")]
    QuoteModel(#[source] LlmError),
}

pub fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config)
}

pub fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(event_name = "system.bootstrap.start", "starting application bootstrap");

    let repositories =
        DatastoreRepositories::from_config(&config.datastore).map_err(BootstrapError::Datastore)?;
    let runtime = AgentRuntime::from_config(&config, &repositories)?;
    let quotes =
        QuoteGenerator::from_config(&config, &repositories).map_err(BootstrapError::QuoteModel)?;
    let components = health::ComponentStatus::from_config(&config);

    info!(
        event_name = "system.bootstrap.ready",
        llm = components.llm,
        datastore = components.datastore,
        orchestrator = components.orchestrator,
        "application components initialized"
    );

    Ok(Application {
        config,
        runtime: Arc::new(runtime),
        quotes: Arc::new(quotes),
        components,
    })
}

impl Application {
    pub fn router(&self) -> Router {
        Router::new()
            .merge(turn::router(self.runtime.clone()))
            .merge(devis::router(self.quotes.clone()))
            .merge(health::router(self.components))
    }
}
