pub mod connection;
pub mod repositories;

pub use connection::{connect, connect_with_settings, DatastoreClient};
pub use repositories::{
    CatalogRepository, DatastoreRepositories, DossierRepository, RepositoryError,
    TranscriptRepository,
};
