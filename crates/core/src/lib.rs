pub mod config;
pub mod devis;
pub mod domain;
pub mod errors;
pub mod text;

pub use config::{AppConfig, ConfigError, LoadOptions};
pub use devis::{Catalog, CatalogReconciler, LineEdit, QuoteReconciler, ReconciliationReport};
pub use domain::catalog::PriceCatalogEntry;
pub use domain::context::{AgentContext, ContextWindow};
pub use domain::dossier::{Dossier, DossierId, NewTranscript, TranscriptRecord, TranscriptStatus};
pub use domain::intent::{Intent, IntentResult};
pub use domain::quote::{Devis, Ligne, Piece};
pub use domain::response::AgentResponse;
pub use errors::{ApplicationError, DomainError, InterfaceError, QuoteError};
