pub mod catalog;
pub mod context;
pub mod dossier;
pub mod intent;
pub mod quote;
pub mod response;
