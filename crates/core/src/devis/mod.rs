//! Pre-quote (devis) engine: catalog handling, prompt building, reply parsing, deterministic
//! price reconciliation and manual edits.

pub mod catalog;
pub mod edit;
pub mod pricing;
pub mod prompt;

pub use catalog::{normalize_key, Catalog, PriceIndex};
pub use edit::{apply_edit, EditError, LineEdit};
pub use pricing::{
    recompute_totals, round_cents, AmountOverflow, CatalogReconciler, QuoteReconciler,
    ReconciliationReport, RoomSuffixes, COMMON_PIECE_NAME, DEFAULT_ROOM_SUFFIXES,
};
pub use prompt::{
    dedupe_transcripts, parse_devis, quote_user_prompt, transcript_text, QUOTE_MAX_TOKENS,
    QUOTE_SYSTEM_PROMPT, QUOTE_TEMPERATURE,
};
