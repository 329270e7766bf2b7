//! Agent runtime: routes a spoken turn to the right behavior.
//!
//! A turn goes through up to three tiers:
//! 1. **Readback bypass** (`guardrails`) - explicit "read it back" requests are served locally
//!    and never reach the remote orchestrator.
//! 2. **Remote orchestrator** (`orchestrator`) - answers the whole turn when it is reachable and
//!    its reply passes the guardrails (`reply`).
//! 3. **Local fallback** (`classifier`, `handlers`) - intent classification followed by one
//!    handler per intent. Handlers may first delegate to per-intent sub-agents (`webhook`).
//!
//! Quote generation (`quote`) is a separate, synchronous operation triggered by the client.
//!
//! # Safety Principle
//!
//! The LLM never sets prices. Quote lines are repriced from the catalog and every total is
//! recomputed in `chantier_core::devis`.

pub mod classifier;
pub mod guardrails;
pub mod handlers;
pub mod llm;
pub mod orchestrator;
pub mod quote;
pub mod reply;
pub mod runtime;
pub mod webhook;

pub use classifier::IntentClassifier;
pub use guardrails::GuardrailPolicy;
pub use llm::{LlmClient, LlmError, OpenAiCompatibleClient};
pub use quote::{GeneratedQuote, QuoteGenerator};
pub use runtime::{AgentRuntime, RuntimeBuildError, TurnRequest};
