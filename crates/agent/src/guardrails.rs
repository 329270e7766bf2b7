//! Screening rules for upstream agent replies and for the readback bypass.
//!
//! The phrase lists are data, not logic: they are matched after accent folding and
//! lower-casing, so `Vérifier` and `verifier` are the same phrase.

use chantier_core::text::fold_for_matching;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Language {
    French,
    English,
}

/// A failure signature: every fragment must occur in the message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FailurePattern {
    pub language: Language,
    pub reason_code: &'static str,
    pub all_of: Vec<String>,
}

impl FailurePattern {
    pub fn new(language: Language, reason_code: &'static str, fragments: &[&str]) -> Self {
        Self {
            language,
            reason_code,
            all_of: fragments.iter().map(|fragment| fold_for_matching(fragment)).collect(),
        }
    }

    fn matches(&self, folded_message: &str) -> bool {
        !self.all_of.is_empty()
            && self.all_of.iter().all(|fragment| folded_message.contains(fragment.as_str()))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GuardrailDecision {
    Allow,
    Reject { reason_code: &'static str, detail: String },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GuardrailPolicy {
    pub error_actions: Vec<String>,
    pub failure_patterns: Vec<FailurePattern>,
    pub readback_triggers: Vec<String>,
}

impl Default for GuardrailPolicy {
    fn default() -> Self {
        use Language::{English, French};

        Self {
            error_actions: vec!["agent_fallback".to_string(), "error".to_string()],
            failure_patterns: vec![
                FailurePattern::new(English, "iteration_limit", &["max iterations"]),
                FailurePattern::new(French, "agent_inactive", &["n'est pas actif"]),
                FailurePattern::new(English, "agent_inactive", &["not active"]),
                FailurePattern::new(English, "agent_inactive", &["inactive"]),
                FailurePattern::new(French, "generic_error", &["erreur est survenue"]),
                FailurePattern::new(English, "generic_error", &["error occurred"]),
                FailurePattern::new(French, "generic_error", &["erreur", "vérifier"]),
            ],
            readback_triggers: [
                "relis",
                "relire",
                "relecture",
                "rappelle-moi",
                "rappelle moi",
                "qu'est-ce que j'ai dit",
                "qu'est ce que j'ai dit",
                "qu'ai-je dit",
                "lis-moi",
                "lis moi",
                "répète ce que",
            ]
            .iter()
            .map(|trigger| fold_for_matching(trigger))
            .collect(),
        }
    }
}

impl GuardrailPolicy {
    /// Screen a well-shaped upstream reply for disguised failures.
    pub fn evaluate_reply(&self, action: Option<&str>, message: &str) -> GuardrailDecision {
        if let Some(action) = action {
            let action = action.trim().to_ascii_lowercase();
            if self.error_actions.iter().any(|error_action| error_action == &action) {
                return GuardrailDecision::Reject {
                    reason_code: "error_action",
                    detail: format!("action `{action}`"),
                };
            }
        }

        let folded = fold_for_matching(message);
        match self.failure_patterns.iter().find(|pattern| pattern.matches(&folded)) {
            Some(pattern) => GuardrailDecision::Reject {
                reason_code: pattern.reason_code,
                detail: pattern.all_of.join(" + "),
            },
            None => GuardrailDecision::Allow,
        }
    }

    /// Utterances that must skip the orchestrator and go straight to the local readback.
    pub fn is_readback_request(&self, utterance: &str) -> bool {
        let folded = fold_for_matching(utterance);
        self.readback_triggers.iter().any(|trigger| folded.contains(trigger.as_str()))
    }

    pub fn patterns_for(&self, language: Language) -> impl Iterator<Item = &FailurePattern> {
        self.failure_patterns.iter().filter(move |pattern| pattern.language == language)
    }
}
