use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The purpose of one transcribed utterance.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Dictation,
    Readback,
    Correction,
    Devis,
    Info,
}

impl Intent {
    pub const ALL: [Intent; 5] =
        [Self::Dictation, Self::Readback, Self::Correction, Self::Devis, Self::Info];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Dictation => "dictation",
            Self::Readback => "readback",
            Self::Correction => "correction",
            Self::Devis => "devis",
            Self::Info => "info",
        }
    }

    /// Intents whose handler refuses to run without an active dossier.
    pub fn requires_dossier(&self) -> bool {
        !matches!(self, Self::Dictation)
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnknownIntent(pub String);

impl fmt::Display for UnknownIntent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown intent `{}`", self.0)
    }
}

impl std::error::Error for UnknownIntent {}

impl FromStr for Intent {
    type Err = UnknownIntent;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "dictation" => Ok(Self::Dictation),
            "readback" => Ok(Self::Readback),
            "correction" => Ok(Self::Correction),
            "devis" => Ok(Self::Devis),
            "info" => Ok(Self::Info),
            other => Err(UnknownIntent(other.to_string())),
        }
    }
}

/// Output of the intent classifier for a single turn. Never persisted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IntentResult {
    pub intent: Intent,
    pub confidence: f64,
    #[serde(default)]
    pub entity: Option<String>,
    #[serde(default)]
    pub reasoning: String,
}

impl IntentResult {
    /// The safe default: dictation never discards what the user said.
    pub fn dictation(reasoning: impl Into<String>) -> Self {
        Self::certain(Intent::Dictation, reasoning)
    }

    pub fn certain(intent: Intent, reasoning: impl Into<String>) -> Self {
        Self { intent, confidence: 1.0, entity: None, reasoning: reasoning.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::{Intent, IntentResult};

    #[test]
    fn parses_labels_case_insensitively() {
        assert_eq!(" Readback ".parse::<Intent>(), Ok(Intent::Readback));
        assert_eq!("DEVIS".parse::<Intent>(), Ok(Intent::Devis));
        assert!("quote".parse::<Intent>().is_err());
    }

    #[test]
    fn serializes_as_snake_case_label() {
        let value = serde_json::to_value(Intent::Correction).expect("serialize");
        assert_eq!(value, serde_json::json!("correction"));
    }

    #[test]
    fn only_dictation_runs_without_dossier() {
        let needing: Vec<_> = Intent::ALL.iter().filter(|i| i.requires_dossier()).collect();
        assert_eq!(needing.len(), 4);
        assert!(!Intent::Dictation.requires_dossier());
    }

    #[test]
    fn classification_tolerates_missing_optional_fields() {
        let parsed: IntentResult =
            serde_json::from_str(r#"{"intent":"info","confidence":0.92}"#).expect("parse");
        assert_eq!(parsed.intent, Intent::Info);
        assert_eq!(parsed.entity, None);
        assert!(parsed.reasoning.is_empty());
    }
}
