use serde::{Deserialize, Serialize};

/// Opaque job-file identifier used to scope every datastore query.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DossierId(pub String);

impl DossierId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dossier {
    pub id: DossierId,
    pub nom: Option<String>,
    pub client: Option<String>,
    pub photo_count: usize,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TranscriptStatus {
    Brouillon,
    Valide,
    /// Pending human review; never overwrites the record it corrects.
    Correction,
    Other(String),
}

impl TranscriptStatus {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Brouillon => "brouillon",
            Self::Valide => "valide",
            Self::Correction => "correction",
            Self::Other(raw) => raw,
        }
    }

    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "brouillon" => Self::Brouillon,
            "valide" | "validé" => Self::Valide,
            "correction" => Self::Correction,
            _ => Self::Other(raw.to_string()),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptRecord {
    pub id: String,
    pub dossier_id: DossierId,
    pub titre: Option<String>,
    pub texte: String,
    pub statut: Option<TranscriptStatus>,
}

/// A transcript row to append. Transcript rows are never edited in place.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewTranscript {
    pub dossier_id: DossierId,
    pub titre: String,
    pub texte: String,
    pub statut: TranscriptStatus,
}

impl NewTranscript {
    pub fn correction(dossier_id: DossierId, last_entity: Option<&str>, texte: &str) -> Self {
        let titre = match last_entity {
            Some(entity) if !entity.trim().is_empty() => {
                format!("Correction — {}", entity.trim())
            }
            _ => "Correction".to_string(),
        };
        Self { dossier_id, titre, texte: texte.to_string(), statut: TranscriptStatus::Correction }
    }
}

/// Non-empty transcript texts in datastore order, joined by blank lines.
pub fn concatenate_texts(records: &[TranscriptRecord]) -> String {
    records
        .iter()
        .map(|record| record.texte.as_str())
        .filter(|texte| !texte.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}
