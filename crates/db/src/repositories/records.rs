//! Wire format of the tabular datastore: `{"records":[{"id":..,"fields":{..}}],"offset":..}`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use chantier_core::domain::catalog::PriceCatalogEntry;
use chantier_core::domain::dossier::{
    Dossier, DossierId, NewTranscript, TranscriptRecord, TranscriptStatus,
};
use chantier_core::domain::quote::decimal_from_value;
use rust_decimal::Decimal;

pub const FIELD_DOSSIER_ID: &str = "Dossier ID";
pub const FIELD_TEXTE: &str = "Texte";
pub const FIELD_TITRE: &str = "Titre";
pub const FIELD_STATUT: &str = "Statut";
pub const FIELD_NOM_DOSSIER: &str = "Nom du dossier";
pub const FIELD_CLIENT: &str = "Client";
pub const FIELD_PHOTOS: &str = "Photos Chantier";
pub const FIELD_INTITULE: &str = "Intitule";
pub const FIELD_UNITE: &str = "Unite";
pub const FIELD_PRIX_HT: &str = "Prix unitaire HT";
pub const FIELD_CATEGORIE: &str = "Categorie";

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct RecordPage {
    #[serde(default)]
    pub records: Vec<Record>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct Record {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub fields: Map<String, Value>,
}

#[derive(Debug, Serialize)]
pub struct CreateRecords {
    pub records: Vec<NewRecord>,
}

#[derive(Debug, Serialize)]
pub struct NewRecord {
    pub fields: Map<String, Value>,
}

impl Record {
    fn text(&self, field: &str) -> Option<String> {
        match self.fields.get(field)? {
            Value::String(value) => Some(value.clone()),
            Value::Number(value) => Some(value.to_string()),
            _ => None,
        }
    }

    /// Linked-record and attachment fields arrive as arrays; `Dossier ID` may be either.
    fn first_text(&self, field: &str) -> Option<String> {
        match self.fields.get(field)? {
            Value::Array(items) => items.first().and_then(Value::as_str).map(str::to_string),
            _ => self.text(field),
        }
    }

    fn count(&self, field: &str) -> usize {
        self.fields.get(field).and_then(Value::as_array).map_or(0, Vec::len)
    }
}

/// Filter formula selecting the rows of one dossier. Quotes and backslashes are escaped.
pub fn dossier_filter(dossier_id: &DossierId) -> String {
    let escaped = dossier_id.as_str().replace('\\', "\\\\").replace('"', "\\\"");
    format!("{{{FIELD_DOSSIER_ID}}}=\"{escaped}\"")
}

pub fn transcript_from_record(record: Record, fallback_dossier: &DossierId) -> TranscriptRecord {
    TranscriptRecord {
        dossier_id: record
            .first_text(FIELD_DOSSIER_ID)
            .map(DossierId)
            .unwrap_or_else(|| fallback_dossier.clone()),
        titre: record.text(FIELD_TITRE),
        texte: record.text(FIELD_TEXTE).unwrap_or_default(),
        statut: record.text(FIELD_STATUT).map(|raw| TranscriptStatus::parse(&raw)),
        id: record.id,
    }
}

pub fn dossier_from_record(record: Record) -> Dossier {
    Dossier {
        nom: record.text(FIELD_NOM_DOSSIER),
        client: record.text(FIELD_CLIENT),
        photo_count: record.count(FIELD_PHOTOS),
        id: DossierId(record.id),
    }
}

pub fn catalog_entry_from_record(record: &Record) -> PriceCatalogEntry {
    PriceCatalogEntry {
        intitule: record.text(FIELD_INTITULE).unwrap_or_default(),
        unite: record.text(FIELD_UNITE).unwrap_or_default(),
        prix_ht: record
            .fields
            .get(FIELD_PRIX_HT)
            .and_then(decimal_from_value)
            .unwrap_or(Decimal::ZERO),
        categorie: record.text(FIELD_CATEGORIE).unwrap_or_default(),
    }
}

pub fn transcript_to_fields(transcript: &NewTranscript) -> Map<String, Value> {
    let mut fields = Map::new();
    fields.insert(FIELD_TITRE.to_string(), Value::from(transcript.titre.clone()));
    fields.insert(FIELD_TEXTE.to_string(), Value::from(transcript.texte.clone()));
    fields.insert(FIELD_DOSSIER_ID.to_string(), Value::from(transcript.dossier_id.0.clone()));
    fields.insert(FIELD_STATUT.to_string(), Value::from(transcript.statut.as_str()));
    fields
}
