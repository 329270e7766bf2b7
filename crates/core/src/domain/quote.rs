use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// One priced line of a pre-quote.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ligne {
    #[serde(default)]
    pub intitule: String,
    #[serde(default)]
    pub unite: String,
    #[serde(default, deserialize_with = "lenient_decimal")]
    pub quantite: Decimal,
    #[serde(default, deserialize_with = "lenient_decimal")]
    pub prix_unitaire_ht: Decimal,
    #[serde(default, deserialize_with = "lenient_decimal")]
    pub total_ht: Decimal,
}

/// A room (or the common-services block) grouping its lines.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Piece {
    #[serde(default)]
    pub nom: String,
    #[serde(default)]
    pub lignes: Vec<Ligne>,
    #[serde(default, deserialize_with = "lenient_decimal")]
    pub sous_total_ht: Decimal,
}

/// Structured pre-quote (devis). Totals are only trustworthy after reconciliation.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Devis {
    #[serde(default)]
    pub pieces: Vec<Piece>,
    #[serde(default, deserialize_with = "lenient_decimal")]
    pub total_ht: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl Devis {
    pub fn line_count(&self) -> usize {
        self.pieces.iter().map(|piece| piece.lignes.len()).sum()
    }
}

/// Model output is untrusted: numbers may arrive as strings, with a decimal comma, or be
/// missing. Anything unreadable becomes zero rather than failing the whole quote.
fn lenient_decimal<'de, D>(deserializer: D) -> Result<Decimal, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(decimal_from_value).unwrap_or(Decimal::ZERO))
}

pub fn decimal_from_value(value: &Value) -> Option<Decimal> {
    match value {
        Value::Number(number) => parse_decimal(&number.to_string()),
        Value::String(raw) => {
            let cleaned: String = raw
                .trim()
                .trim_end_matches('€')
                .chars()
                .filter(|ch| !ch.is_whitespace())
                .map(|ch| if ch == ',' { '.' } else { ch })
                .collect();
            parse_decimal(&cleaned)
        }
        _ => None,
    }
}

fn parse_decimal(raw: &str) -> Option<Decimal> {
    Decimal::from_str(raw).or_else(|_| Decimal::from_scientific(raw)).ok()
}
