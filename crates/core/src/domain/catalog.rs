use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Category whose entries are appended to every quote and hidden from the model.
pub const COMMON_CATEGORY: &str = "Prestations Communes";

/// One billable line of the price catalog (bordereau).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceCatalogEntry {
    pub intitule: String,
    pub unite: String,
    pub prix_ht: Decimal,
    pub categorie: String,
}

impl PriceCatalogEntry {
    pub fn new(intitule: &str, unite: &str, prix_ht: Decimal, categorie: &str) -> Self {
        Self {
            intitule: intitule.to_string(),
            unite: unite.to_string(),
            prix_ht,
            categorie: categorie.to_string(),
        }
    }

    pub fn is_common(&self) -> bool {
        self.categorie.trim().eq_ignore_ascii_case(COMMON_CATEGORY)
    }
}
