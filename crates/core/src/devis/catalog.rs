use std::collections::HashMap;

use rust_decimal::Decimal;

use crate::domain::catalog::PriceCatalogEntry;

/// The price catalog (bordereau), as loaded from the datastore.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Catalog {
    entries: Vec<PriceCatalogEntry>,
}

impl Catalog {
    pub fn new(entries: Vec<PriceCatalogEntry>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[PriceCatalogEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries appended to every quote at quantity 1.
    pub fn common(&self) -> impl Iterator<Item = &PriceCatalogEntry> {
        self.entries.iter().filter(|entry| entry.is_common())
    }

    /// Entries the model may choose from.
    pub fn quotable(&self) -> impl Iterator<Item = &PriceCatalogEntry> {
        self.entries.iter().filter(|entry| !entry.is_common())
    }

    /// Catalog text shown to the quote model. Common entries are never listed.
    pub fn prompt_listing(&self) -> String {
        self.quotable()
            .map(|entry| {
                format!(
                    "- {} | {} | {}€ HT | {}",
                    entry.intitule,
                    entry.unite,
                    entry.prix_ht.normalize(),
                    entry.categorie
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Lookup from normalized intitule to catalog price. Later duplicates win.
    pub fn price_index(&self) -> PriceIndex {
        let prices = self
            .entries
            .iter()
            .map(|entry| (normalize_key(&entry.intitule), entry.prix_ht))
            .collect();
        PriceIndex { prices }
    }
}

#[derive(Clone, Debug, Default)]
pub struct PriceIndex {
    prices: HashMap<String, Decimal>,
}

impl PriceIndex {
    pub fn get(&self, normalized_key: &str) -> Option<Decimal> {
        self.prices.get(normalized_key).copied()
    }
}

pub fn normalize_key(intitule: &str) -> String {
    intitule.trim().to_lowercase()
}
