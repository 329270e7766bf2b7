use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::devis::catalog::{normalize_key, Catalog, PriceIndex};
use crate::domain::quote::{Devis, Ligne, Piece};

pub const COMMON_PIECE_NAME: &str = "Prestations communes";

pub const DEFAULT_ROOM_SUFFIXES: [&str; 4] = ["plafond", "murs", "sol", "mur"];

/// Surface words the model appends to a generic catalog line, e.g. `<intitule> — plafond`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RoomSuffixes {
    words: Vec<String>,
}

impl Default for RoomSuffixes {
    fn default() -> Self {
        Self::new(DEFAULT_ROOM_SUFFIXES)
    }
}

impl RoomSuffixes {
    pub fn new<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut words: Vec<String> = words
            .into_iter()
            .map(|word| word.as_ref().trim().to_lowercase())
            .filter(|word| !word.is_empty())
            .collect();
        // "murs" has to be tried before "mur".
        words.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        words.dedup();
        Self { words }
    }

    /// Base intitule of a suffixed variant, or `None` when `key` carries no known suffix.
    ///
    /// `key` must already be normalized (trimmed, lower-cased).
    pub fn strip<'a>(&self, key: &'a str) -> Option<&'a str> {
        self.words.iter().find_map(|word| {
            let head = key.strip_suffix(word.as_str())?.trim_end();
            let base = head
                .strip_suffix('—')
                .or_else(|| head.strip_suffix('–'))
                .or_else(|| head.strip_suffix('-'))?;
            Some(base.trim())
        })
    }
}

/// Half-up rounding to cents.
pub fn round_cents(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// A quantity or price too large for the totals to be represented.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum AmountOverflow {
    #[error("line `{intitule}` in piece `{piece}` overflows the supported amount range")]
    Ligne { piece: String, intitule: String },
    #[error("subtotal of piece `{0}` overflows the supported amount range")]
    Piece(String),
    #[error("quote total overflows the supported amount range")]
    Total,
}

/// Recompute every line total, piece subtotal and the grand total from quantity × unit price.
///
/// Rounds after each aggregation step. This is the only place totals are computed, whether
/// the quote was just generated or edited by hand. On overflow the quote is left untouched.
pub fn recompute_totals(devis: &mut Devis) -> Result<(), AmountOverflow> {
    let mut pieces = Vec::with_capacity(devis.pieces.len());
    let mut total = Decimal::ZERO;
    for piece in &devis.pieces {
        let mut lignes = Vec::with_capacity(piece.lignes.len());
        let mut sous_total = Decimal::ZERO;
        for ligne in &piece.lignes {
            let ligne_total = ligne
                .quantite
                .checked_mul(ligne.prix_unitaire_ht)
                .map(round_cents)
                .ok_or_else(|| AmountOverflow::Ligne {
                    piece: piece.nom.clone(),
                    intitule: ligne.intitule.clone(),
                })?;
            sous_total = sous_total
                .checked_add(ligne_total)
                .ok_or_else(|| AmountOverflow::Piece(piece.nom.clone()))?;
            lignes.push(ligne_total);
        }
        let sous_total = round_cents(sous_total);
        total = total.checked_add(sous_total).ok_or(AmountOverflow::Total)?;
        pieces.push((sous_total, lignes));
    }

    for (piece, (sous_total, lignes)) in devis.pieces.iter_mut().zip(pieces) {
        for (ligne, ligne_total) in piece.lignes.iter_mut().zip(lignes) {
            ligne.total_ht = ligne_total;
        }
        piece.sous_total_ht = sous_total;
    }
    devis.total_ht = round_cents(total);
    Ok(())
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationReport {
    pub repriced_lines: usize,
    pub unmatched_lines: Vec<String>,
    pub common_lines: usize,
}

pub trait QuoteReconciler: Send + Sync {
    fn reconcile(
        &self,
        devis: &mut Devis,
        catalog: &Catalog,
    ) -> Result<ReconciliationReport, AmountOverflow>;
}

/// Forces catalog prices onto generated lines, then recomputes all totals.
#[derive(Clone, Debug, Default)]
pub struct CatalogReconciler {
    suffixes: RoomSuffixes,
}

impl CatalogReconciler {
    pub fn new(suffixes: RoomSuffixes) -> Self {
        Self { suffixes }
    }

    fn catalog_price(&self, index: &PriceIndex, intitule: &str) -> Option<Decimal> {
        let key = normalize_key(intitule);
        index.get(&key).or_else(|| self.suffixes.strip(&key).and_then(|base| index.get(base)))
    }
}

impl QuoteReconciler for CatalogReconciler {
    fn reconcile(
        &self,
        devis: &mut Devis,
        catalog: &Catalog,
    ) -> Result<ReconciliationReport, AmountOverflow> {
        let index = catalog.price_index();
        let mut report = ReconciliationReport::default();

        let common: Vec<Ligne> = catalog
            .common()
            .map(|entry| Ligne {
                intitule: entry.intitule.clone(),
                unite: entry.unite.clone(),
                quantite: Decimal::ONE,
                prix_unitaire_ht: entry.prix_ht,
                total_ht: Decimal::ZERO,
            })
            .collect();

        // A previous pass already appended the common block; rebuild it instead of stacking.
        // A block the model named the same way but filled with other work is kept.
        if !common.is_empty() {
            let common_keys: Vec<String> =
                common.iter().map(|ligne| normalize_key(&ligne.intitule)).collect();
            devis.pieces.retain(|piece| !is_common_block(piece, &common_keys));
        }

        for ligne in devis.pieces.iter_mut().flat_map(|piece| piece.lignes.iter_mut()) {
            match self.catalog_price(&index, &ligne.intitule) {
                Some(price) => {
                    if ligne.prix_unitaire_ht != price {
                        report.repriced_lines += 1;
                    }
                    ligne.prix_unitaire_ht = price;
                }
                None => report.unmatched_lines.push(ligne.intitule.clone()),
            }
        }

        if !common.is_empty() {
            report.common_lines = common.len();
            devis.pieces.push(Piece {
                nom: COMMON_PIECE_NAME.to_string(),
                lignes: common,
                sous_total_ht: Decimal::ZERO,
            });
        }

        recompute_totals(devis)?;
        Ok(report)
    }
}

fn is_common_block(piece: &Piece, common_keys: &[String]) -> bool {
    piece.nom.trim().eq_ignore_ascii_case(COMMON_PIECE_NAME)
        && piece
            .lignes
            .iter()
            .all(|ligne| common_keys.contains(&normalize_key(&ligne.intitule)))
}
