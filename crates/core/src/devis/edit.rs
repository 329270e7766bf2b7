use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::devis::pricing::{recompute_totals, AmountOverflow};
use crate::domain::quote::Devis;

/// A manual edit made on a displayed quote. `piece` and `ligne` are zero-based positions.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum LineEdit {
    SetQuantite { piece: usize, ligne: usize, value: Decimal },
    SetPrix { piece: usize, ligne: usize, value: Decimal },
    DeleteLigne { piece: usize, ligne: usize },
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum EditError {
    #[error("piece {piece} does not exist (quote has {len} pieces)")]
    UnknownPiece { piece: usize, len: usize },
    #[error("line {ligne} does not exist in piece {piece} ({len} lines)")]
    UnknownLigne { piece: usize, ligne: usize, len: usize },
    #[error("value must not be negative, got {0}")]
    NegativeValue(Decimal),
    #[error(transparent)]
    Overflow(#[from] AmountOverflow),
}

impl LineEdit {
    fn position(&self) -> (usize, usize) {
        match *self {
            Self::SetQuantite { piece, ligne, .. }
            | Self::SetPrix { piece, ligne, .. }
            | Self::DeleteLigne { piece, ligne } => (piece, ligne),
        }
    }
}

/// Apply one edit, then recompute every total with the same routine used after generation.
///
/// A rejected edit leaves `devis` unchanged.
pub fn apply_edit(devis: &mut Devis, edit: &LineEdit) -> Result<(), EditError> {
    let (piece_idx, ligne_idx) = edit.position();
    let mut edited = devis.clone();
    let piece_count = edited.pieces.len();
    let piece = edited
        .pieces
        .get_mut(piece_idx)
        .ok_or(EditError::UnknownPiece { piece: piece_idx, len: piece_count })?;
    let ligne_count = piece.lignes.len();
    if ligne_idx >= ligne_count {
        return Err(EditError::UnknownLigne {
            piece: piece_idx,
            ligne: ligne_idx,
            len: ligne_count,
        });
    }

    match edit {
        LineEdit::SetQuantite { value, .. } => {
            ensure_non_negative(*value)?;
            piece.lignes[ligne_idx].quantite = *value;
        }
        LineEdit::SetPrix { value, .. } => {
            ensure_non_negative(*value)?;
            piece.lignes[ligne_idx].prix_unitaire_ht = *value;
        }
        LineEdit::DeleteLigne { .. } => {
            piece.lignes.remove(ligne_idx);
            if piece.lignes.is_empty() {
                edited.pieces.remove(piece_idx);
            }
        }
    }

    recompute_totals(&mut edited)?;
    *devis = edited;
    Ok(())
}

fn ensure_non_negative(value: Decimal) -> Result<(), EditError> {
    if value.is_sign_negative() && !value.is_zero() {
        return Err(EditError::NegativeValue(value));
    }
    Ok(())
}
