use std::fs;
use std::path::Path;

use chantier_core::devis::{apply_edit, recompute_totals, EditError, LineEdit};
use chantier_core::domain::quote::Devis;
use serde::Deserialize;
use serde_json::Value;

use super::CommandResult;

const COMMAND: &str = "recalc";

/// A quote with one pending edit. A file without a `devis` key is read as a bare quote.
#[derive(Debug, Deserialize)]
struct EditedQuote {
    devis: Devis,
    #[serde(default)]
    edit: Option<LineEdit>,
}

fn parse_input(raw: &str) -> Result<(Devis, Option<LineEdit>), serde_json::Error> {
    let value: Value = serde_json::from_str(raw)?;
    if value.get("devis").is_some() {
        let edited: EditedQuote = serde_json::from_value(value)?;
        return Ok((edited.devis, edited.edit));
    }
    Ok((serde_json::from_value(value)?, None))
}

pub fn run(path: &Path, json_output: bool) -> CommandResult {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(error) => {
            return CommandResult::failure(
                COMMAND,
                "io",
                format!("could not read `{}`: {error}", path.display()),
                2,
            )
        }
    };

    let (mut devis, edit) = match parse_input(&raw) {
        Ok(parsed) => parsed,
        Err(error) => {
            return CommandResult::failure(
                COMMAND,
                "parse",
                format!("`{}` is not a quote: {error}", path.display()),
                2,
            )
        }
    };

    let outcome = match &edit {
        Some(edit) => apply_edit(&mut devis, edit),
        None => recompute_totals(&mut devis).map_err(EditError::from),
    };
    if let Err(error) = outcome {
        return CommandResult::failure(COMMAND, "invalid_edit", error.to_string(), 2);
    }

    if json_output {
        return match serde_json::to_string_pretty(&devis) {
            Ok(output) => CommandResult::raw(0, output),
            Err(error) => CommandResult::failure(COMMAND, "serialization", error.to_string(), 1),
        };
    }

    CommandResult::raw(0, render_human(&devis))
}

fn render_human(devis: &Devis) -> String {
    let mut lines = Vec::new();
    for piece in &devis.pieces {
        lines.push(format!("{} ({} EUR HT)", piece.nom, piece.sous_total_ht));
        for ligne in &piece.lignes {
            lines.push(format!(
                "  - {}: {} {} x {} = {}",
                ligne.intitule, ligne.quantite, ligne.unite, ligne.prix_unitaire_ht, ligne.total_ht
            ));
        }
    }
    lines.push(format!("TOTAL HT: {} EUR", devis.total_ht));
    lines.join("\n")
}
