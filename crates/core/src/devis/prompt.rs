use std::collections::HashSet;

use crate::domain::dossier::TranscriptRecord;
use crate::domain::quote::Devis;
use crate::errors::QuoteError;
use crate::text::strip_code_fences;

pub const QUOTE_TEMPERATURE: f32 = 0.3;
pub const QUOTE_MAX_TOKENS: u32 = 4000;

pub const QUOTE_SYSTEM_PROMPT: &str = r#"Tu es metreur pour artisans du batiment (peinture, revetements, second oeuvre). A partir du releve de visite de chantier et du bordereau de prix fourni, tu produis un pre-devis structure avec des quantites calculees.

STRUCTURE :
- Un bloc par piece. Une piece n'apparait qu'UNE SEULE FOIS : plafond, murs et sol d'une meme piece vont dans le meme bloc.
- Pour chaque travail decrit, choisis la ligne du bordereau la plus proche.
- Si le bordereau n'a qu'une ligne generique couvrant plusieurs surfaces, cree une ligne par surface en suffixant l'intitule exact du bordereau, par exemple "<intitule> — plafond" et "<intitule> — murs". Les deux lignes gardent le prix unitaire du bordereau.
- Un travail sans ligne correspondante prend l'intitule "Hors bordereau" avec un prix de 0.
- "Peinture complete" ou "tout refaire" signifie plafond + murs.

QUANTITES :
- Plafond = longueur x largeur (m2). Sol = longueur x largeur (m2).
- Murs = 2 x (longueur + largeur) x hauteur (m2), moins les ouvertures mentionnees (porte 2 m2, fenetre 1.5 m2 si non precisees).
- Lineaires (plinthes, corniches) = 2 x (longueur + largeur) en ml.
- Des cotes comme "350 par 280" sont en centimetres : 3.50 x 2.80.
- Une seule cote pour un mur est sa longueur ; hauteur mentionnee ou 2.50 m par defaut.
- Piece sans description ni cotes : quantite 0, la piece n'est jamais omise.
- Quantites arrondies a 2 decimales.

Exemple : "chambre 1, 350 par 280, hauteur 248" donne plafond 9.80 m2 et murs 2 x (3.50 + 2.80) x 2.48 = 31.25 m2.

Reponds UNIQUEMENT avec du JSON valide, sans markdown :
{"pieces":[{"nom":"Chambre 1","lignes":[{"intitule":"...","unite":"m2","quantite":31.25,"prix_unitaire_ht":12,"total_ht":375}],"sous_total_ht":375}],"total_ht":375,"notes":"..."}"#;

/// Drop byte-identical transcript texts, keeping first occurrences in order.
///
/// A dictation saved twice (original plus an identical correction) must be counted once.
pub fn dedupe_transcripts(records: &[TranscriptRecord]) -> Vec<&str> {
    let mut seen = HashSet::new();
    records
        .iter()
        .map(|record| record.texte.as_str())
        .filter(|texte| !texte.is_empty())
        .filter(|texte| seen.insert(*texte))
        .collect()
}

pub fn transcript_text(records: &[TranscriptRecord]) -> String {
    dedupe_transcripts(records).join("\n\n")
}

pub fn quote_user_prompt(transcript: &str, catalog_listing: &str) -> String {
    format!(
        "TRANSCRIPTION DU RELEVE DE CHANTIER :\n{transcript}\n\n\
         BORDEREAU DE PRIX DISPONIBLE :\n{catalog_listing}\n\n\
         Genere le pre-devis en JSON."
    )
}

/// Parse raw model output. Failure carries the raw text; there is no fallback quote.
pub fn parse_devis(content: &str) -> Result<Devis, QuoteError> {
    let cleaned = strip_code_fences(content);
    serde_json::from_str::<Devis>(&cleaned).map_err(|error| QuoteError::UnparseableReply {
        reason: error.to_string(),
        raw: content.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::{dedupe_transcripts, parse_devis, quote_user_prompt, transcript_text};
    use crate::domain::dossier::{DossierId, TranscriptRecord};
    use crate::errors::QuoteError;

    fn record(id: &str, texte: &str) -> TranscriptRecord {
        TranscriptRecord {
            id: id.into(),
            dossier_id: DossierId("d1".into()),
            titre: None,
            texte: texte.into(),
            statut: None,
        }
    }

    #[test]
    fn identical_texts_are_kept_once() {
        let records = vec![
            record("r1", "Salon 5 par 4"),
            record("r2", "Chambre 1, 350 par 280"),
            record("r3", "Salon 5 par 4"),
            record("r4", ""),
        ];
        assert_eq!(dedupe_transcripts(&records), vec!["Salon 5 par 4", "Chambre 1, 350 par 280"]);
        assert_eq!(transcript_text(&records), "Salon 5 par 4\n\nChambre 1, 350 par 280");
        assert_eq!(transcript_text(&records).matches("Salon 5 par 4").count(), 1);
    }

    #[test]
    fn near_identical_texts_are_not_merged() {
        let records = vec![record("r1", "Salon 5 par 4"), record("r2", "Salon 5 par 4 ")];
        assert_eq!(dedupe_transcripts(&records).len(), 2);
    }

    #[test]
    fn user_prompt_embeds_transcript_and_listing() {
        let prompt = quote_user_prompt("salon", "- Peinture | m2 | 12€ HT | Peinture");
        assert!(prompt.contains("salon"));
        assert!(prompt.ends_with("Genere le pre-devis en JSON."));
    }

    #[test]
    fn fenced_reply_is_parsed() {
        let devis = parse_devis(
            "```json\n{\"pieces\":[{\"nom\":\"Salon\",\"lignes\":[]}],\"total_ht\":0}\n```",
        )
        .expect("parse");
        assert_eq!(devis.pieces[0].nom, "Salon");
        assert_eq!(devis.total_ht, Decimal::ZERO);
    }

    #[test]
    fn unparseable_reply_keeps_raw_text() {
        let error = parse_devis("Voici votre devis : 1200 euros").expect_err("must fail");
        match error {
            QuoteError::UnparseableReply { raw, .. } => {
                assert_eq!(raw, "Voici votre devis : 1200 euros")
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
