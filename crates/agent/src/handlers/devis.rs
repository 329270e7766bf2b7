use async_trait::async_trait;

use chantier_core::domain::intent::Intent;
use chantier_core::domain::response::{AgentResponse, DEVIS_TRIGGER};

use super::{missing_dossier, IntentHandler, Turn};

pub const ACTION_DEVIS: &str = "lancement_devis";

/// Does not build the quote: the UI sees `data.trigger` and calls the quote endpoint itself.
#[derive(Clone, Copy, Debug, Default)]
pub struct DevisHandler;

#[async_trait]
impl IntentHandler for DevisHandler {
    fn intent(&self) -> Intent {
        Intent::Devis
    }

    async fn handle(&self, turn: &Turn<'_>) -> AgentResponse {
        if !turn.has_dossier() {
            return missing_dossier(Intent::Devis, "Selectionne un dossier pour generer un devis.");
        }

        AgentResponse::success(
            Intent::Devis,
            ACTION_DEVIS,
            "Lancement de la generation du pre-devis...",
        )
        .with_tts("Je lance la generation du pre-devis.")
        .with_data("trigger", DEVIS_TRIGGER)
        .with_data("dossierId", turn.dossier_id)
        .with_context(turn.next_context(Intent::Devis, None))
    }
}
