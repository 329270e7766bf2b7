//! Intent classification for the local fallback path.
//!
//! `classify` never fails: every problem degrades to dictation, which keeps what the user said.

use std::sync::Arc;

use tracing::{debug, warn};

use chantier_core::domain::context::AgentContext;
use chantier_core::domain::intent::{Intent, IntentResult};
use chantier_core::text::{strip_code_fences, truncate_chars};

use crate::llm::{CompletionRequest, LlmClient};

pub const DEFAULT_CONFIDENCE_FLOOR: f64 = 0.7;
const CLASSIFIER_TEMPERATURE: f32 = 0.1;
const CLASSIFIER_MAX_TOKENS: u32 = 200;

const SYSTEM_PROMPT_HEAD: &str = r#"Tu es un classifieur d'intention pour un assistant vocal de chantier BTP.
L'utilisateur est un artisan peintre qui dicte sur le terrain.

INTENTIONS POSSIBLES :
- "dictation" : L'utilisateur dicte des mesures, des observations, un releve de chantier. C'est le cas PAR DEFAUT.
- "readback" : L'utilisateur demande de relire ou rappeler ce qui a ete dicte. Mots-cles : "relis", "rappelle", "qu'est-ce que j'ai dit", "resume".
- "correction" : L'utilisateur corrige une info precedente. Mots-cles : "non c'est", "corrige", "en fait", "rectification". NECESSITE un contexte precedent.
- "devis" : L'utilisateur demande de generer un devis ou pre-devis. Mots-cles : "fais un devis", "genere le devis", "pre-devis", "chiffre-moi".
- "info" : L'utilisateur pose une question sur les donnees du dossier. Mots-cles : "combien", "est-ce que", "quel est", "donne-moi"."#;

const SYSTEM_PROMPT_TAIL: &str = r#"REGLES :
- Si le texte contient des mesures (dimensions, surfaces) sans demande explicite → "dictation"
- "correction" UNIQUEMENT si contexte precedent existe ET le texte corrige clairement quelque chose
- En cas de doute → "dictation" (on ne perd jamais de donnees)
- L'entite est le sujet principal mentionne (nom de piece, element, etc.)

Reponds UNIQUEMENT en JSON valide :
{"intent": "...", "confidence": 0.0-1.0, "entity": "..." ou null, "reasoning": "..."}"#;

pub fn system_prompt(context: Option<&AgentContext>) -> String {
    let hint = context
        .and_then(|ctx| ctx.last_intent.map(|intent| (intent, ctx)))
        .map(|(intent, ctx)| {
            format!(
                "\nCONTEXTE PRECEDENT: L'utilisateur vient de faire une action \"{intent}\" sur \
                 \"{}\". Sa derniere transcription etait: \"{}\"",
                ctx.last_entity.as_deref().unwrap_or("non specifie"),
                ctx.last_transcription.as_deref().unwrap_or_default(),
            )
        })
        .unwrap_or_default();
    format!("{SYSTEM_PROMPT_HEAD}\n{hint}\n\n{SYSTEM_PROMPT_TAIL}")
}

pub fn user_prompt(text: &str) -> String {
    format!("Texte transcrit : \"{text}\"")
}

/// Strict JSON after fence stripping. Confidence is clamped to `[0, 1]`.
pub fn parse_classification(content: &str) -> Option<IntentResult> {
    let mut result: IntentResult = serde_json::from_str(&strip_code_fences(content)).ok()?;
    result.confidence = result.confidence.clamp(0.0, 1.0);
    result.entity = result.entity.filter(|entity| !entity.trim().is_empty());
    Some(result)
}

/// Downgrades applied to every model classification, in this order.
pub fn apply_policy(
    result: IntentResult,
    context: Option<&AgentContext>,
    confidence_floor: f64,
) -> IntentResult {
    if result.confidence < confidence_floor {
        return IntentResult {
            intent: Intent::Dictation,
            reasoning: format!(
                "Confiance trop basse ({}), fallback dictation. Original: {}",
                result.confidence, result.reasoning
            ),
            ..result
        };
    }

    let has_previous_turn = context.is_some_and(|ctx| ctx.last_intent.is_some());
    if result.intent == Intent::Correction && !has_previous_turn {
        return IntentResult {
            intent: Intent::Dictation,
            reasoning: "Correction detectee mais pas de contexte precedent, fallback dictation"
                .to_string(),
            ..result
        };
    }

    result
}

fn failed_classification(text: &str) -> IntentResult {
    IntentResult::dictation(format!(
        "Erreur classification, fallback dictation pour: \"{}...\"",
        truncate_chars(text, 50)
    ))
}

pub struct IntentClassifier {
    llm: Option<Arc<dyn LlmClient>>,
    model: String,
    confidence_floor: f64,
}

impl IntentClassifier {
    pub fn new(llm: Option<Arc<dyn LlmClient>>, model: impl Into<String>, floor: f64) -> Self {
        Self { llm, model: model.into(), confidence_floor: floor }
    }

    /// `context` must already have passed the TTL check.
    pub async fn classify(&self, text: &str, context: Option<&AgentContext>) -> IntentResult {
        let Some(llm) = &self.llm else {
            return IntentResult::dictation("Pas de cle API configuree, fallback dictation");
        };

        let request = CompletionRequest {
            model: self.model.clone(),
            system: system_prompt(context),
            user: user_prompt(text),
            temperature: CLASSIFIER_TEMPERATURE,
            max_tokens: CLASSIFIER_MAX_TOKENS,
        };
        let content = match llm.complete(request).await {
            Ok(content) => content,
            Err(error) => {
                warn!(
                    event_name = "classifier.llm_failed",
                    error = %error,
                    "classification failed"
                );
                return failed_classification(text);
            }
        };

        let Some(raw) = parse_classification(&content) else {
            warn!(
                event_name = "classifier.unparseable",
                reply = %truncate_chars(&content, 120),
                "classifier reply is not valid JSON"
            );
            return failed_classification(text);
        };

        let result = apply_policy(raw, context, self.confidence_floor);
        debug!(
            event_name = "classifier.classified",
            intent = %result.intent,
            confidence = result.confidence,
            entity = result.entity.as_deref().unwrap_or_default(),
            "utterance classified"
        );
        result
    }
}
