use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::domain::intent::Intent;

pub const DEFAULT_CONTEXT_TTL: Duration = Duration::from_secs(5 * 60);

/// Memory of the previous turn, held by the client and echoed back on the next request.
///
/// Replaced wholesale after every turn that produces a response.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentContext {
    #[serde(default)]
    pub last_intent: Option<Intent>,
    #[serde(default)]
    pub last_entity: Option<String>,
    #[serde(default)]
    pub last_transcription: Option<String>,
    #[serde(rename = "timestamp", alias = "timestampMs")]
    pub timestamp_ms: i64,
    #[serde(default)]
    pub dossier_id: Option<String>,
}

impl AgentContext {
    pub fn for_turn(
        intent: Intent,
        entity: Option<String>,
        transcription: &str,
        dossier_id: &str,
        timestamp_ms: i64,
    ) -> Self {
        Self {
            last_intent: Some(intent),
            last_entity: entity,
            last_transcription: Some(transcription.to_string()),
            timestamp_ms,
            dossier_id: (!dossier_id.is_empty()).then(|| dossier_id.to_string()),
        }
    }

    pub fn age_ms(&self, now_ms: i64) -> i64 {
        now_ms.saturating_sub(self.timestamp_ms)
    }
}

/// TTL gate applied once, when a turn reads the client-supplied context.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ContextWindow {
    ttl: Duration,
}

impl Default for ContextWindow {
    fn default() -> Self {
        Self { ttl: DEFAULT_CONTEXT_TTL }
    }
}

impl ContextWindow {
    pub fn new(ttl: Duration) -> Self {
        Self { ttl }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn resolve(&self, context: Option<AgentContext>) -> Option<AgentContext> {
        self.resolve_at(context, now_ms())
    }

    /// Expired context is treated as absent, never as stale data.
    pub fn resolve_at(&self, context: Option<AgentContext>, now_ms: i64) -> Option<AgentContext> {
        let ttl_ms = i64::try_from(self.ttl.as_millis()).unwrap_or(i64::MAX);
        context.filter(|ctx| ctx.age_ms(now_ms) <= ttl_ms)
    }
}

pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::{AgentContext, ContextWindow};
    use crate::domain::intent::Intent;

    const NOW: i64 = 1_700_000_000_000;

    fn context(timestamp_ms: i64) -> AgentContext {
        let entity = Some("chambre 1".to_string());
        AgentContext::for_turn(Intent::Dictation, entity, "3 par 4", "rec1", timestamp_ms)
    }

    #[test]
    fn fresh_context_is_returned_unchanged() {
        let window = ContextWindow::default();
        let ctx = context(NOW - 60_000);
        assert_eq!(window.resolve_at(Some(ctx.clone()), NOW), Some(ctx));
    }

    #[test]
    fn context_older_than_five_minutes_is_absent() {
        let window = ContextWindow::default();
        assert_eq!(window.resolve_at(Some(context(NOW - 5 * 60_000 - 1)), NOW), None);
    }

    #[test]
    fn context_at_exact_ttl_boundary_is_kept() {
        let window = ContextWindow::new(Duration::from_secs(10));
        assert!(window.resolve_at(Some(context(NOW - 10_000)), NOW).is_some());
    }

    #[test]
    fn wire_format_uses_client_field_names() {
        let json = serde_json::to_value(context(NOW)).expect("serialize");
        assert_eq!(json["lastIntent"], "dictation");
        assert_eq!(json["lastEntity"], "chambre 1");
        assert_eq!(json["timestamp"], NOW);
        assert_eq!(json["dossierId"], "rec1");

        let parsed: AgentContext = serde_json::from_value(serde_json::json!({
            "lastIntent": null,
            "timestampMs": NOW
        }))
        .expect("parse");
        assert_eq!(parsed.timestamp_ms, NOW);
        assert_eq!(parsed.last_intent, None);
    }

    #[test]
    fn empty_dossier_is_not_recorded() {
        let ctx = AgentContext::for_turn(Intent::Info, None, "combien", "", NOW);
        assert_eq!(ctx.dossier_id, None);
    }
}
