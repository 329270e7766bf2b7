use std::env;
use std::fs;
use std::sync::{Mutex, OnceLock};

use chantier_cli::commands::{config, doctor, recalc, turn};
use serde_json::Value;

#[test]
fn config_redacts_secrets_and_attributes_env_sources() {
    with_env(
        &[
            ("CHANTIER_LLM_API_KEY", "sk-live-very-secret"),
            ("CHANTIER_LLM_MODEL", "openai/gpt-4o-mini"),
        ],
        || {
            let output = config::run();

            assert!(output.starts_with("effective config"));
            assert!(!output.contains("sk-live-very-secret"));
            assert!(output.contains(
                "- llm.api_key = <redacted> (source: env (CHANTIER_LLM_API_KEY))"
            ));
            assert!(output.contains(
                "- llm.model = openai/gpt-4o-mini (source: env (CHANTIER_LLM_MODEL))"
            ));
            assert!(output.contains("- datastore.token = <unset> (source: default)"));
        },
    );
}

#[test]
fn config_reports_validation_failures() {
    with_env(&[("CHANTIER_ORCHESTRATOR_URL", "ftp://nowhere")], || {
        let output = config::run();
        assert!(output.starts_with("config validation failed"));
        assert!(output.contains("orchestrator.url"));
    });
}

#[test]
fn doctor_json_reports_degraded_components() {
    with_env(&[], || {
        let payload = parse_payload(&doctor::run(true));

        assert_eq!(payload["overall_status"], "warn");
        let checks = payload["checks"].as_array().expect("checks array");
        let status_of = |name: &str| {
            checks
                .iter()
                .find(|check| check["name"] == name)
                .map(|check| check["status"].clone())
                .unwrap_or(Value::Null)
        };
        assert_eq!(status_of("config_validation"), "pass");
        assert_eq!(status_of("llm_readiness"), "warn");
        assert_eq!(status_of("datastore_readiness"), "warn");
        assert_eq!(status_of("runtime_assembly"), "pass");
    });
}

#[test]
fn doctor_fails_on_half_configured_datastore() {
    with_env(&[("CHANTIER_DATASTORE_TOKEN", "pat-test")], || {
        let output = doctor::run(false);
        assert!(output.starts_with("doctor: one or more readiness checks failed"));
        assert!(output.contains("- [fail] config_validation:"));
        assert!(output.contains("- [skip] runtime_assembly:"));
    });
}

#[test]
fn recalc_recomputes_totals_from_a_file() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("devis.json");
    fs::write(
        &path,
        r#"{"pieces":[{"nom":"Salon","lignes":[
            {"intitule":"Peinture murs","unite":"m2","quantite":"36","prix_unitaire_ht":"12,5",
             "total_ht":0}
        ],"sous_total_ht":0}],"total_ht":999}"#,
    )
    .expect("write devis");

    let result = recalc::run(&path, true);
    assert_eq!(result.exit_code, 0, "unexpected output: {}", result.output);

    let payload = parse_payload(&result.output);
    assert_eq!(payload["total_ht"], 450.0);
    assert_eq!(payload["pieces"][0]["sous_total_ht"], 450.0);
    assert_eq!(payload["pieces"][0]["lignes"][0]["total_ht"], 450.0);
}

#[test]
fn recalc_applies_an_edit_and_drops_emptied_pieces() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("edited.json");
    fs::write(
        &path,
        r#"{"devis":{"pieces":[
              {"nom":"Salon","lignes":[{"intitule":"Peinture murs","unite":"m2",
                "quantite":10,"prix_unitaire_ht":12,"total_ht":120}],"sous_total_ht":120},
              {"nom":"Cuisine","lignes":[{"intitule":"Peinture plafond","unite":"m2",
                "quantite":5,"prix_unitaire_ht":14,"total_ht":70}],"sous_total_ht":70}
            ],"total_ht":190},
            "edit":{"op":"delete_ligne","piece":0,"ligne":0}}"#,
    )
    .expect("write devis");

    let result = recalc::run(&path, false);
    assert_eq!(result.exit_code, 0, "unexpected output: {}", result.output);
    assert!(!result.output.contains("Salon"));
    assert!(result.output.contains("Cuisine"));
    assert!(result.output.ends_with("TOTAL HT: 70 EUR"));
}

#[test]
fn recalc_reports_unreadable_input() {
    let dir = tempfile::tempdir().expect("temp dir");

    let missing = recalc::run(&dir.path().join("missing.json"), false);
    assert_eq!(missing.exit_code, 2);
    assert_eq!(parse_payload(&missing.output)["error_class"], "io");

    let path = dir.path().join("broken.json");
    fs::write(&path, r#"{"devis":{"pieces":[]},"edit":{"op":"explode"}}"#).expect("write");
    let broken = recalc::run(&path, false);
    assert_eq!(broken.exit_code, 2);
    let payload = parse_payload(&broken.output);
    assert_eq!(payload["command"], "recalc");
    assert_eq!(payload["error_class"], "parse");
}

#[test]
fn turn_without_upstreams_dictates_locally() {
    with_env(&[], || {
        let result = turn::run("Salon, 5 par 4, hauteur 2,50", Some("rec1".to_string()));
        assert_eq!(result.exit_code, 0, "unexpected output: {}", result.output);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["success"], true);
        assert_eq!(payload["intent"], "dictation");
        assert_eq!(payload["message"], "Salon, 5 par 4, hauteur 2,50");
        assert_eq!(payload["data"]["_fallback"], true);
        assert_eq!(payload["data"]["_fallback_reason"], "orchestrator_unavailable");
    });
}

#[test]
fn readback_turn_bypasses_the_orchestrator() {
    with_env(&[("CHANTIER_ORCHESTRATOR_URL", "http://127.0.0.1:9/unreachable")], || {
        let result = turn::run("relis tout ce qui a été dicté", Some("rec1".to_string()));

        let payload = parse_payload(&result.output);
        assert_eq!(payload["intent"], "readback");
        assert_eq!(payload["data"]["_bypass"], "readback");
        assert!(payload["data"].get("_fallback").is_none());
        assert_eq!(payload["action"], "erreur_airtable");
        assert_eq!(result.exit_code, 1);
    });
}

#[test]
fn turn_rejects_empty_text() {
    let result = turn::run("   ", None);
    assert_eq!(result.exit_code, 2);

    let payload = parse_payload(&result.output);
    assert_eq!(payload["command"], "turn");
    assert_eq!(payload["error_class"], "invalid_input");
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid json")
}

fn env_lock() -> &'static Mutex<()> {
    static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    LOCK.get_or_init(|| Mutex::new(()))
}

fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    let _guard = env_lock().lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    let keys = [
        "CHANTIER_LLM_API_KEY",
        "CHANTIER_LLM_BASE_URL",
        "CHANTIER_LLM_MODEL",
        "CHANTIER_LLM_QUOTE_MODEL",
        "CHANTIER_LLM_TIMEOUT_SECS",
        "CHANTIER_LLM_QUOTE_TIMEOUT_SECS",
        "CHANTIER_DATASTORE_TOKEN",
        "CHANTIER_DATASTORE_BASE_ID",
        "CHANTIER_DATASTORE_BASE_URL",
        "CHANTIER_DATASTORE_TIMEOUT_SECS",
        "CHANTIER_ORCHESTRATOR_URL",
        "CHANTIER_ORCHESTRATOR_TIMEOUT_SECS",
        "CHANTIER_ORCHESTRATOR_READBACK_URL",
        "CHANTIER_ORCHESTRATOR_CORRECTION_URL",
        "CHANTIER_ORCHESTRATOR_INFO_URL",
        "CHANTIER_AGENT_CONFIDENCE_FLOOR",
        "CHANTIER_AGENT_CONTEXT_TTL_SECS",
        "CHANTIER_AGENT_READBACK_TTS_CHARS",
        "CHANTIER_AGENT_ROOM_SUFFIXES",
        "CHANTIER_SERVER_BIND_ADDRESS",
        "CHANTIER_SERVER_PORT",
        "CHANTIER_LOGGING_LEVEL",
        "CHANTIER_LOGGING_FORMAT",
    ];

    let previous_values: Vec<(&str, Option<String>)> =
        keys.iter().map(|key| (*key, env::var(key).ok())).collect();

    for key in &keys {
        env::remove_var(key);
    }
    for (key, value) in vars {
        env::set_var(key, value);
    }

    test_fn();

    for (key, value) in previous_values {
        if let Some(value) = value {
            env::set_var(key, value);
        } else {
            env::remove_var(key);
        }
    }
}
