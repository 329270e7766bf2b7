use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use chantier_core::config::{AppConfig, LoadOptions, DEFAULT_CONFIG_FILES};
use secrecy::SecretString;
use toml::Value;

/// One reported key: its dotted path, the env var that overrides it and the rendered value.
struct Field {
    key: &'static str,
    env_key: &'static str,
    value: String,
}

impl Field {
    fn new(key: &'static str, env_key: &'static str, value: impl ToString) -> Self {
        Self { key, env_key, value: value.to_string() }
    }
}

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for field in fields(&config) {
        let source = field_source(
            field.key,
            Some(field.env_key),
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        );
        lines.push(render_line(field.key, &field.value, source));
    }

    lines.join("\n")
}

fn fields(config: &AppConfig) -> Vec<Field> {
    let llm = &config.llm;
    let datastore = &config.datastore;
    let orchestrator = &config.orchestrator;
    let agent = &config.agent;

    vec![
        Field::new("llm.api_key", "CHANTIER_LLM_API_KEY", redact_secret(llm.api_key.as_ref())),
        Field::new("llm.base_url", "CHANTIER_LLM_BASE_URL", &llm.base_url),
        Field::new("llm.model", "CHANTIER_LLM_MODEL", &llm.model),
        Field::new("llm.quote_model", "CHANTIER_LLM_QUOTE_MODEL", &llm.quote_model),
        Field::new("llm.timeout_secs", "CHANTIER_LLM_TIMEOUT_SECS", llm.timeout_secs),
        Field::new(
            "llm.quote_timeout_secs",
            "CHANTIER_LLM_QUOTE_TIMEOUT_SECS",
            llm.quote_timeout_secs,
        ),
        Field::new(
            "datastore.token",
            "CHANTIER_DATASTORE_TOKEN",
            redact_secret(datastore.token.as_ref()),
        ),
        Field::new(
            "datastore.base_id",
            "CHANTIER_DATASTORE_BASE_ID",
            optional(datastore.base_id.as_deref()),
        ),
        Field::new("datastore.base_url", "CHANTIER_DATASTORE_BASE_URL", &datastore.base_url),
        Field::new(
            "datastore.transcripts_table",
            "CHANTIER_DATASTORE_TRANSCRIPTS_TABLE",
            &datastore.transcripts_table,
        ),
        Field::new(
            "datastore.dossiers_table",
            "CHANTIER_DATASTORE_DOSSIERS_TABLE",
            &datastore.dossiers_table,
        ),
        Field::new(
            "datastore.catalog_table",
            "CHANTIER_DATASTORE_CATALOG_TABLE",
            &datastore.catalog_table,
        ),
        Field::new(
            "orchestrator.url",
            "CHANTIER_ORCHESTRATOR_URL",
            optional(orchestrator.url.as_deref()),
        ),
        Field::new(
            "orchestrator.timeout_secs",
            "CHANTIER_ORCHESTRATOR_TIMEOUT_SECS",
            orchestrator.timeout_secs,
        ),
        Field::new(
            "orchestrator.readback_url",
            "CHANTIER_ORCHESTRATOR_READBACK_URL",
            optional(orchestrator.readback_url.as_deref()),
        ),
        Field::new(
            "orchestrator.correction_url",
            "CHANTIER_ORCHESTRATOR_CORRECTION_URL",
            optional(orchestrator.correction_url.as_deref()),
        ),
        Field::new(
            "orchestrator.info_url",
            "CHANTIER_ORCHESTRATOR_INFO_URL",
            optional(orchestrator.info_url.as_deref()),
        ),
        Field::new(
            "agent.confidence_floor",
            "CHANTIER_AGENT_CONFIDENCE_FLOOR",
            agent.confidence_floor,
        ),
        Field::new(
            "agent.context_ttl_secs",
            "CHANTIER_AGENT_CONTEXT_TTL_SECS",
            agent.context_ttl_secs,
        ),
        Field::new(
            "agent.readback_tts_chars",
            "CHANTIER_AGENT_READBACK_TTS_CHARS",
            agent.readback_tts_chars,
        ),
        Field::new(
            "agent.room_suffixes",
            "CHANTIER_AGENT_ROOM_SUFFIXES",
            agent.room_suffixes.join(","),
        ),
        Field::new(
            "server.bind_address",
            "CHANTIER_SERVER_BIND_ADDRESS",
            &config.server.bind_address,
        ),
        Field::new("server.port", "CHANTIER_SERVER_PORT", config.server.port),
        Field::new("logging.level", "CHANTIER_LOGGING_LEVEL", &config.logging.level),
        Field::new(
            "logging.format",
            "CHANTIER_LOGGING_FORMAT",
            format!("{:?}", config.logging.format),
        ),
    ]
}

fn detect_config_path() -> Option<PathBuf> {
    DEFAULT_CONFIG_FILES.into_iter().map(PathBuf::from).find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_key: Option<&str>,
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_key {
        if env::var_os(env_key).is_some() {
            return format!("env ({env_key})");
        }
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

fn redact_secret(secret: Option<&SecretString>) -> &'static str {
    if secret.is_some() {
        "<redacted>"
    } else {
        "<unset>"
    }
}

fn optional(value: Option<&str>) -> &str {
    value.unwrap_or("<unset>")
}

#[cfg(test)]
mod tests {
    use toml::Value;

    use super::{contains_path, field_source};

    #[test]
    fn file_source_requires_the_full_key_path() {
        let doc: Value = "[llm]\nmodel = \"x\"\n".parse().expect("toml");
        assert!(contains_path(&doc, "llm.model"));
        assert!(!contains_path(&doc, "llm.base_url"));
        assert!(!contains_path(&doc, "agent.context_ttl_secs"));
    }

    #[test]
    fn unset_key_falls_back_to_default_source() {
        let source = field_source("llm.model", Some("CHANTIER_TEST_UNSET_KEY"), None, None);
        assert_eq!(source, "default");
    }
}
