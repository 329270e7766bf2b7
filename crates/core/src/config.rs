use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

use crate::devis::pricing::{RoomSuffixes, DEFAULT_ROOM_SUFFIXES};
use crate::domain::context::ContextWindow;
use crate::domain::intent::Intent;

pub const DEFAULT_CONFIG_FILES: [&str; 2] = ["chantier.toml", "config/chantier.toml"];

/// Built once at start and handed to every component. Missing file keys keep their defaults.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub llm: LlmConfig,
    pub datastore: DatastoreConfig,
    pub orchestrator: OrchestratorConfig,
    pub agent: AgentConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Absent key means no LLM: classification degrades to dictation, readback skips
    /// extraction, info answers with raw counts, quote generation is refused.
    #[serde(deserialize_with = "optional_secret")]
    pub api_key: Option<SecretString>,
    pub base_url: String,
    pub model: String,
    pub quote_model: String,
    pub timeout_secs: u64,
    pub quote_timeout_secs: u64,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct DatastoreConfig {
    #[serde(deserialize_with = "optional_secret")]
    pub token: Option<SecretString>,
    pub base_id: Option<String>,
    pub base_url: String,
    pub timeout_secs: u64,
    pub transcripts_table: String,
    pub dossiers_table: String,
    pub catalog_table: String,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    pub url: Option<String>,
    pub timeout_secs: u64,
    pub subagent_timeout_secs: u64,
    pub readback_url: Option<String>,
    pub correction_url: Option<String>,
    pub info_url: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub confidence_floor: f64,
    pub context_ttl_secs: u64,
    pub readback_tts_chars: usize,
    pub room_suffixes: Vec<String>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

/// Programmatic values applied after the file and the environment.
#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub log_level: Option<String>,
    pub llm_api_key: Option<String>,
    pub llm_model: Option<String>,
    pub orchestrator_url: Option<String>,
    pub datastore_base_id: Option<String>,
    pub server_port: Option<u16>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("`{path}` is not valid TOML config: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("config file `{0}` is required but missing")]
    MissingConfigFile(PathBuf),
    #[error("`${{{var}}}` is referenced in the config file but not set")]
    MissingEnvInterpolation { var: String },
    #[error("`${{` without a closing `}}` in the config file")]
    UnterminatedInterpolation,
    #[error("cannot parse `{key}={value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("invalid configuration: {0}")]
    Validation(String),
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://openrouter.ai/api/v1".to_string(),
            model: "anthropic/claude-3.5-haiku".to_string(),
            quote_model: "anthropic/claude-3.5-sonnet".to_string(),
            timeout_secs: 30,
            quote_timeout_secs: 120,
        }
    }
}

impl Default for DatastoreConfig {
    fn default() -> Self {
        Self {
            token: None,
            base_id: None,
            base_url: "https://api.airtable.com/v0".to_string(),
            timeout_secs: 20,
            transcripts_table: "Transcriptions".to_string(),
            dossiers_table: "Dossiers".to_string(),
            catalog_table: "Bordereau".to_string(),
        }
    }
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            url: None,
            timeout_secs: 30,
            subagent_timeout_secs: 15,
            readback_url: None,
            correction_url: None,
            info_url: None,
        }
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            confidence_floor: 0.7,
            context_ttl_secs: 300,
            readback_tts_chars: 500,
            room_suffixes: DEFAULT_ROOM_SUFFIXES.iter().map(|word| word.to_string()).collect(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { bind_address: "127.0.0.1".to_string(), port: 8080, graceful_shutdown_secs: 15 }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), format: LogFormat::Compact }
    }
}

impl LlmConfig {
    pub fn is_configured(&self) -> bool {
        self.api_key.as_ref().is_some_and(|key| !key.expose_secret().trim().is_empty())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn quote_timeout(&self) -> Duration {
        Duration::from_secs(self.quote_timeout_secs)
    }
}

impl DatastoreConfig {
    pub fn is_configured(&self) -> bool {
        self.token.is_some() && self.base_id.is_some()
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl OrchestratorConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn subagent_timeout(&self) -> Duration {
        Duration::from_secs(self.subagent_timeout_secs)
    }

    /// Per-intent sub-agent webhook. Only readback, correction and info have one.
    pub fn subagent_url(&self, intent: Intent) -> Option<&str> {
        match intent {
            Intent::Readback => self.readback_url.as_deref(),
            Intent::Correction => self.correction_url.as_deref(),
            Intent::Info => self.info_url.as_deref(),
            Intent::Dictation | Intent::Devis => None,
        }
    }
}

impl AgentConfig {
    pub fn context_window(&self) -> ContextWindow {
        ContextWindow::new(Duration::from_secs(self.context_ttl_secs))
    }

    pub fn room_suffixes(&self) -> RoomSuffixes {
        RoomSuffixes::new(&self.room_suffixes)
    }
}

impl FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "logging.format `{other}` is not one of compact|pretty|json"
            ))),
        }
    }
}

fn optional_secret<'de, D>(deserializer: D) -> Result<Option<SecretString>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.map(SecretString::from))
}

impl AppConfig {
    /// Defaults, then the TOML file, then `CHANTIER_*` variables, then `options.overrides`.
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = match locate_config_file(options.config_path.as_deref()) {
            Some(path) => read_config_file(&path)?,
            None if options.require_file => {
                let expected =
                    options.config_path.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILES[0]));
                return Err(ConfigError::MissingConfigFile(expected));
            }
            None => Self::default(),
        };

        config.apply_env()?;
        config.apply_overrides(options.overrides);
        config.validate()?;
        Ok(config)
    }

    fn apply_env(&mut self) -> Result<(), ConfigError> {
        let llm = &mut self.llm;
        if let Some(key) = read_env("CHANTIER_LLM_API_KEY") {
            llm.api_key = Some(SecretString::from(key));
        }
        env_string(&mut llm.base_url, "CHANTIER_LLM_BASE_URL");
        env_string(&mut llm.model, "CHANTIER_LLM_MODEL");
        env_string(&mut llm.quote_model, "CHANTIER_LLM_QUOTE_MODEL");
        env_parsed(&mut llm.timeout_secs, "CHANTIER_LLM_TIMEOUT_SECS")?;
        env_parsed(&mut llm.quote_timeout_secs, "CHANTIER_LLM_QUOTE_TIMEOUT_SECS")?;

        let datastore = &mut self.datastore;
        if let Some(token) = read_env("CHANTIER_DATASTORE_TOKEN") {
            datastore.token = Some(SecretString::from(token));
        }
        env_optional(&mut datastore.base_id, "CHANTIER_DATASTORE_BASE_ID");
        env_string(&mut datastore.base_url, "CHANTIER_DATASTORE_BASE_URL");
        env_parsed(&mut datastore.timeout_secs, "CHANTIER_DATASTORE_TIMEOUT_SECS")?;
        env_string(&mut datastore.transcripts_table, "CHANTIER_DATASTORE_TRANSCRIPTS_TABLE");
        env_string(&mut datastore.dossiers_table, "CHANTIER_DATASTORE_DOSSIERS_TABLE");
        env_string(&mut datastore.catalog_table, "CHANTIER_DATASTORE_CATALOG_TABLE");

        let orchestrator = &mut self.orchestrator;
        env_optional(&mut orchestrator.url, "CHANTIER_ORCHESTRATOR_URL");
        env_parsed(&mut orchestrator.timeout_secs, "CHANTIER_ORCHESTRATOR_TIMEOUT_SECS")?;
        env_parsed(
            &mut orchestrator.subagent_timeout_secs,
            "CHANTIER_ORCHESTRATOR_SUBAGENT_TIMEOUT_SECS",
        )?;
        env_optional(&mut orchestrator.readback_url, "CHANTIER_ORCHESTRATOR_READBACK_URL");
        env_optional(&mut orchestrator.correction_url, "CHANTIER_ORCHESTRATOR_CORRECTION_URL");
        env_optional(&mut orchestrator.info_url, "CHANTIER_ORCHESTRATOR_INFO_URL");

        let agent = &mut self.agent;
        env_parsed(&mut agent.confidence_floor, "CHANTIER_AGENT_CONFIDENCE_FLOOR")?;
        env_parsed(&mut agent.context_ttl_secs, "CHANTIER_AGENT_CONTEXT_TTL_SECS")?;
        env_parsed(&mut agent.readback_tts_chars, "CHANTIER_AGENT_READBACK_TTS_CHARS")?;
        if let Some(words) = read_env("CHANTIER_AGENT_ROOM_SUFFIXES") {
            agent.room_suffixes = words
                .split(',')
                .map(str::trim)
                .filter(|word| !word.is_empty())
                .map(str::to_string)
                .collect();
        }

        let server = &mut self.server;
        env_string(&mut server.bind_address, "CHANTIER_SERVER_BIND_ADDRESS");
        env_parsed(&mut server.port, "CHANTIER_SERVER_PORT")?;
        env_parsed(&mut server.graceful_shutdown_secs, "CHANTIER_SERVER_GRACEFUL_SHUTDOWN_SECS")?;

        env_string(&mut self.logging.level, "CHANTIER_LOGGING_LEVEL");
        env_parsed(&mut self.logging.format, "CHANTIER_LOGGING_FORMAT")?;
        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(level) = overrides.log_level {
            self.logging.level = level;
        }
        if let Some(key) = overrides.llm_api_key {
            self.llm.api_key = Some(SecretString::from(key));
        }
        if let Some(model) = overrides.llm_model {
            self.llm.model = model;
        }
        if overrides.orchestrator_url.is_some() {
            self.orchestrator.url = overrides.orchestrator_url;
        }
        if overrides.datastore_base_id.is_some() {
            self.datastore.base_id = overrides.datastore_base_id;
        }
        if let Some(port) = overrides.server_port {
            self.server.port = port;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_llm(&self.llm)?;
        validate_datastore(&self.datastore)?;
        validate_orchestrator(&self.orchestrator)?;
        validate_agent(&self.agent)?;
        validate_server(&self.server)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn locate_config_file(explicit: Option<&Path>) -> Option<PathBuf> {
    match explicit {
        Some(path) => path.exists().then(|| path.to_path_buf()),
        None => DEFAULT_CONFIG_FILES.iter().map(PathBuf::from).find(|candidate| candidate.exists()),
    }
}

fn read_config_file(path: &Path) -> Result<AppConfig, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;
    toml::from_str(&expand_env_refs(&raw)?)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

/// Replaces each `${VAR}` with the value of the environment variable `VAR`.
fn expand_env_refs(raw: &str) -> Result<String, ConfigError> {
    let mut expanded = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(open) = rest.find("${") {
        expanded.push_str(&rest[..open]);
        let tail = &rest[open + 2..];
        let close = tail.find('}').ok_or(ConfigError::UnterminatedInterpolation)?;
        let var = &tail[..close];
        let value = env::var(var)
            .map_err(|_| ConfigError::MissingEnvInterpolation { var: var.to_string() })?;
        expanded.push_str(&value);
        rest = &tail[close + 1..];
    }
    expanded.push_str(rest);
    Ok(expanded)
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn env_string(target: &mut String, key: &str) {
    if let Some(value) = read_env(key) {
        *target = value;
    }
}

fn env_optional(target: &mut Option<String>, key: &str) {
    if let Some(value) = read_env(key) {
        *target = Some(value);
    }
}

fn env_parsed<T: FromStr>(target: &mut T, key: &str) -> Result<(), ConfigError> {
    if let Some(value) = read_env(key) {
        let parsed: Result<T, _> = value.trim().parse();
        *target = parsed
            .map_err(|_| ConfigError::InvalidEnvOverride { key: key.to_string(), value })?;
    }
    Ok(())
}

fn validate_url(key: &str, url: &str) -> Result<(), ConfigError> {
    if url.starts_with("http://") || url.starts_with("https://") {
        return Ok(());
    }
    Err(ConfigError::Validation(format!("{key} must start with http:// or https://")))
}

fn validate_timeout(key: &str, secs: u64) -> Result<(), ConfigError> {
    if secs == 0 || secs > 300 {
        return Err(ConfigError::Validation(format!("{key} must be in range 1..=300")));
    }
    Ok(())
}

fn validate_llm(llm: &LlmConfig) -> Result<(), ConfigError> {
    validate_url("llm.base_url", &llm.base_url)?;
    validate_timeout("llm.timeout_secs", llm.timeout_secs)?;
    validate_timeout("llm.quote_timeout_secs", llm.quote_timeout_secs)?;

    if llm.model.trim().is_empty() || llm.quote_model.trim().is_empty() {
        return Err(ConfigError::Validation(
            "llm.model and llm.quote_model must not be empty".to_string(),
        ));
    }

    Ok(())
}

fn validate_datastore(datastore: &DatastoreConfig) -> Result<(), ConfigError> {
    validate_url("datastore.base_url", &datastore.base_url)?;
    validate_timeout("datastore.timeout_secs", datastore.timeout_secs)?;

    match (&datastore.token, &datastore.base_id) {
        (Some(_), None) => {
            return Err(ConfigError::Validation(
                "datastore.base_id is required when datastore.token is set".to_string(),
            ))
        }
        (None, Some(_)) => {
            return Err(ConfigError::Validation(
                "datastore.token is required when datastore.base_id is set".to_string(),
            ))
        }
        _ => {}
    }

    let tables = [
        ("datastore.transcripts_table", &datastore.transcripts_table),
        ("datastore.dossiers_table", &datastore.dossiers_table),
        ("datastore.catalog_table", &datastore.catalog_table),
    ];
    if let Some((key, _)) = tables.iter().find(|(_, name)| name.trim().is_empty()) {
        return Err(ConfigError::Validation(format!("{key} must not be empty")));
    }

    Ok(())
}

fn validate_orchestrator(orchestrator: &OrchestratorConfig) -> Result<(), ConfigError> {
    validate_timeout("orchestrator.timeout_secs", orchestrator.timeout_secs)?;
    validate_timeout("orchestrator.subagent_timeout_secs", orchestrator.subagent_timeout_secs)?;

    let urls = [
        ("orchestrator.url", &orchestrator.url),
        ("orchestrator.readback_url", &orchestrator.readback_url),
        ("orchestrator.correction_url", &orchestrator.correction_url),
        ("orchestrator.info_url", &orchestrator.info_url),
    ];
    for (key, url) in urls {
        if let Some(url) = url {
            validate_url(key, url)?;
        }
    }

    Ok(())
}

fn validate_agent(agent: &AgentConfig) -> Result<(), ConfigError> {
    if !(0.0..=1.0).contains(&agent.confidence_floor) {
        return Err(ConfigError::Validation(
            "agent.confidence_floor must be in range 0.0..=1.0".to_string(),
        ));
    }

    if agent.context_ttl_secs == 0 {
        return Err(ConfigError::Validation(
            "agent.context_ttl_secs must be greater than zero".to_string(),
        ));
    }

    if agent.readback_tts_chars == 0 {
        return Err(ConfigError::Validation(
            "agent.readback_tts_chars must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.port == 0 {
        return Err(ConfigError::Validation("server.port must be greater than zero".to_string()));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}
