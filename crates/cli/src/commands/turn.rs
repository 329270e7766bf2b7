use chantier_agent::{AgentRuntime, TurnRequest};
use chantier_core::config::{AppConfig, LoadOptions};
use chantier_db::DatastoreRepositories;

use super::CommandResult;

const COMMAND: &str = "turn";

/// Runs one utterance through the same runtime the server uses and prints the response.
pub fn run(text: &str, dossier_id: Option<String>) -> CommandResult {
    if text.trim().is_empty() {
        return CommandResult::failure(COMMAND, "invalid_input", "Texte vide", 2);
    }

    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(COMMAND, "config_validation", error.to_string(), 2)
        }
    };

    let runtime = match DatastoreRepositories::from_config(&config.datastore)
        .map_err(|error| error.to_string())
        .and_then(|repositories| {
            AgentRuntime::from_config(&config, &repositories).map_err(|error| error.to_string())
        }) {
        Ok(runtime) => runtime,
        Err(error) => return CommandResult::failure(COMMAND, "runtime_assembly", error, 1),
    };

    let executor = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(executor) => executor,
        Err(error) => {
            return CommandResult::failure(
                COMMAND,
                "runtime_init",
                format!("failed to initialize async runtime: {error}"),
                1,
            )
        }
    };

    let request = TurnRequest { text: text.to_string(), dossier_id, context: None };
    let response = executor.block_on(runtime.handle_turn(request));

    match serde_json::to_string_pretty(&response) {
        Ok(output) => CommandResult::raw(if response.success { 0 } else { 1 }, output),
        Err(error) => CommandResult::failure(COMMAND, "serialization", error.to_string(), 1),
    }
}
