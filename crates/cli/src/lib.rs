pub mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "chantier",
    about = "Chantier operator CLI",
    long_about = "Inspect configuration, check readiness, recompute quotes and replay voice turns.",
    after_help = "Examples:\n  chantier doctor --json\n  chantier config\n  \
                  chantier recalc devis.json\n  chantier turn \"relis le salon\" --dossier rec1"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config and report which upstreams are wired")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Recompute every total of a quote JSON file, optionally applying one edit")]
    Recalc {
        #[arg(help = "Path to a quote JSON file, or to {\"devis\": ..., \"edit\": ...}")]
        file: PathBuf,
        #[arg(long, help = "Emit the recomputed quote as JSON")]
        json: bool,
    },
    #[command(about = "Run one utterance through the full agent runtime")]
    Turn {
        #[arg(help = "Transcribed utterance")]
        text: String,
        #[arg(long, help = "Active dossier id")]
        dossier: Option<String>,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json } => {
            commands::CommandResult { exit_code: 0, output: commands::doctor::run(json) }
        }
        Command::Recalc { file, json } => commands::recalc::run(&file, json),
        Command::Turn { text, dossier } => commands::turn::run(&text, dossier),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
