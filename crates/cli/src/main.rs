use std::process::ExitCode;

fn main() -> ExitCode {
    chantier_cli::run()
}
