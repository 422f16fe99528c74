use clap::Parser;
use std::process::ExitCode;
use todos::cli::{run, Cli};
use todos::config::ConfigManager;

fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut config = match ConfigManager::new(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };
    todos::logging::init(config.effective().log_level());

    let result = run(
        cli,
        &mut config,
        &mut std::io::stdout().lock(),
        &mut std::io::stderr().lock(),
    );
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
