use std::process::ExitCode;

use clap::Parser;
use player_census::cli::{self, Cli};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match cli::run(cli).await {
        Ok(code) => code,
        Err(e) => {
            // Logging may not be initialized yet
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
