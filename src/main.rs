use std::process::ExitCode;

use clap::Parser;
use screenloop_lib::cli::Cli;
use screenloop_lib::errors::ScreenLoopError;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match screenloop_lib::run(cli).await {
        Ok(response) => {
            let text = response.final_text();
            if !text.is_empty() {
                println!("{text}");
            }
            ExitCode::SUCCESS
        }
        Err(ScreenLoopError::Cancelled) => {
            eprintln!("screenloop: stopped");
            ExitCode::from(130)
        }
        Err(e) => {
            eprintln!("screenloop: {e}");
            ExitCode::FAILURE
        }
    }
}
