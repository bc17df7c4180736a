pub mod commands;
pub mod config;
pub mod error;
pub mod extractor;
pub mod reconcile;
pub mod report;
pub mod session;
pub mod types;
pub mod verdict;
pub mod vision;

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

pub use error::{ConfigError, ExtractionError, ReconciliationError, ServiceError, SessionError};
pub use extractor::ExtractionRequest;
pub use session::{Session, Stage};
pub use types::{ExtractionResult, ImageRole, ReconciliationReport, Verdict, VerdictPayload};
pub use vision::{AzureChatClient, ChatModel, ContentPart};

/// Cross-check a package photo against its invoice using a vision model
#[derive(Parser, Debug)]
#[command(name = "invoice-crosscheck")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: commands::Command,
}

pub fn run() -> ExitCode {
    // Logs go to stderr; stdout carries extraction and report text.
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "invoice_crosscheck_lib=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    match commands::run_command(&cli.command) {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
