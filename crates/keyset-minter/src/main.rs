//! `keyset-minter` binary: creates wrapped keysets.
//!
//! Startup sequence:
//! 1. Parse flags and load [`config::Config`].
//! 2. Initialise structured JSON logging.
//! 3. Resolve the master key, mint the keyset, write it without overwriting.

mod config;
mod mint;
mod telemetry;

use std::process::ExitCode;

use clap::Parser;
use common::kms::AwsKmsClient;
use common::PipelineError;
use tracing::{error, info};

#[tokio::main]
async fn main() -> ExitCode {
    // -----------------------------------------------------------------------
    // 1. Configuration
    // -----------------------------------------------------------------------
    let cfg = match config::Config::load(config::Cli::parse()) {
        Ok(cfg) => cfg,
        Err(e) => {
            let err = PipelineError::ConfigurationInvalid(format!("{e:#}"));
            eprintln!("ERROR: keyset-minter {err}");
            return ExitCode::from(err.exit_code());
        }
    };

    // -----------------------------------------------------------------------
    // 2. Telemetry
    // -----------------------------------------------------------------------
    if let Err(e) = telemetry::init(&cfg.log_level) {
        eprintln!("ERROR: {e:#}");
        return ExitCode::FAILURE;
    }
    info!(version = env!("CARGO_PKG_VERSION"), out = %cfg.out, "keyset-minter starting");

    // -----------------------------------------------------------------------
    // 3. Mint
    // -----------------------------------------------------------------------
    let kms = AwsKmsClient::new(cfg.kms_endpoint_url.clone());
    match mint::execute(&cfg, &kms).await {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            error!(stage = e.stage(), error = %e, "minting failed");
            ExitCode::from(e.exit_code())
        }
    }
}
