//! `field-encrypter` binary entry point.
//!
//! Run sequence:
//! 1. Parse flags and load [`Config`] (flags over `FIELDCRYPT_*` variables).
//! 2. Initialise structured JSON logging.
//! 3. Build the KMS client for the master key.
//! 4. Unwrap the keyset and stream the input file into the output file.
//!
//! Exit status is `0` on success, otherwise the [`common::PipelineError`]
//! exit code of the failing stage.

mod config;
mod crypto;
mod job;
mod pipeline;
mod selector;
mod telemetry;
mod unwrap;

#[cfg(test)]
mod testing;

use std::process::ExitCode;

use clap::Parser;
use common::kms::AwsKmsClient;
use common::PipelineError;
use tracing::{error, Instrument};

use config::{Cli, Config};

#[tokio::main]
async fn main() -> ExitCode {
    // -----------------------------------------------------------------------
    // 1. Configuration
    // -----------------------------------------------------------------------
    let cfg = match Config::load(Cli::parse()) {
        Ok(cfg) => cfg,
        Err(e) => {
            // Telemetry is not yet up; write to stderr directly.
            let err = PipelineError::ConfigurationInvalid(format!("{e:#}"));
            eprintln!("ERROR: {err}");
            return ExitCode::from(err.exit_code());
        }
    };

    // -----------------------------------------------------------------------
    // 2. Telemetry
    // -----------------------------------------------------------------------
    if let Err(e) = telemetry::init_telemetry(&cfg.log_level) {
        eprintln!("ERROR: {e:#}");
        return ExitCode::FAILURE;
    }
    let (span, _run_id) = telemetry::run_span();

    // -----------------------------------------------------------------------
    // 3. KMS client
    // -----------------------------------------------------------------------
    let kms = AwsKmsClient::new(cfg.kms_endpoint_url.clone());

    // -----------------------------------------------------------------------
    // 4. Run
    // -----------------------------------------------------------------------
    let outcome = job::execute(&cfg, &kms).instrument(span.clone()).await;
    let _entered = span.enter();
    match outcome {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            error!(stage = e.stage(), error = %e, "run failed");
            ExitCode::from(e.exit_code())
        }
    }
}
