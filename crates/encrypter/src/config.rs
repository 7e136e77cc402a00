//! Configuration loading and validation for the field encrypter.
//!
//! Values come from `FIELDCRYPT_*` environment variables, overridden by
//! command-line flags. The process exits with a clear message if a required
//! value is missing or invalid.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use serde::Deserialize;

use crate::pipeline::RecordFormat;

const ENV_PREFIX: &str = "FIELDCRYPT";

/// Command-line flags. Every flag overrides its `FIELDCRYPT_*` counterpart.
#[derive(Debug, Default, Parser)]
#[command(
    name = "field-encrypter",
    version,
    about = "Encrypt selected fields of a CSV or JSON-lines file"
)]
pub struct Cli {
    /// Input file to read.
    #[arg(long = "in", value_name = "PATH")]
    pub input_path: Option<String>,

    /// Output file to create or truncate.
    #[arg(long = "out", value_name = "PATH")]
    pub output_path: Option<String>,

    /// Comma-separated field names to encrypt.
    #[arg(long, value_name = "NAMES")]
    pub fields: Option<String>,

    /// Wrapped keyset file.
    #[arg(long = "keyset", value_name = "PATH")]
    pub keyset_path: Option<String>,

    /// Master key URI, e.g. `aws-kms://arn:aws:kms:...`.
    #[arg(long, value_name = "URI")]
    pub master_key_uri: Option<String>,

    /// `csv` or `jsonl`; inferred from the input extension when absent.
    #[arg(long)]
    pub format: Option<String>,

    /// Override the KMS endpoint (local emulators).
    #[arg(long, value_name = "URL")]
    pub kms_endpoint_url: Option<String>,

    #[arg(long)]
    pub log_level: Option<String>,
}

/// Validated encrypter configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Input record file. **Required.**
    #[serde(default)]
    pub input_path: String,

    /// Output record file. **Required.**
    #[serde(default)]
    pub output_path: String,

    /// Comma-separated field names. **Required.**
    #[serde(default)]
    pub fields: String,

    /// Wrapped keyset file. **Required.**
    #[serde(default)]
    pub keyset_path: String,

    /// URI of the master key that wraps the keyset. **Required.**
    #[serde(default)]
    pub master_key_uri: String,

    /// Explicit record format; inferred from `input_path` when unset.
    #[serde(default)]
    pub format: Option<String>,

    #[serde(default)]
    pub kms_endpoint_url: Option<String>,

    /// Tracing log level (e.g. `"info"`, `"debug"`).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_log_level() -> String {
    "info".into()
}

impl Config {
    /// Merge environment variables and `cli`, then validate.
    ///
    /// # Errors
    ///
    /// Returns an error if a required value is absent or a value cannot be parsed.
    pub fn load(cli: Cli) -> Result<Self> {
        let cfg = config::Config::builder()
            .add_source(config::Environment::with_prefix(ENV_PREFIX))
            .set_override_option("input_path", cli.input_path)?
            .set_override_option("output_path", cli.output_path)?
            .set_override_option("fields", cli.fields)?
            .set_override_option("keyset_path", cli.keyset_path)?
            .set_override_option("master_key_uri", cli.master_key_uri)?
            .set_override_option("format", cli.format)?
            .set_override_option("kms_endpoint_url", cli.kms_endpoint_url)?
            .set_override_option("log_level", cli.log_level)?
            .build()
            .context("failed to build configuration from environment and flags")?;

        let c: Config = cfg
            .try_deserialize()
            .context("failed to deserialise configuration")?;

        c.validate()?;
        Ok(c)
    }

    /// Validate all fields, returning a descriptive error on the first failure.
    fn validate(&self) -> Result<()> {
        ensure_non_empty(&self.input_path, "input path (--in / FIELDCRYPT_INPUT_PATH)")?;
        ensure_non_empty(&self.output_path, "output path (--out / FIELDCRYPT_OUTPUT_PATH)")?;
        ensure_non_empty(&self.keyset_path, "keyset path (--keyset / FIELDCRYPT_KEYSET_PATH)")?;
        ensure_non_empty(
            &self.master_key_uri,
            "master key URI (--master-key-uri / FIELDCRYPT_MASTER_KEY_URI)",
        )?;

        if self.fields_to_encrypt().is_empty() {
            anyhow::bail!("at least one field name is required (--fields / FIELDCRYPT_FIELDS)");
        }
        if Path::new(&self.input_path) == Path::new(&self.output_path) {
            anyhow::bail!("input and output must be different files");
        }
        self.record_format()?;
        Ok(())
    }

    /// Requested field names, split on `,` with empty entries dropped.
    ///
    /// Names are not trimmed: surrounding whitespace is part of the name.
    pub fn fields_to_encrypt(&self) -> Vec<String> {
        self.fields
            .split(',')
            .filter(|f| !f.is_empty())
            .map(str::to_owned)
            .collect()
    }

    /// The explicit format, or the one implied by the input extension.
    pub fn record_format(&self) -> Result<RecordFormat> {
        match self.format.as_deref().filter(|f| !f.trim().is_empty()) {
            Some(explicit) => explicit.parse().map_err(|e: String| anyhow::anyhow!(e)),
            None => RecordFormat::from_path(Path::new(&self.input_path)).with_context(|| {
                format!(
                    "cannot infer record format from {:?}; pass --format csv|jsonl",
                    self.input_path
                )
            }),
        }
    }

    pub fn input(&self) -> PathBuf {
        PathBuf::from(&self.input_path)
    }

    pub fn output(&self) -> PathBuf {
        PathBuf::from(&self.output_path)
    }

    pub fn keyset(&self) -> PathBuf {
        PathBuf::from(&self.keyset_path)
    }
}

fn ensure_non_empty(value: &str, name: &str) -> Result<()> {
    if value.trim().is_empty() {
        anyhow::bail!("{name} is required and must not be empty");
    }
    Ok(())
}
