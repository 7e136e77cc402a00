//! Configuration loading and validation for the keyset minter.

use anyhow::{Context, Result};
use clap::Parser;
use common::keyset::{KeyTemplate, KeysetFormat};
use serde::Deserialize;

#[derive(Debug, Default, Parser)]
#[command(name = "keyset-minter", version, about = "Mint a keyset wrapped under a KMS master key")]
pub struct Cli {
    /// `AES256_GCM_SIV` or `AES256_SIV_DETERMINISTIC`.
    #[arg(long, value_name = "NAME")]
    pub key_template: Option<String>,

    /// Path of the wrapped keyset to create. Never overwritten.
    #[arg(long, value_name = "PATH")]
    pub out: Option<String>,

    /// `json` (default) or `binary`.
    #[arg(long, value_name = "FORMAT")]
    pub out_format: Option<String>,

    #[arg(long, value_name = "URI")]
    pub master_key_uri: Option<String>,

    #[arg(long, value_name = "URL")]
    pub kms_endpoint_url: Option<String>,

    #[arg(long)]
    pub log_level: Option<String>,
}

/// Validated minter configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Key template name. **Required.**
    #[serde(default)]
    pub key_template: String,

    /// Output path. **Required.**
    #[serde(default)]
    pub out: String,

    #[serde(default = "default_out_format")]
    pub out_format: String,

    /// Master key used to wrap the new keyset. **Required.**
    #[serde(default)]
    pub master_key_uri: String,

    #[serde(default)]
    pub kms_endpoint_url: Option<String>,

    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_out_format() -> String {
    "json".into()
}
fn default_log_level() -> String {
    "info".into()
}

impl Config {
    /// Merge `FIELDCRYPT_*` environment variables with `cli`, then validate.
    ///
    /// # Errors
    ///
    /// Returns an error if a required value is absent or unparseable.
    pub fn load(cli: Cli) -> Result<Self> {
        let cfg = config::Config::builder()
            .add_source(config::Environment::with_prefix("FIELDCRYPT"))
            .set_override_option("key_template", cli.key_template)?
            .set_override_option("out", cli.out)?
            .set_override_option("out_format", cli.out_format)?
            .set_override_option("master_key_uri", cli.master_key_uri)?
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

    fn validate(&self) -> Result<()> {
        ensure_non_empty(&self.out, "output path (--out / FIELDCRYPT_OUT)")?;
        ensure_non_empty(
            &self.master_key_uri,
            "master key URI (--master-key-uri / FIELDCRYPT_MASTER_KEY_URI)",
        )?;
        self.template()?;
        self.format()?;
        Ok(())
    }

    pub fn template(&self) -> Result<KeyTemplate> {
        if self.key_template.trim().is_empty() {
            anyhow::bail!("key template (--key-template / FIELDCRYPT_KEY_TEMPLATE) is required");
        }
        self.key_template.parse().map_err(|e: String| anyhow::anyhow!(e))
    }

    pub fn format(&self) -> Result<KeysetFormat> {
        self.out_format.parse().map_err(|e: String| anyhow::anyhow!(e))
    }
}

fn ensure_non_empty(value: &str, name: &str) -> Result<()> {
    if value.trim().is_empty() {
        anyhow::bail!("{name} is required and must not be empty");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> Config {
        Config {
            key_template: "AES256_GCM_SIV".into(),
            out: "keyset.json".into(),
            out_format: default_out_format(),
            master_key_uri: "aws-kms://alias/data".into(),
            kms_endpoint_url: None,
            log_level: default_log_level(),
        }
    }

    #[test]
    fn defaults_are_correct() {
        assert_eq!(default_out_format(), "json");
        assert_eq!(default_log_level(), "info");
    }

    #[test]
    fn valid_config_passes() {
        let cfg = valid();
        cfg.validate().unwrap();
        assert_eq!(cfg.template().unwrap(), KeyTemplate::Aes256GcmSiv);
        assert_eq!(cfg.format().unwrap(), KeysetFormat::Json);
    }

    #[test]
    fn out_format_is_case_insensitive() {
        let cfg = Config {
            out_format: "BiNaRy".into(),
            ..valid()
        };
        assert_eq!(cfg.format().unwrap(), KeysetFormat::Binary);
    }

    #[test]
    fn template_names_are_exact() {
        let cfg = Config {
            key_template: "aes256_gcm_siv".into(),
            ..valid()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn validate_rejects_missing_template() {
        let cfg = Config {
            key_template: "".into(),
            ..valid()
        };
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("key template"));
    }

    #[test]
    fn validate_rejects_unknown_format() {
        let cfg = Config {
            out_format: "yaml".into(),
            ..valid()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn cli_flags_parse() {
        let cli = Cli::try_parse_from([
            "keyset-minter",
            "--key-template",
            "AES256_SIV_DETERMINISTIC",
            "--out",
            "k.bin",
            "--out-format",
            "binary",
            "--master-key-uri",
            "aws-kms://alias/data",
        ])
        .unwrap();
        assert_eq!(cli.key_template.as_deref(), Some("AES256_SIV_DETERMINISTIC"));
        assert_eq!(cli.out_format.as_deref(), Some("binary"));
        assert!(cli.log_level.is_none());
    }
}
