//! Keyset minting: generate, wrap, write once.
//!
//! An existing output file is never touched: the path is checked before the
//! KMS is contacted and created with create-new semantics afterwards.

use std::io::ErrorKind;
use std::path::Path;

use common::keyset::{EncryptedKeyset, KeyTemplate, Keyset, KeysetFormat, KeysetInfo};
use common::kms::{KmsClient, MasterKey, MasterKeyUri};
use common::PipelineError;
use tokio::io::AsyncWriteExt;
use tracing::info;

use crate::config::Config;

/// Resolve the configured master key and mint into the configured path.
///
/// # Errors
///
/// See [`mint`]; additionally [`PipelineError::ConfigurationInvalid`] for an
/// unparseable template, format, or master-key URI.
pub async fn execute(cfg: &Config, kms: &dyn KmsClient) -> Result<KeysetInfo, PipelineError> {
    let invalid = |e: anyhow::Error| PipelineError::ConfigurationInvalid(format!("{e:#}"));
    let template = cfg.template().map_err(invalid)?;
    let format = cfg.format().map_err(invalid)?;
    let uri: MasterKeyUri = cfg.master_key_uri.parse()?;
    let out = Path::new(&cfg.out);

    ensure_absent(out).await?;
    let master = kms.master_key(&uri).await?;
    mint(template, out, format, master.as_ref()).await
}

/// Generate a keyset from `template`, wrap it under `master`, and write it to
/// `out` in `format`.
///
/// # Errors
///
/// - [`PipelineError::OutputAlreadyExists`] if `out` exists, before any KMS call.
/// - [`PipelineError::KmsUnreachable`] / [`PipelineError::KmsAuthorizationDenied`]
///   if wrapping fails.
/// - [`PipelineError::OutputWriteFailed`] on I/O errors.
pub async fn mint(
    template: KeyTemplate,
    out: &Path,
    format: KeysetFormat,
    master: &dyn MasterKey,
) -> Result<KeysetInfo, PipelineError> {
    ensure_absent(out).await?;

    let keyset = Keyset::generate(template);
    let wrapped = EncryptedKeyset::seal(&keyset, master).await?;
    drop(keyset);
    let bytes = wrapped.to_bytes(format)?;

    let mut file = tokio::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(out)
        .await
        .map_err(|e| match e.kind() {
            ErrorKind::AlreadyExists => {
                PipelineError::OutputAlreadyExists(out.display().to_string())
            }
            _ => write_failed(out, e),
        })?;
    file.write_all(&bytes).await.map_err(|e| write_failed(out, e))?;
    file.sync_all().await.map_err(|e| write_failed(out, e))?;

    info!(
        template = template.name(),
        primary_key_id = wrapped.keyset_info.primary_key_id,
        format = ?format,
        out = %out.display(),
        "keyset minted successfully"
    );
    Ok(wrapped.keyset_info)
}

async fn ensure_absent(out: &Path) -> Result<(), PipelineError> {
    match tokio::fs::symlink_metadata(out).await {
        Ok(_) => Err(PipelineError::OutputAlreadyExists(out.display().to_string())),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(write_failed(out, e)),
    }
}

fn write_failed(out: &Path, e: std::io::Error) -> PipelineError {
    PipelineError::OutputWriteFailed {
        record: 0,
        message: format!("{}: {e}", out.display()),
    }
}
