//! Keyset unwrap: read the wrapped keyset, have the KMS decrypt it, and build
//! the local primitive for the run.
//!
//! # Security invariants
//!
//! - The cleartext keyset is dropped as soon as the primitive is built.
//! - Nothing derived from key material is logged; only ids and counts.

use std::path::Path;

use common::keyset::EncryptedKeyset;
use common::kms::{KmsClient, MasterKeyUri};
use common::PipelineError;
use tracing::{debug, info};

use crate::crypto::KeysetPrimitive;

/// Load the wrapped keyset at `keyset_path` and unwrap it with the master key
/// named by `master_key_uri`.
///
/// # Errors
///
/// - [`PipelineError::ConfigurationInvalid`] for a malformed or unsupported URI.
/// - [`PipelineError::KeysetUnreadable`] if the file cannot be read.
/// - [`PipelineError::MalformedKeyset`] if the framing or cleartext is unusable.
/// - [`PipelineError::KmsUnreachable`], [`PipelineError::KmsAuthorizationDenied`]
///   or [`PipelineError::UnwrapFailed`] when the KMS call does not succeed.
pub async fn load_primitive(
    kms: &dyn KmsClient,
    keyset_path: &Path,
    master_key_uri: &str,
) -> Result<KeysetPrimitive, PipelineError> {
    let uri: MasterKeyUri = master_key_uri.parse()?;

    let bytes = tokio::fs::read(keyset_path)
        .await
        .map_err(|source| PipelineError::KeysetUnreadable {
            path: keyset_path.display().to_string(),
            source,
        })?;
    let (wrapped, framing) = EncryptedKeyset::from_bytes(&bytes)?;
    debug!(
        framing = ?framing,
        primary_key_id = wrapped.keyset_info.primary_key_id,
        "wrapped keyset parsed"
    );

    let master = kms.master_key(&uri).await?;
    let keyset = wrapped.open(master.as_ref()).await?;
    let primitive = KeysetPrimitive::from_keyset(&keyset)?;

    info!(
        key_id = primitive.key_id(),
        primitive = primitive.kind().as_str(),
        keys = keyset.key.len(),
        "keyset unwrapped successfully"
    );
    Ok(primitive)
}
