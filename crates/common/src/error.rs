//! Run-level error taxonomy shared by the encrypter and the keyset minter.

use thiserror::Error;

use crate::keyset::KeysetError;
use crate::kms::KmsError;

/// Every way a run can end unsuccessfully.
///
/// All variants are terminal: the caller aborts the run and treats any
/// partially written output as invalid. Variants map to process exit codes:
/// - [`PipelineError::ConfigurationInvalid`] → 2
/// - keyset file / framing / unwrap problems → 3
/// - KMS reachability and authorisation → 4
/// - [`PipelineError::EncryptionFailed`] → 5
/// - [`PipelineError::InputReadFailed`] → 6
/// - output problems → 7
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A required setting is missing or invalid.
    #[error("configuration invalid: {0}")]
    ConfigurationInvalid(String),

    /// The keyset file could not be read from disk.
    #[error("keyset unreadable: {path}: {source}")]
    KeysetUnreadable {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The KMS could not be reached (transport, timeout, or service fault).
    #[error("KMS unreachable: {0}")]
    KmsUnreachable(String),

    /// The KMS refused to use the master key for this caller.
    #[error("KMS authorization denied: {0}")]
    KmsAuthorizationDenied(String),

    /// The keyset framing or its cleartext content is not understood.
    #[error("malformed keyset: {0}")]
    MalformedKeyset(String),

    /// The wrapped keyset was not produced under this master key.
    #[error("keyset unwrap failed: {0}")]
    UnwrapFailed(String),

    /// The local primitive failed to encrypt a targeted field.
    #[error("encryption failed for field {field:?} in record {record}")]
    EncryptionFailed { record: u64, field: String },

    /// The input source failed before end-of-input.
    #[error("input read failed at record {record}: {message}")]
    InputReadFailed { record: u64, message: String },

    /// The output sink rejected a write.
    #[error("output write failed at record {record}: {message}")]
    OutputWriteFailed { record: u64, message: String },

    /// The output file already exists and must not be overwritten.
    #[error("output already exists: {0}")]
    OutputAlreadyExists(String),
}

impl PipelineError {
    /// Stable name of the stage that failed, used as a log field.
    pub fn stage(&self) -> &'static str {
        match self {
            PipelineError::ConfigurationInvalid(_) => "configuration",
            PipelineError::KeysetUnreadable { .. } => "keyset_read",
            PipelineError::KmsUnreachable(_) | PipelineError::KmsAuthorizationDenied(_) => "kms",
            PipelineError::MalformedKeyset(_) | PipelineError::UnwrapFailed(_) => "keyset_unwrap",
            PipelineError::EncryptionFailed { .. } => "encrypt",
            PipelineError::InputReadFailed { .. } => "input",
            PipelineError::OutputWriteFailed { .. } | PipelineError::OutputAlreadyExists(_) => {
                "output"
            }
        }
    }

    /// Returns the process exit code that should be used for this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            PipelineError::ConfigurationInvalid(_) => 2,
            PipelineError::KeysetUnreadable { .. }
            | PipelineError::MalformedKeyset(_)
            | PipelineError::UnwrapFailed(_) => 3,
            PipelineError::KmsUnreachable(_) | PipelineError::KmsAuthorizationDenied(_) => 4,
            PipelineError::EncryptionFailed { .. } => 5,
            PipelineError::InputReadFailed { .. } => 6,
            PipelineError::OutputWriteFailed { .. } | PipelineError::OutputAlreadyExists(_) => 7,
        }
    }
}

impl From<KmsError> for PipelineError {
    fn from(e: KmsError) -> Self {
        match e {
            KmsError::UnsupportedUri(msg) => PipelineError::ConfigurationInvalid(msg),
            KmsError::Unreachable(msg) => PipelineError::KmsUnreachable(msg),
            KmsError::AuthorizationDenied(msg) => PipelineError::KmsAuthorizationDenied(msg),
            KmsError::InvalidCiphertext(msg) => PipelineError::UnwrapFailed(msg),
        }
    }
}

impl From<KeysetError> for PipelineError {
    fn from(e: KeysetError) -> Self {
        match e {
            KeysetError::Kms(inner) => inner.into(),
            other => PipelineError::MalformedKeyset(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes() {
        assert_eq!(PipelineError::ConfigurationInvalid("x".into()).exit_code(), 2);
        assert_eq!(PipelineError::MalformedKeyset("x".into()).exit_code(), 3);
        assert_eq!(PipelineError::UnwrapFailed("x".into()).exit_code(), 3);
        assert_eq!(PipelineError::KmsUnreachable("x".into()).exit_code(), 4);
        assert_eq!(PipelineError::KmsAuthorizationDenied("x".into()).exit_code(), 4);
        assert_eq!(
            PipelineError::EncryptionFailed {
                record: 1,
                field: "ssn".into()
            }
            .exit_code(),
            5
        );
        assert_eq!(
            PipelineError::InputReadFailed {
                record: 3,
                message: "x".into()
            }
            .exit_code(),
            6
        );
        assert_eq!(PipelineError::OutputAlreadyExists("k".into()).exit_code(), 7);
    }

    #[test]
    fn kms_errors_map_to_taxonomy() {
        let e: PipelineError = KmsError::AuthorizationDenied("nope".into()).into();
        assert!(matches!(e, PipelineError::KmsAuthorizationDenied(_)));

        let e: PipelineError = KmsError::InvalidCiphertext("tag".into()).into();
        assert!(matches!(e, PipelineError::UnwrapFailed(_)));

        let e: PipelineError = KmsError::UnsupportedUri("gcp-kms".into()).into();
        assert_eq!(e.stage(), "configuration");
    }

    #[test]
    fn keyset_errors_map_to_malformed_unless_kms() {
        let e: PipelineError = KeysetError::UnknownFraming.into();
        assert!(matches!(e, PipelineError::MalformedKeyset(_)));

        let e: PipelineError = KeysetError::Kms(KmsError::Unreachable("dns".into())).into();
        assert!(matches!(e, PipelineError::KmsUnreachable(_)));
    }

    #[test]
    fn display_names_field_not_value() {
        let e = PipelineError::EncryptionFailed {
            record: 7,
            field: "Issuing Bank".into(),
        };
        let s = e.to_string();
        assert!(s.contains("Issuing Bank"));
        assert!(s.contains('7'));
    }
}
