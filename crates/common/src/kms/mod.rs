//! Master-key access through a remote key-management service.
//!
//! The rest of the workspace only sees two capabilities:
//! - [`KmsClient::master_key`] resolves a master-key URI to a [`MasterKey`].
//! - [`MasterKey`] encrypts or decrypts small blobs (wrapped keysets) remotely.
//!
//! The master key itself never leaves the KMS. Associated data is always empty.

pub mod aws;

pub use aws::AwsKmsClient;

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use thiserror::Error;

/// Errors produced by the KMS layer.
#[derive(Debug, Error)]
pub enum KmsError {
    /// The URI scheme is not handled by this client, or the URI is malformed.
    #[error("unsupported master key URI: {0}")]
    UnsupportedUri(String),

    /// Transport, timeout, or service-side fault.
    #[error("{0}")]
    Unreachable(String),

    /// The caller is not allowed to use this key, or the key is unusable.
    #[error("{0}")]
    AuthorizationDenied(String),

    /// The ciphertext was not produced under this master key.
    #[error("{0}")]
    InvalidCiphertext(String),
}

/// A parsed `scheme://key-id` master-key URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MasterKeyUri {
    scheme: String,
    key_id: String,
}

impl MasterKeyUri {
    /// URI scheme, e.g. `aws-kms`.
    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    /// Provider-specific key identifier (everything after `://`).
    pub fn key_id(&self) -> &str {
        &self.key_id
    }
}

impl FromStr for MasterKeyUri {
    type Err = KmsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (scheme, key_id) = s
            .split_once("://")
            .ok_or_else(|| {
                KmsError::UnsupportedUri(format!("{s:?} is not of the form scheme://key"))
            })?;
        if scheme.is_empty() || key_id.trim().is_empty() {
            return Err(KmsError::UnsupportedUri(format!(
                "{s:?} has an empty scheme or key id"
            )));
        }
        Ok(Self {
            scheme: scheme.to_ascii_lowercase(),
            key_id: key_id.to_owned(),
        })
    }
}

impl fmt::Display for MasterKeyUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}", self.scheme, self.key_id)
    }
}

/// Remote master key: wraps and unwraps keyset bytes without exposing itself.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MasterKey: Send + Sync {
    /// Encrypt `plaintext` under the master key.
    async fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, KmsError>;

    /// Decrypt `ciphertext` previously produced by [`MasterKey::encrypt`].
    async fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>, KmsError>;
}

/// Resolves master-key URIs into usable [`MasterKey`] handles.
#[async_trait]
pub trait KmsClient: Send + Sync {
    /// Obtain the capability to use the master key named by `uri`.
    async fn master_key(&self, uri: &MasterKeyUri) -> Result<Box<dyn MasterKey>, KmsError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_aws_arn_uri() {
        let uri: MasterKeyUri = "aws-kms://arn:aws:kms:eu-west-1:111122223333:key/abc"
            .parse()
            .unwrap();
        assert_eq!(uri.scheme(), "aws-kms");
        assert_eq!(uri.key_id(), "arn:aws:kms:eu-west-1:111122223333:key/abc");
    }

    #[test]
    fn scheme_is_lowercased() {
        let uri: MasterKeyUri = "AWS-KMS://alias/data".parse().unwrap();
        assert_eq!(uri.scheme(), "aws-kms");
        assert_eq!(uri.to_string(), "aws-kms://alias/data");
    }

    #[test]
    fn rejects_missing_separator() {
        assert!("projects/p/locations/l".parse::<MasterKeyUri>().is_err());
    }

    #[test]
    fn rejects_empty_key_id() {
        assert!("aws-kms://".parse::<MasterKeyUri>().is_err());
        assert!("://key".parse::<MasterKeyUri>().is_err());
    }
}
