//! AWS KMS implementation of the master-key capability.

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_kms::config::Region;
use aws_sdk_kms::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_kms::primitives::Blob;
use tracing::debug;

use super::{KmsClient, KmsError, MasterKey, MasterKeyUri};

/// URI scheme served by [`AwsKmsClient`].
pub const AWS_KMS_SCHEME: &str = "aws-kms";

/// Error codes that mean "you may not use this key" rather than "try later".
const DENIED_CODES: &[&str] = &[
    "AccessDeniedException",
    "UnrecognizedClientException",
    "InvalidSignatureException",
    "ExpiredTokenException",
    "NotFoundException",
    "DisabledException",
    "KMSInvalidStateException",
    "InvalidKeyUsageException",
];

/// Error codes that mean the ciphertext does not belong to this key.
const CIPHERTEXT_CODES: &[&str] = &["InvalidCiphertextException", "IncorrectKeyException"];

/// Factory for AWS KMS master keys.
///
/// Credentials are resolved through the standard AWS credential chain. The
/// region is taken from the key ARN when present, otherwise from the
/// environment.
#[derive(Debug, Clone, Default)]
pub struct AwsKmsClient {
    endpoint_url: Option<String>,
}

impl AwsKmsClient {
    /// Create a client, optionally pointing every KMS call at `endpoint_url`.
    pub fn new(endpoint_url: Option<String>) -> Self {
        Self { endpoint_url }
    }
}

#[async_trait]
impl KmsClient for AwsKmsClient {
    async fn master_key(&self, uri: &MasterKeyUri) -> Result<Box<dyn MasterKey>, KmsError> {
        if uri.scheme() != AWS_KMS_SCHEME {
            return Err(KmsError::UnsupportedUri(format!(
                "scheme {:?} is not supported; expected {AWS_KMS_SCHEME}://",
                uri.scheme()
            )));
        }

        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = region_from_arn(uri.key_id()) {
            loader = loader.region(Region::new(region.to_owned()));
        }
        let sdk = loader.load().await;

        let mut builder = aws_sdk_kms::config::Builder::from(&sdk);
        if let Some(url) = &self.endpoint_url {
            builder = builder.endpoint_url(url);
        }
        let client = aws_sdk_kms::Client::from_conf(builder.build());

        debug!(key = %uri, "AWS KMS master key resolved");
        Ok(Box::new(AwsMasterKey {
            client,
            key_id: uri.key_id().to_owned(),
        }))
    }
}

/// A single KMS key addressed by id, alias, or ARN.
struct AwsMasterKey {
    client: aws_sdk_kms::Client,
    key_id: String,
}

#[async_trait]
impl MasterKey for AwsMasterKey {
    async fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, KmsError> {
        let resp = self
            .client
            .encrypt()
            .key_id(&self.key_id)
            .plaintext(Blob::new(plaintext))
            .send()
            .await
            .map_err(|e| classify("encrypt", e))?;

        resp.ciphertext_blob()
            .map(|b| b.as_ref().to_vec())
            .ok_or_else(|| KmsError::Unreachable("KMS encrypt response had no ciphertext".into()))
    }

    async fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>, KmsError> {
        let resp = self
            .client
            .decrypt()
            .key_id(&self.key_id)
            .ciphertext_blob(Blob::new(ciphertext))
            .send()
            .await
            .map_err(|e| classify("decrypt", e))?;

        resp.plaintext()
            .map(|b| b.as_ref().to_vec())
            .ok_or_else(|| KmsError::Unreachable("KMS decrypt response had no plaintext".into()))
    }
}

fn classify<E, R>(op: &str, err: SdkError<E, R>) -> KmsError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: std::fmt::Debug,
{
    let message = format!("KMS {op} failed: {}", DisplayErrorContext(&err));
    match &err {
        SdkError::ServiceError(ctx) => classify_code(ctx.err().code(), message),
        _ => KmsError::Unreachable(message),
    }
}

fn classify_code(code: Option<&str>, message: String) -> KmsError {
    match code {
        Some(c) if DENIED_CODES.contains(&c) => KmsError::AuthorizationDenied(message),
        Some(c) if CIPHERTEXT_CODES.contains(&c) => KmsError::InvalidCiphertext(message),
        _ => KmsError::Unreachable(message),
    }
}

/// Extract the region from `arn:aws:kms:<region>:<account>:key/<id>`.
fn region_from_arn(key_id: &str) -> Option<&str> {
    let mut parts = key_id.split(':');
    if parts.next()? != "arn" {
        return None;
    }
    let _partition = parts.next()?;
    if parts.next()? != "kms" {
        return None;
    }
    parts.next().filter(|r| !r.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn region_extracted_from_arn() {
        assert_eq!(
            region_from_arn("arn:aws:kms:eu-west-1:111122223333:key/abc"),
            Some("eu-west-1")
        );
        assert_eq!(
            region_from_arn("arn:aws-us-gov:kms:us-gov-west-1:1:alias/x"),
            Some("us-gov-west-1")
        );
    }

    #[test]
    fn no_region_for_alias_or_bare_id() {
        assert_eq!(region_from_arn("alias/data-governance"), None);
        assert_eq!(region_from_arn("1234abcd-12ab-34cd-56ef-1234567890ab"), None);
        assert_eq!(region_from_arn("arn:aws:s3:::bucket"), None);
    }

    #[test]
    fn access_denied_is_authorization() {
        let e = classify_code(Some("AccessDeniedException"), "m".into());
        assert!(matches!(e, KmsError::AuthorizationDenied(_)));
        let e = classify_code(Some("DisabledException"), "m".into());
        assert!(matches!(e, KmsError::AuthorizationDenied(_)));
    }

    #[test]
    fn invalid_ciphertext_is_unwrap_failure() {
        let e = classify_code(Some("InvalidCiphertextException"), "m".into());
        assert!(matches!(e, KmsError::InvalidCiphertext(_)));
    }

    #[test]
    fn unknown_codes_are_unreachable() {
        assert!(matches!(
            classify_code(Some("KMSInternalException"), "m".into()),
            KmsError::Unreachable(_)
        ));
        assert!(matches!(classify_code(None, "m".into()), KmsError::Unreachable(_)));
    }

    #[tokio::test]
    async fn foreign_scheme_rejected_without_network() {
        let client = AwsKmsClient::default();
        let uri: MasterKeyUri = "gcp-kms://projects/p/locations/l/keyRings/r/cryptoKeys/k"
            .parse()
            .unwrap();
        let err = client.master_key(&uri).await.err().unwrap();
        assert!(matches!(err, KmsError::UnsupportedUri(_)));
    }
}
