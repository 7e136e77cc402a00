//! Shared error taxonomy, keyset framing, and KMS master-key access for the
//! `fieldcrypt` binaries.

pub mod error;
pub mod keyset;
pub mod kms;

pub use error::PipelineError;
