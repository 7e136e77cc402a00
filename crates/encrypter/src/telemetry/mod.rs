//! Structured logging for the field encrypter.
//!
//! # Telemetry invariants
//!
//! - **No plaintext values, ciphertexts, or key material** in any span field or
//!   log line. Field *names*, record ordinals and counts are fine.
//! - JSON lines go to stderr; stdout is left to the caller.
//! - Log level comes from `RUST_LOG`, else `FIELDCRYPT_LOG_LEVEL` / `--log-level`
//!   (default: `info`).

pub mod init;

pub use init::{init_telemetry, run_span};
