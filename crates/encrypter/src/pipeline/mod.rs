//! Record stream transformer: one record in, one record out, in input order.
//!
//! # State machine
//!
//! ```text
//! AwaitHeader (CSV only) ──► Streaming ──► Drained
//!        └──────────────────────┴────────► Failed
//! ```
//!
//! # Invariants
//!
//! - At most one record is held in memory at a time.
//! - Untouched fields keep their original text; targeted fields are replaced
//!   by the encryptor's output and never pass through as cleartext.
//! - Any error is terminal. A partially written output is left in place and
//!   must be treated as incomplete by the caller.

mod jsonl;
mod tabular;

use std::fs::{File, OpenOptions};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;
use std::str::FromStr;

use common::PipelineError;
use same_file::Handle;
use tracing::{info, warn};

use crate::crypto::FieldEncryptor;

/// Shape of the input and output files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordFormat {
    /// RFC 4180 CSV with a mandatory header row.
    Csv,
    /// One JSON object per line.
    Jsonl,
}

impl RecordFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            RecordFormat::Csv => "csv",
            RecordFormat::Jsonl => "jsonl",
        }
    }

    /// Infer the format from a file extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "csv" => Some(RecordFormat::Csv),
            "json" | "jsonl" | "ndjson" => Some(RecordFormat::Jsonl),
            _ => None,
        }
    }
}

impl FromStr for RecordFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "csv" => Ok(RecordFormat::Csv),
            "jsonl" | "json" | "ndjson" => Ok(RecordFormat::Jsonl),
            other => Err(format!("unknown record format {other:?}; expected csv or jsonl")),
        }
    }
}

/// Where the transformer is in its run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    AwaitHeader,
    Streaming,
    Drained,
    Failed,
}

/// Counters reported at the end of a successful run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Data records written (the CSV header is not counted).
    pub records: u64,
    /// Individual field values replaced by ciphertext.
    pub encrypted_fields: u64,
}

/// Streams records from an input to an output, encrypting the requested fields.
pub struct Transformer<'a> {
    encryptor: &'a dyn FieldEncryptor,
    fields: &'a [String],
    state: RunState,
}

impl<'a> Transformer<'a> {
    pub fn new(encryptor: &'a dyn FieldEncryptor, fields: &'a [String]) -> Self {
        Self {
            encryptor,
            fields,
            state: RunState::AwaitHeader,
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// Transform every record of `input` into `output`.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InputReadFailed`], [`PipelineError::EncryptionFailed`]
    /// or [`PipelineError::OutputWriteFailed`]; the transformer is then
    /// [`RunState::Failed`].
    pub fn run<R: Read, W: Write>(
        &mut self,
        format: RecordFormat,
        input: R,
        output: W,
    ) -> Result<RunSummary, PipelineError> {
        let result = match format {
            RecordFormat::Csv => tabular::transform(self, input, output),
            RecordFormat::Jsonl => jsonl::transform(self, input, output),
        };
        self.state = match result {
            Ok(_) => RunState::Drained,
            Err(_) => RunState::Failed,
        };
        result
    }

    fn fields(&self) -> &'a [String] {
        self.fields
    }

    fn enter(&mut self, state: RunState) {
        self.state = state;
    }

    /// Encrypt one targeted value, attaching the record context on failure.
    fn encrypt_value(
        &self,
        record: u64,
        field: &str,
        value: &str,
    ) -> Result<String, PipelineError> {
        self.encryptor.encrypt_field(value).map_err(|e| {
            warn!(record, field, error = %e, "field encryption failed");
            PipelineError::EncryptionFailed {
                record,
                field: field.to_owned(),
            }
        })
    }
}

/// Open `input_path`, create `output_path`, and run `transformer` between them.
///
/// The output is opened only after the input, and emptied only once it is
/// known to be a different file. Paths that name the input through `..`,
/// a symlink, or a hard link are rejected without touching either file.
///
/// # Errors
///
/// Returns [`PipelineError::InputReadFailed`] if the input cannot be opened,
/// [`PipelineError::ConfigurationInvalid`] if the output is the input file, and
/// [`PipelineError::OutputWriteFailed`] if the output cannot be created, in
/// addition to the errors of [`Transformer::run`].
pub fn run_files(
    transformer: &mut Transformer<'_>,
    format: RecordFormat,
    input_path: &Path,
    output_path: &Path,
) -> Result<RunSummary, PipelineError> {
    let input = File::open(input_path)
        .and_then(Handle::from_file)
        .map_err(|e| PipelineError::InputReadFailed {
            record: 0,
            message: format!("cannot open {}: {e}", input_path.display()),
        })?;
    let cannot_create = |e: std::io::Error| PipelineError::OutputWriteFailed {
        record: 0,
        message: format!("cannot create {}: {e}", output_path.display()),
    };
    let output = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(output_path)
        .and_then(Handle::from_file)
        .map_err(cannot_create)?;

    if input == output {
        return Err(PipelineError::ConfigurationInvalid(format!(
            "output {} is the input file {}",
            output_path.display(),
            input_path.display()
        )));
    }
    output.as_file().set_len(0).map_err(cannot_create)?;

    info!(
        format = format.as_str(),
        input = %input_path.display(),
        output = %output_path.display(),
        "streaming records"
    );
    transformer.run(
        format,
        BufReader::new(input.as_file()),
        BufWriter::new(output.as_file()),
    )
}

fn read_failed(record: u64, message: impl Into<String>) -> PipelineError {
    PipelineError::InputReadFailed {
        record,
        message: message.into(),
    }
}

fn write_failed(record: u64, message: impl Into<String>) -> PipelineError {
    PipelineError::OutputWriteFailed {
        record,
        message: message.into(),
    }
}
