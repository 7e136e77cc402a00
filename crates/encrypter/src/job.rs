//! One encryption run: unwrap the keyset, then stream the input into the output.

use common::kms::KmsClient;
use common::PipelineError;
use tracing::{debug, info, Span};

use crate::config::Config;
use crate::pipeline::{run_files, RunSummary, Transformer};
use crate::unwrap;

/// Execute the run described by `cfg`, using `kms` to unwrap the keyset.
///
/// The output file is only created once the keyset has been unwrapped, so a
/// keyset or KMS failure leaves no output behind.
///
/// # Errors
///
/// Returns the first [`PipelineError`] of the run; any output already written
/// is incomplete.
pub async fn execute(cfg: &Config, kms: &dyn KmsClient) -> Result<RunSummary, PipelineError> {
    let format = cfg
        .record_format()
        .map_err(|e| PipelineError::ConfigurationInvalid(format!("{e:#}")))?;
    let fields = cfg.fields_to_encrypt();
    info!(
        version = env!("CARGO_PKG_VERSION"),
        format = format.as_str(),
        input = %cfg.input_path,
        output = %cfg.output_path,
        requested_fields = fields.len(),
        "field-encrypter starting"
    );

    let primitive = unwrap::load_primitive(kms, &cfg.keyset(), &cfg.master_key_uri).await?;

    let (input, output) = (cfg.input(), cfg.output());
    let span = Span::current();
    let joined = tokio::task::spawn_blocking(move || {
        let _entered = span.enter();
        let mut transformer = Transformer::new(&primitive, &fields);
        let result = run_files(&mut transformer, format, &input, &output);
        debug!(state = ?transformer.state(), "transformer stopped");
        result
    })
    .await;

    let summary = match joined {
        Ok(result) => result?,
        Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
        Err(e) => {
            return Err(PipelineError::OutputWriteFailed {
                record: 0,
                message: format!("transformer task did not complete: {e}"),
            })
        }
    };

    info!(
        records = summary.records,
        encrypted_fields = summary.encrypted_fields,
        "run completed successfully"
    );
    Ok(summary)
}
