//! CSV variant: header row first, then one encrypted row per input row.

use std::io::{Read, Write};

use csv::{ReaderBuilder, StringRecord, WriterBuilder};
use common::PipelineError;
use tracing::{debug, info, warn};

use super::{read_failed, write_failed, RunState, RunSummary, Transformer};
use crate::selector::ColumnSelection;

pub(super) fn transform<R: Read, W: Write>(
    t: &mut Transformer<'_>,
    input: R,
    output: W,
) -> Result<RunSummary, PipelineError> {
    t.enter(RunState::AwaitHeader);

    let mut reader = ReaderBuilder::new().has_headers(false).from_reader(input);
    let mut writer = WriterBuilder::new().from_writer(output);

    let mut header = StringRecord::new();
    match reader.read_record(&mut header) {
        Ok(true) => {}
        Ok(false) => return Err(read_failed(0, "input is empty; a header row is required")),
        Err(e) => return Err(read_failed(0, e.to_string())),
    }

    let selection = ColumnSelection::resolve(t.fields(), header.iter());
    info!(
        columns = header.len(),
        selected = selection.len(),
        "header resolved"
    );
    if selection.is_empty() {
        warn!("no requested field matches the header; rows pass through unchanged");
    } else {
        debug!(indices = ?selection.indices(), "columns selected for encryption");
    }
    if !selection.unmatched().is_empty() {
        debug!(unmatched = ?selection.unmatched(), "requested fields absent from header");
    }

    writer
        .write_record(&header)
        .map_err(|e| write_failed(0, e.to_string()))?;
    t.enter(RunState::Streaming);

    let mut row = StringRecord::new();
    let mut out = StringRecord::new();
    let mut summary = RunSummary::default();

    loop {
        let ordinal = summary.records + 1;
        match reader.read_record(&mut row) {
            Ok(true) => {}
            Ok(false) => break,
            Err(e) => return Err(read_failed(ordinal, e.to_string())),
        }

        out.clear();
        for (index, cell) in row.iter().enumerate() {
            if selection.contains(index) {
                let encrypted = t.encrypt_value(ordinal, &header[index], cell)?;
                out.push_field(&encrypted);
                summary.encrypted_fields += 1;
            } else {
                out.push_field(cell);
            }
        }

        writer
            .write_record(&out)
            .map_err(|e| write_failed(ordinal, e.to_string()))?;
        summary.records = ordinal;
    }

    writer
        .flush()
        .map_err(|e| write_failed(summary.records, e.to_string()))?;
    Ok(summary)
}
