//! JSON-lines variant: a stream of top-level objects, written back one per line.

use std::io::{Read, Write};

use common::PipelineError;
use serde_json::{Deserializer, Value};
use tracing::debug;

use super::{read_failed, write_failed, RunState, RunSummary, Transformer};
use crate::selector::KeySelection;

pub(super) fn transform<R: Read, W: Write>(
    t: &mut Transformer<'_>,
    input: R,
    mut output: W,
) -> Result<RunSummary, PipelineError> {
    let selection = KeySelection::new(t.fields());
    t.enter(RunState::Streaming);

    let mut summary = RunSummary::default();
    for next in Deserializer::from_reader(input).into_iter::<Value>() {
        let ordinal = summary.records + 1;
        let mut record = next.map_err(|e| read_failed(ordinal, e.to_string()))?;

        let Value::Object(object) = &mut record else {
            return Err(read_failed(
                ordinal,
                format!("expected a JSON object, found {}", kind_of(&record)),
            ));
        };

        for key in selection.keys() {
            let Some(value) = object.get_mut(key) else {
                continue;
            };
            // Non-string values are encrypted as their compact JSON text.
            let encrypted = match &*value {
                Value::String(text) => t.encrypt_value(ordinal, key, text)?,
                other => t.encrypt_value(ordinal, key, &other.to_string())?,
            };
            *value = Value::String(encrypted);
            summary.encrypted_fields += 1;
        }

        serde_json::to_writer(&mut output, &record)
            .and_then(|()| output.write_all(b"\n").map_err(serde_json::Error::io))
            .map_err(|e| write_failed(ordinal, e.to_string()))?;
        summary.records = ordinal;
    }

    output
        .flush()
        .map_err(|e| write_failed(summary.records, e.to_string()))?;
    debug!(records = summary.records, "json stream drained");
    Ok(summary)
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Value};

    use crate::crypto::cipher::CipherError;
    use crate::crypto::primitive::MockFieldEncryptor;
    use crate::crypto::KeysetPrimitive;
    use crate::pipeline::{RecordFormat, RunState, RunSummary, Transformer};
    use crate::testing::{fixed_deterministic_primitive, fixed_primitive};
    use common::PipelineError;

    fn run_with(
        p: &KeysetPrimitive,
        input: &str,
        fields: &[&str],
    ) -> (Result<RunSummary, PipelineError>, String, RunState) {
        let fields: Vec<String> = fields.iter().map(|s| s.to_string()).collect();
        let mut t = Transformer::new(p, &fields);
        let mut out = Vec::new();
        let result = t.run(RecordFormat::Jsonl, input.as_bytes(), &mut out);
        (result, String::from_utf8(out).unwrap(), t.state())
    }

    fn run(input: &str, fields: &[&str]) -> (Result<RunSummary, PipelineError>, String, RunState) {
        run_with(&fixed_primitive(), input, fields)
    }

    fn lines(out: &str) -> Vec<Value> {
        out.lines().map(|l| serde_json::from_str(l).unwrap()).collect()
    }

    #[test]
    fn encrypts_present_keys_and_tolerates_missing() {
        let (result, out, state) = run("{\"a\":\"1\",\"b\":\"2\"}\n{\"a\":\"3\"}\n", &["b"]);
        assert_eq!(result.unwrap(), RunSummary { records: 2, encrypted_fields: 1 });
        assert_eq!(state, RunState::Drained);

        let records = lines(&out);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["a"], "1");
        let b = records[0]["b"].as_str().unwrap();
        assert_eq!(fixed_primitive().decrypt_field(b).unwrap(), "2");
        // The missing key is not synthesised.
        assert_eq!(records[1], json!({"a": "3"}));
    }

    #[test]
    fn key_match_is_exact_case() {
        let (result, out, _) = run("{\"Card\":\"Visa\"}\n", &["card"]);
        assert_eq!(result.unwrap().encrypted_fields, 0);
        assert_eq!(out, "{\"Card\":\"Visa\"}\n");
    }

    #[test]
    fn key_order_and_untouched_values_preserved() {
        let input = "{\"z\":1,\"secret\":\"s\",\"a\":[1,2],\"n\":null}\n";
        let (result, out, _) = run(input, &["secret"]);
        result.unwrap();

        assert!(out.starts_with("{\"z\":1,\"secret\":\""));
        assert!(out.ends_with("\",\"a\":[1,2],\"n\":null}\n"));
    }

    #[test]
    fn number_text_survives_untouched() {
        let (result, out, _) = run("{\"amount\":1.50,\"big\":12345678901234567890123}\n", &[]);
        result.unwrap();
        assert_eq!(out, "{\"amount\":1.50,\"big\":12345678901234567890123}\n");
    }

    #[test]
    fn non_string_target_encrypted_as_json_text() {
        let (result, out, _) = run("{\"n\":42,\"o\":{\"k\":true}}\n", &["n", "o"]);
        assert_eq!(result.unwrap().encrypted_fields, 2);

        let records = lines(&out);
        let p = fixed_primitive();
        assert_eq!(p.decrypt_field(records[0]["n"].as_str().unwrap()).unwrap(), "42");
        assert_eq!(
            p.decrypt_field(records[0]["o"].as_str().unwrap()).unwrap(),
            "{\"k\":true}"
        );
    }

    #[test]
    fn deterministic_primitive_gives_equal_ciphertexts() {
        let p = fixed_deterministic_primitive();
        let input = "{\"bank\":\"Chase\"}\n{\"bank\":\"Chase\"}\n{\"bank\":\"Citi\"}\n";
        let (result, out, _) = run_with(&p, input, &["bank"]);
        result.unwrap();

        let records = lines(&out);
        assert_eq!(records[0]["bank"], records[1]["bank"]);
        assert_ne!(records[0]["bank"], records[2]["bank"]);
        assert_eq!(p.decrypt_field(records[2]["bank"].as_str().unwrap()).unwrap(), "Citi");
    }

    #[test]
    fn blank_lines_are_skipped() {
        let (result, out, _) = run("\n{\"a\":\"1\"}\n\n{\"a\":\"2\"}\n", &[]);
        assert_eq!(result.unwrap().records, 2);
        assert_eq!(out, "{\"a\":\"1\"}\n{\"a\":\"2\"}\n");
    }

    #[test]
    fn non_object_record_fails() {
        let (result, out, state) = run("{\"a\":\"1\"}\n[1,2]\n", &["a"]);
        match result {
            Err(PipelineError::InputReadFailed { record, message }) => {
                assert_eq!(record, 2);
                assert!(message.contains("an array"));
            }
            other => panic!("expected InputReadFailed, got {other:?}"),
        }
        assert_eq!(state, RunState::Failed);
        assert_eq!(out.lines().count(), 1);
    }

    #[test]
    fn malformed_json_fails_with_ordinal() {
        let (result, _, _) = run("{\"a\":\"1\"}\n{\"a\":\n", &["a"]);
        assert!(matches!(
            result,
            Err(PipelineError::InputReadFailed { record: 2, .. })
        ));
    }

    #[test]
    fn empty_input_is_an_empty_stream() {
        let (result, out, state) = run("", &["a"]);
        assert_eq!(result.unwrap(), RunSummary::default());
        assert!(out.is_empty());
        assert_eq!(state, RunState::Drained);
    }

    #[test]
    fn encryption_failure_stops_before_the_record_is_written() {
        let mut enc = MockFieldEncryptor::new();
        enc.expect_encrypt_field().times(2).returning(|v| {
            if v == "2" {
                Err(CipherError::AeadFailure)
            } else {
                Ok(format!("E({v})"))
            }
        });
        let fields = vec!["b".to_string()];
        let mut t = Transformer::new(&enc, &fields);

        let input = "{\"a\":\"x\",\"b\":\"1\"}\n{\"a\":\"y\",\"b\":\"2\"}\n{\"b\":\"3\"}\n";
        let mut out = Vec::new();
        let err = t.run(RecordFormat::Jsonl, input.as_bytes(), &mut out).unwrap_err();

        match err {
            PipelineError::EncryptionFailed { record, field } => {
                assert_eq!(record, 2);
                assert_eq!(field, "b");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(t.state(), RunState::Failed);
        assert_eq!(String::from_utf8(out).unwrap(), "{\"a\":\"x\",\"b\":\"E(1)\"}\n");
    }

    /// Accepts the first line, then fails every write.
    struct FailsAfterFirstLine {
        written: Vec<u8>,
    }

    impl std::io::Write for FailsAfterFirstLine {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            if self.written.contains(&b'\n') {
                return Err(std::io::Error::new(std::io::ErrorKind::Other, "disk full"));
            }
            self.written.extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn write_failure_is_terminal() {
        let p = fixed_primitive();
        let fields = vec!["b".to_string()];
        let mut t = Transformer::new(&p, &fields);
        let mut sink = FailsAfterFirstLine { written: Vec::new() };

        let input = "{\"b\":\"first\"}\n{\"b\":\"second\"}\n{\"b\":\"third\"}\n";
        let result = t.run(RecordFormat::Jsonl, input.as_bytes(), &mut sink);

        assert!(matches!(
            result,
            Err(PipelineError::OutputWriteFailed { record: 2, .. })
        ));
        assert_eq!(t.state(), RunState::Failed);
        let written = String::from_utf8(sink.written).unwrap();
        assert_eq!(written.lines().count(), 1);
        assert!(!written.contains("first"));
        assert!(!written.contains("second"));
        assert!(!written.contains("third"));
    }
}
