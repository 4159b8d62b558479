use crate::delta::Delta;
use finsight_core::{FinsightError, FinsightResult};
use tracing::{debug, warn};

const TOKEN_CODE: &str = "0";
const DATA_CODE: &str = "2";
const ERROR_CODE: &str = "3";

/// One record on the outbound chat stream.
///
/// Framed as `<code>:<json>\n`. JSON escapes newlines inside strings, so a
/// newline always terminates a record.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamRecord {
    /// Language-model answer token (code `0`).
    Token(String),
    /// Artifact mutation (code `2`).
    Data(Delta),
    /// Top-level, user-visible error (code `3`).
    Error(String),
}

/// Encodes a record as one framed line.
pub fn encode(record: &StreamRecord) -> FinsightResult<String> {
    let (code, json) = match record {
        StreamRecord::Token(text) => (TOKEN_CODE, serde_json::to_string(text)?),
        StreamRecord::Data(delta) => (DATA_CODE, serde_json::to_string(delta)?),
        StreamRecord::Error(message) => (ERROR_CODE, serde_json::to_string(message)?),
    };
    Ok(format!("{code}:{json}\n"))
}

fn decode_line(line: &str) -> FinsightResult<Option<StreamRecord>> {
    let (code, json) = line
        .split_once(':')
        .ok_or_else(|| FinsightError::Protocol(format!("record without a code: {line}")))?;

    let record = match code {
        TOKEN_CODE => StreamRecord::Token(serde_json::from_str(json)?),
        DATA_CODE => StreamRecord::Data(Delta::from_value(serde_json::from_str(json)?)?),
        ERROR_CODE => StreamRecord::Error(serde_json::from_str(json)?),
        other => {
            debug!(code = other, "Skipping record with unknown code");
            return Ok(None);
        }
    };
    Ok(Some(record))
}

/// Incremental decoder for a byte stream of framed records.
///
/// Bytes are buffered until a newline arrives, so transport chunks may split
/// records (or multi-byte characters) anywhere. Malformed records are logged
/// and skipped; they never poison the rest of the stream.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: Vec<u8>,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds a transport chunk and returns every record it completed.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<StreamRecord> {
        self.buffer.extend_from_slice(chunk);

        let mut records = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            if let Some(record) = Self::parse(&line[..line.len() - 1]) {
                records.push(record);
            }
        }
        records
    }

    /// Flushes a trailing record that was not newline-terminated.
    pub fn finish(&mut self) -> Option<StreamRecord> {
        let rest = std::mem::take(&mut self.buffer);
        Self::parse(&rest)
    }

    /// Bytes buffered but not yet decoded.
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    fn parse(line: &[u8]) -> Option<StreamRecord> {
        let line = match std::str::from_utf8(line) {
            Ok(line) => line.trim(),
            Err(e) => {
                warn!(error = %e, "Skipping record that is not valid UTF-8");
                return None;
            }
        };
        if line.is_empty() {
            return None;
        }
        match decode_line(line) {
            Ok(record) => record,
            Err(e) => {
                warn!(error = %e, "Skipping malformed record");
                None
            }
        }
    }
}
