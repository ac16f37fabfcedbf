//! Datagram framing and tokenizing for the tracker air interface.
//!
//! Responsibilities:
//! - Validate the `$` terminator and report-class prefix
//! - Decode the payload as Latin-1 (total — any byte sequence decodes)
//! - Split on `,` into bounds-checked fields

use crate::types::Reject;

/// Datagram terminator byte.
pub const TERMINATOR: u8 = b'$';

/// Report-class prefixes accepted on the wire.
pub const PREFIXES: &[&[u8]] = &[b"+RESP", b"+BUFF", b"+ACK"];

/// Check framing: `$`-terminated and a recognised report-class prefix.
///
/// A missing terminator is sufficient to reject, regardless of prefix.
pub fn validate_framing(buf: &[u8]) -> Result<(), Reject> {
    if buf.last() != Some(&TERMINATOR) {
        return Err(Reject::MissingTerminator);
    }
    if !PREFIXES.iter().any(|prefix| buf.starts_with(prefix)) {
        return Err(Reject::UnknownPrefix);
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// TokenizedMessage
// ---------------------------------------------------------------------------

/// The comma-separated fields of one datagram.
///
/// Built by decoding the payload as Latin-1: every byte value maps to
/// exactly one char, so tokenizing cannot fail on any 8-bit input. The
/// terminator stays attached to the final field; the trailing-offset
/// accessors used by the handlers account for that.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenizedMessage {
    fields: Vec<String>,
}

impl TokenizedMessage {
    /// Tokenize a raw datagram.
    pub fn from_datagram(buf: &[u8]) -> Self {
        let text: String = buf.iter().map(|&b| b as char).collect();
        TokenizedMessage {
            fields: text.split(',').map(str::to_string).collect(),
        }
    }

    /// Number of fields. Meaningful on its own: the dispatcher uses it
    /// to reject truncated messages.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Field at absolute position `idx`.
    pub fn field(&self, idx: usize) -> Option<&str> {
        self.fields.get(idx).map(String::as_str)
    }

    /// Field counted from the end: `from_end(1)` is the final field,
    /// `from_end(2)` the one before it.
    pub fn from_end(&self, back: usize) -> Option<&str> {
        if back == 0 || back > self.fields.len() {
            return None;
        }
        self.field(self.fields.len() - back)
    }

    /// Split field 0 on the first `:` into (report class, subtype).
    pub fn header(&self) -> Option<(&str, &str)> {
        self.field(0)?.split_once(':')
    }

    /// Device hardware identifier (IMEI), field 2.
    pub fn imei(&self) -> Option<&str> {
        self.field(2)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
