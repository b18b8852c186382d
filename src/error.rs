//! Errors raised while decoding an UPDATE.APP block stream.
//!
//! Every structural error carries the absolute byte offset at which the
//! problem was detected.  Decoding never resumes after an error.

use std::io;
use std::str::Utf8Error;

use thiserror::Error;

use crate::module_type::ModuleId;

/// Coarse error category, used by callers that only care about the class of
/// failure rather than its exact location.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Structural violation of the container layout.
    Format,
    /// Module type code absent from the module type table.
    Lookup,
    /// Fixed-width string field is not valid text.
    Encoding,
    /// Underlying read failure, or a sink failed to persist a payload.
    Io,
}

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("bad leading pad: non-zero byte at offset {offset:#x}")]
    BadLeadingPad { offset: u64 },

    #[error("bad block magic at offset {offset:#x}: found {found}")]
    BadMagic { offset: u64, found: String },

    #[error("bad {field} at offset {offset:#x}: expected {expected}, found {found}")]
    FieldMismatch {
        offset:   u64,
        field:    &'static str,
        expected: String,
        found:    String,
    },

    #[error("header_len too small at offset {offset:#x}: {header_len} < {minimum}")]
    HeaderTooSmall { offset: u64, header_len: u32, minimum: u32 },

    #[error("truncated {what} at offset {offset:#x}: expected {expected} bytes, got {got}")]
    Truncated {
        offset:   u64,
        what:     &'static str,
        expected: u64,
        got:      u64,
    },

    #[error("bad alignment pad at offset {offset:#x}: {found}")]
    BadAlignmentPad { offset: u64, found: String },

    #[error("display name {display_name:?} does not match module type {expected}")]
    NameMismatch { display_name: String, expected: &'static str },

    #[error("decoder aborted by an earlier error at offset {offset:#x}")]
    Aborted { offset: u64 },

    #[error("unknown module type code {module_id}")]
    UnknownModuleType { module_id: ModuleId },

    #[error("{field} at offset {offset:#x} is not valid UTF-8: {source}")]
    Encoding {
        offset: u64,
        field:  &'static str,
        #[source]
        source: Utf8Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl ParseError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ParseError::UnknownModuleType { .. } => ErrorKind::Lookup,
            ParseError::Encoding { .. }          => ErrorKind::Encoding,
            ParseError::Io(_)                    => ErrorKind::Io,
            _                                    => ErrorKind::Format,
        }
    }

    /// Byte offset of the failure, when the error is tied to a position in
    /// the stream.
    pub fn offset(&self) -> Option<u64> {
        match self {
            ParseError::BadLeadingPad { offset }
            | ParseError::BadMagic { offset, .. }
            | ParseError::FieldMismatch { offset, .. }
            | ParseError::HeaderTooSmall { offset, .. }
            | ParseError::Truncated { offset, .. }
            | ParseError::BadAlignmentPad { offset, .. }
            | ParseError::Aborted { offset }
            | ParseError::Encoding { offset, .. } => Some(*offset),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds() {
        assert_eq!(ParseError::BadLeadingPad { offset: 3 }.kind(), ErrorKind::Format);
        assert_eq!(
            ParseError::NameMismatch { display_name: "x".into(), expected: "BOOT" }.kind(),
            ErrorKind::Format
        );
        assert_eq!(
            ParseError::UnknownModuleType { module_id: ModuleId([1, 2, 3, 4]) }.kind(),
            ErrorKind::Lookup
        );
        assert_eq!(ParseError::Io(io::ErrorKind::Other.into()).kind(), ErrorKind::Io);
    }

    #[test]
    fn messages_carry_offset() {
        let err = ParseError::Truncated { offset: 0x7c, what: "payload", expected: 4, got: 3 };
        assert_eq!(err.offset(), Some(0x7c));
        assert_eq!(
            err.to_string(),
            "truncated payload at offset 0x7c: expected 4 bytes, got 3"
        );
    }
}
