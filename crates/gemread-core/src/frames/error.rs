use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::source::TokenKind;

/// Framing level a decode error or log record refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameKind {
    /// Calibration-scan parameter header.
    ScanHeader,
    /// Chip sub-frame.
    Vfat,
    /// Board sub-frame.
    Geb,
    /// Top-level readout frame.
    Amc,
}

impl fmt::Display for FrameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FrameKind::ScanHeader => "scan header",
            FrameKind::Vfat => "VFAT frame",
            FrameKind::Geb => "GEB frame",
            FrameKind::Amc => "AMC frame",
        };
        f.write_str(name)
    }
}

/// How a pull loop over the event stream finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamEnd {
    /// The stream ran out between frames, or the caller stopped pulling.
    Clean,
    /// An I/O failure or undecodable content aborted the stream.
    Fault,
    /// A frame started but the stream ended before it was complete.
    Truncated,
}

impl fmt::Display for StreamEnd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StreamEnd::Clean => "clean",
            StreamEnd::Fault => "fault",
            StreamEnd::Truncated => "truncated",
        };
        f.write_str(name)
    }
}

/// Errors that abort a decode cycle.
///
/// A clean end of stream is not an error (`Ok(None)` from
/// `EventStream::decode_next`), and control-nibble mismatches are reported
/// on the frame itself.
///
/// # Examples
/// ```
/// use gemread_core::{DecodeError, FrameKind, StreamEnd};
///
/// let err = DecodeError::TruncatedFrame {
///     frame: FrameKind::Vfat,
///     field: "ChipID",
/// };
/// assert!(err.to_string().contains("ChipID"));
/// assert_eq!(err.stream_end(), StreamEnd::Truncated);
/// ```
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("stream fault: {0}")]
    StreamFault(#[from] std::io::Error),
    #[error("truncated {frame}: stream ended before field {field}")]
    TruncatedFrame {
        frame: FrameKind,
        field: &'static str,
    },
    #[error("malformed {field} in {frame}: token '{token}' is not a {expected}")]
    MalformedToken {
        frame: FrameKind,
        field: &'static str,
        token: String,
        expected: TokenKind,
    },
    #[error("malformed scan header: {reason}")]
    MalformedHeader { reason: String },
    #[error("unreasonable sub-frame count in {frame}: {count} exceeds limit {max}")]
    UnreasonableCount {
        frame: FrameKind,
        count: u64,
        max: u64,
    },
}

impl DecodeError {
    /// End reason reported to sinks when this error stops the stream.
    pub fn stream_end(&self) -> StreamEnd {
        match self {
            DecodeError::TruncatedFrame { .. } => StreamEnd::Truncated,
            _ => StreamEnd::Fault,
        }
    }
}
