//! gemread core library: offline decoding of GEM/VFAT2 readout dumps.
//!
//! Readout dumps are whitespace-separated hexadecimal (and, for threshold
//! scans, decimal) tokens carrying a nested frame structure: AMC readout
//! frames hold GEB board sub-frames, which hold VFAT chip sub-frames. The
//! crate is layered bottom-up:
//!
//! - `source`: the token reader, the only place that performs I/O;
//! - `frames`: table-driven bitfield layouts and one decoder per framing
//!   level, each consuming exactly its own tokens;
//! - `stream`: the pull loop yielding one top-level frame per call;
//! - `sink`: independent consumers (printer, JSON lines, histograms).
//!
//! Invariants:
//! - A decoder never consumes more tokens than its frame occupies.
//! - End of stream between frames is `Ok(None)`, never an error.
//! - Control-nibble mismatches are flagged on the frame, not raised.
//!
//! # Examples
//! ```
//! use gemread_core::DecoderConfig;
//! use gemread_core::sink::ChannelHits;
//! use gemread_core::stream::{ReadoutStream, run};
//!
//! let input = "0000000000000001  a001 c012 e0ab 3 0 0  0\n";
//! let mut stream = ReadoutStream::readout(input.as_bytes(), &DecoderConfig::default());
//! let mut hits = ChannelHits::new();
//! let summary = run(&mut stream, &mut hits, None)?;
//! assert_eq!(summary.events, 1);
//! assert_eq!(hits.total_hits(), 2);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod config;
pub mod frames;
pub mod sink;
pub mod source;
pub mod stream;

pub use config::{ConfigError, DecoderConfig};
pub use frames::{DecodeError, FrameKind, StreamEnd};
pub use source::{TokenError, TokenKind, TokenReader};
pub use stream::{EventStream, RunError, RunSummary};
