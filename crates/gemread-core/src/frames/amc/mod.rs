//! AMC (GEM) top-level readout frame decoding.
//!
//! Three header words, `DAVCount` GEB board sub-frames, then trailer 2 and
//! trailer 1. Header and trailer fields are pass-through diagnostics; only
//! the `0000` marker nibbles are checked, and a mismatch is advisory.

pub mod layout;
pub mod parser;

pub use parser::{AmcHeader, AmcTrailer, GemFrame, decode_amc};
