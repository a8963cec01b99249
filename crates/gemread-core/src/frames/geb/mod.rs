//! GEB board sub-frame decoding.
//!
//! A GEB frame is one 64-bit header word (zero-suppression flags, chamber id,
//! VFAT count), that many VFAT chip sub-frames in readout layout, and one
//! 64-bit trailer word of diagnostics. The VFAT count is bounded before any
//! chip sub-frame is read.

pub mod layout;
pub mod parser;

pub use parser::{GebFrame, GebHeader, GebTrailer, decode_geb};
