//! VFAT2 chip sub-frame decoding.
//!
//! A chip sub-frame carries three control-nibble words (BC, EC, ChipID), the
//! 128-bit channel hit vector as two 64-bit words and an opaque CRC. The
//! threshold-scan variant inserts `bxExp`/`bxNum` before ChipID and a float
//! `delVT` before the CRC.
//!
//! Control nibble mismatches never abort decoding: the frame is returned in
//! full with `control_mismatch` set, so misalignment is visible to sinks.

pub mod layout;
pub mod parser;

pub use parser::{BxInfo, ControlField, VfatFrame, VfatVariant, decode_vfat};
