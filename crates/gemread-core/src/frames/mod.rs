//! Frame decoders, layered bottom-up.
//!
//! `common` holds the bitfield codec and the field reader every decoder
//! shares. `vfat` decodes one chip sub-frame, `geb` one board sub-frame of
//! chip sub-frames, `amc` one readout frame of board sub-frames. `scan` reads
//! the header that precedes a threshold-scan file.

pub mod amc;
pub mod common;
pub mod error;
pub mod geb;
pub mod scan;
pub mod vfat;

pub use amc::{AmcHeader, AmcTrailer, GemFrame, decode_amc};
pub use common::bitfield::{CHANNEL_COUNT, ChannelMap, Field, channel_bit, extract};
pub use error::{DecodeError, FrameKind, StreamEnd};
pub use geb::{GebFrame, GebHeader, GebTrailer, decode_geb};
pub use scan::{ScanHeader, decode_scan_header};
pub use vfat::{BxInfo, ControlField, VfatFrame, VfatVariant, decode_vfat};
