//! Threshold-scan file header.

pub mod parser;

pub use parser::{ScanHeader, decode_scan_header};
