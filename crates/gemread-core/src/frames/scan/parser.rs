use std::io::BufRead;

use serde::Serialize;
use tracing::info;

use crate::frames::common::reader::FieldReader;
use crate::frames::error::{DecodeError, FrameKind};
use crate::source::TokenReader;

/// Threshold-scan parameters written once at the start of a scan file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ScanHeader {
    pub min_th: i64,
    pub max_th: i64,
    pub step_size: i64,
}

impl ScanHeader {
    /// Validate the parameters and build a header.
    ///
    /// # Errors
    /// `MalformedHeader` unless `step_size > 0`, `max_th >= min_th` and the
    /// threshold range divides evenly into steps.
    ///
    /// # Examples
    /// ```
    /// use gemread_core::frames::ScanHeader;
    ///
    /// assert_eq!(ScanHeader::new(0, 9, 1)?.bin_count(), 10);
    /// assert!(ScanHeader::new(0, 9, 2).is_err());
    /// # Ok::<(), gemread_core::DecodeError>(())
    /// ```
    pub fn new(min_th: i64, max_th: i64, step_size: i64) -> Result<Self, DecodeError> {
        if step_size <= 0 {
            return Err(malformed(format!("step size {step_size} is not positive")));
        }
        let span = max_th
            .checked_sub(min_th)
            .and_then(|span| span.checked_add(1))
            .ok_or_else(|| malformed(format!("threshold range {min_th}..={max_th} overflows")))?;
        if span <= 0 {
            return Err(malformed(format!(
                "maximum threshold {max_th} is below minimum {min_th}"
            )));
        }
        if span % step_size != 0 {
            return Err(malformed(format!(
                "{span} thresholds from {min_th} to {max_th} do not divide into steps of {step_size}"
            )));
        }
        Ok(Self {
            min_th,
            max_th,
            step_size,
        })
    }

    /// Number of threshold bins, `(max_th - min_th + 1) / step_size`.
    pub fn bin_count(&self) -> u64 {
        ((self.max_th - self.min_th + 1) / self.step_size) as u64
    }
}

fn malformed(reason: String) -> DecodeError {
    DecodeError::MalformedHeader { reason }
}

/// Read and validate the `minTh maxTh stepSize` header (decimal integers).
pub fn decode_scan_header<R: BufRead>(
    tokens: &mut TokenReader<R>,
) -> Result<ScanHeader, DecodeError> {
    let mut fields = FieldReader::new(tokens, FrameKind::ScanHeader);
    let min_th = fields.int("minTh")?;
    let max_th = fields.int("maxTh")?;
    let step_size = fields.int("stepSize")?;

    let header = ScanHeader::new(min_th, max_th, step_size)?;
    info!(
        min_th,
        max_th,
        step_size,
        bins = header.bin_count(),
        "Read threshold scan header"
    );
    Ok(header)
}
