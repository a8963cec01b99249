use std::fmt;

use tracing::warn;

use super::{FrameSink, SinkError};
use crate::frames::{CHANNEL_COUNT, DecodeError, FrameKind, ScanHeader, VfatFrame};

/// Hit counts for one threshold bin.
#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdBin {
    /// Lowest threshold falling in this bin.
    pub threshold: i64,
    /// Scan events whose `delVT` fell in this bin.
    pub events: u64,
    /// Of those, events with at least one channel hit.
    pub hit_events: u64,
    /// Hits per channel index.
    pub channels: Vec<u64>,
}

/// Threshold-scan curve: hit occupancy binned by `delVT`.
///
/// Bins are `step_size` wide and centred on the scan thresholds, so bin `i`
/// covers `[min_th + i * step - 0.5, min_th + (i + 1) * step - 0.5)`.
/// Events outside the scan range are counted as underflow or overflow.
#[derive(Debug, Clone)]
pub struct ThresholdCurve {
    pub header: ScanHeader,
    pub bins: Vec<ThresholdBin>,
    pub underflow: u64,
    pub overflow: u64,
    /// Events without a usable `delVT` value.
    pub missing_threshold: u64,
}

enum Placement {
    Bin(usize),
    Below,
    Above,
}

impl ThresholdCurve {
    /// Allocate one bin per scan threshold.
    ///
    /// # Errors
    /// `UnreasonableCount` when the header describes more than `max_bins`
    /// bins; nothing is allocated in that case.
    pub fn new(header: ScanHeader, max_bins: u64) -> Result<Self, DecodeError> {
        let count = header.bin_count();
        if count > max_bins {
            warn!(
                min_th = header.min_th,
                max_th = header.max_th,
                step_size = header.step_size,
                count,
                max = max_bins,
                "Scan header describes too many threshold bins"
            );
            return Err(DecodeError::UnreasonableCount {
                frame: FrameKind::ScanHeader,
                count,
                max: max_bins,
            });
        }
        let bins = (0..count)
            .map(|index| ThresholdBin {
                threshold: header.min_th + index as i64 * header.step_size,
                events: 0,
                hit_events: 0,
                channels: vec![0; CHANNEL_COUNT],
            })
            .collect();
        Ok(Self {
            header,
            bins,
            underflow: 0,
            overflow: 0,
            missing_threshold: 0,
        })
    }

    fn place(&self, del_vt: f64) -> Placement {
        let offset = (del_vt - self.header.min_th as f64 + 0.5) / self.header.step_size as f64;
        if offset < 0.0 {
            return Placement::Below;
        }
        let index = offset.floor() as usize;
        if index >= self.bins.len() {
            return Placement::Above;
        }
        Placement::Bin(index)
    }

    pub fn record(&mut self, frame: &VfatFrame) {
        let Some(del_vt) = frame.del_vt.filter(|del_vt| !del_vt.is_nan()) else {
            self.missing_threshold += 1;
            return;
        };
        let index = match self.place(del_vt) {
            Placement::Bin(index) => index,
            Placement::Below => {
                self.underflow += 1;
                return;
            }
            Placement::Above => {
                self.overflow += 1;
                return;
            }
        };
        let bin = &mut self.bins[index];
        bin.events += 1;
        if !frame.channels.is_empty() {
            bin.hit_events += 1;
        }
        for channel in frame.channels.hits() {
            bin.channels[channel] += 1;
        }
    }
}

impl FrameSink<VfatFrame> for ThresholdCurve {
    fn on_frame_decoded(&mut self, frame: &VfatFrame) -> Result<(), SinkError> {
        self.record(frame);
        Ok(())
    }
}

impl fmt::Display for ThresholdCurve {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "threshold scan {}..={} step {}: {} bins",
            self.header.min_th,
            self.header.max_th,
            self.header.step_size,
            self.bins.len()
        )?;
        for bin in &self.bins {
            write!(
                f,
                "\n  {:>6}: {} / {} events with hits",
                bin.threshold, bin.hit_events, bin.events
            )?;
        }
        if self.underflow + self.overflow + self.missing_threshold > 0 {
            write!(
                f,
                "\n  outside range: {} below, {} above, {} without delVT",
                self.underflow, self.overflow, self.missing_threshold
            )?;
        }
        Ok(())
    }
}
