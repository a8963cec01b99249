use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use super::{FrameSink, SinkError};
use crate::frames::{CHANNEL_COUNT, VfatFrame};
use crate::stream::Event;

/// Per-channel hit histogram and chip-id census over every chip sub-frame
/// seen, optionally skipping a set of chip ids (for example the `0xded`
/// placeholder some boards emit).
#[derive(Debug, Clone)]
pub struct ChannelHits {
    hits: [u64; CHANNEL_COUNT],
    chips: BTreeMap<u16, u64>,
    excluded: BTreeSet<u16>,
    chips_seen: u64,
    chips_excluded: u64,
}

impl ChannelHits {
    pub fn new() -> Self {
        Self::excluding(std::iter::empty())
    }

    pub fn excluding<I: IntoIterator<Item = u16>>(chip_ids: I) -> Self {
        Self {
            hits: [0; CHANNEL_COUNT],
            chips: BTreeMap::new(),
            excluded: chip_ids.into_iter().collect(),
            chips_seen: 0,
            chips_excluded: 0,
        }
    }

    pub fn record(&mut self, chip: &VfatFrame) {
        self.chips_seen += 1;
        let chip_id = chip.chip_id();
        if self.excluded.contains(&chip_id) {
            self.chips_excluded += 1;
            return;
        }
        *self.chips.entry(chip_id).or_default() += 1;
        for index in chip.channels.hits() {
            self.hits[index] += 1;
        }
    }

    pub fn hits(&self) -> &[u64; CHANNEL_COUNT] {
        &self.hits
    }

    /// Counted chip sub-frames per chip id, ascending.
    pub fn chip_counts(&self) -> &BTreeMap<u16, u64> {
        &self.chips
    }

    pub fn chips_seen(&self) -> u64 {
        self.chips_seen
    }

    pub fn chips_excluded(&self) -> u64 {
        self.chips_excluded
    }

    pub fn total_hits(&self) -> u64 {
        self.hits.iter().sum()
    }
}

impl Default for ChannelHits {
    fn default() -> Self {
        Self::new()
    }
}

impl<F: Event> FrameSink<F> for ChannelHits {
    fn on_frame_decoded(&mut self, frame: &F) -> Result<(), SinkError> {
        for chip in frame.chips() {
            self.record(chip);
        }
        Ok(())
    }
}

impl fmt::Display for ChannelHits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "chips: {} seen, {} excluded, {} distinct ids",
            self.chips_seen,
            self.chips_excluded,
            self.chips.len()
        )?;
        for (chip_id, count) in &self.chips {
            writeln!(f, "  chip 0x{chip_id:03x}: {count}")?;
        }
        write!(f, "channel hits: {} total", self.total_hits())?;
        for (index, count) in self.hits.iter().enumerate() {
            if *count > 0 {
                write!(f, "\n  ch {index:3}: {count}")?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::ChannelHits;
    use crate::frames::{VfatFrame, VfatVariant, decode_vfat};
    use crate::sink::FrameSink;
    use crate::source::TokenReader;

    fn chip(chip_id: u16, low: u64, high: u64) -> VfatFrame {
        let input = format!("a001 c012 e{chip_id:03x} {low:x} {high:x} 0");
        let mut tokens = TokenReader::new(input.as_bytes());
        decode_vfat(&mut tokens, VfatVariant::Readout).unwrap()
    }

    #[test]
    fn counts_hits_per_channel_across_the_word_boundary() {
        let mut hits = ChannelHits::new();
        hits.on_frame_decoded(&chip(0x1, 1 << 63, 1)).unwrap();
        hits.on_frame_decoded(&chip(0x2, 1 << 63, 0)).unwrap();

        assert_eq!(hits.hits()[63], 2);
        assert_eq!(hits.hits()[64], 1);
        assert_eq!(hits.total_hits(), 3);
        assert_eq!(hits.chip_counts().len(), 2);
    }

    #[test]
    fn excluded_chip_ids_are_counted_but_not_histogrammed() {
        let mut hits = ChannelHits::excluding([0xded]);
        hits.on_frame_decoded(&chip(0xded, u64::MAX, u64::MAX)).unwrap();
        hits.on_frame_decoded(&chip(0x0ab, 0b11, 0)).unwrap();

        assert_eq!(hits.chips_seen(), 2);
        assert_eq!(hits.chips_excluded(), 1);
        assert_eq!(hits.total_hits(), 2);
        assert!(!hits.chip_counts().contains_key(&0xded));
        assert_eq!(hits.chip_counts().get(&0x0ab), Some(&1));
        assert!(hits.to_string().contains("chip 0x0ab: 1"));
    }
}
