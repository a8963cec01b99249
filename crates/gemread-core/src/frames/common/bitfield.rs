//! Table-driven bitfield extraction.
//!
//! Every sub-field of every word is described by a `Field` constant in the
//! owning frame's `layout` module. Parsers only ever call `Field::extract`;
//! masks and shifts are never spelled out at a call site.

use serde::{Serialize, Serializer};

/// Number of channels carried by one chip sub-frame.
pub const CHANNEL_COUNT: usize = 128;

const WORD_BITS: usize = 64;

/// A `(mask, shift)` pair locating one sub-field inside a word.
///
/// The mask is given in place (unshifted), as it appears in the word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    pub mask: u64,
    pub shift: u32,
}

impl Field {
    pub const fn new(mask: u64, shift: u32) -> Self {
        Self { mask, shift }
    }

    /// Width of the field in bits.
    pub const fn width(&self) -> u32 {
        self.mask.count_ones()
    }

    /// Largest value the field can hold.
    pub const fn max_value(&self) -> u64 {
        self.mask >> self.shift
    }

    pub const fn extract(&self, word: u64) -> u64 {
        extract(word, self.mask, self.shift)
    }

    /// Place `value` into the field's bit positions, dropping bits that do
    /// not fit.
    pub const fn pack(&self, value: u64) -> u64 {
        (value << self.shift) & self.mask
    }
}

/// Extract `(word & mask) >> shift`.
///
/// # Examples
/// ```
/// use gemread_core::frames::extract;
///
/// assert_eq!(extract(0xa123, 0xf000, 12), 0xa);
/// assert_eq!(extract(0xa123, 0x0fff, 0), 0x123);
/// ```
pub const fn extract(word: u64, mask: u64, shift: u32) -> u64 {
    (word & mask) >> shift
}

/// Read channel `index` from a hit vector split across two 64-bit words.
///
/// Indices `0..64` live in `low` (bit `index`), `64..128` in `high`
/// (bit `index - 64`). Returns `None` for indices outside `0..128`.
///
/// # Examples
/// ```
/// use gemread_core::frames::channel_bit;
///
/// assert_eq!(channel_bit(1 << 63, 0, 63), Some(true));
/// assert_eq!(channel_bit(1 << 63, 0, 64), Some(false));
/// assert_eq!(channel_bit(0, 1, 64), Some(true));
/// assert_eq!(channel_bit(0, 0, 128), None);
/// ```
pub const fn channel_bit(low: u64, high: u64, index: usize) -> Option<bool> {
    if index < WORD_BITS {
        Some((low >> index) & 1 == 1)
    } else if index < CHANNEL_COUNT {
        Some((high >> (index - WORD_BITS)) & 1 == 1)
    } else {
        None
    }
}

/// The 128-bit channel hit vector of one chip sub-frame.
///
/// `low` carries channels 1 to 64 (indices `0..64`), `high` carries
/// channels 65 to 128 (indices `64..128`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChannelMap {
    pub low: u64,
    pub high: u64,
}

impl ChannelMap {
    pub const fn new(low: u64, high: u64) -> Self {
        Self { low, high }
    }

    /// Hit state of the channel at zero-based `index`.
    pub const fn hit(&self, index: usize) -> Option<bool> {
        channel_bit(self.low, self.high, index)
    }

    pub const fn hit_count(&self) -> u32 {
        self.low.count_ones() + self.high.count_ones()
    }

    pub const fn is_empty(&self) -> bool {
        self.low == 0 && self.high == 0
    }

    /// Zero-based indices of the channels that fired, ascending.
    pub fn hits(&self) -> impl Iterator<Item = usize> + '_ {
        (0..CHANNEL_COUNT).filter(move |&index| self.hit(index) == Some(true))
    }

    pub fn to_array(&self) -> [bool; CHANNEL_COUNT] {
        let mut bits = [false; CHANNEL_COUNT];
        for index in self.hits() {
            bits[index] = true;
        }
        bits
    }
}

impl Serialize for ChannelMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeStruct;

        let mut state = serializer.serialize_struct("ChannelMap", 3)?;
        state.serialize_field("low", &format!("{:016x}", self.low))?;
        state.serialize_field("high", &format!("{:016x}", self.high))?;
        state.serialize_field("hits", &self.hits().collect::<Vec<_>>())?;
        state.end()
    }
}

/// Check that a word's field table is well formed: each mask is contiguous,
/// starts at its shift, fits the word, and no two fields overlap.
#[cfg(test)]
pub(crate) fn assert_layout(fields: &[Field], word_bits: u32) {
    let mut seen = 0u64;
    for field in fields {
        assert_ne!(field.mask, 0, "empty mask in {field:?}");
        assert_eq!(
            field.mask.trailing_zeros(),
            field.shift,
            "shift does not match mask in {field:?}"
        );
        let width = field.width();
        assert!(
            field
                .max_value()
                .checked_add(1)
                .map_or(width == 64, u64::is_power_of_two),
            "non-contiguous mask in {field:?}"
        );
        assert!(
            field.shift + width <= word_bits,
            "{field:?} exceeds {word_bits}-bit word"
        );
        assert_eq!(seen & field.mask, 0, "{field:?} overlaps another field");
        seen |= field.mask;
    }
}

#[cfg(test)]
mod tests {
    use super::{CHANNEL_COUNT, ChannelMap, Field, channel_bit, extract};

    #[test]
    fn extract_applies_mask_then_shift() {
        assert_eq!(extract(0xffff_ffff_ffff_ffff, 0x0000_00ff_f000_0000, 28), 0xfff);
        assert_eq!(extract(0x1234, 0x0ff0, 4), 0x23);
    }

    #[test]
    fn field_pack_and_extract_agree() {
        let field = Field::new(0x0000_000f_ff00_0000, 24);
        assert_eq!(field.width(), 12);
        assert_eq!(field.max_value(), 0xfff);
        let word = field.pack(0xabc);
        assert_eq!(word, 0x0000_000a_bc00_0000);
        assert_eq!(field.extract(word), 0xabc);
        assert_eq!(field.pack(0x1abc), field.pack(0xabc));
    }

    #[test]
    fn channel_boundary_between_words() {
        let low_top = 1u64 << 63;
        let high_bottom = 1u64;

        assert_eq!(channel_bit(low_top, 0, 63), Some(true));
        assert_eq!(channel_bit(0, high_bottom, 63), Some(false));
        assert_eq!(channel_bit(0, high_bottom, 64), Some(true));
        assert_eq!(channel_bit(low_top, 0, 64), Some(false));
    }

    #[test]
    fn no_index_reads_both_words() {
        for index in 0..CHANNEL_COUNT {
            let only_low = channel_bit(u64::MAX, 0, index).unwrap();
            let only_high = channel_bit(0, u64::MAX, index).unwrap();
            assert_ne!(only_low, only_high, "index {index}");
            assert_eq!(only_low, index < 64);
        }
        assert_eq!(channel_bit(u64::MAX, u64::MAX, CHANNEL_COUNT), None);
    }

    #[test]
    fn every_single_bit_maps_to_exactly_one_channel() {
        for index in 0..CHANNEL_COUNT {
            let map = if index < 64 {
                ChannelMap::new(1 << index, 0)
            } else {
                ChannelMap::new(0, 1 << (index - 64))
            };
            assert_eq!(map.hits().collect::<Vec<_>>(), vec![index]);
            assert_eq!(map.hit_count(), 1);
        }
    }

    #[test]
    fn channel_map_array_and_serialization() {
        let map = ChannelMap::new(0b101, 1 << 63);
        let bits = map.to_array();
        assert!(bits[0] && !bits[1] && bits[2] && bits[127]);
        assert_eq!(bits.iter().filter(|&&b| b).count(), 3);

        let value = serde_json::to_value(map).unwrap();
        assert_eq!(value["low"], "0000000000000005");
        assert_eq!(value["high"], "8000000000000000");
        assert_eq!(value["hits"], serde_json::json!([0, 2, 127]));
        assert!(ChannelMap::default().is_empty());
    }
}
