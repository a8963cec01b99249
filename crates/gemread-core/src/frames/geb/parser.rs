use std::fmt;
use std::io::BufRead;

use serde::Serialize;
use tracing::{debug, warn};

use super::layout;
use crate::frames::common::reader::FieldReader;
use crate::frames::error::{DecodeError, FrameKind};
use crate::frames::vfat::{VfatFrame, VfatVariant, decode_vfat};
use crate::source::TokenReader;

/// Decoded GEB header word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GebHeader {
    pub raw: u64,
    pub zero_suppress: u32,
    pub chamber_id: u16,
    pub vfat_count: u32,
}

impl GebHeader {
    pub fn from_word(raw: u64) -> Self {
        Self {
            raw,
            zero_suppress: layout::HEADER_ZERO_SUPPRESS.extract(raw) as u32,
            chamber_id: layout::HEADER_CHAMBER_ID.extract(raw) as u16,
            vfat_count: layout::HEADER_VFAT_COUNT.extract(raw) as u32,
        }
    }
}

/// Decoded GEB trailer word. Diagnostic only; not checked against content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GebTrailer {
    pub raw: u64,
    pub crc: u16,
    pub word_count: u16,
    pub status: u16,
}

impl GebTrailer {
    pub fn from_word(raw: u64) -> Self {
        Self {
            raw,
            crc: layout::TRAILER_CRC.extract(raw) as u16,
            word_count: layout::TRAILER_WORD_COUNT.extract(raw) as u16,
            status: layout::TRAILER_STATUS.extract(raw) as u16,
        }
    }
}

/// One board sub-frame: header, `vfat_count` chip sub-frames, trailer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GebFrame {
    pub header: GebHeader,
    pub vfats: Vec<VfatFrame>,
    pub trailer: GebTrailer,
}

impl GebFrame {
    pub fn control_mismatches(&self) -> usize {
        self.vfats.iter().filter(|vfat| vfat.control_mismatch).count()
    }
}

impl fmt::Display for GebFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{:016x} ChamID 0x{:03x} sumVFAT {}",
            self.header.raw, self.header.chamber_id, self.header.vfat_count
        )?;
        for (index, vfat) in self.vfats.iter().enumerate() {
            writeln!(f, "VFAT {index}")?;
            writeln!(f, "{vfat}")?;
        }
        write!(
            f,
            "GEB trailer: OHcrc 0x{:x} OHwCount 0x{:x} ChamStatus 0x{:x}",
            self.trailer.crc, self.trailer.word_count, self.trailer.status
        )
    }
}

/// Chip frames reserved up front; longer boards grow the vector as they decode.
const PREALLOCATED_VFATS: u32 = 64;

/// Decode one GEB frame: header, chip sub-frames, trailer.
///
/// The chip count comes from the header and is untrusted; counts above
/// `max_vfats` are rejected before any chip sub-frame is read.
///
/// # Errors
/// `UnreasonableCount` for an oversized count, `TruncatedFrame` if the header,
/// a chip sub-frame or the trailer is cut short, plus the token-level errors.
///
/// # Examples
/// ```
/// use gemread_core::TokenReader;
/// use gemread_core::frames::decode_geb;
///
/// let input = "0000001230000001  a001 c012 e0ab 0 0 0  1111222233330000";
/// let mut tokens = TokenReader::new(input.as_bytes());
/// let geb = decode_geb(&mut tokens, 24)?;
/// assert_eq!(geb.header.chamber_id, 0x123);
/// assert_eq!(geb.vfats.len(), 1);
/// assert_eq!(geb.trailer.status, 0x3333);
/// # Ok::<(), gemread_core::DecodeError>(())
/// ```
pub fn decode_geb<R: BufRead>(
    tokens: &mut TokenReader<R>,
    max_vfats: u32,
) -> Result<GebFrame, DecodeError> {
    let mut fields = FieldReader::new(tokens, FrameKind::Geb);
    let header = GebHeader::from_word(fields.hex::<u64>("header")?);

    if header.vfat_count > max_vfats {
        warn!(
            chamber_id = header.chamber_id,
            count = header.vfat_count,
            max = max_vfats,
            "GEB header announces too many VFAT frames"
        );
        return Err(DecodeError::UnreasonableCount {
            frame: FrameKind::Geb,
            count: header.vfat_count.into(),
            max: max_vfats.into(),
        });
    }

    let mut vfats = Vec::with_capacity(header.vfat_count.min(PREALLOCATED_VFATS) as usize);
    for _ in 0..header.vfat_count {
        vfats.push(decode_vfat(fields.tokens(), VfatVariant::Readout)?);
    }

    let trailer = GebTrailer::from_word(fields.hex::<u64>("trailer")?);
    debug!(
        chamber_id = header.chamber_id,
        vfats = vfats.len(),
        status = trailer.status,
        "Decoded GEB frame"
    );

    Ok(GebFrame {
        header,
        vfats,
        trailer,
    })
}

#[cfg(test)]
mod tests {
    use super::{GebHeader, GebTrailer, decode_geb};
    use crate::frames::common::bitfield::assert_layout;
    use crate::frames::error::{DecodeError, FrameKind};
    use crate::frames::geb::layout;
    use crate::source::TokenReader;

    const VFAT: &str = "a001 c012 e0ab 1 8000000000000000 5a5a";

    #[test]
    fn layout_tables_are_well_formed() {
        assert_layout(layout::HEADER_FIELDS, layout::WORD_BITS);
        assert_layout(layout::TRAILER_FIELDS, layout::WORD_BITS);
        assert_eq!(layout::HEADER_ZERO_SUPPRESS.width(), 24);
        assert_eq!(layout::HEADER_CHAMBER_ID.width(), 12);
        assert_eq!(layout::HEADER_VFAT_COUNT.width(), 28);
        assert_eq!(layout::TRAILER_CRC.width(), 16);
        assert_eq!(layout::TRAILER_WORD_COUNT.width(), 16);
        assert_eq!(layout::TRAILER_STATUS.width(), 16);
    }

    #[test]
    fn header_fields_extract_from_bit_positions() {
        let header = GebHeader::from_word(0xabcdef12_3456_7890);
        assert_eq!(header.zero_suppress, 0xabcdef);
        assert_eq!(header.chamber_id, 0x123);
        assert_eq!(header.vfat_count, 0x4567890);
    }

    #[test]
    fn trailer_fields_ignore_reserved_bits() {
        let trailer = GebTrailer::from_word(0x1111_2222_3333_ffff);
        assert_eq!(trailer.crc, 0x1111);
        assert_eq!(trailer.word_count, 0x2222);
        assert_eq!(trailer.status, 0x3333);
    }

    #[test]
    fn decodes_two_vfats() {
        let header = layout::HEADER_CHAMBER_ID.pack(0x7) | layout::HEADER_VFAT_COUNT.pack(2);
        let input = format!("{header:x} {VFAT} {VFAT} 0");
        let mut tokens = TokenReader::new(input.as_bytes());
        let geb = decode_geb(&mut tokens, 24).unwrap();

        assert_eq!(geb.header.chamber_id, 0x7);
        assert_eq!(geb.vfats.len(), 2);
        assert_eq!(geb.control_mismatches(), 0);
        assert!(tokens.at_end().unwrap());
    }

    #[test]
    fn zero_vfats_reads_header_then_trailer() {
        let mut tokens = TokenReader::new("0 ffff000000000000".as_bytes());
        let geb = decode_geb(&mut tokens, 24).unwrap();
        assert!(geb.vfats.is_empty());
        assert_eq!(geb.trailer.crc, 0xffff);
    }

    #[test]
    fn near_maximum_count_is_rejected_before_reading() {
        let header = layout::HEADER_VFAT_COUNT.pack(0xfff_ffff);
        let input = format!("{header:x} {VFAT}");
        let mut tokens = TokenReader::new(input.as_bytes());
        let err = decode_geb(&mut tokens, 512).unwrap_err();

        assert!(matches!(
            err,
            DecodeError::UnreasonableCount {
                frame: FrameKind::Geb,
                count: 0xfff_ffff,
                max: 512
            }
        ));
        assert_eq!(tokens.tokens_read(), 1);
    }

    #[test]
    fn raised_limit_with_huge_count_truncates_without_reserving() {
        let header = layout::HEADER_VFAT_COUNT.pack(0xfff_ffff);
        let input = format!("{header:x} {VFAT}");
        let mut tokens = TokenReader::new(input.as_bytes());
        let err = decode_geb(&mut tokens, u32::MAX).unwrap_err();

        assert!(matches!(
            err,
            DecodeError::TruncatedFrame {
                frame: FrameKind::Vfat,
                field: "BC"
            }
        ));
        assert_eq!(tokens.tokens_read(), 7);
    }

    #[test]
    fn missing_vfat_tokens_truncate() {
        let header = layout::HEADER_VFAT_COUNT.pack(1);
        let input = format!("{header:x}");
        let mut tokens = TokenReader::new(input.as_bytes());
        let err = decode_geb(&mut tokens, 24).unwrap_err();
        assert!(matches!(
            err,
            DecodeError::TruncatedFrame {
                frame: FrameKind::Vfat,
                field: "BC"
            }
        ));
    }

    #[test]
    fn missing_trailer_truncates() {
        let header = layout::HEADER_VFAT_COUNT.pack(1);
        let input = format!("{header:x} {VFAT}");
        let mut tokens = TokenReader::new(input.as_bytes());
        let err = decode_geb(&mut tokens, 24).unwrap_err();
        assert!(matches!(
            err,
            DecodeError::TruncatedFrame {
                frame: FrameKind::Geb,
                field: "trailer"
            }
        ));
    }
}
