use std::fmt;
use std::io::BufRead;

use serde::Serialize;
use tracing::{debug, warn};

use super::layout;
use crate::frames::common::reader::FieldReader;
use crate::frames::error::{DecodeError, FrameKind};
use crate::frames::geb::{GebFrame, decode_geb};
use crate::source::TokenReader;

/// The three AMC header words and their fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AmcHeader {
    pub raw: [u64; 3],
    pub amc_number: u8,
    pub lv1_id: u32,
    pub bx_id: u16,
    pub data_length: u32,
    pub user: u32,
    pub orbit_number: u16,
    pub board_id: u16,
    pub dav_list: u32,
    pub buffer_status: u32,
    pub dav_count: u8,
    pub format_version: u8,
    pub board_status: u8,
}

impl AmcHeader {
    pub fn from_words(h1: u64, h2: u64, h3: u64) -> Self {
        Self {
            raw: [h1, h2, h3],
            amc_number: layout::H1_AMC_NUMBER.extract(h1) as u8,
            lv1_id: layout::H1_LV1_ID.extract(h1) as u32,
            bx_id: layout::H1_BX_ID.extract(h1) as u16,
            data_length: layout::H1_DATA_LENGTH.extract(h1) as u32,
            user: layout::H2_USER.extract(h2) as u32,
            orbit_number: layout::H2_ORBIT_NUMBER.extract(h2) as u16,
            board_id: layout::H2_BOARD_ID.extract(h2) as u16,
            dav_list: layout::H3_DAV_LIST.extract(h3) as u32,
            buffer_status: layout::H3_BUFFER_STATUS.extract(h3) as u32,
            dav_count: layout::H3_DAV_COUNT.extract(h3) as u8,
            format_version: layout::H3_FORMAT_VERSION.extract(h3) as u8,
            board_status: layout::H3_BOARD_STATUS.extract(h3) as u8,
        }
    }

    fn control_ok(&self) -> bool {
        layout::H1_CONTROL.extract(self.raw[0]) == layout::CONTROL_EXPECTED
    }
}

/// The two AMC trailer words, in wire order (trailer 2 then trailer 1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AmcTrailer {
    pub raw: [u64; 2],
    pub event_status: u32,
    pub geb_error_flags: u32,
    pub crc: u32,
    pub lv1_id: u8,
    pub data_length: u32,
}

impl AmcTrailer {
    pub fn from_words(t2: u64, t1: u64) -> Self {
        Self {
            raw: [t2, t1],
            event_status: layout::T2_EVENT_STATUS.extract(t2) as u32,
            geb_error_flags: layout::T2_GEB_ERROR_FLAGS.extract(t2) as u32,
            crc: layout::T1_CRC.extract(t1) as u32,
            lv1_id: layout::T1_LV1_ID.extract(t1) as u8,
            data_length: layout::T1_DATA_LENGTH.extract(t1) as u32,
        }
    }

    fn control_ok(&self) -> bool {
        layout::T1_CONTROL.extract(self.raw[1]) == layout::CONTROL_EXPECTED
    }
}

/// One top-level readout frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GemFrame {
    pub header: AmcHeader,
    pub gebs: Vec<GebFrame>,
    pub trailer: AmcTrailer,
    /// Set when a `0000` marker nibble in header 1 or trailer 1 is non-zero.
    pub control_mismatch: bool,
}

impl fmt::Display for GemFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "AMC {} LV1ID 0x{:x} BXID 0x{:x} BoardID 0x{:x} DAVCount {}",
            self.header.amc_number,
            self.header.lv1_id,
            self.header.bx_id,
            self.header.board_id,
            self.header.dav_count
        )?;
        for geb in &self.gebs {
            writeln!(f, "{geb}")?;
        }
        write!(
            f,
            "AMC trailer: EventStat 0x{:x} GEBerrFlag 0x{:x} crc 0x{:08x}",
            self.trailer.event_status, self.trailer.geb_error_flags, self.trailer.crc
        )?;
        if self.control_mismatch {
            write!(f, "  (control bit mismatch)")?;
        }
        Ok(())
    }
}

/// Decode one AMC frame: three header words, `DAVCount` GEB frames, trailer
/// 2 and trailer 1.
///
/// # Errors
/// `UnreasonableCount` when `DAVCount` exceeds `max_gebs`; any GEB error is
/// propagated unchanged.
pub fn decode_amc<R: BufRead>(
    tokens: &mut TokenReader<R>,
    max_gebs: u32,
    max_vfats: u32,
) -> Result<GemFrame, DecodeError> {
    let mut fields = FieldReader::new(tokens, FrameKind::Amc);
    let h1 = fields.hex::<u64>("header1")?;
    let h2 = fields.hex::<u64>("header2")?;
    let h3 = fields.hex::<u64>("header3")?;
    let header = AmcHeader::from_words(h1, h2, h3);

    if u32::from(header.dav_count) > max_gebs {
        warn!(
            lv1_id = header.lv1_id,
            count = header.dav_count,
            max = max_gebs,
            "AMC header announces too many GEB frames"
        );
        return Err(DecodeError::UnreasonableCount {
            frame: FrameKind::Amc,
            count: header.dav_count.into(),
            max: max_gebs.into(),
        });
    }

    let mut gebs = Vec::with_capacity(header.dav_count.into());
    for _ in 0..header.dav_count {
        gebs.push(decode_geb(fields.tokens(), max_vfats)?);
    }

    let t2 = fields.hex::<u64>("trailer2")?;
    let t1 = fields.hex::<u64>("trailer1")?;
    let trailer = AmcTrailer::from_words(t2, t1);

    let control_mismatch = !header.control_ok() || !trailer.control_ok();
    if control_mismatch {
        warn!(
            lv1_id = header.lv1_id,
            board_id = header.board_id,
            "AMC control bit mismatch"
        );
    }
    debug!(
        lv1_id = header.lv1_id,
        gebs = gebs.len(),
        "Decoded AMC frame"
    );

    Ok(GemFrame {
        header,
        gebs,
        trailer,
        control_mismatch,
    })
}
