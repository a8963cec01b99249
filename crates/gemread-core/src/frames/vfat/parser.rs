use std::fmt;
use std::io::BufRead;

use serde::Serialize;
use tracing::{debug, warn};

use super::layout;
use crate::frames::common::bitfield::{ChannelMap, Field};
use crate::frames::common::reader::FieldReader;
use crate::frames::error::{DecodeError, FrameKind};
use crate::source::TokenReader;

/// Which VFAT wire layout to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VfatVariant {
    /// `BC EC ChipID low high CRC`, as nested in GEB frames.
    Readout,
    /// `BC EC bxExp bxNum ChipID low high delVT CRC`, as written by threshold
    /// scans.
    ThresholdScan,
}

/// Control-nibble carrying words of a VFAT frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlField {
    Bc,
    Ec,
    ChipId,
}

impl ControlField {
    const ALL: [ControlField; 3] = [ControlField::Bc, ControlField::Ec, ControlField::ChipId];

    fn layout(self) -> (Field, u64) {
        match self {
            ControlField::Bc => (layout::BC_CONTROL, layout::BC_CONTROL_EXPECTED),
            ControlField::Ec => (layout::EC_CONTROL, layout::EC_CONTROL_EXPECTED),
            ControlField::ChipId => (layout::CHIP_ID_CONTROL, layout::CHIP_ID_CONTROL_EXPECTED),
        }
    }
}

/// Bunch-crossing words present only in threshold-scan frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BxInfo {
    pub bx_exp: u32,
    pub bx_num: u16,
}

impl BxInfo {
    pub fn event_number(&self) -> u8 {
        layout::BX_NUM_EVENT.extract(self.bx_num.into()) as u8
    }

    pub fn sbit(&self) -> u8 {
        layout::BX_NUM_SBIT.extract(self.bx_num.into()) as u8
    }
}

/// One decoded chip sub-frame.
///
/// Raw 16-bit words are kept as read; sub-fields are extracted on demand
/// through the layout table. `control_mismatch` is set when any control
/// nibble differs from its expected constant; the frame is still complete.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VfatFrame {
    pub bc_word: u16,
    pub ec_word: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bx: Option<BxInfo>,
    pub chip_id_word: u16,
    pub channels: ChannelMap,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub del_vt: Option<f64>,
    /// Carried through unverified.
    pub crc: u16,
    pub control_mismatch: bool,
}

impl VfatFrame {
    /// 12-bit bunch crossing number.
    pub fn bc(&self) -> u16 {
        layout::BC_VALUE.extract(self.bc_word.into()) as u16
    }

    /// 8-bit event counter.
    pub fn ec(&self) -> u8 {
        layout::EC_VALUE.extract(self.ec_word.into()) as u8
    }

    /// 4-bit flag nibble of the EC word.
    pub fn flags(&self) -> u8 {
        layout::EC_FLAGS.extract(self.ec_word.into()) as u8
    }

    /// 12-bit chip identifier, reported as read (including sentinel values).
    pub fn chip_id(&self) -> u16 {
        layout::CHIP_ID_VALUE.extract(self.chip_id_word.into()) as u16
    }

    /// Control nibble as read from the given word.
    pub fn control_nibble(&self, field: ControlField) -> u8 {
        let (control, _) = field.layout();
        control.extract(self.word(field).into()) as u8
    }

    /// Control words whose nibble differs from the expected constant.
    pub fn mismatched_controls(&self) -> Vec<ControlField> {
        ControlField::ALL
            .into_iter()
            .filter(|&field| {
                let (_, expected) = field.layout();
                u64::from(self.control_nibble(field)) != expected
            })
            .collect()
    }

    fn word(&self, field: ControlField) -> u16 {
        match field {
            ControlField::Bc => self.bc_word,
            ControlField::Ec => self.ec_word,
            ControlField::ChipId => self.chip_id_word,
        }
    }
}

impl fmt::Display for VfatFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let nibble = |field| self.control_nibble(field);
        writeln!(f, "{:04b} BC     0x{:03x}", nibble(ControlField::Bc), self.bc())?;
        writeln!(f, "{:04b} EC     0x{:02x}", nibble(ControlField::Ec), self.ec())?;
        writeln!(f, "{:04b} Flags", self.flags())?;
        writeln!(
            f,
            "{:04b} ChipID 0x{:03x}",
            nibble(ControlField::ChipId),
            self.chip_id()
        )?;
        if let Some(bx) = &self.bx {
            writeln!(f, "     bxExp  0x{:04x}", bx.bx_exp)?;
            writeln!(f, "     bxNum  0x{:02x}", bx.event_number())?;
            writeln!(f, "     SBit   0x{:02x}", bx.sbit())?;
        }
        writeln!(f, " <127:64>:: 0x{:016x}", self.channels.high)?;
        writeln!(f, " <63:0>  :: 0x{:016x}", self.channels.low)?;
        if let Some(del_vt) = self.del_vt {
            writeln!(f, "     delVT  {del_vt}")?;
        }
        write!(f, "     crc    0x{:04x}", self.crc)?;
        if self.control_mismatch {
            write!(f, "  (control bit mismatch)")?;
        }
        Ok(())
    }
}

/// Decode one VFAT frame, reading fields strictly in wire order.
///
/// # Errors
/// `TruncatedFrame` if the stream ends mid-frame, `MalformedToken` if a field
/// does not parse, `StreamFault` on I/O failure.
///
/// # Examples
/// ```
/// use gemread_core::frames::{VfatVariant, decode_vfat};
/// use gemread_core::TokenReader;
///
/// let mut tokens = TokenReader::new("a001 c012 e0ab 1 8000000000000000 5a5a".as_bytes());
/// let frame = decode_vfat(&mut tokens, VfatVariant::Readout)?;
/// assert_eq!(frame.chip_id(), 0x0ab);
/// assert_eq!(frame.channels.hit(0), Some(true));
/// assert_eq!(frame.channels.hit(127), Some(true));
/// assert!(!frame.control_mismatch);
/// # Ok::<(), gemread_core::DecodeError>(())
/// ```
pub fn decode_vfat<R: BufRead>(
    tokens: &mut TokenReader<R>,
    variant: VfatVariant,
) -> Result<VfatFrame, DecodeError> {
    let mut fields = FieldReader::new(tokens, FrameKind::Vfat);
    let scan = variant == VfatVariant::ThresholdScan;

    let bc_word = fields.hex::<u16>("BC")?;
    let ec_word = fields.hex::<u16>("EC")?;
    let bx = if scan {
        let bx_exp = fields.hex::<u32>("bxExp")?;
        let bx_num = fields.hex::<u16>("bxNum")?;
        Some(BxInfo { bx_exp, bx_num })
    } else {
        None
    };
    let chip_id_word = fields.hex::<u16>("ChipID")?;
    let low = fields.hex::<u64>("lsData")?;
    let high = fields.hex::<u64>("msData")?;
    let del_vt = if scan {
        Some(fields.float("delVT")?)
    } else {
        None
    };
    let crc = fields.hex::<u16>("CRC")?;

    let mut frame = VfatFrame {
        bc_word,
        ec_word,
        bx,
        chip_id_word,
        channels: ChannelMap::new(low, high),
        del_vt,
        crc,
        control_mismatch: false,
    };

    let mismatched = frame.mismatched_controls();
    if !mismatched.is_empty() {
        frame.control_mismatch = true;
        warn!(
            chip_id = frame.chip_id(),
            controls = ?mismatched,
            "VFAT control bit mismatch"
        );
    }
    debug!(
        chip_id = frame.chip_id(),
        bc = frame.bc(),
        ec = frame.ec(),
        hits = frame.channels.hit_count(),
        "Decoded VFAT frame"
    );

    Ok(frame)
}
