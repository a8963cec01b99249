use crate::frames::common::bitfield::Field;

// Header: ZSFlag:24 ChamID:12 sumVFAT:28
pub const HEADER_ZERO_SUPPRESS: Field = Field::new(0xffff_ff00_0000_0000, 40);
pub const HEADER_CHAMBER_ID: Field = Field::new(0x0000_00ff_f000_0000, 28);
pub const HEADER_VFAT_COUNT: Field = Field::new(0x0000_0000_0fff_ffff, 0);

// Trailer: OHcrc:16 OHwCount:16 ChamStatus:16, low 16 bits reserved
pub const TRAILER_CRC: Field = Field::new(0xffff_0000_0000_0000, 48);
pub const TRAILER_WORD_COUNT: Field = Field::new(0x0000_ffff_0000_0000, 32);
pub const TRAILER_STATUS: Field = Field::new(0x0000_0000_ffff_0000, 16);

pub const HEADER_FIELDS: &[Field] = &[HEADER_ZERO_SUPPRESS, HEADER_CHAMBER_ID, HEADER_VFAT_COUNT];
pub const TRAILER_FIELDS: &[Field] = &[TRAILER_CRC, TRAILER_WORD_COUNT, TRAILER_STATUS];

pub const WORD_BITS: u32 = 64;
