use crate::frames::common::bitfield::Field;

// BC word: 1010:4 BC:12
pub const BC_CONTROL: Field = Field::new(0xf000, 12);
pub const BC_VALUE: Field = Field::new(0x0fff, 0);
pub const BC_CONTROL_EXPECTED: u64 = 0b1010;

// EC word: 1100:4 EC:8 Flags:4
pub const EC_CONTROL: Field = Field::new(0xf000, 12);
pub const EC_VALUE: Field = Field::new(0x0ff0, 4);
pub const EC_FLAGS: Field = Field::new(0x000f, 0);
pub const EC_CONTROL_EXPECTED: u64 = 0b1100;

// ChipID word: 1110:4 ChipID:12
pub const CHIP_ID_CONTROL: Field = Field::new(0xf000, 12);
pub const CHIP_ID_VALUE: Field = Field::new(0x0fff, 0);
pub const CHIP_ID_CONTROL_EXPECTED: u64 = 0b1110;

// bxNum word (scan variant): bxNum:6 in the high byte, SBit:6 in the low byte
pub const BX_NUM_EVENT: Field = Field::new(0x3f00, 8);
pub const BX_NUM_SBIT: Field = Field::new(0x003f, 0);

/// Field tables per 16-bit word, used to check the layout for overlaps.
pub const BC_FIELDS: &[Field] = &[BC_CONTROL, BC_VALUE];
pub const EC_FIELDS: &[Field] = &[EC_CONTROL, EC_VALUE, EC_FLAGS];
pub const CHIP_ID_FIELDS: &[Field] = &[CHIP_ID_CONTROL, CHIP_ID_VALUE];
pub const BX_NUM_FIELDS: &[Field] = &[BX_NUM_EVENT, BX_NUM_SBIT];

pub const WORD_BITS: u32 = 16;
