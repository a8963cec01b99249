use crate::frames::common::bitfield::Field;

// Header 1: AmcNo:4 0000:4 LV1ID:24 BXID:12 DataLgth:20
pub const H1_AMC_NUMBER: Field = Field::new(0xf000_0000_0000_0000, 60);
pub const H1_CONTROL: Field = Field::new(0x0f00_0000_0000_0000, 56);
pub const H1_LV1_ID: Field = Field::new(0x00ff_ffff_0000_0000, 32);
pub const H1_BX_ID: Field = Field::new(0x0000_0000_fff0_0000, 20);
pub const H1_DATA_LENGTH: Field = Field::new(0x0000_0000_000f_ffff, 0);

// Header 2: User:32 OrN:16 BoardID:16
pub const H2_USER: Field = Field::new(0xffff_ffff_0000_0000, 32);
pub const H2_ORBIT_NUMBER: Field = Field::new(0x0000_0000_ffff_0000, 16);
pub const H2_BOARD_ID: Field = Field::new(0x0000_0000_0000_ffff, 0);

// Header 3: DAVList:24 BufStat:24 DAVCount:5 FormatVer:3 MP7BordStat:8
pub const H3_DAV_LIST: Field = Field::new(0xffff_ff00_0000_0000, 40);
pub const H3_BUFFER_STATUS: Field = Field::new(0x0000_00ff_ffff_0000, 16);
pub const H3_DAV_COUNT: Field = Field::new(0x0000_0000_0000_f800, 11);
pub const H3_FORMAT_VERSION: Field = Field::new(0x0000_0000_0000_0700, 8);
pub const H3_BOARD_STATUS: Field = Field::new(0x0000_0000_0000_00ff, 0);

// Trailer 2 (read first): EventStat:32 GEBerrFlag:24, low byte reserved
pub const T2_EVENT_STATUS: Field = Field::new(0xffff_ffff_0000_0000, 32);
pub const T2_GEB_ERROR_FLAGS: Field = Field::new(0x0000_0000_ffff_ff00, 8);

// Trailer 1: crc:32 LV1IDT:8 0000:4 DataLgth:20
pub const T1_CRC: Field = Field::new(0xffff_ffff_0000_0000, 32);
pub const T1_LV1_ID: Field = Field::new(0x0000_0000_ff00_0000, 24);
pub const T1_CONTROL: Field = Field::new(0x0000_0000_00f0_0000, 20);
pub const T1_DATA_LENGTH: Field = Field::new(0x0000_0000_000f_ffff, 0);

pub const CONTROL_EXPECTED: u64 = 0b0000;

pub const H1_FIELDS: &[Field] = &[
    H1_AMC_NUMBER,
    H1_CONTROL,
    H1_LV1_ID,
    H1_BX_ID,
    H1_DATA_LENGTH,
];
pub const H2_FIELDS: &[Field] = &[H2_USER, H2_ORBIT_NUMBER, H2_BOARD_ID];
pub const H3_FIELDS: &[Field] = &[
    H3_DAV_LIST,
    H3_BUFFER_STATUS,
    H3_DAV_COUNT,
    H3_FORMAT_VERSION,
    H3_BOARD_STATUS,
];
pub const T2_FIELDS: &[Field] = &[T2_EVENT_STATUS, T2_GEB_ERROR_FLAGS];
pub const T1_FIELDS: &[Field] = &[T1_CRC, T1_LV1_ID, T1_CONTROL, T1_DATA_LENGTH];

pub const WORD_BITS: u32 = 64;
