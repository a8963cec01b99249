pub mod bitfield;
pub(crate) mod reader;
