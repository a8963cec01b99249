//! Token-level access to the text stream.
//!
//! This module owns all stream I/O. Frame decoders pull typed tokens from a
//! `TokenReader` and never touch the underlying reader directly.

mod error;
mod reader;

pub use error::{TokenError, TokenKind};
pub use reader::{MAX_TOKEN_LEN, TokenReader};
