use std::fmt;

use thiserror::Error;

/// Kind of value a token was expected to parse as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Unsigned hexadecimal integer of the given bit width.
    Hex { bits: u32 },
    /// Signed decimal integer.
    Int,
    /// Decimal floating point number.
    Float,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Hex { bits } => write!(f, "{bits}-bit hex"),
            TokenKind::Int => write!(f, "decimal integer"),
            TokenKind::Float => write!(f, "float"),
        }
    }
}

/// Errors returned by token reads.
///
/// `EndOfStream` is a normal termination condition; callers decide whether it
/// is clean (between frames) or a truncation (inside a frame).
///
/// # Examples
/// ```
/// use gemread_core::{TokenError, TokenKind};
///
/// let err = TokenError::Malformed {
///     token: "zz".to_string(),
///     expected: TokenKind::Hex { bits: 16 },
/// };
/// assert!(err.to_string().contains("16-bit hex"));
/// ```
#[derive(Debug, Error)]
pub enum TokenError {
    #[error("end of stream")]
    EndOfStream,
    #[error("malformed token '{token}': expected {expected}")]
    Malformed { token: String, expected: TokenKind },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
