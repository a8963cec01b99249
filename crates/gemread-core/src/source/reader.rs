use std::io::{self, BufRead};

use super::error::{TokenError, TokenKind};

/// Longest token accepted before the read is rejected as malformed.
///
/// A 64-bit word with a `0x` prefix needs 18 bytes; floats in scan files are
/// short. Anything longer is garbage and is not buffered further.
pub const MAX_TOKEN_LEN: usize = 64;

const MAX_REPORTED_TOKEN: usize = 24;

/// Pulls whitespace-delimited tokens from a buffered text stream.
///
/// Every `next_*` call consumes exactly one token. There is no pushback: the
/// frame decoders read fields strictly in wire order.
///
/// # Examples
/// ```
/// use gemread_core::TokenReader;
///
/// let mut tokens = TokenReader::new("a00f 0x1c2 -3 0.25\n".as_bytes());
/// assert_eq!(tokens.next_hex::<u16>()?, 0xa00f);
/// assert_eq!(tokens.next_hex::<u64>()?, 0x1c2);
/// assert_eq!(tokens.next_int()?, -3);
/// assert_eq!(tokens.next_float()?, 0.25);
/// assert!(tokens.at_end()?);
/// # Ok::<(), gemread_core::TokenError>(())
/// ```
pub struct TokenReader<R> {
    inner: R,
    token: Vec<u8>,
    fault: Option<io::ErrorKind>,
    tokens_read: u64,
}

impl<R: BufRead> TokenReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            token: Vec::with_capacity(MAX_TOKEN_LEN),
            fault: None,
            tokens_read: 0,
        }
    }

    /// Read one hexadecimal token into an unsigned integer of type `T`.
    ///
    /// An optional `0x`/`0X` prefix is accepted. Values that do not fit `T`
    /// are rejected rather than truncated.
    pub fn next_hex<T>(&mut self) -> Result<T, TokenError>
    where
        T: TryFrom<u64>,
    {
        let expected = TokenKind::Hex {
            bits: (std::mem::size_of::<T>() * 8) as u32,
        };
        let token = self.read_token(expected)?;
        let digits = token
            .strip_prefix("0x")
            .or_else(|| token.strip_prefix("0X"))
            .unwrap_or(token);
        let parsed = if digits.starts_with('+') {
            None
        } else {
            u64::from_str_radix(digits, 16).ok()
        };
        parsed
            .and_then(|value| T::try_from(value).ok())
            .ok_or_else(|| malformed(token, expected))
    }

    /// Read one signed decimal integer token.
    pub fn next_int(&mut self) -> Result<i64, TokenError> {
        let token = self.read_token(TokenKind::Int)?;
        token
            .parse::<i64>()
            .map_err(|_| malformed(token, TokenKind::Int))
    }

    /// Read one decimal floating point token.
    pub fn next_float(&mut self) -> Result<f64, TokenError> {
        let token = self.read_token(TokenKind::Float)?;
        token
            .parse::<f64>()
            .map_err(|_| malformed(token, TokenKind::Float))
    }

    /// Return `true` when only whitespace remains in the stream.
    ///
    /// Skips whitespace but never consumes a token.
    pub fn at_end(&mut self) -> Result<bool, TokenError> {
        self.check_health()?;
        Ok(!self.skip_whitespace()?)
    }

    /// Return `false` once an I/O error has been observed.
    pub fn is_healthy(&self) -> bool {
        self.fault.is_none()
    }

    /// Number of tokens consumed so far.
    pub fn tokens_read(&self) -> u64 {
        self.tokens_read
    }

    pub fn into_inner(self) -> R {
        self.inner
    }

    fn check_health(&self) -> Result<(), TokenError> {
        match self.fault {
            None => Ok(()),
            Some(kind) => Err(TokenError::Io(io::Error::new(
                kind,
                "token stream previously faulted",
            ))),
        }
    }

    fn skip_whitespace(&mut self) -> Result<bool, TokenError> {
        loop {
            let buf = match fill(&mut self.inner) {
                Ok(buf) => buf,
                Err(err) => {
                    self.fault = Some(err.kind());
                    return Err(TokenError::Io(err));
                }
            };
            if buf.is_empty() {
                return Ok(false);
            }
            let skip = buf.iter().take_while(|b| b.is_ascii_whitespace()).count();
            let more = skip < buf.len();
            self.inner.consume(skip);
            if more {
                return Ok(true);
            }
        }
    }

    fn read_token(&mut self, expected: TokenKind) -> Result<&str, TokenError> {
        self.check_health()?;
        if !self.skip_whitespace()? {
            return Err(TokenError::EndOfStream);
        }

        self.token.clear();
        let mut overlong = false;
        loop {
            let buf = match fill(&mut self.inner) {
                Ok(buf) => buf,
                Err(err) => {
                    self.fault = Some(err.kind());
                    return Err(TokenError::Io(err));
                }
            };
            if buf.is_empty() {
                break;
            }
            let len = buf.iter().take_while(|b| !b.is_ascii_whitespace()).count();
            let done = len < buf.len();
            let room = MAX_TOKEN_LEN - self.token.len();
            if len > room {
                overlong = true;
            }
            // The whole token is consumed even when only a prefix is kept.
            self.token.extend_from_slice(&buf[..len.min(room)]);
            self.inner.consume(len);
            if done {
                break;
            }
        }

        if overlong {
            self.tokens_read += 1;
            return Err(malformed(&String::from_utf8_lossy(&self.token), expected));
        }
        self.tokens_read += 1;
        match std::str::from_utf8(&self.token) {
            Ok(token) => Ok(token),
            Err(_) => Err(malformed(&String::from_utf8_lossy(&self.token), expected)),
        }
    }
}

fn fill<R: BufRead>(inner: &mut R) -> io::Result<&[u8]> {
    loop {
        match inner.fill_buf() {
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(err),
            Ok(_) => break,
        }
    }
    inner.fill_buf()
}

fn malformed(token: &str, expected: TokenKind) -> TokenError {
    let mut shown: String = token.chars().take(MAX_REPORTED_TOKEN).collect();
    if token.chars().count() > MAX_REPORTED_TOKEN {
        shown.push_str("...");
    }
    TokenError::Malformed {
        token: shown,
        expected,
    }
}

#[cfg(test)]
mod tests {
    use std::io::{self, BufRead, BufReader, Read};

    use super::{MAX_TOKEN_LEN, TokenReader};
    use crate::source::error::{TokenError, TokenKind};

    #[test]
    fn reads_hex_with_and_without_prefix() {
        let mut tokens = TokenReader::new("ffff 0XAbC 0x0".as_bytes());
        assert_eq!(tokens.next_hex::<u16>().unwrap(), 0xffff);
        assert_eq!(tokens.next_hex::<u16>().unwrap(), 0x0abc);
        assert_eq!(tokens.next_hex::<u64>().unwrap(), 0);
        assert_eq!(tokens.tokens_read(), 3);
    }

    #[test]
    fn hex_wider_than_field_is_malformed() {
        let mut tokens = TokenReader::new("1ffff".as_bytes());
        let err = tokens.next_hex::<u16>().unwrap_err();
        assert!(matches!(
            err,
            TokenError::Malformed {
                expected: TokenKind::Hex { bits: 16 },
                ..
            }
        ));
    }

    #[test]
    fn full_64_bit_word_parses() {
        let mut tokens = TokenReader::new("ffffffffffffffff".as_bytes());
        assert_eq!(tokens.next_hex::<u64>().unwrap(), u64::MAX);
    }

    #[test]
    fn rejects_non_hex_and_bare_prefix() {
        let mut tokens = TokenReader::new("xyz 0x +1f".as_bytes());
        assert!(matches!(
            tokens.next_hex::<u32>(),
            Err(TokenError::Malformed { .. })
        ));
        assert!(matches!(
            tokens.next_hex::<u32>(),
            Err(TokenError::Malformed { .. })
        ));
        assert!(matches!(
            tokens.next_hex::<u32>(),
            Err(TokenError::Malformed { .. })
        ));
        assert!(tokens.is_healthy());
    }

    #[test]
    fn reads_decimal_int_and_float() {
        let mut tokens = TokenReader::new("  -12\n\t40 1.5e-1 7".as_bytes());
        assert_eq!(tokens.next_int().unwrap(), -12);
        assert_eq!(tokens.next_int().unwrap(), 40);
        assert!((tokens.next_float().unwrap() - 0.15).abs() < 1e-12);
        assert_eq!(tokens.next_float().unwrap(), 7.0);
    }

    #[test]
    fn int_rejects_hex_digits() {
        let mut tokens = TokenReader::new("1a".as_bytes());
        let err = tokens.next_int().unwrap_err();
        assert!(err.to_string().contains("decimal integer"));
    }

    #[test]
    fn end_of_stream_is_distinct_from_malformed() {
        let mut tokens = TokenReader::new("   \n".as_bytes());
        assert!(tokens.at_end().unwrap());
        assert!(matches!(
            tokens.next_hex::<u16>(),
            Err(TokenError::EndOfStream)
        ));
        assert!(tokens.is_healthy());
    }

    #[test]
    fn at_end_does_not_consume_tokens() {
        let mut tokens = TokenReader::new("\n\n abc".as_bytes());
        assert!(!tokens.at_end().unwrap());
        assert!(!tokens.at_end().unwrap());
        assert_eq!(tokens.next_hex::<u16>().unwrap(), 0xabc);
        assert!(tokens.at_end().unwrap());
    }

    #[test]
    fn tokens_spanning_buffer_refills_are_joined() {
        let reader = BufReader::with_capacity(2, "abcdef 12".as_bytes());
        let mut tokens = TokenReader::new(reader);
        assert_eq!(tokens.next_hex::<u32>().unwrap(), 0xabcdef);
        assert_eq!(tokens.next_hex::<u8>().unwrap(), 0x12);
    }

    #[test]
    fn overlong_token_is_rejected() {
        let long = "1".repeat(MAX_TOKEN_LEN + 10);
        let input = format!("{long} 2");
        let mut tokens = TokenReader::new(input.as_bytes());
        let err = tokens.next_hex::<u64>().unwrap_err();
        assert!(matches!(err, TokenError::Malformed { .. }));
        assert_eq!(tokens.next_hex::<u8>().unwrap(), 2);
    }

    #[test]
    fn overlong_token_across_refills_is_skipped_whole() {
        let long = "f".repeat(MAX_TOKEN_LEN * 2);
        let input = format!("{long} 3");
        let reader = BufReader::with_capacity(16, input.as_bytes());
        let mut tokens = TokenReader::new(reader);
        match tokens.next_hex::<u64>() {
            Err(TokenError::Malformed { token, .. }) => assert!(token.ends_with("...")),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(tokens.next_hex::<u8>().unwrap(), 3);
        assert_eq!(tokens.tokens_read(), 2);
    }

    struct FailingReader {
        served: bool,
    }

    impl Read for FailingReader {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.served {
                return Err(io::Error::other("device gone"));
            }
            self.served = true;
            let data = b"a000 ";
            buf[..data.len()].copy_from_slice(data);
            Ok(data.len())
        }
    }

    #[test]
    fn io_error_marks_reader_unhealthy() {
        let reader = BufReader::new(FailingReader { served: false });
        let mut tokens = TokenReader::new(reader);
        assert_eq!(tokens.next_hex::<u16>().unwrap(), 0xa000);
        assert!(matches!(tokens.next_hex::<u16>(), Err(TokenError::Io(_))));
        assert!(!tokens.is_healthy());
        assert!(matches!(tokens.at_end(), Err(TokenError::Io(_))));
    }

    #[test]
    fn buffered_reader_trait_object_is_accepted() {
        let boxed: Box<dyn BufRead> = Box::new("1 2".as_bytes());
        let mut tokens = TokenReader::new(boxed);
        assert_eq!(tokens.next_int().unwrap(), 1);
        assert_eq!(tokens.next_int().unwrap(), 2);
    }
}
