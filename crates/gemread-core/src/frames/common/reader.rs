use std::io::BufRead;

use crate::frames::error::{DecodeError, FrameKind};
use crate::source::{TokenError, TokenReader};

/// Reads named fields of one frame and classifies token failures.
///
/// Once a frame has started, running out of tokens is a truncation, not a
/// clean end of stream.
pub(crate) struct FieldReader<'a, R> {
    tokens: &'a mut TokenReader<R>,
    frame: FrameKind,
}

impl<'a, R: BufRead> FieldReader<'a, R> {
    pub(crate) fn new(tokens: &'a mut TokenReader<R>, frame: FrameKind) -> Self {
        Self { tokens, frame }
    }

    pub(crate) fn hex<T: TryFrom<u64>>(&mut self, field: &'static str) -> Result<T, DecodeError> {
        let value = self.tokens.next_hex::<T>();
        self.classify(value, field)
    }

    pub(crate) fn int(&mut self, field: &'static str) -> Result<i64, DecodeError> {
        let value = self.tokens.next_int();
        self.classify(value, field)
    }

    pub(crate) fn float(&mut self, field: &'static str) -> Result<f64, DecodeError> {
        let value = self.tokens.next_float();
        self.classify(value, field)
    }

    /// Hand the token stream to a nested frame decoder.
    pub(crate) fn tokens(&mut self) -> &mut TokenReader<R> {
        &mut *self.tokens
    }

    fn classify<T>(
        &self,
        value: Result<T, TokenError>,
        field: &'static str,
    ) -> Result<T, DecodeError> {
        value.map_err(|err| match err {
            TokenError::EndOfStream => DecodeError::TruncatedFrame {
                frame: self.frame,
                field,
            },
            TokenError::Malformed { token, expected } => DecodeError::MalformedToken {
                frame: self.frame,
                field,
                token,
                expected,
            },
            TokenError::Io(err) => DecodeError::StreamFault(err),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::FieldReader;
    use crate::frames::error::{DecodeError, FrameKind};
    use crate::source::TokenReader;

    #[test]
    fn end_of_stream_inside_frame_is_truncation() {
        let mut tokens = TokenReader::new("a000".as_bytes());
        let mut fields = FieldReader::new(&mut tokens, FrameKind::Vfat);
        assert_eq!(fields.hex::<u16>("BC").unwrap(), 0xa000);
        let err = fields.hex::<u16>("EC").unwrap_err();
        assert!(matches!(
            err,
            DecodeError::TruncatedFrame {
                frame: FrameKind::Vfat,
                field: "EC"
            }
        ));
    }

    #[test]
    fn parse_failure_names_field() {
        let mut tokens = TokenReader::new("1.5".as_bytes());
        let mut fields = FieldReader::new(&mut tokens, FrameKind::ScanHeader);
        let err = fields.int("minTh").unwrap_err();
        assert!(err.to_string().contains("minTh"));
        assert!(matches!(err, DecodeError::MalformedToken { .. }));
    }
}
