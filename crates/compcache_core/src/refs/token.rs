//! Metadata token kinds and token compression.
//!
//! A metadata token carries its table kind in the top byte and a row number in
//! the remaining 24 bits. Tokens are written with the kind bits stripped, since
//! the reader always knows which kind to expect at a given position.

use crate::err::{CodecError, CodecResult};

/// Bits of a token that identify its kind
pub const TOKEN_KIND_MASK: u32 = 0xff00_0000;

/// Metadata token kinds referenced by the cache
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum TokenKind {
    TypeDef = 0x0200_0000,
    FieldDef = 0x0400_0000,
    MethodDef = 0x0600_0000,
    ParamDef = 0x0800_0000,
    Property = 0x1700_0000,
}

impl TokenKind {
    /// The kind bits every token of this kind carries
    pub const fn tag(self) -> u32 {
        self as u32
    }

    /// Returns `true` if the token belongs to this kind.
    pub const fn matches(self, token: u32) -> bool {
        token & TOKEN_KIND_MASK == self.tag()
    }

    /// Strip the kind bits from a token.
    ///
    /// Fails if the token does not belong to this kind.
    pub fn compress(self, token: u32) -> CodecResult<u32> {
        match self.matches(token) {
            true => Ok(token & !TOKEN_KIND_MASK),
            false => Err(CodecError::TokenKindMismatch {
                token,
                expected: self,
            }),
        }
    }

    /// Restore a compressed row into a full token of this kind.
    pub fn expand(self, row: u64) -> CodecResult<u32> {
        match row <= u64::from(!TOKEN_KIND_MASK) {
            true => Ok(row as u32 | self.tag()),
            false => Err(CodecError::TokenOutOfRange { value: row }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compress_expand() {
        let row = TokenKind::TypeDef.compress(0x0200_0005).unwrap();
        assert_eq!(row, 5);
        assert_eq!(TokenKind::TypeDef.expand(row.into()).unwrap(), 0x0200_0005);

        let row = TokenKind::Property.compress(0x1700_abcd).unwrap();
        assert_eq!(TokenKind::Property.expand(row.into()).unwrap(), 0x1700_abcd);
    }

    #[test]
    fn test_kind_mismatch() {
        assert!(matches!(
            TokenKind::MethodDef.compress(0x0200_0001),
            Err(CodecError::TokenKindMismatch {
                token: 0x0200_0001,
                expected: TokenKind::MethodDef
            })
        ));
        assert!(TokenKind::FieldDef.compress(0).is_err());
    }

    #[test]
    fn test_expand_rejects_wide_rows() {
        assert!(TokenKind::TypeDef.expand(0x00ff_ffff).is_ok());
        assert!(matches!(
            TokenKind::TypeDef.expand(0x0100_0000),
            Err(CodecError::TokenOutOfRange { .. })
        ));
    }
}
