//! Error implementations

use std::fmt;

use serde::{de, ser};

pub type SerDeResult<T> = Result<T, Error>;

/// Custom error object for the compact format
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// Raised by a `Serialize` or `Deserialize` implementation
    Message(String),

    /// The input ended in the middle of a value
    UnexpectedEnd,

    /// Bytes were left over after the top-level value
    TrailingBytes(usize),

    /// The type prefix found is not the one the target type expects
    PrefixNotMatched { expected: u8, found: u8 },

    /// A collection was not closed where expected
    DelimiterNotFound(char),

    /// An invalid byte after a bool or option prefix
    InvalidMarker(u8),

    /// A compressed integer is malformed or too wide
    InvalidVarint,

    /// A string is not valid UTF-8
    InvalidUtf8,

    /// A code point is not a valid `char`
    InvalidChar(u64),

    /// Collections, options and enums are nested too deeply
    DepthLimitExceeded,

    /// The value cannot be read without knowing its type up front
    NotSelfDescribing(char),
}

impl std::error::Error for Error {}

impl ser::Error for Error {
    fn custom<T>(msg: T) -> Self
    where
        T: fmt::Display,
    {
        Self::Message(msg.to_string())
    }
}

impl de::Error for Error {
    fn custom<T>(msg: T) -> Self
    where
        T: fmt::Display,
    {
        Self::Message(msg.to_string())
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Message(msg) => write!(f, "{}", msg),
            Self::UnexpectedEnd => write!(f, "unexpected end of input"),
            Self::TrailingBytes(n) => write!(f, "{} trailing bytes after value", n),
            Self::PrefixNotMatched { expected, found } => write!(
                f,
                "expected prefix {:?}, found {:?}",
                *expected as char, *found as char
            ),
            Self::DelimiterNotFound(c) => write!(f, "expected delimiter {:?}", c),
            Self::InvalidMarker(b) => write!(f, "invalid marker byte {:#04x}", b),
            Self::InvalidVarint => write!(f, "malformed compressed integer"),
            Self::InvalidUtf8 => write!(f, "string is not valid utf-8"),
            Self::InvalidChar(c) => write!(f, "{:#x} is not a valid character", c),
            Self::DepthLimitExceeded => write!(f, "values are nested too deeply"),
            Self::NotSelfDescribing(prefix) => {
                write!(f, "values with prefix {:?} need a known target type", prefix)
            }
        }
    }
}
