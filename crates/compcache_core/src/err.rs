//! Error implementations

use std::{error, fmt, io};

use crate::refs::TokenKind;

/// Errors raised by collaborators are carried through unchanged in this form.
pub type BoxError = Box<dyn error::Error + Send + Sync + 'static>;

/// Result alias used throughout the codec
pub type CodecResult<T> = Result<T, CodecError>;

/// Custom error object for the cache codec.
///
/// Every variant is fatal for the stream that produced it. A context that returned
/// an error must be discarded; its interning table no longer matches the peer.
#[derive(Debug)]
pub enum CodecError {
    /// The underlying stream failed
    Io(io::Error),

    /// A compressed integer is wider than 64 bits
    VarintOverflow,

    /// A tag byte does not belong to the closed set expected at this position
    UnknownTag { tag: u8, context: &'static str },

    /// The kind bits of a metadata token do not match the kind being written
    TokenKindMismatch { token: u32, expected: TokenKind },

    /// A decoded token row does not fit below the kind bits
    TokenOutOfRange { value: u64 },

    /// A decoded or requested length exceeds the collection cap
    LengthLimitExceeded { len: u64, max: usize },

    /// Generic arguments or arrays are nested deeper than the decoder follows
    DepthLimitExceeded { max: usize },

    /// A metadata map holds the same key twice
    DuplicateKey(String),

    /// An object identity refers to a slot that was never registered
    InvalidIdentity { id: u64, table_size: usize },

    /// An object identity refers to a slot holding a different kind of object
    IdentityKindMismatch { id: u32, expected: &'static str },

    /// A string segment is not valid UTF-8
    InvalidUtf8,

    /// A character code point is not a valid `char`
    InvalidChar(u32),

    /// A null appeared where the format requires a value
    UnexpectedNull(&'static str),

    /// Generic arguments were supplied twice for the same type reference
    AlreadyInitialized,

    /// The operation needs a collaborator that was not wired into the context
    MissingCollaborator(&'static str),

    /// A collaborator (resolver, substitution, fallback serializer) failed
    Collaborator(BoxError),
}

impl CodecError {
    /// Returns `true` if the error was caused by malformed data rather than
    /// by I/O or a collaborator.
    pub fn is_format_error(&self) -> bool {
        !matches!(
            self,
            Self::Io(_) | Self::Collaborator(_) | Self::MissingCollaborator(_)
        )
    }
}

impl error::Error for CodecError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Collaborator(e) => Some(e.as_ref()),
            _ => None,
        }
    }
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "stream error: {}", e),
            Self::VarintOverflow => write!(f, "compressed integer exceeds 64 bits"),
            Self::UnknownTag { tag, context } => {
                write!(f, "unrecognized tag {:#04x} while reading {}", tag, context)
            }
            Self::TokenKindMismatch { token, expected } => write!(
                f,
                "metadata token {:#010x} is not a {:?} token (expected kind bits {:#010x})",
                token,
                expected,
                expected.tag()
            ),
            Self::TokenOutOfRange { value } => {
                write!(f, "metadata token row {:#x} overlaps the kind bits", value)
            }
            Self::LengthLimitExceeded { len, max } => {
                write!(f, "length {} exceeds the limit of {}", len, max)
            }
            Self::DepthLimitExceeded { max } => {
                write!(f, "nesting exceeds the limit of {} levels", max)
            }
            Self::DuplicateKey(key) => write!(f, "metadata key {:?} appears twice", key),
            Self::InvalidIdentity { id, table_size } => write!(
                f,
                "object identity {} is not registered (table holds {} objects)",
                id, table_size
            ),
            Self::IdentityKindMismatch { id, expected } => {
                write!(f, "object identity {} does not refer to a {}", id, expected)
            }
            Self::InvalidUtf8 => write!(f, "string segment is not valid utf-8"),
            Self::InvalidChar(c) => write!(f, "{:#x} is not a valid character", c),
            Self::UnexpectedNull(what) => write!(f, "unexpected null {}", what),
            Self::AlreadyInitialized => {
                write!(f, "generic arguments of the type reference are already set")
            }
            Self::MissingCollaborator(what) => write!(f, "no {} configured", what),
            Self::Collaborator(e) => write!(f, "{}", e),
        }
    }
}

impl From<io::Error> for CodecError {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}
