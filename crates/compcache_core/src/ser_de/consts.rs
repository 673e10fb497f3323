//! Shared constants between serialization and deserialization logic.

// every value is prefixed with a label so that its type can be
// inferred/asserted during deserialization.

pub const PREFIX_BOOL: u8 = b'b';
pub const BOOL_TRUE: u8 = 1;
pub const BOOL_FALSE: u8 = 0;

/// Signed integers of any width, zigzag encoded into a compressed uint
pub const PREFIX_INT: u8 = b'i';
/// Unsigned integers of any width, as a compressed uint
pub const PREFIX_UINT: u8 = b'u';
/// Floats, widened to `f64`, little endian
pub const PREFIX_FLOAT: u8 = b'f';
/// A char as a compressed code point
pub const PREFIX_CHAR: u8 = b'c';

pub const PREFIX_STR: u8 = b's';
pub const PREFIX_BYTES: u8 = b'y';

pub const PREFIX_OPTIONAL: u8 = b'o';
pub const OPTION_NONE: u8 = 0;
pub const OPTION_SOME: u8 = 1;

pub const PREFIX_UNIT: u8 = b'n';

/// Enum variants, followed by the compressed variant index and the payload
pub const PREFIX_ENUM: u8 = b'e';

// collections are delimited instead of length-prefixed.
// the prefix doubles as the opening delimiter.

/// Sequences, tuples and structs
pub const SEQ_OPEN: u8 = b'[';
pub const SEQ_CLOSE: u8 = b']';

/// Maps, as alternating keys and values
pub const MAP_OPEN: u8 = b'{';
pub const MAP_CLOSE: u8 = b'}';

/// Max nesting of collections, options and enums accepted on read
pub const MAX_DEPTH: usize = 128;
