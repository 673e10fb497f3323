//! Shared constants between the encoder and decoder.

/// Max number of elements any decoded list, array or map may claim.
pub const MAX_LIST_LEN: usize = u16::MAX as usize;

/// Separator used to split strings into individually interned segments.
pub const SEGMENT_SEPARATOR: char = '.';

/// Version byte written in front of every fallback payload.
pub const FALLBACK_FORMAT_VERSION: u8 = 1;

/// Max depth of generic arguments and nested arrays a decoder follows.
pub const MAX_NESTING: usize = 128;

/// Object identity reserved for null
pub const NULL_IDENTITY: u32 = 0;

// presence flags for optional sub-fields and non-interned references
pub const REF_EMPTY: u8 = 0;
pub const REF_PRESENT: u8 = 1;

// member reference kinds. 0 is `REF_EMPTY`.
pub const MEMBER_CONSTRUCTOR: u8 = 1;
pub const MEMBER_FIELD: u8 = 2;
pub const MEMBER_PROPERTY: u8 = 3;
pub const MEMBER_METHOD: u8 = 4;

// polymorphic value tags
pub const VALUE_NULL: u8 = 0;
pub const VALUE_STRING: u8 = 1;
pub const VALUE_CREATION_POLICY: u8 = 2;
pub const VALUE_TYPE: u8 = 3;
pub const VALUE_ARRAY: u8 = 4;
pub const VALUE_BOOL_TRUE: u8 = 5;
pub const VALUE_BOOL_FALSE: u8 = 6;
pub const VALUE_INT32: u8 = 7;
pub const VALUE_CHAR: u8 = 8;
pub const VALUE_GUID: u8 = 9;
pub const VALUE_TYPE_REF: u8 = 10;
pub const VALUE_ENUM_SUBSTITUTION: u8 = 11;
pub const VALUE_TYPE_SUBSTITUTION: u8 = 12;
pub const VALUE_TYPE_ARRAY_SUBSTITUTION: u8 = 13;
pub const VALUE_OPAQUE: u8 = 14;
