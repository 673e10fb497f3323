//! Registered fallback serializer for opaque metadata values.
//!
//! Only types registered under a name can pass through. Each payload is framed as
//!
//! ```text
//! version byte | name (compressed length + utf-8) | compressed length | payload
//! ```
//!
//! where the payload is the value in the [crate::ser_de] format. The version
//! byte is checked and nothing else is promised: a payload written by one
//! version of a registered type may not read back with another.

use std::collections::HashMap;
use std::fmt::{self, Debug};
use std::io::{self, Read, Write};
use std::rc::Rc;
use std::{error, str};

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::collab::ObjectSerializer;
use crate::consts::{FALLBACK_FORMAT_VERSION, MAX_LIST_LEN};
use crate::err::{BoxError, CodecError};
use crate::ser_de;
use crate::value::{OpaqueObject, OpaqueValue};
use crate::varint;

type SerializeFn = Box<dyn Fn(&OpaqueValue) -> Result<Vec<u8>, FallbackError>>;
type DeserializeFn = Box<dyn Fn(&[u8]) -> Result<Rc<dyn OpaqueObject>, FallbackError>>;

/// How one registered type is written and read
struct Entry {
    serialize: SerializeFn,
    deserialize: DeserializeFn,
}

/// Errors of the fallback serializer
#[derive(Debug)]
pub enum FallbackError {
    Io(io::Error),

    /// A frame length is malformed
    Codec(CodecError),

    /// The payload could not be encoded or decoded
    Payload(ser_de::Error),

    /// The frame was written by a different format version
    UnsupportedVersion(u8),

    /// No type is registered under this name
    Unregistered(String),

    /// The value's object is not of the type registered under its name
    TypeMismatch(String),

    /// The name is already taken by another registration
    DuplicateName(String),

    /// A name is longer than the collection cap
    NameTooLong(u64),

    /// A name is not valid UTF-8
    InvalidName,
}

impl error::Error for FallbackError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Codec(e) => Some(e),
            Self::Payload(e) => Some(e),
            _ => None,
        }
    }
}

impl fmt::Display for FallbackError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "fallback stream error: {}", e),
            Self::Codec(e) => write!(f, "malformed fallback frame: {}", e),
            Self::Payload(e) => write!(f, "fallback payload error: {}", e),
            Self::UnsupportedVersion(v) => write!(
                f,
                "fallback format version {} is not supported (expected {})",
                v, FALLBACK_FORMAT_VERSION
            ),
            Self::Unregistered(name) => write!(f, "no fallback type registered as {:?}", name),
            Self::TypeMismatch(name) => {
                write!(f, "value is not of the type registered as {:?}", name)
            }
            Self::DuplicateName(name) => {
                write!(f, "a fallback type is already registered as {:?}", name)
            }
            Self::NameTooLong(len) => write!(f, "fallback type name of {} bytes is too long", len),
            Self::InvalidName => write!(f, "fallback type name is not valid utf-8"),
        }
    }
}

impl From<io::Error> for FallbackError {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<CodecError> for FallbackError {
    fn from(value: CodecError) -> Self {
        match value {
            CodecError::Io(e) => Self::Io(e),
            other => Self::Codec(other),
        }
    }
}

impl From<ser_de::Error> for FallbackError {
    fn from(value: ser_de::Error) -> Self {
        Self::Payload(value)
    }
}

/// Explicit set of types allowed through the opaque value path.
#[derive(Default)]
pub struct FallbackRegistry {
    entries: HashMap<String, Entry>,
}

impl FallbackRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allow values of `T` through under `name`.
    ///
    /// The name is written into every frame, so it must stay stable for
    /// caches to remain readable.
    pub fn register<T>(&mut self, name: &str) -> Result<(), FallbackError>
    where
        T: Serialize + DeserializeOwned + PartialEq + Debug + 'static,
    {
        if self.entries.contains_key(name) {
            return Err(FallbackError::DuplicateName(name.to_string()));
        }
        if name.len() > MAX_LIST_LEN {
            return Err(FallbackError::NameTooLong(name.len() as u64));
        }

        let type_name = name.to_string();
        let serialize: SerializeFn = Box::new(move |value: &OpaqueValue| {
            let object = value
                .downcast_ref::<T>()
                .ok_or_else(|| FallbackError::TypeMismatch(type_name.clone()))?;
            ser_de::serialize(object).map_err(FallbackError::Payload)
        });
        let deserialize: DeserializeFn = Box::new(|bytes: &[u8]| {
            let object: Rc<dyn OpaqueObject> = Rc::new(ser_de::deserialize::<T>(bytes)?);
            Ok(object)
        });

        log::debug!(
            "registered fallback type {:?} as {}",
            name,
            std::any::type_name::<T>()
        );
        self.entries.insert(
            name.to_string(),
            Entry {
                serialize,
                deserialize,
            },
        );

        Ok(())
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Registered names, in no particular order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    fn entry(&self, name: &str) -> Result<&Entry, FallbackError> {
        self.entries
            .get(name)
            .ok_or_else(|| FallbackError::Unregistered(name.to_string()))
    }

    fn write_frame(&self, stream: &mut dyn Write, value: &OpaqueValue) -> Result<(), FallbackError> {
        let name = value.type_name();
        let payload = (self.entry(name)?.serialize)(value)?;

        stream.write_all(&[FALLBACK_FORMAT_VERSION])?;
        varint::write_compressed_uint(stream, name.len() as u64)?;
        stream.write_all(name.as_bytes())?;
        varint::write_compressed_uint(stream, payload.len() as u64)?;
        stream.write_all(&payload)?;

        log::trace!("wrote {} byte fallback payload for {:?}", payload.len(), name);
        Ok(())
    }

    fn read_frame(&self, stream: &mut dyn Read) -> Result<OpaqueValue, FallbackError> {
        let mut version = [0_u8; 1];
        stream.read_exact(&mut version)?;
        if version[0] != FALLBACK_FORMAT_VERSION {
            return Err(FallbackError::UnsupportedVersion(version[0]));
        }

        let name_len = varint::read_compressed_uint(stream)?;
        if name_len > MAX_LIST_LEN as u64 {
            return Err(FallbackError::NameTooLong(name_len));
        }
        let name = read_exactly(stream, name_len)?;
        let name = str::from_utf8(&name).map_err(|_| FallbackError::InvalidName)?;
        let entry = self.entry(name)?;

        let payload_len = varint::read_compressed_uint(stream)?;
        let payload = read_exactly(stream, payload_len)?;
        let object = (entry.deserialize)(&payload)?;

        Ok(OpaqueValue::from_shared(name, object))
    }
}

impl Debug for FallbackRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.entries.keys()).finish()
    }
}

impl ObjectSerializer for FallbackRegistry {
    fn serialize(&self, stream: &mut dyn Write, value: &OpaqueValue) -> Result<(), BoxError> {
        Ok(self.write_frame(stream, value)?)
    }

    fn deserialize(&self, stream: &mut dyn Read) -> Result<OpaqueValue, BoxError> {
        Ok(self.read_frame(stream)?)
    }
}

/// Read `len` bytes without allocating for `len` up front
fn read_exactly(stream: &mut dyn Read, len: u64) -> Result<Vec<u8>, FallbackError> {
    let mut buf = Vec::new();
    stream.take(len).read_to_end(&mut buf)?;

    match buf.len() as u64 == len {
        true => Ok(buf),
        false => Err(FallbackError::Io(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "stream ended inside a fallback frame",
        ))),
    }
}
