//! Polymorphic metadata values.
//!
//! Every value starts with a tag byte, see [crate::consts]. Only the live-type
//! and array variants call the type resolver, and only the opaque variant calls
//! the fallback serializer. Collaborators are looked up before the tag is
//! written, so a missing one leaves the stream untouched.

use std::io::{Read, Write};

use uuid::Uuid;

use super::{unknown_tag, Decoder, Encoder};
use crate::consts::*;
use crate::err::{CodecError, CodecResult};
use crate::refs::{TokenKind, TypeRef};
use crate::value::{CreationPolicy, Value};

impl<'s, W: Write> Encoder<'s, W> {
    /// Write one value, recursing into arrays.
    pub fn write_value(&mut self, value: &Value) -> CodecResult<()> {
        self.traced("Value", |enc| match value {
            Value::Null => enc.write_u8(VALUE_NULL),
            Value::String(s) => {
                enc.write_u8(VALUE_STRING)?;
                enc.write_string(Some(s.as_str()))
            }
            Value::CreationPolicy(policy) => {
                enc.write_u8(VALUE_CREATION_POLICY)?;
                enc.write_u8(*policy as u8)
            }
            Value::Type(resolved) => {
                let type_ref = enc
                    .services
                    .resolver()?
                    .get(resolved)
                    .map_err(CodecError::Collaborator)?;
                TokenKind::TypeDef.compress(type_ref.metadata_token())?;

                enc.write_u8(VALUE_TYPE)?;
                enc.write_type_ref(Some(&type_ref))
            }
            Value::Array {
                element_type,
                items,
            } => {
                let type_ref = enc
                    .services
                    .resolver()?
                    .get(element_type)
                    .map_err(CodecError::Collaborator)?;
                TokenKind::TypeDef.compress(type_ref.metadata_token())?;
                if items.len() > MAX_LIST_LEN {
                    return Err(CodecError::LengthLimitExceeded {
                        len: items.len() as u64,
                        max: MAX_LIST_LEN,
                    });
                }

                enc.write_u8(VALUE_ARRAY)?;
                enc.write_type_ref(Some(&type_ref))?;
                enc.write_list(items, |enc, item| enc.write_value(item))
            }
            Value::Bool(true) => enc.write_u8(VALUE_BOOL_TRUE),
            Value::Bool(false) => enc.write_u8(VALUE_BOOL_FALSE),
            Value::Int32(v) => {
                enc.write_u8(VALUE_INT32)?;
                enc.write_bytes(&v.to_le_bytes())
            }
            Value::Char(c) => {
                enc.write_u8(VALUE_CHAR)?;
                enc.write_compressed_uint(u64::from(*c))
            }
            Value::Guid(guid) => {
                enc.write_u8(VALUE_GUID)?;
                enc.write_bytes(guid.as_bytes())
            }
            Value::TypeRef(type_ref) => {
                TokenKind::TypeDef.compress(type_ref.metadata_token())?;
                enc.write_u8(VALUE_TYPE_REF)?;
                enc.write_type_ref(Some(type_ref))
            }
            Value::EnumSubstitution {
                enum_type,
                raw_value,
            } => {
                TokenKind::TypeDef.compress(enum_type.metadata_token())?;
                enc.write_u8(VALUE_ENUM_SUBSTITUTION)?;
                enc.write_type_ref(Some(enum_type))?;
                enc.write_bytes(&raw_value.to_le_bytes())
            }
            Value::TypeSubstitution(type_ref) => {
                TokenKind::TypeDef.compress(type_ref.metadata_token())?;
                enc.write_u8(VALUE_TYPE_SUBSTITUTION)?;
                enc.write_type_ref(Some(type_ref))
            }
            Value::TypeArraySubstitution(list) => {
                enc.write_u8(VALUE_TYPE_ARRAY_SUBSTITUTION)?;
                enc.write_type_ref_list(Some(list))
            }
            Value::Opaque(opaque) => {
                let fallback = enc.services.fallback()?;
                enc.write_u8(VALUE_OPAQUE)?;

                log::trace!(
                    "delegating opaque value {:?} at byte {}",
                    opaque.type_name(),
                    enc.position()
                );
                let stream = enc.direct_writer()?;
                fallback
                    .serialize(stream, opaque)
                    .map_err(CodecError::Collaborator)
            }
        })
    }
}

impl<'s, R: Read> Decoder<'s, R> {
    /// Read one value, recursing into arrays.
    pub fn read_value(&mut self) -> CodecResult<Value> {
        self.traced("Value", |dec| {
            let value = match dec.read_u8()? {
                VALUE_NULL => Value::Null,
                VALUE_STRING => dec
                    .read_string()?
                    .map(Value::String)
                    .ok_or(CodecError::UnexpectedNull("string value"))?,
                VALUE_CREATION_POLICY => {
                    let policy = CreationPolicy::try_from(dec.read_u8()?)
                        .map_err(|tag| unknown_tag(tag, "creation policy"))?;
                    Value::CreationPolicy(policy)
                }
                VALUE_TYPE => {
                    let resolver = dec.services.resolver()?;
                    let type_ref = dec.read_required_type("live type")?;
                    let resolved = resolver
                        .resolve(&type_ref)
                        .map_err(CodecError::Collaborator)?;

                    Value::Type(resolved)
                }
                VALUE_ARRAY => {
                    let resolver = dec.services.resolver()?;
                    let type_ref = dec.read_required_type("array element type")?;
                    let element_type = resolver
                        .resolve(&type_ref)
                        .map_err(CodecError::Collaborator)?;
                    dec.enter()?;
                    let items = dec.read_list(|dec| dec.read_value())?;
                    dec.leave();

                    Value::Array {
                        element_type,
                        items,
                    }
                }
                VALUE_BOOL_TRUE => Value::Bool(true),
                VALUE_BOOL_FALSE => Value::Bool(false),
                VALUE_INT32 => Value::Int32(i32::from_le_bytes(dec.read_array()?)),
                VALUE_CHAR => {
                    let code = dec.read_compressed_u32()?;
                    let c = char::from_u32(code).ok_or(CodecError::InvalidChar(code))?;
                    Value::Char(c)
                }
                VALUE_GUID => Value::Guid(Uuid::from_bytes(dec.read_array()?)),
                VALUE_TYPE_REF => Value::TypeRef(dec.read_required_type("type reference")?),
                VALUE_ENUM_SUBSTITUTION => {
                    let enum_type = dec.read_required_type("enum type")?;
                    let raw_value = i32::from_le_bytes(dec.read_array()?);

                    Value::EnumSubstitution {
                        enum_type,
                        raw_value,
                    }
                }
                VALUE_TYPE_SUBSTITUTION => {
                    Value::TypeSubstitution(dec.read_required_type("substituted type")?)
                }
                VALUE_TYPE_ARRAY_SUBSTITUTION => dec
                    .read_type_ref_list()?
                    .map(Value::TypeArraySubstitution)
                    .ok_or(CodecError::UnexpectedNull("substituted type array"))?,
                VALUE_OPAQUE => {
                    let fallback = dec.services.fallback()?;
                    log::trace!("delegating opaque value at byte {}", dec.position());

                    let opaque = fallback
                        .deserialize(&mut dec.reader)
                        .map_err(CodecError::Collaborator)?;
                    Value::Opaque(opaque)
                }
                tag => return Err(unknown_tag(tag, "value")),
            };

            Ok(value)
        })
    }

    fn read_required_type(&mut self, what: &'static str) -> CodecResult<TypeRef> {
        self.read_type_ref()?.ok_or(CodecError::UnexpectedNull(what))
    }
}
