//! Implementation of [serde::de::Deserializer] for [CompactDeserializer]

use serde::de::{
    value::U32Deserializer, DeserializeSeed, EnumAccess, IntoDeserializer, MapAccess,
    SeqAccess, VariantAccess, Visitor,
};
use serde::Deserializer;

use super::consts;
use super::err::{Error, SerDeResult};
use crate::varint::{self, VarintError};

/// Validate the next byte from [ByteViewer] against a known one.
///
/// Without an explicit error, a mismatch is reported as a prefix mismatch.
macro_rules! validate_bytes {
    ($viewer: expr, $known: path) => {
        let found = $viewer.next_byte()?;
        match found == $known {
            true => (),
            false => {
                return Err(Error::PrefixNotMatched {
                    expected: $known,
                    found,
                })
            }
        }
    };
    ($viewer: expr, $known: path => $err: expr) => {
        let found = $viewer.next_byte()?;
        match found == $known {
            true => (),
            false => return Err($err),
        }
    };
}

/// Reads values back out of a byte slice.
///
/// Structs/enums to be deserialized need to derive [serde::Deserialize].
pub struct CompactDeserializer<'de> {
    input: ByteViewer<'de>,
    depth: usize,
}

impl<'de> CompactDeserializer<'de> {
    pub fn from_slice(s: &'de [u8]) -> Self {
        Self {
            input: ByteViewer::from_slice(s),
            depth: 0,
        }
    }

    /// Bytes not consumed yet
    pub fn remaining(&self) -> usize {
        self.input.distance_to_end()
    }

    fn enter(&mut self) -> SerDeResult<()> {
        self.depth += 1;
        match self.depth <= consts::MAX_DEPTH {
            true => Ok(()),
            false => Err(Error::DepthLimitExceeded),
        }
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    fn read_int(&mut self) -> SerDeResult<i64> {
        validate_bytes!(self.input, consts::PREFIX_INT);
        Ok(varint::zigzag_decode(self.input.pop_uint()?))
    }

    fn read_uint(&mut self) -> SerDeResult<u64> {
        validate_bytes!(self.input, consts::PREFIX_UINT);
        self.input.pop_uint()
    }

    /// A length-prefixed run of bytes
    fn read_run(&mut self) -> SerDeResult<&'de [u8]> {
        let len = self.input.pop_uint()?;
        self.input.next_bytes(len)
    }
}

/// Impl deserialize for signed primitives. Range checks are left to the visitor.
macro_rules! deserialize_signed {
    ($($fn_name: ident),*) => {
        $(
            fn $fn_name<V>(self, visitor: V) -> SerDeResult<V::Value>
            where
                V: Visitor<'de>,
            {
                visitor.visit_i64(self.read_int()?)
            }
        )*
    };
}

/// Impl deserialize for unsigned primitives
macro_rules! deserialize_unsigned {
    ($($fn_name: ident),*) => {
        $(
            fn $fn_name<V>(self, visitor: V) -> SerDeResult<V::Value>
            where
                V: Visitor<'de>,
            {
                visitor.visit_u64(self.read_uint()?)
            }
        )*
    };
}

impl<'de, 'a> Deserializer<'de> for &'a mut CompactDeserializer<'de> {
    type Error = Error;

    fn deserialize_any<V>(self, visitor: V) -> SerDeResult<V::Value>
    where
        V: Visitor<'de>,
    {
        match self.input.peek() {
            Some(consts::PREFIX_BOOL) => self.deserialize_bool(visitor),
            Some(consts::PREFIX_INT) => self.deserialize_i64(visitor),
            Some(consts::PREFIX_UINT) => self.deserialize_u64(visitor),
            Some(consts::PREFIX_FLOAT) => self.deserialize_f64(visitor),
            Some(consts::PREFIX_CHAR) => self.deserialize_char(visitor),
            Some(consts::PREFIX_STR) => self.deserialize_str(visitor),
            Some(consts::PREFIX_BYTES) => self.deserialize_bytes(visitor),
            Some(consts::PREFIX_OPTIONAL) => self.deserialize_option(visitor),
            Some(consts::PREFIX_UNIT) => self.deserialize_unit(visitor),
            Some(consts::SEQ_OPEN) => self.deserialize_seq(visitor),
            Some(consts::MAP_OPEN) => self.deserialize_map(visitor),
            // enum variants only carry their index
            Some(prefix) => Err(Error::NotSelfDescribing(prefix as char)),
            None => Err(Error::UnexpectedEnd),
        }
    }

    fn deserialize_bool<V>(self, visitor: V) -> SerDeResult<V::Value>
    where
        V: Visitor<'de>,
    {
        validate_bytes!(self.input, consts::PREFIX_BOOL);

        match self.input.next_byte()? {
            consts::BOOL_TRUE => visitor.visit_bool(true),
            consts::BOOL_FALSE => visitor.visit_bool(false),
            other => Err(Error::InvalidMarker(other)),
        }
    }

    deserialize_signed! {deserialize_i8, deserialize_i16, deserialize_i32, deserialize_i64}
    deserialize_unsigned! {deserialize_u8, deserialize_u16, deserialize_u32, deserialize_u64}

    fn deserialize_f32<V>(self, visitor: V) -> SerDeResult<V::Value>
    where
        V: Visitor<'de>,
    {
        self.deserialize_f64(visitor)
    }

    fn deserialize_f64<V>(self, visitor: V) -> SerDeResult<V::Value>
    where
        V: Visitor<'de>,
    {
        validate_bytes!(self.input, consts::PREFIX_FLOAT);
        let bytes = self.input.next_bytes_fixed::<8>()?;

        visitor.visit_f64(f64::from_le_bytes(bytes))
    }

    fn deserialize_char<V>(self, visitor: V) -> SerDeResult<V::Value>
    where
        V: Visitor<'de>,
    {
        validate_bytes!(self.input, consts::PREFIX_CHAR);
        let code = self.input.pop_uint()?;

        let c = u32::try_from(code)
            .ok()
            .and_then(char::from_u32)
            .ok_or(Error::InvalidChar(code))?;
        visitor.visit_char(c)
    }

    fn deserialize_str<V>(self, visitor: V) -> SerDeResult<V::Value>
    where
        V: Visitor<'de>,
    {
        validate_bytes!(self.input, consts::PREFIX_STR);
        let bytes = self.read_run()?;

        visitor.visit_borrowed_str(std::str::from_utf8(bytes).map_err(|_| Error::InvalidUtf8)?)
    }

    fn deserialize_string<V>(self, visitor: V) -> SerDeResult<V::Value>
    where
        V: Visitor<'de>,
    {
        self.deserialize_str(visitor)
    }

    fn deserialize_bytes<V>(self, visitor: V) -> SerDeResult<V::Value>
    where
        V: Visitor<'de>,
    {
        validate_bytes!(self.input, consts::PREFIX_BYTES);
        let bytes = self.read_run()?;

        visitor.visit_borrowed_bytes(bytes)
    }

    fn deserialize_byte_buf<V>(self, visitor: V) -> SerDeResult<V::Value>
    where
        V: Visitor<'de>,
    {
        self.deserialize_bytes(visitor)
    }

    fn deserialize_option<V>(self, visitor: V) -> SerDeResult<V::Value>
    where
        V: Visitor<'de>,
    {
        validate_bytes!(self.input, consts::PREFIX_OPTIONAL);

        match self.input.next_byte()? {
            consts::OPTION_NONE => visitor.visit_none(),
            consts::OPTION_SOME => {
                self.enter()?;
                let value = visitor.visit_some(&mut *self)?;
                self.leave();

                Ok(value)
            }
            other => Err(Error::InvalidMarker(other)),
        }
    }

    fn deserialize_unit<V>(self, visitor: V) -> SerDeResult<V::Value>
    where
        V: Visitor<'de>,
    {
        validate_bytes!(self.input, consts::PREFIX_UNIT);
        visitor.visit_unit()
    }

    fn deserialize_unit_struct<V>(self, _name: &'static str, visitor: V) -> SerDeResult<V::Value>
    where
        V: Visitor<'de>,
    {
        self.deserialize_unit(visitor)
    }

    fn deserialize_newtype_struct<V>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> SerDeResult<V::Value>
    where
        V: Visitor<'de>,
    {
        visitor.visit_newtype_struct(self)
    }

    fn deserialize_seq<V>(self, visitor: V) -> SerDeResult<V::Value>
    where
        V: Visitor<'de>,
    {
        validate_bytes!(self.input, consts::SEQ_OPEN);
        self.enter()?;

        let accessor = CollectionsAccessor::from_deserializer(&mut *self, consts::SEQ_CLOSE);
        let value = visitor.visit_seq(accessor)?;

        validate_bytes! {
            self.input, consts::SEQ_CLOSE => Error::DelimiterNotFound(consts::SEQ_CLOSE as char)
        }
        self.leave();

        Ok(value)
    }

    fn deserialize_tuple<V>(self, _len: usize, visitor: V) -> SerDeResult<V::Value>
    where
        V: Visitor<'de>,
    {
        self.deserialize_seq(visitor)
    }

    fn deserialize_tuple_struct<V>(
        self,
        _name: &'static str,
        _len: usize,
        visitor: V,
    ) -> SerDeResult<V::Value>
    where
        V: Visitor<'de>,
    {
        self.deserialize_seq(visitor)
    }

    fn deserialize_map<V>(self, visitor: V) -> SerDeResult<V::Value>
    where
        V: Visitor<'de>,
    {
        validate_bytes!(self.input, consts::MAP_OPEN);
        self.enter()?;

        let accessor = CollectionsAccessor::from_deserializer(&mut *self, consts::MAP_CLOSE);
        let value = visitor.visit_map(accessor)?;

        validate_bytes! {
            self.input, consts::MAP_CLOSE => Error::DelimiterNotFound(consts::MAP_CLOSE as char)
        }
        self.leave();

        Ok(value)
    }

    // structs are written as sequences of their fields
    fn deserialize_struct<V>(
        self,
        _name: &'static str,
        _fields: &'static [&'static str],
        visitor: V,
    ) -> SerDeResult<V::Value>
    where
        V: Visitor<'de>,
    {
        self.deserialize_seq(visitor)
    }

    fn deserialize_enum<V>(
        self,
        _name: &'static str,
        _variants: &'static [&'static str],
        visitor: V,
    ) -> SerDeResult<V::Value>
    where
        V: Visitor<'de>,
    {
        validate_bytes!(self.input, consts::PREFIX_ENUM);

        self.enter()?;
        let value = visitor.visit_enum(CollectionsAccessor::from_deserializer(&mut *self, 0))?;
        self.leave();

        Ok(value)
    }

    fn deserialize_identifier<V>(self, visitor: V) -> SerDeResult<V::Value>
    where
        V: Visitor<'de>,
    {
        self.deserialize_any(visitor)
    }

    fn deserialize_ignored_any<V>(self, visitor: V) -> SerDeResult<V::Value>
    where
        V: Visitor<'de>,
    {
        self.deserialize_any(visitor)
    }

    fn is_human_readable(&self) -> bool {
        false
    }
}

/// A bounds-checked cursor over a slice of bytes.
struct ByteViewer<'arr> {
    slice: &'arr [u8],
    offset: usize,
}

impl<'arr> ByteViewer<'arr> {
    /// Create a new viewer on a byte slice
    fn from_slice(s: &'arr [u8]) -> Self {
        Self { slice: s, offset: 0 }
    }

    fn distance_to_end(&self) -> usize {
        self.slice.len() - self.offset
    }

    /// Peek at the next byte in the slice
    fn peek(&self) -> Option<u8> {
        self.slice.get(self.offset).copied()
    }

    /// Return the next byte and advance the view
    fn next_byte(&mut self) -> SerDeResult<u8> {
        let b = self.peek().ok_or(Error::UnexpectedEnd)?;
        self.offset += 1;

        Ok(b)
    }

    /// Returns the next slice of bytes and advances the view.
    ///
    /// `size` is checked against the bytes left before anything is sliced.
    fn next_bytes(&mut self, size: u64) -> SerDeResult<&'arr [u8]> {
        let size = match size <= self.distance_to_end() as u64 {
            true => size as usize,
            false => return Err(Error::UnexpectedEnd),
        };

        let view = &self.slice[self.offset..self.offset + size];
        self.offset += size;

        Ok(view)
    }

    /// Returns a copy of the next bytes as a fixed-size array.
    fn next_bytes_fixed<const ARR_SIZE: usize>(&mut self) -> SerDeResult<[u8; ARR_SIZE]> {
        let mut arr = [0_u8; ARR_SIZE];
        arr.copy_from_slice(self.next_bytes(ARR_SIZE as u64)?);

        Ok(arr)
    }

    /// Takes the next compressed integer, used for lengths and numbers alike.
    fn pop_uint(&mut self) -> SerDeResult<u64> {
        let (value, len) =
            varint::decode_compressed(&self.slice[self.offset..]).map_err(|e| match e {
                VarintError::Truncated => Error::UnexpectedEnd,
                VarintError::Overflow => Error::InvalidVarint,
            })?;
        self.offset += len;

        Ok(value)
    }
}

/// This wrapper contains implementations for accessing collections and enums.
struct CollectionsAccessor<'a, 'de: 'a> {
    des: &'a mut CompactDeserializer<'de>,
    // checks the immediate byte for this terminating condition
    terminator: u8,
}

impl<'a, 'de> CollectionsAccessor<'a, 'de> {
    fn from_deserializer(des: &'a mut CompactDeserializer<'de>, terminator: u8) -> Self {
        Self { des, terminator }
    }

    fn at_end(&self) -> bool {
        self.des.input.peek() == Some(self.terminator)
    }
}

impl<'a, 'de> SeqAccess<'de> for CollectionsAccessor<'a, 'de> {
    type Error = Error;

    fn next_element_seed<T>(&mut self, seed: T) -> SerDeResult<Option<T::Value>>
    where
        T: DeserializeSeed<'de>,
    {
        // stop at sequence boundary
        if self.at_end() {
            return Ok(None);
        }
        seed.deserialize(&mut *self.des).map(Some)
    }
}

impl<'a, 'de> MapAccess<'de> for CollectionsAccessor<'a, 'de> {
    type Error = Error;

    fn next_key_seed<K>(&mut self, seed: K) -> SerDeResult<Option<K::Value>>
    where
        K: DeserializeSeed<'de>,
    {
        // stop at map boundary
        if self.at_end() {
            return Ok(None);
        }
        seed.deserialize(&mut *self.des).map(Some)
    }

    fn next_value_seed<V>(&mut self, seed: V) -> SerDeResult<V::Value>
    where
        V: DeserializeSeed<'de>,
    {
        seed.deserialize(&mut *self.des)
    }
}

impl<'a, 'de> EnumAccess<'de> for CollectionsAccessor<'a, 'de> {
    type Error = Error;

    type Variant = Self;

    fn variant_seed<V>(self, seed: V) -> SerDeResult<(V::Value, Self::Variant)>
    where
        V: DeserializeSeed<'de>,
    {
        let index = self.des.input.pop_uint()?;
        let index = u32::try_from(index).map_err(|_| Error::InvalidVarint)?;

        let index: U32Deserializer<Error> = index.into_deserializer();
        let variant = seed.deserialize(index)?;

        Ok((variant, self))
    }
}

impl<'a, 'de> VariantAccess<'de> for CollectionsAccessor<'a, 'de> {
    type Error = Error;

    fn unit_variant(self) -> SerDeResult<()> {
        Ok(())
    }

    fn newtype_variant_seed<T>(self, seed: T) -> SerDeResult<T::Value>
    where
        T: DeserializeSeed<'de>,
    {
        seed.deserialize(self.des)
    }

    fn tuple_variant<V>(self, _len: usize, visitor: V) -> SerDeResult<V::Value>
    where
        V: Visitor<'de>,
    {
        self.des.deserialize_seq(visitor)
    }

    fn struct_variant<V>(
        self,
        _fields: &'static [&'static str],
        visitor: V,
    ) -> SerDeResult<V::Value>
    where
        V: Visitor<'de>,
    {
        self.des.deserialize_seq(visitor)
    }
}
