//! Implementation of [serde::ser::Serializer] for [CompactSerializer]

use serde::{ser, Serialize};

use super::consts;
use super::err::{Error, SerDeResult};
use crate::varint;

/// This data structure contains the serialized bytes of any arbitrary data structure.
///
/// Structs/enums to be serialized need to derive [serde::Serialize].
#[derive(Debug, Default)]
pub struct CompactSerializer {
    pub(crate) output: Vec<u8>,
}

impl CompactSerializer {
    pub fn into_bytes(self) -> Vec<u8> {
        self.output
    }

    fn push_uint(&mut self, value: u64) {
        let mut buf = [0_u8; varint::MAX_COMPRESSED_BYTES];
        let len = varint::encode_compressed(value, &mut buf);
        self.output.extend_from_slice(&buf[..len]);
    }

    /// Writes the prefix, then the length of the slice, then the slice.
    fn push_prefixed_bytes(&mut self, prefix: u8, bytes: &[u8]) {
        self.output.push(prefix);
        self.push_uint(bytes.len() as u64);
        self.output.extend_from_slice(bytes);
    }

    fn push_variant(&mut self, variant_index: u32) {
        self.output.push(consts::PREFIX_ENUM);
        self.push_uint(variant_index.into());
    }
}

/// Impl serialize for signed primitives
macro_rules! serialize_signed {
    ($fn_name: ident, $num_type: ty) => {
        fn $fn_name(self, v: $num_type) -> SerDeResult<()> {
            self.output.push(consts::PREFIX_INT);
            self.push_uint(varint::zigzag_encode(v.into()));
            Ok(())
        }
    };
}

/// Impl serialize for unsigned primitives
macro_rules! serialize_unsigned {
    ($fn_name: ident, $num_type: ty) => {
        fn $fn_name(self, v: $num_type) -> SerDeResult<()> {
            self.output.push(consts::PREFIX_UINT);
            self.push_uint(v.into());
            Ok(())
        }
    };
}

impl<'a> ser::Serializer for &'a mut CompactSerializer {
    type Ok = ();

    type Error = Error;

    type SerializeSeq = Self;

    type SerializeTuple = Self;

    type SerializeTupleStruct = Self;

    type SerializeTupleVariant = Self;

    type SerializeMap = Self;

    type SerializeStruct = Self;

    type SerializeStructVariant = Self;

    fn is_human_readable(&self) -> bool {
        false
    }

    fn serialize_bool(self, v: bool) -> SerDeResult<()> {
        self.output.push(consts::PREFIX_BOOL);

        match v {
            true => self.output.push(consts::BOOL_TRUE),
            false => self.output.push(consts::BOOL_FALSE),
        }

        Ok(())
    }

    serialize_signed! {serialize_i8, i8}
    serialize_signed! {serialize_i16, i16}
    serialize_signed! {serialize_i32, i32}
    serialize_signed! {serialize_i64, i64}

    serialize_unsigned! {serialize_u8, u8}
    serialize_unsigned! {serialize_u16, u16}
    serialize_unsigned! {serialize_u32, u32}
    serialize_unsigned! {serialize_u64, u64}

    fn serialize_f32(self, v: f32) -> SerDeResult<()> {
        self.serialize_f64(v.into())
    }

    fn serialize_f64(self, v: f64) -> SerDeResult<()> {
        self.output.push(consts::PREFIX_FLOAT);
        self.output.extend_from_slice(&v.to_le_bytes());
        Ok(())
    }

    fn serialize_char(self, v: char) -> SerDeResult<()> {
        self.output.push(consts::PREFIX_CHAR);
        self.push_uint(u64::from(v));
        Ok(())
    }

    fn serialize_str(self, v: &str) -> SerDeResult<()> {
        self.push_prefixed_bytes(consts::PREFIX_STR, v.as_bytes());
        Ok(())
    }

    fn serialize_bytes(self, v: &[u8]) -> SerDeResult<()> {
        self.push_prefixed_bytes(consts::PREFIX_BYTES, v);
        Ok(())
    }

    fn serialize_none(self) -> SerDeResult<()> {
        self.output.push(consts::PREFIX_OPTIONAL);
        self.output.push(consts::OPTION_NONE);
        Ok(())
    }

    fn serialize_some<T: ?Sized>(self, value: &T) -> SerDeResult<()>
    where
        T: Serialize,
    {
        self.output.push(consts::PREFIX_OPTIONAL);
        self.output.push(consts::OPTION_SOME);
        value.serialize(self)
    }

    fn serialize_unit(self) -> SerDeResult<()> {
        self.output.push(consts::PREFIX_UNIT);
        Ok(())
    }

    fn serialize_unit_struct(self, _: &'static str) -> SerDeResult<()> {
        self.serialize_unit()
    }

    // serialize the index of a unit variant
    fn serialize_unit_variant(
        self,
        _: &'static str,
        variant_index: u32,
        _: &'static str,
    ) -> SerDeResult<()> {
        self.push_variant(variant_index);
        Ok(())
    }

    // serialize the inner value
    fn serialize_newtype_struct<T: ?Sized>(self, _: &'static str, value: &T) -> SerDeResult<()>
    where
        T: Serialize,
    {
        value.serialize(self)
    }

    // serialize the index, then the inner value
    fn serialize_newtype_variant<T: ?Sized>(
        self,
        _: &'static str,
        variant_index: u32,
        _: &'static str,
        value: &T,
    ) -> SerDeResult<()>
    where
        T: Serialize,
    {
        self.push_variant(variant_index);
        value.serialize(self)
    }

    fn serialize_seq(self, _len: Option<usize>) -> SerDeResult<Self::SerializeSeq> {
        self.output.push(consts::SEQ_OPEN);
        Ok(self)
    }

    fn serialize_tuple(self, _len: usize) -> SerDeResult<Self::SerializeTuple> {
        self.output.push(consts::SEQ_OPEN);
        Ok(self)
    }

    fn serialize_tuple_struct(
        self,
        _name: &'static str,
        len: usize,
    ) -> SerDeResult<Self::SerializeTupleStruct> {
        self.serialize_tuple(len)
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        variant_index: u32,
        _variant: &'static str,
        len: usize,
    ) -> SerDeResult<Self::SerializeTupleVariant> {
        self.push_variant(variant_index);
        self.serialize_tuple(len)
    }

    fn serialize_map(self, _len: Option<usize>) -> SerDeResult<Self::SerializeMap> {
        self.output.push(consts::MAP_OPEN);
        Ok(self)
    }

    // field names are implied by the field order
    fn serialize_struct(
        self,
        _name: &'static str,
        len: usize,
    ) -> SerDeResult<Self::SerializeStruct> {
        self.serialize_tuple(len)
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        variant_index: u32,
        _variant: &'static str,
        len: usize,
    ) -> SerDeResult<Self::SerializeStructVariant> {
        self.push_variant(variant_index);
        self.serialize_tuple(len)
    }
}

/// Impl the element-wise traits, which all close with [consts::SEQ_CLOSE]
macro_rules! serialize_elements {
    ($trait_name: ident :: $fn_name: ident) => {
        impl<'a> ser::$trait_name for &'a mut CompactSerializer {
            type Ok = ();

            type Error = Error;

            fn $fn_name<T: ?Sized>(&mut self, value: &T) -> SerDeResult<()>
            where
                T: Serialize,
            {
                value.serialize(&mut **self)
            }

            fn end(self) -> SerDeResult<()> {
                self.output.push(consts::SEQ_CLOSE);
                Ok(())
            }
        }
    };
}

serialize_elements! {SerializeSeq::serialize_element}
serialize_elements! {SerializeTuple::serialize_element}
serialize_elements! {SerializeTupleStruct::serialize_field}
serialize_elements! {SerializeTupleVariant::serialize_field}

/// Impl the struct traits, which drop field names
macro_rules! serialize_fields {
    ($trait_name: ident) => {
        impl<'a> ser::$trait_name for &'a mut CompactSerializer {
            type Ok = ();

            type Error = Error;

            fn serialize_field<T: ?Sized>(&mut self, _key: &'static str, value: &T) -> SerDeResult<()>
            where
                T: Serialize,
            {
                value.serialize(&mut **self)
            }

            fn end(self) -> SerDeResult<()> {
                self.output.push(consts::SEQ_CLOSE);
                Ok(())
            }
        }
    };
}

serialize_fields! {SerializeStruct}
serialize_fields! {SerializeStructVariant}

impl<'a> ser::SerializeMap for &'a mut CompactSerializer {
    type Ok = ();

    type Error = Error;

    fn serialize_key<T: ?Sized>(&mut self, key: &T) -> SerDeResult<()>
    where
        T: Serialize,
    {
        key.serialize(&mut **self)
    }

    fn serialize_value<T: ?Sized>(&mut self, value: &T) -> SerDeResult<()>
    where
        T: Serialize,
    {
        value.serialize(&mut **self)
    }

    fn end(self) -> SerDeResult<()> {
        self.output.push(consts::MAP_CLOSE);
        Ok(())
    }
}
