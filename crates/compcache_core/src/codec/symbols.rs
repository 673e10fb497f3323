//! Symbolic references.
//!
//! Assembly names, type references and type reference lists are interned.
//! The other reference kinds are written inline behind a presence flag; the
//! bulk of their size is the declaring type, which is interned anyway.
//!
//! Tokens are validated before the first byte of a reference is written.

use std::io::{Read, Write};

use super::{unknown_tag, Decoder, Encoder};
use crate::consts::{
    MEMBER_CONSTRUCTOR, MEMBER_FIELD, MEMBER_METHOD, MEMBER_PROPERTY, REF_EMPTY, REF_PRESENT,
};
use crate::err::{CodecError, CodecResult};
use crate::intern::Slot;
use crate::refs::{
    AssemblyName, ConstructorRef, FieldRef, MemberRef, MethodRef, ParameterRef, PropertyRef,
    TokenKind, TypeRef, TypeRefList,
};

impl<'s, W: Write> Encoder<'s, W> {
    pub fn write_assembly_name(&mut self, assembly: Option<&AssemblyName>) -> CodecResult<()> {
        self.traced("AssemblyName", |enc| {
            if enc.prepare_reusable(assembly)? {
                if let Some(assembly) = assembly {
                    enc.write_string(Some(assembly.full_name()))?;
                    enc.write_string(assembly.code_base())?;
                }
            }

            Ok(())
        })
    }

    /// Write a type reference, or just its identity if it was written before.
    pub fn write_type_ref(&mut self, type_ref: Option<&TypeRef>) -> CodecResult<()> {
        self.traced("TypeRef", |enc| {
            let row = match type_ref {
                Some(t) => Some(TokenKind::TypeDef.compress(t.metadata_token())?),
                None => None,
            };

            if !enc.prepare_reusable(type_ref)? {
                return Ok(());
            }

            // a fresh identity is only handed out for `Some`
            if let (Some(t), Some(row)) = (type_ref, row) {
                enc.write_assembly_name(Some(t.assembly()))?;
                enc.write_compressed_uint(row.into())?;
                enc.write_bool(t.is_array())?;
                enc.write_compressed_uint(t.generic_parameter_count().into())?;
                enc.write_type_args(t.generic_arguments())?;
            }

            Ok(())
        })
    }

    /// Write a shared list of type references
    pub fn write_type_ref_list(&mut self, list: Option<&TypeRefList>) -> CodecResult<()> {
        self.traced("TypeRefList", |enc| {
            if enc.prepare_reusable(list)? {
                if let Some(list) = list {
                    enc.write_type_args(list)?;
                }
            }

            Ok(())
        })
    }

    pub fn write_method_ref(&mut self, method: Option<&MethodRef>) -> CodecResult<()> {
        self.traced("MethodRef", |enc| match method {
            Some(m) => {
                let row = TokenKind::MethodDef.compress(m.metadata_token)?;
                enc.write_u8(REF_PRESENT)?;
                enc.write_method_body(m, row)
            }
            None => enc.write_u8(REF_EMPTY),
        })
    }

    pub fn write_field_ref(&mut self, field: Option<&FieldRef>) -> CodecResult<()> {
        self.traced("FieldRef", |enc| match field {
            Some(f) => {
                let row = TokenKind::FieldDef.compress(f.metadata_token)?;
                enc.write_u8(REF_PRESENT)?;
                enc.write_declared(&f.declaring_type, row)
            }
            None => enc.write_u8(REF_EMPTY),
        })
    }

    pub fn write_property_ref(&mut self, property: Option<&PropertyRef>) -> CodecResult<()> {
        self.traced("PropertyRef", |enc| match property {
            Some(p) => {
                let rows = property_rows(p)?;
                enc.write_u8(REF_PRESENT)?;
                enc.write_property_body(p, rows)
            }
            None => enc.write_u8(REF_EMPTY),
        })
    }

    pub fn write_constructor_ref(&mut self, ctor: Option<&ConstructorRef>) -> CodecResult<()> {
        self.traced("ConstructorRef", |enc| match ctor {
            Some(c) => {
                let row = TokenKind::MethodDef.compress(c.metadata_token)?;
                enc.write_u8(REF_PRESENT)?;
                enc.write_declared(&c.declaring_type, row)
            }
            None => enc.write_u8(REF_EMPTY),
        })
    }

    pub fn write_parameter_ref(&mut self, parameter: Option<&ParameterRef>) -> CodecResult<()> {
        self.traced("ParameterRef", |enc| match parameter {
            Some(p) => {
                let row = TokenKind::MethodDef.compress(p.method_token)?;
                enc.write_u8(REF_PRESENT)?;
                enc.write_declared(&p.declaring_type, row)?;
                enc.write_u8(p.index)
            }
            None => enc.write_u8(REF_EMPTY),
        })
    }

    pub fn write_member_ref(&mut self, member: Option<&MemberRef>) -> CodecResult<()> {
        self.traced("MemberRef", |enc| match member {
            None => enc.write_u8(REF_EMPTY),
            Some(MemberRef::Constructor(c)) => {
                let row = TokenKind::MethodDef.compress(c.metadata_token)?;
                enc.write_u8(MEMBER_CONSTRUCTOR)?;
                enc.write_declared(&c.declaring_type, row)
            }
            Some(MemberRef::Field(f)) => {
                let row = TokenKind::FieldDef.compress(f.metadata_token)?;
                enc.write_u8(MEMBER_FIELD)?;
                enc.write_declared(&f.declaring_type, row)
            }
            Some(MemberRef::Property(p)) => {
                let rows = property_rows(p)?;
                enc.write_u8(MEMBER_PROPERTY)?;
                enc.write_property_body(p, rows)
            }
            Some(MemberRef::Method(m)) => {
                let row = TokenKind::MethodDef.compress(m.metadata_token)?;
                enc.write_u8(MEMBER_METHOD)?;
                enc.write_method_body(m, row)
            }
        })
    }

    fn write_type_args(&mut self, args: &[TypeRef]) -> CodecResult<()> {
        self.write_list(args, |enc, arg| enc.write_type_ref(Some(arg)))
    }

    /// Declaring type followed by a compressed token row
    fn write_declared(&mut self, declaring_type: &TypeRef, row: u32) -> CodecResult<()> {
        self.write_type_ref(Some(declaring_type))?;
        self.write_compressed_uint(row.into())
    }

    fn write_method_body(&mut self, method: &MethodRef, row: u32) -> CodecResult<()> {
        self.write_declared(&method.declaring_type, row)?;
        self.write_type_args(&method.generic_arguments)
    }

    fn write_property_body(&mut self, property: &PropertyRef, rows: PropertyRows) -> CodecResult<()> {
        self.write_declared(&property.declaring_type, rows.property)?;
        self.write_optional_row(rows.getter)?;
        self.write_optional_row(rows.setter)
    }

    fn write_optional_row(&mut self, row: Option<u32>) -> CodecResult<()> {
        match row {
            Some(row) => {
                self.write_u8(REF_PRESENT)?;
                self.write_compressed_uint(row.into())
            }
            None => self.write_u8(REF_EMPTY),
        }
    }
}

/// Compressed tokens of a property and its accessors
struct PropertyRows {
    property: u32,
    getter: Option<u32>,
    setter: Option<u32>,
}

fn property_rows(property: &PropertyRef) -> CodecResult<PropertyRows> {
    let accessor = |token: Option<u32>| {
        token
            .map(|t| TokenKind::MethodDef.compress(t))
            .transpose()
    };

    Ok(PropertyRows {
        property: TokenKind::Property.compress(property.metadata_token)?,
        getter: accessor(property.getter)?,
        setter: accessor(property.setter)?,
    })
}

impl<'s, R: Read> Decoder<'s, R> {
    pub fn read_assembly_name(&mut self) -> CodecResult<Option<AssemblyName>> {
        self.traced("AssemblyName", |dec| match dec.prepare_reusable()? {
            Slot::Null => Ok(None),
            Slot::Existing(assembly) => Ok(Some(assembly)),
            Slot::Fresh(id) => {
                let full_name = dec
                    .read_string()?
                    .ok_or(CodecError::UnexpectedNull("assembly name"))?;
                let code_base = dec.read_string()?;

                let assembly = AssemblyName::new(full_name, code_base);
                dec.table.register(id, assembly.clone());
                Ok(Some(assembly))
            }
        })
    }

    /// Read a type reference.
    ///
    /// The reference is registered before its generic arguments are read, so an
    /// argument may point back at the type being read.
    pub fn read_type_ref(&mut self) -> CodecResult<Option<TypeRef>> {
        self.traced("TypeRef", |dec| match dec.prepare_reusable()? {
            Slot::Null => Ok(None),
            Slot::Existing(type_ref) => Ok(Some(type_ref)),
            Slot::Fresh(id) => {
                let assembly = dec
                    .read_assembly_name()?
                    .ok_or(CodecError::UnexpectedNull("type assembly"))?;
                let token = dec.read_metadata_token(TokenKind::TypeDef)?;
                let is_array = dec.read_bool()?;
                let generic_parameter_count = dec.read_compressed_u32()?;

                let type_ref =
                    TypeRef::new_pending(assembly, token, is_array, generic_parameter_count);
                dec.table.register(id, type_ref.clone());

                dec.enter()?;
                let args = dec.read_type_args()?;
                dec.leave();
                type_ref.complete(args)?;

                Ok(Some(type_ref))
            }
        })
    }

    pub fn read_type_ref_list(&mut self) -> CodecResult<Option<TypeRefList>> {
        self.traced("TypeRefList", |dec| match dec.prepare_reusable()? {
            Slot::Null => Ok(None),
            Slot::Existing(list) => Ok(Some(list)),
            Slot::Fresh(id) => {
                let list: TypeRefList = dec.read_type_args()?.into();
                dec.table.register(id, list.clone());
                Ok(Some(list))
            }
        })
    }

    pub fn read_method_ref(&mut self) -> CodecResult<Option<MethodRef>> {
        self.traced("MethodRef", |dec| match dec.read_presence("method reference")? {
            true => dec.read_method_body().map(Some),
            false => Ok(None),
        })
    }

    pub fn read_field_ref(&mut self) -> CodecResult<Option<FieldRef>> {
        self.traced("FieldRef", |dec| match dec.read_presence("field reference")? {
            true => dec.read_field_body().map(Some),
            false => Ok(None),
        })
    }

    pub fn read_property_ref(&mut self) -> CodecResult<Option<PropertyRef>> {
        self.traced("PropertyRef", |dec| {
            match dec.read_presence("property reference")? {
                true => dec.read_property_body().map(Some),
                false => Ok(None),
            }
        })
    }

    pub fn read_constructor_ref(&mut self) -> CodecResult<Option<ConstructorRef>> {
        self.traced("ConstructorRef", |dec| {
            match dec.read_presence("constructor reference")? {
                true => dec.read_constructor_body().map(Some),
                false => Ok(None),
            }
        })
    }

    pub fn read_parameter_ref(&mut self) -> CodecResult<Option<ParameterRef>> {
        self.traced("ParameterRef", |dec| {
            match dec.read_presence("parameter reference")? {
                true => {
                    let (declaring_type, method_token) = dec.read_declared(TokenKind::MethodDef)?;
                    let index = dec.read_u8()?;

                    Ok(Some(ParameterRef {
                        declaring_type,
                        method_token,
                        index,
                    }))
                }
                false => Ok(None),
            }
        })
    }

    pub fn read_member_ref(&mut self) -> CodecResult<Option<MemberRef>> {
        self.traced("MemberRef", |dec| {
            let member = match dec.read_u8()? {
                REF_EMPTY => return Ok(None),
                MEMBER_CONSTRUCTOR => MemberRef::Constructor(dec.read_constructor_body()?),
                MEMBER_FIELD => MemberRef::Field(dec.read_field_body()?),
                MEMBER_PROPERTY => MemberRef::Property(dec.read_property_body()?),
                MEMBER_METHOD => MemberRef::Method(dec.read_method_body()?),
                tag => return Err(unknown_tag(tag, "member reference")),
            };

            Ok(Some(member))
        })
    }

    fn read_type_args(&mut self) -> CodecResult<Vec<TypeRef>> {
        self.read_list(|dec| {
            dec.read_type_ref()?
                .ok_or(CodecError::UnexpectedNull("type argument"))
        })
    }

    fn read_presence(&mut self, context: &'static str) -> CodecResult<bool> {
        match self.read_u8()? {
            REF_EMPTY => Ok(false),
            REF_PRESENT => Ok(true),
            tag => Err(unknown_tag(tag, context)),
        }
    }

    fn read_declared(&mut self, kind: TokenKind) -> CodecResult<(TypeRef, u32)> {
        let declaring_type = self
            .read_type_ref()?
            .ok_or(CodecError::UnexpectedNull("declaring type"))?;
        let token = self.read_metadata_token(kind)?;

        Ok((declaring_type, token))
    }

    fn read_method_body(&mut self) -> CodecResult<MethodRef> {
        let (declaring_type, metadata_token) = self.read_declared(TokenKind::MethodDef)?;
        let generic_arguments = self.read_type_args()?;

        Ok(MethodRef {
            declaring_type,
            metadata_token,
            generic_arguments,
        })
    }

    fn read_field_body(&mut self) -> CodecResult<FieldRef> {
        let (declaring_type, metadata_token) = self.read_declared(TokenKind::FieldDef)?;

        Ok(FieldRef {
            declaring_type,
            metadata_token,
        })
    }

    fn read_constructor_body(&mut self) -> CodecResult<ConstructorRef> {
        let (declaring_type, metadata_token) = self.read_declared(TokenKind::MethodDef)?;

        Ok(ConstructorRef {
            declaring_type,
            metadata_token,
        })
    }

    fn read_property_body(&mut self) -> CodecResult<PropertyRef> {
        let (declaring_type, metadata_token) = self.read_declared(TokenKind::Property)?;
        let getter = self.read_optional_token("property getter")?;
        let setter = self.read_optional_token("property setter")?;

        Ok(PropertyRef {
            declaring_type,
            metadata_token,
            getter,
            setter,
        })
    }

    fn read_optional_token(&mut self, context: &'static str) -> CodecResult<Option<u32>> {
        match self.read_presence(context)? {
            true => self.read_metadata_token(TokenKind::MethodDef).map(Some),
            false => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::rc::Rc;

    use super::*;

    fn assembly() -> AssemblyName {
        AssemblyName::new(
            "Contoso.Lib, Version=1.0.0.0",
            Some("file:///contoso.lib.dll".to_string()),
        )
    }

    fn simple(token: u32) -> TypeRef {
        TypeRef::new(assembly(), token, false, 0, vec![])
    }

    fn decoder(bytes: Vec<u8>) -> Decoder<'static, Cursor<Vec<u8>>> {
        Decoder::new(Cursor::new(bytes))
    }

    #[test]
    fn test_nested_generics_round_trip() {
        // Outer<Middle<Inner<Leaf>>, Leaf[]>
        let leaf = simple(0x0200_0001);
        let leaf_array = TypeRef::new(assembly(), 0x0200_0001, true, 0, vec![]);
        let inner = TypeRef::new(assembly(), 0x0200_0002, false, 1, vec![leaf.clone()]);
        let middle = TypeRef::new(assembly(), 0x0200_0003, false, 1, vec![inner]);
        let outer = TypeRef::new(assembly(), 0x0200_0004, false, 2, vec![middle, leaf_array]);

        let mut enc = Encoder::new(Vec::new());
        enc.write_type_ref(Some(&outer)).unwrap();
        enc.write_type_ref(None).unwrap();
        let bytes = enc.finish().unwrap();

        let mut dec = decoder(bytes);
        let decoded = dec.read_type_ref().unwrap().unwrap();
        assert_eq!(decoded, outer);
        assert_eq!(
            decoded.generic_arguments()[0].generic_arguments()[0].generic_arguments()[0],
            leaf
        );
        assert!(decoded.generic_arguments()[1].is_array());
        assert_eq!(dec.read_type_ref().unwrap(), None);
    }

    #[test]
    fn test_repeated_type_is_a_back_reference() {
        let ty = simple(0x0200_0007);

        let mut enc = Encoder::new(Vec::new());
        enc.write_type_ref(Some(&ty)).unwrap();
        let first = enc.position();
        enc.write_type_ref(Some(&ty)).unwrap();
        let second = enc.position() - first;
        let bytes = enc.finish().unwrap();

        assert!(second < first);
        assert_eq!(second, 1);

        let mut dec = decoder(bytes);
        let a = dec.read_type_ref().unwrap().unwrap();
        let b = dec.read_type_ref().unwrap().unwrap();
        assert_eq!(a, ty);
        assert!(TypeRef::ptr_eq(&a, &b));
    }

    #[test]
    fn test_self_referential_type() {
        let ty = TypeRef::new_pending(assembly(), 0x0200_0009, false, 1);
        ty.complete(vec![ty.clone()]).unwrap();

        let mut enc = Encoder::new(Vec::new());
        enc.write_type_ref(Some(&ty)).unwrap();
        let bytes = enc.finish().unwrap();

        let decoded = decoder(bytes).read_type_ref().unwrap().unwrap();
        assert_eq!(decoded.generic_arguments().len(), 1);
        assert!(TypeRef::ptr_eq(&decoded.generic_arguments()[0], &decoded));
        assert_eq!(decoded, ty);
    }

    /// Generic arguments nested far deeper than the stack could follow
    #[test]
    fn test_deeply_nested_generics_fail_cleanly() {
        // identity 1, assembly "A" as identity 2 holding segment 3, row 1, one argument
        let mut bytes = vec![1, 2, 1, 3, 1, b'A', 0, 1, 0, 1, 1];
        for level in 2..20_000_u64 {
            crate::varint::write_compressed_uint(&mut bytes, level + 2).unwrap();
            bytes.extend_from_slice(&[2, 1, 0, 1, 1]);
        }

        let err = decoder(bytes).read_type_ref().unwrap_err();
        assert!(matches!(err, CodecError::DepthLimitExceeded { .. }));
    }

    #[test]
    fn test_assembly_identity_written_once() {
        // a separately constructed but equal assembly name
        let arg = TypeRef::new(assembly(), 0x0200_0006, false, 0, vec![]);
        let ty = TypeRef::new(assembly(), 0x0200_0005, false, 1, vec![arg]);

        let mut enc = Encoder::new(Vec::new());
        enc.write_type_ref(Some(&ty)).unwrap();
        let interned = enc.interned();
        let bytes = enc.finish().unwrap();

        // two types, one assembly name, and the distinct segments
        // "Contoso", "Lib, Version=1", "0", "file:///contoso", "lib", "dll"
        assert_eq!(interned, 2 + 1 + 6);

        let decoded = decoder(bytes).read_type_ref().unwrap().unwrap();
        assert!(AssemblyName::ptr_eq(
            decoded.assembly(),
            decoded.generic_arguments()[0].assembly()
        ));
        assert_eq!(decoded.assembly().code_base(), Some("file:///contoso.lib.dll"));
    }

    #[test]
    fn test_member_kinds_round_trip() {
        let declaring = simple(0x0200_0010);
        let members = vec![
            None,
            Some(MemberRef::Constructor(ConstructorRef {
                declaring_type: declaring.clone(),
                metadata_token: 0x0600_0001,
            })),
            Some(MemberRef::Field(FieldRef {
                declaring_type: declaring.clone(),
                metadata_token: 0x0400_0002,
            })),
            Some(MemberRef::Property(PropertyRef {
                declaring_type: declaring.clone(),
                metadata_token: 0x1700_0003,
                getter: Some(0x0600_0004),
                setter: None,
            })),
            Some(MemberRef::Method(MethodRef {
                declaring_type: declaring.clone(),
                metadata_token: 0x0600_0005,
                generic_arguments: vec![simple(0x0200_0011)],
            })),
        ];
        let parameter = ParameterRef {
            declaring_type: declaring,
            method_token: 0x0600_0001,
            index: 2,
        };

        let mut enc = Encoder::new(Vec::new());
        enc.write_list(&members, |enc, m| enc.write_member_ref(m.as_ref()))
            .unwrap();
        enc.write_parameter_ref(Some(&parameter)).unwrap();
        enc.write_parameter_ref(None).unwrap();
        enc.write_field_ref(None).unwrap();
        let bytes = enc.finish().unwrap();

        let mut dec = decoder(bytes);
        assert_eq!(dec.read_list(|dec| dec.read_member_ref()).unwrap(), members);
        assert_eq!(dec.read_parameter_ref().unwrap(), Some(parameter));
        assert_eq!(dec.read_parameter_ref().unwrap(), None);
        assert_eq!(dec.read_field_ref().unwrap(), None);
    }

    #[test]
    fn test_standalone_refs_round_trip() {
        let declaring = simple(0x0200_0010);
        let method = MethodRef {
            declaring_type: declaring.clone(),
            metadata_token: 0x0600_0002,
            generic_arguments: vec![],
        };
        let property = PropertyRef {
            declaring_type: declaring.clone(),
            metadata_token: 0x1700_0001,
            getter: None,
            setter: Some(0x0600_0003),
        };
        let ctor = ConstructorRef {
            declaring_type: declaring,
            metadata_token: 0x0600_0004,
        };

        let mut enc = Encoder::new(Vec::new());
        enc.write_method_ref(Some(&method)).unwrap();
        enc.write_property_ref(Some(&property)).unwrap();
        enc.write_constructor_ref(Some(&ctor)).unwrap();
        enc.write_constructor_ref(None).unwrap();
        let bytes = enc.finish().unwrap();

        let mut dec = decoder(bytes);
        assert_eq!(dec.read_method_ref().unwrap(), Some(method));
        assert_eq!(dec.read_property_ref().unwrap(), Some(property));
        assert_eq!(dec.read_constructor_ref().unwrap(), Some(ctor));
        assert_eq!(dec.read_constructor_ref().unwrap(), None);
    }

    #[test]
    fn test_type_ref_list_is_interned() {
        let list: TypeRefList = Rc::from(vec![simple(0x0200_0001), simple(0x0200_0002)]);

        let mut enc = Encoder::new(Vec::new());
        enc.write_type_ref_list(Some(&list)).unwrap();
        enc.write_type_ref_list(Some(&list)).unwrap();
        enc.write_type_ref_list(None).unwrap();
        let bytes = enc.finish().unwrap();

        let mut dec = decoder(bytes);
        let a = dec.read_type_ref_list().unwrap().unwrap();
        let b = dec.read_type_ref_list().unwrap().unwrap();
        assert_eq!(a[..], list[..]);
        assert!(Rc::ptr_eq(&a, &b));
        assert_eq!(dec.read_type_ref_list().unwrap(), None);
    }

    #[test]
    fn test_bad_tokens_fail_before_writing() {
        let bad = simple(0x0600_0001);
        let mut enc = Encoder::new(Vec::new());

        assert!(matches!(
            enc.write_type_ref(Some(&bad)),
            Err(CodecError::TokenKindMismatch { .. })
        ));
        assert!(enc
            .write_field_ref(Some(&FieldRef {
                declaring_type: simple(0x0200_0001),
                metadata_token: 0x0600_0001,
            }))
            .is_err());
        assert!(enc
            .write_property_ref(Some(&PropertyRef {
                declaring_type: simple(0x0200_0001),
                metadata_token: 0x1700_0001,
                getter: Some(0x0400_0001),
                setter: None,
            }))
            .is_err());
        assert_eq!(enc.position(), 0);
    }

    #[test]
    fn test_unknown_member_tag() {
        let mut dec = decoder(vec![9]);
        assert!(matches!(
            dec.read_member_ref(),
            Err(CodecError::UnknownTag { tag: 9, .. })
        ));
    }
}
