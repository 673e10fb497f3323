//! Metadata values and the handles they carry.

use std::any::Any;
use std::fmt::{self, Debug};
use std::rc::Rc;

use uuid::Uuid;

use crate::refs::{TypeRef, TypeRefList};

/// How instances of a part are shared between importers.
///
/// Written as a single byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum CreationPolicy {
    #[default]
    Any = 0,
    Shared = 1,
    NonShared = 2,
}

impl TryFrom<u8> for CreationPolicy {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Any),
            1 => Ok(Self::Shared),
            2 => Ok(Self::NonShared),
            other => Err(other),
        }
    }
}

/// A type as loaded by the hosting type system.
///
/// Hosts implement this for their own handles and recover them with
/// [LiveType::as_any] inside their [crate::TypeResolver].
pub trait LiveType: Debug {
    /// Assembly-qualified name, which identifies the type across handles
    fn full_name(&self) -> &str;

    fn as_any(&self) -> &dyn Any;
}

/// A shared, resolved type handle.
///
/// Two handles are equal when they name the same type.
#[derive(Clone)]
pub struct ResolvedType(Rc<dyn LiveType>);

impl ResolvedType {
    pub fn new<T: LiveType + 'static>(live: T) -> Self {
        Self(Rc::new(live))
    }

    pub fn full_name(&self) -> &str {
        self.0.full_name()
    }

    /// Downcast to the host's handle type
    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        self.0.as_any().downcast_ref()
    }
}

impl PartialEq for ResolvedType {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0) || self.full_name() == other.full_name()
    }
}

impl Debug for ResolvedType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ResolvedType").field(&self.full_name()).finish()
    }
}

/// Objects carried by [Value::Opaque].
///
/// Implemented for every `'static` type with `Debug` and `PartialEq`.
pub trait OpaqueObject: Any + Debug {
    fn as_any(&self) -> &dyn Any;

    fn eq_object(&self, other: &dyn OpaqueObject) -> bool;
}

impl<T: Any + Debug + PartialEq> OpaqueObject for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn eq_object(&self, other: &dyn OpaqueObject) -> bool {
        other.as_any().downcast_ref::<T>() == Some(self)
    }
}

/// A value the codec does not understand, tagged with its registered type name.
#[derive(Clone)]
pub struct OpaqueValue {
    type_name: Rc<str>,
    object: Rc<dyn OpaqueObject>,
}

impl OpaqueValue {
    pub fn new<T: OpaqueObject>(type_name: &str, object: T) -> Self {
        Self {
            type_name: type_name.into(),
            object: Rc::new(object),
        }
    }

    /// Wrap an already shared object
    pub fn from_shared(type_name: &str, object: Rc<dyn OpaqueObject>) -> Self {
        Self {
            type_name: type_name.into(),
            object,
        }
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn object(&self) -> &dyn OpaqueObject {
        self.object.as_ref()
    }

    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        self.object.as_ref().as_any().downcast_ref()
    }
}

impl PartialEq for OpaqueValue {
    fn eq(&self, other: &Self) -> bool {
        self.type_name == other.type_name && self.object.eq_object(other.object.as_ref())
    }
}

impl Debug for OpaqueValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpaqueValue")
            .field("type_name", &self.type_name)
            .field("object", &self.object)
            .finish()
    }
}

/// A metadata value.
///
/// Each variant maps to exactly one tag byte on the wire, except
/// [Value::Bool] which uses one tag per state.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    String(String),
    CreationPolicy(CreationPolicy),

    /// A live type, resolved on read
    Type(ResolvedType),

    /// An array whose element type is resolved on read
    Array {
        element_type: ResolvedType,
        items: Vec<Value>,
    },

    Bool(bool),
    Int32(i32),
    Char(char),
    Guid(Uuid),

    /// A type kept as a handle, never resolved by the codec
    TypeRef(TypeRef),

    /// Proxy for an enum value: the enum's type and its raw representation
    EnumSubstitution { enum_type: TypeRef, raw_value: i32 },

    /// Proxy for a live type
    TypeSubstitution(TypeRef),

    /// Proxy for an array of live types
    TypeArraySubstitution(TypeRefList),

    /// Anything else, handed to the fallback serializer
    Opaque(OpaqueValue),
}

impl Value {
    /// Short name of the variant, used in logs
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::String(_) => "string",
            Self::CreationPolicy(_) => "creation policy",
            Self::Type(_) => "type",
            Self::Array { .. } => "array",
            Self::Bool(_) => "bool",
            Self::Int32(_) => "int32",
            Self::Char(_) => "char",
            Self::Guid(_) => "guid",
            Self::TypeRef(_) => "type ref",
            Self::EnumSubstitution { .. } => "enum substitution",
            Self::TypeSubstitution(_) => "type substitution",
            Self::TypeArraySubstitution(_) => "type array substitution",
            Self::Opaque(_) => "opaque",
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::String(value.to_owned())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::Int32(value)
    }
}

impl From<char> for Value {
    fn from(value: char) -> Self {
        Self::Char(value)
    }
}

impl From<Uuid> for Value {
    fn from(value: Uuid) -> Self {
        Self::Guid(value)
    }
}

impl From<CreationPolicy> for Value {
    fn from(value: CreationPolicy) -> Self {
        Self::CreationPolicy(value)
    }
}
