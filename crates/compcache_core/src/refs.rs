//! Symbolic references into an external type system.
//!
//! None of these types resolve anything. They carry just enough information
//! (assembly, metadata token, shape) for a host to resolve them on demand.
//! An empty reference is expressed as `None` by every entry point.

mod token;

use std::cell::OnceCell;
use std::fmt::{self, Debug};
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use crate::err::{CodecError, CodecResult};

pub use token::{TokenKind, TOKEN_KIND_MASK};

/// Identity of an assembly: its full name and where it was loaded from.
///
/// Cloning is cheap and clones share the same allocation.
/// Equality compares the contents, so separately constructed names
/// describing the same assembly are interchangeable.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct AssemblyName(Rc<AssemblyNameData>);

#[derive(PartialEq, Eq, Hash)]
struct AssemblyNameData {
    full_name: String,
    code_base: Option<String>,
}

impl AssemblyName {
    pub fn new(full_name: impl Into<String>, code_base: Option<String>) -> Self {
        Self(Rc::new(AssemblyNameData {
            full_name: full_name.into(),
            code_base,
        }))
    }

    pub fn full_name(&self) -> &str {
        &self.0.full_name
    }

    pub fn code_base(&self) -> Option<&str> {
        self.0.code_base.as_deref()
    }

    /// Returns `true` if both names are the same allocation.
    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        Rc::ptr_eq(&a.0, &b.0)
    }
}

impl Debug for AssemblyName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("AssemblyName")
            .field(&self.0.full_name)
            .field(&self.0.code_base)
            .finish()
    }
}

/// A reference to a type definition.
///
/// Type references are shared handles: cloning yields the same object, and the
/// codec writes a repeated handle as a back-reference. Generic arguments may
/// refer back to the type itself, which is why they can be supplied after
/// construction with [TypeRef::complete].
#[derive(Clone)]
pub struct TypeRef(Rc<TypeRefData>);

struct TypeRefData {
    assembly: AssemblyName,
    metadata_token: u32,
    is_array: bool,
    generic_parameter_count: u32,
    generic_arguments: OnceCell<Box<[TypeRef]>>,
}

impl TypeRef {
    /// Create a fully constructed type reference.
    pub fn new(
        assembly: AssemblyName,
        metadata_token: u32,
        is_array: bool,
        generic_parameter_count: u32,
        generic_arguments: Vec<TypeRef>,
    ) -> Self {
        let type_ref = Self::new_pending(assembly, metadata_token, is_array, generic_parameter_count);
        let _ = type_ref.0.generic_arguments.set(generic_arguments.into());

        type_ref
    }

    /// Create a type reference whose generic arguments are supplied later.
    ///
    /// Until [TypeRef::complete] is called the reference reports no generic arguments.
    pub fn new_pending(
        assembly: AssemblyName,
        metadata_token: u32,
        is_array: bool,
        generic_parameter_count: u32,
    ) -> Self {
        Self(Rc::new(TypeRefData {
            assembly,
            metadata_token,
            is_array,
            generic_parameter_count,
            generic_arguments: OnceCell::new(),
        }))
    }

    /// Supply the generic arguments of a pending reference.
    ///
    /// The arguments may contain `self`. Such a reference keeps itself alive
    /// and is never freed.
    pub fn complete(&self, generic_arguments: Vec<TypeRef>) -> CodecResult<()> {
        self.0
            .generic_arguments
            .set(generic_arguments.into())
            .map_err(|_| CodecError::AlreadyInitialized)
    }

    pub fn assembly(&self) -> &AssemblyName {
        &self.0.assembly
    }

    pub fn metadata_token(&self) -> u32 {
        self.0.metadata_token
    }

    pub fn is_array(&self) -> bool {
        self.0.is_array
    }

    pub fn generic_parameter_count(&self) -> u32 {
        self.0.generic_parameter_count
    }

    pub fn generic_arguments(&self) -> &[TypeRef] {
        self.0.generic_arguments.get().map(|a| &a[..]).unwrap_or(&[])
    }

    /// Returns `true` if both handles point to the same object.
    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        Rc::ptr_eq(&a.0, &b.0)
    }

    /// Address of the shared object, used as its identity
    pub(crate) fn addr(&self) -> usize {
        Rc::as_ptr(&self.0) as usize
    }

    /// Structural equality that treats a pair already under comparison as equal,
    /// so self-referential generics terminate.
    fn eq_guarded(&self, other: &Self, visiting: &mut Vec<(usize, usize)>) -> bool {
        if Self::ptr_eq(self, other) {
            return true;
        }

        let pair = (self.addr(), other.addr());
        if visiting.contains(&pair) {
            return true;
        }

        let (a, b) = (self.generic_arguments(), other.generic_arguments());
        let shallow_eq = self.assembly() == other.assembly()
            && self.metadata_token() == other.metadata_token()
            && self.is_array() == other.is_array()
            && self.generic_parameter_count() == other.generic_parameter_count()
            && a.len() == b.len();

        if !shallow_eq {
            return false;
        }

        visiting.push(pair);
        let eq = a.iter().zip(b).all(|(x, y)| x.eq_guarded(y, visiting));
        visiting.pop();

        eq
    }
}

impl PartialEq for TypeRef {
    fn eq(&self, other: &Self) -> bool {
        self.eq_guarded(other, &mut Vec::new())
    }
}

impl Eq for TypeRef {}

// generic arguments are left out so hashing never recurses
impl Hash for TypeRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.assembly().hash(state);
        self.metadata_token().hash(state);
        self.is_array().hash(state);
        self.generic_parameter_count().hash(state);
    }
}

impl Debug for TypeRef {
    // generic arguments are printed by token only, a full print could recurse forever
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let args = self
            .generic_arguments()
            .iter()
            .map(|a| format!("{:#010x}", a.metadata_token()))
            .collect::<Vec<_>>();

        f.debug_struct("TypeRef")
            .field("assembly", &self.assembly().full_name())
            .field("metadata_token", &format_args!("{:#010x}", self.metadata_token()))
            .field("is_array", &self.is_array())
            .field("generic_parameter_count", &self.generic_parameter_count())
            .field("generic_arguments", &args)
            .finish()
    }
}

/// A shared list of type references. Interned by identity.
pub type TypeRefList = Rc<[TypeRef]>;

/// A reference to a method definition
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodRef {
    pub declaring_type: TypeRef,
    /// `MethodDef` token
    pub metadata_token: u32,
    pub generic_arguments: Vec<TypeRef>,
}

/// A reference to a field definition
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldRef {
    pub declaring_type: TypeRef,
    /// `FieldDef` token
    pub metadata_token: u32,
}

/// A reference to a property and its accessors
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PropertyRef {
    pub declaring_type: TypeRef,
    /// `Property` token
    pub metadata_token: u32,
    /// `MethodDef` token of the getter
    pub getter: Option<u32>,
    /// `MethodDef` token of the setter
    pub setter: Option<u32>,
}

/// A reference to a constructor
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConstructorRef {
    pub declaring_type: TypeRef,
    /// `MethodDef` token
    pub metadata_token: u32,
}

/// A reference to one parameter of a method
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ParameterRef {
    pub declaring_type: TypeRef,
    /// `MethodDef` token of the owning method
    pub method_token: u32,
    /// Zero-based position in the parameter list
    pub index: u8,
}

/// Any member a composition part can import or export through
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MemberRef {
    Constructor(ConstructorRef),
    Field(FieldRef),
    Property(PropertyRef),
    Method(MethodRef),
}

impl MemberRef {
    /// The type declaring this member
    pub fn declaring_type(&self) -> &TypeRef {
        match self {
            Self::Constructor(c) => &c.declaring_type,
            Self::Field(f) => &f.declaring_type,
            Self::Property(p) => &p.declaring_type,
            Self::Method(m) => &m.declaring_type,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::hash_map::DefaultHasher;

    use super::*;

    fn assembly() -> AssemblyName {
        AssemblyName::new("Lib, Version=1.0.0.0", None)
    }

    fn hash_of<T: Hash>(t: &T) -> u64 {
        let mut h = DefaultHasher::new();
        t.hash(&mut h);
        h.finish()
    }

    #[test]
    fn test_assembly_name_value_equality() {
        let a = AssemblyName::new("Lib", Some("file:///lib.dll".to_string()));
        let b = AssemblyName::new("Lib", Some("file:///lib.dll".to_string()));

        assert_eq!(a, b);
        assert!(!AssemblyName::ptr_eq(&a, &b));
        assert_eq!(hash_of(&a), hash_of(&b));
        assert_ne!(a, AssemblyName::new("Lib", None));
    }

    #[test]
    fn test_structural_equality() {
        let arg = TypeRef::new(assembly(), 0x0200_0002, false, 0, vec![]);
        let a = TypeRef::new(assembly(), 0x0200_0001, false, 1, vec![arg.clone()]);
        let b = TypeRef::new(
            assembly(),
            0x0200_0001,
            false,
            1,
            vec![TypeRef::new(assembly(), 0x0200_0002, false, 0, vec![])],
        );
        let c = TypeRef::new(assembly(), 0x0200_0001, true, 1, vec![arg]);

        assert_eq!(a, b);
        assert!(!TypeRef::ptr_eq(&a, &b));
        assert_eq!(hash_of(&a), hash_of(&b));
        assert_ne!(a, c);
    }

    #[test]
    fn test_self_referential_equality_terminates() {
        let a = TypeRef::new_pending(assembly(), 0x0200_0003, false, 1);
        a.complete(vec![a.clone()]).unwrap();
        let b = TypeRef::new_pending(assembly(), 0x0200_0003, false, 1);
        b.complete(vec![b.clone()]).unwrap();

        assert_eq!(a, b);
        assert!(TypeRef::ptr_eq(&a.generic_arguments()[0], &a));
        assert!(format!("{:?}", a).contains("0x02000003"));
    }

    #[test]
    fn test_complete_only_once() {
        let a = TypeRef::new_pending(assembly(), 0x0200_0003, false, 0);
        assert!(a.generic_arguments().is_empty());
        a.complete(vec![]).unwrap();
        assert!(matches!(
            a.complete(vec![]),
            Err(CodecError::AlreadyInitialized)
        ));

        let b = TypeRef::new(assembly(), 0x0200_0004, false, 0, vec![]);
        assert!(b.complete(vec![]).is_err());
    }

    #[test]
    fn test_member_declaring_type() {
        let ty = TypeRef::new(assembly(), 0x0200_0001, false, 0, vec![]);
        let member = MemberRef::Field(FieldRef {
            declaring_type: ty.clone(),
            metadata_token: 0x0400_0001,
        });

        assert!(TypeRef::ptr_eq(member.declaring_type(), &ty));
    }
}
