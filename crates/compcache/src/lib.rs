//! Composition cache codec.
//!
//! Re-exports the stream codec and adds the collaborators most hosts need.

pub mod substitution;

pub use compcache_core::{
    collab, consts, fallback, instrument, metadata, refs, ser_de, value, varint, AssemblyName,
    BoxError, ByteCounter, CacheGraph, CodecError, CodecResult, ConstructorRef, CreationPolicy,
    Decoder, Encoder, FallbackError, FallbackRegistry, FieldRef, Instrumentation, LiveType,
    MemberRef, MetadataMap, MetadataSubstitution, MethodRef, ObjectSerializer, OpaqueObject,
    OpaqueValue, ParameterRef, PassThroughSubstitution, PropertyRef, ResolvedType, TokenKind,
    TypeRef, TypeRefList, TypeResolver, UnitStats, Value,
};
pub use substitution::TypeHandleSubstitution;
pub use uuid::Uuid;

/// Default constants shared by writers and readers of a cache.
pub mod defaults {
    pub use compcache_core::consts::{
        FALLBACK_FORMAT_VERSION, MAX_LIST_LEN, NULL_IDENTITY, SEGMENT_SEPARATOR,
    };

    /// Type proxies are left unresolved after a read unless asked otherwise
    pub const DEFAULT_RESOLVE_EAGERLY: bool = false;
}
