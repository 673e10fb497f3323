//! Collaborators the codec calls into but does not implement.
//!
//! They are handed to an [crate::Encoder] or [crate::Decoder] at construction time.
//! Any error they return aborts the pass and reaches the caller unchanged,
//! wrapped in [crate::CodecError::Collaborator].

use std::io::{Read, Write};

use crate::err::BoxError;
use crate::metadata::MetadataMap;
use crate::refs::TypeRef;
use crate::value::{OpaqueValue, ResolvedType};

/// Maps between symbolic type references and live types of the hosting type system.
///
/// Only the live-type and array element type values call into the resolver.
pub trait TypeResolver {
    /// Load the type a reference describes
    fn resolve(&self, type_ref: &TypeRef) -> Result<ResolvedType, BoxError>;

    /// Describe a live type as a symbolic reference
    fn get(&self, resolved: &ResolvedType) -> Result<TypeRef, BoxError>;
}

/// Swaps heavyweight metadata values for lightweight proxies around a pass.
pub trait MetadataSubstitution {
    /// Called on every metadata map right before it is written
    fn substitute_for_write(&self, metadata: &MetadataMap) -> Result<MetadataMap, BoxError>;

    /// Called on every metadata map right after it is read
    fn restore_after_read(&self, metadata: MetadataMap) -> Result<MetadataMap, BoxError>;
}

/// Serializes values the codec has no encoding for.
///
/// The implementation owns its wire format entirely. It writes to and reads from
/// the underlying stream directly and must consume exactly what it wrote.
pub trait ObjectSerializer {
    fn serialize(&self, stream: &mut dyn Write, value: &OpaqueValue) -> Result<(), BoxError>;

    fn deserialize(&self, stream: &mut dyn Read) -> Result<OpaqueValue, BoxError>;
}

/// The identity substitution. Maps are written and returned as they are.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassThroughSubstitution;

impl MetadataSubstitution for PassThroughSubstitution {
    fn substitute_for_write(&self, metadata: &MetadataMap) -> Result<MetadataMap, BoxError> {
        Ok(metadata.clone())
    }

    fn restore_after_read(&self, metadata: MetadataMap) -> Result<MetadataMap, BoxError> {
        Ok(metadata)
    }
}
