//! Object interning for a single pass over a stream.
//!
//! The first occurrence of an object is assigned `table size + 1` and written in
//! full. Later occurrences are written as that identity alone. Identity 0 is null.
//!
//! Identities are shared across all interned kinds and only mean something
//! inside the stream that produced them.

use std::collections::HashMap;
use std::rc::Rc;

use crate::consts::NULL_IDENTITY;
use crate::err::{CodecError, CodecResult};
use crate::refs::{AssemblyName, TypeRef, TypeRefList};

/// Anything the table can hold
#[derive(Debug, Clone)]
pub enum Interned {
    Assembly(AssemblyName),
    Type(TypeRef),
    TypeList(TypeRefList),
    Segment(Rc<str>),
}

/// How repeat occurrences are detected on the write side
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum InternKey {
    /// Same allocation
    Identity(usize),
    /// Equal assembly names, whatever their allocation
    Assembly(AssemblyName),
}

/// Kinds of objects that can be interned.
///
/// Each kind picks its own equality through [Internable::intern_key].
pub trait Internable: Clone {
    /// Name used in errors
    const KIND: &'static str;

    fn intern_key(&self) -> InternKey;

    fn into_interned(self) -> Interned;

    fn from_interned(interned: &Interned) -> Option<Self>;
}

impl Internable for AssemblyName {
    const KIND: &'static str = "assembly name";

    fn intern_key(&self) -> InternKey {
        InternKey::Assembly(self.clone())
    }

    fn into_interned(self) -> Interned {
        Interned::Assembly(self)
    }

    fn from_interned(interned: &Interned) -> Option<Self> {
        match interned {
            Interned::Assembly(a) => Some(a.clone()),
            _ => None,
        }
    }
}

impl Internable for TypeRef {
    const KIND: &'static str = "type reference";

    fn intern_key(&self) -> InternKey {
        InternKey::Identity(self.addr())
    }

    fn into_interned(self) -> Interned {
        Interned::Type(self)
    }

    fn from_interned(interned: &Interned) -> Option<Self> {
        match interned {
            Interned::Type(t) => Some(t.clone()),
            _ => None,
        }
    }
}

impl Internable for TypeRefList {
    const KIND: &'static str = "type reference list";

    fn intern_key(&self) -> InternKey {
        InternKey::Identity(Rc::as_ptr(self) as *const () as usize)
    }

    fn into_interned(self) -> Interned {
        Interned::TypeList(self)
    }

    fn from_interned(interned: &Interned) -> Option<Self> {
        match interned {
            Interned::TypeList(l) => Some(l.clone()),
            _ => None,
        }
    }
}

/// Write-side table: object to identity.
#[derive(Debug, Default)]
pub struct WriteTable {
    objects: HashMap<InternKey, u32>,
    // strings have no identity of their own, segments are compared by content
    segments: HashMap<Rc<str>, u32>,
    // keeps identity-keyed objects alive so their addresses are not reused mid-pass
    retained: Vec<Interned>,
    len: u32,
}

impl WriteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of objects assigned an identity so far
    pub fn len(&self) -> usize {
        self.len as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Look up or assign the identity of an object.
    ///
    /// Returns the identity to write, and `true` if this is the first occurrence
    /// and the object must be written in full right after it.
    pub fn prepare<T: Internable>(&mut self, value: Option<&T>) -> CodecResult<(u32, bool)> {
        let value = match value {
            Some(v) => v,
            None => return Ok((NULL_IDENTITY, false)),
        };

        let key = value.intern_key();
        if let Some(&id) = self.objects.get(&key) {
            return Ok((id, false));
        }

        let id = self.next_id()?;
        self.objects.insert(key, id);
        self.retained.push(value.clone().into_interned());

        Ok((id, true))
    }

    /// [WriteTable::prepare] for string segments
    pub fn prepare_segment(&mut self, segment: &str) -> CodecResult<(u32, bool)> {
        if let Some(&id) = self.segments.get(segment) {
            return Ok((id, false));
        }

        let id = self.next_id()?;
        self.segments.insert(segment.into(), id);

        Ok((id, true))
    }

    fn next_id(&mut self) -> CodecResult<u32> {
        self.len = self
            .len
            .checked_add(1)
            .ok_or(CodecError::LengthLimitExceeded {
                len: u64::from(u32::MAX) + 1,
                max: u32::MAX as usize,
            })?;

        Ok(self.len)
    }
}

/// Outcome of looking up an identity on the read side
#[derive(Debug)]
pub enum Slot<T> {
    /// Identity 0
    Null,
    /// First occurrence. The caller reads the object and registers it under this identity.
    Fresh(u32),
    /// Back-reference to an object already read
    Existing(T),
}

/// Read-side table: identity to object.
///
/// A fresh identity is reserved as soon as it is seen, so identities handed out
/// while its object is still being read line up with the writer's numbering.
#[derive(Debug, Default)]
pub struct ReadTable {
    slots: Vec<Option<Interned>>,
}

impl ReadTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Interpret an identity read from the stream.
    pub fn resolve<T: Internable>(&mut self, id: u64) -> CodecResult<Slot<T>> {
        self.resolve_with(id, T::KIND, T::from_interned)
    }

    /// [ReadTable::resolve] for string segments
    pub fn resolve_segment(&mut self, id: u64) -> CodecResult<Slot<Rc<str>>> {
        self.resolve_with(id, "string segment", |interned| match interned {
            Interned::Segment(s) => Some(s.clone()),
            _ => None,
        })
    }

    fn resolve_with<T>(
        &mut self,
        id: u64,
        kind: &'static str,
        extract: impl FnOnce(&Interned) -> Option<T>,
    ) -> CodecResult<Slot<T>> {
        let table_size = self.slots.len();
        let invalid = || CodecError::InvalidIdentity { id, table_size };

        if id == u64::from(NULL_IDENTITY) {
            return Ok(Slot::Null);
        }
        if id == table_size as u64 + 1 {
            let id = u32::try_from(id).map_err(|_| invalid())?;
            self.slots.push(None);
            return Ok(Slot::Fresh(id));
        }

        // existing identities are at most `table_size`, which fits in u32
        match self.slots.get((id - 1) as usize) {
            Some(Some(interned)) => {
                extract(interned)
                    .map(Slot::Existing)
                    .ok_or(CodecError::IdentityKindMismatch {
                        id: id as u32,
                        expected: kind,
                    })
            }
            // reserved but still being read, or never assigned
            _ => Err(invalid()),
        }
    }

    /// Store the object read for a fresh identity.
    pub fn register<T: Internable>(&mut self, id: u32, value: T) {
        self.fill(id, value.into_interned());
    }

    pub fn register_segment(&mut self, id: u32, segment: Rc<str>) {
        self.fill(id, Interned::Segment(segment));
    }

    fn fill(&mut self, id: u32, interned: Interned) {
        match (id as usize).checked_sub(1).and_then(|i| self.slots.get_mut(i)) {
            Some(slot) => *slot = Some(interned),
            None => log::warn!("registering unreserved object identity {}", id),
        }
    }
}
