//! The root value of a cache stream.

use std::io::{Read, Write};

use super::{Decoder, Encoder};
use crate::err::{CodecError, CodecResult};
use crate::metadata::MetadataMap;
use crate::refs::{MemberRef, TypeRef};

/// Everything a discovery pass produced, in the shape it is cached in.
///
/// All three lists share one interning table, so a type named by a member
/// and by the type list is written once.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CacheGraph {
    /// Members parts import or export through. Entries may be empty.
    pub members: Vec<Option<MemberRef>>,
    /// Part types
    pub types: Vec<TypeRef>,
    /// Metadata of each import and export
    pub metadata: Vec<MetadataMap>,
}

impl<'s, W: Write> Encoder<'s, W> {
    /// Write a whole graph: members, then types, then metadata maps.
    pub fn write_graph(&mut self, graph: &CacheGraph) -> CodecResult<()> {
        self.traced("Graph", |enc| {
            enc.write_list(&graph.members, |enc, m| enc.write_member_ref(m.as_ref()))?;
            enc.write_list(&graph.types, |enc, t| enc.write_type_ref(Some(t)))?;
            enc.write_list(&graph.metadata, |enc, m| enc.write_metadata(m))
        })?;

        log::debug!(
            "wrote graph of {} members, {} types, {} metadata maps in {} bytes",
            graph.members.len(),
            graph.types.len(),
            graph.metadata.len(),
            self.position()
        );

        Ok(())
    }
}

impl<'s, R: Read> Decoder<'s, R> {
    /// Read a graph written by [Encoder::write_graph].
    pub fn read_graph(&mut self) -> CodecResult<CacheGraph> {
        self.traced("Graph", |dec| {
            let members = dec.read_list(|dec| dec.read_member_ref())?;
            let types = dec.read_list(|dec| {
                dec.read_type_ref()?
                    .ok_or(CodecError::UnexpectedNull("part type"))
            })?;
            let metadata = dec.read_list(|dec| dec.read_metadata())?;

            Ok(CacheGraph {
                members,
                types,
                metadata,
            })
        })
    }
}
