//! Metadata maps.
//!
//! The substitution collaborator sees every map on its way in and out; the
//! codec only sequences those calls around the entries.

use std::borrow::Cow;
use std::collections::HashSet;
use std::io::{Read, Write};

use super::{Decoder, Encoder};
use crate::err::{CodecError, CodecResult};
use crate::metadata::MetadataMap;

impl<'s, W: Write> Encoder<'s, W> {
    /// Write a metadata map as a count followed by key/value pairs.
    pub fn write_metadata(&mut self, metadata: &MetadataMap) -> CodecResult<()> {
        self.traced("Metadata", |enc| {
            let metadata = match enc.services.substitution {
                Some(substitution) => Cow::Owned(
                    substitution
                        .substitute_for_write(metadata)
                        .map_err(CodecError::Collaborator)?,
                ),
                None => Cow::Borrowed(metadata),
            };

            enc.write_list(metadata.entries(), |enc, (key, value)| {
                enc.write_string(Some(key.as_str()))?;
                enc.write_value(value)
            })
        })
    }
}

impl<'s, R: Read> Decoder<'s, R> {
    /// Read a metadata map written by [Encoder::write_metadata].
    ///
    /// A key appearing twice is a format error.
    pub fn read_metadata(&mut self) -> CodecResult<MetadataMap> {
        self.traced("Metadata", |dec| {
            let mut keys = HashSet::new();
            let entries = dec.read_list(|dec| {
                let key = dec
                    .read_string()?
                    .ok_or(CodecError::UnexpectedNull("metadata key"))?;
                if !keys.insert(key.clone()) {
                    return Err(CodecError::DuplicateKey(key));
                }
                let value = dec.read_value()?;

                Ok((key, value))
            })?;

            let metadata = MetadataMap::from_distinct(entries);
            match dec.services.substitution {
                Some(substitution) => substitution
                    .restore_after_read(metadata)
                    .map_err(CodecError::Collaborator),
                None => Ok(metadata),
            }
        })
    }
}
