//! Stream codec contexts.
//!
//! An [Encoder] owns a writable stream, a [Decoder] a readable one. Each owns the
//! interning table for its pass and is meant to be used for exactly one pass:
//! after an error the context must be dropped, since its table and stream
//! position no longer agree with the peer.
//!
//! The entry points for each kind of value live in the submodules, one per codec.

mod graph;
mod maps;
mod strings;
mod symbols;
mod values;

use std::io::{self, BufReader, BufWriter, Read, Write};

use crate::collab::{MetadataSubstitution, ObjectSerializer, TypeResolver};
use crate::consts::{self, MAX_LIST_LEN, MAX_NESTING};
use crate::err::{CodecError, CodecResult};
use crate::instrument::{Instrumentation, NoopInstrumentation};
use crate::intern::{Internable, ReadTable, Slot, WriteTable};
use crate::refs::TokenKind;
use crate::varint;

pub use graph::CacheGraph;

/// Collaborators wired into a context
#[derive(Clone, Copy)]
struct Services<'s> {
    resolver: Option<&'s dyn TypeResolver>,
    substitution: Option<&'s dyn MetadataSubstitution>,
    fallback: Option<&'s dyn ObjectSerializer>,
    instrumentation: &'s dyn Instrumentation,
}

impl Default for Services<'_> {
    fn default() -> Self {
        Self {
            resolver: None,
            substitution: None,
            fallback: None,
            instrumentation: &NoopInstrumentation,
        }
    }
}

impl<'s> Services<'s> {
    fn resolver(&self) -> CodecResult<&'s dyn TypeResolver> {
        self.resolver
            .ok_or(CodecError::MissingCollaborator("type resolver"))
    }

    fn fallback(&self) -> CodecResult<&'s dyn ObjectSerializer> {
        self.fallback
            .ok_or(CodecError::MissingCollaborator("fallback object serializer"))
    }
}

/// Builder methods shared by both directions
macro_rules! context_builders {
    ($ctx: ident, $stream: ident: $bound: path) => {
        impl<'s, $stream: $bound> $ctx<'s, $stream> {
            /// Use a type resolver for live-type values
            pub fn with_resolver(mut self, resolver: &'s dyn TypeResolver) -> Self {
                self.services.resolver = Some(resolver);
                self
            }

            /// Pass metadata maps through a substitution.
            ///
            /// Without one, maps are written and returned as they are.
            pub fn with_substitution(mut self, substitution: &'s dyn MetadataSubstitution) -> Self {
                self.services.substitution = Some(substitution);
                self
            }

            /// Use a serializer for opaque values
            pub fn with_fallback(mut self, fallback: &'s dyn ObjectSerializer) -> Self {
                self.services.fallback = Some(fallback);
                self
            }

            /// Report unit sizes to an instrumentation hook
            pub fn with_instrumentation(mut self, instrumentation: &'s dyn Instrumentation) -> Self {
                self.services.instrumentation = instrumentation;
                self
            }
        }
    };
}

/// Writes the cache format to a stream.
pub struct Encoder<'s, W: Write> {
    writer: BufWriter<CountingWriter<W>>,
    table: WriteTable,
    services: Services<'s>,
}

context_builders!(Encoder, W: Write);

impl<'s, W: Write> Encoder<'s, W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: BufWriter::new(CountingWriter::new(writer)),
            table: WriteTable::new(),
            services: Services::default(),
        }
    }

    /// Bytes written so far, buffered or not
    pub fn position(&self) -> u64 {
        self.writer.get_ref().count + self.writer.buffer().len() as u64
    }

    /// Number of objects interned so far
    pub fn interned(&self) -> usize {
        self.table.len()
    }

    /// Flush everything and hand back the stream.
    pub fn finish(self) -> CodecResult<W> {
        log::debug!(
            "encoder finished: {} bytes, {} interned objects",
            self.position(),
            self.table.len()
        );

        let counting = self
            .writer
            .into_inner()
            .map_err(|e| CodecError::Io(e.into_error()))?;

        Ok(counting.inner)
    }

    pub fn write_compressed_uint(&mut self, value: u64) -> CodecResult<()> {
        let mut buf = [0_u8; varint::MAX_COMPRESSED_BYTES];
        let len = varint::encode_compressed(value, &mut buf);
        self.write_bytes(&buf[..len])
    }

    /// Write a metadata token with its kind bits stripped.
    ///
    /// Fails without writing anything if the token is not of the given kind.
    pub fn write_metadata_token(&mut self, token: u32, kind: TokenKind) -> CodecResult<()> {
        let row = kind.compress(token)?;
        self.write_compressed_uint(row.into())
    }

    /// Write a list as a count followed by each element.
    pub fn write_list<T>(
        &mut self,
        items: &[T],
        mut write_item: impl FnMut(&mut Self, &T) -> CodecResult<()>,
    ) -> CodecResult<()> {
        self.write_count(items.len())?;
        for item in items {
            write_item(self, item)?;
        }

        Ok(())
    }

    fn write_count(&mut self, len: usize) -> CodecResult<()> {
        match len <= MAX_LIST_LEN {
            true => self.write_compressed_uint(len as u64),
            false => Err(CodecError::LengthLimitExceeded {
                len: len as u64,
                max: MAX_LIST_LEN,
            }),
        }
    }

    fn write_u8(&mut self, byte: u8) -> CodecResult<()> {
        self.write_bytes(&[byte])
    }

    fn write_bool(&mut self, value: bool) -> CodecResult<()> {
        self.write_u8(value as u8)
    }

    fn write_bytes(&mut self, bytes: &[u8]) -> CodecResult<()> {
        self.writer.write_all(bytes)?;
        Ok(())
    }

    /// Write the identity of a possibly interned object.
    ///
    /// Returns `true` if the object was seen for the first time and must be
    /// written in full next.
    fn prepare_reusable<T: Internable>(&mut self, value: Option<&T>) -> CodecResult<bool> {
        let (id, fresh) = self.table.prepare(value)?;
        self.write_compressed_uint(id.into())?;

        Ok(fresh)
    }

    /// Run `f` as one measured unit
    fn traced<T>(
        &mut self,
        unit: &'static str,
        f: impl FnOnce(&mut Self) -> CodecResult<T>,
    ) -> CodecResult<T> {
        let instrumentation = self.services.instrumentation;
        let start = self.position();

        instrumentation.start(unit);
        let res = f(self);
        instrumentation.stop(unit, self.position() - start);

        res
    }

    /// Flush buffered bytes and expose the stream for a direct write
    fn direct_writer(&mut self) -> CodecResult<&mut CountingWriter<W>> {
        self.writer.flush()?;
        Ok(self.writer.get_mut())
    }
}

/// Reads the cache format from a stream.
pub struct Decoder<'s, R: Read> {
    reader: CountingReader<BufReader<R>>,
    table: ReadTable,
    services: Services<'s>,
    depth: usize,
}

context_builders!(Decoder, R: Read);

impl<'s, R: Read> Decoder<'s, R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader: CountingReader::new(BufReader::new(reader)),
            table: ReadTable::new(),
            services: Services::default(),
            depth: 0,
        }
    }

    /// Bytes consumed so far
    pub fn position(&self) -> u64 {
        self.reader.count
    }

    /// Number of objects interned so far
    pub fn interned(&self) -> usize {
        self.table.len()
    }

    /// Hand back the stream, still wrapped in the buffer that read ahead of
    /// the decoder, so no bytes past the last value are lost.
    pub fn into_inner(self) -> BufReader<R> {
        log::debug!(
            "decoder finished: {} bytes, {} interned objects",
            self.position(),
            self.table.len()
        );

        self.reader.inner
    }

    pub fn read_compressed_uint(&mut self) -> CodecResult<u64> {
        varint::read_compressed_uint(&mut self.reader)
    }

    /// Read a metadata token of a known kind
    pub fn read_metadata_token(&mut self, kind: TokenKind) -> CodecResult<u32> {
        let row = self.read_compressed_uint()?;
        kind.expand(row)
    }

    /// Read a list written by [Encoder::write_list].
    ///
    /// Counts above the cap are rejected before any element is read.
    pub fn read_list<T>(
        &mut self,
        mut read_item: impl FnMut(&mut Self) -> CodecResult<T>,
    ) -> CodecResult<Vec<T>> {
        let len = self.read_count()?;
        let mut items = Vec::with_capacity(len);
        for _ in 0..len {
            items.push(read_item(self)?);
        }

        Ok(items)
    }

    fn read_count(&mut self) -> CodecResult<usize> {
        let len = self.read_compressed_uint()?;
        match len <= MAX_LIST_LEN as u64 {
            true => Ok(len as usize),
            false => {
                log::debug!("rejecting list of {} elements at byte {}", len, self.position());
                Err(CodecError::LengthLimitExceeded {
                    len,
                    max: MAX_LIST_LEN,
                })
            }
        }
    }

    fn read_compressed_u32(&mut self) -> CodecResult<u32> {
        let value = self.read_compressed_uint()?;
        u32::try_from(value).map_err(|_| CodecError::VarintOverflow)
    }

    fn read_u8(&mut self) -> CodecResult<u8> {
        Ok(self.read_array::<1>()?[0])
    }

    fn read_array<const N: usize>(&mut self) -> CodecResult<[u8; N]> {
        let mut buf = [0_u8; N];
        self.reader.read_exact(&mut buf)?;
        Ok(buf)
    }

    fn read_bool(&mut self) -> CodecResult<bool> {
        match self.read_u8()? {
            consts::REF_EMPTY => Ok(false),
            consts::REF_PRESENT => Ok(true),
            tag => Err(unknown_tag(tag, "flag")),
        }
    }

    /// Read exactly `len` bytes without trusting `len` for the allocation up front
    fn read_byte_buf(&mut self, len: u64) -> CodecResult<Vec<u8>> {
        let mut buf = Vec::new();
        (&mut self.reader).take(len).read_to_end(&mut buf)?;

        match buf.len() as u64 == len {
            true => Ok(buf),
            false => Err(CodecError::Io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "stream ended inside a byte run",
            ))),
        }
    }

    /// Go one level deeper into generic arguments or array items
    fn enter(&mut self) -> CodecResult<()> {
        match self.depth < MAX_NESTING {
            true => {
                self.depth += 1;
                Ok(())
            }
            false => {
                log::debug!(
                    "rejecting nesting past {} levels at byte {}",
                    MAX_NESTING,
                    self.position()
                );
                Err(CodecError::DepthLimitExceeded { max: MAX_NESTING })
            }
        }
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    /// Read the identity of a possibly interned object.
    fn prepare_reusable<T: Internable>(&mut self) -> CodecResult<Slot<T>> {
        let id = self.read_compressed_uint()?;
        self.table.resolve(id)
    }

    /// Run `f` as one measured unit
    fn traced<T>(
        &mut self,
        unit: &'static str,
        f: impl FnOnce(&mut Self) -> CodecResult<T>,
    ) -> CodecResult<T> {
        let instrumentation = self.services.instrumentation;
        let start = self.position();

        instrumentation.start(unit);
        let res = f(self);
        instrumentation.stop(unit, self.position() - start);

        res
    }
}

fn unknown_tag(tag: u8, context: &'static str) -> CodecError {
    log::debug!("unrecognized {} tag {:#04x}", context, tag);
    CodecError::UnknownTag { tag, context }
}

/// Counts bytes passing through to the inner writer
struct CountingWriter<W> {
    inner: W,
    count: u64,
}

impl<W> CountingWriter<W> {
    fn new(inner: W) -> Self {
        Self { inner, count: 0 }
    }
}

impl<W: Write> Write for CountingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let written = self.inner.write(buf)?;
        self.count += written as u64;
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Counts bytes read from the inner reader
struct CountingReader<R> {
    inner: R,
    count: u64,
}

impl<R> CountingReader<R> {
    fn new(inner: R) -> Self {
        Self { inner, count: 0 }
    }
}

impl<R: Read> Read for CountingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let read = self.inner.read(buf)?;
        self.count += read as u64;
        Ok(read)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::instrument::ByteCounter;

    #[test]
    fn test_primitives() {
        let mut enc = Encoder::new(Vec::new());
        enc.write_compressed_uint(300).unwrap();
        enc.write_metadata_token(0x0600_0010, TokenKind::MethodDef)
            .unwrap();
        enc.write_list(&[1_u64, 2, 3], |enc, v| enc.write_compressed_uint(*v))
            .unwrap();
        assert_eq!(enc.position(), 7);

        let bytes = enc.finish().unwrap();
        assert_eq!(bytes, vec![0xac, 0x02, 0x10, 3, 1, 2, 3]);

        let mut dec = Decoder::new(Cursor::new(bytes));
        assert_eq!(dec.read_compressed_uint().unwrap(), 300);
        assert_eq!(
            dec.read_metadata_token(TokenKind::MethodDef).unwrap(),
            0x0600_0010
        );
        let list = dec.read_list(|dec| dec.read_compressed_uint()).unwrap();
        assert_eq!(list, vec![1, 2, 3]);
        assert_eq!(dec.position(), 7);
    }

    #[test]
    fn test_token_mismatch_writes_nothing() {
        let mut enc = Encoder::new(Vec::new());
        let res = enc.write_metadata_token(0x0200_0001, TokenKind::FieldDef);

        assert!(matches!(res, Err(CodecError::TokenKindMismatch { .. })));
        assert_eq!(enc.position(), 0);
        assert!(enc.finish().unwrap().is_empty());
    }

    #[test]
    fn test_list_cap() {
        // 65536 elements claimed, nothing follows
        let mut bytes = Vec::new();
        varint::write_compressed_uint(&mut bytes, 65_536).unwrap();

        let mut dec = Decoder::new(Cursor::new(bytes));
        let res = dec.read_list(|dec| dec.read_u8());
        assert!(matches!(
            res,
            Err(CodecError::LengthLimitExceeded { len: 65_536, .. })
        ));

        let items = vec![0_u8; MAX_LIST_LEN + 1];
        let mut enc = Encoder::new(Vec::new());
        assert!(enc.write_list(&items, |enc, b| enc.write_u8(*b)).is_err());
        assert_eq!(enc.position(), 0);
    }

    #[test]
    fn test_truncated_byte_run() {
        let mut dec = Decoder::new(Cursor::new(vec![1_u8, 2]));
        assert!(matches!(dec.read_byte_buf(10), Err(CodecError::Io(_))));
    }

    #[test]
    fn test_into_inner_keeps_trailing_bytes() {
        let mut enc = Encoder::new(Vec::new());
        enc.write_compressed_uint(300).unwrap();
        let mut bytes = enc.finish().unwrap();
        bytes.extend_from_slice(b"trailer");

        let mut dec = Decoder::new(Cursor::new(bytes));
        assert_eq!(dec.read_compressed_uint().unwrap(), 300);

        // the buffer has read past the value by now
        let mut rest = Vec::new();
        dec.into_inner().read_to_end(&mut rest).unwrap();
        assert_eq!(rest, b"trailer");
    }

    #[test]
    fn test_units_are_measured() {
        let counter = ByteCounter::new();
        let mut enc = Encoder::new(Vec::new()).with_instrumentation(&counter);

        enc.traced("outer", |enc| {
            enc.write_u8(1)?;
            enc.traced("inner", |enc| enc.write_compressed_uint(1_000))
        })
        .unwrap();

        assert_eq!(counter.get("inner").map(|s| s.bytes), Some(2));
        assert_eq!(counter.get("outer").map(|s| s.bytes), Some(3));
        assert_eq!(enc.finish().unwrap().len(), 3);
    }
}
