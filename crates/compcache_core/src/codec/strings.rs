//! Strings, split into interned segments.
//!
//! A string is written as its segment count followed by each segment. A count
//! of 0 is a null string; `""` is one empty segment. Qualified names share most
//! of their segments, so each segment is interned on its own.

use std::io::{Read, Write};
use std::rc::Rc;

use super::{Decoder, Encoder};
use crate::consts::SEGMENT_SEPARATOR;
use crate::err::{CodecError, CodecResult};
use crate::intern::Slot;

impl<'s, W: Write> Encoder<'s, W> {
    /// Write a possibly null string.
    pub fn write_string(&mut self, value: Option<&str>) -> CodecResult<()> {
        self.traced("String", |enc| {
            let value = match value {
                Some(v) => v,
                None => return enc.write_compressed_uint(0),
            };

            let segments = value.split(SEGMENT_SEPARATOR).count();
            enc.write_count(segments)?;

            for segment in value.split(SEGMENT_SEPARATOR) {
                enc.write_segment(segment)?;
            }

            Ok(())
        })
    }

    fn write_segment(&mut self, segment: &str) -> CodecResult<()> {
        let (id, fresh) = self.table.prepare_segment(segment)?;
        self.write_compressed_uint(id.into())?;

        if fresh {
            self.write_compressed_uint(segment.len() as u64)?;
            self.write_bytes(segment.as_bytes())?;
        }

        Ok(())
    }
}

impl<'s, R: Read> Decoder<'s, R> {
    /// Read a possibly null string.
    pub fn read_string(&mut self) -> CodecResult<Option<String>> {
        self.traced("String", |dec| {
            let count = dec.read_count()?;
            if count == 0 {
                return Ok(None);
            }

            let mut value = String::new();
            for i in 0..count {
                if i > 0 {
                    value.push(SEGMENT_SEPARATOR);
                }
                value.push_str(&dec.read_segment()?);
            }

            Ok(Some(value))
        })
    }

    fn read_segment(&mut self) -> CodecResult<Rc<str>> {
        let id = self.read_compressed_uint()?;

        match self.table.resolve_segment(id)? {
            Slot::Existing(segment) => Ok(segment),
            Slot::Fresh(id) => {
                let len = self.read_compressed_uint()?;
                let bytes = self.read_byte_buf(len)?;
                let segment: Rc<str> = String::from_utf8(bytes)
                    .map_err(|_| CodecError::InvalidUtf8)?
                    .into();

                self.table.register_segment(id, segment.clone());
                Ok(segment)
            }
            Slot::Null => Err(CodecError::UnexpectedNull("string segment")),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    fn round_trip(values: &[Option<&str>]) -> (Vec<Option<String>>, Vec<u8>) {
        let mut enc = Encoder::new(Vec::new());
        for v in values {
            enc.write_string(*v).unwrap();
        }
        let bytes = enc.finish().unwrap();

        let mut dec = Decoder::new(Cursor::new(bytes.clone()));
        let decoded = values.iter().map(|_| dec.read_string().unwrap()).collect();

        (decoded, bytes)
    }

    #[test]
    fn test_null_and_empty() {
        let (decoded, bytes) = round_trip(&[None, Some("")]);
        assert_eq!(decoded, vec![None, Some(String::new())]);

        // null: count 0. empty: count 1, segment identity 1, length 0
        assert_eq!(bytes, vec![0, 1, 1, 0]);
    }

    #[test]
    fn test_segments_are_shared() {
        let values = [
            Some("System.Collections.Generic.List"),
            Some("System.Collections.Generic.Dictionary"),
            Some("a..b."),
            Some("héllo wörld 👏"),
        ];
        let (decoded, bytes) = round_trip(&values);

        let expected = values
            .iter()
            .map(|v| v.map(str::to_owned))
            .collect::<Vec<_>>();
        assert_eq!(decoded, expected);

        // the second name only spells out "Dictionary"
        let mut enc = Encoder::new(Vec::new());
        enc.write_string(values[0]).unwrap();
        let first = enc.position();
        enc.write_string(values[1]).unwrap();
        let second = enc.position() - first;
        assert!(second < first);
        assert!(bytes.len() as u64 > first + second);
    }

    #[test]
    fn test_invalid_utf8() {
        // one segment, fresh identity 1, two bytes of garbage
        let bytes = vec![1, 1, 2, 0xc3, 0x28];
        let mut dec = Decoder::new(Cursor::new(bytes));

        assert!(matches!(dec.read_string(), Err(CodecError::InvalidUtf8)));
    }

    #[test]
    fn test_null_segment_identity() {
        let bytes = vec![1, 0];
        let mut dec = Decoder::new(Cursor::new(bytes));

        assert!(matches!(
            dec.read_string(),
            Err(CodecError::UnexpectedNull(_))
        ));
    }
}
