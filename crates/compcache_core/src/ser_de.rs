//! Compact binary format for serde.
//!
//! Every value carries a one byte type prefix, integers and lengths are
//! compressed, and collections are delimited. Structs are written as the
//! sequence of their field values, so both sides must agree on field order.
//! The registered fallback serializer uses this format for its payloads.

mod consts;
mod de;
mod err;
mod ser;

use serde::{Deserialize, Serialize};

pub use de::CompactDeserializer;
pub use err::{Error, SerDeResult};
pub use ser::CompactSerializer;

/// Serialize a data structure to a vector of bytes
pub fn serialize<T: Serialize + ?Sized>(value: &T) -> SerDeResult<Vec<u8>> {
    let mut serializer = CompactSerializer::default();

    value.serialize(&mut serializer)?;

    Ok(serializer.into_bytes())
}

/// Deserialize a data structure from a slice of bytes.
///
/// The slice must hold exactly one value.
pub fn deserialize<'de, T: Deserialize<'de>>(bytes: &'de [u8]) -> SerDeResult<T> {
    let mut deserializer = CompactDeserializer::from_slice(bytes);

    let value = T::deserialize(&mut deserializer)?;

    match deserializer.remaining() {
        0 => Ok(value),
        n => Err(Error::TrailingBytes(n)),
    }
}

/// Serializing and deserializing tests
#[cfg(test)]
mod tests {
    use std::{collections::HashMap, fmt::Debug};

    use rand::{Rng, SeedableRng};
    use serde::de::DeserializeOwned;

    use super::*;

    #[derive(Debug, Serialize, Deserialize, PartialEq, Default)]
    struct S {
        item: bool,
        number: i32,
        s: String,
        nested: Option<Box<S>>,
    }

    /// Performs a ser-de process and checks the value survives it
    fn ser_de_loop<T: Debug + PartialEq + Serialize + DeserializeOwned>(input: T) -> Vec<u8> {
        let ser = serialize(&input).unwrap();
        log::debug!("bytes: {} - {:?}", ser.len(), ser);

        let des: T = deserialize(&ser).unwrap();
        assert_eq!(des, input);

        ser
    }

    #[test]
    fn test_ser_de_primitives() {
        let _ = pretty_env_logger::try_init();

        assert_eq!(ser_de_loop(true), vec![b'b', 1]);
        assert_eq!(ser_de_loop(-1_i32), vec![b'i', 1]);
        assert_eq!(ser_de_loop(300_u16), vec![b'u', 0xac, 0x02]);
        ser_de_loop(i64::MIN);
        ser_de_loop(u64::MAX);
        ser_de_loop(1.5_f32);
        ser_de_loop(-0.25_f64);
        ser_de_loop('👏');
        ser_de_loop(());
        ser_de_loop(Some(Some(3_u8)));
        ser_de_loop(Option::<String>::None);
    }

    #[test]
    fn test_ser_de_map() {
        let map: HashMap<String, i32> = HashMap::from([
            ("asd".to_string(), 10_000),
            ("how about that 👏👏👏".to_string(), 69),
        ]);

        ser_de_loop(map);
    }

    /// Testing ser_de of sequences, like vectors and tuples
    #[test]
    fn test_ser_de_seq() {
        let seq = vec![100, 200, 300, 400];
        ser_de_loop(seq);

        let tup = (12, 100, 20000);
        ser_de_loop(tup);

        ser_de_loop(Vec::<String>::new());
    }

    /// Testing ser_de of structs
    #[test]
    fn test_ser_de_struct() {
        let s = S {
            item: false,
            number: 10000,
            s: "asd".to_string(),
            nested: Some(Box::new(S::default())),
        };
        ser_de_loop(s);
    }

    #[test]
    fn test_ser_de_enum() {
        #[derive(Debug, Serialize, Deserialize, PartialEq)]
        enum E {
            This,
            That(bool),
            WhatEver((i32, bool)),
            Tuple(u8, String),
            IDontCare { a: bool, b: i8, c: String },
        }

        assert_eq!(ser_de_loop(E::This), vec![b'e', 0]);
        ser_de_loop(E::That(false));
        ser_de_loop(E::WhatEver((10, true)));
        ser_de_loop(E::Tuple(7, "seven".to_string()));
        ser_de_loop(E::IDontCare {
            a: true,
            b: i8::MAX,
            c: "Hello How are You".to_string(),
        });
    }

    #[test]
    fn test_ser_de_bytes() {
        #[derive(Debug, Serialize, Deserialize, PartialEq)]
        struct Blob {
            #[serde(with = "serde_bytes")]
            data: Vec<u8>,
        }

        let ser = ser_de_loop(Blob {
            data: vec![0, 1, 2, 255],
        });
        assert_eq!(ser, vec![b'[', b'y', 4, 0, 1, 2, 255, b']']);
    }

    /// Untagged enums go through `deserialize_any`
    #[test]
    fn test_self_describing() {
        #[derive(Debug, Serialize, Deserialize, PartialEq)]
        #[serde(untagged)]
        enum Loose {
            Int(i64),
            Text(String),
            List(Vec<u32>),
        }

        ser_de_loop(vec![
            Loose::Int(-5),
            Loose::Text("x".to_string()),
            Loose::List(vec![1, 2]),
        ]);
    }

    #[test]
    fn test_malformed_input() {
        let ser = serialize(&S::default()).unwrap();

        // every strict prefix is incomplete
        for len in 0..ser.len() {
            assert!(deserialize::<S>(&ser[..len]).is_err());
        }

        let mut trailing = ser.clone();
        trailing.push(0);
        assert_eq!(deserialize::<S>(&trailing), Err(Error::TrailingBytes(1)));

        assert!(matches!(
            deserialize::<bool>(&[b'i', 0]),
            Err(Error::PrefixNotMatched { expected: b'b', found: b'i' })
        ));
        // out of range for the target type
        assert!(matches!(
            deserialize::<u8>(&[b'u', 0xac, 0x02]),
            Err(Error::Message(_))
        ));
        assert_eq!(
            deserialize::<char>(&[b'c', 0x80, 0xb0, 0x03]),
            Err(Error::InvalidChar(0xd800))
        );

        // a length far past the end of the input
        assert_eq!(
            deserialize::<String>(&[b's', 0xff, 0xff, 0xff, 0xff, 0x0f]),
            Err(Error::UnexpectedEnd)
        );
    }

    #[test]
    fn test_depth_limit() {
        let mut bytes = vec![b'['; 1_000];
        bytes.extend(vec![b']'; 1_000]);

        assert_eq!(
            deserialize::<serde::de::IgnoredAny>(&bytes).err(),
            Some(Error::DepthLimitExceeded)
        );
    }

    /// Random input must fail cleanly, never panic
    #[test]
    fn test_random_input() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(0x5eed);

        for _ in 0..2_000 {
            let len = rng.gen_range(0..64);
            let bytes = (0..len).map(|_| rng.gen::<u8>()).collect::<Vec<_>>();

            let _ = deserialize::<S>(&bytes);
            let _ = deserialize::<serde::de::IgnoredAny>(&bytes);
            let _ = deserialize::<HashMap<String, Vec<Option<i64>>>>(&bytes);
        }
    }
}
