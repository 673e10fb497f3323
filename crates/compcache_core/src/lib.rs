//! Binary codec for composition caches.
//!
//! A cache holds the result of a part discovery pass: symbolic references to
//! types and members, plus the metadata attached to imports and exports.
//! Nothing is resolved while reading; references stay symbolic until the host
//! asks its [TypeResolver] for them.
//!
//! The stream format is positional and self-contained:
//! - integers and lengths are compressed 7 bits at a time
//! - assemblies, type references and string segments are interned per stream
//! - metadata values carry a one byte tag
//!
//! Start from [Encoder] and [Decoder].

mod codec;
pub mod collab;
pub mod consts;
mod err;
pub mod fallback;
pub mod instrument;
mod intern;
pub mod metadata;
pub mod refs;
pub mod ser_de;
pub mod value;
pub mod varint;

pub use codec::{CacheGraph, Decoder, Encoder};
pub use collab::{MetadataSubstitution, ObjectSerializer, PassThroughSubstitution, TypeResolver};
pub use err::{BoxError, CodecError, CodecResult};
pub use fallback::{FallbackError, FallbackRegistry};
pub use instrument::{ByteCounter, Instrumentation, UnitStats};
pub use metadata::MetadataMap;
pub use refs::{
    AssemblyName, ConstructorRef, FieldRef, MemberRef, MethodRef, ParameterRef, PropertyRef,
    TokenKind, TypeRef, TypeRefList,
};
pub use value::{CreationPolicy, LiveType, OpaqueObject, OpaqueValue, ResolvedType, Value};

/// Feeds the decoder garbage
#[cfg(test)]
mod tests {
    use std::any::Any;
    use std::io::Cursor;

    use rand::{Rng, SeedableRng};

    use super::*;

    #[derive(Debug)]
    struct Named(String);

    impl LiveType for Named {
        fn full_name(&self) -> &str {
            &self.0
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    /// Resolves every reference to a type named after its token
    struct Anything;

    impl TypeResolver for Anything {
        fn resolve(&self, type_ref: &TypeRef) -> Result<ResolvedType, BoxError> {
            Ok(ResolvedType::new(Named(format!(
                "{:#010x}",
                type_ref.metadata_token()
            ))))
        }

        fn get(&self, _: &ResolvedType) -> Result<TypeRef, BoxError> {
            Err("not used".into())
        }
    }

    fn random_bytes(rng: &mut rand::rngs::StdRng) -> Vec<u8> {
        let len = rng.gen_range(0..96);
        (0..len)
            .map(|_| match rng.gen_range(0..4) {
                // small values hit valid tags and identities more often
                0 | 1 => rng.gen_range(0..16),
                _ => rng.gen(),
            })
            .collect()
    }

    /// Random input must fail cleanly, never panic
    #[test]
    fn test_random_input() {
        let _ = pretty_env_logger::try_init();
        let mut rng = rand::rngs::StdRng::seed_from_u64(0xcac4e);
        let mut registry = FallbackRegistry::new();
        registry.register::<Vec<String>>("strings").unwrap();

        let mut decoded = 0;
        for _ in 0..5_000 {
            let bytes = random_bytes(&mut rng);

            let mut dec = Decoder::new(Cursor::new(bytes.clone()))
                .with_resolver(&Anything)
                .with_fallback(&registry);
            if dec.read_graph().is_ok() {
                decoded += 1;
            }

            let mut dec = Decoder::new(Cursor::new(bytes.clone()))
                .with_resolver(&Anything)
                .with_fallback(&registry);
            while dec.read_value().is_ok() {}

            let mut dec = Decoder::new(Cursor::new(bytes));
            let _ = dec.read_metadata();
        }

        log::debug!("{} random inputs decoded as graphs", decoded);
    }
}
