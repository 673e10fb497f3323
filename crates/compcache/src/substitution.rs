//! Substitution of live type handles by symbolic proxies.
//!
//! Live types cannot be cached as they are: they only exist inside the hosting
//! type system. On write they are replaced by [Value::TypeSubstitution] and
//! [Value::TypeArraySubstitution] proxies, which hold symbolic references only.
//! On read the proxies stay lazy unless the substitution resolves eagerly.

use compcache_core::{
    BoxError, MetadataMap, MetadataSubstitution, ResolvedType, TypeRef, TypeRefList,
    TypeResolver, Value,
};

use crate::defaults;

/// Replaces live types in metadata maps with type reference proxies.
///
/// Only types are handled. Every other value, enum proxies included, passes
/// through as it is: enum values have no live form here, so writers put
/// [Value::EnumSubstitution] into the map themselves.
pub struct TypeHandleSubstitution<'r> {
    resolver: &'r dyn TypeResolver,
    /// Element type of arrays of types
    type_handle: ResolvedType,
    resolve_eagerly: bool,
}

impl<'r> TypeHandleSubstitution<'r> {
    /// `type_handle` is the live type whose instances are types themselves.
    /// Only arrays of that element type become type-array proxies.
    pub fn new(resolver: &'r dyn TypeResolver, type_handle: ResolvedType) -> Self {
        Self {
            resolver,
            type_handle,
            resolve_eagerly: defaults::DEFAULT_RESOLVE_EAGERLY,
        }
    }

    /// Turn proxies back into live values when a map is read
    pub fn resolve_eagerly(mut self, eager: bool) -> Self {
        self.resolve_eagerly = eager;
        self
    }

    fn substitute(&self, value: &Value) -> Result<Value, BoxError> {
        let substituted = match value {
            Value::Type(live) => Value::TypeSubstitution(self.resolver.get(live)?),
            Value::Array {
                element_type,
                items,
            } if *element_type == self.type_handle => match self.type_list(items)? {
                Some(list) => Value::TypeArraySubstitution(list),
                None => value.clone(),
            },
            Value::Array {
                element_type,
                items,
            } => Value::Array {
                element_type: element_type.clone(),
                items: items
                    .iter()
                    .map(|item| self.substitute(item))
                    .collect::<Result<_, _>>()?,
            },
            other => other.clone(),
        };

        Ok(substituted)
    }

    /// Symbolic references for an array holding live types only
    fn type_list(&self, items: &[Value]) -> Result<Option<TypeRefList>, BoxError> {
        let mut list = Vec::with_capacity(items.len());
        for item in items {
            match item {
                Value::Type(live) => list.push(self.resolver.get(live)?),
                // nulls have no reference to stand in for them
                _ => return Ok(None),
            }
        }

        Ok(Some(list.into()))
    }

    fn restore(&self, value: Value) -> Result<Value, BoxError> {
        let restored = match value {
            Value::TypeSubstitution(type_ref) => Value::Type(self.resolve(&type_ref)?),
            Value::TypeArraySubstitution(list) => Value::Array {
                element_type: self.type_handle.clone(),
                items: list
                    .iter()
                    .map(|t| self.resolve(t).map(Value::Type))
                    .collect::<Result<_, _>>()?,
            },
            Value::Array {
                element_type,
                items,
            } => Value::Array {
                element_type,
                items: items
                    .into_iter()
                    .map(|item| self.restore(item))
                    .collect::<Result<_, _>>()?,
            },
            other => other,
        };

        Ok(restored)
    }

    fn resolve(&self, type_ref: &TypeRef) -> Result<ResolvedType, BoxError> {
        self.resolver.resolve(type_ref)
    }
}

impl MetadataSubstitution for TypeHandleSubstitution<'_> {
    fn substitute_for_write(&self, metadata: &MetadataMap) -> Result<MetadataMap, BoxError> {
        let mut substituted = MetadataMap::with_capacity(metadata.len());
        for (key, value) in metadata.iter() {
            substituted.insert(key, self.substitute(value)?);
        }

        Ok(substituted)
    }

    fn restore_after_read(&self, metadata: MetadataMap) -> Result<MetadataMap, BoxError> {
        if !self.resolve_eagerly {
            return Ok(metadata);
        }

        log::trace!("resolving type proxies of {} metadata entries", metadata.len());
        metadata.try_map_values(|_, value| self.restore(value))
    }
}

#[cfg(test)]
mod tests {
    use std::any::Any;
    use std::cell::Cell;

    use compcache_core::{AssemblyName, LiveType};

    use super::*;

    #[derive(Debug)]
    struct Live(&'static str);

    impl LiveType for Live {
        fn full_name(&self) -> &str {
            self.0
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    const NAMES: [&str; 3] = ["System.String", "System.Int32", "System.Type"];

    /// Maps the names above to consecutive type definition rows
    struct Corlib {
        assembly: AssemblyName,
        resolved: Cell<usize>,
    }

    impl Corlib {
        fn new() -> Self {
            Self {
                assembly: AssemblyName::new("System.Private.CoreLib", None),
                resolved: Cell::new(0),
            }
        }
    }

    impl TypeResolver for Corlib {
        fn resolve(&self, type_ref: &TypeRef) -> Result<ResolvedType, BoxError> {
            self.resolved.set(self.resolved.get() + 1);
            let row = (type_ref.metadata_token() & 0x00ff_ffff) as usize;

            NAMES
                .get(row.wrapping_sub(1))
                .map(|&name| ResolvedType::new(Live(name)))
                .ok_or_else(|| format!("no type at row {}", row).into())
        }

        fn get(&self, resolved: &ResolvedType) -> Result<TypeRef, BoxError> {
            let row = NAMES
                .iter()
                .position(|n| *n == resolved.full_name())
                .ok_or_else(|| format!("{} is not a corlib type", resolved.full_name()))?;

            Ok(TypeRef::new(
                self.assembly.clone(),
                0x0200_0001 + row as u32,
                false,
                0,
                vec![],
            ))
        }
    }

    fn live(name: &'static str) -> ResolvedType {
        ResolvedType::new(Live(name))
    }

    fn metadata() -> MetadataMap {
        [
            ("ExportedType", Value::Type(live("System.String"))),
            (
                "Parameters",
                Value::Array {
                    element_type: live("System.Type"),
                    items: vec![
                        Value::Type(live("System.Int32")),
                        Value::Type(live("System.String")),
                    ],
                },
            ),
            ("Name", Value::from("widget")),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn test_substitute_for_write() {
        let corlib = Corlib::new();
        let substitution = TypeHandleSubstitution::new(&corlib, live("System.Type"));

        let substituted = substitution.substitute_for_write(&metadata()).unwrap();
        assert!(matches!(
            substituted.get("ExportedType"),
            Some(Value::TypeSubstitution(t)) if t.metadata_token() == 0x0200_0001
        ));
        match substituted.get("Parameters") {
            Some(Value::TypeArraySubstitution(list)) => {
                let tokens = list.iter().map(|t| t.metadata_token()).collect::<Vec<_>>();
                assert_eq!(tokens, vec![0x0200_0002, 0x0200_0001]);
            }
            other => panic!("expected a type array proxy, got {:?}", other),
        }
        assert_eq!(substituted.get("Name"), Some(&Value::from("widget")));
    }

    #[test]
    fn test_restore_is_lazy_by_default() {
        let corlib = Corlib::new();
        let substitution = TypeHandleSubstitution::new(&corlib, live("System.Type"));

        let substituted = substitution.substitute_for_write(&metadata()).unwrap();
        let restored = substitution
            .restore_after_read(substituted.clone())
            .unwrap();

        assert_eq!(restored, substituted);
        assert_eq!(corlib.resolved.get(), 0);
    }

    #[test]
    fn test_restore_eagerly() {
        let corlib = Corlib::new();
        let substitution =
            TypeHandleSubstitution::new(&corlib, live("System.Type")).resolve_eagerly(true);

        let substituted = substitution.substitute_for_write(&metadata()).unwrap();
        let restored = substitution.restore_after_read(substituted).unwrap();

        assert_eq!(restored, metadata());
        assert_eq!(corlib.resolved.get(), 3);
    }

    #[test]
    fn test_mixed_arrays_are_kept() {
        let corlib = Corlib::new();
        let substitution = TypeHandleSubstitution::new(&corlib, live("System.Type"));

        // a null element has no proxy
        let with_null = Value::Array {
            element_type: live("System.Type"),
            items: vec![Value::Type(live("System.Int32")), Value::Null],
        };
        assert_eq!(substitution.substitute(&with_null).unwrap(), with_null);

        // types inside other arrays are still replaced one by one
        let objects = Value::Array {
            element_type: live("System.String"),
            items: vec![Value::Type(live("System.Int32"))],
        };
        assert!(matches!(
            substitution.substitute(&objects).unwrap(),
            Value::Array { items, .. } if matches!(items[0], Value::TypeSubstitution(_))
        ));
    }

    #[test]
    fn test_other_values_pass_through() {
        let corlib = Corlib::new();
        let substitution =
            TypeHandleSubstitution::new(&corlib, live("System.Type")).resolve_eagerly(true);
        let widget = TypeRef::new(corlib.assembly.clone(), 0x0200_0002, false, 0, vec![]);

        let metadata: MetadataMap = [
            (
                "Lifetime",
                Value::EnumSubstitution {
                    enum_type: widget.clone(),
                    raw_value: 2,
                },
            ),
            ("Contract", Value::TypeRef(widget)),
            ("Count", Value::Int32(4)),
        ]
        .into_iter()
        .collect();

        let substituted = substitution.substitute_for_write(&metadata).unwrap();
        assert_eq!(substituted, metadata);
        assert_eq!(substitution.restore_after_read(substituted).unwrap(), metadata);
        assert_eq!(corlib.resolved.get(), 0);
    }

    #[test]
    fn test_resolver_errors_propagate() {
        let corlib = Corlib::new();
        let substitution = TypeHandleSubstitution::new(&corlib, live("System.Type"));

        let metadata: MetadataMap = [("Bad", Value::Type(live("Contoso.Widget")))]
            .into_iter()
            .collect();
        let err = substitution.substitute_for_write(&metadata).unwrap_err();
        assert!(err.to_string().contains("Contoso.Widget"));
    }
}
