//! Read-only mapping from type name to definition
//!
//! Built once at startup. Lookups never mutate the registry, so a shared
//! reference can be handed to any number of concurrent builds.

use indexmap::IndexMap;

use super::errors::{RegistryError, RegistryResult};
use super::types::ObjType;
use crate::observability::{log_event_with_fields, Event};

/// Named type definitions in declaration order
#[derive(Debug, Clone, Default)]
pub struct TypeRegistry {
    types: IndexMap<String, ObjType>,
}

impl TypeRegistry {
    /// Builds a registry, failing on the first duplicate type name.
    pub fn define(types: impl IntoIterator<Item = ObjType>) -> RegistryResult<Self> {
        let registry = Self::collect(types)?;
        log_event_with_fields(
            Event::RegistryDefined,
            &[("types", registry.len().to_string().as_str())],
        );
        Ok(registry)
    }

    pub(super) fn collect(types: impl IntoIterator<Item = ObjType>) -> RegistryResult<Self> {
        let mut map = IndexMap::new();
        for ty in types {
            if map.contains_key(&ty.name) {
                return Err(RegistryError::DuplicateType(ty.name));
            }
            map.insert(ty.name.clone(), ty);
        }
        Ok(Self { types: map })
    }

    /// Resolves a type by name.
    pub fn lookup(&self, name: &str) -> RegistryResult<&ObjType> {
        self.types
            .get(name)
            .ok_or_else(|| RegistryError::UnknownType(name.to_string()))
    }

    pub fn get(&self, name: &str) -> Option<&ObjType> {
        self.types.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    /// Finds the type whose singular label is `label`.
    pub fn by_singular_label(&self, label: &str) -> Option<&ObjType> {
        self.types.values().find(|ty| ty.singular_label() == label)
    }

    /// Finds the type whose plural label is `label` and differs from its singular.
    pub fn by_plural_label(&self, label: &str) -> Option<&ObjType> {
        self.types
            .values()
            .find(|ty| ty.plural_label() == label && ty.plural_label() != ty.singular_label())
    }

    pub fn types(&self) -> impl Iterator<Item = &ObjType> {
        self.types.values()
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}
