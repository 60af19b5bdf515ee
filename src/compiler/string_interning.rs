use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::settings::MINIMUM_STRING_TABLE_CAPACITY;

/// A unique identifier for an interned string, represented as a u32 for
/// memory efficiency. Stems, identifiers and string literals are interned
/// once and compared by ID everywhere else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StringId(u32);

impl StringId {
    #[inline]
    pub fn as_u32(self) -> u32 {
        self.0
    }

    #[inline]
    pub fn from_u32(id: u32) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for StringId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "StringId({})", self.0)
    }
}

/// Centralized string interning for one compilation run.
///
/// Dual mapping: Vec for O(1) ID → string resolution, FxHashMap for
/// O(1) string → ID lookup while interning.
#[derive(Debug, Clone, Default)]
pub struct StringTable {
    strings: Vec<Box<str>>,
    string_to_id: FxHashMap<Box<str>, StringId>,
}

impl StringTable {
    pub fn new() -> Self {
        Self {
            strings: Vec::with_capacity(MINIMUM_STRING_TABLE_CAPACITY),
            string_to_id: FxHashMap::default(),
        }
    }

    #[inline]
    pub fn intern(&mut self, s: &str) -> StringId {
        if let Some(&existing_id) = self.string_to_id.get(s) {
            return existing_id;
        }

        let new_id = StringId(self.strings.len() as u32);
        let boxed: Box<str> = s.into();
        self.string_to_id.insert(boxed.clone(), new_id);
        self.strings.push(boxed);
        new_id
    }

    #[inline]
    pub fn resolve(&self, id: StringId) -> &str {
        &self.strings[id.0 as usize]
    }

    pub fn len(&self) -> usize {
        self.strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_is_idempotent() {
        let mut table = StringTable::new();
        let a = table.intern("summa");
        let b = table.intern("summa");
        let c = table.intern("alia");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(table.resolve(a), "summa");
        assert_eq!(table.resolve(c), "alia");
    }
}
