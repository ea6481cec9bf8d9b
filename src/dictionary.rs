use std::cell::Cell;
use std::fmt;

use indexmap::IndexMap;

use crate::error::{Error, Result};
use crate::object::Object;
use crate::object_id::IdentityToken;

/// A PDF dictionary: `Name -> Value`. Insertion order is preserved
/// (it doesn't matter semantically, but it keeps serialized output
/// stable across a load/save round trip, which matters for diffing
/// incremental updates).
#[derive(Debug, Clone, Default)]
pub struct Dictionary {
    map: IndexMap<Vec<u8>, Object>,
    dirty: Cell<bool>,
    identity: IdentityToken,
}

impl Dictionary {
    pub fn new() -> Self {
        Dictionary::default()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn has(&self, key: &[u8]) -> bool {
        self.map.contains_key(key)
    }

    pub fn get(&self, key: &[u8]) -> Result<&Object> {
        self.map.get(key).ok_or_else(|| Error::Syntax(format!("missing key /{}", String::from_utf8_lossy(key))))
    }

    pub fn get_mut(&mut self, key: &[u8]) -> Result<&mut Object> {
        self.dirty.set(true);
        self.map
            .get_mut(key)
            .ok_or_else(|| Error::Syntax(format!("missing key /{}", String::from_utf8_lossy(key))))
    }

    pub fn get_deref<'a>(&'a self, key: &[u8], resolve: &dyn Fn(&Object) -> Option<&'a Object>) -> Result<&'a Object> {
        let value = self.get(key)?;
        Ok(resolve(value).unwrap_or(value))
    }

    /// Insert, marking this dictionary (but not any child) dirty. Per
    /// invariant I4, the change collector is responsible for walking
    /// into unchanged containers to find a dirty descendant; setting a
    /// parent's flag here would be both wrong (parent wasn't mutated)
    /// and redundant.
    pub fn set<K, V>(&mut self, key: K, value: V) -> Option<Object>
    where
        K: Into<Vec<u8>>,
        V: Into<Object>,
    {
        self.dirty.set(true);
        self.map.insert(key.into(), value.into())
    }

    pub fn remove(&mut self, key: &[u8]) -> Option<Object> {
        self.dirty.set(true);
        self.map.shift_remove(key)
    }

    pub fn iter(&self) -> indexmap::map::Iter<'_, Vec<u8>, Object> {
        self.map.iter()
    }

    pub fn iter_mut(&mut self) -> indexmap::map::IterMut<'_, Vec<u8>, Object> {
        self.dirty.set(true);
        self.map.iter_mut()
    }

    pub fn get_type(&self) -> Result<&[u8]> {
        self.get(b"Type").and_then(Object::as_name)
    }

    pub fn has_type(&self, type_name: &[u8]) -> bool {
        matches!(self.get_type(), Ok(t) if t == type_name)
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.get()
    }

    pub fn set_dirty(&self, dirty: bool) {
        self.dirty.set(dirty)
    }

    /// Stable, cheap-to-compare identity consumed by `Document::get_ref`'s
    /// reverse lookup. Does not keep the dictionary alive.
    pub fn identity(&self) -> u64 {
        self.identity.get()
    }
}

impl PartialEq for Dictionary {
    fn eq(&self, other: &Self) -> bool {
        self.map.len() == other.map.len() && self.map.iter().all(|(k, v)| other.map.get(k) == Some(v))
    }
}

impl fmt::Display for Dictionary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<<")?;
        for (k, v) in &self.map {
            write!(f, " /{} {:?}", String::from_utf8_lossy(k), v)?;
        }
        write!(f, " >>")
    }
}

impl FromIterator<(Vec<u8>, Object)> for Dictionary {
    fn from_iter<T: IntoIterator<Item = (Vec<u8>, Object)>>(iter: T) -> Self {
        Dictionary {
            map: IndexMap::from_iter(iter),
            dirty: Cell::new(true),
            identity: IdentityToken::new(),
        }
    }
}

impl<'a> IntoIterator for &'a Dictionary {
    type Item = (&'a Vec<u8>, &'a Object);
    type IntoIter = indexmap::map::Iter<'a, Vec<u8>, Object>;

    fn into_iter(self) -> Self::IntoIter {
        self.map.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_marks_dirty_get_does_not() {
        let mut dict = Dictionary::new();
        assert!(!dict.is_dirty());
        dict.set(b"Type".to_vec(), Object::Name(b"Page".to_vec()));
        assert!(dict.is_dirty());
        dict.set_dirty(false);
        let _ = dict.get(b"Type");
        assert!(!dict.is_dirty());
    }

    #[test]
    fn has_type_checks_name_value() {
        let mut dict = Dictionary::new();
        dict.set(b"Type".to_vec(), Object::Name(b"Catalog".to_vec()));
        assert!(dict.has_type(b"Catalog"));
        assert!(!dict.has_type(b"Page"));
    }
}
