use std::cell::Cell;
use std::fmt;

use crate::dictionary::Dictionary;
use crate::error::{Error, Result};
use crate::object_id::{IdentityToken, ObjectId, Ref};
use crate::stream::Stream;

/// Literal strings are written `(...)`, hex strings `<...>`. The
/// distinction only matters for serialization; decoded bytes are
/// identical either way.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StringFormat {
    Literal,
    Hex,
}

/// An ordered sequence of values. Carries its own dirty bit (I3);
/// mutating an element through `get_mut`/`push`/etc. marks the array
/// itself dirty but never a container it happens to live inside (I4).
#[derive(Debug, Clone, Default)]
pub struct Array {
    items: Vec<Object>,
    dirty: Cell<bool>,
    identity: IdentityToken,
}

impl Array {
    pub fn new() -> Self {
        Array::default()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Object> {
        self.items.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut Object> {
        self.dirty.set(true);
        self.items.get_mut(index)
    }

    pub fn push(&mut self, value: impl Into<Object>) {
        self.dirty.set(true);
        self.items.push(value.into());
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Object> {
        self.items.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, Object> {
        self.dirty.set(true);
        self.items.iter_mut()
    }

    pub fn as_slice(&self) -> &[Object] {
        &self.items
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.get()
    }

    pub fn set_dirty(&self, dirty: bool) {
        self.dirty.set(dirty)
    }

    /// Stable, cheap-to-compare identity consumed by `Document::get_ref`.
    pub fn identity(&self) -> u64 {
        self.identity.get()
    }
}

impl PartialEq for Array {
    fn eq(&self, other: &Self) -> bool {
        self.items == other.items
    }
}

impl FromIterator<Object> for Array {
    fn from_iter<T: IntoIterator<Item = Object>>(iter: T) -> Self {
        Array {
            items: Vec::from_iter(iter),
            dirty: Cell::new(true),
            identity: IdentityToken::new(),
        }
    }
}

impl From<Vec<Object>> for Array {
    fn from(items: Vec<Object>) -> Self {
        Array {
            items,
            dirty: Cell::new(true),
            identity: IdentityToken::new(),
        }
    }
}

impl<'a> IntoIterator for &'a Array {
    type Item = &'a Object;
    type IntoIter = std::slice::Iter<'a, Object>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

impl IntoIterator for Array {
    type Item = Object;
    type IntoIter = std::vec::IntoIter<Object>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

/// The tagged value union every PDF object is built from.
///
/// Integers and reals are kept distinct (rather than collapsed into a
/// single `Number`) so a load→save round trip never turns `90` into
/// `90.0`.
#[derive(Debug, Clone)]
pub enum Object {
    Null,
    Boolean(bool),
    Integer(i64),
    Real(f64),
    Name(Vec<u8>),
    String(Vec<u8>, StringFormat),
    Array(Array),
    Dictionary(Dictionary),
    Stream(Stream),
    Reference(Ref),
}

impl Object {
    pub fn string_literal(bytes: impl Into<Vec<u8>>) -> Object {
        Object::String(bytes.into(), StringFormat::Literal)
    }

    pub fn name(bytes: impl Into<Vec<u8>>) -> Object {
        Object::Name(bytes.into())
    }

    pub fn reference(id: ObjectId) -> Object {
        Object::Reference(Ref::intern(id))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Object::Null)
    }

    /// Stable identity for `Document::get_ref`'s reverse lookup.
    /// `None` for variants that carry no `IdentityToken` (scalars and
    /// references themselves aren't the target of a reverse lookup —
    /// only the container an indirect object is registered under is).
    pub fn identity(&self) -> Option<u64> {
        match self {
            Object::Array(a) => Some(a.identity()),
            Object::Dictionary(d) => Some(d.identity()),
            Object::Stream(s) => Some(s.dict.identity()),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Object::Null => "Null",
            Object::Boolean(_) => "Boolean",
            Object::Integer(_) => "Integer",
            Object::Real(_) => "Real",
            Object::Name(_) => "Name",
            Object::String(..) => "String",
            Object::Array(_) => "Array",
            Object::Dictionary(_) => "Dictionary",
            Object::Stream(_) => "Stream",
            Object::Reference(_) => "Reference",
        }
    }

    fn wrong_type(&self, expected: &'static str) -> Error {
        Error::WrongObjectType {
            expected,
            found: self.type_name(),
        }
    }

    pub fn as_bool(&self) -> Result<bool> {
        match self {
            Object::Boolean(b) => Ok(*b),
            other => Err(other.wrong_type("Boolean")),
        }
    }

    pub fn as_i64(&self) -> Result<i64> {
        match self {
            Object::Integer(i) => Ok(*i),
            Object::Real(r) => Ok(*r as i64),
            other => Err(other.wrong_type("Integer")),
        }
    }

    pub fn as_f64(&self) -> Result<f64> {
        match self {
            Object::Integer(i) => Ok(*i as f64),
            Object::Real(r) => Ok(*r),
            other => Err(other.wrong_type("Real")),
        }
    }

    pub fn as_name(&self) -> Result<&[u8]> {
        match self {
            Object::Name(n) => Ok(n),
            other => Err(other.wrong_type("Name")),
        }
    }

    pub fn as_name_str(&self) -> Result<&str> {
        self.as_name().and_then(|n| std::str::from_utf8(n).map_err(Error::from))
    }

    pub fn as_str(&self) -> Result<&[u8]> {
        match self {
            Object::String(s, _) => Ok(s),
            other => Err(other.wrong_type("String")),
        }
    }

    pub fn as_str_mut(&mut self) -> Result<&mut Vec<u8>> {
        match self {
            Object::String(s, _) => Ok(s),
            other => Err(other.wrong_type("String")),
        }
    }

    pub fn as_array(&self) -> Result<&Array> {
        match self {
            Object::Array(a) => Ok(a),
            other => Err(other.wrong_type("Array")),
        }
    }

    pub fn as_array_mut(&mut self) -> Result<&mut Array> {
        match self {
            Object::Array(a) => Ok(a),
            other => Err(other.wrong_type("Array")),
        }
    }

    pub fn as_dict(&self) -> Result<&Dictionary> {
        match self {
            Object::Dictionary(d) => Ok(d),
            Object::Stream(s) => Ok(&s.dict),
            other => Err(other.wrong_type("Dictionary")),
        }
    }

    pub fn as_dict_mut(&mut self) -> Result<&mut Dictionary> {
        match self {
            Object::Dictionary(d) => Ok(d),
            Object::Stream(s) => Ok(&mut s.dict),
            other => Err(other.wrong_type("Dictionary")),
        }
    }

    pub fn as_stream(&self) -> Result<&Stream> {
        match self {
            Object::Stream(s) => Ok(s),
            other => Err(other.wrong_type("Stream")),
        }
    }

    pub fn as_stream_mut(&mut self) -> Result<&mut Stream> {
        match self {
            Object::Stream(s) => Ok(s),
            other => Err(other.wrong_type("Stream")),
        }
    }

    pub fn as_reference(&self) -> Result<ObjectId> {
        match self {
            Object::Reference(r) => Ok(r.id()),
            other => Err(other.wrong_type("Reference")),
        }
    }

    /// True if this value (or, for dicts/arrays/streams, any child
    /// reachable without crossing a `Reference` boundary) carries the
    /// dirty bit. References are not followed: they name a separate
    /// indirect object whose own dirtiness is tracked independently.
    pub fn has_dirty_descendant(&self) -> bool {
        match self {
            Object::Dictionary(d) => d.is_dirty() || d.iter().any(|(_, v)| v.has_dirty_descendant_shallow()),
            Object::Stream(s) => s.dict.is_dirty() || s.dict.iter().any(|(_, v)| v.has_dirty_descendant_shallow()),
            Object::Array(a) => a.is_dirty() || a.iter().any(Object::has_dirty_descendant_shallow),
            _ => false,
        }
    }

    /// Like `has_dirty_descendant` but used internally to avoid
    /// re-testing a container's own bit twice on the way down.
    fn has_dirty_descendant_shallow(&self) -> bool {
        match self {
            Object::Reference(_) => false,
            other => other.has_dirty_descendant(),
        }
    }

    pub fn clear_dirty_recursive(&self) {
        match self {
            Object::Dictionary(d) => {
                d.set_dirty(false);
                for (_, v) in d.iter() {
                    if !matches!(v, Object::Reference(_)) {
                        v.clear_dirty_recursive();
                    }
                }
            }
            Object::Stream(s) => {
                s.dict.set_dirty(false);
                for (_, v) in s.dict.iter() {
                    if !matches!(v, Object::Reference(_)) {
                        v.clear_dirty_recursive();
                    }
                }
            }
            Object::Array(a) => {
                a.set_dirty(false);
                for v in a.iter() {
                    if !matches!(v, Object::Reference(_)) {
                        v.clear_dirty_recursive();
                    }
                }
            }
            _ => {}
        }
    }
}

impl PartialEq for Object {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Object::Null, Object::Null) => true,
            (Object::Boolean(a), Object::Boolean(b)) => a == b,
            (Object::Integer(a), Object::Integer(b)) => a == b,
            (Object::Real(a), Object::Real(b)) => a == b,
            (Object::Name(a), Object::Name(b)) => a == b,
            (Object::String(a, _), Object::String(b, _)) => a == b,
            (Object::Array(a), Object::Array(b)) => a == b,
            (Object::Dictionary(a), Object::Dictionary(b)) => a == b,
            (Object::Stream(a), Object::Stream(b)) => a == b,
            (Object::Reference(a), Object::Reference(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Object::Null => write!(f, "null"),
            Object::Boolean(b) => write!(f, "{b}"),
            Object::Integer(i) => write!(f, "{i}"),
            Object::Real(r) => write!(f, "{r}"),
            Object::Name(n) => write!(f, "/{}", String::from_utf8_lossy(n)),
            Object::String(s, _) => write!(f, "({})", String::from_utf8_lossy(s)),
            Object::Array(a) => write!(f, "[{} items]", a.len()),
            Object::Dictionary(d) => write!(f, "{d}"),
            Object::Stream(s) => write!(f, "{} (stream, {} bytes)", s.dict, s.raw_content().len()),
            Object::Reference(r) => write!(f, "{r}"),
        }
    }
}

macro_rules! impl_from_numeric {
    ($($t:ty => $variant:ident as $cast:ty),* $(,)?) => {
        $(
            impl From<$t> for Object {
                fn from(value: $t) -> Self {
                    Object::$variant(value as $cast)
                }
            }
        )*
    };
}

impl_from_numeric!(
    i64 => Integer as i64,
    i32 => Integer as i64,
    u32 => Integer as i64,
    u16 => Integer as i64,
    usize => Integer as i64,
    f64 => Real as f64,
    f32 => Real as f64,
);

impl From<bool> for Object {
    fn from(value: bool) -> Self {
        Object::Boolean(value)
    }
}

impl From<Dictionary> for Object {
    fn from(value: Dictionary) -> Self {
        Object::Dictionary(value)
    }
}

impl From<Array> for Object {
    fn from(value: Array) -> Self {
        Object::Array(value)
    }
}

impl From<Vec<Object>> for Object {
    fn from(value: Vec<Object>) -> Self {
        Object::Array(Array::from(value))
    }
}

impl From<Stream> for Object {
    fn from(value: Stream) -> Self {
        Object::Stream(value)
    }
}

impl From<Ref> for Object {
    fn from(value: Ref) -> Self {
        Object::Reference(value)
    }
}

impl From<ObjectId> for Object {
    fn from(value: ObjectId) -> Self {
        Object::reference(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dirty_descendant_stops_at_reference() {
        let mut outer = Dictionary::new();
        outer.set_dirty(false);
        outer.set(b"Kids".to_vec(), Object::reference((7, 0)));
        let obj = Object::Dictionary(outer);
        assert!(!obj.has_dirty_descendant());
    }

    #[test]
    fn dirty_descendant_walks_nested_containers() {
        let mut inner = Dictionary::new();
        inner.set(b"A".to_vec(), Object::Integer(1));
        let mut outer = Dictionary::new();
        outer.set_dirty(false);
        outer.set(b"Inner".to_vec(), Object::Dictionary(inner));
        outer.set_dirty(false);
        let obj = Object::Dictionary(outer);
        assert!(obj.has_dirty_descendant());
    }

    #[test]
    fn clear_dirty_recursive_resets_everything_but_references() {
        let mut inner = Dictionary::new();
        inner.set(b"A".to_vec(), Object::Integer(1));
        let mut outer = Dictionary::new();
        outer.set(b"Inner".to_vec(), Object::Dictionary(inner));
        let obj = Object::Dictionary(outer);
        obj.clear_dirty_recursive();
        assert!(!obj.has_dirty_descendant());
    }
}
