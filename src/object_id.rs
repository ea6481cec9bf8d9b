//! Reference interning.
//!
//! An indirect object is identified by an `(object_number, generation)`
//! pair. `Ref` hash-conses that pair behind an `Arc` so that repeated
//! construction of the same pair (from the parser, from
//! `registry.register()`, from a copied subgraph) shares one
//! allocation and compares equal both by value and, on the fast path,
//! by pointer.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, OnceLock, Weak};

/// The raw `(object_number, generation)` pair, as used for xref
/// bookkeeping and hashmap keys where carrying the full `Ref` wrapper
/// would be needlessly heavy.
pub type ObjectId = (u32, u16);

/// An interned indirect reference.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Ref(Arc<ObjectId>);

impl Ref {
    pub fn object_number(&self) -> u32 {
        self.0 .0
    }

    pub fn generation(&self) -> u16 {
        self.0 .1
    }

    pub fn id(&self) -> ObjectId {
        *self.0
    }

    /// Intern `(object_number, generation)`, reusing the existing
    /// allocation if one is already live.
    pub fn intern(id: ObjectId) -> Ref {
        interner().intern(id)
    }
}

impl From<ObjectId> for Ref {
    fn from(id: ObjectId) -> Self {
        Ref::intern(id)
    }
}

impl fmt::Debug for Ref {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} R", self.object_number(), self.generation())
    }
}

impl fmt::Display for Ref {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} R", self.object_number(), self.generation())
    }
}

struct RefInterner {
    table: Mutex<HashMap<ObjectId, Weak<ObjectId>>>,
}

impl RefInterner {
    fn new() -> Self {
        RefInterner {
            table: Mutex::new(HashMap::new()),
        }
    }

    fn intern(&self, id: ObjectId) -> Ref {
        let mut table = self.table.lock().expect("ref interner poisoned");
        if let Some(weak) = table.get(&id) {
            if let Some(arc) = weak.upgrade() {
                return Ref(arc);
            }
        }
        let arc = Arc::new(id);
        table.insert(id, Arc::downgrade(&arc));
        Ref(arc)
    }
}

fn interner() -> &'static RefInterner {
    static INTERNER: OnceLock<RefInterner> = OnceLock::new();
    INTERNER.get_or_init(RefInterner::new)
}

/// A stable identity token handed out to dictionaries and streams so
/// that a reverse object→ref lookup can key on something other than
/// the object's (unhashable, frequently cloned) value. The token
/// itself carries no ownership: when the wrapper that held it is
/// dropped the token is simply never looked up again, so no explicit
/// collection is required.
#[derive(Debug, Default)]
pub struct IdentityToken(std::cell::Cell<u64>);

impl IdentityToken {
    pub fn new() -> Self {
        IdentityToken(std::cell::Cell::new(0))
    }

    pub fn get(&self) -> u64 {
        let current = self.0.get();
        if current != 0 {
            return current;
        }
        static NEXT: OnceLock<std::sync::atomic::AtomicU64> = OnceLock::new();
        let next = NEXT.get_or_init(|| std::sync::atomic::AtomicU64::new(1));
        let assigned = next.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        self.0.set(assigned);
        assigned
    }
}

impl Clone for IdentityToken {
    /// A clone is a distinct object with its own identity; cloning
    /// must not alias the original's token.
    fn clone(&self) -> Self {
        IdentityToken::new()
    }
}

impl PartialEq for IdentityToken {
    fn eq(&self, _other: &Self) -> bool {
        true
    }
}
impl Eq for IdentityToken {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interned_refs_compare_equal() {
        let a = Ref::intern((5, 0));
        let b = Ref::intern((5, 0));
        assert_eq!(a, b);
        assert!(Arc::ptr_eq(&a.0, &b.0));
    }

    #[test]
    fn distinct_ids_are_distinct() {
        let a = Ref::intern((1, 0));
        let b = Ref::intern((1, 1));
        assert_ne!(a, b);
    }

    #[test]
    fn identity_tokens_are_stable_and_unique() {
        let a = IdentityToken::new();
        let b = IdentityToken::new();
        let first = a.get();
        assert_eq!(a.get(), first);
        assert_ne!(a.get(), b.get());
    }
}
