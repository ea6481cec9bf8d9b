//! The object registry: the in-memory map of every loaded or newly
//! created indirect object, plus the bookkeeping (`trailer`,
//! `reference_table`, dirty tracking) a save pass needs to decide
//! between a full rewrite and an incremental append.

use std::collections::{BTreeMap, HashSet};

use crate::dictionary::Dictionary;
use crate::encryption::EncryptionState;
use crate::error::{Blocker, Error, Result};
use crate::object::Object;
use crate::object_id::ObjectId;
use crate::xref::Xref;

/// A loaded (or newly built) PDF document: the flattened object table
/// plus everything the reader and writer need to round-trip it.
#[derive(Debug, Clone)]
pub struct Document {
    pub version: String,
    pub objects: BTreeMap<ObjectId, Object>,
    pub trailer: Dictionary,
    pub reference_table: Xref,
    pub max_id: u32,
    pub binary_mark: Vec<u8>,
    pub xref_start: usize,
    pub encryption_state: Option<EncryptionState>,
    /// The exact bytes `load` was given, retained so an incremental
    /// save can copy the original prefix verbatim (invariant I9).
    /// `None` for a document built fresh via `Document::new()`, which
    /// has nothing to append to and can only be saved in full.
    pub source_bytes: Option<Vec<u8>>,
    /// Set when the xref chain could not be trusted and objects were
    /// located by scanning for `N G obj` headers instead. Blocks
    /// incremental save (`Blocker::BruteForceRecovery`) since none of
    /// the recovered offsets are meaningful to a `/Prev` chain.
    pub recovered: bool,
    /// Set once `is_linearized()` has been checked true at load time.
    /// A linearized file's hint tables describe exact byte ranges that
    /// an incremental append would silently invalidate.
    pub was_linearized: bool,
    /// Whether the trailer named an `/Encrypt` dict at load time (or
    /// immediately after the last full save, which establishes a fresh
    /// baseline). Compared against the current trailer at save time to
    /// detect encryption having been added or removed out from under
    /// `encryption_changed_since_load`.
    pub encrypted_at_load: bool,
    encryption_changed_since_load: Option<Blocker>,
    next_object_number: u32,
    warnings: Vec<String>,
}

impl Default for Document {
    fn default() -> Self {
        Document::new()
    }
}

impl Document {
    pub fn new() -> Self {
        Document {
            version: "1.5".to_string(),
            objects: BTreeMap::new(),
            trailer: Dictionary::new(),
            reference_table: Xref::new(0, crate::xref::XrefType::Table),
            max_id: 0,
            binary_mark: vec![0xE2, 0xE3, 0xCF, 0xD3],
            xref_start: 0,
            encryption_state: None,
            source_bytes: None,
            recovered: false,
            was_linearized: false,
            encrypted_at_load: false,
            encryption_changed_since_load: None,
            next_object_number: 1,
            warnings: Vec::new(),
        }
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub(crate) fn warn(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    /// Allocate a fresh, never-before-used object number and return the
    /// id a new indirect object should be stored under.
    pub fn allocate_id(&mut self) -> ObjectId {
        while self.objects.contains_key(&(self.next_object_number, 0)) {
            self.next_object_number += 1;
        }
        let id = (self.next_object_number, 0);
        self.next_object_number += 1;
        self.max_id = self.max_id.max(id.0);
        id
    }

    /// Insert a new or replacement object under `id`, marking it
    /// dirty the way a fresh mutation would (so an incremental save
    /// picks it up even if the caller never touches the value again).
    pub fn add_object(&mut self, id: ObjectId, object: impl Into<Object>) -> ObjectId {
        let object = object.into();
        object.clear_dirty_recursive();
        match &object {
            Object::Dictionary(d) => d.set_dirty(true),
            Object::Stream(s) => s.dict.set_dirty(true),
            Object::Array(a) => a.set_dirty(true),
            _ => {}
        }
        self.max_id = self.max_id.max(id.0);
        self.objects.insert(id, object);
        id
    }

    /// Allocate an id and insert in one step, returning a `Reference`
    /// object a caller can drop straight into a parent dict/array.
    pub fn add_new_object(&mut self, object: impl Into<Object>) -> ObjectId {
        let id = self.allocate_id();
        self.add_object(id, object)
    }

    pub fn get_object(&self, id: ObjectId) -> Result<&Object> {
        self.objects.get(&id).ok_or(Error::ObjectNotFound(id))
    }

    pub fn get_object_mut(&mut self, id: ObjectId) -> Result<&mut Object> {
        self.objects.get_mut(&id).ok_or(Error::ObjectNotFound(id))
    }

    pub fn get_dictionary(&self, id: ObjectId) -> Result<&Dictionary> {
        self.get_object(id).and_then(Object::as_dict)
    }

    /// Reverse lookup: the id `value` is registered under, found by
    /// stable identity rather than structural equality (two
    /// dictionaries can be value-equal but logically distinct
    /// objects). `None` if `value` carries no identity token (a
    /// scalar) or isn't actually installed in this registry.
    pub fn get_ref(&self, value: &Object) -> Option<ObjectId> {
        let identity = value.identity()?;
        self.objects.iter().find(|(_, object)| object.identity() == Some(identity)).map(|(&id, _)| id)
    }

    /// Resolve one level of indirection: if `value` is a `Reference`,
    /// return the id and the object it points to; otherwise return the
    /// value's own (fictitious, object-number-0) id and itself.
    pub fn dereference<'a>(&'a self, value: &'a Object) -> Result<(ObjectId, &'a Object)> {
        match value {
            Object::Reference(r) => {
                let id = r.id();
                Ok((id, self.get_object(id)?))
            }
            other => Ok(((0, 0), other)),
        }
    }

    /// Fully resolve a chain of references (an object whose value is
    /// itself a reference, however unusual that is in practice).
    pub fn resolve(&self, id: ObjectId) -> Result<&Object> {
        let mut current = id;
        let mut seen = HashSet::new();
        loop {
            if !seen.insert(current) {
                return Err(Error::ReferenceCycle(current));
            }
            match self.get_object(current)? {
                Object::Reference(r) => current = r.id(),
                other => return Ok(other),
            }
        }
    }

    pub fn is_encrypted(&self) -> bool {
        self.trailer.has(b"Encrypt")
    }

    pub fn is_authenticated(&self) -> bool {
        !self.is_encrypted() || self.encryption_state.is_some()
    }

    pub fn authenticate_password(&self, password: &str) -> Result<()> {
        EncryptionState::decode(self, password).map(|_| ()).map_err(Error::Decryption)
    }

    /// True if `/Linearized` appears in what is (or was, if it has
    /// since been stripped) the first object of the file.
    pub fn is_linearized(&self) -> bool {
        self.was_linearized
    }

    /// True if any loaded dict/array/stream carries the dirty bit
    /// anywhere beneath it, or any object number is absent from the
    /// original xref (i.e. was added after load).
    pub fn has_changes(&self) -> bool {
        self.objects.values().any(Object::has_dirty_descendant)
            || self.objects.keys().any(|id| self.reference_table.get(id.0).is_none())
    }

    /// Record that encryption was added, removed, or reconfigured
    /// since load; consulted by `can_save_incrementally`.
    pub(crate) fn note_encryption_change(&mut self, blocker: Blocker) {
        self.encryption_changed_since_load = Some(blocker);
    }

    /// Reset the encryption-change blocker, establishing the
    /// document's current encryption state as the new baseline. Called
    /// after a successful full save, which is itself a fresh "load
    /// point" for the purposes of a subsequent incremental save.
    pub(crate) fn clear_encryption_change(&mut self) {
        self.encryption_changed_since_load = None;
    }

    /// Compare the trailer's current `/Encrypt` presence against
    /// `encrypted_at_load` and a caller's save-time encryption request,
    /// recording whichever `Blocker` applies. Called by both save paths
    /// before `incremental_save_blocker` is consulted, so a direct
    /// trailer mutation (`trailer.remove(b"Encrypt")`, or setting one by
    /// hand) is caught the same as a `SaveOptions::encryption` request.
    pub(crate) fn sync_encryption_blocker(&mut self, requested_new_encryption: bool) {
        let now_encrypted = self.is_encrypted();
        if requested_new_encryption && self.encrypted_at_load {
            self.note_encryption_change(Blocker::EncryptionChanged);
        } else if requested_new_encryption || (now_encrypted && !self.encrypted_at_load) {
            self.note_encryption_change(Blocker::EncryptionAdded);
        } else if !now_encrypted && self.encrypted_at_load {
            self.note_encryption_change(Blocker::EncryptionRemoved);
        }
    }

    /// The first blocker that would prevent an incremental save, in
    /// the fixed priority order linearized > brute-force-recovery >
    /// encryption-added > encryption-removed > encryption-changed.
    pub fn incremental_save_blocker(&self) -> Option<Blocker> {
        if self.was_linearized {
            return Some(Blocker::Linearized);
        }
        if self.recovered {
            return Some(Blocker::BruteForceRecovery);
        }
        self.encryption_changed_since_load
    }

    pub fn can_save_incrementally(&self) -> bool {
        self.incremental_save_blocker().is_none()
    }

    /// Walk every loaded object and clear dirty bits recursively,
    /// called after a successful save so the next `has_changes()`
    /// reflects only post-save mutation.
    pub fn clear_all_dirty_flags(&mut self) {
        for object in self.objects.values() {
            object.clear_dirty_recursive();
        }
    }

    /// Objects that carry the dirty bit somewhere beneath them, or
    /// that were allocated after load — the set an incremental save
    /// needs to (re)write.
    pub fn collect_changes(&self) -> Vec<ObjectId> {
        self.objects
            .iter()
            .filter(|(id, obj)| obj.has_dirty_descendant() || self.reference_table.get(id.0).is_none())
            .map(|(id, _)| *id)
            .collect()
    }

    /// The root `/Pages` object, if a `/Root` catalog is reachable.
    pub fn catalog(&self) -> Result<&Dictionary> {
        let root = self.trailer.get(b"Root").and_then(Object::as_reference)?;
        self.get_dictionary(root)
    }

    pub fn page_numbers(&self) -> Result<Vec<ObjectId>> {
        let catalog = self.catalog()?;
        let pages_root = catalog.get(b"Pages").and_then(Object::as_reference)?;
        let mut out = Vec::new();
        let mut seen = HashSet::new();
        self.collect_pages(pages_root, &mut out, &mut seen)?;
        Ok(out)
    }

    fn collect_pages(&self, id: ObjectId, out: &mut Vec<ObjectId>, seen: &mut HashSet<ObjectId>) -> Result<()> {
        if !seen.insert(id) {
            return Err(Error::ReferenceCycle(id));
        }
        let dict = self.get_dictionary(id)?;
        match dict.get_type() {
            Ok(t) if t == b"Page" => {
                out.push(id);
                Ok(())
            }
            Ok(t) if t == b"Pages" => {
                if let Ok(kids) = dict.get(b"Kids").and_then(Object::as_array) {
                    for kid in kids.iter() {
                        if let Ok(kid_id) = kid.as_reference() {
                            self.collect_pages(kid_id, out, seen)?;
                        }
                    }
                }
                Ok(())
            }
            _ => {
                out.push(id);
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocate_id_skips_existing_numbers() {
        let mut doc = Document::new();
        doc.objects.insert((1, 0), Object::Null);
        let id = doc.allocate_id();
        assert_eq!(id, (2, 0));
    }

    #[test]
    fn get_ref_finds_registered_object_by_identity() {
        let mut doc = Document::new();
        let dict = Dictionary::new();
        let id = doc.add_new_object(Object::Dictionary(dict));

        let found = doc.get_ref(doc.get_object(id).unwrap());
        assert_eq!(found, Some(id));
    }

    #[test]
    fn get_ref_returns_none_for_unregistered_value() {
        let doc = Document::new();
        let stray = Object::Dictionary(Dictionary::new());
        assert_eq!(doc.get_ref(&stray), None);
    }

    #[test]
    fn has_changes_detects_dirty_descendant() {
        let mut doc = Document::new();
        let mut dict = Dictionary::new();
        dict.set(b"A".to_vec(), Object::Integer(1));
        doc.objects.insert((1, 0), Object::Dictionary(dict));
        doc.reference_table.insert(1, crate::xref::XrefEntry::Normal { offset: 0, generation: 0 });
        assert!(doc.has_changes());
        doc.clear_all_dirty_flags();
        assert!(!doc.has_changes());
    }

    #[test]
    fn new_object_not_in_xref_counts_as_a_change() {
        let mut doc = Document::new();
        doc.add_new_object(Object::Integer(9));
        assert!(doc.has_changes());
    }
}
