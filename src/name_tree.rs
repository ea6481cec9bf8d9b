//! Name trees: a sorted `String -> Object` mapping stored as either a
//! flat `/Names` leaf or a hierarchy of `/Kids` nodes with `/Limits`.
//! Generalized from the one fixed use (named destinations) into the
//! reusable tree this core exposes.

use std::cmp::Ordering;
use std::collections::HashSet;

use log::warn;

use crate::dictionary::Dictionary;
use crate::document::Document;
use crate::error::Result;
use crate::object::{Array, Object};
use crate::object_id::ObjectId;

const MAX_DEPTH: u32 = 10;

/// A name tree's entries, flattened and sorted. Built fresh via
/// `NameTree::build`, or read out of a loaded document via
/// `NameTree::read`.
#[derive(Debug, Clone, Default)]
pub struct NameTree {
    entries: Vec<(Vec<u8>, Object)>,
}

impl NameTree {
    pub fn new() -> Self {
        NameTree::default()
    }

    /// Sort `entries` by key and keep them as a single flat leaf.
    /// Hierarchical splitting is left for a future optimization.
    pub fn build(mut entries: Vec<(Vec<u8>, Object)>) -> Self {
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        NameTree { entries }
    }

    /// Walk a loaded `/Kids`+`/Names` tree rooted at `root`, collecting
    /// every leaf entry. BFS with per-ref cycle detection and a depth
    /// cap of 10; a cycle or depth overrun stops the walk and the
    /// caller is left with whatever was collected so far (e.g. a
    /// self-referencing `Kids[0]` yields zero entries, not an error).
    /// A kid that fails to resolve is skipped and logged rather than
    /// aborting the whole walk: one corrupt branch shouldn't blank out
    /// every other entry in the tree.
    pub fn read(document: &Document, root: ObjectId) -> Result<Self> {
        let mut entries = Vec::new();
        let mut seen = HashSet::new();
        let mut queue = std::collections::VecDeque::new();
        queue.push_back((root, 0u32));
        while let Some((id, depth)) = queue.pop_front() {
            if depth > MAX_DEPTH || !seen.insert(id) {
                continue;
            }
            let dict = match document.get_dictionary(id) {
                Ok(dict) => dict,
                Err(e) => {
                    warn!("name tree: skipping unresolvable node {id:?}: {e:?}");
                    continue;
                }
            };
            collect_node(document, dict, depth, &mut entries, &mut queue);
        }
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(NameTree { entries })
    }

    /// Targeted lookup against a loaded tree without flattening it
    /// first: binary search each level's `/Kids` by `/Limits` to pick
    /// the one subtree that could hold `key`, descend into only that
    /// one, then binary search the resolved leaf's `/Names`. A corrupt
    /// or unreachable kid in a branch this walk never enters can't
    /// affect the result, unlike `read` followed by `get`.
    pub fn lookup(document: &Document, root: ObjectId, key: &[u8]) -> Result<Option<Object>> {
        let mut current = root;
        let mut seen = HashSet::new();
        for _ in 0..=MAX_DEPTH {
            if !seen.insert(current) {
                return Ok(None);
            }
            let dict = document.get_dictionary(current)?;
            if let Ok(kids) = dict.get(b"Kids").and_then(Object::as_array) {
                match find_kid_in_limits(document, kids, key) {
                    Some(kid_id) => {
                        current = kid_id;
                        continue;
                    }
                    None => return Ok(None),
                }
            }
            return match dict.get(b"Names").and_then(Object::as_array) {
                Ok(names) => Ok(binary_search_names(names, key)),
                Err(_) => Ok(None),
            };
        }
        Ok(None)
    }

    pub fn entries(&self) -> &[(Vec<u8>, Object)] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Binary search by key; absent if `key` was never inserted.
    pub fn get(&self, key: &[u8]) -> Option<&Object> {
        self.entries.binary_search_by(|(k, _)| k.as_slice().cmp(key)).ok().map(|i| &self.entries[i].1)
    }

    /// Emit a flat leaf dictionary: `<< /Names [k1 v1 k2 v2 ...] >>`.
    pub fn to_dictionary(&self) -> Dictionary {
        let mut names = crate::object::Array::new();
        for (key, value) in &self.entries {
            names.push(Object::string_literal(key.clone()));
            names.push(value.clone());
        }
        let mut dict = Dictionary::new();
        dict.set(b"Names".to_vec(), Object::Array(names));
        dict
    }
}

fn collect_node(
    document: &Document,
    dict: &Dictionary,
    depth: u32,
    entries: &mut Vec<(Vec<u8>, Object)>,
    queue: &mut std::collections::VecDeque<(ObjectId, u32)>,
) {
    if let Ok(kids) = dict.get(b"Kids").and_then(Object::as_array) {
        for kid in kids.iter() {
            if let Ok(kid_id) = kid.as_reference() {
                queue.push_back((kid_id, depth + 1));
            }
        }
    }
    if let Ok(names) = dict.get(b"Names").and_then(Object::as_array) {
        let mut iter = names.iter();
        while let (Some(key), Some(value)) = (iter.next(), iter.next()) {
            if let Ok(bytes) = key.as_str() {
                entries.push((bytes.to_vec(), value.clone()));
            }
        }
    }
}

fn find_kid_in_limits(document: &Document, kids: &Array, key: &[u8]) -> Option<ObjectId> {
    kids.iter().find_map(|kid| {
        let kid_id = kid.as_reference().ok()?;
        let kid_dict = document.get_dictionary(kid_id).ok()?;
        let limits = kid_dict.get(b"Limits").and_then(Object::as_array).ok()?;
        let min = limits.get(0)?.as_str().ok()?;
        let max = limits.get(1)?.as_str().ok()?;
        (key >= min && key <= max).then_some(kid_id)
    })
}

/// Paired binary search over a flat `[k1 v1 k2 v2 ...]` `/Names` array.
fn binary_search_names(names: &Array, key: &[u8]) -> Option<Object> {
    let pairs = names.len() / 2;
    let (mut lo, mut hi) = (0usize, pairs);
    while lo < hi {
        let mid = lo + (hi - lo) / 2;
        let candidate = names.get(mid * 2)?.as_str().ok()?;
        match candidate.cmp(key) {
            Ordering::Equal => return names.get(mid * 2 + 1).cloned(),
            Ordering::Less => lo = mid + 1,
            Ordering::Greater => hi = mid,
        }
    }
    None
}

impl Document {
    /// Resolve `trailer/Root/Names/<name_key>` and read it as a name
    /// tree, e.g. `document.read_name_tree(b"Dests")`.
    pub fn read_name_tree(&self, name_key: &[u8]) -> Result<NameTree> {
        let catalog = self.catalog()?;
        let names_dict_id = catalog.get(b"Names").and_then(Object::as_reference)?;
        let names_dict = self.get_dictionary(names_dict_id)?;
        let tree_root = names_dict.get(name_key).and_then(Object::as_reference)?;
        NameTree::read(self, tree_root)
    }

    /// Resolve `trailer/Root/Names/<name_key>` and look up one entry by
    /// `/Limits`-guided descent, without reading the whole tree.
    pub fn lookup_name(&self, name_key: &[u8], key: &[u8]) -> Result<Option<Object>> {
        let catalog = self.catalog()?;
        let names_dict_id = catalog.get(b"Names").and_then(Object::as_reference)?;
        let names_dict = self.get_dictionary(names_dict_id)?;
        let tree_root = names_dict.get(name_key).and_then(Object::as_reference)?;
        NameTree::lookup(self, tree_root, key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(n: usize) -> Vec<u8> {
        format!("key{n:03}").into_bytes()
    }

    #[test]
    fn build_sorts_and_lookup_binary_searches() {
        let entries: Vec<_> = (0..100).rev().map(|i| (key(i), Object::Integer(i as i64))).collect();
        let tree = NameTree::build(entries);
        assert_eq!(tree.len(), 100);
        assert_eq!(tree.get(&key(0)), Some(&Object::Integer(0)));
        assert_eq!(tree.get(&key(50)), Some(&Object::Integer(50)));
        assert_eq!(tree.get(&key(99)), Some(&Object::Integer(99)));
        assert_eq!(tree.get(&key(100)), None);
    }

    #[test]
    fn read_detects_self_referencing_kid_and_yields_nothing() {
        let mut document = Document::new();
        let mut root = Dictionary::new();
        let mut kids = crate::object::Array::new();
        kids.push(Object::reference((1, 0)));
        root.set(b"Kids".to_vec(), Object::Array(kids));
        document.objects.insert((1, 0), Object::Dictionary(root));

        let tree = NameTree::read(&document, (1, 0)).unwrap();
        assert!(tree.is_empty());
    }

    #[test]
    fn to_dictionary_round_trips_through_read() {
        let tree = NameTree::build(vec![(b"a".to_vec(), Object::Integer(1)), (b"b".to_vec(), Object::Integer(2))]);
        let dict = tree.to_dictionary();

        let mut document = Document::new();
        document.objects.insert((1, 0), Object::Dictionary(dict));
        let read_back = NameTree::read(&document, (1, 0)).unwrap();
        assert_eq!(read_back.get(b"a"), Some(&Object::Integer(1)));
        assert_eq!(read_back.get(b"b"), Some(&Object::Integer(2)));
    }

    fn leaf(document: &mut Document, id: ObjectId, names: &[(&[u8], i64)]) {
        let mut arr = crate::object::Array::new();
        for (k, v) in names {
            arr.push(Object::string_literal(k.to_vec()));
            arr.push(Object::Integer(*v));
        }
        let mut dict = Dictionary::new();
        let limits = crate::object::Array::from(vec![
            Object::string_literal(names.first().unwrap().0.to_vec()),
            Object::string_literal(names.last().unwrap().0.to_vec()),
        ]);
        dict.set(b"Limits".to_vec(), Object::Array(limits));
        dict.set(b"Names".to_vec(), Object::Array(arr));
        document.objects.insert(id, Object::Dictionary(dict));
    }

    fn two_level_tree() -> Document {
        let mut document = Document::new();
        leaf(&mut document, (2, 0), &[(b"apple", 1), (b"banana", 2)]);
        leaf(&mut document, (3, 0), &[(b"mango", 3), (b"peach", 4)]);

        let mut kids = crate::object::Array::new();
        kids.push(Object::reference((2, 0)));
        kids.push(Object::reference((3, 0)));
        let mut root = Dictionary::new();
        root.set(b"Kids".to_vec(), Object::Array(kids));
        document.objects.insert((1, 0), Object::Dictionary(root));
        document
    }

    #[test]
    fn lookup_descends_only_the_matching_kid() {
        let document = two_level_tree();
        assert_eq!(NameTree::lookup(&document, (1, 0), b"banana").unwrap(), Some(Object::Integer(2)));
        assert_eq!(NameTree::lookup(&document, (1, 0), b"mango").unwrap(), Some(Object::Integer(3)));
        assert_eq!(NameTree::lookup(&document, (1, 0), b"zzz").unwrap(), None);
    }

    #[test]
    fn lookup_ignores_a_corrupt_sibling_branch() {
        let mut document = two_level_tree();
        // Break the /Limits on the branch that doesn't hold the key
        // being looked up; `lookup` must never need to resolve it.
        document.objects.remove(&(3, 0));

        assert_eq!(NameTree::lookup(&document, (1, 0), b"apple").unwrap(), Some(Object::Integer(1)));
    }

    #[test]
    fn read_skips_an_unresolvable_kid_instead_of_failing_the_whole_tree() {
        let mut document = two_level_tree();
        document.objects.remove(&(3, 0));

        let tree = NameTree::read(&document, (1, 0)).unwrap();
        assert_eq!(tree.get(b"apple"), Some(&Object::Integer(1)));
        assert_eq!(tree.get(b"banana"), Some(&Object::Integer(2)));
        assert_eq!(tree.get(b"mango"), None);
    }
}
