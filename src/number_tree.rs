//! Number trees: the same `/Kids`+`/Limits` structure as the name
//! tree, keyed by integer instead of string (`/Nums` instead of
//! `/Names`). Used by `/PageLabels` and structure-tree parent maps. No
//! new algorithm — the walk is the one `name_tree.rs` already
//! implements, generalized over `i64` keys.

use std::cmp::Ordering;
use std::collections::HashSet;

use log::warn;

use crate::dictionary::Dictionary;
use crate::document::Document;
use crate::error::Result;
use crate::object::{Array, Object};
use crate::object_id::ObjectId;

const MAX_DEPTH: u32 = 10;

#[derive(Debug, Clone, Default)]
pub struct NumberTree {
    entries: Vec<(i64, Object)>,
}

impl NumberTree {
    pub fn new() -> Self {
        NumberTree::default()
    }

    pub fn build(mut entries: Vec<(i64, Object)>) -> Self {
        entries.sort_by_key(|(k, _)| *k);
        NumberTree { entries }
    }

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
                    warn!("number tree: skipping unresolvable node {id:?}: {e:?}");
                    continue;
                }
            };
            collect_node(dict, depth, &mut entries, &mut queue);
        }
        entries.sort_by_key(|(k, _)| *k);
        Ok(NumberTree { entries })
    }

    /// Targeted lookup against a loaded tree without flattening it
    /// first: binary search each level's `/Kids` by `/Limits`, descend
    /// into only the one subtree that could hold `key`, then binary
    /// search the resolved leaf's `/Nums`.
    pub fn lookup(document: &Document, root: ObjectId, key: i64) -> Result<Option<Object>> {
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
            return match dict.get(b"Nums").and_then(Object::as_array) {
                Ok(nums) => Ok(binary_search_nums(nums, key)),
                Err(_) => Ok(None),
            };
        }
        Ok(None)
    }

    pub fn entries(&self) -> &[(i64, Object)] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn get(&self, key: i64) -> Option<&Object> {
        self.entries.binary_search_by_key(&key, |(k, _)| *k).ok().map(|i| &self.entries[i].1)
    }

    pub fn to_dictionary(&self) -> Dictionary {
        let mut nums = crate::object::Array::new();
        for (key, value) in &self.entries {
            nums.push(Object::Integer(*key));
            nums.push(value.clone());
        }
        let mut dict = Dictionary::new();
        dict.set(b"Nums".to_vec(), Object::Array(nums));
        dict
    }
}

fn collect_node(
    dict: &Dictionary,
    depth: u32,
    entries: &mut Vec<(i64, Object)>,
    queue: &mut std::collections::VecDeque<(ObjectId, u32)>,
) {
    if let Ok(kids) = dict.get(b"Kids").and_then(Object::as_array) {
        for kid in kids.iter() {
            if let Ok(kid_id) = kid.as_reference() {
                queue.push_back((kid_id, depth + 1));
            }
        }
    }
    if let Ok(nums) = dict.get(b"Nums").and_then(Object::as_array) {
        let mut iter = nums.iter();
        while let (Some(key), Some(value)) = (iter.next(), iter.next()) {
            if let Ok(n) = key.as_i64() {
                entries.push((n, value.clone()));
            }
        }
    }
}

fn find_kid_in_limits(document: &Document, kids: &Array, key: i64) -> Option<ObjectId> {
    kids.iter().find_map(|kid| {
        let kid_id = kid.as_reference().ok()?;
        let kid_dict = document.get_dictionary(kid_id).ok()?;
        let limits = kid_dict.get(b"Limits").and_then(Object::as_array).ok()?;
        let min = limits.get(0)?.as_i64().ok()?;
        let max = limits.get(1)?.as_i64().ok()?;
        (key >= min && key <= max).then_some(kid_id)
    })
}

/// Paired binary search over a flat `[k1 v1 k2 v2 ...]` `/Nums` array.
fn binary_search_nums(nums: &Array, key: i64) -> Option<Object> {
    let pairs = nums.len() / 2;
    let (mut lo, mut hi) = (0usize, pairs);
    while lo < hi {
        let mid = lo + (hi - lo) / 2;
        let candidate = nums.get(mid * 2)?.as_i64().ok()?;
        match candidate.cmp(&key) {
            Ordering::Equal => return nums.get(mid * 2 + 1).cloned(),
            Ordering::Less => lo = mid + 1,
            Ordering::Greater => hi = mid,
        }
    }
    None
}

impl Document {
    pub fn read_number_tree(&self, root: ObjectId) -> Result<NumberTree> {
        NumberTree::read(self, root)
    }

    /// Look up one entry of a number tree rooted at `root` by
    /// `/Limits`-guided descent, without reading the whole tree.
    pub fn lookup_number(&self, root: ObjectId, key: i64) -> Result<Option<Object>> {
        NumberTree::lookup(self, root, key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_sorts_and_lookup_binary_searches() {
        let entries: Vec<_> = (0..50).rev().map(|i| (i, Object::Integer(i * 2))).collect();
        let tree = NumberTree::build(entries);
        assert_eq!(tree.get(0), Some(&Object::Integer(0)));
        assert_eq!(tree.get(25), Some(&Object::Integer(50)));
        assert_eq!(tree.get(49), Some(&Object::Integer(98)));
        assert_eq!(tree.get(50), None);
    }

    #[test]
    fn read_detects_cycle_and_yields_nothing() {
        let mut document = Document::new();
        let mut root = Dictionary::new();
        let mut kids = crate::object::Array::new();
        kids.push(Object::reference((1, 0)));
        root.set(b"Kids".to_vec(), Object::Array(kids));
        document.objects.insert((1, 0), Object::Dictionary(root));

        let tree = NumberTree::read(&document, (1, 0)).unwrap();
        assert!(tree.is_empty());
    }

    fn leaf(document: &mut Document, id: ObjectId, nums: &[(i64, i64)]) {
        let mut arr = crate::object::Array::new();
        for (k, v) in nums {
            arr.push(Object::Integer(*k));
            arr.push(Object::Integer(*v));
        }
        let mut dict = Dictionary::new();
        let limits = crate::object::Array::from(vec![
            Object::Integer(nums.first().unwrap().0),
            Object::Integer(nums.last().unwrap().0),
        ]);
        dict.set(b"Limits".to_vec(), Object::Array(limits));
        dict.set(b"Nums".to_vec(), Object::Array(arr));
        document.objects.insert(id, Object::Dictionary(dict));
    }

    fn two_level_tree() -> Document {
        let mut document = Document::new();
        leaf(&mut document, (2, 0), &[(0, 100), (1, 101)]);
        leaf(&mut document, (3, 0), &[(10, 110), (11, 111)]);

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
        assert_eq!(NumberTree::lookup(&document, (1, 0), 1).unwrap(), Some(Object::Integer(101)));
        assert_eq!(NumberTree::lookup(&document, (1, 0), 11).unwrap(), Some(Object::Integer(111)));
        assert_eq!(NumberTree::lookup(&document, (1, 0), 5).unwrap(), None);
    }

    #[test]
    fn lookup_ignores_a_corrupt_sibling_branch() {
        let mut document = two_level_tree();
        document.objects.remove(&(3, 0));

        assert_eq!(NumberTree::lookup(&document, (1, 0), 0).unwrap(), Some(Object::Integer(100)));
    }

    #[test]
    fn read_skips_an_unresolvable_kid_instead_of_failing_the_whole_tree() {
        let mut document = two_level_tree();
        document.objects.remove(&(3, 0));

        let tree = NumberTree::read(&document, (1, 0)).unwrap();
        assert_eq!(tree.get(0), Some(&Object::Integer(100)));
        assert_eq!(tree.get(1), Some(&Object::Integer(101)));
        assert_eq!(tree.get(10), None);
    }
}
