//! The cross-reference table: one in-memory map regardless of whether
//! it was read from a classical table, an xref stream, or a hybrid of
//! both, plus the synthetic map brute-force recovery installs.

use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XrefType {
    Table,
    Stream,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XrefEntry {
    Free { next_free: u32, generation: u16 },
    Normal { offset: u32, generation: u16 },
    Compressed { container: u32, index: u32 },
    /// A free-list head row (`0 1` subsection) whose generation is
    /// 65535 and that never becomes a real object; kept distinct from
    /// `Free` so the writer can special-case it without guessing.
    UnusableFree,
}

#[derive(Debug, Clone)]
pub struct Xref {
    pub entries: BTreeMap<u32, XrefEntry>,
    pub size: u32,
    pub xref_type: XrefType,
}

impl Xref {
    pub fn new(size: u32, xref_type: XrefType) -> Self {
        Xref {
            entries: BTreeMap::new(),
            size,
            xref_type,
        }
    }

    pub fn insert(&mut self, object_number: u32, entry: XrefEntry) {
        self.entries.insert(object_number, entry);
    }

    pub fn get(&self, object_number: u32) -> Option<&XrefEntry> {
        self.entries.get(&object_number)
    }

    pub fn max_id(&self) -> u32 {
        self.entries.keys().next_back().copied().unwrap_or(0)
    }

    /// Merge an older xref section (reached via `/Prev`) into this
    /// one. Per §4.3's resolution policy, the newest entry for each
    /// object number wins, so only numbers absent from `self` are
    /// taken from `older`.
    pub fn merge(&mut self, older: Xref) {
        for (number, entry) in older.entries {
            self.entries.entry(number).or_insert(entry);
        }
        self.size = self.size.max(older.size);
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_prefers_newer_entries() {
        let mut newer = Xref::new(3, XrefType::Table);
        newer.insert(1, XrefEntry::Normal { offset: 100, generation: 0 });

        let mut older = Xref::new(3, XrefType::Table);
        older.insert(1, XrefEntry::Normal { offset: 9, generation: 0 });
        older.insert(2, XrefEntry::Normal { offset: 50, generation: 0 });

        newer.merge(older);

        assert_eq!(newer.get(1), Some(&XrefEntry::Normal { offset: 100, generation: 0 }));
        assert_eq!(newer.get(2), Some(&XrefEntry::Normal { offset: 50, generation: 0 }));
    }
}
