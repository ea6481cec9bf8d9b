//! Cross-document deep copy: copy a subgraph — most commonly a page —
//! from a source document into a destination one,
//! remapping every reference along the way and never leaving a
//! reference back into the source document's object-number space.

use std::collections::HashMap;

use crate::dictionary::Dictionary;
use crate::document::Document;
use crate::object::{Array, Object};
use crate::object_id::ObjectId;

const INHERITABLE_PAGE_KEYS: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

/// Copies objects from one `source` document into any number of
/// destination documents, one copier per source. `ref_map` survives
/// across calls so repeated copies from the same source continue to
/// dedupe and converge on shared back-references.
pub struct ObjectCopier<'a> {
    source: &'a Document,
    ref_map: HashMap<ObjectId, ObjectId>,
}

impl<'a> ObjectCopier<'a> {
    pub fn new(source: &'a Document) -> Self {
        ObjectCopier { source, ref_map: HashMap::new() }
    }

    /// Copy the object at `source_id` (and everything it transitively
    /// references) into `dest`, returning the id it now lives under.
    pub fn copy_object(&mut self, dest: &mut Document, source_id: ObjectId) -> ObjectId {
        if let Some(&dest_id) = self.ref_map.get(&source_id) {
            return dest_id;
        }

        // Allocate the destination id and register it before recursing,
        // so a back-reference encountered mid-copy resolves to this id
        // instead of recursing forever.
        let dest_id = dest.allocate_id();
        self.ref_map.insert(source_id, dest_id);

        let copied = match self.source.get_object(source_id) {
            Ok(object) => self.copy_value(dest, object),
            Err(_) => {
                dest.warn(format!("copy: missing referent {source_id:?}, substituting an empty dictionary"));
                Object::Dictionary(Dictionary::new())
            }
        };
        dest.add_object(dest_id, copied);
        dest_id
    }

    /// Copy `source_page_id` into `dest` as a standalone page dict:
    /// inherited `/Resources`, `/MediaBox`, `/CropBox`, `/Rotate` are
    /// flattened in from the page-tree ancestry first, then `/Parent`
    /// is dropped (the destination's page tree reassigns it).
    pub fn copy_page(&mut self, dest: &mut Document, source_page_id: ObjectId) -> crate::error::Result<ObjectId> {
        let flattened = self.flatten_page(source_page_id)?;
        if let Some(&dest_id) = self.ref_map.get(&source_page_id) {
            let copied = self.copy_value(dest, &Object::Dictionary(flattened));
            dest.add_object(dest_id, copied);
            return Ok(dest_id);
        }
        let dest_id = dest.allocate_id();
        self.ref_map.insert(source_page_id, dest_id);
        let copied = self.copy_value(dest, &Object::Dictionary(flattened));
        dest.add_object(dest_id, copied);
        Ok(dest_id)
    }

    fn flatten_page(&self, page_id: ObjectId) -> crate::error::Result<Dictionary> {
        let mut dict = self.source.get_dictionary(page_id)?.clone();
        let mut ancestor = dict.get(b"Parent").and_then(Object::as_reference).ok();
        let mut seen = std::collections::HashSet::from([page_id]);
        while let Some(parent_id) = ancestor {
            if !seen.insert(parent_id) {
                break;
            }
            let parent = match self.source.get_dictionary(parent_id) {
                Ok(p) => p,
                Err(_) => break,
            };
            for key in INHERITABLE_PAGE_KEYS {
                if !dict.has(key) {
                    if let Ok(value) = parent.get(key) {
                        dict.set(key.to_vec(), value.clone());
                    }
                }
            }
            ancestor = parent.get(b"Parent").and_then(Object::as_reference).ok();
        }
        dict.remove(b"Parent");
        Ok(dict)
    }

    fn copy_value(&mut self, dest: &mut Document, value: &Object) -> Object {
        match value {
            Object::Reference(r) => Object::reference(self.copy_object(dest, r.id())),
            Object::Array(items) => {
                let mut copied = Array::new();
                for item in items.iter() {
                    copied.push(self.copy_value(dest, item));
                }
                Object::Array(copied)
            }
            Object::Dictionary(d) => Object::Dictionary(self.copy_dict(dest, d)),
            Object::Stream(stream) => Object::Stream(self.copy_stream(dest, stream)),
            other => other.clone(),
        }
    }

    fn copy_dict(&mut self, dest: &mut Document, dict: &Dictionary) -> Dictionary {
        let mut copied = Dictionary::new();
        for (key, value) in dict.iter() {
            let value = self.copy_value(dest, value);
            copied.set(key.clone(), value);
        }
        copied
    }

    fn copy_stream(&mut self, dest: &mut Document, stream: &crate::stream::Stream) -> crate::stream::Stream {
        let dict = self.copy_dict(dest, &stream.dict);
        if self.source.is_encrypted() {
            match stream.decompressed_content().and_then(|plain| crate::filters::encode_chain(&dict, &plain)) {
                Ok(encoded) => crate::stream::Stream::new(dict, encoded),
                Err(_) => match stream.decompressed_content() {
                    Ok(plain) => {
                        let mut plain_dict = dict;
                        plain_dict.remove(b"Filter");
                        plain_dict.remove(b"DecodeParms");
                        crate::stream::Stream::new(plain_dict, plain)
                    }
                    Err(_) => crate::stream::Stream::new(dict, Vec::new()),
                },
            }
        } else {
            crate::stream::Stream::new(dict, stream.raw_content().to_vec())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::Array;

    #[test]
    fn copy_object_dedupes_back_references() {
        let mut source = Document::new();
        let mut a = Dictionary::new();
        a.set(b"Next".to_vec(), Object::reference((2, 0)));
        let mut b = Dictionary::new();
        b.set(b"Back".to_vec(), Object::reference((1, 0)));
        source.objects.insert((1, 0), Object::Dictionary(a));
        source.objects.insert((2, 0), Object::Dictionary(b));

        let mut dest = Document::new();
        let mut copier = ObjectCopier::new(&source);
        let dest_a = copier.copy_object(&mut dest, (1, 0));
        let dest_b_via_a = dest.get_dictionary(dest_a).unwrap().get(b"Next").and_then(Object::as_reference).unwrap();
        let back = dest.get_dictionary(dest_b_via_a).unwrap().get(b"Back").and_then(Object::as_reference).unwrap();
        assert_eq!(back, dest_a);
    }

    #[test]
    fn copy_page_flattens_inherited_mediabox_and_drops_parent() {
        let mut source = Document::new();
        let mut root_pages = Dictionary::new();
        root_pages.set(b"Type".to_vec(), Object::name(b"Pages".to_vec()));
        let mediabox = Object::Array(Array::from(vec![
            Object::Integer(0),
            Object::Integer(0),
            Object::Integer(612),
            Object::Integer(792),
        ]));
        root_pages.set(b"MediaBox".to_vec(), mediabox.clone());
        source.objects.insert((1, 0), Object::Dictionary(root_pages));

        let mut mid_pages = Dictionary::new();
        mid_pages.set(b"Type".to_vec(), Object::name(b"Pages".to_vec()));
        mid_pages.set(b"Parent".to_vec(), Object::reference((1, 0)));
        source.objects.insert((2, 0), Object::Dictionary(mid_pages));

        let mut page = Dictionary::new();
        page.set(b"Type".to_vec(), Object::name(b"Page".to_vec()));
        page.set(b"Parent".to_vec(), Object::reference((2, 0)));
        source.objects.insert((3, 0), Object::Dictionary(page));

        let mut dest = Document::new();
        let mut copier = ObjectCopier::new(&source);
        let dest_id = copier.copy_page(&mut dest, (3, 0)).unwrap();

        let copied = dest.get_dictionary(dest_id).unwrap();
        assert_eq!(copied.get(b"MediaBox").unwrap(), &mediabox);
        assert!(!copied.has(b"Parent"));
    }
}
