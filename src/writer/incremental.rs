//! The append-only incremental serializer: every byte of the loaded
//! document is preserved verbatim, and only the changed/new objects
//! plus a fresh xref section and trailer are appended after the
//! original EOF.

use std::collections::BTreeMap;

use crate::config::SaveOptions;
use crate::document::Document;
use crate::error::{Error, Result};
use crate::object::{Array, Object, StringFormat};

use super::encode::write_value;
use super::regenerate_id_component;

pub(super) fn write_incremental(document: &mut Document, options: &SaveOptions) -> Result<Vec<u8>> {
    if let Some(blocker) = document.incremental_save_blocker() {
        return Err(Error::IncrementalSaveBlocked(blocker));
    }

    let changed = document.collect_changes();
    let original = document.source_bytes.clone().ok_or(Error::Unsupported(
        "incremental save requires a document loaded from bytes (source_bytes is unset)",
    ))?;

    if changed.is_empty() {
        return Ok(original);
    }

    let mut out = original.clone();
    if !out.ends_with(b"\n") && !out.ends_with(b"\r") {
        out.push(b'\n');
    }

    let mut sorted_ids = changed;
    sorted_ids.sort();

    let mut offsets: BTreeMap<u32, (u32, u16)> = BTreeMap::new();
    for &(num, generation) in &sorted_ids {
        let offset = out.len() as u32;
        offsets.insert(num, (offset, generation));

        let object = document.get_object((num, generation))?.clone();
        out.extend_from_slice(format!("{num} {generation} obj\n").as_bytes());
        write_value(&mut out, &object);
        out.extend_from_slice(b"\nendobj\n");
    }

    let xref_offset = out.len();
    out.extend_from_slice(b"xref\n");
    write_incremental_xref_sections(&mut out, &offsets);

    let previous_xref_start = document.xref_start;
    let id0 = document
        .trailer
        .get(b"ID")
        .ok()
        .and_then(|id| id.as_array().ok())
        .and_then(|arr| arr.get(0))
        .and_then(|first| first.as_str().ok())
        .map(|b| b.to_vec())
        .unwrap_or_else(|| regenerate_id_component(document, b"id0"));
    let id1 = regenerate_id_component(document, b"id1");
    let mut id_array = Array::new();
    id_array.push(Object::String(id0, StringFormat::Hex));
    id_array.push(Object::String(id1, StringFormat::Hex));

    let mut trailer = crate::dictionary::Dictionary::new();
    if let Ok(root) = document.trailer.get(b"Root") {
        trailer.set(b"Root".to_vec(), root.clone());
    }
    if let Ok(info) = document.trailer.get(b"Info") {
        trailer.set(b"Info".to_vec(), info.clone());
    }
    trailer.set(b"ID".to_vec(), Object::Array(id_array));
    trailer.set(b"Size".to_vec(), Object::Integer(document.max_id as i64 + 1));
    trailer.set(b"Prev".to_vec(), Object::Integer(previous_xref_start as i64));

    out.extend_from_slice(b"trailer\n");
    write_value(&mut out, &Object::Dictionary(trailer));
    out.push(b'\n');
    out.extend_from_slice(format!("startxref\n{xref_offset}\n%%EOF\n").as_bytes());

    document.xref_start = xref_offset;
    document.clear_all_dirty_flags();
    document.source_bytes = Some(out.clone());
    Ok(out)
}

/// One subsection per contiguous run of object numbers in `offsets`,
/// plus the mandatory `0 1` free-list-head row. Reuses the full
/// serializer's per-row formatting.
fn write_incremental_xref_sections(out: &mut Vec<u8>, offsets: &BTreeMap<u32, (u32, u16)>) {
    out.extend_from_slice(b"0 1\n0000000000 65535 f \n");

    let numbers: Vec<u32> = offsets.keys().copied().collect();
    let mut i = 0;
    while i < numbers.len() {
        let start = numbers[i];
        let mut end = start;
        let mut j = i;
        while j + 1 < numbers.len() && numbers[j + 1] == end + 1 {
            end += 1;
            j += 1;
        }
        out.extend_from_slice(format!("{start} {}\n", end - start + 1).as_bytes());
        for num in start..=end {
            let (offset, generation) = offsets[&num];
            out.extend_from_slice(format!("{offset:010} {generation:05} n \n").as_bytes());
        }
        i = j + 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dictionary::Dictionary;

    fn loaded_two_object_document(source_bytes: Vec<u8>) -> Document {
        let mut document = Document::new();
        let mut catalog = Dictionary::new();
        catalog.set(b"Type".to_vec(), Object::name(b"Catalog".to_vec()));
        document.objects.insert((1, 0), Object::Dictionary(catalog));
        let mut page = Dictionary::new();
        page.set(b"Type".to_vec(), Object::name(b"Page".to_vec()));
        document.objects.insert((2, 0), Object::Dictionary(page));
        document.max_id = 2;
        document.trailer.set(b"Root".to_vec(), Object::reference((1, 0)));
        document.reference_table.insert(1, crate::xref::XrefEntry::Normal { offset: 10, generation: 0 });
        document.reference_table.insert(2, crate::xref::XrefEntry::Normal { offset: 60, generation: 0 });
        document.xref_start = 120;
        document.source_bytes = Some(source_bytes);
        document.clear_all_dirty_flags();
        document
    }

    #[test]
    fn no_changes_returns_original_bytes_unchanged() {
        let original = b"%PDF-1.4\n...original bytes...\n%%EOF\n".to_vec();
        let mut document = loaded_two_object_document(original.clone());
        let saved = document.save_with_options(&SaveOptions::incremental()).unwrap();
        assert_eq!(saved, original);
    }

    #[test]
    fn mutation_preserves_original_prefix_and_appends_changes() {
        let original = b"%PDF-1.4\n...original bytes...\n%%EOF\n".to_vec();
        let mut document = loaded_two_object_document(original.clone());
        document.get_object_mut((2, 0)).unwrap().as_dict_mut().unwrap().set(b"Rotate".to_vec(), Object::Integer(90));

        let saved = document.save_with_options(&SaveOptions::incremental()).unwrap();
        assert!(saved.len() > original.len());
        assert_eq!(&saved[..original.len()], original.as_slice());

        let text = String::from_utf8_lossy(&saved[original.len()..]);
        assert!(text.contains("2 0 obj"));
        assert!(!text.contains("1 0 obj"));
        assert!(text.contains(&format!("/Prev {}", 120)));
    }

    #[test]
    fn linearized_document_blocks_incremental_save() {
        let mut document = loaded_two_object_document(b"%PDF-1.4\n%%EOF\n".to_vec());
        document.was_linearized = true;
        document.get_object_mut((1, 0)).unwrap().as_dict_mut().unwrap().set(b"X".to_vec(), Object::Integer(1));
        let err = document.save_with_options(&SaveOptions::incremental()).unwrap_err();
        assert!(matches!(err, Error::IncrementalSaveBlocked(crate::error::Blocker::Linearized)));
    }
}
