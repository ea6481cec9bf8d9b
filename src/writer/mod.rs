//! The full (from-scratch) serializer. The incremental, append-only
//! serializer lives in `incremental.rs` and shares the object-value
//! encoder in `encode.rs`.

pub(crate) mod encode;
mod incremental;

use std::collections::BTreeMap;

use md5::{Digest, Md5};

use crate::config::SaveOptions;
use crate::dictionary::Dictionary;
use crate::document::Document;
use crate::encryption;
use crate::error::{Error, Result};
use crate::object::{Array, Object, StringFormat};
use crate::object_id::ObjectId;
use encode::write_value;

impl Document {
    /// Write the whole document from scratch.
    pub fn save(&mut self) -> Result<Vec<u8>> {
        self.save_with_options(&SaveOptions::new())
    }

    /// `options.incremental` selects the append-only path (which fails
    /// with the first applicable `Blocker` via `IncrementalSaveBlocked`
    /// if one applies); `options.encryption`, when set, (re)configures
    /// the standard security handler as part of a full save.
    pub fn save_with_options(&mut self, options: &SaveOptions) -> Result<Vec<u8>> {
        self.sync_encryption_blocker(options.encryption.is_some());
        if options.incremental {
            incremental::write_incremental(self, options)
        } else {
            write_full(self, options)
        }
    }
}

/// Content-based `/ID` component: this exercise has no wall-clock
/// time available, so both full-save `/ID` elements and an
/// incremental save's regenerated `/ID[1]` are derived from a hash of
/// document state rather than randomness or the current time.
fn regenerate_id_component(document: &Document, salt: &[u8]) -> Vec<u8> {
    let mut hasher = Md5::new();
    hasher.update(document.version.as_bytes());
    hasher.update((document.objects.len() as u64).to_le_bytes());
    hasher.update((document.max_id as u64).to_le_bytes());
    hasher.update(salt);
    hasher.finalize().to_vec()
}

fn existing_id0(document: &Document) -> Option<Vec<u8>> {
    document.trailer.get(b"ID").ok()?.as_array().ok()?.get(0)?.as_str().ok().map(|b| b.to_vec())
}

/// The object id of the current `/Encrypt` dictionary, if the trailer
/// names one by reference. Its own strings (`/O`, `/U`, …) must never
/// be run through the cipher they themselves configure.
fn encrypt_dict_object_id(document: &Document) -> Option<ObjectId> {
    document.trailer.get(b"Encrypt").ok().and_then(|o| o.as_reference().ok())
}

fn write_classical_xref_table(out: &mut Vec<u8>, offsets: &BTreeMap<u32, (u32, u16)>, max_id: u32) {
    let count = max_id + 1;
    out.extend_from_slice(format!("0 {count}\n").as_bytes());
    out.extend_from_slice(b"0000000000 65535 f \n");
    for num in 1..count {
        match offsets.get(&num) {
            Some(&(offset, generation)) => {
                out.extend_from_slice(format!("{offset:010} {generation:05} n \n").as_bytes());
            }
            None => out.extend_from_slice(b"0000000000 00000 f \n"),
        }
    }
}

fn write_full(document: &mut Document, options: &SaveOptions) -> Result<Vec<u8>> {
    let mut new_encrypt_object_id = None;

    if let Some(spec) = &options.encryption {
        let id0 = existing_id0(document).unwrap_or_else(|| regenerate_id_component(document, b"id0"));
        let (state, dict) =
            encryption::setup_new_encryption(&spec.owner_password, &spec.user_password, spec.method, spec.key_length_bits, &id0)
                .map_err(Error::Decryption)?;
        let id = document.add_new_object(Object::Dictionary(dict));
        document.trailer.set(b"Encrypt".to_vec(), Object::reference(id));
        document.encryption_state = Some(state);
        new_encrypt_object_id = Some(id);
    }

    let encrypt_object_id = new_encrypt_object_id.or_else(|| encrypt_dict_object_id(document));

    let id0 = existing_id0(document).unwrap_or_else(|| regenerate_id_component(document, b"id0"));
    let id1 = regenerate_id_component(document, b"id1");
    let mut id_array = Array::new();
    id_array.push(Object::String(id0, StringFormat::Hex));
    id_array.push(Object::String(id1, StringFormat::Hex));
    document.trailer.set(b"ID".to_vec(), Object::Array(id_array));

    let mut out = Vec::new();
    out.extend_from_slice(format!("%PDF-{}\n", document.version).as_bytes());
    out.push(b'%');
    out.extend_from_slice(&document.binary_mark);
    out.push(b'\n');

    let encryption_state = document.encryption_state.clone();
    let mut offsets: BTreeMap<u32, (u32, u16)> = BTreeMap::new();
    let object_ids: Vec<ObjectId> = document.objects.keys().copied().collect();
    for id @ (num, generation) in object_ids {
        let offset = out.len() as u32;
        offsets.insert(num, (offset, generation));

        let mut object = document.get_object(id)?.clone();
        if let Some(state) = &encryption_state {
            if Some(id) != encrypt_object_id {
                encryption::encrypt_object(state, id, &mut object).map_err(Error::Decryption)?;
            }
        }

        out.extend_from_slice(format!("{num} {generation} obj\n").as_bytes());
        write_value(&mut out, &object);
        out.extend_from_slice(b"\nendobj\n");
    }

    let xref_offset = out.len();
    out.extend_from_slice(b"xref\n");
    write_classical_xref_table(&mut out, &offsets, document.max_id);

    let mut trailer: Dictionary = document.trailer.clone();
    trailer.set(b"Size".to_vec(), Object::Integer(document.max_id as i64 + 1));
    trailer.remove(b"Prev");
    out.extend_from_slice(b"trailer\n");
    write_value(&mut out, &Object::Dictionary(trailer));
    out.push(b'\n');

    out.extend_from_slice(format!("startxref\n{xref_offset}\n%%EOF\n").as_bytes());

    document.xref_start = xref_offset;
    document.recovered = false;
    document.was_linearized = false;
    document.encrypted_at_load = document.is_encrypted();
    document.clear_encryption_change();
    document.clear_all_dirty_flags();
    document.source_bytes = Some(out.clone());
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dictionary::Dictionary as Dict;

    fn minimal_document() -> Document {
        let mut document = Document::new();
        let mut catalog = Dict::new();
        catalog.set(b"Type".to_vec(), Object::name(b"Catalog".to_vec()));
        catalog.set(b"Pages".to_vec(), Object::reference((2, 0)));
        document.objects.insert((1, 0), Object::Dictionary(catalog));

        let mut pages = Dict::new();
        pages.set(b"Type".to_vec(), Object::name(b"Pages".to_vec()));
        pages.set(b"Kids".to_vec(), Object::Array(Array::from(vec![])));
        pages.set(b"Count".to_vec(), Object::Integer(0));
        document.objects.insert((2, 0), Object::Dictionary(pages));

        document.max_id = 2;
        document.trailer.set(b"Root".to_vec(), Object::reference((1, 0)));
        document
    }

    #[test]
    fn full_save_emits_header_body_xref_and_trailer() {
        let mut document = minimal_document();
        let bytes = document.save().unwrap();
        let text = String::from_utf8_lossy(&bytes);
        assert!(text.starts_with("%PDF-1.5\n"));
        assert!(text.contains("1 0 obj"));
        assert!(text.contains("2 0 obj"));
        assert!(text.contains("xref\n"));
        assert!(text.contains("trailer\n"));
        assert!(text.ends_with("%%EOF\n"));
    }

    #[test]
    fn full_save_clears_dirty_flags_and_records_source_bytes() {
        let mut document = minimal_document();
        document.get_object_mut((1, 0)).unwrap().as_dict_mut().unwrap().set(b"Extra".to_vec(), Object::Integer(1));
        assert!(document.has_changes());
        let bytes = document.save().unwrap();
        assert!(!document.has_changes());
        assert_eq!(document.source_bytes.as_deref(), Some(bytes.as_slice()));
    }

    #[test]
    fn incremental_save_with_new_encryption_raises_blocker_instead_of_dropping_it() {
        let mut document = minimal_document();
        let bytes = document.save().unwrap();
        document.source_bytes = Some(bytes);

        let options = SaveOptions {
            incremental: true,
            encryption: Some(crate::config::NewEncryptionSpec {
                owner_password: "owner".to_string(),
                user_password: "user".to_string(),
                method: crate::encryption::CryptMethod::Rc4,
                key_length_bits: 40,
            }),
        };
        let err = document.save_with_options(&options).unwrap_err();
        assert!(matches!(err, Error::IncrementalSaveBlocked(crate::error::Blocker::EncryptionAdded)));
    }

    #[test]
    fn removing_encrypt_entry_directly_blocks_incremental_save() {
        let mut document = minimal_document();
        let mut encrypt_dict = Dict::new();
        encrypt_dict.set(b"Filter".to_vec(), Object::name(b"Standard".to_vec()));
        let encrypt_id = document.add_new_object(Object::Dictionary(encrypt_dict));
        document.trailer.set(b"Encrypt".to_vec(), Object::reference(encrypt_id));
        document.encrypted_at_load = true;

        let bytes = document.save().unwrap();
        document.source_bytes = Some(bytes);
        document.encrypted_at_load = true;
        document.trailer.remove(b"Encrypt");

        let err = document.save_with_options(&SaveOptions::incremental()).unwrap_err();
        assert!(matches!(err, Error::IncrementalSaveBlocked(crate::error::Blocker::EncryptionRemoved)));
    }
}
