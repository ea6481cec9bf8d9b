//! Integration tests for document load/save invariants and end-to-end
//! scenarios, exercised entirely through the public API.

use pdfcore::{Content, Dictionary, Document, NameTree, Object, ObjectCopier, SaveOptions, Stream};

fn minimal_document() -> Document {
    let mut document = Document::new();

    let content = Content {
        operations: vec![
            pdfcore::Operation::new("BT", vec![]),
            pdfcore::Operation::new("Tf", vec![Object::name(b"F1".to_vec()), Object::Integer(12)]),
            pdfcore::Operation::new("Td", vec![Object::Integer(72), Object::Integer(720)]),
            pdfcore::Operation::new("Tj", vec![Object::string_literal(b"Hello".to_vec())]),
            pdfcore::Operation::new("ET", vec![]),
        ],
    };
    let content_bytes = content.encode().unwrap();
    let content_id = document.add_new_object(Object::Stream(Stream::new(Dictionary::new(), content_bytes)));

    let mut font = Dictionary::new();
    font.set(b"Type".to_vec(), Object::name(b"Font".to_vec()));
    font.set(b"Subtype".to_vec(), Object::name(b"Type1".to_vec()));
    font.set(b"BaseFont".to_vec(), Object::name(b"Helvetica".to_vec()));
    let font_id = document.add_new_object(Object::Dictionary(font));

    let mut resources = Dictionary::new();
    let mut font_dict = Dictionary::new();
    font_dict.set(b"F1".to_vec(), Object::reference(font_id));
    resources.set(b"Font".to_vec(), Object::Dictionary(font_dict));

    let mut page = Dictionary::new();
    page.set(b"Type".to_vec(), Object::name(b"Page".to_vec()));
    page.set(b"Contents".to_vec(), Object::reference(content_id));
    page.set(b"Resources".to_vec(), Object::Dictionary(resources));
    let page_id = document.add_new_object(Object::Dictionary(page));

    let mut pages = Dictionary::new();
    pages.set(b"Type".to_vec(), Object::name(b"Pages".to_vec()));
    pages.set(b"Kids".to_vec(), Object::Array(vec![Object::reference(page_id)].into()));
    pages.set(b"Count".to_vec(), Object::Integer(1));
    let pages_id = document.add_new_object(Object::Dictionary(pages));

    let mut catalog = Dictionary::new();
    catalog.set(b"Type".to_vec(), Object::name(b"Catalog".to_vec()));
    catalog.set(b"Pages".to_vec(), Object::reference(pages_id));
    let catalog_id = document.add_new_object(Object::Dictionary(catalog));

    document.trailer.set(b"Root".to_vec(), Object::reference(catalog_id));
    document
}

/// Scenario 1: a minimal document has exactly 5 objects, and an
/// incremental save with no mutations returns the loaded bytes
/// unchanged (P2).
#[test]
fn minimal_document_has_five_objects_and_round_trips_unchanged() {
    let mut built = minimal_document();
    let bytes = built.save().unwrap();

    let mut loaded = Document::load_mem(&bytes).unwrap();
    assert_eq!(loaded.objects.len(), 5);

    let saved_again = loaded.save_with_options(&SaveOptions::incremental()).unwrap();
    assert_eq!(saved_again, bytes);
}

/// Scenario 2: mutating one object and saving incrementally preserves
/// every original byte and appends only the changed object plus a new
/// xref/trailer whose `/Prev` points at the original xref.
#[test]
fn mutation_then_incremental_save_preserves_prefix_and_appends_one_object() {
    let mut built = minimal_document();
    let bytes = built.save().unwrap();
    let original_xref_start = built.xref_start;

    let mut loaded = Document::load_mem(&bytes).unwrap();
    let page_id = loaded
        .objects
        .iter()
        .find(|(_, obj)| obj.as_dict().map(|d| d.has_type(b"Page")).unwrap_or(false))
        .map(|(id, _)| *id)
        .unwrap();
    loaded.get_object_mut(page_id).unwrap().as_dict_mut().unwrap().set(b"Rotate".to_vec(), Object::Integer(90));

    let saved = loaded.save_with_options(&SaveOptions::incremental()).unwrap();
    assert!(saved.len() > bytes.len());
    assert_eq!(&saved[..bytes.len()], bytes.as_slice());

    let appended = String::from_utf8_lossy(&saved[bytes.len()..]);
    assert!(appended.contains(&format!("{} 0 obj", page_id.0)));
    assert!(appended.contains(&format!("/Prev {original_xref_start}")));
}

/// Scenario 3: a linearized document blocks incremental save but still
/// saves in full.
#[test]
fn linearized_document_blocks_incremental_but_allows_full_save() {
    let mut document = minimal_document();
    document.save().unwrap();
    document.was_linearized = true;

    assert!(document.incremental_save_blocker().is_some());
    let err = document.save_with_options(&SaveOptions::incremental()).unwrap_err();
    assert!(matches!(err, pdfcore::Error::IncrementalSaveBlocked(pdfcore::Blocker::Linearized)));

    let full = document.save().unwrap();
    assert!(!document.was_linearized);
    assert!(String::from_utf8_lossy(&full).contains("%PDF-"));
}

/// Scenario 4: ASCII85 round-trips through the stream filter chain,
/// including the `z`-shortcut for an all-zero four-byte group.
#[test]
fn ascii85_round_trips_through_stream_filters() {
    let mut dict = Dictionary::new();
    dict.set(b"Filter".to_vec(), Object::name(b"ASCII85Decode".to_vec()));
    let mut stream = Stream::new(dict, Vec::new());

    let plain = b"Hello, World!\0\0\0\0".to_vec();
    stream.set_plain_content(plain.clone()).unwrap();
    let decoded = stream.decompressed_content().unwrap();
    assert_eq!(decoded, plain);
}

/// Scenario 5: a flat 100-entry name tree supports binary-search
/// lookup, and a self-referencing `Kids[0]` is cycle-detected rather
/// than looping forever.
#[test]
fn name_tree_binary_search_and_self_reference_cycle() {
    let entries: Vec<(Vec<u8>, Object)> =
        (0..100).map(|i| (format!("key{i:03}").into_bytes(), Object::Integer(i))).collect();
    let tree = NameTree::build(entries);

    assert_eq!(tree.get(b"key000"), Some(&Object::Integer(0)));
    assert_eq!(tree.get(b"key050"), Some(&Object::Integer(50)));
    assert_eq!(tree.get(b"key099"), Some(&Object::Integer(99)));
    assert_eq!(tree.get(b"key100"), None);

    let mut document = Document::new();
    let mut node = Dictionary::new();
    node.set(b"Kids".to_vec(), Object::Array(vec![Object::reference((1, 0))].into()));
    document.objects.insert((1, 0), Object::Dictionary(node));

    let cyclic = NameTree::read(&document, (1, 0)).unwrap();
    assert_eq!(cyclic.len(), 0);
}

/// `Document::load`/`save_to`-style on-disk round trip: writing to a
/// real file and reloading it should yield the same object count as
/// the in-memory document that produced it.
#[test]
fn on_disk_round_trip_preserves_object_count() {
    let mut built = minimal_document();
    let bytes = built.save().unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("minimal.pdf");
    std::fs::write(&path, &bytes).unwrap();

    let loaded = Document::load(&path).unwrap();
    assert_eq!(loaded.objects.len(), 5);
}

/// Scenario 6: copying a page with an inherited `/MediaBox` flattens
/// the attribute directly onto the copy and drops `/Parent`.
#[test]
fn cross_document_copy_flattens_inherited_mediabox() {
    let mut source = Document::new();
    let mut root_pages = Dictionary::new();
    root_pages.set(b"Type".to_vec(), Object::name(b"Pages".to_vec()));
    let mediabox = Object::Array(vec![Object::Integer(0), Object::Integer(0), Object::Integer(612), Object::Integer(792)].into());
    root_pages.set(b"MediaBox".to_vec(), mediabox.clone());
    source.objects.insert((1, 0), Object::Dictionary(root_pages));

    let mut page = Dictionary::new();
    page.set(b"Type".to_vec(), Object::name(b"Page".to_vec()));
    page.set(b"Parent".to_vec(), Object::reference((1, 0)));
    source.objects.insert((2, 0), Object::Dictionary(page));

    let mut dest = Document::new();
    let mut copier = ObjectCopier::new(&source);
    let dest_id = copier.copy_page(&mut dest, (2, 0)).unwrap();

    let copied = dest.get_dictionary(dest_id).unwrap();
    assert_eq!(copied.get(b"MediaBox").unwrap(), &mediabox);
    assert!(!copied.has(b"Parent"));
}
