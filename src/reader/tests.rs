use super::*;
use crate::document::Document;

const MINIMAL_PDF: &[u8] = b"%PDF-1.5\n\
1 0 obj<</Type/Catalog/Pages 2 0 R>>endobj\n\
2 0 obj<</Type/Pages/Kids[3 0 R]/Count 1>>endobj\n\
3 0 obj<</Type/Page/Parent 2 0 R>>endobj\n\
xref\n\
0 4\n\
0000000000 65535 f \n\
0000000009 00000 n \n\
0000000052 00000 n \n\
0000000101 00000 n \n\
trailer\n\
<</Root 1 0 R/Size 4>>\n\
startxref\n\
142\n\
%%EOF";

#[test]
fn load_document() {
    let doc = Document::load_mem(MINIMAL_PDF).unwrap();
    assert_eq!(doc.version, "1.5");
    assert_eq!(doc.objects.len(), 3);
}

#[test]
#[should_panic(expected = "Xref(Start)")]
fn load_short_document() {
    let _doc = Document::load_mem(b"%PDF-1.5\n%%EOF\n").unwrap();
}

#[test]
fn load_document_with_preceding_bytes() {
    let mut content = Vec::new();
    content.extend(b"garbage");
    content.extend(MINIMAL_PDF);
    let doc = Document::load_mem(&content).unwrap();
    assert_eq!(doc.version, "1.5");
}

#[test]
fn load_document_reports_page_count_via_metadata() {
    let metadata = Document::load_metadata_mem(MINIMAL_PDF).unwrap();
    assert_eq!(metadata.page_count, 1);
    assert_eq!(metadata.version, "1.5");
}

#[test]
fn search_substring_finds_last_occurrence() {
    assert_eq!(Reader::search_substring(b"hello world", b"xyz", 0), None);
    assert_eq!(Reader::search_substring(b"hello world", b"world", 0), Some(6));

    let buffer = b"%%EOF\ntest%%EOF\nend";
    assert_eq!(Reader::search_substring(buffer, b"%%EOF", 0), Some(10));
    assert_eq!(Reader::search_substring(buffer, b"%%EOF", 6), Some(10));
    assert_eq!(Reader::search_substring(buffer, b"%%EOF", 15), None);
    assert_eq!(Reader::search_substring(b"%%EOF", b"%%EOF", 0), Some(0));

    let buffer_with_many_percents = b"%%%PDF-1.3%%%comment%%%more%%EOF";
    assert_eq!(Reader::search_substring(buffer_with_many_percents, b"%%EOF", 0), Some(27));
}

#[test]
fn brute_force_recover_finds_every_object_header() {
    let reader = Reader {
        buffer: MINIMAL_PDF,
        document: Document::new(),
        encryption_state: None,
        password: None,
        raw_objects: Default::default(),
        lenient: true,
    };
    let xref = reader.brute_force_recover();
    assert_eq!(xref.entries.len(), 3);
    assert!(xref.get(1).is_some());
    assert!(xref.get(2).is_some());
    assert!(xref.get(3).is_some());
}
