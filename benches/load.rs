use criterion::{criterion_group, criterion_main, Criterion};

use pdfcore::{Dictionary, Document, Object};

fn sample_document_bytes(page_count: i64) -> Vec<u8> {
    let mut document = Document::new();

    let mut pages = Dictionary::new();
    pages.set(b"Type".to_vec(), Object::name(b"Pages".to_vec()));
    pages.set(b"Count".to_vec(), Object::Integer(page_count));

    let mut kids = Vec::new();
    for _ in 0..page_count {
        let mut page = Dictionary::new();
        page.set(b"Type".to_vec(), Object::name(b"Page".to_vec()));
        let id = document.add_new_object(Object::Dictionary(page));
        kids.push(Object::reference(id));
    }
    pages.set(b"Kids".to_vec(), Object::Array(kids.into()));
    let pages_id = document.add_new_object(Object::Dictionary(pages));

    let mut catalog = Dictionary::new();
    catalog.set(b"Type".to_vec(), Object::name(b"Catalog".to_vec()));
    catalog.set(b"Pages".to_vec(), Object::reference(pages_id));
    let catalog_id = document.add_new_object(Object::Dictionary(catalog));
    document.trailer.set(b"Root".to_vec(), Object::reference(catalog_id));

    document.save().unwrap()
}

fn bench_load_small(c: &mut Criterion) {
    let bytes = sample_document_bytes(3);
    c.bench_function("load_small_document", |b| {
        b.iter(|| Document::load_mem(&bytes).unwrap());
    });
}

fn bench_load_many_pages(c: &mut Criterion) {
    let bytes = sample_document_bytes(200);
    c.bench_function("load_many_pages", |b| {
        b.iter(|| Document::load_mem(&bytes).unwrap());
    });
}

criterion_group!(benches, bench_load_small, bench_load_many_pages);
criterion_main!(benches);
