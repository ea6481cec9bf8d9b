//! Benchmarks the many-small-objects load path. This crate's writer
//! always emits classical (uncompressed) object bodies, so it can't
//! synthesize a `/Type /ObjStm` fixture in-process; loading one
//! produced by another writer exercises the same per-object-number
//! bookkeeping this bench measures at a comparable scale.

use criterion::{criterion_group, criterion_main, Criterion};

use pdfcore::{Dictionary, Document, Object};

fn document_with_many_objects(count: i64) -> Vec<u8> {
    let mut document = Document::new();
    let mut kids = Vec::new();
    for i in 0..count {
        let mut dict = Dictionary::new();
        dict.set(b"Type".to_vec(), Object::name(b"TestObj".to_vec()));
        dict.set(b"Value".to_vec(), Object::Integer(i));
        let id = document.add_new_object(Object::Dictionary(dict));
        kids.push(Object::reference(id));
    }

    let mut root = Dictionary::new();
    root.set(b"Type".to_vec(), Object::name(b"Catalog".to_vec()));
    root.set(b"Kids".to_vec(), Object::Array(kids.into()));
    let root_id = document.add_new_object(Object::Dictionary(root));
    document.trailer.set(b"Root".to_vec(), Object::reference(root_id));

    document.save().unwrap()
}

fn bench_load_many_small_objects(c: &mut Criterion) {
    let bytes = document_with_many_objects(500);
    c.bench_function("load_many_small_objects", |b| {
        b.iter(|| Document::load_mem(&bytes).unwrap());
    });
}

criterion_group!(benches, bench_load_many_small_objects);
criterion_main!(benches);
