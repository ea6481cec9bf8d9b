use criterion::{criterion_group, criterion_main, Criterion};

use pdfcore::{Dictionary, Document, Object, SaveOptions};

fn sample_document(page_count: i64) -> Document {
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

    document
}

fn bench_save_full(c: &mut Criterion) {
    let document = sample_document(100);
    c.bench_function("save_full", |b| {
        b.iter(|| {
            let mut clone = document.clone();
            clone.save().unwrap()
        });
    });
}

fn bench_save_incremental(c: &mut Criterion) {
    let mut document = sample_document(100);
    let saved = document.save().unwrap();
    let mut reloaded = Document::load_mem(&saved).unwrap();
    let page_id = *reloaded.objects.keys().next().unwrap();
    reloaded.get_object_mut(page_id).unwrap().as_dict_mut().unwrap().set(b"Rotate".to_vec(), Object::Integer(90));

    c.bench_function("save_incremental", |b| {
        b.iter(|| {
            let mut clone = reloaded.clone();
            clone.get_object_mut(page_id).unwrap().as_dict_mut().unwrap().set(b"Rotate".to_vec(), Object::Integer(180));
            clone.save_with_options(&SaveOptions::incremental()).unwrap()
        });
    });
}

criterion_group!(benches, bench_save_full, bench_save_incremental);
criterion_main!(benches);
