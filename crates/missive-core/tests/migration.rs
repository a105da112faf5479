//! Batch migration against an in-memory store.

mod common;

use common::{flate_gray_image, image_stream, PdfBuilder};
use missive_core::catalog::BackgroundCatalog;
use missive_core::error::MissiveError;
use missive_core::migration::{chunk_batches, CorrespondenceStore, Migrator};
use missive_core::model::{ExtractionResult, RecordId};
use missive_core::Extractor;
use std::collections::{BTreeMap, BTreeSet};

#[derive(Default)]
struct MemoryStore {
    pdfs: BTreeMap<RecordId, Vec<u8>>,
    saved: BTreeMap<RecordId, ExtractionResult>,
    reject: BTreeSet<RecordId>,
}

impl CorrespondenceStore for MemoryStore {
    fn load_pdf(&self, id: &RecordId) -> Result<Option<Vec<u8>>, MissiveError> {
        Ok(self.pdfs.get(id).cloned())
    }

    fn replace_with_extraction(
        &mut self,
        id: &RecordId,
        result: &ExtractionResult,
    ) -> Result<(), MissiveError> {
        if self.reject.contains(id) {
            return Err(MissiveError::Persistence(format!("record {id} is locked")));
        }
        self.saved.insert(id.clone(), result.clone());
        self.pdfs.remove(id);
        Ok(())
    }
}

fn id(name: &str) -> RecordId {
    RecordId::from(name)
}

fn set(names: &[&str]) -> BTreeSet<RecordId> {
    names.iter().map(|n| id(n)).collect()
}

fn letter(body: &str) -> Vec<u8> {
    PdfBuilder::new()
        .page(
            &format!("BT /F1 12 Tf 72 500 Td ({body}) Tj ET"),
            vec![("Im1", flate_gray_image(40, 40, 90))],
        )
        .build()
}

#[test]
fn failures_are_isolated_per_record() {
    let mut store = MemoryStore::default();
    store.pdfs.insert(id("good"), letter("Thank you"));
    store.pdfs.insert(id("bad"), b"%PDF-1.4 truncated".to_vec());

    let extractor = Extractor::default();
    let catalog = BackgroundCatalog::default();
    let outcome = Migrator::new(&extractor, &catalog).migrate_batch(
        &[id("good"), id("bad"), id("missing")],
        &mut store,
    );

    assert_eq!(outcome.succeeded, set(&["good"]));
    assert_eq!(outcome.failed, set(&["bad"]));
    assert_eq!(outcome.skipped, set(&["missing"]));

    assert_eq!(store.saved[&id("good")].transcript, "Thank you");
    assert!(store.saved[&id("good")].images.contains_key("Im1.png"));
    assert!(!store.pdfs.contains_key(&id("good")));
    // the failed record keeps its PDF
    assert!(store.pdfs.contains_key(&id("bad")));
}

#[test]
fn oversized_fax_image_is_skipped_and_batch_continues() {
    let mut fax = image_stream(60000, 8, "DeviceGray", Some("CCITTFaxDecode"), vec![0xff; 4]);
    fax.dict.set(
        "DecodeParms",
        lopdf::dictionary! { "K" => -1i64, "Columns" => 60000i64, "Rows" => 4_000_000_000i64 },
    );
    let mut store = MemoryStore::default();
    store.pdfs.insert(
        id("a_fax"),
        PdfBuilder::new()
            .page("BT /F1 12 Tf 72 500 Td (With fax) Tj ET", vec![("Fax", fax)])
            .build(),
    );
    store.pdfs.insert(id("b_plain"), letter("Plain"));

    let extractor = Extractor::default();
    let catalog = BackgroundCatalog::default();
    let outcome = Migrator::new(&extractor, &catalog)
        .migrate_batch(&[id("a_fax"), id("b_plain")], &mut store);

    assert_eq!(outcome.succeeded, set(&["a_fax", "b_plain"]));
    let saved = &store.saved[&id("a_fax")];
    assert!(saved.images.is_empty());
    assert_eq!(saved.skipped_images.len(), 1);
    assert_eq!(saved.skipped_images[0].name, "Fax");
}

#[test]
fn store_error_fails_record_and_keeps_pdf() {
    let mut store = MemoryStore::default();
    store.pdfs.insert(id("a"), letter("First"));
    store.pdfs.insert(id("b"), letter("Second"));
    store.reject.insert(id("a"));

    let extractor = Extractor::default();
    let catalog = BackgroundCatalog::default();
    let outcome =
        Migrator::new(&extractor, &catalog).migrate_batch(&[id("a"), id("b")], &mut store);

    assert_eq!(outcome.failed, set(&["a"]));
    assert_eq!(outcome.succeeded, set(&["b"]));
    assert!(store.pdfs.contains_key(&id("a")));
}

#[test]
fn empty_transcript_is_skipped_and_pdf_kept() {
    let mut store = MemoryStore::default();
    store.pdfs.insert(
        id("blank"),
        PdfBuilder::new()
            .page("", vec![("Im1", flate_gray_image(40, 40, 90))])
            .build(),
    );

    let extractor = Extractor::default();
    let catalog = BackgroundCatalog::default();
    let outcome = Migrator::new(&extractor, &catalog).migrate_batch(&[id("blank")], &mut store);

    assert_eq!(outcome.skipped, set(&["blank"]));
    assert!(outcome.succeeded.is_empty());
    assert!(store.pdfs.contains_key(&id("blank")));
    assert!(store.saved.is_empty());
}

#[test]
fn second_run_skips_migrated_records() {
    let mut store = MemoryStore::default();
    store.pdfs.insert(id("r1"), letter("Hello"));

    let extractor = Extractor::default();
    let catalog = BackgroundCatalog::default();
    let migrator = Migrator::new(&extractor, &catalog);

    let first = migrator.migrate_batch(&[id("r1")], &mut store);
    assert_eq!(first.succeeded, set(&["r1"]));

    let second = migrator.migrate_batch(&[id("r1")], &mut store);
    assert!(second.succeeded.is_empty());
    assert_eq!(second.skipped, set(&["r1"]));
    assert_eq!(store.saved.len(), 1);
}

#[test]
fn duplicate_ids_are_processed_once() {
    let mut store = MemoryStore::default();
    store.pdfs.insert(id("dup"), letter("Once"));

    let extractor = Extractor::default();
    let catalog = BackgroundCatalog::default();
    let outcome =
        Migrator::new(&extractor, &catalog).migrate_batch(&[id("dup"), id("dup")], &mut store);

    assert_eq!(outcome.succeeded, set(&["dup"]));
    assert!(outcome.skipped.is_empty());
    assert_eq!(outcome.total(), 1);
}

#[test]
fn batches_run_independently() {
    let mut store = MemoryStore::default();
    let names = ["c1", "c2", "c3", "c4", "c5"];
    for name in names {
        store.pdfs.insert(id(name), letter(name));
    }
    store.pdfs.insert(id("c3"), b"garbage".to_vec());

    let extractor = Extractor::default();
    let catalog = BackgroundCatalog::default();
    let migrator = Migrator::new(&extractor, &catalog);
    let all: Vec<RecordId> = names.iter().map(|n| id(n)).collect();

    let mut total = missive_core::model::MigrationOutcome::default();
    for batch in chunk_batches(&all, 2) {
        total.merge(migrator.migrate_batch(&batch, &mut store));
    }

    assert_eq!(total.succeeded, set(&["c1", "c2", "c4", "c5"]));
    assert_eq!(total.failed, set(&["c3"]));
}
