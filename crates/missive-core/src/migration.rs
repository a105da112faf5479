//! Batch migration of stored correspondence PDFs.
//!
//! Each record is handled on its own: a failure is logged and reported, and
//! the record's PDF is left in place. Nothing escapes `migrate_batch`.

use crate::catalog::BackgroundCatalog;
use crate::error::MissiveError;
use crate::model::{ExtractionResult, MigrationOutcome, RecordId};
use crate::Extractor;
use std::collections::BTreeSet;

/// Number of records per batch when the caller does not choose.
pub const DEFAULT_BATCH_SIZE: usize = 10;

/// Where record PDFs live and where their extracted content goes.
pub trait CorrespondenceStore {
    /// The stored PDF bytes, or `None` when the record has no PDF.
    fn load_pdf(&self, id: &RecordId) -> Result<Option<Vec<u8>>, MissiveError>;

    /// Persist transcript and images and drop the stored PDF, all or nothing.
    fn replace_with_extraction(
        &mut self,
        id: &RecordId,
        result: &ExtractionResult,
    ) -> Result<(), MissiveError>;
}

enum RecordStatus {
    Migrated,
    Skipped(&'static str),
}

pub struct Migrator<'a> {
    extractor: &'a Extractor,
    catalog: &'a BackgroundCatalog,
}

impl<'a> Migrator<'a> {
    pub fn new(extractor: &'a Extractor, catalog: &'a BackgroundCatalog) -> Self {
        Migrator { extractor, catalog }
    }

    /// Migrate records in order. Duplicate ids are handled once.
    pub fn migrate_batch(
        &self,
        records: &[RecordId],
        store: &mut dyn CorrespondenceStore,
    ) -> MigrationOutcome {
        let mut outcome = MigrationOutcome::default();
        let mut seen = BTreeSet::new();
        log::info!("migrating batch of {} records", records.len());

        for id in records {
            if !seen.insert(id) {
                continue;
            }
            match self.migrate_record(id, store) {
                Ok(RecordStatus::Migrated) => {
                    log::debug!("record {id} migrated");
                    outcome.succeeded.insert(id.clone());
                }
                Ok(RecordStatus::Skipped(reason)) => {
                    log::warn!("record {id} skipped: {reason}");
                    outcome.skipped.insert(id.clone());
                }
                Err(e) => {
                    log::error!("record {id} failed: {e}");
                    outcome.failed.insert(id.clone());
                }
            }
        }

        log::info!(
            "batch done: {} succeeded, {} failed, {} skipped",
            outcome.succeeded.len(),
            outcome.failed.len(),
            outcome.skipped.len()
        );
        outcome
    }

    fn migrate_record(
        &self,
        id: &RecordId,
        store: &mut dyn CorrespondenceStore,
    ) -> Result<RecordStatus, MissiveError> {
        let Some(pdf_bytes) = store.load_pdf(id)? else {
            return Ok(RecordStatus::Skipped("no stored PDF"));
        };
        let Some(result) = self.extractor.extract(&pdf_bytes, self.catalog)? else {
            return Ok(RecordStatus::Skipped("empty transcript"));
        };
        store.replace_with_extraction(id, &result)?;
        Ok(RecordStatus::Migrated)
    }
}

/// Split ids into consecutive batches of at most `size` (at least one) ids.
pub fn chunk_batches(ids: &[RecordId], size: usize) -> Vec<Vec<RecordId>> {
    ids.chunks(size.max(1)).map(<[RecordId]>::to_vec).collect()
}
