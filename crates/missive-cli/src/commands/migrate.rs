use missive_core::catalog::BackgroundCatalog;
use missive_core::error::MissiveError;
use missive_core::migration::{chunk_batches, Migrator};
use missive_core::model::MigrationOutcome;
use missive_core::Extractor;
use std::path::PathBuf;

use crate::output;
use crate::store::DirectoryStore;

pub fn run(
    records_dir: PathBuf,
    catalog_file: PathBuf,
    batch_size: usize,
    encoding: &str,
    output_format: &str,
    config: Option<PathBuf>,
) -> Result<(), MissiveError> {
    let options = super::extract_options(config.as_deref())?;
    let encoding = super::image_encoding(encoding)?;
    let catalog = BackgroundCatalog::load(&catalog_file)?;
    let mut store = DirectoryStore::new(records_dir, encoding);
    let ids = store.record_ids()?;

    let extractor = Extractor::new(&options);
    let migrator = Migrator::new(&extractor, &catalog);
    let batches = chunk_batches(&ids, batch_size);
    log::info!(
        "{} record(s) in {} batch(es), {} background size(s) in catalog",
        ids.len(),
        batches.len(),
        catalog.len()
    );

    let mut outcome = MigrationOutcome::default();
    for batch in &batches {
        outcome.merge(migrator.migrate_batch(batch, &mut store));
    }

    match output_format {
        "json" => output::json::print(&outcome)?,
        _ => output::table::print(&outcome),
    }
    Ok(())
}
