use missive_core::catalog::BackgroundCatalog;
use missive_core::error::MissiveError;
use missive_core::Extractor;
use std::path::PathBuf;

use crate::store;

pub fn run(
    input_file: PathBuf,
    catalog_file: PathBuf,
    out_dir: PathBuf,
    encoding: &str,
    config: Option<PathBuf>,
) -> Result<(), MissiveError> {
    let options = super::extract_options(config.as_deref())?;
    let encoding = super::image_encoding(encoding)?;
    let catalog = BackgroundCatalog::load(&catalog_file)?;
    let pdf_bytes = store::read_pdf_file(&input_file)?;

    let extraction = Extractor::new(&options).extract_images(&pdf_bytes, &catalog)?;
    let written = store::write_images(&out_dir, &extraction.images, encoding)?;

    eprintln!(
        "Wrote {} image(s) to {}",
        written.len(),
        out_dir.display()
    );
    for skipped in &extraction.skipped {
        eprintln!("  skipped {}: {}", skipped.name, skipped.reason);
    }
    Ok(())
}
