use missive_core::error::MissiveError;
use missive_core::Extractor;
use std::path::PathBuf;

use crate::store;

pub fn run(input_file: PathBuf, config: Option<PathBuf>) -> Result<(), MissiveError> {
    let options = super::extract_options(config.as_deref())?;
    let pdf_bytes = store::read_pdf_file(&input_file)?;
    let transcript = Extractor::new(&options).extract_text(&pdf_bytes)?;

    if transcript.is_empty() {
        eprintln!("No text found in {}", input_file.display());
    } else {
        println!("{transcript}");
    }
    Ok(())
}
