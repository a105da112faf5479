//! Directory-backed record store.
//!
//! A record `<id>` is stored as `<id>.pdf`, or base64-encoded as
//! `<id>.pdf.b64`. Migrating it writes `<id>.txt` and `<id>_images/`, then
//! removes the PDF.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use missive_core::error::MissiveError;
use missive_core::migration::CorrespondenceStore;
use missive_core::model::{DecodedImage, ExtractionResult, ImageEncoding, RecordId};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

const PDF_SUFFIX: &str = ".pdf";
const BASE64_SUFFIX: &str = ".pdf.b64";

/// Read a PDF file, decoding it first when it is stored as base64.
pub fn read_pdf_file(path: &Path) -> Result<Vec<u8>, MissiveError> {
    let bytes = std::fs::read(path)?;
    if path.to_string_lossy().ends_with(BASE64_SUFFIX) {
        decode_base64(&bytes)
    } else {
        Ok(bytes)
    }
}

fn decode_base64(bytes: &[u8]) -> Result<Vec<u8>, MissiveError> {
    let compact: Vec<u8> = bytes
        .iter()
        .copied()
        .filter(|b| !b.is_ascii_whitespace())
        .collect();
    BASE64
        .decode(compact)
        .map_err(|e| MissiveError::Persistence(format!("invalid base64 PDF: {e}")))
}

/// Path of `filename` inside `dir`. Names with directory components are
/// refused.
fn image_path(dir: &Path, filename: &str) -> Result<PathBuf, MissiveError> {
    let plain = Path::new(filename)
        .file_name()
        .is_some_and(|name| name == filename);
    if !plain || filename.contains(['/', '\\']) {
        return Err(MissiveError::Persistence(format!("refusing image file name {filename:?}")));
    }
    Ok(dir.join(filename))
}

/// Encode and write images into `dir`, returning the written paths.
pub fn write_images(
    dir: &Path,
    images: &BTreeMap<String, DecodedImage>,
    encoding: ImageEncoding,
) -> Result<Vec<PathBuf>, MissiveError> {
    std::fs::create_dir_all(dir)?;
    let mut written = Vec::with_capacity(images.len());
    for image in images.values() {
        let path = image_path(dir, &image.output_filename(encoding))?;
        std::fs::write(&path, image.encode(encoding)?)?;
        written.push(path);
    }
    Ok(written)
}

pub struct DirectoryStore {
    root: PathBuf,
    encoding: ImageEncoding,
}

impl DirectoryStore {
    pub fn new(root: PathBuf, encoding: ImageEncoding) -> Self {
        DirectoryStore { root, encoding }
    }

    /// Ids of all records that still hold a PDF, sorted.
    pub fn record_ids(&self) -> Result<Vec<RecordId>, MissiveError> {
        let mut ids = BTreeSet::new();
        for entry in std::fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            let id = name
                .strip_suffix(BASE64_SUFFIX)
                .or_else(|| name.strip_suffix(PDF_SUFFIX));
            if let Some(id) = id.filter(|id| !id.is_empty()) {
                ids.insert(RecordId::from(id));
            }
        }
        Ok(ids.into_iter().collect())
    }

    fn path(&self, id: &RecordId, suffix: &str) -> PathBuf {
        self.root.join(format!("{id}{suffix}"))
    }

    fn write_record(
        &self,
        id: &RecordId,
        transcript: &str,
        images: &[(PathBuf, Vec<u8>)],
    ) -> std::io::Result<()> {
        if !images.is_empty() {
            std::fs::create_dir_all(self.path(id, "_images"))?;
        }
        for (path, bytes) in images {
            std::fs::write(path, bytes)?;
        }
        std::fs::write(self.path(id, ".txt"), transcript)
    }

    fn discard_record(&self, id: &RecordId) {
        let images_dir = self.path(id, "_images");
        if images_dir.exists() {
            if let Err(e) = std::fs::remove_dir_all(&images_dir) {
                log::warn!("could not clean up {}: {e}", images_dir.display());
            }
        }
        let transcript = self.path(id, ".txt");
        if transcript.exists() {
            if let Err(e) = std::fs::remove_file(&transcript) {
                log::warn!("could not clean up {}: {e}", transcript.display());
            }
        }
    }
}

impl CorrespondenceStore for DirectoryStore {
    fn load_pdf(&self, id: &RecordId) -> Result<Option<Vec<u8>>, MissiveError> {
        let plain = self.path(id, PDF_SUFFIX);
        if plain.is_file() {
            return Ok(Some(std::fs::read(plain)?));
        }
        let encoded = self.path(id, BASE64_SUFFIX);
        if encoded.is_file() {
            return read_pdf_file(&encoded).map(Some);
        }
        Ok(None)
    }

    fn replace_with_extraction(
        &mut self,
        id: &RecordId,
        result: &ExtractionResult,
    ) -> Result<(), MissiveError> {
        // encode and check names before touching the disk
        let images_dir = self.path(id, "_images");
        let images = result
            .images
            .values()
            .map(|image| {
                Ok((
                    image_path(&images_dir, &image.output_filename(self.encoding))?,
                    image.encode(self.encoding)?,
                ))
            })
            .collect::<Result<Vec<_>, MissiveError>>()?;

        if let Err(e) = self.write_record(id, &result.transcript, &images) {
            self.discard_record(id);
            return Err(MissiveError::Persistence(format!(
                "failed to write record {id}: {e}"
            )));
        }

        for suffix in [PDF_SUFFIX, BASE64_SUFFIX] {
            let path = self.path(id, suffix);
            if path.exists() {
                std::fs::remove_file(&path).map_err(|e| {
                    MissiveError::Persistence(format!("failed to remove {}: {e}", path.display()))
                })?;
            }
        }
        log::debug!("record {id}: wrote transcript and {} image(s)", images.len());
        Ok(())
    }
}
