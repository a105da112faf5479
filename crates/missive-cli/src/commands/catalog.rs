use missive_core::catalog::{BackgroundCatalog, Template, TemplatePage};
use missive_core::error::MissiveError;
use std::path::{Path, PathBuf};

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "tif", "tiff"];

pub fn run(templates_dir: PathBuf, out: PathBuf) -> Result<(), MissiveError> {
    let templates = read_templates(&templates_dir)?;
    let catalog = BackgroundCatalog::build(&templates)?;
    catalog.save(&out)?;

    eprintln!(
        "Catalog of {} background size(s) from {} template(s), written to {}",
        catalog.len(),
        templates.len(),
        out.display()
    );
    Ok(())
}

/// Each sub-directory is one template and each image in it one page, in file
/// name order. Images directly under `dir` form a template named after `dir`.
pub fn read_templates(dir: &Path) -> Result<Vec<Template>, MissiveError> {
    let mut subdirs = Vec::new();
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            subdirs.push(path);
        } else if is_image(&path) {
            files.push(path);
        } else {
            log::debug!("ignoring {}", path.display());
        }
    }
    subdirs.sort();

    let mut templates = Vec::new();
    if !files.is_empty() {
        templates.push(template_from_files(dir_name(dir), files)?);
    }
    for subdir in subdirs {
        let mut pages = Vec::new();
        for entry in std::fs::read_dir(&subdir)? {
            let path = entry?.path();
            if path.is_file() && is_image(&path) {
                pages.push(path);
            }
        }
        templates.push(template_from_files(dir_name(&subdir), pages)?);
    }
    Ok(templates)
}

fn template_from_files(name: String, mut files: Vec<PathBuf>) -> Result<Template, MissiveError> {
    files.sort();
    let mut pages = Vec::with_capacity(files.len());
    for file in files {
        pages.push(TemplatePage {
            background: Some(std::fs::read(&file)?),
        });
    }
    Ok(Template { name, pages })
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
}

fn dir_name(dir: &Path) -> String {
    dir.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| dir.display().to_string())
}
