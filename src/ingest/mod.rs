// Ingestion helper
// Turns a folder of text/Markdown posts plus an `images/` folder into document records


use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::corpus::{DocumentRecord, DocumentStore};

const DOCUMENT_EXTENSIONS: &[&str] = &["txt", "md"];
const IMAGES_DIR: &str = "images";

/// Read every document in `dir` into a store
///
/// Documents are visited in file-name order so ids are reproducible. The title
/// is the file stem, the text keeps only non-blank lines, and the assets are
/// the files in `dir/images/` named `{stem}_image_*`. Documents with no text
/// are skipped.
#[inline]
pub fn ingest_directory<P: AsRef<Path>>(dir: P) -> Result<DocumentStore> {
    let dir = dir.as_ref();
    info!("Ingesting documents from {}", dir.display());

    let mut paths: Vec<PathBuf> = fs::read_dir(dir)
        .with_context(|| format!("Failed to read directory: {}", dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file() && is_document(path))
        .collect();
    paths.sort();

    let images = list_images(&dir.join(IMAGES_DIR))?;

    let mut records = Vec::with_capacity(paths.len());
    for path in paths {
        let Some(title) = path.file_stem().and_then(|s| s.to_str()) else {
            warn!("Skipping file with non UTF-8 name: {}", path.display());
            continue;
        };

        let raw = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read document: {}", path.display()))?;
        let text = normalize_text(&raw);
        if text.is_empty() {
            warn!("Skipping {}: no text content", path.display());
            continue;
        }

        let prefix = format!("{}_image_", title);
        let asset_paths: Vec<String> = images
            .iter()
            .filter(|(name, _)| name.starts_with(&prefix))
            .map(|(_, full)| full.clone())
            .collect();

        debug!(
            "Ingested '{}' ({} chars, {} images)",
            title,
            text.len(),
            asset_paths.len()
        );

        records.push(DocumentRecord {
            id: records.len() as u64,
            title: title.to_string(),
            text,
            asset_paths,
        });
    }

    info!("Ingested {} documents", records.len());
    Ok(DocumentStore::new(records))
}

/// Keep only the non-blank lines of a document
#[inline]
pub fn normalize_text(raw: &str) -> String {
    raw.lines()
        .filter(|line| !line.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn is_document(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| DOCUMENT_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
}

/// Sorted `(file name, full path)` pairs of the images folder; empty when absent
fn list_images(images_dir: &Path) -> Result<Vec<(String, String)>> {
    if !images_dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut images: Vec<(String, String)> = fs::read_dir(images_dir)
        .with_context(|| format!("Failed to read images directory: {}", images_dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file())
        .filter_map(|path| {
            let name = path.file_name()?.to_str()?.to_string();
            Some((name, path.to_string_lossy().into_owned()))
        })
        .collect();
    images.sort();

    Ok(images)
}
