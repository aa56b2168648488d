// Document record store
// Holds the parsed corpus and the JSON Lines table it is persisted as


use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use tracing::{debug, info};

use crate::{RagError, Result};

/// A single document in the corpus
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRecord {
    /// Stable identifier, unique within a store
    pub id: u64,
    pub title: String,
    pub text: String,
    /// Paths of the images that belong to this document, in document order
    pub asset_paths: Vec<String>,
}

/// One row of the persisted corpus table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorpusRow {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    pub title: String,
    pub text: String,
    #[serde(default)]
    pub image_paths: Vec<String>,
}

impl From<&DocumentRecord> for CorpusRow {
    #[inline]
    fn from(record: &DocumentRecord) -> Self {
        Self {
            id: Some(record.id),
            title: record.title.clone(),
            text: record.text.clone(),
            image_paths: record.asset_paths.clone(),
        }
    }
}

impl CorpusRow {
    /// Convert into a record, falling back to `position` when the row carries no id
    ///
    /// [`DocumentStore::from_rows`] fills in unused ids before calling this.
    #[inline]
    pub fn into_record(self, position: usize) -> DocumentRecord {
        DocumentRecord {
            id: self.id.unwrap_or(position as u64),
            title: self.title,
            text: self.text,
            asset_paths: self.image_paths,
        }
    }
}

/// Position-indexed, read-only collection of document records
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentStore {
    records: Vec<DocumentRecord>,
}

impl DocumentStore {
    #[inline]
    pub fn new(records: Vec<DocumentRecord>) -> Self {
        Self { records }
    }

    /// Build a store from table rows, assigning ids where missing
    ///
    /// A row without an id takes its position, or the next value above it that
    /// no other row uses, so ids stay unique alongside explicit ones.
    #[inline]
    pub fn from_rows(rows: Vec<CorpusRow>) -> Self {
        let mut used: HashSet<u64> = rows.iter().filter_map(|row| row.id).collect();

        let records = rows
            .into_iter()
            .enumerate()
            .map(|(position, mut row)| {
                if row.id.is_none() {
                    let mut id = position as u64;
                    while used.contains(&id) {
                        id += 1;
                    }
                    used.insert(id);
                    row.id = Some(id);
                }
                row.into_record(position)
            })
            .collect();
        Self { records }
    }

    #[inline]
    pub fn get(&self, position: usize) -> Option<&DocumentRecord> {
        self.records.get(position)
    }

    #[inline]
    pub fn records(&self) -> &[DocumentRecord] {
        &self.records
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Texts in position order, ready to be embedded
    #[inline]
    pub fn texts(&self) -> Vec<String> {
        self.records.iter().map(|r| r.text.clone()).collect()
    }

    #[inline]
    pub fn to_rows(&self) -> Vec<CorpusRow> {
        self.records.iter().map(CorpusRow::from).collect()
    }

    /// Load a corpus table stored as JSON Lines
    ///
    /// Blank lines are skipped. A line that fails to parse, or repeats an id
    /// used by an earlier line, aborts the load and the error names its 1-based
    /// line number.
    #[inline]
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        debug!("Loading corpus from {}", path.display());

        let file = fs::File::open(path).map_err(|e| {
            RagError::Corpus(format!("Failed to open corpus {}: {}", path.display(), e))
        })?;

        let mut rows = Vec::new();
        let mut seen_ids = HashSet::new();
        for (line_index, line) in BufReader::new(file).lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }

            let row: CorpusRow = serde_json::from_str(&line).map_err(|e| {
                RagError::Corpus(format!(
                    "Malformed row on line {} of {}: {}",
                    line_index + 1,
                    path.display(),
                    e
                ))
            })?;
            if let Some(id) = row.id.filter(|id| !seen_ids.insert(*id)) {
                return Err(RagError::Corpus(format!(
                    "Duplicate id {} on line {} of {}",
                    id,
                    line_index + 1,
                    path.display()
                )));
            }
            rows.push(row);
        }

        let store = Self::from_rows(rows);
        info!(
            "Loaded {} documents from {}",
            store.len(),
            path.display()
        );
        Ok(store)
    }

    /// Write the corpus table as JSON Lines, creating parent directories
    #[inline]
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let mut writer = BufWriter::new(fs::File::create(path)?);
        for row in self.to_rows() {
            let line = serde_json::to_string(&row)
                .map_err(|e| RagError::Corpus(format!("Failed to serialize row: {}", e)))?;
            writer.write_all(line.as_bytes())?;
            writer.write_all(b"\n")?;
        }
        writer.flush()?;

        info!("Saved {} documents to {}", self.len(), path.display());
        Ok(())
    }
}

impl From<Vec<DocumentRecord>> for DocumentStore {
    #[inline]
    fn from(records: Vec<DocumentRecord>) -> Self {
        Self::new(records)
    }
}
