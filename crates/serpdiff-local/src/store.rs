//! Filesystem persistence: raw SERP pages, result-set JSON, query lists.

use serpdiff_core::{Error, Result, ResultSet};
use std::fs;
use std::path::{Path, PathBuf};

fn store_err(e: std::io::Error) -> Error {
    Error::Store(e.to_string())
}

/// Directory of raw SERP documents, one file per (engine, query, page),
/// named `<engine>-<qid>-p<page>.html` with the query id zero-padded so
/// listings sort by query.
#[derive(Debug, Clone)]
pub struct PageStore {
    root: PathBuf,
}

impl PageStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn page_path(&self, engine: &str, qid: usize, page: usize) -> PathBuf {
        self.root.join(format!("{engine}-{qid:04}-p{page}.html"))
    }

    pub fn save_page(&self, engine: &str, qid: usize, page: usize, html: &str) -> Result<PathBuf> {
        fs::create_dir_all(&self.root).map_err(store_err)?;
        let path = self.page_path(engine, qid, page);
        fs::write(&path, html).map_err(store_err)?;
        Ok(path)
    }

    /// Missing pages are a normal condition (failed or skipped fetches),
    /// not an error. Page bytes are read lossily; engines serve odd
    /// encodings and a replacement character is better than a dead query.
    pub fn load_page(&self, engine: &str, qid: usize, page: usize) -> Result<Option<String>> {
        let path = self.page_path(engine, qid, page);
        if !path.exists() {
            return Ok(None);
        }
        let bytes = fs::read(&path).map_err(store_err)?;
        Ok(Some(String::from_utf8_lossy(&bytes).into_owned()))
    }

    pub fn has_any_page(&self, engine: &str, qid: usize, pages: usize) -> bool {
        (1..=pages.max(1)).any(|p| self.page_path(engine, qid, p).exists())
    }
}

/// Read up to `max` queries, one per line. Only the line break is
/// stripped; internal spacing is part of the query. Blank lines skipped.
pub fn read_queries(path: &Path, max: usize) -> Result<Vec<String>> {
    let text = fs::read_to_string(path).map_err(store_err)?;
    let mut out = Vec::new();
    for line in text.lines() {
        if line.is_empty() {
            continue;
        }
        out.push(line.to_string());
        if out.len() >= max {
            break;
        }
    }
    Ok(out)
}

/// Load a result set from its JSON object form, dropping entries whose
/// query text is blank.
pub fn load_result_set(path: &Path) -> Result<ResultSet> {
    let text = fs::read_to_string(path).map_err(store_err)?;
    let mut set: ResultSet =
        serde_json::from_str(&text).map_err(|e| Error::Store(e.to_string()))?;
    set.retain(|query, _| !query.trim().is_empty());
    Ok(set)
}

/// Write a result set as pretty-printed JSON, creating parent directories
/// as needed.
pub fn save_result_set(set: &ResultSet, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(store_err)?;
        }
    }
    let text = serde_json::to_string_pretty(set).map_err(|e| Error::Store(e.to_string()))?;
    fs::write(path, text).map_err(store_err)
}
