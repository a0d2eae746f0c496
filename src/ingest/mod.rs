//! Offline ingestion: load datasheets, split them into passages, embed and
//! store them so every passage carries the scope identifier of its file.

use anyhow::{Context, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::chunking::TextSplitter;
use crate::llm::embeddings::Embedder;
use crate::models::{Passage, PassageMetadata};
use crate::search::vector::VectorStore;

/// Texts embedded per request.
const EMBED_BATCH: usize = 64;

/// One page of extracted text.
#[derive(Debug, Clone)]
pub struct PageText {
    /// Scope identifier: `<data dir name>/<relative path>`.
    pub source: String,
    /// 1-based page number for paged formats.
    pub page: Option<u32>,
    pub text: String,
}

#[derive(Debug, Default, Serialize)]
pub struct IngestReport {
    pub files: usize,
    pub pages: usize,
    pub chunks: usize,
    /// Passages stored per scope.
    pub sources: BTreeMap<String, usize>,
    /// Files that could not be read, with the reason.
    pub skipped: Vec<String>,
}

/// Build the scope identifier for `path` under `data_dir`, using forward
/// slashes on every platform.
pub fn source_id(data_dir: &Path, path: &Path) -> String {
    let root = data_dir
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "data".to_string());
    let relative = path.strip_prefix(data_dir).unwrap_or(path);
    let mut parts = vec![root];
    parts.extend(
        relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().to_string()),
    );
    parts.join("/")
}

/// Every ingestible file under `data_dir`, sorted for a stable passage order.
pub fn discover_files(data_dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(data_dir)
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !e.file_name().to_string_lossy().starts_with('.'))
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file() && is_ingestible(e.path()))
        .map(|e| e.into_path())
        .collect();
    files.sort();
    files
}

fn is_ingestible(path: &Path) -> bool {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    matches!(ext.as_str(), "pdf" | "txt" | "md")
}

/// Extract text from one file: PDFs page by page, plain text as one page.
pub fn load_file(data_dir: &Path, path: &Path) -> Result<Vec<PageText>> {
    let source = source_id(data_dir, path);
    let is_pdf = path
        .extension()
        .is_some_and(|e| e.eq_ignore_ascii_case("pdf"));

    if !is_pdf {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        return Ok(vec![PageText {
            source,
            page: None,
            text,
        }]);
    }

    let doc = lopdf::Document::load(path)
        .with_context(|| format!("Failed to load PDF {}", path.display()))?;
    let mut pages = Vec::new();
    for page in doc.get_pages().keys() {
        match doc.extract_text(&[*page]) {
            Ok(text) if !text.trim().is_empty() => pages.push(PageText {
                source: source.clone(),
                page: Some(*page),
                text,
            }),
            Ok(_) => tracing::debug!("No text on page {page} of {source}"),
            Err(e) => tracing::warn!("Failed to extract page {page} of {source}: {e}"),
        }
    }
    Ok(pages)
}

/// Split pages into passages, numbering chunks per source.
pub fn split_pages(pages: &[PageText], splitter: &TextSplitter) -> Vec<Passage> {
    let mut counters: BTreeMap<&str, usize> = BTreeMap::new();
    let mut passages = Vec::new();
    for page in pages {
        for chunk in splitter.split(&page.text) {
            let index = counters.entry(page.source.as_str()).or_insert(0);
            passages.push(Passage::new(
                chunk,
                PassageMetadata {
                    source: page.source.clone(),
                    page: page.page,
                    chunk_index: *index,
                },
            ));
            *index += 1;
        }
    }
    passages
}

/// Rebuild `store` from the files under `data_dir`.
pub async fn ingest_dir(
    data_dir: &Path,
    splitter: &TextSplitter,
    embedder: &dyn Embedder,
    store: &VectorStore,
) -> Result<IngestReport> {
    anyhow::ensure!(
        data_dir.is_dir(),
        "Data directory {} does not exist",
        data_dir.display()
    );

    let mut report = IngestReport::default();
    let files = {
        let dir = data_dir.to_path_buf();
        tokio::task::spawn_blocking(move || discover_files(&dir)).await?
    };
    tracing::info!("Found {} ingestible file(s) in {}", files.len(), data_dir.display());

    let mut pages = Vec::new();
    for path in files {
        let dir = data_dir.to_path_buf();
        let file = path.clone();
        match tokio::task::spawn_blocking(move || load_file(&dir, &file)).await? {
            Ok(file_pages) => {
                report.files += 1;
                report.pages += file_pages.len();
                pages.extend(file_pages);
            }
            Err(e) => {
                tracing::warn!("Skipping {}: {e:#}", path.display());
                report.skipped.push(format!("{}: {e:#}", path.display()));
            }
        }
    }

    let passages = split_pages(&pages, splitter);
    tracing::info!("Split {} page(s) into {} passage(s)", report.pages, passages.len());

    let mut embeddings = Vec::with_capacity(passages.len());
    for batch in passages.chunks(EMBED_BATCH) {
        let texts: Vec<String> = batch.iter().map(|p| p.content.clone()).collect();
        embeddings.extend(embedder.embed(&texts).await.context("Embedding failed")?);
    }

    for p in &passages {
        *report.sources.entry(p.metadata.source.clone()).or_insert(0) += 1;
    }
    report.chunks = passages.len();

    store.replace(passages, embeddings)?;
    tracing::info!("Stored {} passage(s) across {} source(s)", report.chunks, report.sources.len());
    Ok(report)
}
