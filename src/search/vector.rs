use anyhow::{Context, Result};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::models::{Passage, PassageMetadata};
use crate::search::MetadataFilter;

/// A stored vector entry
#[derive(Debug, Clone, Serialize, Deserialize)]
struct VectorEntry {
    passage: Passage,
    embedding: Vec<f32>,
}

/// In-memory vector store with disk persistence and cosine similarity search.
pub struct VectorStore {
    entries: RwLock<Vec<VectorEntry>>,
    persist_path: PathBuf,
}

impl VectorStore {
    pub fn open_or_create(index_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(index_dir)
            .with_context(|| format!("Failed to create {}", index_dir.display()))?;
        let persist_path = index_dir.join("vectors.json");

        let entries = if persist_path.exists() {
            let data = std::fs::read_to_string(&persist_path)
                .context("Failed to read vector store")?;
            serde_json::from_str(&data).context("Vector store file is corrupt")?
        } else {
            Vec::new()
        };

        Ok(Self {
            entries: RwLock::new(entries),
            persist_path,
        })
    }

    /// Add passages with their embeddings. `embeddings` must be parallel with `passages`.
    pub fn add(&self, passages: Vec<Passage>, embeddings: Vec<Vec<f32>>) -> Result<()> {
        let new_entries = zip_entries(passages, embeddings)?;
        let mut entries = self.entries.write();
        let mut next = entries.clone();
        next.extend(new_entries);
        self.commit(&mut entries, next)
    }

    /// Replace every entry with `passages`. Either both memory and disk hold
    /// the new contents or neither changes.
    pub fn replace(&self, passages: Vec<Passage>, embeddings: Vec<Vec<f32>>) -> Result<()> {
        let next = zip_entries(passages, embeddings)?;
        let mut entries = self.entries.write();
        self.commit(&mut entries, next)
    }

    /// Remove every entry.
    pub fn clear(&self) -> Result<()> {
        let mut entries = self.entries.write();
        self.commit(&mut entries, Vec::new())
    }

    /// Persist `next`, then swap it in. Memory is untouched when the write fails.
    fn commit(&self, entries: &mut Vec<VectorEntry>, next: Vec<VectorEntry>) -> Result<()> {
        self.persist(&next)?;
        *entries = next;
        Ok(())
    }

    /// Top-`limit` passages by cosine similarity, most similar first.
    /// Ties keep insertion order.
    pub fn search(
        &self,
        query_embedding: &[f32],
        limit: usize,
        filter: Option<&MetadataFilter>,
    ) -> Vec<Passage> {
        let entries = self.entries.read();

        let mut scored: Vec<(f32, &VectorEntry)> = entries
            .iter()
            .filter(|e| filter.map_or(true, |f| f.matches(&e.passage.metadata)))
            .map(|e| (cosine_similarity(query_embedding, &e.embedding), e))
            .collect();

        // Stable sort, descending by score
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(limit);

        scored
            .into_iter()
            .map(|(score, e)| Passage {
                score: Some(score),
                ..e.passage.clone()
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Passage counts grouped by source.
    pub fn sources(&self) -> BTreeMap<String, usize> {
        let entries = self.entries.read();
        let mut counts = BTreeMap::new();
        for e in entries.iter() {
            *counts.entry(e.passage.metadata.source.clone()).or_insert(0) += 1;
        }
        counts
    }

    /// Atomic write via temp file + rename.
    fn persist(&self, entries: &[VectorEntry]) -> Result<()> {
        let data = serde_json::to_string(entries)?;
        let tmp_path = self.persist_path.with_extension("json.tmp");
        std::fs::write(&tmp_path, data).context("Failed to write vector store")?;
        std::fs::rename(&tmp_path, &self.persist_path).context("Failed to replace vector store")?;
        Ok(())
    }
}

fn zip_entries(passages: Vec<Passage>, embeddings: Vec<Vec<f32>>) -> Result<Vec<VectorEntry>> {
    if passages.len() != embeddings.len() {
        anyhow::bail!(
            "Got {} embeddings for {} passages",
            embeddings.len(),
            passages.len()
        );
    }
    Ok(passages
        .into_iter()
        .zip(embeddings)
        .map(|(passage, embedding)| VectorEntry { passage, embedding })
        .collect())
}

/// Convenience for tests and fixtures.
pub fn passage(content: &str, source: &str, chunk_index: usize) -> Passage {
    Passage::new(
        content,
        PassageMetadata {
            source: source.to_string(),
            page: None,
            chunk_index,
        },
    )
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom == 0.0 {
        0.0
    } else {
        dot / denom
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with_three() -> (tempfile::TempDir, VectorStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = VectorStore::open_or_create(dir.path()).unwrap();
        store
            .add(
                vec![
                    passage("core frequency", "data/stm32f4.pdf", 0),
                    passage("lte categories", "data/bg96.pdf", 0),
                    passage("flash size", "data/stm32f1.pdf", 0),
                ],
                vec![vec![1.0, 0.0, 0.0], vec![0.0, 1.0, 0.0], vec![0.7, 0.7, 0.0]],
            )
            .unwrap();
        (dir, store)
    }

    #[test]
    fn test_cosine_identical_and_orthogonal() {
        assert!((cosine_similarity(&[1.0, 2.0], &[1.0, 2.0]) - 1.0).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]), 0.0);
    }

    #[test]
    fn test_cosine_mismatched_or_zero() {
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn test_search_orders_by_similarity() {
        let (_dir, store) = store_with_three();
        let hits = store.search(&[1.0, 0.1, 0.0], 3, None);
        assert_eq!(hits.len(), 3);
        assert_eq!(hits[0].source(), "data/stm32f4.pdf");
        assert_eq!(hits[1].source(), "data/stm32f1.pdf");
        assert!(hits[0].score.unwrap() >= hits[1].score.unwrap());
    }

    #[test]
    fn test_search_respects_limit() {
        let (_dir, store) = store_with_three();
        assert_eq!(store.search(&[1.0, 0.0, 0.0], 2, None).len(), 2);
    }

    #[test]
    fn test_search_filter_is_exact() {
        let (_dir, store) = store_with_three();
        let filter = MetadataFilter::source("data/bg96.pdf");
        let hits = store.search(&[1.0, 0.0, 0.0], 5, Some(&filter));
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].source(), "data/bg96.pdf");

        let partial = MetadataFilter::source("bg96.pdf");
        assert!(store.search(&[1.0, 0.0, 0.0], 5, Some(&partial)).is_empty());
    }

    #[test]
    fn test_ties_keep_insertion_order() {
        let dir = tempfile::tempdir().unwrap();
        let store = VectorStore::open_or_create(dir.path()).unwrap();
        store
            .add(
                vec![
                    passage("first", "a", 0),
                    passage("second", "a", 1),
                    passage("third", "a", 2),
                ],
                vec![vec![1.0, 0.0]; 3],
            )
            .unwrap();
        let hits = store.search(&[1.0, 0.0], 3, None);
        let order: Vec<&str> = hits.iter().map(|p| p.content.as_str()).collect();
        assert_eq!(order, vec!["first", "second", "third"]);
    }

    #[test]
    fn test_persists_across_reopen() {
        let (dir, store) = store_with_three();
        drop(store);
        let reopened = VectorStore::open_or_create(dir.path()).unwrap();
        assert_eq!(reopened.len(), 3);
        assert_eq!(reopened.sources().get("data/bg96.pdf"), Some(&1));
    }

    #[test]
    fn test_add_rejects_mismatched_lengths() {
        let dir = tempfile::tempdir().unwrap();
        let store = VectorStore::open_or_create(dir.path()).unwrap();
        let result = store.add(vec![passage("x", "a", 0)], vec![]);
        assert!(result.is_err());
        assert!(store.is_empty());
    }

    #[test]
    fn test_clear() {
        let (_dir, store) = store_with_three();
        store.clear().unwrap();
        assert!(store.is_empty());
        assert!(store.sources().is_empty());
    }

    /// Point the persist path at a directory so every write fails.
    fn break_persistence(dir: &Path) {
        let path = dir.join("vectors.json");
        let _ = std::fs::remove_file(&path);
        std::fs::create_dir_all(path.join("blocker")).unwrap();
    }

    #[test]
    fn test_failed_add_leaves_memory_unchanged() {
        let (dir, store) = store_with_three();
        break_persistence(dir.path());
        let result = store.add(vec![passage("new", "data/bg96.pdf", 1)], vec![vec![0.0, 0.0, 1.0]]);
        assert!(result.is_err());
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn test_failed_clear_and_replace_leave_memory_unchanged() {
        let (dir, store) = store_with_three();
        break_persistence(dir.path());
        assert!(store.clear().is_err());
        assert!(store
            .replace(vec![passage("new", "data/bg96.pdf", 0)], vec![vec![1.0, 0.0, 0.0]])
            .is_err());
        assert_eq!(store.len(), 3);
        assert_eq!(store.sources().get("data/stm32f4.pdf"), Some(&1));
    }

    #[test]
    fn test_replace_swaps_contents() {
        let (dir, store) = store_with_three();
        store
            .replace(vec![passage("only", "data/bg96.pdf", 0)], vec![vec![1.0, 0.0, 0.0]])
            .unwrap();
        assert_eq!(store.len(), 1);
        let reopened = VectorStore::open_or_create(dir.path()).unwrap();
        assert_eq!(reopened.len(), 1);
    }
}
