//! The knowledge base searched by `search_kb`.

use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use thiserror::Error;

const TITLE_WEIGHT: f64 = 3.0;
const TAG_WEIGHT: f64 = 2.0;
const CONTENT_WEIGHT: f64 = 1.0;
const PHRASE_BONUS: f64 = 5.0;

/// The knowledge base could not be read.
#[derive(Debug, Error)]
pub enum KbError {
    /// The file could not be read.
    #[error("cannot read knowledge base: {0}")]
    Io(#[from] io::Error),
    /// The file is not a JSON array of entries.
    #[error("malformed knowledge base: {0}")]
    Format(#[from] serde_json::Error),
}

/// One article.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KbEntry {
    /// Stable identifier, e.g. `kb-001`.
    pub id: String,
    /// Weighs the most when scoring.
    pub title: String,
    /// The article body.
    #[serde(default)]
    pub content: String,
    /// Free-form labels, matched case-insensitively.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Who may read the entry, e.g. `customer` or `internal`.
    #[serde(default)]
    pub audience: Option<String>,
}

/// Narrows a search down before scoring.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SearchFilter {
    /// Keep entries carrying any of these tags. Empty keeps everything.
    pub tags: Vec<String>,
    /// Keep entries for this audience only.
    pub audience: Option<String>,
}

impl SearchFilter {
    fn admits(&self, entry: &KbEntry) -> bool {
        if !self.tags.is_empty()
            && !self.tags.iter().any(|wanted| {
                entry.tags.iter().any(|tag| tag.eq_ignore_ascii_case(wanted))
            })
        {
            return false;
        }
        match &self.audience {
            Some(audience) => entry
                .audience
                .as_deref()
                .is_some_and(|a| a.eq_ignore_ascii_case(audience)),
            None => true,
        }
    }
}

/// An entry with its relevance to a query.
#[derive(Clone, Debug, PartialEq)]
pub struct ScoredEntry {
    /// The matching entry.
    pub entry: KbEntry,
    /// Higher is more relevant, always positive.
    pub score: f64,
}

/// Something `search_kb` can search.
pub trait SearchIndex: Send + Sync + 'static {
    /// Returns the entries relevant to `query`, most relevant first.
    ///
    /// This may block on I/O.
    fn search(
        &self,
        query: &str,
        filter: &SearchFilter,
    ) -> Result<Vec<ScoredEntry>, KbError>;
}

/// A knowledge base read from a JSON array of entries.
///
/// The file is read again whenever its modification time changes.
#[derive(Debug)]
pub struct JsonKnowledgeBase {
    path: PathBuf,
    cache: Mutex<Option<Snapshot>>,
}

#[derive(Debug)]
struct Snapshot {
    modified: SystemTime,
    entries: Arc<[KbEntry]>,
}

impl JsonKnowledgeBase {
    /// Creates a knowledge base backed by `path`. Nothing is read until the
    /// first search.
    #[inline]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cache: Mutex::new(None),
        }
    }

    /// Returns the path of the backing file.
    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the current entries, reading the file if it changed.
    pub fn entries(&self) -> Result<Arc<[KbEntry]>, KbError> {
        let modified = fs::metadata(&self.path)?.modified()?;
        let mut cache =
            self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(snapshot) =
            cache.as_ref().filter(|snapshot| snapshot.modified == modified)
        {
            return Ok(Arc::clone(&snapshot.entries));
        }

        let entries: Vec<KbEntry> =
            serde_json::from_slice(&fs::read(&self.path)?)?;
        info!(
            "loaded {} knowledge base entries from {}",
            entries.len(),
            self.path.display()
        );
        let entries: Arc<[KbEntry]> = entries.into();
        *cache = Some(Snapshot {
            modified,
            entries: Arc::clone(&entries),
        });
        Ok(entries)
    }
}

impl SearchIndex for JsonKnowledgeBase {
    fn search(
        &self,
        query: &str,
        filter: &SearchFilter,
    ) -> Result<Vec<ScoredEntry>, KbError> {
        Ok(rank(&self.entries()?, query, filter))
    }
}

/// Scores every admitted entry against `query` and sorts the positive ones,
/// most relevant first. Ties keep their order in the knowledge base.
pub fn rank(
    entries: &[KbEntry],
    query: &str,
    filter: &SearchFilter,
) -> Vec<ScoredEntry> {
    let query = query.to_lowercase();
    let query_words: HashSet<&str> = query.split_whitespace().collect();

    let mut ranked: Vec<_> = entries
        .iter()
        .filter(|entry| filter.admits(entry))
        .filter_map(|entry| {
            let score = score(&query, &query_words, entry);
            (score > 0.0).then(|| ScoredEntry {
                entry: entry.clone(),
                score: (score * 100.0).round() / 100.0,
            })
        })
        .collect();
    ranked.sort_by(|a, b| b.score.total_cmp(&a.score));
    ranked
}

fn score(query: &str, query_words: &HashSet<&str>, entry: &KbEntry) -> f64 {
    let title = entry.title.to_lowercase();
    let content = entry.content.to_lowercase();
    let tags: Vec<_> =
        entry.tags.iter().map(|tag| tag.to_lowercase()).collect();

    let title_matches = overlap(title.split_whitespace(), query_words);
    let content_matches = overlap(content.split_whitespace(), query_words);
    let tag_matches = overlap(tags.iter().map(String::as_str), query_words);
    let mut score = title_matches * TITLE_WEIGHT
        + content_matches * CONTENT_WEIGHT
        + tag_matches * TAG_WEIGHT;
    if !query.is_empty() && (title.contains(query) || content.contains(query))
    {
        score += PHRASE_BONUS;
    }
    score
}

/// Counts the distinct words that also occur in the query.
fn overlap<'a>(
    words: impl Iterator<Item = &'a str>,
    query_words: &HashSet<&str>,
) -> f64 {
    let words: HashSet<&str> = words.collect();
    words
        .into_iter()
        .filter(|word| query_words.contains(*word))
        .count() as f64
}
