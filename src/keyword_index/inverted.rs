//! In-memory inverted keyword index with BM25 ranking.

use std::collections::BTreeSet;

use ahash::AHashMap;
use async_trait::async_trait;
use log::debug;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::keyword_index::bm25::{Bm25Config, Bm25Scorer, CollectionStats};
use crate::keyword_index::tokenizer::{query_terms, tokenize};
use crate::keyword_index::{KeywordIndex, MatchMode};
use crate::product::{KeywordDocument, ScoredId, descending_score};

/// Configuration for [`InvertedKeywordIndex`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InvertedIndexConfig {
    pub bm25: Bm25Config,
    pub match_mode: MatchMode,
}

#[derive(Debug)]
struct DocEntry {
    id: String,
    length: usize,
    term_freqs: AHashMap<String, u32>,
}

#[derive(Debug, Default)]
struct Postings {
    /// Documents in insertion order.
    docs: Vec<DocEntry>,
    positions: AHashMap<String, usize>,
    /// Term to the positions of documents containing it.
    terms: AHashMap<String, BTreeSet<usize>>,
    total_length: usize,
}

impl Postings {
    fn stats(&self) -> CollectionStats {
        let total_docs = self.docs.len();
        CollectionStats {
            total_docs,
            avg_doc_length: if total_docs == 0 {
                0.0
            } else {
                self.total_length as f32 / total_docs as f32
            },
        }
    }

    fn insert(&mut self, doc: KeywordDocument) {
        let tokens = tokenize(&doc.text);
        let mut term_freqs: AHashMap<String, u32> = AHashMap::new();
        for token in tokens.iter() {
            *term_freqs.entry(token.clone()).or_insert(0) += 1;
        }
        let entry = DocEntry {
            id: doc.id,
            length: tokens.len(),
            term_freqs,
        };

        let pos = match self.positions.get(&entry.id).copied() {
            Some(pos) => {
                self.remove_terms(pos);
                pos
            }
            None => {
                let pos = self.docs.len();
                self.positions.insert(entry.id.clone(), pos);
                self.docs.push(DocEntry {
                    id: entry.id.clone(),
                    length: 0,
                    term_freqs: AHashMap::new(),
                });
                pos
            }
        };

        for term in entry.term_freqs.keys() {
            self.terms.entry(term.clone()).or_default().insert(pos);
        }
        self.total_length += entry.length;
        self.docs[pos] = entry;
    }

    fn remove_terms(&mut self, pos: usize) {
        let old = &self.docs[pos];
        self.total_length -= old.length;
        for term in old.term_freqs.keys() {
            if let Some(set) = self.terms.get_mut(term) {
                set.remove(&pos);
                if set.is_empty() {
                    self.terms.remove(term);
                }
            }
        }
    }

    /// Drop documents by id, compacting positions so insertion order holds.
    fn remove(&mut self, ids: &[String]) {
        if !ids.iter().any(|id| self.positions.contains_key(id)) {
            return;
        }
        let docs = std::mem::take(&mut self.docs);
        *self = Postings::default();
        for entry in docs.into_iter().filter(|entry| !ids.contains(&entry.id)) {
            let pos = self.docs.len();
            for term in entry.term_freqs.keys() {
                self.terms.entry(term.clone()).or_default().insert(pos);
            }
            self.total_length += entry.length;
            self.positions.insert(entry.id.clone(), pos);
            self.docs.push(entry);
        }
    }

    fn candidates(&self, terms: &[String], mode: MatchMode) -> BTreeSet<usize> {
        match mode {
            MatchMode::All => {
                let mut sets = Vec::with_capacity(terms.len());
                for term in terms {
                    match self.terms.get(term) {
                        Some(set) => sets.push(set),
                        None => return BTreeSet::new(),
                    }
                }
                sets.sort_by_key(|set| set.len());
                let Some((smallest, rest)) = sets.split_first() else {
                    return BTreeSet::new();
                };
                smallest
                    .iter()
                    .copied()
                    .filter(|pos| rest.iter().all(|set| set.contains(pos)))
                    .collect()
            }
            MatchMode::Any => terms
                .iter()
                .filter_map(|term| self.terms.get(term))
                .flat_map(|set| set.iter().copied())
                .collect(),
        }
    }
}

/// Inverted index over [`KeywordDocument`]s.
///
/// Ranking is BM25. Equal scores keep insertion order.
#[derive(Debug)]
pub struct InvertedKeywordIndex {
    config: InvertedIndexConfig,
    scorer: Bm25Scorer,
    postings: RwLock<Postings>,
}

impl InvertedKeywordIndex {
    /// Create a new empty index.
    pub fn new(config: InvertedIndexConfig) -> Self {
        Self {
            scorer: Bm25Scorer::new(config.bm25),
            config,
            postings: RwLock::new(Postings::default()),
        }
    }

    /// Number of indexed documents.
    pub fn len(&self) -> usize {
        self.postings.read().docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn rank(&self, text: &str, k: usize) -> Vec<ScoredId> {
        let terms = query_terms(text);
        if terms.is_empty() || k == 0 {
            return Vec::new();
        }

        let postings = self.postings.read();
        let stats = postings.stats();
        let doc_freqs: AHashMap<&str, usize> = terms
            .iter()
            .map(|term| {
                let df = postings.terms.get(term).map(|set| set.len()).unwrap_or(0);
                (term.as_str(), df)
            })
            .collect();

        // BTreeSet iteration yields positions in insertion order, which the
        // stable sort below preserves for ties.
        let mut scored: Vec<(usize, f32)> = postings
            .candidates(&terms, self.config.match_mode)
            .into_iter()
            .map(|pos| {
                let doc = &postings.docs[pos];
                let score =
                    self.scorer
                        .score(&terms, &doc.term_freqs, doc.length, &doc_freqs, &stats);
                (pos, score)
            })
            .collect();
        scored.sort_by(|a, b| descending_score(a.1, b.1));
        scored.truncate(k);

        scored
            .into_iter()
            .map(|(pos, score)| ScoredId::new(postings.docs[pos].id.clone(), score))
            .collect()
    }
}

impl Default for InvertedKeywordIndex {
    fn default() -> Self {
        Self::new(InvertedIndexConfig::default())
    }
}

#[async_trait]
impl KeywordIndex for InvertedKeywordIndex {
    async fn query_keyword(&self, text: &str, k: usize) -> Result<Vec<ScoredId>> {
        let hits = self.rank(text, k);
        debug!("keyword index matched {} documents for {:?}", hits.len(), text);
        Ok(hits)
    }

    async fn upsert(&self, documents: Vec<KeywordDocument>) -> Result<()> {
        let mut postings = self.postings.write();
        for doc in documents {
            postings.insert(doc);
        }
        Ok(())
    }

    async fn delete(&self, ids: &[String]) -> Result<()> {
        self.postings.write().remove(ids);
        Ok(())
    }

    async fn delete_all(&self) -> Result<()> {
        *self.postings.write() = Postings::default();
        Ok(())
    }
}
