//! Chunk-granularity reverse index for lexical search, and the semantic
//! search engine that fuses it with vector similarity via Reciprocal Rank
//! Fusion.

use std::collections::HashMap;
use std::sync::RwLock;

use sa_domain::config::SearchConfig;

use crate::chunking::cosine_similarity;
use crate::store::{Chunk, IndexStore};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Lexical index (word -> chunk match counts)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// In-memory reverse index over chunk content: word -> { chunk_idx -> count }.
/// Generalizes the session-level transcript index to chunk granularity so it
/// can feed the lexical half of rank fusion.
pub struct LexicalIndex {
    index: RwLock<HashMap<String, HashMap<u64, usize>>>,
}

impl LexicalIndex {
    pub fn new() -> Self {
        Self {
            index: RwLock::new(HashMap::new()),
        }
    }

    pub fn index_chunk(&self, chunk_idx: u64, content: &str) {
        let words = tokenize(content);
        if words.is_empty() {
            return;
        }
        let mut idx = self.index.write().unwrap();
        for word in words {
            *idx.entry(word).or_default().entry(chunk_idx).or_insert(0) += 1;
        }
    }

    pub fn remove_chunk(&self, chunk_idx: u64) {
        let mut idx = self.index.write().unwrap();
        for counts in idx.values_mut() {
            counts.remove(&chunk_idx);
        }
    }

    /// OR semantics across query words: every chunk matching at least one
    /// word is a candidate, scored by summed match count. Broader recall
    /// here is deliberate — the rank-fusion stage, not this index, decides
    /// what ultimately surfaces.
    pub fn search(&self, query: &str) -> Vec<(u64, usize)> {
        let words = tokenize(query);
        if words.is_empty() {
            return Vec::new();
        }
        let idx = self.index.read().unwrap();
        let mut scores: HashMap<u64, usize> = HashMap::new();
        for word in &words {
            if let Some(matches) = idx.get(word) {
                for (chunk_idx, count) in matches {
                    *scores.entry(*chunk_idx).or_insert(0) += count;
                }
            }
        }
        let mut results: Vec<_> = scores.into_iter().collect();
        results.sort_by(|a, b| b.1.cmp(&a.1));
        results
    }
}

impl Default for LexicalIndex {
    fn default() -> Self {
        Self::new()
    }
}

fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.len() >= 2)
        .map(String::from)
        .collect()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Semantic search engine
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone)]
pub struct SearchHit {
    pub chunk_idx: u64,
    pub path: String,
    pub content: String,
    pub score: f64,
}

pub struct SearchRequest<'a> {
    pub query: &'a str,
    pub query_embedding: Option<&'a [f32]>,
    pub top_k: usize,
    pub now_ms: i64,
}

/// A policy read-gate evaluated against a candidate chunk. Re-applied after
/// every pipeline hook that can introduce new chunks, so an expansion hook
/// can never smuggle a chunk outside the caller's allowed memory lanes into
/// the final result set.
pub type PolicyGate<'a> = dyn Fn(&Chunk) -> bool + 'a;

fn recency_boost(age_days: f64, half_life_days: f64) -> f64 {
    if half_life_days <= 0.0 {
        return 1.0;
    }
    1.0 + 2f64.powf(-age_days / half_life_days)
}

fn access_boost(access_count: u64, access_weight: f64) -> f64 {
    1.0 + (1.0 + access_count as f64).ln() * access_weight
}

fn rrf_rank_score(rank: Option<usize>, weight: f64, rrf_k: f64) -> f64 {
    match rank {
        Some(r) => weight / (rrf_k + (r + 1) as f64),
        None => 0.0,
    }
}

/// Runs the three-hook search pipeline: prefilter (policy gate over all
/// active chunks), neighbor expansion (pull in adjacent chunks from the
/// same file, re-gated), then rerank (RRF fusion of vector + lexical rank,
/// boosted by recency and access frequency, cut by `min_score`).
pub fn search(
    store: &IndexStore,
    lexical: &LexicalIndex,
    request: &SearchRequest<'_>,
    config: &SearchConfig,
    gate: &PolicyGate<'_>,
) -> Vec<SearchHit> {
    // Hook 1: prefilter.
    let mut candidates: HashMap<u64, Chunk> = store
        .all_active_chunks()
        .into_iter()
        .filter(|c| gate(c))
        .map(|c| (c.chunk_idx, c))
        .collect();

    // Hook 2: neighbor expansion, then re-gate.
    let by_path: HashMap<String, Vec<Chunk>> = {
        let mut grouped: HashMap<String, Vec<Chunk>> = HashMap::new();
        for chunk in store.all_active_chunks() {
            grouped.entry(chunk.path.clone()).or_default().push(chunk);
        }
        grouped
    };
    let seed_idxs: Vec<u64> = candidates.keys().copied().collect();
    for idx in seed_idxs {
        let Some(seed) = candidates.get(&idx).cloned() else {
            continue;
        };
        if let Some(siblings) = by_path.get(&seed.path) {
            for sibling in siblings {
                let adjacent = sibling.end_line + 1 == seed.start_line
                    || seed.end_line + 1 == sibling.start_line;
                if adjacent && gate(sibling) {
                    candidates.entry(sibling.chunk_idx).or_insert_with(|| sibling.clone());
                }
            }
        }
    }
    candidates.retain(|_, c| gate(c));

    // Hook 3: rerank via RRF fusion.
    let text_ranks: HashMap<u64, usize> = lexical
        .search(request.query)
        .into_iter()
        .enumerate()
        .map(|(rank, (chunk_idx, _))| (chunk_idx, rank))
        .collect();

    let mut vector_scored: Vec<(u64, f64)> = Vec::new();
    if let Some(query_embedding) = request.query_embedding {
        for chunk in candidates.values() {
            let sim = cosine_similarity(query_embedding, &chunk.embedding);
            vector_scored.push((chunk.chunk_idx, sim));
        }
        vector_scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    }
    let vector_ranks: HashMap<u64, usize> = vector_scored
        .into_iter()
        .enumerate()
        .map(|(rank, (chunk_idx, _))| (chunk_idx, rank))
        .collect();

    let mut hits: Vec<SearchHit> = candidates
        .values()
        .filter_map(|chunk| {
            let vector_part =
                rrf_rank_score(vector_ranks.get(&chunk.chunk_idx).copied(), config.vector_weight, config.rrf_k);
            let text_part =
                rrf_rank_score(text_ranks.get(&chunk.chunk_idx).copied(), config.text_weight, config.rrf_k);
            if vector_part == 0.0 && text_part == 0.0 {
                return None;
            }
            let age_days = ((request.now_ms - chunk.created_at_ms).max(0) as f64) / 86_400_000.0;
            let score = (vector_part + text_part)
                * recency_boost(age_days, config.recency_half_life_days)
                * access_boost(chunk.access_count, config.access_weight);
            if score < config.min_score {
                return None;
            }
            Some(SearchHit {
                chunk_idx: chunk.chunk_idx,
                path: chunk.path.clone(),
                content: chunk.content.clone(),
                score,
            })
        })
        .collect();

    hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    hits.truncate(request.top_k);

    for hit in &hits {
        if let Err(e) = store.mark_accessed(hit.chunk_idx, request.now_ms) {
            tracing::warn!(chunk_idx = hit.chunk_idx, error = %e, "failed to mark chunk accessed");
        }
    }

    hits
}

#[cfg(test)]
mod tests {
    use super::*;

    fn allow_all(_: &Chunk) -> bool {
        true
    }

    #[test]
    fn lexical_index_scores_by_summed_match_count() {
        let idx = LexicalIndex::new();
        idx.index_chunk(1, "rust is great, rust is fast");
        idx.index_chunk(2, "python is fine");
        let hits = idx.search("rust");
        assert_eq!(hits[0].0, 1);
        assert_eq!(hits[0].1, 2);
    }

    #[test]
    fn search_respects_policy_gate() {
        let dir = tempfile::tempdir().unwrap();
        let store = IndexStore::open(dir.path().join("store.json")).unwrap();
        store
            .insert_or_get("c1", "notes.md", 0, 1, "a secret plan", "h1", 3, vec![1.0, 0.0], 0)
            .unwrap();
        let lexical = LexicalIndex::new();
        lexical.index_chunk(0, "a secret plan");

        let config = SearchConfig::default();
        let request = SearchRequest {
            query: "secret",
            query_embedding: Some(&[1.0, 0.0]),
            top_k: 10,
            now_ms: 0,
        };

        let denied = search(&store, &lexical, &request, &config, &|_: &Chunk| false);
        assert!(denied.is_empty());

        let allowed = search(&store, &lexical, &request, &config, &allow_all);
        assert_eq!(allowed.len(), 1);
    }

    #[test]
    fn neighbor_expansion_pulls_in_adjacent_chunk() {
        let dir = tempfile::tempdir().unwrap();
        let store = IndexStore::open(dir.path().join("store.json")).unwrap();
        store
            .insert_or_get("c1", "notes.md", 0, 1, "rust chunk", "h1", 2, vec![1.0, 0.0], 0)
            .unwrap();
        store
            .insert_or_get("c2", "notes.md", 2, 3, "unrelated neighbor", "h2", 2, vec![0.0, 1.0], 0)
            .unwrap();
        let lexical = LexicalIndex::new();
        lexical.index_chunk(0, "rust chunk");
        lexical.index_chunk(1, "unrelated neighbor");

        let config = SearchConfig {
            min_score: 0.0,
            ..SearchConfig::default()
        };
        let request = SearchRequest {
            query: "rust",
            query_embedding: Some(&[1.0, 0.0]),
            top_k: 10,
            now_ms: 0,
        };
        let hits = search(&store, &lexical, &request, &config, &allow_all);
        assert!(hits.iter().any(|h| h.chunk_idx == 1));
    }

    #[test]
    fn search_marks_returned_chunks_as_accessed() {
        let dir = tempfile::tempdir().unwrap();
        let store = IndexStore::open(dir.path().join("store.json")).unwrap();
        store
            .insert_or_get("c1", "notes.md", 0, 1, "a secret plan", "h1", 3, vec![1.0, 0.0], 0)
            .unwrap();
        let lexical = LexicalIndex::new();
        lexical.index_chunk(0, "a secret plan");

        let config = SearchConfig::default();
        let request = SearchRequest {
            query: "secret",
            query_embedding: Some(&[1.0, 0.0]),
            top_k: 10,
            now_ms: 500,
        };

        let hits = search(&store, &lexical, &request, &config, &allow_all);
        assert_eq!(hits.len(), 1);

        let chunk = store.all_active_chunks().into_iter().find(|c| c.chunk_idx == 0).unwrap();
        assert_eq!(chunk.access_count, 1);
        assert_eq!(chunk.last_accessed_at_ms, Some(500));
    }

    #[test]
    fn min_score_cutoff_excludes_weak_matches() {
        let dir = tempfile::tempdir().unwrap();
        let store = IndexStore::open(dir.path().join("store.json")).unwrap();
        store
            .insert_or_get("c1", "notes.md", 0, 1, "irrelevant text", "h1", 2, vec![0.0, 1.0], 0)
            .unwrap();
        let lexical = LexicalIndex::new();

        let config = SearchConfig {
            min_score: 10.0,
            ..SearchConfig::default()
        };
        let request = SearchRequest {
            query: "nothing matches here",
            query_embedding: Some(&[1.0, 0.0]),
            top_k: 10,
            now_ms: 0,
        };
        let hits = search(&store, &lexical, &request, &config, &allow_all);
        assert!(hits.is_empty());
    }
}
