use sha2::{Digest, Sha256};

#[derive(Debug, Clone)]
pub struct ChunkDraft {
    pub start_line: usize,
    pub end_line: usize,
    pub content: String,
    pub content_hash: String,
    pub token_count: usize,
}

pub fn content_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}

/// Deterministic identifier derived from the source path and chunk line
/// boundaries, so re-chunking the same file always produces the same id set
/// and reindexing is idempotent.
pub fn stable_chunk_id(path: &str, start_line: usize, end_line: usize) -> String {
    let mut hasher = Sha256::new();
    hasher.update(path.as_bytes());
    hasher.update(b":");
    hasher.update(start_line.to_string().as_bytes());
    hasher.update(b"-");
    hasher.update(end_line.to_string().as_bytes());
    hex::encode(hasher.finalize())
}

fn approx_token_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Splits file content into line-bounded chunks of roughly `target_tokens`
/// tokens each, never splitting a line across two chunks.
pub fn chunk_lines(content: &str, target_tokens: usize) -> Vec<ChunkDraft> {
    let lines: Vec<&str> = content.lines().collect();
    if lines.is_empty() {
        return Vec::new();
    }

    let mut chunks = Vec::new();
    let mut start = 0usize;
    let mut current_tokens = 0usize;
    let mut buf: Vec<&str> = Vec::new();

    for (idx, line) in lines.iter().enumerate() {
        buf.push(line);
        current_tokens += approx_token_count(line);
        let is_last = idx == lines.len() - 1;
        if current_tokens >= target_tokens || is_last {
            let text = buf.join("\n");
            chunks.push(ChunkDraft {
                start_line: start,
                end_line: idx,
                content_hash: content_hash(&text),
                token_count: current_tokens,
                content: text,
            });
            buf.clear();
            current_tokens = 0;
            start = idx + 1;
        }
    }

    chunks
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += (*x as f64) * (*y as f64);
        norm_a += (*x as f64) * (*x as f64);
        norm_b += (*y as f64) * (*y as f64);
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}
