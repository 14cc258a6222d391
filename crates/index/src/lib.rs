pub mod chunking;
pub mod embedding;
pub mod markdown_sync;
pub mod retry;
pub mod search;
pub mod store;
pub mod transcript_sync;

pub use embedding::EmbeddingProvider;
pub use markdown_sync::{sync_markdown_scope, MarkdownSyncReport};
pub use retry::{execute_with_retry, RemoteError};
pub use search::{search, LexicalIndex, PolicyGate, SearchHit, SearchRequest};
pub use store::{Chunk, FileEntry, IndexStore};
pub use transcript_sync::{sync_transcript, TranscriptSyncReport};
