//! Embedding enrichment for extracted voter rolls.
//!
//! The extracted `{unit}.json` files gain one dense vector per voter,
//! computed over the name/guardian text by an injected
//! [`EmbeddingProvider`], and are re-emitted as `{unit}_embedded.json`.
//! Also hosts cosine-similarity search over the embedded files.

pub mod batch;
pub mod provider;
pub mod search;

pub use batch::{
    BatchConfig, BatchProgress, BatchReport, SilentProgress, UnitFailure, UnitSuccess,
    attach_embeddings, run_batch,
};
pub use provider::{BridgeProvider, EmbeddingProvider};
pub use search::{SearchHit, cosine, search_units};
