//! # Worker Tools
//!
//! Side-effecting capabilities the workers are allowed to use.
//!
//! - `search` - Web search (SearXNG) behind the [`search::SearchProvider`] seam
//! - `fetch` - Concurrent page fetching with per-URL failure isolation
//! - `extract` - HTML to plain text reduction
//! - `fs_session` - Sandboxed output directory sessions for generated documents

pub mod extract;
pub mod fetch;
pub mod fs_session;
pub mod search;

pub use fetch::{fetch_all, FetchOptions};
pub use fs_session::{FsSession, FsTool};
pub use search::{SearchHit, SearchProvider, SearxngSearch};
