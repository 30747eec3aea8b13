//! convlog - conversation log store library
//!
//! Stores conversation messages in date-partitioned JSONL files and answers
//! filtered queries and per-session summaries over them.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//!
//! - `store`: Record model, partitioned append store, query engine, session aggregation
//! - `tools`: Tool executors and registry over the store
//! - `server`: Newline-delimited JSON-RPC server exposing the tools
//! - `config`: Configuration management and validation
//! - `logging`: Tracing subscriber setup
//! - `error`: Error types and result aliases
//! - `cli`, `commands`: Command-line interface and handlers
//!
//! # Example
//!
//! ```no_run
//! use convlog::store::{ConversationBatch, LogStore, QueryFilter};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let store = LogStore::new("/tmp/convlog");
//!     let batch = ConversationBatch::from_value(&serde_json::json!({
//!         "messages": [{"role": "user", "content": "hello"}]
//!     }))?;
//!     store.save_conversation(batch).await?;
//!
//!     let logs = store.query_logs(&QueryFilter::default(), None).await?;
//!     assert_eq!(logs.len(), 1);
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod logging;
pub mod server;
pub mod store;
pub mod tools;

// Re-export commonly used types
pub use config::Config;
pub use error::{ConvlogError, ErrorKind, Result};
pub use store::LogStore;
pub use tools::ToolRegistry;
