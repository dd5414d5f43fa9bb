//! # MediMate Store
//!
//! Local storage for a prescription assistant: embedded document chunks in
//! flat JSON files, searched by exact cosine similarity, plus chat session
//! and user account bookkeeping.
//!
//! This library provides:
//! - A namespaced vector store with idempotent ingestion
//! - Brute-force top-k cosine search with prescription filtering
//! - A pluggable embedding capability (Gemini `embedContent` client included)
//! - JSON-file session and message history
//! - Local user accounts with bcrypt password hashes
//!
//! ## Example
//!
//! ```rust
//! use medimate_store::{Embedder, Metadata, Result, VectorStore};
//!
//! struct Lengths;
//!
//! impl Embedder for Lengths {
//!     fn embed_query(&self, text: &str) -> Result<Vec<f64>> {
//!         Ok(vec![text.len() as f64, 1.0])
//!     }
//! }
//!
//! let dir = tempfile::tempdir().unwrap();
//! let store = VectorStore::open(dir.path(), Some(Box::new(Lengths))).unwrap();
//!
//! store.add_prescription("RX1", &["take 1 tablet daily"], &Metadata::new()).unwrap();
//! let matches = store.search("tablet", Some("RX1"), None, 5).unwrap();
//! assert_eq!(matches.len(), 1);
//! ```

pub mod accounts;
pub mod collection;
pub mod config;
pub mod embedding;
pub mod error;
pub mod flat_index;
pub mod logging;
pub mod persistence;
pub mod sessions;
pub mod similarity;
pub mod store;
pub mod vector;

pub use accounts::AccountStore;
pub use collection::{Collection, Metadata, SearchMatch, VectorRecord};
pub use config::AppConfig;
pub use embedding::{Embedder, GeminiEmbedder};
pub use error::{Result, StoreError};
pub use sessions::{SessionFields, SessionStore};
pub use store::{VectorStore, DEFAULT_TOP_K};
pub use vector::Vector;
