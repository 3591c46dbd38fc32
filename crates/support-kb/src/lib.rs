//! # Support KB
//!
//! **Section-aware document ingestion for a customer-support knowledge base.**
//!
//! Support documents (FAQs, terms of service, product guides) are split into
//! bounded-size chunks along explicit `SECTION:` headers, each chunk is
//! embedded with its section name as context, and the rows are stored in
//! SQLite for a retrieval-augmented chat assistant to search.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌──────────────┐   ┌───────────┐
//! │  Documents  │──▶│   Chunker    │──▶│  Embedder │
//! │ txt/md/pdf  │   │ (core crate) │   │ HTTP APIs │
//! └─────────────┘   └──────────────┘   └─────┬─────┘
//!                                            ▼
//!                 ┌──────────┐         ┌───────────┐
//!                 │   CLI    │◀───────▶│  SQLite   │
//!                 │  (skb)   │         │  chunks   │
//!                 └──────────┘         └─────┬─────┘
//!                                            ▼
//!                                      ┌───────────┐
//!                                      │ Admin API │
//!                                      └───────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! skb init                      # create database
//! skb preview docs/faq.txt      # inspect chunks without storing
//! skb ingest                    # ingest every document under [documents].root
//! skb ingest faq.txt --force    # re-ingest one document
//! skb embed pending             # embed rows stored while embeddings were off
//! skb serve                     # start the admin HTTP API
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing and validation |
//! | [`db`] | SQLite connection pool (WAL) |
//! | [`migrate`] | Idempotent schema creation |
//! | [`sqlite_store`] | [`Store`](support_kb_core::store::Store) over SQLite |
//! | [`extract`] | Text extraction for `.txt`, `.md`, and `.pdf` files |
//! | [`embedding`] | Embedding providers: disabled, http, openai, ollama |
//! | [`ingest`] | Discovery and the sequential embed-then-insert driver |
//! | [`embed_cmd`] | Backfill of rows stored without a vector |
//! | [`preview_cmd`] | `skb preview` output |
//! | [`sources`] | Source listing and deletion |
//! | [`show`] | Stored chunks for one source |
//! | [`progress`] | Ingestion progress on stderr |
//! | [`server`] | Admin HTTP API (axum) |

pub mod config;
pub mod db;
pub mod embed_cmd;
pub mod embedding;
pub mod extract;
pub mod ingest;
pub mod migrate;
pub mod preview_cmd;
pub mod progress;
pub mod server;
pub mod show;
pub mod sources;
pub mod sqlite_store;

pub use support_kb_core::chunk::{chunk_document, chunk_document_with, ChunkLimits};
pub use support_kb_core::models::Chunk;
