//! # Support KB Core
//!
//! Pure logic for the support knowledge base: data models, the
//! section-aware chunker, the preview session, the store abstraction, and
//! the embedding trait.
//!
//! This crate contains no tokio, sqlx, filesystem I/O, or other
//! runtime-bound dependencies.

pub mod chunk;
pub mod embedding;
pub mod models;
pub mod preview;
pub mod store;
