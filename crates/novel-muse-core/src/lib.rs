//! # Novel Muse Core
//!
//! Retrieval and prompt logic for Novel Muse: chapter chunking, the
//! embedding trait, cosine ranking, context assembly, and the prompt
//! builders and parsers used for outline and chapter generation.
//!
//! This crate contains no tokio runtime, sqlx, HTTP client, or filesystem
//! I/O. Storage and text generation are reached only through the traits in
//! [`store`] and [`gateway`]; the `novel-muse` app crate supplies the SQLite
//! and OpenAI-compatible implementations.

pub mod chunk;
pub mod context;
pub mod embedding;
pub mod error;
pub mod gateway;
pub mod generate;
pub mod models;
pub mod prompt;
pub mod rank;
pub mod store;
pub mod words;

pub use error::{RagError, Result};
