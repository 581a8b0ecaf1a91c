//! # Novel Muse
//!
//! Retrieval-augmented drafting for long-form fiction.
//!
//! Chapters are stored in SQLite, split into overlapping windows, and
//! embedded. When the writer asks for the next chapter's outline (or for an
//! outline to be expanded into prose), the most relevant earlier passages
//! are ranked against the latest chapters and packed into the prompt sent to
//! an OpenAI-compatible model.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────────┐   ┌───────────────┐
//! │   CLI    │──▶│ NovelService │──▶│    SQLite     │
//! │  (muse)  │   │   (novels)   │   │ chapters+vecs │
//! └──────────┘   └──────┬───────┘   └───────▲───────┘
//!                       │                   │
//!          ┌────────────┼───────────┐       │
//!          ▼            ▼           ▼       │
//!   ┌────────────┐ ┌─────────┐ ┌─────────┐  │
//!   │  Gateway   │ │ Context │ │ Reindex │──┘
//!   │ (chat API) │ │Assembler│ │  queue  │
//!   └────────────┘ └─────────┘ └─────────┘
//! ```
//!
//! The retrieval and prompt logic lives in `novel-muse-core`; this crate
//! provides the storage, HTTP clients, background worker, and CLI.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |
//! | [`models`] | Novel, chapter-write, note, and settings records |
//! | [`sqlite_store`] | SQLite implementation of the core storage traits |
//! | [`embedding`] | Embedder factory and OpenAI-compatible embedder |
//! | [`gateway`] | OpenAI-compatible chat completions gateway |
//! | [`reindex`] | Background chapter re-indexing |
//! | [`novels`] | Service layer used by the CLI |
//! | [`commands`] | CLI command handlers |
//! | [`logging`] | `tracing` subscriber setup |

pub mod commands;
pub mod config;
pub mod db;
pub mod embedding;
pub mod gateway;
pub mod logging;
pub mod migrate;
pub mod models;
pub mod novels;
pub mod reindex;
pub mod sqlite_store;
