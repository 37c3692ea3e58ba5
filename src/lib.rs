//! # Tirtha
//!
//! A retrieval-backed support chat service for a pilgrimage travel
//! platform. Customer questions are answered by retrieving relevant
//! passages from categorized knowledge collections and forwarding them,
//! with the conversation history, to a hosted chat model.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐   ┌──────────────┐   ┌─────────────┐
//! │ knowledge/ │──▶│ Route+Chunk   │──▶│   SQLite    │
//! │ .txt/.md   │   │ + Embed      │   │  (vectors)  │
//! └────────────┘   └──────────────┘   └──────┬──────┘
//!                                            │
//!                       ┌────────────────────┤
//!                       ▼                    ▼
//!                 ┌───────────┐       ┌────────────┐
//!                 │ Retrieval │──────▶│ Generation │
//!                 │ aggregate │       │ (hosted)   │
//!                 └───────────┘       └────────────┘
//! ```
//!
//! The knowledge base rebuilds itself when the source files change
//! (snapshot-hash staleness detection) and supports incremental
//! replace-by-filename uploads without a full reindex.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`collections`] | Fixed collection identities |
//! | [`route`] | Filename-to-collection routing |
//! | [`chunk`] | Overlapping-window text splitting |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`generation`] | Hosted chat-model client |
//! | [`store`] | Vector store trait + in-memory backend |
//! | [`sqlite_store`] | SQLite-backed vector store |
//! | [`knowledge`] | Knowledge base lifecycle |
//! | [`retrieval`] | Query-time context aggregation |
//! | [`session`] | Bounded per-session escalation tracking |
//! | [`chat`] | Conversation gate and chat pipeline |
//! | [`extract`] | Upload text extraction |
//! | [`server`] | HTTP API |

pub mod chat;
pub mod chunk;
pub mod collections;
pub mod config;
pub mod db;
pub mod embedding;
pub mod extract;
pub mod generation;
pub mod knowledge;
pub mod migrate;
pub mod models;
pub mod retrieval;
pub mod route;
pub mod server;
pub mod session;
pub mod sqlite_store;
pub mod store;
