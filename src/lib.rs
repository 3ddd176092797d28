//! # docqa
//!
//! Question answering over uploaded PDF documents.
//!
//! Each PDF is extracted, split into overlapping character chunks, embedded
//! with a hosted embedding model and stored in its own SQLite-backed vector
//! index. Questions are answered by retrieving the most similar chunks and
//! asking a hosted chat model to answer from them.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────────┐   ┌──────────────┐
//! │  Upload  │──▶│ Extract+Chunk│──▶│ index.sqlite │
//! │   PDF    │   │   + Embed    │   │ per document │
//! └──────────┘   └──────────────┘   └──────┬───────┘
//!                                          │
//!                      ┌───────────────────┤
//!                      ▼                   ▼
//!                 ┌──────────┐       ┌──────────┐
//!                 │   CLI    │       │   HTTP   │
//!                 │ (docqa)  │       │   API    │
//!                 └──────────┘       └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! docqa ingest ./report.pdf
//! docqa ask report "What was the revenue in 2023?"
//! docqa chat report
//! docqa serve
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | Settings from environment, `.env` and TOML |
//! | [`error`] | Pipeline error taxonomy |
//! | [`models`] | Core data types |
//! | [`files`] | Upload storage and index listing |
//! | [`extract`] | PDF text extraction |
//! | [`chunk`] | Text chunking |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`llm`] | Completion provider and prompt |
//! | [`http`] | Provider HTTP calls with retry |
//! | [`index`] | Vector indexes |
//! | [`db`] | Database connection |
//! | [`migrate`] | Index schema |
//! | [`ingest`] | Ingestion pipeline |
//! | [`query`] | Question answering |
//! | [`session`] | Question history |
//! | [`logging`] | Log file setup |
//! | [`server`] | HTTP API |

pub mod chunk;
pub mod config;
pub mod db;
pub mod embedding;
pub mod error;
pub mod extract;
pub mod files;
pub mod http;
pub mod index;
pub mod ingest;
pub mod llm;
pub mod logging;
pub mod migrate;
pub mod models;
pub mod query;
pub mod server;
pub mod session;
