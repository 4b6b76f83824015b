//! # docchat
//!
//! A document upload and chat backend. Users upload PDF or plain-text
//! documents over HTTP; the server extracts their text, splits it into
//! sentence-aware chunks, and stores everything in SQLite. A chat API then
//! answers questions about a document by assembling the stored chunks and
//! recent conversation history into a prompt for an external language model.
//!
//! ## Module Map
//!
//! | Module | Responsibility |
//! |--------|----------------|
//! | [`config`] | TOML configuration loading and validation |
//! | [`db`] | SQLite connection pool setup |
//! | [`migrate`] | Schema creation (idempotent) |
//! | [`models`] | Core data types shared across layers |
//! | [`extract`] | PDF/TXT text extraction with placeholder fallbacks |
//! | [`chunk`] | Sentence-aware text chunking |
//! | [`ingest`] | Background ingestion queue and pipeline |
//! | [`prompt`] | Chat prompt assembly from chunks and history |
//! | [`ai`] | Chat model abstraction and the Gemini provider |
//! | [`store`] | Persistence trait with SQLite and in-memory backends |
//! | [`auth`] | Bearer-token identity resolution |
//! | [`files`] | Local blob storage for uploaded files |
//! | [`server`] | HTTP API (axum) |

pub mod ai;
pub mod auth;
pub mod chunk;
pub mod config;
pub mod db;
pub mod extract;
pub mod files;
pub mod ingest;
pub mod migrate;
pub mod models;
pub mod prompt;
pub mod server;
pub mod store;
