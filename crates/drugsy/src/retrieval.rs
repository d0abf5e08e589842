//! Retrieval-augmented answering for literature questions.
//!
//! One query runs the whole pipeline: search PubMed, resolve full text where
//! possible, chunk, embed, rank in a query-scoped vector index, then ask the
//! model to answer strictly from the retrieved excerpts. Nothing is cached or
//! shared between queries; the index lives and dies inside a single call.
pub mod chunk;
pub mod embedding;
pub mod engine;
pub mod index;
pub mod literature;
