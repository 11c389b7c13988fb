//! Hybrid search execution.

pub mod merger;
pub mod retriever;
pub mod scorer;
