//! Corpus ingestion.
//!
//! The search path never writes. Products, their embedding records and their
//! keyword documents are created together here, in a full wipe-and-reseed
//! run driven by [`IngestPipeline`].

pub mod pipeline;
pub mod seed;

pub use pipeline::{IngestConfig, IngestFailure, IngestPipeline, IngestReport};
pub use seed::{ProductSeed, load_seed_file, parse_seeds, products_from_seeds};
