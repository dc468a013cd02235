//! Ingestion and maintenance passes.
//!
//! - [`Ingestor`]: fetch → dedup → persist → notify for every source
//! - [`purge_collection`]: iterative bulk delete

mod ingest;
mod purge;

pub use ingest::Ingestor;
pub use purge::purge_collection;
