//! SQLite storage module for Formula 1 statistics
//!
//! Provides the schema, a repository over it, and sequence repair for
//! tables whose keys are supplied by bulk loads.

pub mod repository;
pub mod schema;
pub mod sequences;

pub use repository::Repository;
pub use sequences::{reconcile_sequences, SequenceReport};
