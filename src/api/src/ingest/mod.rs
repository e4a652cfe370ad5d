//! Batch CSV ingestion pipeline
//!
//! Flow: orchestrator plan step → row source → sanitizers → record
//! construction → batch committer. Rows fail individually; whole-file
//! failures are reported per entity and never stop the run.

pub mod committer;
pub mod loader;
pub mod orchestrator;
pub mod records;
pub mod sanitize;
pub mod source;

pub use loader::{LoadOptions, LoadState, LoadSummary};
pub use orchestrator::{
    load_file, load_source, plan_step, run_pipeline, EntityOutcome, PipelineOptions, RunReport,
};
pub use source::RowSource;
