//! Pipeline orchestration for Ekimae.
//!
//! This crate ties together station sources, clustering, thematic analysis
//! and POI enrichment into a resumable run (`run_pipeline`) and its dry-run
//! counterpart (`plan`).

pub mod orchestrator;
pub mod progress_log;
pub mod sources;

pub use orchestrator::{
    PipelineDeps, PlannedCluster, ProgressReporter, RunConfig, RunPlan, RunSummary,
    SilentProgress, plan, run_pipeline,
};
pub use progress_log::{JsonFileLog, MemoryLog, PipelineState, ProgressLog};
pub use sources::{StationSet, load_station_set};
