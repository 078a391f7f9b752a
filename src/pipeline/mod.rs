//! # Analysis Pipeline
//!
//! Drives the per-upload analysis state machine and the event stream that
//! reports it.
//!
//! Module structure:
//! - events.rs: wire-level event union pushed through the ConnectionHub
//! - report.rs: the assembled result of one complete run
//! - orchestrator.rs: the pipeline state machine itself

pub mod events;
pub mod orchestrator;
pub mod report;

pub use events::PipelineEvent;
pub use orchestrator::PipelineOrchestrator;
pub use report::AnalysisReport;
