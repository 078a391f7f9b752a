//! # Session Management
//!
//! In-memory session state for the review tool. A session groups repeated
//! analyses under one opaque id so trend insights can be computed across them.
//!
//! Module structure:
//! - record.rs: the compact per-analysis record and the history adapter shape
//! - context.rs: derived read-only session view handed to analyzers/insights
//! - store.rs: the concurrent session map and its operations
//!
//! All state is process-lifetime only; nothing is persisted.

pub mod context;
pub mod record;
pub mod store;

pub use context::{RecurringPatterns, SessionContext};
pub use record::{AnalysisRecord, HistoricalAnalysis};
pub use store::SessionStore;
