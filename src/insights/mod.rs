//! # Session Insights
//!
//! Cross-analysis statistics over a session's history, rendered as narrative
//! insight strings for the review UI.

pub mod engine;

pub use engine::{calculate_trend, InsightsEngine};
