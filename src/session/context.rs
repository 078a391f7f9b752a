//! Derived, read-only session view.

use crate::session::record::AnalysisRecord;
use serde::Serialize;
use std::collections::HashMap;

/// How many trailing records feed the recurring-pattern summary.
const PATTERN_WINDOW: usize = 5;

/// How many trailing transcripts are exposed to analyzers.
const RECENT_TRANSCRIPTS: usize = 3;

/// Snapshot of a session handed to text analyzers and the insights engine.
///
/// `previous_analyses` is the lifetime total, not the retained history length;
/// everything else is computed over the (possibly truncated) in-memory history.
#[derive(Debug, Clone, Serialize)]
pub struct SessionContext {
    pub previous_analyses: u64,
    pub session_duration_minutes: f64,
    pub recent_transcripts: Vec<String>,
    pub recurring_patterns: RecurringPatterns,
}

/// Patterns over the last few records, oldest first.
#[derive(Debug, Clone, Serialize)]
pub struct RecurringPatterns {
    pub deception_flag_counts: Vec<u32>,
    pub emotion_counts: HashMap<String, u32>,
    pub credibility_trend: Vec<f64>,
}

impl SessionContext {
    pub(super) fn derive(
        analysis_count: u64,
        session_duration_minutes: f64,
        history: &[AnalysisRecord],
    ) -> Self {
        let recent_transcripts = history
            .iter()
            .rev()
            .take(RECENT_TRANSCRIPTS)
            .map(|record| record.transcript.clone())
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect();

        let window_start = history.len().saturating_sub(PATTERN_WINDOW);
        let window = &history[window_start..];

        let mut emotion_counts = HashMap::new();
        for record in window {
            *emotion_counts.entry(record.top_emotion.clone()).or_insert(0) += 1;
        }

        Self {
            previous_analyses: analysis_count,
            session_duration_minutes,
            recent_transcripts,
            recurring_patterns: RecurringPatterns {
                deception_flag_counts: window.iter().map(|r| r.red_flag_count).collect(),
                emotion_counts,
                credibility_trend: window.iter().map(|r| r.credibility_score).collect(),
            },
        }
    }
}
