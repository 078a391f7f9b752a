//! Compact per-analysis records and the adapter shape served from history.

use crate::analyzers::verdict::{EmotionScore, RiskLevel};
use crate::pipeline::report::AnalysisReport;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Compact summary of one completed analysis.
///
/// This is what a session retains, not the full report: enough for trend
/// computation and history display while keeping per-session memory bounded.
/// Immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisRecord {
    pub timestamp: DateTime<Utc>,
    pub transcript: String,
    /// 1-based position in the session's lifetime sequence (survives eviction)
    pub analysis_number: u64,
    pub credibility_score: f64,
    pub confidence_level: String,
    pub overall_risk: RiskLevel,
    pub top_emotion: String,
    pub red_flag_count: u32,
    pub hesitation_count: u32,
    pub speech_rate_wpm: f64,
    pub formality_score: f64,
}

impl AnalysisRecord {
    /// Extract the fixed compact subset from a full report.
    ///
    /// Degraded analyzers leave their fields at neutral defaults: credibility
    /// 50 with "unknown" confidence, medium risk (the ordinal midpoint), and
    /// zeroed counters.
    pub fn extract(analysis_number: u64, transcript: &str, report: &AnalysisReport) -> Self {
        let (credibility_score, confidence_level) = report
            .credibility()
            .map(|c| (c.credibility_score, c.confidence_level.clone()))
            .unwrap_or((50.0, "unknown".to_string()));

        let overall_risk = report
            .risk()
            .map(|r| r.overall_risk)
            .unwrap_or(RiskLevel::Medium);

        let red_flag_count = report.deception().map(|d| d.red_flag_count).unwrap_or(0);

        let (hesitation_count, speech_rate_wpm, formality_score) = report
            .linguistic()
            .map(|l| (l.hesitation_count, l.speech_rate_wpm, l.formality_score))
            .unwrap_or((0, 0.0, 0.0));

        Self {
            timestamp: Utc::now(),
            transcript: transcript.to_string(),
            analysis_number,
            credibility_score,
            confidence_level,
            overall_risk,
            top_emotion: report.top_emotion().to_string(),
            red_flag_count,
            hesitation_count,
            speech_rate_wpm,
            formality_score,
        }
    }
}

/// History entry reconstructed into the shape the insights layer and the UI
/// consume: the top emotion widened back into a one-element scored list and
/// the risk fields grouped into a nested object.
///
/// This reconstruction is a deliberate adapter over `AnalysisRecord`, not a
/// re-derivation from the original report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoricalAnalysis {
    pub timestamp: DateTime<Utc>,
    pub analysis_number: u64,
    pub transcript: String,
    pub emotions: Vec<EmotionScore>,
    pub risk: RiskSummary,
    pub credibility: CredibilitySummary,
    pub linguistic: LinguisticSummary,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskSummary {
    pub overall_risk: RiskLevel,
    pub red_flag_count: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredibilitySummary {
    pub score: f64,
    pub confidence_level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinguisticSummary {
    pub hesitation_count: u32,
    pub speech_rate_wpm: f64,
    pub formality_score: f64,
}

impl From<&AnalysisRecord> for HistoricalAnalysis {
    fn from(record: &AnalysisRecord) -> Self {
        Self {
            timestamp: record.timestamp,
            analysis_number: record.analysis_number,
            transcript: record.transcript.clone(),
            emotions: vec![EmotionScore {
                emotion: record.top_emotion.clone(),
                // The record keeps only the label; the adapter restores a
                // scored list with full weight on the retained emotion.
                score: 1.0,
            }],
            risk: RiskSummary {
                overall_risk: record.overall_risk,
                red_flag_count: record.red_flag_count,
            },
            credibility: CredibilitySummary {
                score: record.credibility_score,
                confidence_level: record.confidence_level.clone(),
            },
            linguistic: LinguisticSummary {
                hesitation_count: record.hesitation_count,
                speech_rate_wpm: record.speech_rate_wpm,
                formality_score: record.formality_score,
            },
        }
    }
}
