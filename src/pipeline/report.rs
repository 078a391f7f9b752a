//! The assembled result of one complete pipeline run.

use crate::analyzers::verdict::{
    AnalyzerVerdict, AudioQualityReport, CredibilityReport, DeceptionReport, EmotionScore,
    LinguisticReport, RiskReport,
};
use serde::Serialize;
use std::collections::HashMap;

/// Everything one run produced, in step order. The compact session record is
/// extracted from this; the report itself is transient.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    pub audio_quality: AudioQualityReport,
    pub transcript: String,
    pub emotions: Vec<EmotionScore>,
    /// Verdicts in analyzer declaration order, degraded entries included
    pub verdicts: Vec<AnalyzerVerdict>,
    /// Cross-analysis insight strings, empty on a session's first analysis
    pub session_insights: HashMap<String, String>,
}

impl AnalysisReport {
    pub fn credibility(&self) -> Option<&CredibilityReport> {
        self.verdicts.iter().find_map(|v| match v {
            AnalyzerVerdict::Credibility(report) => Some(report),
            _ => None,
        })
    }

    pub fn risk(&self) -> Option<&RiskReport> {
        self.verdicts.iter().find_map(|v| match v {
            AnalyzerVerdict::RiskAssessment(report) => Some(report),
            _ => None,
        })
    }

    pub fn deception(&self) -> Option<&DeceptionReport> {
        self.verdicts.iter().find_map(|v| match v {
            AnalyzerVerdict::DeceptionMarkers(report) => Some(report),
            _ => None,
        })
    }

    pub fn linguistic(&self) -> Option<&LinguisticReport> {
        self.verdicts.iter().find_map(|v| match v {
            AnalyzerVerdict::LinguisticMetrics(report) => Some(report),
            _ => None,
        })
    }

    /// Highest-scored emotion label, or "neutral" when the classifier
    /// returned nothing.
    pub fn top_emotion(&self) -> &str {
        self.emotions
            .iter()
            .max_by(|a, b| a.score.total_cmp(&b.score))
            .map(|e| e.emotion.as_str())
            .unwrap_or("neutral")
    }

    pub fn degraded_count(&self) -> usize {
        self.verdicts.iter().filter(|v| v.is_degraded()).count()
    }
}
