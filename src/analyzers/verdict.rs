//! Strongly typed collaborator outputs.
//!
//! Every analysis step's payload is represented as a dedicated struct instead
//! of an untyped JSON blob, and the nine text analyzers share one tagged union
//! keyed by analyzer name. Malformed or failed analyzer output maps to the
//! explicit `Degraded` variant rather than leaking an error across the
//! orchestration boundary.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Result of the audio-quality probe (foundational step 1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioQualityReport {
    pub duration_seconds: f64,
    pub sample_rate: u32,
    pub channels: u16,
    /// RMS loudness in dBFS (0 is full scale, silence trends toward -inf)
    pub loudness_db: f64,
    /// 0-100 heuristic usability score for downstream analysis
    pub quality_score: f64,
}

/// One scored emotion label from the emotion classifier (foundational step 3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmotionScore {
    pub emotion: String,
    /// Normalized confidence in 0.0..=1.0
    pub score: f64,
}

/// Categorical risk level used by the risk analyzer and session records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    /// Ordinal mapping used for trend computation: low=1, medium=2, high=3.
    pub fn ordinal(&self) -> f64 {
        match self {
            RiskLevel::Low => 1.0,
            RiskLevel::Medium => 2.0,
            RiskLevel::High => 3.0,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output union for the nine independent text analyzers.
///
/// Serialized with an `analyzer` discriminator so the wire payload of an
/// `analysis_update` event is self-describing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "analyzer", rename_all = "snake_case")]
pub enum AnalyzerVerdict {
    DeceptionMarkers(DeceptionReport),
    Credibility(CredibilityReport),
    LinguisticMetrics(LinguisticReport),
    Sentiment(SentimentReport),
    ManipulationTactics(ManipulationReport),
    RiskAssessment(RiskReport),
    PsychologicalProfile(ProfileReport),
    TopicSummary(TopicReport),
    ConsistencyCheck(ConsistencyReport),

    /// The analyzer failed or produced unusable output; siblings are
    /// unaffected and the run continues.
    Degraded { name: String, reason: String },
}

impl AnalyzerVerdict {
    /// The analyzer name this verdict belongs to (matches the wire tag).
    pub fn analyzer_name(&self) -> &str {
        match self {
            AnalyzerVerdict::DeceptionMarkers(_) => "deception_markers",
            AnalyzerVerdict::Credibility(_) => "credibility",
            AnalyzerVerdict::LinguisticMetrics(_) => "linguistic_metrics",
            AnalyzerVerdict::Sentiment(_) => "sentiment",
            AnalyzerVerdict::ManipulationTactics(_) => "manipulation_tactics",
            AnalyzerVerdict::RiskAssessment(_) => "risk_assessment",
            AnalyzerVerdict::PsychologicalProfile(_) => "psychological_profile",
            AnalyzerVerdict::TopicSummary(_) => "topic_summary",
            AnalyzerVerdict::ConsistencyCheck(_) => "consistency_check",
            AnalyzerVerdict::Degraded { name, .. } => name,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, AnalyzerVerdict::Degraded { .. })
    }
}

/// Markers commonly associated with deceptive speech.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeceptionReport {
    pub red_flags: Vec<String>,
    pub red_flag_count: u32,
    pub hedging_count: u32,
    pub assessment: String,
}

/// Overall credibility estimate for the statement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredibilityReport {
    /// 0-100 scale
    pub credibility_score: f64,
    /// "low" | "moderate" | "high" confidence in the score itself
    pub confidence_level: String,
    pub factors: Vec<String>,
}

/// Surface linguistic metrics of the transcript.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinguisticReport {
    pub word_count: u32,
    pub hesitation_count: u32,
    pub speech_rate_wpm: f64,
    /// 0-100, higher is more formal register
    pub formality_score: f64,
}

/// Lexicon-based sentiment polarity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SentimentReport {
    /// -1.0 (negative) ..= 1.0 (positive)
    pub polarity: f64,
    pub label: String,
    pub positive_hits: u32,
    pub negative_hits: u32,
}

/// Detected persuasion/manipulation tactics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManipulationReport {
    pub tactics: Vec<String>,
    pub tactic_count: u32,
    pub severity: String,
}

/// Aggregated risk classification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskReport {
    pub overall_risk: RiskLevel,
    pub score: f64,
    pub contributing_factors: Vec<String>,
}

/// Behavioral/psychological snapshot derived from the statement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileReport {
    pub dominant_traits: Vec<String>,
    pub stress_indicators: u32,
    pub summary: String,
}

/// Keyword extraction and a one-line subject summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicReport {
    pub keywords: Vec<String>,
    pub summary: String,
}

/// Comparison of the current statement against recent session transcripts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsistencyReport {
    pub contradiction_count: u32,
    /// Keyword overlap with recent transcripts in 0.0..=1.0
    pub overlap_ratio: f64,
    pub assessment: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_risk_level_ordinals() {
        assert_eq!(RiskLevel::Low.ordinal(), 1.0);
        assert_eq!(RiskLevel::Medium.ordinal(), 2.0);
        assert_eq!(RiskLevel::High.ordinal(), 3.0);
    }

    #[test]
    fn test_risk_level_wire_format() {
        let json = serde_json::to_string(&RiskLevel::High).unwrap();
        assert_eq!(json, "\"high\"");

        let back: RiskLevel = serde_json::from_str("\"medium\"").unwrap();
        assert_eq!(back, RiskLevel::Medium);
    }

    #[test]
    fn test_verdict_is_tagged_by_analyzer_name() {
        let verdict = AnalyzerVerdict::Sentiment(SentimentReport {
            polarity: 0.4,
            label: "positive".to_string(),
            positive_hits: 3,
            negative_hits: 1,
        });

        let json = serde_json::to_value(&verdict).unwrap();
        assert_eq!(json["analyzer"], "sentiment");
        assert_eq!(json["polarity"], 0.4);
        assert_eq!(verdict.analyzer_name(), "sentiment");
        assert!(!verdict.is_degraded());
    }

    #[test]
    fn test_degraded_verdict_keeps_analyzer_name() {
        let verdict = AnalyzerVerdict::Degraded {
            name: "topic_summary".to_string(),
            reason: "backend unavailable".to_string(),
        };
        assert_eq!(verdict.analyzer_name(), "topic_summary");
        assert!(verdict.is_degraded());

        let json = serde_json::to_value(&verdict).unwrap();
        assert_eq!(json["analyzer"], "degraded");
        assert_eq!(json["name"], "topic_summary");
    }
}
