//! Computes trend insights across repeated analyses in one session.
//!
//! The engine consumes the session context, the just-completed analysis
//! record, and the prior history (current record not yet included). Each
//! insight is a named narrative string; on a session's very first analysis
//! there is nothing to compare against and the mapping is empty.

use crate::session::record::{AnalysisRecord, HistoricalAnalysis};
use crate::session::SessionContext;
use std::collections::HashMap;

const INSUFFICIENT_DATA: &str = "Insufficient data";

/// Ordinary least-squares slope over the index sequence 0..n-1.
///
/// Returns 0 for fewer than two points or a degenerate denominator.
pub fn calculate_trend(values: &[f64]) -> f64 {
    let n = values.len() as f64;
    if values.len() < 2 {
        return 0.0;
    }

    let sum_x: f64 = (0..values.len()).map(|i| i as f64).sum();
    let sum_y: f64 = values.iter().sum();
    let sum_xy: f64 = values.iter().enumerate().map(|(i, y)| i as f64 * y).sum();
    let sum_x2: f64 = (0..values.len()).map(|i| (i as f64) * (i as f64)).sum();

    let denominator = n * sum_x2 - sum_x * sum_x;
    if denominator == 0.0 {
        return 0.0;
    }

    (n * sum_xy - sum_x * sum_y) / denominator
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

fn variance(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    values.iter().map(|v| (v - m) * (v - m)).sum::<f64>() / values.len() as f64
}

/// Computes named insight strings from session history.
pub struct InsightsEngine {
    /// Minimum absolute slope before a trajectory counts as directional
    trend_epsilon: f64,
}

impl InsightsEngine {
    pub fn new(trend_epsilon: f64) -> Self {
        Self { trend_epsilon }
    }

    /// Generate all insights for a completed analysis.
    ///
    /// `history` holds the prior records only; `current` is the record that
    /// was just committed. Empty on the session's first analysis.
    pub fn generate(
        &self,
        context: &SessionContext,
        current: &AnalysisRecord,
        history: &[HistoricalAnalysis],
    ) -> HashMap<String, String> {
        let mut insights = HashMap::new();

        if context.previous_analyses == 0 {
            return insights;
        }

        insights.insert(
            "consistency_analysis".to_string(),
            self.consistency_analysis(current, history),
        );
        insights.insert(
            "behavioral_evolution".to_string(),
            self.behavioral_evolution(context, current),
        );
        insights.insert(
            "risk_trajectory".to_string(),
            self.risk_trajectory(current, history),
        );
        insights.insert(
            "conversation_dynamics".to_string(),
            self.conversation_dynamics(context, current),
        );

        insights
    }

    /// Credibility variance/trend plus a categorical emotional-stability read.
    fn consistency_analysis(
        &self,
        current: &AnalysisRecord,
        history: &[HistoricalAnalysis],
    ) -> String {
        let mut scores: Vec<f64> = history.iter().map(|h| h.credibility.score).collect();
        scores.push(current.credibility_score);

        if scores.len() < 2 {
            return format!("{} for consistency analysis", INSUFFICIENT_DATA);
        }

        let avg = mean(&scores);
        let var = variance(&scores);
        let consistency = if var < 50.0 {
            "High"
        } else if var < 200.0 {
            "Moderate"
        } else {
            "Low"
        };

        let slope = calculate_trend(&scores);
        let direction = if slope > self.trend_epsilon {
            "improving"
        } else if slope < -self.trend_epsilon {
            "declining"
        } else {
            "stable"
        };

        // Emotional stability is categorical: diversity and mode of the labels
        let mut emotions: Vec<&str> = history
            .iter()
            .filter_map(|h| h.emotions.first())
            .map(|e| e.emotion.as_str())
            .collect();
        emotions.push(&current.top_emotion);

        let mut counts: HashMap<&str, usize> = HashMap::new();
        for emotion in &emotions {
            *counts.entry(emotion).or_insert(0) += 1;
        }
        let (mode, mode_count) = counts
            .iter()
            .max_by_key(|(_, count)| **count)
            .map(|(label, count)| (*label, *count))
            .unwrap_or(("neutral", 0));

        let emotional = if mode_count as f64 / emotions.len() as f64 >= 0.6 {
            format!("emotionally steady (mostly {})", mode)
        } else {
            format!("emotionally variable across {} states", counts.len())
        };

        format!(
            "{} consistency: credibility mean {:.1}, variance {:.1}, {} trend ({:+.1}/analysis); {}",
            consistency, avg, var, direction, slope, emotional
        )
    }

    /// Contextualizes the current linguistic snapshot against session age.
    ///
    /// Historical linguistic metrics are not averaged here; only the current
    /// analysis is characterized.
    fn behavioral_evolution(&self, context: &SessionContext, current: &AnalysisRecord) -> String {
        let register = if current.formality_score > 65.0 {
            "a formal register"
        } else if current.formality_score < 35.0 {
            "a casual register"
        } else {
            "a neutral register"
        };

        let mut observations = vec![register.to_string()];
        if current.hesitation_count > 5 {
            observations.push(format!("frequent hesitation ({})", current.hesitation_count));
        }
        if current.speech_rate_wpm > 180.0 {
            observations.push(format!("rapid speech ({:.0} wpm)", current.speech_rate_wpm));
        } else if current.speech_rate_wpm > 0.0 && current.speech_rate_wpm < 100.0 {
            observations.push(format!(
                "deliberate pacing ({:.0} wpm)",
                current.speech_rate_wpm
            ));
        }

        format!(
            "Analysis {} after {:.1} minutes shows {}",
            current.analysis_number,
            context.session_duration_minutes,
            observations.join(", ")
        )
    }

    /// Direction of risk over the session, from ordinal risk levels and
    /// deception-flag counts.
    fn risk_trajectory(&self, current: &AnalysisRecord, history: &[HistoricalAnalysis]) -> String {
        let mut ordinals: Vec<f64> = history
            .iter()
            .map(|h| h.risk.overall_risk.ordinal())
            .collect();
        ordinals.push(current.overall_risk.ordinal());

        if ordinals.len() < 2 {
            return format!("{} for risk trajectory", INSUFFICIENT_DATA);
        }

        let mut flag_counts: Vec<f64> = history
            .iter()
            .map(|h| h.risk.red_flag_count as f64)
            .collect();
        flag_counts.push(current.red_flag_count as f64);

        let risk_slope = calculate_trend(&ordinals);
        let flag_slope = calculate_trend(&flag_counts);

        let classification = if risk_slope > self.trend_epsilon {
            "ESCALATING"
        } else if risk_slope < -self.trend_epsilon {
            "DECREASING"
        } else {
            "STABLE"
        };

        let flag_direction = if flag_slope > self.trend_epsilon {
            "rising"
        } else if flag_slope < -self.trend_epsilon {
            "falling"
        } else {
            "flat"
        };

        format!(
            "{}: risk slope {:+.2}/analysis, deception flags {} ({:+.2}/analysis), currently {}",
            classification, risk_slope, flag_direction, flag_slope, current.overall_risk
        )
    }

    /// Pace, detail level and engagement variability of the conversation.
    fn conversation_dynamics(&self, context: &SessionContext, current: &AnalysisRecord) -> String {
        let pace = if context.session_duration_minutes > 0.0 {
            (context.previous_analyses + 1) as f64 / context.session_duration_minutes
        } else {
            0.0
        };

        let mut lengths: Vec<f64> = context
            .recent_transcripts
            .iter()
            .map(|t| t.len() as f64)
            .collect();
        lengths.push(current.transcript.len() as f64);

        let avg_length = mean(&lengths);
        let detail = if avg_length > 400.0 {
            "detailed responses"
        } else if avg_length > 120.0 {
            "moderately detailed responses"
        } else {
            "brief responses"
        };

        let engagement = if lengths.len() >= 3 {
            // Relative spread avoids flagging uniformly long answers
            let spread = variance(&lengths).sqrt() / avg_length.max(1.0);
            if spread > 0.5 {
                ", engagement varies sharply between statements"
            } else {
                ", steady engagement"
            }
        } else {
            ""
        };

        format!(
            "{:.1} analyses/minute with {}{}",
            pace, detail, engagement
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzers::verdict::RiskLevel;
    use crate::session::RecurringPatterns;
    use chrono::Utc;

    fn record(credibility: f64, risk: RiskLevel, flags: u32) -> AnalysisRecord {
        AnalysisRecord {
            timestamp: Utc::now(),
            transcript: "a statement of reasonable length for testing dynamics".to_string(),
            analysis_number: 3,
            credibility_score: credibility,
            confidence_level: "moderate".to_string(),
            overall_risk: risk,
            top_emotion: "calm".to_string(),
            red_flag_count: flags,
            hesitation_count: 1,
            speech_rate_wpm: 130.0,
            formality_score: 50.0,
        }
    }

    fn historical(credibility: f64, risk: RiskLevel, flags: u32) -> HistoricalAnalysis {
        HistoricalAnalysis::from(&AnalysisRecord {
            timestamp: Utc::now(),
            transcript: "earlier statement".to_string(),
            analysis_number: 1,
            credibility_score: credibility,
            confidence_level: "moderate".to_string(),
            overall_risk: risk,
            top_emotion: "calm".to_string(),
            red_flag_count: flags,
            hesitation_count: 0,
            speech_rate_wpm: 120.0,
            formality_score: 50.0,
        })
    }

    fn context(previous: u64) -> SessionContext {
        SessionContext {
            previous_analyses: previous,
            session_duration_minutes: 10.0,
            recent_transcripts: vec!["one".to_string(), "two".to_string()],
            recurring_patterns: RecurringPatterns {
                deception_flag_counts: vec![],
                emotion_counts: HashMap::new(),
                credibility_trend: vec![],
            },
        }
    }

    #[test]
    fn test_calculate_trend_degenerate_inputs() {
        assert_eq!(calculate_trend(&[]), 0.0);
        assert_eq!(calculate_trend(&[5.0]), 0.0);
    }

    #[test]
    fn test_calculate_trend_linear_sequence() {
        let slope = calculate_trend(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        assert!((slope - 1.0).abs() < 1e-9);

        let slope = calculate_trend(&[80.0, 60.0, 40.0]);
        assert!((slope + 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_first_analysis_yields_no_insights() {
        let engine = InsightsEngine::new(0.2);
        let insights = engine.generate(&context(0), &record(70.0, RiskLevel::Low, 0), &[]);
        assert!(insights.is_empty());
    }

    #[test]
    fn test_consistency_insufficient_data() {
        let engine = InsightsEngine::new(0.2);
        // One prior analysis existed but was evicted: only the current score remains
        let text = engine.consistency_analysis(&record(70.0, RiskLevel::Low, 0), &[]);
        assert!(text.contains("Insufficient data"));
        assert!(!text.contains("variance"));
    }

    /// Declining credibility with rising risk: [80, 60, 40] credibility
    /// alongside [low, medium, high] risk labels.
    #[test]
    fn test_escalating_risk_with_declining_credibility() {
        let engine = InsightsEngine::new(0.2);
        let history = vec![
            historical(80.0, RiskLevel::Low, 0),
            historical(60.0, RiskLevel::Medium, 2),
        ];
        let current = record(40.0, RiskLevel::High, 4);

        let risk = engine.risk_trajectory(&current, &history);
        assert!(risk.starts_with("ESCALATING"), "got: {}", risk);
        assert!(risk.contains("+1.00/analysis"));

        let consistency = engine.consistency_analysis(&current, &history);
        assert!(consistency.contains("declining"), "got: {}", consistency);
        assert!(consistency.contains("-20.0"), "got: {}", consistency);
    }

    #[test]
    fn test_stable_risk_within_epsilon() {
        let engine = InsightsEngine::new(0.2);
        let history = vec![
            historical(70.0, RiskLevel::Medium, 1),
            historical(71.0, RiskLevel::Medium, 1),
        ];
        let current = record(70.0, RiskLevel::Medium, 1);

        let risk = engine.risk_trajectory(&current, &history);
        assert!(risk.starts_with("STABLE"), "got: {}", risk);
    }

    #[test]
    fn test_risk_trajectory_insufficient_data() {
        let engine = InsightsEngine::new(0.2);
        let text = engine.risk_trajectory(&record(70.0, RiskLevel::Low, 0), &[]);
        assert!(text.contains("Insufficient data"));
    }

    #[test]
    fn test_generate_produces_all_four_insights() {
        let engine = InsightsEngine::new(0.2);
        let history = vec![historical(75.0, RiskLevel::Low, 1)];
        let insights = engine.generate(&context(1), &record(72.0, RiskLevel::Low, 1), &history);

        assert_eq!(insights.len(), 4);
        assert!(insights.contains_key("consistency_analysis"));
        assert!(insights.contains_key("behavioral_evolution"));
        assert!(insights.contains_key("risk_trajectory"));
        assert!(insights.contains_key("conversation_dynamics"));
    }
}
