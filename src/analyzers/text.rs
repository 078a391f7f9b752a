//! The nine independent text analyzers.
//!
//! Each analyzer consumes the transcript (plus session context where useful)
//! and produces one strongly typed verdict. They are deliberately
//! self-contained lexicon/heuristic implementations: when a deployment wires
//! in a real inference backend it replaces the trait object, not this module's
//! callers. None of them raise on ordinary input; an analyzer that cannot
//! produce a meaningful result still returns its verdict with conservative
//! values, which is the degraded-output policy for unavailable backends.

use crate::analyzers::verdict::{
    AnalyzerVerdict, ConsistencyReport, CredibilityReport, DeceptionReport, LinguisticReport,
    ManipulationReport, ProfileReport, RiskLevel, RiskReport, SentimentReport, TopicReport,
};
use crate::analyzers::{AnalysisSubject, TextAnalyzer};
use crate::error::PipelineError;
use futures_util::future::BoxFuture;
use std::collections::HashMap;

const HESITATION_MARKERS: &[&str] = &[
    "um", "uh", "er", "ah", "hmm", "you know", "i mean", "sort of", "kind of", "well,",
];

const HEDGING_PHRASES: &[&str] = &[
    "honestly",
    "to be honest",
    "believe me",
    "i swear",
    "trust me",
    "frankly",
    "truthfully",
    "as far as i know",
];

const DISTANCING_PHRASES: &[&str] = &[
    "that person",
    "that woman",
    "that man",
    "someone told me",
    "they said",
    "people say",
];

const ABSOLUTE_PHRASES: &[&str] = &["never", "always", "absolutely", "definitely", "every time"];

const POSITIVE_WORDS: &[&str] = &[
    "good", "great", "happy", "love", "wonderful", "glad", "excellent", "fine", "thank",
];

const NEGATIVE_WORDS: &[&str] = &[
    "bad", "hate", "awful", "terrible", "angry", "wrong", "problem", "never", "worst", "afraid",
];

const FORMAL_WORDS: &[&str] = &[
    "therefore",
    "furthermore",
    "regarding",
    "accordingly",
    "nevertheless",
    "however",
    "consequently",
];

const INFORMAL_WORDS: &[&str] = &["gonna", "wanna", "gotta", "yeah", "dude", "stuff", "like,"];

/// Manipulation tactic label → indicative phrases.
const MANIPULATION_LEXICON: &[(&str, &[&str])] = &[
    (
        "guilt_tripping",
        &["after all i've done", "you owe me", "after everything"],
    ),
    (
        "urgency_pressure",
        &["right now", "before it's too late", "last chance", "act fast"],
    ),
    (
        "flattery",
        &["only you", "you're the best", "nobody else could", "you're so smart"],
    ),
    (
        "minimization",
        &["not a big deal", "you're overreacting", "it's nothing", "calm down"],
    ),
    (
        "fear_appeal",
        &["you'll regret", "or else", "bad things will happen", "you don't want to know"],
    ),
];

const STOPWORDS: &[&str] = &[
    "the", "a", "an", "and", "or", "but", "so", "of", "to", "in", "on", "at", "is", "was", "are",
    "were", "be", "been", "it", "that", "this", "i", "you", "he", "she", "we", "they", "my",
    "your", "me", "him", "her", "them", "for", "with", "not", "have", "has", "had", "do", "did",
    "what", "when", "then", "there", "just", "very",
];

fn words(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric() && c != '\'')
        .filter(|w| !w.is_empty())
        .map(|w| w.to_string())
        .collect()
}

/// Count phrase hits in the lowercased transcript, returning the total and
/// the distinct phrases that matched.
fn phrase_hits(lower: &str, phrases: &[&str]) -> (u32, Vec<String>) {
    let mut total = 0u32;
    let mut matched = Vec::new();
    for phrase in phrases {
        let count = lower.matches(phrase).count() as u32;
        if count > 0 {
            total += count;
            matched.push(phrase.to_string());
        }
    }
    (total, matched)
}

fn sentiment_counts(word_list: &[String]) -> (u32, u32) {
    let positive = word_list
        .iter()
        .filter(|w| POSITIVE_WORDS.contains(&w.as_str()))
        .count() as u32;
    let negative = word_list
        .iter()
        .filter(|w| NEGATIVE_WORDS.contains(&w.as_str()))
        .count() as u32;
    (positive, negative)
}

/// Flags hedging, distancing and overclaiming language.
pub struct DeceptionMarkerAnalyzer;

impl TextAnalyzer for DeceptionMarkerAnalyzer {
    fn name(&self) -> &'static str {
        "deception_markers"
    }

    fn analyze<'a>(
        &'a self,
        subject: &'a AnalysisSubject<'a>,
    ) -> BoxFuture<'a, Result<AnalyzerVerdict, PipelineError>> {
        Box::pin(async move {
            let lower = subject.transcript.to_lowercase();
            let (hedging_count, mut red_flags) = phrase_hits(&lower, HEDGING_PHRASES);
            let (distancing, distancing_flags) = phrase_hits(&lower, DISTANCING_PHRASES);
            let (absolutes, absolute_flags) = phrase_hits(&lower, ABSOLUTE_PHRASES);

            red_flags.extend(distancing_flags);
            red_flags.extend(absolute_flags);
            let red_flag_count = hedging_count + distancing + absolutes;

            let assessment = match red_flag_count {
                0 => "no deception markers detected".to_string(),
                1..=2 => "isolated deception markers".to_string(),
                3..=5 => "several deception markers present".to_string(),
                _ => "dense deception markers throughout".to_string(),
            };

            Ok(AnalyzerVerdict::DeceptionMarkers(DeceptionReport {
                red_flags,
                red_flag_count,
                hedging_count,
                assessment,
            }))
        })
    }
}

/// Scores statement credibility on a 0-100 scale.
pub struct CredibilityAnalyzer;

impl TextAnalyzer for CredibilityAnalyzer {
    fn name(&self) -> &'static str {
        "credibility"
    }

    fn analyze<'a>(
        &'a self,
        subject: &'a AnalysisSubject<'a>,
    ) -> BoxFuture<'a, Result<AnalyzerVerdict, PipelineError>> {
        Box::pin(async move {
            let lower = subject.transcript.to_lowercase();
            let word_list = words(subject.transcript);
            let word_count = word_list.len() as u32;

            let (hedging, _) = phrase_hits(&lower, HEDGING_PHRASES);
            let (absolutes, _) = phrase_hits(&lower, ABSOLUTE_PHRASES);
            let (hesitations, _) = phrase_hits(&lower, HESITATION_MARKERS);

            let mut score: f64 = 75.0;
            let mut factors = Vec::new();

            if hedging > 0 {
                score -= hedging as f64 * 5.0;
                factors.push(format!("{} hedging phrases", hedging));
            }
            if absolutes > 2 {
                score -= (absolutes - 2) as f64 * 3.0;
                factors.push(format!("{} absolute claims", absolutes));
            }
            if word_count > 0 && hesitations as f64 / word_count as f64 > 0.06 {
                score -= 10.0;
                factors.push("high hesitation density".to_string());
            }
            if word_count > 100 {
                score += 10.0;
                factors.push("detailed account".to_string());
            } else if word_count > 40 {
                score += 5.0;
            } else if word_count < 10 {
                score -= 5.0;
                factors.push("very short statement".to_string());
            }

            let confidence_level = if word_count < 20 {
                "low"
            } else if word_count < 100 {
                "moderate"
            } else {
                "high"
            };

            Ok(AnalyzerVerdict::Credibility(CredibilityReport {
                credibility_score: score.clamp(0.0, 100.0),
                confidence_level: confidence_level.to_string(),
                factors,
            }))
        })
    }
}

/// Surface metrics: hesitations, speech rate, formality register.
pub struct LinguisticMetricsAnalyzer;

impl TextAnalyzer for LinguisticMetricsAnalyzer {
    fn name(&self) -> &'static str {
        "linguistic_metrics"
    }

    fn analyze<'a>(
        &'a self,
        subject: &'a AnalysisSubject<'a>,
    ) -> BoxFuture<'a, Result<AnalyzerVerdict, PipelineError>> {
        Box::pin(async move {
            let lower = subject.transcript.to_lowercase();
            let word_list = words(subject.transcript);
            let word_count = word_list.len() as u32;

            let (hesitation_count, _) = phrase_hits(&lower, HESITATION_MARKERS);

            let speech_rate_wpm = if subject.audio_duration_seconds > 0.0 {
                word_count as f64 / (subject.audio_duration_seconds / 60.0)
            } else {
                0.0
            };

            let (formal, _) = phrase_hits(&lower, FORMAL_WORDS);
            let (informal, _) = phrase_hits(&lower, INFORMAL_WORDS);
            // Centered at 50, nudged per register marker
            let formality_score =
                (50.0 + formal as f64 * 8.0 - informal as f64 * 8.0).clamp(0.0, 100.0);

            Ok(AnalyzerVerdict::LinguisticMetrics(LinguisticReport {
                word_count,
                hesitation_count,
                speech_rate_wpm,
                formality_score,
            }))
        })
    }
}

/// Lexicon polarity in -1.0..=1.0.
pub struct SentimentAnalyzer;

impl TextAnalyzer for SentimentAnalyzer {
    fn name(&self) -> &'static str {
        "sentiment"
    }

    fn analyze<'a>(
        &'a self,
        subject: &'a AnalysisSubject<'a>,
    ) -> BoxFuture<'a, Result<AnalyzerVerdict, PipelineError>> {
        Box::pin(async move {
            let word_list = words(subject.transcript);
            let (positive_hits, negative_hits) = sentiment_counts(&word_list);

            let total = positive_hits + negative_hits;
            let polarity = if total == 0 {
                0.0
            } else {
                (positive_hits as f64 - negative_hits as f64) / total as f64
            };

            let label = if polarity > 0.25 {
                "positive"
            } else if polarity < -0.25 {
                "negative"
            } else {
                "neutral"
            };

            Ok(AnalyzerVerdict::Sentiment(SentimentReport {
                polarity,
                label: label.to_string(),
                positive_hits,
                negative_hits,
            }))
        })
    }
}

/// Detects persuasion tactics from a fixed tactic lexicon.
pub struct ManipulationTacticsAnalyzer;

impl TextAnalyzer for ManipulationTacticsAnalyzer {
    fn name(&self) -> &'static str {
        "manipulation_tactics"
    }

    fn analyze<'a>(
        &'a self,
        subject: &'a AnalysisSubject<'a>,
    ) -> BoxFuture<'a, Result<AnalyzerVerdict, PipelineError>> {
        Box::pin(async move {
            let lower = subject.transcript.to_lowercase();

            let mut tactics = Vec::new();
            let mut tactic_count = 0u32;
            for (tactic, phrases) in MANIPULATION_LEXICON {
                let (hits, _) = phrase_hits(&lower, phrases);
                if hits > 0 {
                    tactics.push(tactic.to_string());
                    tactic_count += hits;
                }
            }

            let severity = match tactic_count {
                0 => "none",
                1 => "mild",
                2..=3 => "moderate",
                _ => "severe",
            };

            Ok(AnalyzerVerdict::ManipulationTactics(ManipulationReport {
                tactics,
                tactic_count,
                severity: severity.to_string(),
            }))
        })
    }
}

/// Aggregates deception, manipulation and sentiment signals into one
/// categorical risk level.
pub struct RiskAssessmentAnalyzer;

impl TextAnalyzer for RiskAssessmentAnalyzer {
    fn name(&self) -> &'static str {
        "risk_assessment"
    }

    fn analyze<'a>(
        &'a self,
        subject: &'a AnalysisSubject<'a>,
    ) -> BoxFuture<'a, Result<AnalyzerVerdict, PipelineError>> {
        Box::pin(async move {
            let lower = subject.transcript.to_lowercase();
            let word_list = words(subject.transcript);

            let (hedging, _) = phrase_hits(&lower, HEDGING_PHRASES);
            let (distancing, _) = phrase_hits(&lower, DISTANCING_PHRASES);
            let mut tactic_hits = 0u32;
            for (_, phrases) in MANIPULATION_LEXICON {
                tactic_hits += phrase_hits(&lower, phrases).0;
            }
            let (positive, negative) = sentiment_counts(&word_list);

            let mut score = 0.0;
            let mut contributing_factors = Vec::new();

            let flag_count = hedging + distancing;
            if flag_count > 0 {
                score += flag_count as f64 * 1.5;
                contributing_factors.push(format!("{} deception markers", flag_count));
            }
            if tactic_hits > 0 {
                score += tactic_hits as f64 * 2.5;
                contributing_factors.push(format!("{} manipulation signals", tactic_hits));
            }
            if negative > positive + 2 {
                score += 2.0;
                contributing_factors.push("strongly negative tone".to_string());
            }

            let overall_risk = if score < 4.0 {
                RiskLevel::Low
            } else if score < 8.0 {
                RiskLevel::Medium
            } else {
                RiskLevel::High
            };

            Ok(AnalyzerVerdict::RiskAssessment(RiskReport {
                overall_risk,
                score,
                contributing_factors,
            }))
        })
    }
}

/// Behavioral snapshot: dominant traits and stress indicators.
pub struct PsychologicalProfileAnalyzer;

impl TextAnalyzer for PsychologicalProfileAnalyzer {
    fn name(&self) -> &'static str {
        "psychological_profile"
    }

    fn analyze<'a>(
        &'a self,
        subject: &'a AnalysisSubject<'a>,
    ) -> BoxFuture<'a, Result<AnalyzerVerdict, PipelineError>> {
        Box::pin(async move {
            let lower = subject.transcript.to_lowercase();
            let word_list = words(subject.transcript);
            let word_count = word_list.len().max(1);

            let (hesitations, _) = phrase_hits(&lower, HESITATION_MARKERS);
            let (_, negative) = sentiment_counts(&word_list);
            let stress_indicators = hesitations + negative;

            let first_person = word_list
                .iter()
                .filter(|w| matches!(w.as_str(), "i" | "me" | "my" | "myself"))
                .count();
            let exclamations = subject.transcript.matches('!').count();
            let (formal, _) = phrase_hits(&lower, FORMAL_WORDS);

            let mut dominant_traits = Vec::new();
            if first_person as f64 / word_count as f64 > 0.08 {
                dominant_traits.push("self-focused".to_string());
            }
            if exclamations >= 2 {
                dominant_traits.push("expressive".to_string());
            }
            if formal >= 2 {
                dominant_traits.push("measured".to_string());
            }
            if hesitations as f64 / word_count as f64 > 0.05 {
                dominant_traits.push("uncertain".to_string());
            }
            if dominant_traits.is_empty() {
                dominant_traits.push("composed".to_string());
            }

            let summary = format!(
                "Speaker presents as {} with {} stress indicators",
                dominant_traits.join(", "),
                stress_indicators
            );

            Ok(AnalyzerVerdict::PsychologicalProfile(ProfileReport {
                dominant_traits,
                stress_indicators,
                summary,
            }))
        })
    }
}

/// Frequency-based keyword extraction with a one-line summary.
pub struct TopicSummaryAnalyzer;

impl TextAnalyzer for TopicSummaryAnalyzer {
    fn name(&self) -> &'static str {
        "topic_summary"
    }

    fn analyze<'a>(
        &'a self,
        subject: &'a AnalysisSubject<'a>,
    ) -> BoxFuture<'a, Result<AnalyzerVerdict, PipelineError>> {
        Box::pin(async move {
            let word_list = words(subject.transcript);

            let mut frequencies: HashMap<&str, u32> = HashMap::new();
            for word in &word_list {
                if word.len() > 2 && !STOPWORDS.contains(&word.as_str()) {
                    *frequencies.entry(word.as_str()).or_insert(0) += 1;
                }
            }

            let mut ranked: Vec<(&str, u32)> = frequencies.into_iter().collect();
            ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));
            let keywords: Vec<String> = ranked
                .into_iter()
                .take(5)
                .map(|(word, _)| word.to_string())
                .collect();

            let first_sentence = subject
                .transcript
                .split(['.', '!', '?'])
                .next()
                .unwrap_or("")
                .trim();
            // Truncate on char boundaries so multibyte transcripts cannot
            // split a codepoint.
            let summary = match first_sentence.char_indices().nth(120) {
                Some((cut, _)) => format!("{}...", &first_sentence[..cut]),
                None => first_sentence.to_string(),
            };

            Ok(AnalyzerVerdict::TopicSummary(TopicReport {
                keywords,
                summary,
            }))
        })
    }
}

/// Compares the current statement against recent transcripts in the session.
pub struct ConsistencyCheckAnalyzer;

impl TextAnalyzer for ConsistencyCheckAnalyzer {
    fn name(&self) -> &'static str {
        "consistency_check"
    }

    fn analyze<'a>(
        &'a self,
        subject: &'a AnalysisSubject<'a>,
    ) -> BoxFuture<'a, Result<AnalyzerVerdict, PipelineError>> {
        Box::pin(async move {
            let recent: Vec<&String> = subject
                .context
                .map(|ctx| ctx.recent_transcripts.iter().collect())
                .unwrap_or_default();

            if recent.is_empty() {
                return Ok(AnalyzerVerdict::ConsistencyCheck(ConsistencyReport {
                    contradiction_count: 0,
                    overlap_ratio: 0.0,
                    assessment: "first statement in session, nothing to compare".to_string(),
                }));
            }

            let current: std::collections::HashSet<String> = words(subject.transcript)
                .into_iter()
                .filter(|w| w.len() > 2 && !STOPWORDS.contains(&w.as_str()))
                .collect();

            let mut overlap_sum = 0.0;
            let mut contradiction_count = 0u32;
            for previous in &recent {
                let prior: std::collections::HashSet<String> = words(previous)
                    .into_iter()
                    .filter(|w| w.len() > 2 && !STOPWORDS.contains(&w.as_str()))
                    .collect();

                let union = current.union(&prior).count();
                if union > 0 {
                    overlap_sum += current.intersection(&prior).count() as f64 / union as f64;
                }

                // A shared subject with flipped negation reads as a contradiction
                let shares_subject = current.intersection(&prior).count() >= 3;
                let negated_now = subject.transcript.to_lowercase().contains("never")
                    || subject.transcript.to_lowercase().contains("didn't");
                let negated_before =
                    previous.to_lowercase().contains("never") || previous.to_lowercase().contains("didn't");
                if shares_subject && negated_now != negated_before {
                    contradiction_count += 1;
                }
            }

            let overlap_ratio = overlap_sum / recent.len() as f64;
            let assessment = if contradiction_count > 0 {
                format!(
                    "{} possible contradictions with earlier statements",
                    contradiction_count
                )
            } else if overlap_ratio > 0.3 {
                "consistent with earlier statements".to_string()
            } else {
                "little topical overlap with earlier statements".to_string()
            };

            Ok(AnalyzerVerdict::ConsistencyCheck(ConsistencyReport {
                contradiction_count,
                overlap_ratio,
                assessment,
            }))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn subject(transcript: &str) -> AnalysisSubject<'_> {
        AnalysisSubject {
            transcript,
            audio_duration_seconds: 60.0,
            context: None,
        }
    }

    #[tokio::test]
    async fn test_deception_markers_counts_hedging() {
        let input = subject("Honestly, trust me, I swear I was never there. That person lied.");
        let verdict = DeceptionMarkerAnalyzer.analyze(&input).await.unwrap();

        match verdict {
            AnalyzerVerdict::DeceptionMarkers(report) => {
                assert!(report.hedging_count >= 3);
                assert!(report.red_flag_count > report.hedging_count);
                assert!(!report.red_flags.is_empty());
            }
            _ => panic!("wrong verdict"),
        }
    }

    #[tokio::test]
    async fn test_credibility_penalizes_hedging() {
        let plain = subject(
            "I left the office at six and drove straight home. My neighbor saw me \
             arrive and we spoke for a few minutes about the fence repair.",
        );
        let hedged = subject("Honestly, believe me, trust me, I swear it happened.");

        let plain_score = match CredibilityAnalyzer.analyze(&plain).await.unwrap() {
            AnalyzerVerdict::Credibility(report) => report.credibility_score,
            _ => panic!("wrong verdict"),
        };
        let hedged_score = match CredibilityAnalyzer.analyze(&hedged).await.unwrap() {
            AnalyzerVerdict::Credibility(report) => report.credibility_score,
            _ => panic!("wrong verdict"),
        };

        assert!(plain_score > hedged_score);
    }

    #[tokio::test]
    async fn test_linguistic_speech_rate() {
        // 30 words over 60 seconds = 30 wpm
        let text = "word ".repeat(30);
        let input = subject(&text);
        match LinguisticMetricsAnalyzer.analyze(&input).await.unwrap() {
            AnalyzerVerdict::LinguisticMetrics(report) => {
                assert_eq!(report.word_count, 30);
                assert!((report.speech_rate_wpm - 30.0).abs() < 1e-9);
            }
            _ => panic!("wrong verdict"),
        }
    }

    #[tokio::test]
    async fn test_linguistic_zero_duration_guard() {
        let input = AnalysisSubject {
            transcript: "some words here",
            audio_duration_seconds: 0.0,
            context: None,
        };
        match LinguisticMetricsAnalyzer.analyze(&input).await.unwrap() {
            AnalyzerVerdict::LinguisticMetrics(report) => {
                assert_eq!(report.speech_rate_wpm, 0.0);
            }
            _ => panic!("wrong verdict"),
        }
    }

    #[tokio::test]
    async fn test_sentiment_labels() {
        let input = subject("This is wonderful, I am so happy and glad");
        match SentimentAnalyzer.analyze(&input).await.unwrap() {
            AnalyzerVerdict::Sentiment(report) => {
                assert_eq!(report.label, "positive");
                assert!(report.polarity > 0.25);
            }
            _ => panic!("wrong verdict"),
        }
    }

    #[tokio::test]
    async fn test_risk_assessment_escalates_with_signals() {
        let calm = subject("We met for coffee and talked about the weekend plans.");
        let loaded = subject(
            "Trust me, you owe me this. Do it right now, before it's too late, \
             or else you'll regret it. Believe me, that person always lies.",
        );

        let calm_risk = match RiskAssessmentAnalyzer.analyze(&calm).await.unwrap() {
            AnalyzerVerdict::RiskAssessment(report) => report.overall_risk,
            _ => panic!("wrong verdict"),
        };
        let loaded_risk = match RiskAssessmentAnalyzer.analyze(&loaded).await.unwrap() {
            AnalyzerVerdict::RiskAssessment(report) => report.overall_risk,
            _ => panic!("wrong verdict"),
        };

        assert_eq!(calm_risk, RiskLevel::Low);
        assert!(loaded_risk.ordinal() > calm_risk.ordinal());
    }

    #[tokio::test]
    async fn test_topic_keywords_exclude_stopwords() {
        let input = subject("The warehouse inventory was moved to the second warehouse on Friday");
        match TopicSummaryAnalyzer.analyze(&input).await.unwrap() {
            AnalyzerVerdict::TopicSummary(report) => {
                assert!(report.keywords.contains(&"warehouse".to_string()));
                assert!(!report.keywords.contains(&"the".to_string()));
            }
            _ => panic!("wrong verdict"),
        }
    }

    #[tokio::test]
    async fn test_topic_summary_truncates_multibyte_transcript() {
        // A first sentence whose 120-char cut lands mid-text, with multibyte
        // characters throughout.
        let text = format!("{}é and the conversation kept going", "a".repeat(119));
        let input = subject(&text);
        match TopicSummaryAnalyzer.analyze(&input).await.unwrap() {
            AnalyzerVerdict::TopicSummary(report) => {
                assert!(report.summary.ends_with("..."));
                assert_eq!(report.summary.chars().count(), 123);
                assert!(report.summary.contains('é'));
            }
            _ => panic!("wrong verdict"),
        }
    }

    #[tokio::test]
    async fn test_consistency_without_context() {
        let input = subject("I was at home");
        match ConsistencyCheckAnalyzer.analyze(&input).await.unwrap() {
            AnalyzerVerdict::ConsistencyCheck(report) => {
                assert_eq!(report.contradiction_count, 0);
                assert!(report.assessment.contains("first statement"));
            }
            _ => panic!("wrong verdict"),
        }
    }
}
