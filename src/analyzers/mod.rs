//! # Analysis Collaborators
//!
//! Boundary contracts for the external analysis collaborators the pipeline
//! orchestrates, plus the built-in default implementations.
//!
//! Module structure:
//! - verdict.rs: strongly typed collaborator outputs (tagged analyzer union)
//! - audio.rs: audio-facing collaborators (WAV prober, transcriber boundary,
//!   emotion classifier)
//! - text.rs: the nine independent text analyzers
//!
//! ## Seam design:
//! Each collaborator is a trait returning a `BoxFuture`, so the orchestrator
//! can hold them as `Arc<dyn ..>` trait objects and tests can inject failing
//! or canned collaborators. Every call into one of these traits is an
//! I/O-bound suspension point for the pipeline.

pub mod audio;
pub mod text;
pub mod verdict;

pub use verdict::{
    AnalyzerVerdict, AudioQualityReport, ConsistencyReport, CredibilityReport, DeceptionReport,
    EmotionScore, LinguisticReport, ManipulationReport, ProfileReport, RiskLevel, RiskReport,
    SentimentReport, TopicReport,
};

use crate::error::PipelineError;
use crate::session::SessionContext;
use futures_util::future::BoxFuture;
use std::path::Path;
use std::sync::Arc;

/// Everything a text analyzer gets to look at for one statement.
///
/// The transcript is the primary input; the audio duration rides along so the
/// linguistic analyzer can derive speech rate, and the session context (when
/// the session has prior analyses) lets analyzers compare against recent
/// statements.
pub struct AnalysisSubject<'a> {
    pub transcript: &'a str,
    pub audio_duration_seconds: f64,
    pub context: Option<&'a SessionContext>,
}

/// Probes the uploaded audio for format and quality characteristics.
pub trait AudioQualityProber: Send + Sync {
    fn probe<'a>(&'a self, path: &'a Path)
        -> BoxFuture<'a, Result<AudioQualityReport, PipelineError>>;
}

/// Turns the uploaded audio into text. Foundational: everything downstream
/// depends on the transcript.
pub trait Transcriber: Send + Sync {
    fn transcribe<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, Result<String, PipelineError>>;
}

/// Scores emotion labels for the statement from audio and transcript.
pub trait EmotionClassifier: Send + Sync {
    fn classify<'a>(
        &'a self,
        path: &'a Path,
        transcript: &'a str,
    ) -> BoxFuture<'a, Result<Vec<EmotionScore>, PipelineError>>;
}

/// One of the nine independent text analyzers. A failure here is isolated to
/// this analyzer; the orchestrator demotes it to a degraded verdict.
pub trait TextAnalyzer: Send + Sync {
    /// Stable analyzer name, used as the `analysis_type` on the wire.
    fn name(&self) -> &'static str;

    fn analyze<'a>(
        &'a self,
        subject: &'a AnalysisSubject<'a>,
    ) -> BoxFuture<'a, Result<AnalyzerVerdict, PipelineError>>;
}

/// The full set of collaborators one orchestrator drives.
///
/// Constructed once in `main` and shared by handle; tests swap individual
/// members for mocks.
pub struct CollaboratorSet {
    pub prober: Arc<dyn AudioQualityProber>,
    pub transcriber: Arc<dyn Transcriber>,
    pub emotion: Arc<dyn EmotionClassifier>,
    /// Invocation order of the independent analyzers is their declaration
    /// order here; events are emitted in exactly this order.
    pub text_analyzers: Vec<Arc<dyn TextAnalyzer>>,
}

impl CollaboratorSet {
    /// The standard collaborator stack: WAV probing, sidecar transcription
    /// boundary, lexicon emotion classification, and the nine built-in text
    /// analyzers in their declared order.
    pub fn standard() -> Self {
        Self {
            prober: Arc::new(audio::WavProber),
            transcriber: Arc::new(audio::SidecarTranscriber),
            emotion: Arc::new(audio::LexiconEmotionClassifier),
            text_analyzers: vec![
                Arc::new(text::DeceptionMarkerAnalyzer),
                Arc::new(text::CredibilityAnalyzer),
                Arc::new(text::LinguisticMetricsAnalyzer),
                Arc::new(text::SentimentAnalyzer),
                Arc::new(text::ManipulationTacticsAnalyzer),
                Arc::new(text::RiskAssessmentAnalyzer),
                Arc::new(text::PsychologicalProfileAnalyzer),
                Arc::new(text::TopicSummaryAnalyzer),
                Arc::new(text::ConsistencyCheckAnalyzer),
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_set_has_nine_text_analyzers() {
        let set = CollaboratorSet::standard();
        assert_eq!(set.text_analyzers.len(), 9);

        let names: Vec<&str> = set.text_analyzers.iter().map(|a| a.name()).collect();
        assert_eq!(names[0], "deception_markers");
        assert_eq!(names[8], "consistency_check");

        // Names must be unique: they key the wire payloads
        let mut deduped = names.clone();
        deduped.sort();
        deduped.dedup();
        assert_eq!(deduped.len(), names.len());
    }
}
