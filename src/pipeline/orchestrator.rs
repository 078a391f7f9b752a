//! # Pipeline Orchestrator
//!
//! Runs the multi-stage analysis pipeline for one audio upload and streams
//! incremental results to the session's push channel while later steps are
//! still executing.
//!
//! ## State machine:
//! `INIT → AUDIO_QUALITY → TRANSCRIBE → EMOTION → TEXT_ANALYSIS_LOOP → COMPLETE | FAILED`
//!
//! ## Failure policy (asymmetric, by design):
//! The first three steps are foundational: audio quality, transcription and
//! emotion inference feed everything after them, so a failure there aborts
//! the run with a single terminal `error` event. The nine text analyzers are
//! independent and advisory: each failure is caught, logged and demoted to a
//! degraded verdict without touching its siblings.
//!
//! ## Ordering:
//! Steps execute sequentially within a run and events are emitted in exact
//! step order. Separate sessions run as independent tokio tasks with no
//! ordering relationship.

use crate::analyzers::verdict::AnalyzerVerdict;
use crate::analyzers::{AnalysisSubject, CollaboratorSet};
use crate::error::PipelineError;
use crate::hub::ConnectionHub;
use crate::insights::InsightsEngine;
use crate::pipeline::events::PipelineEvent;
use crate::pipeline::report::AnalysisReport;
use crate::session::SessionStore;
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Drives one analysis pipeline per uploaded audio artifact.
///
/// Holds handles to the hub, store and collaborator set; one instance is
/// shared by all runs. Each run is a single async task whose only suspension
/// points are the collaborator calls.
pub struct PipelineOrchestrator {
    hub: Arc<ConnectionHub>,
    store: Arc<SessionStore>,
    collaborators: Arc<CollaboratorSet>,
    insights: InsightsEngine,
    /// Deadline for one collaborator call; a hung external backend fails its
    /// step instead of stalling the session forever
    collaborator_timeout: Duration,
}

impl PipelineOrchestrator {
    pub fn new(
        hub: Arc<ConnectionHub>,
        store: Arc<SessionStore>,
        collaborators: Arc<CollaboratorSet>,
        trend_epsilon: f64,
        collaborator_timeout: Duration,
    ) -> Self {
        Self {
            hub,
            store,
            collaborators,
            insights: InsightsEngine::new(trend_epsilon),
            collaborator_timeout,
        }
    }

    /// Execute one full run for an uploaded artifact.
    ///
    /// The temporary artifact is deleted exactly once, on both the COMPLETE
    /// and FAILED exit paths, before the terminal event is pushed. Channel
    /// delivery failures never abort the run: history stays queryable even if
    /// no client was listening.
    pub async fn run(&self, session_id: &str, audio_path: &Path) {
        info!("Starting pipeline run for session {}", session_id);
        let outcome = self.execute(session_id, audio_path).await;

        // Exactly one artifact deletion per run, regardless of which step failed
        if let Err(err) = tokio::fs::remove_file(audio_path).await {
            warn!(
                "Failed to remove upload artifact {}: {}",
                audio_path.display(),
                err
            );
        }

        match outcome {
            Ok(()) => {
                info!("Pipeline run complete for session {}", session_id);
                self.hub.push(session_id, &PipelineEvent::Complete {});
            }
            Err(err) => {
                error!("Pipeline run failed for session {}: {}", session_id, err);
                self.hub
                    .push(session_id, &PipelineEvent::error(err.to_string()));
            }
        }
    }

    async fn execute(&self, session_id: &str, audio_path: &Path) -> Result<(), PipelineError> {
        // Sessions are created lazily on first reference
        self.store.get_or_create(Some(session_id));

        let total_steps = 3 + self.collaborators.text_analyzers.len() as u32;
        let mut progress = 0u32;

        // --- Foundational step 1: audio quality -------------------------------
        progress += 1;
        self.push_progress(session_id, "audio_quality", progress, total_steps);
        let quality = self
            .call("audio_quality", self.collaborators.prober.probe(audio_path))
            .await?;
        self.push_analysis(session_id, "audio_quality", &quality);

        // --- Foundational step 2: transcription -------------------------------
        progress += 1;
        self.push_progress(session_id, "transcription", progress, total_steps);
        let transcript = self
            .call(
                "transcription",
                self.collaborators.transcriber.transcribe(audio_path),
            )
            .await?;
        self.push_analysis(
            session_id,
            "transcription",
            &serde_json::json!({ "transcript": transcript }),
        );

        // --- Foundational step 3: emotion -------------------------------------
        progress += 1;
        self.push_progress(session_id, "emotion", progress, total_steps);
        let emotions = self
            .call(
                "emotion",
                self.collaborators.emotion.classify(audio_path, &transcript),
            )
            .await?;
        self.push_analysis(session_id, "emotion", &emotions);

        // Context snapshot before the current analysis is committed: the
        // analyzers and the insights engine compare against prior state only
        let context = self.store.get_context(session_id);

        // --- Independent text analyzers ---------------------------------------
        let subject = AnalysisSubject {
            transcript: &transcript,
            audio_duration_seconds: quality.duration_seconds,
            context: context.as_ref(),
        };

        let mut verdicts = Vec::with_capacity(self.collaborators.text_analyzers.len());
        for analyzer in &self.collaborators.text_analyzers {
            progress += 1;
            self.push_progress(session_id, analyzer.name(), progress, total_steps);

            let verdict = match self.call(analyzer.name(), analyzer.analyze(&subject)).await {
                Ok(verdict) => verdict,
                Err(err) => {
                    // Isolated failure: this analyzer degrades, siblings run on
                    warn!(
                        "Analyzer {} failed for session {}: {}",
                        analyzer.name(),
                        session_id,
                        err
                    );
                    AnalyzerVerdict::Degraded {
                        name: analyzer.name().to_string(),
                        reason: err.to_string(),
                    }
                }
            };

            self.push_analysis(session_id, analyzer.name(), &verdict);
            verdicts.push(verdict);
        }

        let mut report = AnalysisReport {
            audio_quality: quality,
            transcript: transcript.clone(),
            emotions,
            verdicts,
            session_insights: Default::default(),
        };
        if report.degraded_count() > 0 {
            debug!(
                "Session {} run finished with {} degraded analyzers",
                session_id,
                report.degraded_count()
            );
        }

        // --- Commit and derive insights ---------------------------------------
        // History is captured before the commit so the insights engine sees
        // prior records plus the current one explicitly
        let history = self.store.get_history(session_id);
        let record = self
            .store
            .add_analysis(session_id, &transcript, &report)
            .map_err(|err| PipelineError::collaborator("session_store", err.to_string()))?;

        if let Some(context) = &context {
            report.session_insights = self.insights.generate(context, &record, &history);
        }

        if !report.session_insights.is_empty() {
            self.push_analysis(session_id, "session_insights", &report.session_insights);
        }

        Ok(())
    }

    /// Wrap one collaborator call in the configured deadline.
    async fn call<T>(
        &self,
        step: &str,
        fut: impl Future<Output = Result<T, PipelineError>>,
    ) -> Result<T, PipelineError> {
        match tokio::time::timeout(self.collaborator_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(PipelineError::Timeout {
                step: step.to_string(),
                deadline_secs: self.collaborator_timeout.as_secs(),
            }),
        }
    }

    fn push_progress(&self, session_id: &str, step: &str, progress: u32, total_steps: u32) {
        self.hub.push(
            session_id,
            &PipelineEvent::progress(step, progress, total_steps),
        );
    }

    fn push_analysis<T: serde::Serialize>(&self, session_id: &str, analysis_type: &str, data: &T) {
        let data = serde_json::to_value(data).unwrap_or(serde_json::Value::Null);
        self.hub
            .push(session_id, &PipelineEvent::analysis(analysis_type, data));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzers::verdict::{
        AudioQualityReport, EmotionScore, SentimentReport, TopicReport,
    };
    use crate::analyzers::{
        AudioQualityProber, EmotionClassifier, TextAnalyzer, Transcriber,
    };
    use futures_util::future::BoxFuture;
    use tokio::sync::mpsc;

    struct CannedProber;

    impl AudioQualityProber for CannedProber {
        fn probe<'a>(
            &'a self,
            _path: &'a Path,
        ) -> BoxFuture<'a, Result<AudioQualityReport, PipelineError>> {
            Box::pin(async {
                Ok(AudioQualityReport {
                    duration_seconds: 30.0,
                    sample_rate: 16000,
                    channels: 1,
                    loudness_db: -18.0,
                    quality_score: 82.0,
                })
            })
        }
    }

    struct CannedTranscriber;

    impl Transcriber for CannedTranscriber {
        fn transcribe<'a>(
            &'a self,
            _path: &'a Path,
        ) -> BoxFuture<'a, Result<String, PipelineError>> {
            Box::pin(async { Ok("I was home the whole evening.".to_string()) })
        }
    }

    struct FailingTranscriber;

    impl Transcriber for FailingTranscriber {
        fn transcribe<'a>(
            &'a self,
            _path: &'a Path,
        ) -> BoxFuture<'a, Result<String, PipelineError>> {
            Box::pin(async {
                Err(PipelineError::collaborator(
                    "transcription",
                    "decoder crashed",
                ))
            })
        }
    }

    struct CannedEmotion;

    impl EmotionClassifier for CannedEmotion {
        fn classify<'a>(
            &'a self,
            _path: &'a Path,
            _transcript: &'a str,
        ) -> BoxFuture<'a, Result<Vec<EmotionScore>, PipelineError>> {
            Box::pin(async {
                Ok(vec![EmotionScore {
                    emotion: "calm".to_string(),
                    score: 0.8,
                }])
            })
        }
    }

    struct CannedAnalyzer {
        name: &'static str,
        fail: bool,
    }

    impl TextAnalyzer for CannedAnalyzer {
        fn name(&self) -> &'static str {
            self.name
        }

        fn analyze<'a>(
            &'a self,
            _subject: &'a AnalysisSubject<'a>,
        ) -> BoxFuture<'a, Result<AnalyzerVerdict, PipelineError>> {
            Box::pin(async move {
                if self.fail {
                    Err(PipelineError::collaborator(self.name, "backend unavailable"))
                } else {
                    Ok(AnalyzerVerdict::TopicSummary(TopicReport {
                        keywords: vec!["home".to_string()],
                        summary: "canned".to_string(),
                    }))
                }
            })
        }
    }

    struct SlowAnalyzer;

    impl TextAnalyzer for SlowAnalyzer {
        fn name(&self) -> &'static str {
            "slow_analyzer"
        }

        fn analyze<'a>(
            &'a self,
            _subject: &'a AnalysisSubject<'a>,
        ) -> BoxFuture<'a, Result<AnalyzerVerdict, PipelineError>> {
            Box::pin(async {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(AnalyzerVerdict::Sentiment(SentimentReport {
                    polarity: 0.0,
                    label: "neutral".to_string(),
                    positive_hits: 0,
                    negative_hits: 0,
                }))
            })
        }
    }

    const ANALYZER_NAMES: [&str; 9] = [
        "deception_markers",
        "credibility",
        "linguistic_metrics",
        "sentiment",
        "manipulation_tactics",
        "risk_assessment",
        "psychological_profile",
        "topic_summary",
        "consistency_check",
    ];

    fn collaborators(failing_analyzer: Option<&'static str>) -> Arc<CollaboratorSet> {
        let text_analyzers: Vec<Arc<dyn TextAnalyzer>> = ANALYZER_NAMES
            .iter()
            .map(|name| {
                Arc::new(CannedAnalyzer {
                    name,
                    fail: failing_analyzer == Some(name),
                }) as Arc<dyn TextAnalyzer>
            })
            .collect();

        Arc::new(CollaboratorSet {
            prober: Arc::new(CannedProber),
            transcriber: Arc::new(CannedTranscriber),
            emotion: Arc::new(CannedEmotion),
            text_analyzers,
        })
    }

    struct Harness {
        orchestrator: PipelineOrchestrator,
        store: Arc<SessionStore>,
        hub: Arc<ConnectionHub>,
    }

    fn harness(set: Arc<CollaboratorSet>) -> Harness {
        let hub = Arc::new(ConnectionHub::new());
        let store = Arc::new(SessionStore::new());
        let orchestrator = PipelineOrchestrator::new(
            hub.clone(),
            store.clone(),
            set,
            0.2,
            Duration::from_millis(200),
        );
        Harness {
            orchestrator,
            store,
            hub,
        }
    }

    fn artifact() -> (tempfile::TempDir, std::path::PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("upload.wav");
        std::fs::write(&path, b"fake audio").unwrap();
        (dir, path)
    }

    async fn run_collecting(
        harness: &Harness,
        session_id: &str,
        path: &Path,
    ) -> Vec<serde_json::Value> {
        let (tx, mut rx) = mpsc::unbounded_channel();
        harness.hub.connect(session_id, tx);
        harness.orchestrator.run(session_id, path).await;

        let mut frames = Vec::new();
        while let Ok(frame) = rx.try_recv() {
            frames.push(serde_json::from_str(&frame).unwrap());
        }
        frames
    }

    #[tokio::test]
    async fn test_successful_run_event_sequence() {
        let harness = harness(collaborators(None));
        let session_id = harness.store.get_or_create(None);
        let (_dir, path) = artifact();

        let frames = run_collecting(&harness, &session_id, &path).await;

        // 12 progress + 12 analysis + session insights are absent on the first
        // analysis + complete
        assert_eq!(frames.last().unwrap()["type"], "complete");
        assert!(!frames.iter().any(|f| f["type"] == "error"));

        let progress: Vec<&serde_json::Value> = frames
            .iter()
            .filter(|f| f["type"] == "progress_update")
            .collect();
        assert_eq!(progress.len(), 12);
        assert_eq!(progress[0]["step"], "audio_quality");
        assert_eq!(progress[0]["total_steps"], 12);

        // Percentages are monotonically non-decreasing and end at 100
        let percentages: Vec<u64> = progress
            .iter()
            .map(|f| f["percentage"].as_u64().unwrap())
            .collect();
        assert!(percentages.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(*percentages.last().unwrap(), 100);

        // Artifact removed on the success path
        assert!(!path.exists());

        // History committed
        assert_eq!(harness.store.get_history(&session_id).len(), 1);
    }

    #[tokio::test]
    async fn test_foundational_failure_aborts_run() {
        let set = Arc::new(CollaboratorSet {
            prober: Arc::new(CannedProber),
            transcriber: Arc::new(FailingTranscriber),
            emotion: Arc::new(CannedEmotion),
            text_analyzers: collaborators(None).text_analyzers.clone(),
        });
        let harness = harness(set);
        let session_id = harness.store.get_or_create(None);
        let (_dir, path) = artifact();

        let frames = run_collecting(&harness, &session_id, &path).await;

        // Exactly one terminal error, as the last frame
        let errors: Vec<&serde_json::Value> =
            frames.iter().filter(|f| f["type"] == "error").collect();
        assert_eq!(errors.len(), 1);
        assert_eq!(frames.last().unwrap()["type"], "error");
        assert!(errors[0]["message"]
            .as_str()
            .unwrap()
            .contains("transcription"));

        // No analysis_update for any step after transcription
        let updates: Vec<&str> = frames
            .iter()
            .filter(|f| f["type"] == "analysis_update")
            .map(|f| f["analysis_type"].as_str().unwrap())
            .collect();
        assert_eq!(updates, vec!["audio_quality"]);
        assert!(!frames.iter().any(|f| f["type"] == "complete"));

        // Artifact removed on the failure path too
        assert!(!path.exists());

        // Nothing committed to history
        assert!(harness.store.get_history(&session_id).is_empty());
    }

    #[tokio::test]
    async fn test_single_analyzer_failure_is_isolated() {
        let harness = harness(collaborators(Some("sentiment")));
        let session_id = harness.store.get_or_create(None);
        let (_dir, path) = artifact();

        let frames = run_collecting(&harness, &session_id, &path).await;

        assert_eq!(frames.last().unwrap()["type"], "complete");
        assert!(!frames.iter().any(|f| f["type"] == "error"));

        // Eight healthy verdicts, one degraded, in declared order
        let analyzer_frames: Vec<&serde_json::Value> = frames
            .iter()
            .filter(|f| {
                f["type"] == "analysis_update"
                    && ANALYZER_NAMES.contains(&f["analysis_type"].as_str().unwrap_or(""))
            })
            .collect();
        assert_eq!(analyzer_frames.len(), 9);

        let degraded: Vec<&&serde_json::Value> = analyzer_frames
            .iter()
            .filter(|f| f["data"]["analyzer"] == "degraded")
            .collect();
        assert_eq!(degraded.len(), 1);
        assert_eq!(degraded[0]["analysis_type"], "sentiment");
        assert_eq!(degraded[0]["data"]["name"], "sentiment");

        // The run still committed a record
        assert_eq!(harness.store.get_history(&session_id).len(), 1);
    }

    #[tokio::test]
    async fn test_hung_analyzer_times_out_and_degrades() {
        let mut text_analyzers = collaborators(None).text_analyzers.clone();
        text_analyzers[3] = Arc::new(SlowAnalyzer);
        let set = Arc::new(CollaboratorSet {
            prober: Arc::new(CannedProber),
            transcriber: Arc::new(CannedTranscriber),
            emotion: Arc::new(CannedEmotion),
            text_analyzers,
        });
        let harness = harness(set);
        let session_id = harness.store.get_or_create(None);
        let (_dir, path) = artifact();

        let frames = run_collecting(&harness, &session_id, &path).await;

        assert_eq!(frames.last().unwrap()["type"], "complete");
        let degraded: Vec<&serde_json::Value> = frames
            .iter()
            .filter(|f| f["data"]["analyzer"] == "degraded")
            .collect();
        assert_eq!(degraded.len(), 1);
        assert!(degraded[0]["data"]["reason"]
            .as_str()
            .unwrap()
            .contains("timed out"));
    }

    #[tokio::test]
    async fn test_second_run_emits_session_insights() {
        let harness = harness(collaborators(None));
        let session_id = harness.store.get_or_create(None);

        let (_dir1, path1) = artifact();
        harness.orchestrator.run(&session_id, &path1).await;

        let (_dir2, path2) = artifact();
        let frames = run_collecting(&harness, &session_id, &path2).await;

        let insights: Vec<&serde_json::Value> = frames
            .iter()
            .filter(|f| f["analysis_type"] == "session_insights")
            .collect();
        assert_eq!(insights.len(), 1);
        assert!(insights[0]["data"]["risk_trajectory"].is_string());
        assert_eq!(frames.last().unwrap()["type"], "complete");

        assert_eq!(harness.store.get_history(&session_id).len(), 2);
    }

    #[tokio::test]
    async fn test_run_without_channel_still_commits() {
        let harness = harness(collaborators(None));
        let session_id = harness.store.get_or_create(None);
        let (_dir, path) = artifact();

        // No channel registered at all: delivery is best-effort
        harness.orchestrator.run(&session_id, &path).await;

        assert!(!path.exists());
        assert_eq!(harness.store.get_history(&session_id).len(), 1);
    }
}
