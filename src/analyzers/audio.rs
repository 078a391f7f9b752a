//! Audio-facing collaborators: format/quality probing, the transcription
//! boundary, and emotion classification.

use crate::analyzers::verdict::{AudioQualityReport, EmotionScore};
use crate::analyzers::{AudioQualityProber, EmotionClassifier, Transcriber};
use crate::error::PipelineError;
use byteorder::{LittleEndian, ReadBytesExt};
use futures_util::future::BoxFuture;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::debug;

/// Assumed format when an upload is not a RIFF/WAVE file and has to be
/// treated as raw PCM: 16-bit little-endian, mono, 16kHz.
const RAW_PCM_SAMPLE_RATE: u32 = 16000;

/// Probes uploaded audio by decoding it as WAV, with a raw-PCM fallback.
///
/// The probe computes duration, RMS loudness and a 0-100 usability score.
/// Decoding happens on the blocking thread pool; uploads are capped well
/// below anything that would matter there.
pub struct WavProber;

impl AudioQualityProber for WavProber {
    fn probe<'a>(
        &'a self,
        path: &'a Path,
    ) -> BoxFuture<'a, Result<AudioQualityReport, PipelineError>> {
        Box::pin(async move {
            let path = path.to_path_buf();
            tokio::task::spawn_blocking(move || probe_file(&path))
                .await
                .map_err(|err| {
                    PipelineError::collaborator("audio_quality", err.to_string())
                })?
        })
    }
}

fn probe_file(path: &Path) -> Result<AudioQualityReport, PipelineError> {
    let mut file = File::open(path)?;

    match wav::read(&mut file) {
        Ok((header, data)) => {
            let samples = normalize_samples(data);
            let channels = header.channel_count.max(1);
            let sample_rate = header.sampling_rate.max(1);
            let frames = samples.len() / channels as usize;
            let duration_seconds = frames as f64 / sample_rate as f64;

            Ok(build_report(
                &samples,
                duration_seconds,
                sample_rate,
                channels,
            ))
        }
        Err(_) => {
            // Not a WAVE container; fall back to raw 16-bit PCM
            debug!("{} is not RIFF/WAVE, probing as raw PCM", path.display());
            probe_raw_pcm(path)
        }
    }
}

/// Decode a headerless upload as raw 16-bit LE mono PCM.
fn probe_raw_pcm(path: &Path) -> Result<AudioQualityReport, PipelineError> {
    let file = File::open(path)?;
    let byte_len = file.metadata()?.len();
    if byte_len < 2 {
        return Err(PipelineError::collaborator(
            "audio_quality",
            "upload too small to contain audio samples",
        ));
    }

    let mut reader = BufReader::new(file);
    let mut samples = Vec::with_capacity((byte_len / 2) as usize);
    while let Ok(sample) = reader.read_i16::<LittleEndian>() {
        samples.push(sample as f64 / i16::MAX as f64);
    }

    let duration_seconds = samples.len() as f64 / RAW_PCM_SAMPLE_RATE as f64;
    Ok(build_report(&samples, duration_seconds, RAW_PCM_SAMPLE_RATE, 1))
}

fn normalize_samples(data: wav::BitDepth) -> Vec<f64> {
    match data {
        wav::BitDepth::Eight(samples) => samples
            .into_iter()
            .map(|s| (s as f64 - 128.0) / 128.0)
            .collect(),
        wav::BitDepth::Sixteen(samples) => samples
            .into_iter()
            .map(|s| s as f64 / i16::MAX as f64)
            .collect(),
        wav::BitDepth::TwentyFour(samples) => samples
            .into_iter()
            .map(|s| s as f64 / 8_388_607.0)
            .collect(),
        wav::BitDepth::ThirtyTwoFloat(samples) => {
            samples.into_iter().map(|s| s as f64).collect()
        }
        wav::BitDepth::Empty => Vec::new(),
    }
}

fn build_report(
    samples: &[f64],
    duration_seconds: f64,
    sample_rate: u32,
    channels: u16,
) -> AudioQualityReport {
    let loudness_db = rms_dbfs(samples);
    let quality_score = quality_score(samples, duration_seconds, sample_rate, loudness_db);

    AudioQualityReport {
        duration_seconds,
        sample_rate,
        channels,
        loudness_db,
        quality_score,
    }
}

/// RMS level in dBFS. Silence floors at -96 dB rather than -inf.
fn rms_dbfs(samples: &[f64]) -> f64 {
    if samples.is_empty() {
        return -96.0;
    }
    let mean_square: f64 = samples.iter().map(|s| s * s).sum::<f64>() / samples.len() as f64;
    let rms = mean_square.sqrt();
    if rms <= 1e-5 {
        -96.0
    } else {
        20.0 * rms.log10()
    }
}

/// Heuristic 0-100 usability score for downstream analysis.
///
/// Rewards speech-grade sample rates, sane durations and a healthy level;
/// penalizes clipping.
fn quality_score(samples: &[f64], duration_seconds: f64, sample_rate: u32, loudness_db: f64) -> f64 {
    let mut score: f64 = 50.0;

    if sample_rate >= 16000 {
        score += 20.0;
    } else if sample_rate >= 8000 {
        score += 5.0;
    }

    if (1.0..=600.0).contains(&duration_seconds) {
        score += 10.0;
    }

    if (-30.0..=-6.0).contains(&loudness_db) {
        score += 20.0;
    } else if (-45.0..=-3.0).contains(&loudness_db) {
        score += 10.0;
    }

    if !samples.is_empty() {
        let clipped = samples.iter().filter(|s| s.abs() > 0.985).count();
        let clip_ratio = clipped as f64 / samples.len() as f64;
        score -= (clip_ratio * 200.0).min(20.0);
    }

    score.clamp(0.0, 100.0)
}

/// Transcription boundary for deployments without an inference backend.
///
/// Looks for a sidecar transcript next to the upload (`<name>.txt`). The real
/// transcription collaborator is a black box behind the `Transcriber` trait;
/// this default keeps the pipeline exercisable end-to-end in development.
/// With no sidecar present the step fails, which is the honest foundational
/// outcome: nothing downstream can run without a transcript.
pub struct SidecarTranscriber;

impl Transcriber for SidecarTranscriber {
    fn transcribe<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, Result<String, PipelineError>> {
        Box::pin(async move {
            let sidecar = path.with_extension("txt");
            let text = tokio::fs::read_to_string(&sidecar).await.map_err(|_| {
                PipelineError::collaborator(
                    "transcription",
                    format!(
                        "no transcription backend configured and no sidecar transcript at {}",
                        sidecar.display()
                    ),
                )
            })?;

            let text = text.trim().to_string();
            if text.is_empty() {
                return Err(PipelineError::collaborator(
                    "transcription",
                    "sidecar transcript is empty",
                ));
            }
            Ok(text)
        })
    }
}

/// Emotion lexicons: label → indicative phrases.
const EMOTION_LEXICON: &[(&str, &[&str])] = &[
    (
        "angry",
        &["angry", "furious", "hate", "annoyed", "mad", "outraged", "fed up"],
    ),
    (
        "sad",
        &["sad", "miserable", "cry", "lonely", "depressed", "heartbroken", "grief"],
    ),
    (
        "happy",
        &["happy", "great", "wonderful", "glad", "excited", "love", "fantastic"],
    ),
    (
        "anxious",
        &["worried", "nervous", "afraid", "scared", "anxious", "panic", "stressed"],
    ),
    (
        "calm",
        &["fine", "okay", "calm", "relaxed", "steady", "alright"],
    ),
];

/// Lexicon-backed emotion classification over the transcript.
///
/// An acoustic model would also use the audio signal; this default only
/// consumes the transcript and returns a normalized score distribution over
/// the matched labels, or a single neutral label when nothing matches.
pub struct LexiconEmotionClassifier;

impl EmotionClassifier for LexiconEmotionClassifier {
    fn classify<'a>(
        &'a self,
        _path: &'a Path,
        transcript: &'a str,
    ) -> BoxFuture<'a, Result<Vec<EmotionScore>, PipelineError>> {
        Box::pin(async move {
            let lower = transcript.to_lowercase();

            let mut hits: Vec<(&str, u32)> = Vec::new();
            for (label, phrases) in EMOTION_LEXICON {
                let count: u32 = phrases
                    .iter()
                    .map(|phrase| lower.matches(phrase).count() as u32)
                    .sum();
                if count > 0 {
                    hits.push((label, count));
                }
            }

            if hits.is_empty() {
                return Ok(vec![EmotionScore {
                    emotion: "neutral".to_string(),
                    score: 0.6,
                }]);
            }

            let total: u32 = hits.iter().map(|(_, count)| count).sum();
            let mut scores: Vec<EmotionScore> = hits
                .into_iter()
                .map(|(label, count)| EmotionScore {
                    emotion: label.to_string(),
                    score: count as f64 / total as f64,
                })
                .collect();

            scores.sort_by(|a, b| b.score.total_cmp(&a.score));
            Ok(scores)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn test_raw_pcm_probe() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.pcm");

        // One second of quiet 16kHz sine-ish data
        let mut file = File::create(&path).unwrap();
        for i in 0..16000u32 {
            let sample = ((i as f64 * 0.05).sin() * 8000.0) as i16;
            file.write_all(&sample.to_le_bytes()).unwrap();
        }
        drop(file);

        let report = WavProber.probe(&path).await.unwrap();
        assert!((report.duration_seconds - 1.0).abs() < 0.01);
        assert_eq!(report.sample_rate, 16000);
        assert_eq!(report.channels, 1);
        assert!(report.loudness_db < 0.0);
        assert!(report.quality_score > 50.0);
    }

    #[tokio::test]
    async fn test_probe_rejects_empty_upload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.pcm");
        File::create(&path).unwrap();

        assert!(WavProber.probe(&path).await.is_err());
    }

    #[tokio::test]
    async fn test_sidecar_transcriber() {
        let dir = tempfile::tempdir().unwrap();
        let audio = dir.path().join("clip.wav");
        std::fs::write(&audio, b"not really audio").unwrap();
        std::fs::write(dir.path().join("clip.txt"), "  I was home all night.  ").unwrap();

        let text = SidecarTranscriber.transcribe(&audio).await.unwrap();
        assert_eq!(text, "I was home all night.");
    }

    #[tokio::test]
    async fn test_sidecar_transcriber_fails_without_sidecar() {
        let dir = tempfile::tempdir().unwrap();
        let audio = dir.path().join("clip.wav");
        std::fs::write(&audio, b"x").unwrap();

        let err = SidecarTranscriber.transcribe(&audio).await.unwrap_err();
        assert!(err.to_string().contains("transcription failed"));
    }

    #[tokio::test]
    async fn test_emotion_classifier_normalizes_scores() {
        let scores = LexiconEmotionClassifier
            .classify(Path::new("unused"), "I am so angry, just furious, but also worried")
            .await
            .unwrap();

        assert_eq!(scores[0].emotion, "angry");
        let total: f64 = scores.iter().map(|s| s.score).sum();
        assert!((total - 1.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_emotion_classifier_neutral_fallback() {
        let scores = LexiconEmotionClassifier
            .classify(Path::new("unused"), "the meeting is at three")
            .await
            .unwrap();

        assert_eq!(scores.len(), 1);
        assert_eq!(scores[0].emotion, "neutral");
    }
}
