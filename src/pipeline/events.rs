//! Wire-level event types pushed to a session's connected client while a
//! pipeline run is still executing.
//!
//! ## Message Format:
//! Every frame is a JSON object with a `type` discriminator:
//! - `progress_update`: emitted before each pipeline step runs
//! - `analysis_update`: one step's result, pushed as soon as it is available
//! - `error`: terminal failure of the run (foundational step failed)
//! - `complete`: the run finished and history/insights are committed

use serde::{Deserialize, Serialize};

/// Typed event messages for the per-session push channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PipelineEvent {
    /// Progress notification sent before a step's collaborator is invoked
    #[serde(rename = "progress_update")]
    ProgressUpdate {
        /// Human-readable step name (e.g. "transcription")
        step: String,
        /// 1-based step counter
        progress: u32,
        /// Total steps in this run
        total_steps: u32,
        /// round(100 * progress / total_steps)
        percentage: u32,
    },

    /// One completed analysis step's payload
    #[serde(rename = "analysis_update")]
    AnalysisUpdate {
        /// Which analysis produced the data (e.g. "emotion", "credibility")
        analysis_type: String,
        /// Structured collaborator output, already validated at the
        /// orchestration boundary
        data: serde_json::Value,
    },

    /// Terminal failure of the run. Does not close the channel; the client
    /// may keep it open for a subsequent upload on the same session.
    #[serde(rename = "error")]
    Error {
        /// Human-readable failure description
        message: String,
    },

    /// The run finished; session history and insights are committed
    #[serde(rename = "complete")]
    Complete {},
}

impl PipelineEvent {
    /// Build a progress update with the percentage derived from the step counter.
    pub fn progress(step: &str, progress: u32, total_steps: u32) -> Self {
        let percentage = if total_steps == 0 {
            0
        } else {
            (100.0 * progress as f64 / total_steps as f64).round() as u32
        };

        PipelineEvent::ProgressUpdate {
            step: step.to_string(),
            progress,
            total_steps,
            percentage,
        }
    }

    pub fn analysis(analysis_type: &str, data: serde_json::Value) -> Self {
        PipelineEvent::AnalysisUpdate {
            analysis_type: analysis_type.to_string(),
            data,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        PipelineEvent::Error {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_progress_event_wire_shape() {
        let event = PipelineEvent::progress("transcription", 2, 12);
        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(json["type"], "progress_update");
        assert_eq!(json["step"], "transcription");
        assert_eq!(json["progress"], 2);
        assert_eq!(json["total_steps"], 12);
        assert_eq!(json["percentage"], 17); // round(100 * 2 / 12)
    }

    #[test]
    fn test_percentage_rounding() {
        // round(100 * 1 / 12) = round(8.33) = 8
        match PipelineEvent::progress("audio_quality", 1, 12) {
            PipelineEvent::ProgressUpdate { percentage, .. } => assert_eq!(percentage, 8),
            _ => panic!("wrong variant"),
        }

        // round(100 * 6 / 12) = 50
        match PipelineEvent::progress("sentiment", 6, 12) {
            PipelineEvent::ProgressUpdate { percentage, .. } => assert_eq!(percentage, 50),
            _ => panic!("wrong variant"),
        }

        // Final step always lands on 100
        match PipelineEvent::progress("consistency_check", 12, 12) {
            PipelineEvent::ProgressUpdate { percentage, .. } => assert_eq!(percentage, 100),
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn test_analysis_update_round_trip() {
        let event = PipelineEvent::analysis("emotion", json!({"emotion": "calm", "score": 0.8}));
        let text = serde_json::to_string(&event).unwrap();
        let back: PipelineEvent = serde_json::from_str(&text).unwrap();

        match back {
            PipelineEvent::AnalysisUpdate {
                analysis_type,
                data,
            } => {
                assert_eq!(analysis_type, "emotion");
                assert_eq!(data["emotion"], "calm");
            }
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn test_complete_and_error_tags() {
        let json = serde_json::to_value(PipelineEvent::Complete {}).unwrap();
        assert_eq!(json["type"], "complete");

        let json = serde_json::to_value(PipelineEvent::error("transcription failed")).unwrap();
        assert_eq!(json["type"], "error");
        assert_eq!(json["message"], "transcription failed");
    }
}
