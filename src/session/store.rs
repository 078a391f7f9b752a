//! The concurrent session map and its operations.

use crate::error::AppError;
use crate::pipeline::report::AnalysisReport;
use crate::session::context::SessionContext;
use crate::session::record::{AnalysisRecord, HistoricalAnalysis};
use chrono::{DateTime, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

/// Maximum retained records per session. Lifetime counters are unaffected
/// by eviction.
const HISTORY_LIMIT: usize = 10;

/// One session's state. History is FIFO-bounded; `analysis_count` tracks the
/// lifetime total independent of truncation.
struct SessionEntry {
    created_at: DateTime<Utc>,
    analysis_count: u64,
    history: VecDeque<AnalysisRecord>,
}

impl SessionEntry {
    fn new() -> Self {
        Self {
            created_at: Utc::now(),
            analysis_count: 0,
            history: VecDeque::with_capacity(HISTORY_LIMIT),
        }
    }

    fn duration_minutes(&self) -> f64 {
        let elapsed = Utc::now().signed_duration_since(self.created_at);
        elapsed.num_milliseconds() as f64 / 60_000.0
    }
}

/// Creates and tracks analysis sessions.
///
/// ## Thread Safety:
/// Uses RwLock to allow multiple readers (history/context lookups) or one
/// writer (create/append/delete) at a time. Constructed once in `main` and
/// passed by handle to every request path; there is no ambient singleton.
pub struct SessionStore {
    sessions: RwLock<HashMap<String, SessionEntry>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Return an existing session's id or create a fresh session.
    ///
    /// With no id given, a new UUID-keyed session is created. With an id
    /// given, the session is created lazily if unknown; an existing session
    /// is returned unchanged, never resetting its counters or history.
    pub fn get_or_create(&self, session_id: Option<&str>) -> String {
        let mut sessions = self.sessions.write().unwrap();

        let id = session_id
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        if !sessions.contains_key(&id) {
            sessions.insert(id.clone(), SessionEntry::new());
            info!("Created session {}", id);
        }

        id
    }

    /// Append one completed analysis to a session.
    ///
    /// Session existence is an explicit precondition; nothing is created
    /// implicitly here. Increments the lifetime counter, extracts the compact
    /// record from the full report, and evicts the oldest record once the
    /// history exceeds its bound.
    pub fn add_analysis(
        &self,
        session_id: &str,
        transcript: &str,
        report: &AnalysisReport,
    ) -> Result<AnalysisRecord, AppError> {
        let mut sessions = self.sessions.write().unwrap();
        let entry = sessions
            .get_mut(session_id)
            .ok_or_else(|| AppError::SessionNotFound(session_id.to_string()))?;

        entry.analysis_count += 1;
        let record = AnalysisRecord::extract(entry.analysis_count, transcript, report);
        entry.history.push_back(record.clone());

        while entry.history.len() > HISTORY_LIMIT {
            entry.history.pop_front();
            debug!("Evicted oldest record from session {}", session_id);
        }

        Ok(record)
    }

    /// Chronological history for a session, reconstructed through the
    /// insights-facing adapter. Unknown sessions yield an empty list.
    pub fn get_history(&self, session_id: &str) -> Vec<HistoricalAnalysis> {
        let sessions = self.sessions.read().unwrap();
        match sessions.get(session_id) {
            Some(entry) => entry.history.iter().map(HistoricalAnalysis::from).collect(),
            None => Vec::new(),
        }
    }

    /// Derived read-only view of a session, or None when unknown.
    pub fn get_context(&self, session_id: &str) -> Option<SessionContext> {
        let sessions = self.sessions.read().unwrap();
        sessions.get(session_id).map(|entry| {
            let history: Vec<AnalysisRecord> = entry.history.iter().cloned().collect();
            SessionContext::derive(entry.analysis_count, entry.duration_minutes(), &history)
        })
    }

    /// Remove all state for a session. Returns whether anything existed.
    pub fn delete(&self, session_id: &str) -> bool {
        let mut sessions = self.sessions.write().unwrap();
        let existed = sessions.remove(session_id).is_some();
        if existed {
            info!("Deleted session {}", session_id);
        }
        existed
    }

    pub fn exists(&self, session_id: &str) -> bool {
        self.sessions.read().unwrap().contains_key(session_id)
    }

    /// Number of live sessions (for health reporting).
    pub fn session_count(&self) -> usize {
        self.sessions.read().unwrap().len()
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}
