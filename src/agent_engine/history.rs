use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::config::HistoryConfig;
use crate::errors::ScreenLoopResult;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub ts: i64,
    pub turn: u32,
    /// `model`, `safety`, `action` or `final`.
    pub role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub call_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl HistoryEntry {
    pub fn new(turn: u32, role: &str) -> Self {
        Self {
            ts: chrono::Utc::now().timestamp_millis(),
            turn,
            role: role.into(),
            call_id: None,
            content: None,
            data: None,
        }
    }

    pub fn call_id(mut self, call_id: &str) -> Self {
        self.call_id = Some(call_id.into());
        self
    }

    pub fn content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    pub fn data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }
}

/// Transcript of one session. Screenshots are never recorded.
pub struct SessionHistory {
    pub session_id: String,
    entries: Vec<HistoryEntry>,
    file_path: Option<PathBuf>,
}

impl SessionHistory {
    /// In-memory only.
    pub fn new() -> Self {
        Self {
            session_id: uuid::Uuid::new_v4().to_string(),
            entries: Vec::new(),
            file_path: None,
        }
    }

    /// Also appends each entry to `<dir>/session_<id>.jsonl`.
    pub fn persisted_in(dir: &Path) -> Self {
        let mut history = Self::new();
        if let Err(e) = std::fs::create_dir_all(dir) {
            tracing::warn!(
                dir = %dir.display(),
                error = %e,
                "history dir unavailable; keeping history in memory"
            );
            return history;
        }
        history.file_path = Some(dir.join(format!("session_{}.jsonl", history.session_id)));
        history
    }

    pub fn from_config(cfg: &HistoryConfig) -> Self {
        if !cfg.enabled {
            return Self::new();
        }
        let dir = cfg.dir.clone().unwrap_or_else(default_sessions_dir);
        Self::persisted_in(&dir)
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    pub fn file_path(&self) -> Option<&Path> {
        self.file_path.as_deref()
    }

    /// Records `entry`; write failures are logged and otherwise ignored.
    pub fn record(&mut self, entry: HistoryEntry) {
        self.entries.push(entry);
        if let Err(e) = self.flush() {
            tracing::warn!(error = %e, "history flush failed");
        }
    }

    /// Append the latest entry to the JSONL file.
    fn flush(&self) -> ScreenLoopResult<()> {
        let (Some(path), Some(last)) = (&self.file_path, self.entries.last()) else {
            return Ok(());
        };
        let line = serde_json::to_string(last)?;
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;
        writeln!(file, "{}", line)?;
        tracing::debug!(path = %path.display(), "history entry flushed");
        Ok(())
    }
}

impl Default for SessionHistory {
    fn default() -> Self {
        Self::new()
    }
}

/// `<platform data dir>/screenloop/sessions`, falling back to the working directory.
fn default_sessions_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("screenloop").join("sessions"))
        .unwrap_or_else(|| PathBuf::from("."))
}
