//! Persisted wizard state shared by the `process`, `preview`, `edit` and
//! `export` commands.
//!
//! The session is one JSON file (default `<cache>/fleetreport/session.json`).
//! Commands that rewrite it hold `<session>.lock`, created exclusively, for
//! the duration of the work.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use fleetreport_engine::{Dataset, DatasetStore};
use fleetreport_rules::{PipelineReport, RulesConfig};
use serde::{Deserialize, Serialize};

pub const SESSION_VERSION: u32 = 1;

// ============================================================================
// State
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Pipeline ran; rows ready for preview
    Processed,
    /// At least one grid edit applied since processing
    Edited,
    /// Archive written and the session kept (`export --keep`)
    Exported,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// One main file, identity column mapping
    Single,
    /// SPB + MSK main files, preset column layout
    TwoCity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceRole {
    SpbMain,
    SpbPartner,
    MskMain,
    MskPartner,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceFile {
    pub role: SourceRole,
    pub path: PathBuf,
    pub rows: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    pub version: u32,
    pub stage: Stage,
    pub mode: Mode,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub sources: Vec<SourceFile>,
    /// Effective rules the pipeline ran with; export reuses them
    pub config: RulesConfig,
    pub report: PipelineReport,
    pub dataset: Dataset,
}

impl SessionState {
    pub fn new(
        mode: Mode,
        sources: Vec<SourceFile>,
        config: RulesConfig,
        report: PipelineReport,
        dataset: Dataset,
    ) -> Self {
        let now = Utc::now();
        Self {
            version: SESSION_VERSION,
            stage: Stage::Processed,
            mode,
            created_at: now,
            updated_at: now,
            sources,
            config,
            report,
            dataset,
        }
    }
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug)]
pub enum SessionError {
    NotFound(PathBuf),
    /// Lock file already exists
    Busy(PathBuf),
    Io(String),
    Corrupt(String),
    Version { found: u32, expected: u32 },
}

impl std::fmt::Display for SessionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionError::NotFound(path) => write!(f, "no session at {}", path.display()),
            SessionError::Busy(lock) => write!(f, "another fleetreport run holds {}", lock.display()),
            SessionError::Io(msg) => write!(f, "I/O error: {}", msg),
            SessionError::Corrupt(msg) => write!(f, "session file is corrupt: {}", msg),
            SessionError::Version { found, expected } => {
                write!(f, "session version {} is not supported (expected {})", found, expected)
            }
        }
    }
}

impl std::error::Error for SessionError {}

// ============================================================================
// Paths
// ============================================================================

pub fn default_session_path() -> Option<PathBuf> {
    dirs::cache_dir().map(|dir| dir.join("fleetreport").join("session.json"))
}

pub fn lock_path(session: &Path) -> PathBuf {
    let mut name = session.as_os_str().to_os_string();
    name.push(".lock");
    PathBuf::from(name)
}

// ============================================================================
// File
// ============================================================================

#[derive(Debug, Clone)]
pub struct SessionFile {
    path: PathBuf,
}

impl SessionFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<SessionState, SessionError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(SessionError::NotFound(self.path.clone()));
            }
            Err(e) => return Err(SessionError::Io(format!("{}: {}", self.path.display(), e))),
        };

        // Check the version before the full decode so old files get a clear message
        let probe: serde_json::Value =
            serde_json::from_str(&content).map_err(|e| SessionError::Corrupt(e.to_string()))?;
        let found = probe.get("version").and_then(|v| v.as_u64()).unwrap_or(0) as u32;
        if found != SESSION_VERSION {
            return Err(SessionError::Version { found, expected: SESSION_VERSION });
        }

        serde_json::from_value(probe).map_err(|e| SessionError::Corrupt(e.to_string()))
    }

    /// Write via a temporary sibling and rename, so readers never see a half file
    pub fn save(&self, state: &SessionState) -> Result<(), SessionError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .map_err(|e| SessionError::Io(format!("{}: {}", parent.display(), e)))?;
        }
        let json = serde_json::to_vec_pretty(state).map_err(|e| SessionError::Io(e.to_string()))?;

        let mut tmp = self.path.as_os_str().to_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        fs::write(&tmp, json).map_err(|e| SessionError::Io(format!("{}: {}", tmp.display(), e)))?;
        fs::rename(&tmp, &self.path).map_err(|e| {
            let _ = fs::remove_file(&tmp);
            SessionError::Io(format!("{}: {}", self.path.display(), e))
        })?;

        log::debug!("session saved to {} ({} rows)", self.path.display(), state.dataset.len());
        Ok(())
    }

    pub fn clear(&self) -> Result<(), SessionError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(SessionError::Io(format!("{}: {}", self.path.display(), e))),
        }
    }
}

// ============================================================================
// Lock
// ============================================================================

/// Exclusive processing lock; the file is removed on drop
#[derive(Debug)]
pub struct ProcessLock {
    path: PathBuf,
}

impl ProcessLock {
    pub fn acquire(session: &Path) -> Result<Self, SessionError> {
        let path = lock_path(session);
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .map_err(|e| SessionError::Io(format!("{}: {}", parent.display(), e)))?;
        }

        let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                return Err(SessionError::Busy(path));
            }
            Err(e) => return Err(SessionError::Io(format!("{}: {}", path.display(), e))),
        };
        let _ = writeln!(file, "{}", std::process::id());

        Ok(Self { path })
    }
}

impl Drop for ProcessLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            log::warn!("failed to remove lock {}: {}", self.path.display(), e);
        }
    }
}

// ============================================================================
// Grid store
// ============================================================================

/// Persists grid edits back into the session file immediately
pub struct SessionStore {
    file: SessionFile,
    state: SessionState,
}

impl SessionStore {
    /// `state.dataset` is replaced on every save; the rest is kept as is
    pub fn new(file: SessionFile, state: SessionState) -> Self {
        Self { file, state }
    }
}

impl DatasetStore for SessionStore {
    fn save(&mut self, dataset: &Dataset) -> Result<(), String> {
        self.state.dataset = dataset.clone();
        self.state.stage = Stage::Edited;
        self.state.updated_at = Utc::now();
        self.file.save(&self.state).map_err(|e| e.to_string())
    }
}

// ============================================================================
// Tests
// ============================================================================
