//! Settings store owned by the gateway.
//!
//! The store holds the current record in memory, persists every accepted
//! update as a whole record through a [`SettingsBackend`], and broadcasts the
//! merged record to every live subscriber. Only the gateway's command loop
//! mutates it, which serializes writes.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use tempfile::NamedTempFile;
use thiserror::Error;
use tokio::sync::broadcast;

use dialectic_types::{Settings, SettingsPatch};

/// Subscribers that fall this far behind skip to the newest record.
const BROADCAST_CAPACITY: usize = 16;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read settings from {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse settings at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to write settings to {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("settings storage unavailable: {0}")]
    Unavailable(String),
}

/// Where the settings record lives.
pub trait SettingsBackend: Send + 'static {
    /// `Ok(None)` means nothing has been stored yet.
    fn load(&self) -> Result<Option<Settings>, SettingsError>;
    fn save(&self, settings: &Settings) -> Result<(), SettingsError>;
}

/// JSON file on disk, replaced atomically on every save.
#[derive(Debug, Clone)]
pub struct FileBackend {
    path: PathBuf,
}

impl FileBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SettingsBackend for FileBackend {
    fn load(&self) -> Result<Option<Settings>, SettingsError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(SettingsError::Read {
                    path: self.path.clone(),
                    source,
                });
            }
        };
        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|source| SettingsError::Parse {
                path: self.path.clone(),
                source,
            })
    }

    fn save(&self, settings: &Settings) -> Result<(), SettingsError> {
        let write_err = |source| SettingsError::Write {
            path: self.path.clone(),
            source,
        };

        let parent = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(parent).map_err(write_err)?;

        let json = serde_json::to_vec_pretty(settings)
            .map_err(|e| write_err(io::Error::new(io::ErrorKind::InvalidData, e)))?;

        let mut tmp = NamedTempFile::new_in(parent).map_err(write_err)?;
        tmp.write_all(&json).map_err(write_err)?;
        tmp.as_file().sync_all().map_err(write_err)?;
        tmp.persist(&self.path).map_err(|e| write_err(e.error))?;
        Ok(())
    }
}

/// In-process backend for headless sessions and tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    stored: Arc<Mutex<Option<Settings>>>,
    fail_writes: bool,
}

impl MemoryBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_settings(settings: Settings) -> Self {
        Self {
            stored: Arc::new(Mutex::new(Some(settings))),
            fail_writes: false,
        }
    }

    /// A backend whose every save fails.
    #[must_use]
    pub fn failing() -> Self {
        Self {
            stored: Arc::default(),
            fail_writes: true,
        }
    }

    /// The last record that was successfully saved.
    #[must_use]
    pub fn stored(&self) -> Option<Settings> {
        *self.stored.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl SettingsBackend for MemoryBackend {
    fn load(&self) -> Result<Option<Settings>, SettingsError> {
        Ok(self.stored())
    }

    fn save(&self, settings: &Settings) -> Result<(), SettingsError> {
        if self.fail_writes {
            return Err(SettingsError::Unavailable("memory backend is read-only".into()));
        }
        *self.stored.lock().unwrap_or_else(PoisonError::into_inner) = Some(*settings);
        Ok(())
    }
}

pub struct SettingsStore {
    backend: Box<dyn SettingsBackend>,
    current: Settings,
    tx: broadcast::Sender<Settings>,
}

impl std::fmt::Debug for SettingsStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SettingsStore")
            .field("current", &self.current)
            .field("subscribers", &self.tx.receiver_count())
            .finish_non_exhaustive()
    }
}

impl SettingsStore {
    /// Load the stored record, falling back to defaults when nothing is stored
    /// or the stored record cannot be read.
    pub fn open(backend: impl SettingsBackend) -> Self {
        let current = match backend.load() {
            Ok(Some(settings)) => settings,
            Ok(None) => Settings::default(),
            Err(e) => {
                tracing::warn!("Failed to load settings, using defaults: {e}");
                Settings::default()
            }
        };
        let (tx, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self {
            backend: Box::new(backend),
            current,
            tx,
        }
    }

    #[must_use]
    pub fn get(&self) -> Settings {
        self.current
    }

    /// Merge `patch` into the current record, persist it, then broadcast it.
    ///
    /// A failed save leaves the current record untouched and broadcasts nothing.
    pub fn update(&mut self, patch: &SettingsPatch) -> Result<Settings, SettingsError> {
        let merged = self.current.merged(patch);
        self.backend.save(&merged)?;
        self.current = merged;

        if self.tx.send(merged).is_err() {
            tracing::warn!("Settings updated with no live subscribers");
        }
        Ok(merged)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Settings> {
        self.tx.subscribe()
    }

    #[must_use]
    pub fn sender(&self) -> broadcast::Sender<Settings> {
        self.tx.clone()
    }
}
