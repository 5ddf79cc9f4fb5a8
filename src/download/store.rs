use parking_lot::Mutex;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::models::UseCase;
use crate::utils::{ParleyError, Result};

/// Persistence for the deployed use-case descriptor
#[cfg_attr(test, mockall::automock)]
pub trait UseCaseStore: Send + Sync {
    fn load(&self) -> Result<Option<UseCase>>;
    fn save(&self, use_case: &UseCase) -> Result<()>;
    fn clear(&self) -> Result<()>;
}

/// Load the stored deployment if its version matches `expected_version`
///
/// A deployment made for another version is discarded so the next download
/// redeploys. Read failures are logged and treated as "nothing stored".
pub fn load_matching(store: &dyn UseCaseStore, expected_version: Option<&str>) -> Option<UseCase> {
    let stored = match store.load() {
        Ok(stored) => stored?,
        Err(err) => {
            warn!("Failed to load stored use case: {}", err);
            return None;
        }
    };

    match expected_version {
        Some(expected) if stored.version.as_deref() != Some(expected) => {
            info!(
                "Stored use case version {:?} does not match {}, discarding",
                stored.version, expected
            );
            if let Err(err) = store.clear() {
                warn!("Failed to clear stale use case: {}", err);
            }
            None
        }
        _ => Some(stored),
    }
}

/// Keeps the deployment for the life of the process
#[derive(Debug, Default)]
pub struct MemoryUseCaseStore {
    slot: Mutex<Option<UseCase>>,
}

impl MemoryUseCaseStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl UseCaseStore for MemoryUseCaseStore {
    fn load(&self) -> Result<Option<UseCase>> {
        Ok(self.slot.lock().clone())
    }

    fn save(&self, use_case: &UseCase) -> Result<()> {
        *self.slot.lock() = Some(use_case.clone());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        *self.slot.lock() = None;
        Ok(())
    }
}

/// JSON file, normally `use_case.json` in the config directory
#[derive(Debug, Clone)]
pub struct FileUseCaseStore {
    path: PathBuf,
}

impl FileUseCaseStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn io_error(path: &Path, err: impl std::fmt::Display) -> ParleyError {
    ParleyError::Configuration(format!("{}: {}", path.display(), err))
}

impl UseCaseStore for FileUseCaseStore {
    fn load(&self) -> Result<Option<UseCase>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let json = fs::read_to_string(&self.path).map_err(|e| io_error(&self.path, e))?;
        let use_case = serde_json::from_str(&json).map_err(|e| io_error(&self.path, e))?;
        Ok(Some(use_case))
    }

    fn save(&self, use_case: &UseCase) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| io_error(parent, e))?;
        }
        let json = serde_json::to_string_pretty(use_case).map_err(|e| io_error(&self.path, e))?;
        fs::write(&self.path, json).map_err(|e| io_error(&self.path, e))
    }

    fn clear(&self) -> Result<()> {
        if self.path.exists() {
            fs::remove_file(&self.path).map_err(|e| io_error(&self.path, e))?;
        }
        Ok(())
    }
}
