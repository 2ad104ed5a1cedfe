//! Key/value persistence for the selection store
//!
//! A missing or malformed document is never an error for the caller: `load`
//! reports what it found and the engine regenerates defaults.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};

use crate::config::Config;
use crate::constants::video::PARTIAL_SUFFIX;
use crate::error::StoreError;

/// Result of reading the persisted document
#[derive(Debug)]
pub enum LoadOutcome {
    Loaded(Config),
    Missing,
    /// Present but unreadable or unparsable; carries the reason
    Corrupt(String),
}

pub trait ConfigStore {
    fn load(&self) -> LoadOutcome;
    fn save(&self, config: &Config) -> Result<(), StoreError>;
}

/// Pretty-printed JSON file, replaced atomically on save
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ConfigStore for JsonFileStore {
    fn load(&self) -> LoadOutcome {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                info!(path = %self.path.display(), "Config file not found");
                return LoadOutcome::Missing;
            }
            Err(e) => {
                error!(path = %self.path.display(), error = %e, "Failed to read config file");
                return LoadOutcome::Corrupt(e.to_string());
            }
        };

        match serde_json::from_str::<Config>(&contents) {
            Ok(config) => {
                debug!(path = %self.path.display(), "Loaded config");
                LoadOutcome::Loaded(config)
            }
            Err(e) => {
                error!(path = %self.path.display(), error = %e, "Failed to parse config file");
                LoadOutcome::Corrupt(e.to_string())
            }
        }
    }

    fn save(&self, config: &Config) -> Result<(), StoreError> {
        let contents = serde_json::to_string_pretty(config)?;
        write_atomic(&self.path, contents.as_bytes()).map_err(|source| StoreError::Write {
            path: self.path.clone(),
            source,
        })?;
        debug!(path = %self.path.display(), "Saved config");
        Ok(())
    }
}

/// Write to a sibling temporary file and rename over `path`
pub fn write_atomic(path: &Path, contents: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp = partial_path(path);
    if let Err(e) = fs::write(&tmp, contents).and_then(|()| fs::rename(&tmp, path)) {
        let _ = fs::remove_file(&tmp);
        return Err(e);
    }
    Ok(())
}

/// `<path>.part`
pub fn partial_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(PARTIAL_SUFFIX);
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ShuffleMode, Slot};

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("config.json"));
        assert!(matches!(store.load(), LoadOutcome::Missing));
    }

    #[test]
    fn test_malformed_file_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ not json").unwrap();
        let store = JsonFileStore::new(&path);
        assert!(matches!(store.load(), LoadOutcome::Corrupt(_)));
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("nested/config.json"));

        let mut config = Config::default();
        config.selection.set(Slot::Suspend, "Retro/steam_os_suspend.webm");
        config.randomize = ShuffleMode::Set;
        store.save(&config).unwrap();

        assert!(!partial_path(store.path()).exists());
        match store.load() {
            LoadOutcome::Loaded(loaded) => assert_eq!(loaded, config),
            other => panic!("unexpected load outcome: {other:?}"),
        }
    }
}
