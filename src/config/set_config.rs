//! Per-directory marker file for local animation sets
//!
//! `<animations>/<set>/config.json` may carry an `enabled` flag and explicit
//! per-slot filenames. A key that is present overrides default-name inference
//! even when its value is empty.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::store::write_atomic;
use crate::constants::config::SET_CONFIG_FILENAME;
use crate::types::{AnimationSet, Slot};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "nullable")]
    pub boot: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "nullable")]
    pub suspend: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "nullable")]
    pub throbber: Option<String>,
}

/// A present-but-null key still counts as an explicit (empty) override
fn nullable<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value: Option<String> = Option::deserialize(deserializer)?;
    Ok(Some(value.unwrap_or_default()))
}

impl SetConfig {
    pub fn path(set_dir: &Path) -> PathBuf {
        set_dir.join(SET_CONFIG_FILENAME)
    }

    /// `Ok(None)` when the directory has no marker file
    pub fn read(set_dir: &Path) -> Result<Option<Self>> {
        let path = Self::path(set_dir);
        if !path.exists() {
            return Ok(None);
        }
        let contents = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        Ok(Some(config))
    }

    /// Marker that pins the set's current filenames and enabled flag
    pub fn from_set(set: &AnimationSet) -> Self {
        Self {
            enabled: Some(set.enabled),
            boot: Some(set.boot.clone()),
            suspend: Some(set.suspend.clone()),
            throbber: Some(set.throbber.clone()),
        }
    }

    pub fn write(&self, set_dir: &Path) -> Result<()> {
        let path = Self::path(set_dir);
        let contents = serde_json::to_string_pretty(self).context("Failed to serialize set config")?;
        write_atomic(&path, contents.as_bytes())
            .with_context(|| format!("Failed to write {}", path.display()))
    }

    pub fn filename(&self, slot: Slot) -> Option<&str> {
        match slot {
            Slot::Boot => self.boot.as_deref(),
            Slot::Suspend => self.suspend.as_deref(),
            Slot::Throbber => self.throbber.as_deref(),
        }
    }
}
