//! Local animation scanner
//!
//! Every immediate subdirectory of the animations root is a candidate set.
//! Output is sorted by directory name so repeated scans of an unchanged tree
//! are identical.

use anyhow::{Context, Result};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::config::SetConfig;
use crate::platform::VideoNames;
use crate::types::{AnimationEntry, AnimationSet, Slot, Source};

/// Result of one scan
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LocalScan {
    pub animations: Vec<AnimationEntry>,
    pub sets: Vec<AnimationSet>,
}

impl LocalScan {
    pub fn set(&self, id: &str) -> Option<&AnimationSet> {
        self.sets.iter().find(|set| set.id == id)
    }

    pub fn animation(&self, id: &str) -> Option<&AnimationEntry> {
        self.animations.iter().find(|anim| anim.id == id)
    }
}

/// Scan `root` for animation sets
pub fn scan(root: &Path, names: &VideoNames) -> Result<LocalScan> {
    let mut directories: Vec<(String, PathBuf)> = Vec::new();
    for entry in fs::read_dir(root)
        .with_context(|| format!("Failed to read animations directory {}", root.display()))?
    {
        let entry = entry.with_context(|| format!("Failed to list {}", root.display()))?;
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        match entry.file_name().into_string() {
            Ok(name) => directories.push((name, path)),
            Err(name) => warn!(directory = ?name, "Skipping non UTF-8 animation directory"),
        }
    }
    directories.sort_by(|a, b| a.0.cmp(&b.0));

    let mut scan = LocalScan::default();
    for (name, path) in directories {
        if let Some(set) = scan_directory(&name, &path, names) {
            for slot in Slot::ALL {
                if let Some(filename) = set.filename(slot) {
                    scan.animations.push(local_entry(&name, filename, slot));
                }
            }
            scan.sets.push(set);
        }
    }

    info!(
        root = %root.display(),
        sets = scan.sets.len(),
        animations = scan.animations.len(),
        "Scanned local animations"
    );
    Ok(scan)
}

fn scan_directory(name: &str, path: &Path, names: &VideoNames) -> Option<AnimationSet> {
    let marker = match SetConfig::read(path) {
        Ok(marker) => marker,
        Err(e) => {
            warn!(directory = %name, error = ?e, "Failed to parse set config, inferring from default filenames");
            None
        }
    };

    let mut set = AnimationSet::new(name);
    if let Some(enabled) = marker.as_ref().and_then(|m| m.enabled) {
        set.enabled = enabled;
    }

    for slot in Slot::ALL {
        // An explicit key wins even when the file cannot be verified
        let filename = match marker.as_ref().and_then(|m| m.filename(slot)) {
            Some(explicit) => explicit.to_string(),
            None => {
                let default = names.get(slot);
                if path.join(default).exists() {
                    default.to_string()
                } else {
                    String::new()
                }
            }
        };
        set.set_filename(slot, filename);
    }

    if set.is_empty() {
        debug!(directory = %name, "Directory holds no animations");
        return None;
    }
    Some(set)
}

fn local_entry(directory: &str, filename: &str, slot: Slot) -> AnimationEntry {
    let relative_path = Path::new(directory).join(filename);
    AnimationEntry {
        id: format!("{}/{}", directory, filename),
        name: slot.entry_name(directory),
        target: slot.target(),
        source: Source::Local { relative_path },
    }
}
