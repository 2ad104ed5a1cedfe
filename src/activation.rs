//! Activation engine
//!
//! Swaps the file Steam reads for a slot. Each slot is handled on its own: a
//! failure is reported for that slot and the remaining slots are still tried.
//! After an attempt the target is absent, a link/copy of the resolved source,
//! or a restored backup. Copies go through a temporary sibling and a rename so
//! a half-written target is never visible.

use serde::Serialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::config::store::partial_path;
use crate::constants::video::BACKUP_SUFFIX;
use crate::error::ActivationError;
use crate::platform::Capabilities;
use crate::resolver::Resolver;
use crate::types::{Slot, SlotSelection};

/// Windows: "A required privilege is not held by the client"
const ERROR_PRIVILEGE_NOT_HELD: i32 = 1314;

/// Filesystem operations the activator needs injected
pub trait Filesystem {
    fn symlink(&self, source: &Path, link: &Path) -> io::Result<()>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct StdFilesystem;

impl Filesystem for StdFilesystem {
    #[cfg(unix)]
    fn symlink(&self, source: &Path, link: &Path) -> io::Result<()> {
        std::os::unix::fs::symlink(source, link)
    }

    #[cfg(windows)]
    fn symlink(&self, source: &Path, link: &Path) -> io::Result<()> {
        std::os::windows::fs::symlink_file(source, link)
    }

    #[cfg(not(any(unix, windows)))]
    fn symlink(&self, _source: &Path, _link: &Path) -> io::Result<()> {
        Err(io::Error::new(io::ErrorKind::Unsupported, "symbolic links are not supported"))
    }
}

/// Final state of one slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    /// Slot not supported on this platform
    Skipped,
    /// No file at the target
    Cleared,
    /// Vendor backup copied back
    Restored,
    Linked,
    Copied,
}

pub struct Activator<'a, F: Filesystem> {
    caps: &'a Capabilities,
    fs: &'a F,
}

impl<'a, F: Filesystem> Activator<'a, F> {
    pub fn new(caps: &'a Capabilities, fs: &'a F) -> Self {
        Self { caps, fs }
    }

    /// Make `id` the animation Steam plays for `slot`; an empty id reverts
    pub fn activate(&self, slot: Slot, id: &str, resolver: &Resolver<'_>) -> Result<Outcome, ActivationError> {
        if !self.caps.supports(slot) {
            info!(slot = %slot, "Skipping animation, slot not supported on this platform");
            return Ok(Outcome::Skipped);
        }

        let target = self.caps.target_path(slot);
        let io_err = |from: &Path, source: io::Error| ActivationError::Io {
            slot,
            from: from.to_path_buf(),
            to: target.clone(),
            source,
        };

        let target_dir = self.caps.target_dir();
        fs::create_dir_all(target_dir).map_err(|e| io_err(target_dir, e))?;

        let backup = backup_path(&target);
        if self.caps.use_ui_movies {
            ensure_backup(&target, &backup).map_err(|e| io_err(&target, e))?;
        }

        remove_existing(&target).map_err(|e| io_err(&target, e))?;

        if id.is_empty() {
            if self.caps.use_ui_movies && backup.exists() {
                copy_atomic(&backup, &target).map_err(|e| io_err(&backup, e))?;
                info!(slot = %slot, path = %target.display(), "Restored from backup");
                return Ok(Outcome::Restored);
            }
            debug!(slot = %slot, "Reverted to default animation");
            return Ok(Outcome::Cleared);
        }

        let source = resolver
            .resolve(id)
            .map_err(|source| ActivationError::NotFound { slot, source })?;

        if self.caps.supports_symlink {
            match self.fs.symlink(&source, &target) {
                Ok(()) => {
                    info!(slot = %slot, link = %target.display(), source = %source.display(), "Created symlink");
                    return Ok(Outcome::Linked);
                }
                Err(e) if link_refused(&e) => {
                    info!(slot = %slot, error = %e, "Symlink refused, copying file instead");
                }
                Err(e) => return Err(io_err(&source, e)),
            }
        }

        copy_atomic(&source, &target).map_err(|e| io_err(&source, e))?;
        info!(slot = %slot, path = %target.display(), source = %source.display(), "Copied animation");
        Ok(Outcome::Copied)
    }

    /// Activate every slot from `selection`, isolating per-slot failures
    pub fn activate_all(
        &self,
        selection: &SlotSelection,
        resolver: &Resolver<'_>,
    ) -> Vec<(Slot, Result<Outcome, ActivationError>)> {
        Slot::ALL
            .into_iter()
            .map(|slot| (slot, self.activate(slot, selection.get(slot), resolver)))
            .collect()
    }
}

/// `<target>.backup`
pub fn backup_path(target: &Path) -> PathBuf {
    let mut name = target.as_os_str().to_os_string();
    name.push(BACKUP_SUFFIX);
    PathBuf::from(name)
}

/// Copy the vendor file aside once; an existing backup is never replaced
fn ensure_backup(target: &Path, backup: &Path) -> io::Result<()> {
    if backup.exists() {
        return Ok(());
    }
    match fs::symlink_metadata(target) {
        // a link is ours, not the vendor original
        Ok(meta) if meta.file_type().is_file() => {
            copy_atomic(target, backup)?;
            info!(path = %backup.display(), "Created backup");
            Ok(())
        }
        Ok(_) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

fn remove_existing(target: &Path) -> io::Result<()> {
    match fs::remove_file(target) {
        Ok(()) => {
            debug!(path = %target.display(), "Removed existing file");
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => {
            warn!(path = %target.display(), error = %e, "Failed to remove existing file");
            Err(e)
        }
    }
}

/// Copy through `<to>.part` and rename into place
fn copy_atomic(from: &Path, to: &Path) -> io::Result<()> {
    let tmp = partial_path(to);
    if let Err(e) = fs::copy(from, &tmp).and_then(|_| fs::rename(&tmp, to)) {
        let _ = fs::remove_file(&tmp);
        return Err(e);
    }
    Ok(())
}

fn link_refused(e: &io::Error) -> bool {
    matches!(e.kind(), io::ErrorKind::Unsupported | io::ErrorKind::PermissionDenied)
        || (cfg!(windows) && e.raw_os_error() == Some(ERROR_PRIVILEGE_NOT_HELD))
}
