//! Platform capability descriptor and filesystem locations
//!
//! Everything that differs between SteamOS/Linux, macOS and Windows is resolved
//! once at startup into a `Capabilities` value and injected into the activator.

use std::path::{Component, Path, PathBuf};
use tracing::{info, warn};

use crate::constants::{self, steam, video};
use crate::types::Slot;

/// Per-slot Steam video filenames
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoNames {
    pub boot: String,
    pub suspend: String,
    pub throbber: String,
}

impl VideoNames {
    pub fn deck() -> Self {
        Self {
            boot: video::deck::BOOT.to_string(),
            suspend: video::deck::SUSPEND.to_string(),
            throbber: video::deck::THROBBER.to_string(),
        }
    }

    pub fn big_picture() -> Self {
        Self {
            boot: video::big_picture::BOOT.to_string(),
            suspend: video::big_picture::SUSPEND.to_string(),
            throbber: video::big_picture::THROBBER.to_string(),
        }
    }

    pub fn get(&self, slot: Slot) -> &str {
        match slot {
            Slot::Boot => &self.boot,
            Slot::Suspend => &self.suspend,
            Slot::Throbber => &self.throbber,
        }
    }
}

/// What the current platform lets us do, and where
#[derive(Debug, Clone)]
pub struct Capabilities {
    /// `<steam>/config/uioverrides/movies`
    pub override_dir: PathBuf,
    /// `<steam>/steamui/movies`
    pub ui_movies_dir: PathBuf,
    /// Write straight into `ui_movies_dir` (with backups) instead of the override dir
    pub use_ui_movies: bool,
    /// Try a symlink before copying
    pub supports_symlink: bool,
    pub supported_slots: Vec<Slot>,
    pub video_names: VideoNames,
}

impl Capabilities {
    /// SteamOS / Linux / macOS: every slot through the override directory
    pub fn deck(steam_root: &Path) -> Self {
        Self {
            override_dir: join_all(steam_root, &steam::OVERRIDE_MOVIES),
            ui_movies_dir: join_all(steam_root, &steam::UI_MOVIES),
            use_ui_movies: false,
            supports_symlink: true,
            supported_slots: Slot::ALL.to_vec(),
            video_names: VideoNames::deck(),
        }
    }

    /// Windows Big Picture: boot only, written into steamui/movies
    pub fn big_picture(steam_root: &Path) -> Self {
        Self {
            override_dir: join_all(steam_root, &steam::OVERRIDE_MOVIES),
            ui_movies_dir: join_all(steam_root, &steam::UI_MOVIES),
            use_ui_movies: true,
            supports_symlink: true,
            supported_slots: vec![Slot::Boot],
            video_names: VideoNames::big_picture(),
        }
    }

    /// Descriptor for the platform this binary was built for
    pub fn for_current_platform(steam_root: &Path) -> Self {
        if cfg!(windows) {
            Self::big_picture(steam_root)
        } else {
            Self::deck(steam_root)
        }
    }

    pub fn supports(&self, slot: Slot) -> bool {
        self.supported_slots.contains(&slot)
    }

    /// Directory the activator writes into
    pub fn target_dir(&self) -> &Path {
        if self.use_ui_movies {
            &self.ui_movies_dir
        } else {
            &self.override_dir
        }
    }

    /// File Steam reads for `slot`
    pub fn target_path(&self, slot: Slot) -> PathBuf {
        self.target_dir().join(self.video_names.get(slot))
    }
}

fn join_all(root: &Path, parts: &[&str]) -> PathBuf {
    parts.iter().fold(root.to_path_buf(), |path, part| path.join(part))
}

/// Locate the Steam install root
///
/// An explicit override wins. Registry lookup on Windows is not attempted;
/// the common install locations are probed instead.
pub fn discover_steam_root(explicit: Option<PathBuf>) -> Option<PathBuf> {
    if let Some(root) = explicit {
        return Some(root);
    }

    if cfg!(windows) {
        let found = steam::WINDOWS_ROOTS
            .iter()
            .map(PathBuf::from)
            .find(|root| root.exists());
        if found.is_none() {
            warn!(candidates = ?steam::WINDOWS_ROOTS, "No Steam install found in common locations");
        }
        return found;
    }

    let home = dirs::home_dir()?;
    if cfg!(target_os = "macos") {
        Some(home.join(steam::MACOS_ROOT))
    } else {
        Some(home.join(steam::LINUX_ROOT))
    }
}

/// Where this application keeps its own files
#[derive(Debug, Clone)]
pub struct DataPaths {
    pub config_file: PathBuf,
    pub animations: PathBuf,
    pub downloads: PathBuf,
}

impl DataPaths {
    /// Build from explicit base directories
    pub fn new(config_dir: &Path, data_dir: &Path) -> Self {
        Self {
            config_file: config_dir.join(constants::config::FILENAME),
            animations: data_dir.join(constants::config::ANIMATIONS_DIR),
            downloads: data_dir.join(constants::config::DOWNLOADS_DIR),
        }
    }

    /// `<config_dir>/steam-animation-manager` and `<data_dir>/steam-animation-manager`,
    /// each overridable
    pub fn resolve(config_dir: Option<PathBuf>, data_dir: Option<PathBuf>) -> Self {
        let config_dir = config_dir.unwrap_or_else(|| {
            dirs::config_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(constants::config::APP_DIR)
        });
        let data_dir = data_dir.unwrap_or_else(|| {
            dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(constants::config::APP_DIR)
        });
        Self::new(&config_dir, &data_dir)
    }

    /// Downloaded file for a catalog id; callers check `is_plain_name(id)` first
    pub fn download_file(&self, id: &str) -> PathBuf {
        self.downloads.join(format!("{}.{}", id, video::EXTENSION))
    }
}

/// `id` is a single normal path component, safe to use as a file stem
pub fn is_plain_name(id: &str) -> bool {
    if id.contains(['/', '\\']) {
        return false;
    }
    let mut components = Path::new(id).components();
    matches!(components.next(), Some(Component::Normal(_))) && components.next().is_none()
}

/// Move files from the pre-migration layout into the current one
///
/// Only moves when the old path exists and the new one does not.
pub fn migrate_legacy_layout(paths: &DataPaths) {
    let Some(home) = dirs::home_dir() else {
        return;
    };
    let moves = [
        (home.join(constants::legacy::CONFIG), paths.config_file.clone()),
        (home.join(constants::legacy::ANIMATIONS), paths.animations.clone()),
        (home.join(constants::legacy::DOWNLOADS), paths.downloads.clone()),
    ];
    for (old, new) in moves {
        migrate_path(&old, &new);
    }
}

fn migrate_path(old: &Path, new: &Path) {
    if !old.exists() || new.exists() {
        return;
    }
    if let Some(parent) = new.parent() {
        if let Err(e) = std::fs::create_dir_all(parent) {
            warn!(path = %parent.display(), error = %e, "Failed to create directory for migration");
            return;
        }
    }
    match std::fs::rename(old, new) {
        Ok(()) => info!(from = %old.display(), to = %new.display(), "Migrated legacy path"),
        Err(e) => warn!(from = %old.display(), to = %new.display(), error = %e, "Failed to migrate legacy path"),
    }
}
