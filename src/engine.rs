//! Animation engine context
//!
//! Owns every mutable collection: the selection store document, the latest
//! local scan, and the injected platform capabilities. Callers serialize
//! access (the daemon holds it behind one mutex).

use anyhow::{Context, Result, bail};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use tracing::{debug, error, info, warn};

use crate::activation::{Activator, Filesystem, Outcome};
use crate::config::{Config, ConfigStore, LoadOutcome, SetConfig, Settings, SettingsUpdate};
use crate::constants::video::EXTENSION;
use crate::platform::{self, Capabilities, DataPaths};
use crate::randomizer;
use crate::resolver::Resolver;
use crate::scanner::{self, LocalScan};
use crate::types::{AnimationEntry, AnimationSet, CatalogEntry, CustomAnimation, ShuffleMode, Slot};

/// Full state served to the UI layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateSnapshot {
    pub local_animations: Vec<AnimationEntry>,
    pub custom_animations: Vec<CustomAnimation>,
    pub downloaded_animations: Vec<CatalogEntry>,
    pub local_sets: Vec<AnimationSet>,
    pub custom_sets: Vec<AnimationSet>,
    pub settings: Settings,
}

/// Per-slot activation result, as reported to callers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotReport {
    pub slot: Slot,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// How the selection store came up
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigStatus {
    Loaded,
    /// Defaults were created; download records need regenerating and a save
    Fresh,
}

pub struct Engine<S: ConfigStore, F: Filesystem> {
    paths: DataPaths,
    caps: Capabilities,
    store: S,
    fs: F,
    config: Config,
    local: LocalScan,
}

impl<S: ConfigStore, F: Filesystem> Engine<S, F> {
    pub fn new(paths: DataPaths, caps: Capabilities, store: S, fs: F) -> Self {
        Self {
            paths,
            caps,
            store,
            fs,
            config: Config::default(),
            local: LocalScan::default(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn paths(&self) -> &DataPaths {
        &self.paths
    }

    pub fn capabilities(&self) -> &Capabilities {
        &self.caps
    }

    pub fn create_directories(&self) -> Result<()> {
        let mut dirs = vec![self.paths.animations.as_path(), self.paths.downloads.as_path()];
        if let Some(parent) = self.paths.config_file.parent() {
            dirs.push(parent);
        }
        if !self.caps.use_ui_movies {
            dirs.push(self.caps.override_dir.as_path());
        }
        for dir in dirs {
            fs::create_dir_all(dir).with_context(|| format!("Failed to create directory {}", dir.display()))?;
        }
        info!("Directories created");
        Ok(())
    }

    /// Read the selection store, falling back to defaults when missing or corrupt
    pub fn load_config(&mut self) -> ConfigStatus {
        match self.store.load() {
            LoadOutcome::Loaded(config) => {
                self.config = config;
                ConfigStatus::Loaded
            }
            LoadOutcome::Missing => {
                info!("No config found, starting from defaults");
                self.config = Config::default();
                ConfigStatus::Fresh
            }
            LoadOutcome::Corrupt(reason) => {
                warn!(reason = %reason, "Config unreadable, regenerating defaults");
                self.config = Config::default();
                ConfigStatus::Fresh
            }
        }
    }

    /// Rebuild download records from files in the downloads directory
    ///
    /// Files whose id is absent from `catalog` are logged and left unrecorded.
    pub fn regenerate_downloads(&mut self, catalog: &[CatalogEntry]) -> Result<usize> {
        let mut files: Vec<String> = Vec::new();
        for entry in fs::read_dir(&self.paths.downloads)
            .with_context(|| format!("Failed to read {}", self.paths.downloads.display()))?
        {
            let path = entry?.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) {
                files.push(stem.to_string());
            }
        }
        files.sort();

        let mut downloads = Vec::new();
        for id in files {
            match catalog.iter().find(|entry| entry.id == id) {
                Some(entry) => downloads.push(entry.clone()),
                None => warn!(id = %id, "Failed to find cached entry for downloaded file"),
            }
        }
        let count = downloads.len();
        self.config.downloads = downloads;
        info!(count, "Regenerated download records");
        Ok(count)
    }

    pub fn save(&self) -> Result<()> {
        self.store.save(&self.config).context("Failed to save config")
    }

    pub fn scan(&mut self) -> Result<()> {
        self.local = scanner::scan(&self.paths.animations, &self.caps.video_names)?;
        Ok(())
    }

    pub fn resolver(&self) -> Resolver<'_> {
        Resolver::new(&self.config, &self.local, &self.paths)
    }

    /// Activate all three slots from the stored selection
    pub fn activate_all(&self) -> Vec<SlotReport> {
        let resolver = self.resolver();
        Activator::new(&self.caps, &self.fs)
            .activate_all(&self.config.selection, &resolver)
            .into_iter()
            .map(|(slot, result)| match result {
                Ok(outcome) => SlotReport {
                    slot,
                    outcome: Some(outcome_label(outcome).to_string()),
                    error: None,
                },
                Err(e) => {
                    let message = format!("{:#}", anyhow::Error::new(e));
                    error!(slot = %slot, error = %message, "Failed to apply animation");
                    SlotReport {
                        slot,
                        outcome: None,
                        error: Some(message),
                    }
                }
            })
            .collect()
    }

    pub fn state(&self) -> StateSnapshot {
        StateSnapshot {
            local_animations: self.local.animations.clone(),
            custom_animations: self.config.custom_animations.clone(),
            downloaded_animations: self.config.downloads.clone(),
            local_sets: self.local.sets.clone(),
            custom_sets: self.config.custom_sets.clone(),
            settings: self.config.settings(),
        }
    }

    /// Candidates from every pool: local, downloaded, custom
    pub fn all_animations(&self) -> Vec<AnimationEntry> {
        self.local
            .animations
            .iter()
            .cloned()
            .chain(self.config.downloads.iter().map(AnimationEntry::downloaded))
            .chain(self.config.custom_animations.iter().map(AnimationEntry::from))
            .collect()
    }

    pub fn save_custom_set(&mut self, set: AnimationSet) -> Result<()> {
        info!(set = %set.id, "Saving custom set");
        self.config.upsert_custom_set(set);
        self.save()
    }

    pub fn remove_custom_set(&mut self, id: &str) -> Result<()> {
        if !self.config.remove_custom_set(id) {
            debug!(set = %id, "No custom set to remove");
        }
        self.save()
    }

    /// Local sets persist the flag in their directory marker, custom sets in
    /// the selection store
    pub fn enable_set(&mut self, id: &str, enabled: bool) -> Result<()> {
        if let Some(set) = self.local.sets.iter_mut().find(|set| set.id == id) {
            set.enabled = enabled;
            let dir = self.paths.animations.join(&set.id);
            SetConfig::from_set(set)
                .write(&dir)
                .with_context(|| format!("Failed to persist enabled flag for local set '{id}'"))?;
            info!(set = %id, enabled, "Updated local set");
            return Ok(());
        }

        if let Some(set) = self.config.custom_sets.iter_mut().find(|set| set.id == id) {
            set.enabled = enabled;
            info!(set = %id, enabled, "Updated custom set");
            return self.save();
        }

        bail!("Unknown set: {id}")
    }

    pub fn save_custom_animation(&mut self, anim: CustomAnimation) -> Result<()> {
        info!(animation = %anim.id, path = %anim.path.display(), "Saving custom animation");
        self.config.upsert_custom_animation(anim);
        self.save()
    }

    pub fn remove_custom_animation(&mut self, id: &str) -> Result<()> {
        if !self.config.remove_custom_animation(id) {
            debug!(animation = %id, "No custom animation to remove");
        }
        self.save()
    }

    /// Catalog entry still to be fetched for `id`; `None` if already downloaded
    pub fn pending_download(&self, id: &str, catalog: &[CatalogEntry]) -> Result<Option<CatalogEntry>> {
        if !platform::is_plain_name(id) {
            bail!("Invalid animation id: {id:?}");
        }
        if self.config.is_downloaded(id) {
            debug!(id, "Animation already downloaded");
            return Ok(None);
        }
        match catalog.iter().find(|entry| entry.id == id) {
            Some(entry) => Ok(Some(entry.clone())),
            None => bail!("Failed to find cached animation with id: {id}"),
        }
    }

    /// Record a completed download
    pub fn record_download(&mut self, entry: CatalogEntry) -> Result<()> {
        if !self.config.is_downloaded(&entry.id) {
            self.config.downloads.push(entry);
        }
        self.save()
    }

    /// Drop the record, then the file; ids without a record are refused
    pub fn delete_download(&mut self, id: &str) -> Result<()> {
        if !platform::is_plain_name(id) {
            bail!("Invalid animation id: {id:?}");
        }
        if !self.config.remove_download(id) {
            bail!("No downloaded animation with id: {id}");
        }
        self.save()?;
        let file = self.paths.download_file(id);
        match fs::remove_file(&file) {
            Ok(()) => info!(id, path = %file.display(), "Deleted animation"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e).with_context(|| format!("Failed to delete {}", file.display())),
        }
        Ok(())
    }

    /// Persist a settings update and re-activate every slot
    pub fn save_settings(&mut self, update: SettingsUpdate) -> Result<Vec<SlotReport>> {
        self.config.apply(update);
        self.save()?;
        Ok(self.activate_all())
    }

    /// Re-pick slots in memory according to `mode`
    pub fn shuffle<R: Rng + ?Sized>(&mut self, mode: ShuffleMode, rng: &mut R) {
        match mode {
            ShuffleMode::Off => {}
            ShuffleMode::All => {
                let animations = self.all_animations();
                self.config.selection = randomizer::randomize_all(&animations, &self.config.shuffle_exclusions, rng);
                self.config.current_set.clear();
                info!(selection = ?self.config.selection, "Shuffled all slots");
            }
            ShuffleMode::Set => {
                let sets = self.local.sets.iter().chain(self.config.custom_sets.iter());
                match randomizer::randomize_set(sets, rng) {
                    Some(pick) => {
                        info!(set = %pick.set_id, "Shuffled to set");
                        self.config.selection = pick.selection;
                        self.config.current_set = pick.set_id;
                    }
                    None => info!("No enabled sets, keeping current selection"),
                }
            }
        }
    }

    /// Shuffle, persist and re-activate
    pub fn randomize<R: Rng + ?Sized>(&mut self, shuffle_all: bool, rng: &mut R) -> Result<Vec<SlotReport>> {
        let mode = if shuffle_all { ShuffleMode::All } else { ShuffleMode::Set };
        self.shuffle(mode, rng);
        self.save()?;
        Ok(self.activate_all())
    }
}

fn outcome_label(outcome: Outcome) -> &'static str {
    match outcome {
        Outcome::Skipped => "skipped",
        Outcome::Cleared => "cleared",
        Outcome::Restored => "restored",
        Outcome::Linked => "linked",
        Outcome::Copied => "copied",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activation::StdFilesystem;
    use crate::config::JsonFileStore;
    use crate::error::ResolveError;
    use crate::test_support::catalog_entry;
    use crate::types::Target;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::path::PathBuf;

    struct Fixture {
        _dir: tempfile::TempDir,
        engine: Engine<JsonFileStore, StdFilesystem>,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let paths = DataPaths::new(&dir.path().join("config"), &dir.path().join("data"));
        let caps = Capabilities::deck(&dir.path().join("steam"));
        let store = JsonFileStore::new(&paths.config_file);
        let engine = Engine::new(paths, caps, store, StdFilesystem);
        engine.create_directories().unwrap();

        let retro = engine.paths().animations.join("Retro");
        fs::create_dir_all(&retro).unwrap();
        fs::write(retro.join("deck_startup.webm"), b"retro boot").unwrap();
        fs::write(retro.join("steam_os_suspend.webm"), b"retro suspend").unwrap();

        let mut f = Fixture { _dir: dir, engine };
        assert_eq!(f.engine.load_config(), ConfigStatus::Fresh);
        f.engine.scan().unwrap();
        f
    }

    fn reload_store(engine: &Engine<JsonFileStore, StdFilesystem>) -> Config {
        match JsonFileStore::new(&engine.paths().config_file).load() {
            LoadOutcome::Loaded(config) => config,
            other => panic!("unexpected load outcome: {other:?}"),
        }
    }

    #[test]
    fn test_enable_local_set_writes_marker() {
        let mut f = fixture();
        f.engine.enable_set("Retro", false).unwrap();

        let marker = SetConfig::read(&f.engine.paths().animations.join("Retro")).unwrap().unwrap();
        assert_eq!(marker.enabled, Some(false));
        // survives a rescan
        f.engine.scan().unwrap();
        assert!(!f.engine.state().local_sets[0].enabled);
        // the central store is not involved
        assert!(!f.engine.paths().config_file.exists());
    }

    #[test]
    fn test_enable_custom_set_writes_store() {
        let mut f = fixture();
        let mut set = AnimationSet::new("mine");
        set.boot = "a.webm".to_string();
        f.engine.save_custom_set(set).unwrap();

        f.engine.enable_set("mine", false).unwrap();
        assert!(!reload_store(&f.engine).custom_sets[0].enabled);
        assert!(f.engine.enable_set("ghost", true).is_err());
    }

    #[test]
    fn test_delete_download_removes_record_and_file() {
        let mut f = fixture();
        let entry = catalog_entry("dl1", Target::Boot);
        let file = f.engine.paths().download_file("dl1");
        fs::write(&file, b"downloaded").unwrap();
        f.engine.record_download(entry).unwrap();
        assert!(f.engine.resolver().resolve("dl1").is_ok());

        f.engine.delete_download("dl1").unwrap();
        assert!(!file.exists());
        assert!(reload_store(&f.engine).downloads.is_empty());
        assert!(matches!(
            f.engine.resolver().resolve("dl1").unwrap_err(),
            ResolveError::NotFound { .. }
        ));
    }

    #[test]
    fn test_delete_download_refuses_unrecorded_ids() {
        let mut f = fixture();
        let local = f.engine.paths().animations.join("Retro/deck_startup.webm");
        assert!(f.engine.delete_download("../animations/Retro/deck_startup").is_err());
        assert!(local.exists());

        let orphan = f.engine.paths().download_file("orphan");
        fs::write(&orphan, b"x").unwrap();
        assert!(f.engine.delete_download("orphan").is_err());
        assert!(orphan.exists());
    }

    #[test]
    fn test_pending_download_rejects_path_ids() {
        let f = fixture();
        let catalog = vec![catalog_entry("../escape", Target::Boot)];
        assert!(f.engine.pending_download("../escape", &catalog).is_err());
    }

    #[test]
    fn test_pending_download() {
        let mut f = fixture();
        let catalog = vec![catalog_entry("a", Target::Boot)];
        assert!(f.engine.pending_download("a", &catalog).unwrap().is_some());
        assert!(f.engine.pending_download("missing", &catalog).is_err());

        f.engine.record_download(catalog[0].clone()).unwrap();
        assert!(f.engine.pending_download("a", &catalog).unwrap().is_none());
    }

    #[test]
    fn test_regenerate_downloads_matches_catalog() {
        let mut f = fixture();
        let downloads = f.engine.paths().downloads.clone();
        fs::write(downloads.join("known.webm"), b"x").unwrap();
        fs::write(downloads.join("orphan.webm"), b"x").unwrap();
        fs::write(downloads.join("notes.txt"), b"x").unwrap();

        let catalog = vec![catalog_entry("known", Target::Suspend)];
        assert_eq!(f.engine.regenerate_downloads(&catalog).unwrap(), 1);
        assert_eq!(f.engine.config().downloads[0].id, "known");
    }

    #[test]
    fn test_save_settings_persists_and_activates() {
        let mut f = fixture();
        let reports = f
            .engine
            .save_settings(SettingsUpdate {
                boot: Some("Retro/deck_startup.webm".to_string()),
                throbber: Some("nowhere".to_string()),
                ..Default::default()
            })
            .unwrap();

        assert_eq!(reports[0].outcome.as_deref(), Some("linked"));
        assert_eq!(reports[1].outcome.as_deref(), Some("cleared"));
        let message = reports[2].error.as_deref().unwrap();
        assert!(message.starts_with("throbber: "), "{message}");
        assert_eq!(message.matches("nowhere").count(), 1);
        assert_eq!(reload_store(&f.engine).selection.boot, "Retro/deck_startup.webm");
        let target = f.engine.capabilities().target_path(Slot::Boot);
        assert_eq!(fs::read(target).unwrap(), b"retro boot");
    }

    #[test]
    fn test_randomize_set_records_current_set() {
        let mut f = fixture();
        let mut rng = StdRng::seed_from_u64(3);
        f.engine.randomize(false, &mut rng).unwrap();

        let config = f.engine.config();
        assert_eq!(config.current_set, "Retro");
        assert_eq!(config.selection.boot, "Retro/deck_startup.webm");
        assert_eq!(config.selection.suspend, "Retro/steam_os_suspend.webm");
        assert_eq!(config.selection.throbber, "");
    }

    #[test]
    fn test_randomize_set_without_enabled_sets_keeps_selection() {
        let mut f = fixture();
        f.engine.enable_set("Retro", false).unwrap();
        f.engine
            .save_settings(SettingsUpdate {
                boot: Some("Retro/deck_startup.webm".to_string()),
                ..Default::default()
            })
            .unwrap();

        let mut rng = StdRng::seed_from_u64(3);
        f.engine.randomize(false, &mut rng).unwrap();
        assert_eq!(f.engine.config().selection.boot, "Retro/deck_startup.webm");
    }

    #[test]
    fn test_randomize_all_draws_from_every_pool() {
        let mut f = fixture();
        let custom = PathBuf::from("/nonexistent/custom.webm");
        f.engine
            .save_custom_animation(CustomAnimation {
                id: "custom".to_string(),
                name: "Custom".to_string(),
                path: custom,
                target: Target::Boot,
            })
            .unwrap();
        f.engine
            .save_settings(SettingsUpdate {
                shuffle_exclusions: Some(vec!["Retro/deck_startup.webm".to_string()]),
                current_set: Some("Retro".to_string()),
                ..Default::default()
            })
            .unwrap();

        let mut rng = StdRng::seed_from_u64(9);
        let reports = f.engine.randomize(true, &mut rng).unwrap();
        let config = f.engine.config();
        assert_eq!(config.selection.boot, "custom");
        assert_eq!(config.selection.suspend, "Retro/steam_os_suspend.webm");
        assert_eq!(config.current_set, "");
        // custom file does not exist, only that slot fails
        assert!(reports[0].error.is_some());
        assert!(reports[1].error.is_none());
    }

    #[test]
    fn test_corrupt_store_starts_fresh() {
        let mut f = fixture();
        fs::write(&f.engine.paths().config_file, "[1, 2").unwrap();
        assert_eq!(f.engine.load_config(), ConfigStatus::Fresh);
        assert_eq!(f.engine.config(), &Config::default());
    }
}
