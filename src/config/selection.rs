//! Selection store document
//!
//! The single persisted source of truth: slot selections, shuffle settings,
//! user-defined sets and animations, and the list of downloaded records.

use serde::{Deserialize, Serialize};

use crate::types::{AnimationSet, CatalogEntry, CustomAnimation, ShuffleMode, Slot, SlotSelection};

/// Persisted document. Every field has a default so partial or older
/// documents load with the gaps filled in.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(flatten)]
    pub selection: SlotSelection,

    /// Shuffle mode applied at startup (key kept as `randomize` on disk)
    #[serde(default)]
    pub randomize: ShuffleMode,

    /// Set chosen by the last set shuffle
    #[serde(default)]
    pub current_set: String,

    /// Ground truth for which catalog animations are on disk
    #[serde(default)]
    pub downloads: Vec<CatalogEntry>,

    #[serde(default)]
    pub custom_animations: Vec<CustomAnimation>,

    #[serde(default)]
    pub custom_sets: Vec<AnimationSet>,

    /// Animation ids never picked by a full shuffle
    #[serde(default)]
    pub shuffle_exclusions: Vec<String>,

    /// Restrict HTTP to IPv4
    #[serde(default)]
    pub force_ipv4: bool,
}

/// Partial settings update; `None` leaves the stored value untouched
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SettingsUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub boot: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suspend: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub throbber: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub randomize: Option<ShuffleMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_set: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shuffle_exclusions: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub force_ipv4: Option<bool>,
}

impl SettingsUpdate {
    pub fn slot(&self, slot: Slot) -> Option<&String> {
        match slot {
            Slot::Boot => self.boot.as_ref(),
            Slot::Suspend => self.suspend.as_ref(),
            Slot::Throbber => self.throbber.as_ref(),
        }
    }
}

/// Settings portion of the state snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    pub randomize: ShuffleMode,
    pub current_set: String,
    pub boot: String,
    pub suspend: String,
    pub throbber: String,
    pub shuffle_exclusions: Vec<String>,
    pub force_ipv4: bool,
}

impl Config {
    pub fn apply(&mut self, update: SettingsUpdate) {
        for slot in Slot::ALL {
            if let Some(id) = update.slot(slot) {
                self.selection.set(slot, id.clone());
            }
        }
        if let Some(mode) = update.randomize {
            self.randomize = mode;
        }
        if let Some(current_set) = update.current_set {
            self.current_set = current_set;
        }
        if let Some(exclusions) = update.shuffle_exclusions {
            self.shuffle_exclusions = exclusions;
        }
        if let Some(force_ipv4) = update.force_ipv4 {
            self.force_ipv4 = force_ipv4;
        }
    }

    pub fn settings(&self) -> Settings {
        Settings {
            randomize: self.randomize,
            current_set: self.current_set.clone(),
            boot: self.selection.boot.clone(),
            suspend: self.selection.suspend.clone(),
            throbber: self.selection.throbber.clone(),
            shuffle_exclusions: self.shuffle_exclusions.clone(),
            force_ipv4: self.force_ipv4,
        }
    }

    /// Insert or replace a custom set by id
    pub fn upsert_custom_set(&mut self, set: AnimationSet) {
        self.remove_custom_set(&set.id);
        self.custom_sets.push(set);
    }

    pub fn remove_custom_set(&mut self, id: &str) -> bool {
        let before = self.custom_sets.len();
        self.custom_sets.retain(|set| set.id != id);
        self.custom_sets.len() != before
    }

    /// Insert or replace a custom animation by id
    pub fn upsert_custom_animation(&mut self, anim: CustomAnimation) {
        self.remove_custom_animation(&anim.id);
        self.custom_animations.push(anim);
    }

    pub fn remove_custom_animation(&mut self, id: &str) -> bool {
        let before = self.custom_animations.len();
        self.custom_animations.retain(|anim| anim.id != id);
        self.custom_animations.len() != before
    }

    pub fn download(&self, id: &str) -> Option<&CatalogEntry> {
        self.downloads.iter().find(|entry| entry.id == id)
    }

    pub fn is_downloaded(&self, id: &str) -> bool {
        self.download(id).is_some()
    }

    pub fn remove_download(&mut self, id: &str) -> bool {
        let before = self.downloads.len();
        self.downloads.retain(|entry| entry.id != id);
        self.downloads.len() != before
    }
}
