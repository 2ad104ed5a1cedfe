//! Core domain types shared by the scanner, store, resolver and activator

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// One of the three animation roles Steam reads independently
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Slot {
    Boot,
    Suspend,
    Throbber,
}

impl Slot {
    /// Activation order
    pub const ALL: [Slot; 3] = [Slot::Boot, Slot::Suspend, Slot::Throbber];

    /// Candidate pool a slot draws from; the throbber shares the suspend pool
    pub fn target(self) -> Target {
        match self {
            Slot::Boot => Target::Boot,
            Slot::Suspend | Slot::Throbber => Target::Suspend,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Slot::Boot => "boot",
            Slot::Suspend => "suspend",
            Slot::Throbber => "throbber",
        }
    }

    /// Display label suffix used for non-boot local entries ("Suspend", "Throbber")
    fn title(self) -> &'static str {
        match self {
            Slot::Boot => "Boot",
            Slot::Suspend => "Suspend",
            Slot::Throbber => "Throbber",
        }
    }

    /// Name shown for a local animation found in `directory` for this slot
    pub fn entry_name(self, directory: &str) -> String {
        match self {
            Slot::Boot => directory.to_string(),
            _ => format!("{} - {}", directory, self.title()),
        }
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Animation pool an entry belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Target {
    Boot,
    Suspend,
}

/// How slots are re-picked on startup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum ShuffleMode {
    #[default]
    Off,
    /// Pick one enabled set and apply all of its slots
    Set,
    /// Pick every slot independently
    All,
}

impl ShuffleMode {
    fn as_str(self) -> &'static str {
        match self {
            ShuffleMode::Off => "",
            ShuffleMode::Set => "set",
            ShuffleMode::All => "all",
        }
    }
}

impl Serialize for ShuffleMode {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

/// Accepts the current string form and the older boolean form (read as `Off`)
impl<'de> Deserialize<'de> for ShuffleMode {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum BoolOrString {
            Bool(bool),
            String(String),
        }

        match BoolOrString::deserialize(deserializer)? {
            BoolOrString::Bool(_) => Ok(ShuffleMode::Off),
            BoolOrString::String(s) => match s.as_str() {
                "" => Ok(ShuffleMode::Off),
                "set" => Ok(ShuffleMode::Set),
                "all" => Ok(ShuffleMode::All),
                other => Err(serde::de::Error::unknown_variant(other, &["", "set", "all"])),
            },
        }
    }
}

/// Animation identifier chosen per slot; empty means vendor default
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotSelection {
    #[serde(default)]
    pub boot: String,
    #[serde(default)]
    pub suspend: String,
    #[serde(default)]
    pub throbber: String,
}

impl SlotSelection {
    pub fn get(&self, slot: Slot) -> &str {
        match slot {
            Slot::Boot => &self.boot,
            Slot::Suspend => &self.suspend,
            Slot::Throbber => &self.throbber,
        }
    }

    pub fn set(&mut self, slot: Slot, id: impl Into<String>) {
        let id = id.into();
        match slot {
            Slot::Boot => self.boot = id,
            Slot::Suspend => self.suspend = id,
            Slot::Throbber => self.throbber = id,
        }
    }
}

fn default_enabled() -> bool {
    true
}

/// A bundle of one filename per slot, discovered on disk or defined by the user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnimationSet {
    pub id: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub boot: String,
    #[serde(default)]
    pub suspend: String,
    #[serde(default)]
    pub throbber: String,
}

impl AnimationSet {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            enabled: true,
            boot: String::new(),
            suspend: String::new(),
            throbber: String::new(),
        }
    }

    /// Filename configured for `slot`, if any
    pub fn filename(&self, slot: Slot) -> Option<&str> {
        let name = match slot {
            Slot::Boot => &self.boot,
            Slot::Suspend => &self.suspend,
            Slot::Throbber => &self.throbber,
        };
        (!name.is_empty()).then_some(name.as_str())
    }

    pub fn set_filename(&mut self, slot: Slot, filename: impl Into<String>) {
        let filename = filename.into();
        match slot {
            Slot::Boot => self.boot = filename,
            Slot::Suspend => self.suspend = filename,
            Slot::Throbber => self.throbber = filename,
        }
    }

    pub fn is_empty(&self) -> bool {
        Slot::ALL.iter().all(|slot| self.filename(*slot).is_none())
    }
}

/// User-registered animation file living anywhere on disk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomAnimation {
    pub id: String,
    pub name: String,
    pub path: PathBuf,
    pub target: Target,
}

/// Remote catalog entry; also the persisted record of a downloaded animation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub preview_image: String,
    #[serde(default)]
    pub preview_video: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub last_changed: String,
    #[serde(default)]
    pub source: String,
    pub download_url: String,
    #[serde(default)]
    pub likes: u64,
    #[serde(default)]
    pub downloads: u64,
    #[serde(default)]
    pub version: String,
    pub target: Target,
    #[serde(default)]
    pub manifest_version: u32,
}

/// Where an animation candidate comes from, with its source-specific locator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Source {
    /// Relative to the animations root
    Local { relative_path: PathBuf },
    Downloaded { download_url: String },
    Custom { path: PathBuf },
    Catalog { download_url: String },
}

/// A candidate animation from any pool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnimationEntry {
    pub id: String,
    pub name: String,
    pub target: Target,
    pub source: Source,
}

impl From<&CustomAnimation> for AnimationEntry {
    fn from(anim: &CustomAnimation) -> Self {
        Self {
            id: anim.id.clone(),
            name: anim.name.clone(),
            target: anim.target,
            source: Source::Custom { path: anim.path.clone() },
        }
    }
}

impl AnimationEntry {
    /// View of a persisted download record
    pub fn downloaded(entry: &CatalogEntry) -> Self {
        Self {
            id: entry.id.clone(),
            name: entry.name.clone(),
            target: entry.target,
            source: Source::Downloaded { download_url: entry.download_url.clone() },
        }
    }

    /// View of a catalog entry that has not been fetched
    pub fn catalog(entry: &CatalogEntry) -> Self {
        Self {
            id: entry.id.clone(),
            name: entry.name.clone(),
            target: entry.target,
            source: Source::Catalog { download_url: entry.download_url.clone() },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_throbber_shares_suspend_pool() {
        assert_eq!(Slot::Boot.target(), Target::Boot);
        assert_eq!(Slot::Suspend.target(), Target::Suspend);
        assert_eq!(Slot::Throbber.target(), Target::Suspend);
    }

    #[test]
    fn test_entry_name() {
        assert_eq!(Slot::Boot.entry_name("Retro"), "Retro");
        assert_eq!(Slot::Throbber.entry_name("Retro"), "Retro - Throbber");
    }

    #[test]
    fn test_shuffle_mode_accepts_legacy_bool() {
        let mode: ShuffleMode = serde_json::from_str("true").unwrap();
        assert_eq!(mode, ShuffleMode::Off);
        let mode: ShuffleMode = serde_json::from_str("\"all\"").unwrap();
        assert_eq!(mode, ShuffleMode::All);
        assert!(serde_json::from_str::<ShuffleMode>("\"sometimes\"").is_err());
        assert_eq!(serde_json::to_string(&ShuffleMode::Set).unwrap(), "\"set\"");
        assert_eq!(serde_json::to_string(&ShuffleMode::Off).unwrap(), "\"\"");
    }

    #[test]
    fn test_set_defaults_enabled_when_missing() {
        let set: AnimationSet = serde_json::from_str(r#"{"id": "Retro", "boot": "a.webm"}"#).unwrap();
        assert!(set.enabled);
        assert_eq!(set.filename(Slot::Boot), Some("a.webm"));
        assert_eq!(set.filename(Slot::Suspend), None);
        assert!(!set.is_empty());
        assert!(AnimationSet::new("empty").is_empty());
    }
}
