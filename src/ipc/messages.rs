//! IPC message types for client ↔ daemon communication

use serde::{Deserialize, Serialize};

use crate::config::SettingsUpdate;
use crate::engine::{SlotReport, StateSnapshot};
use crate::types::{AnimationEntry, AnimationSet, CatalogEntry, CustomAnimation};

/// Requests sent from a client to the daemon
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub enum Request {
    /// Full state snapshot
    GetState,

    /// Insert or replace a user-defined set
    SaveCustomSet(AnimationSet),
    RemoveCustomSet(String),

    /// Enable or disable a local or custom set
    EnableSet { id: String, enabled: bool },

    /// Insert or replace a user-registered animation file
    SaveCustomAnimation(CustomAnimation),
    RemoveCustomAnimation(String),

    /// Refetch the remote catalog
    UpdateCatalog,

    /// Last fetched catalog entries
    GetCatalog,
    GetCatalogEntry(String),

    /// Catalog entries not downloaded yet, as animation candidates
    GetAvailable,

    /// Download a catalog animation (no-op if already downloaded)
    Download(String),

    /// Remove a downloaded animation's record and file
    DeleteDownload(String),

    /// Persist settings and re-activate all slots
    SaveSettings(SettingsUpdate),

    /// Reload the config and rescan local animations, then re-activate
    Reload,

    /// Shuffle every slot (`true`) or pick a set (`false`), persist, re-activate
    Randomize { shuffle: bool },

    /// Health check
    Ping,

    /// Request graceful shutdown
    Shutdown,
}

/// Responses sent from the daemon
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub enum Response {
    State(StateSnapshot),
    Catalog(Vec<CatalogEntry>),
    CatalogEntry(Option<CatalogEntry>),
    Animations(Vec<AnimationEntry>),

    /// Per-slot results of a re-activation
    Applied(Vec<SlotReport>),

    /// Acknowledgment that request was processed
    Ready,

    Pong,

    /// Error occurred; carries the full context chain
    Error(String),
}
