//! Configuration management
//!
//! - **selection**: the persisted selection store document
//! - **store**: load/save of that document (JSON, atomic replace)
//! - **set_config**: per-directory marker files for local sets

pub mod selection;
pub mod set_config;
pub mod store;

pub use selection::{Config, Settings, SettingsUpdate};
pub use set_config::SetConfig;
pub use store::{ConfigStore, JsonFileStore, LoadOutcome};
