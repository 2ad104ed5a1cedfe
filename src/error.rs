//! Error taxonomy for catalog fetches, resolution and activation
//!
//! Per-slot failures (`ResolveError`, `ActivationError`) are logged and isolated
//! by the activator. Everything else is wrapped in `anyhow` with context at the
//! operation boundary and reported to the caller.

use std::io;
use std::path::PathBuf;

use crate::types::Slot;

/// Remote fetch failure
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// Retry bound exhausted on retryable statuses
    #[error("retry attempts exceeded, status code: {status}")]
    Transient { status: u16 },

    /// Remote asked us to back off (HTTP 429); never retried
    #[error("rate limit exceeded, try again in a minute")]
    RateLimited,

    /// Transport or body failure that retrying will not fix
    #[error("fetch failed: {0}")]
    Fatal(String),
}

impl FetchError {
    pub fn fatal(msg: impl Into<String>) -> Self {
        Self::Fatal(msg.into())
    }
}

/// Identifier does not resolve to a real file
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("failed to find animation for: {id}")]
    NotFound { id: String },

    /// A pool holds a record for the id but its file is gone
    #[error("animation '{id}' is recorded but missing on disk: {}", path.display())]
    Stale { id: String, path: PathBuf },
}

impl ResolveError {
    pub fn id(&self) -> &str {
        match self {
            ResolveError::NotFound { id } | ResolveError::Stale { id, .. } => id,
        }
    }
}

/// Failure to activate a single slot
#[derive(Debug, thiserror::Error)]
pub enum ActivationError {
    #[error("{slot}: selected animation is unavailable")]
    NotFound {
        slot: Slot,
        #[source]
        source: ResolveError,
    },

    /// Link and copy both failed
    #[error("{slot}: failed to place {} -> {}", from.display(), to.display())]
    Io {
        slot: Slot,
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Selection store persistence failure
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("failed to write config to {}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}
