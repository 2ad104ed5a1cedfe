//! Daemon - owns the engine and serves CLI clients over IPC

mod ipc_handler;

use anyhow::{Context, Result};
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::MutexGuard;
use tokio::time::{interval, sleep};
use tracing::{debug, error, info, warn};

use crate::activation::{Filesystem, StdFilesystem};
use crate::catalog::{CatalogCache, HttpTransports, TransportPool};
use crate::config::{ConfigStore, JsonFileStore};
use crate::constants::daemon::{SHUTDOWN_POLL_INTERVAL, STARTUP_REFRESH_DELAY};
use crate::engine::{ConfigStatus, Engine, SlotReport};
use crate::ipc::{self, Server};
use crate::platform::{self, Capabilities, DataPaths};
use crate::types::ShuffleMode;

/// Everything the daemon needs to start
pub struct DaemonOptions {
    pub paths: DataPaths,
    pub caps: Capabilities,
    pub socket: PathBuf,
    pub catalog_url: String,
}

/// State shared between connection tasks
///
/// The engine mutex serializes every mutation. The catalog snapshot lives
/// outside it so listing queries never wait on a slow activation.
pub struct Shared<S: ConfigStore, F: Filesystem, P: TransportPool> {
    engine: tokio::sync::Mutex<Engine<S, F>>,
    catalog: CatalogCache,
    transports: P,
    catalog_url: String,
    in_flight: Mutex<HashSet<String>>,
    shutdown: Arc<AtomicBool>,
}

/// Marks a download id as busy until dropped
pub struct InFlight<'a> {
    set: &'a Mutex<HashSet<String>>,
    id: String,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.set.lock().unwrap_or_else(PoisonError::into_inner).remove(&self.id);
    }
}

impl<S, F, P> Shared<S, F, P>
where
    S: ConfigStore,
    F: Filesystem,
    P: TransportPool,
{
    pub fn new(engine: Engine<S, F>, transports: P, catalog_url: String, shutdown: Arc<AtomicBool>) -> Self {
        Self {
            engine: tokio::sync::Mutex::new(engine),
            catalog: CatalogCache::new(),
            transports,
            catalog_url,
            in_flight: Mutex::new(HashSet::new()),
            shutdown,
        }
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    pub fn request_shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }

    /// Reserve `id` for a download or delete; fails if another is running
    fn claim(&self, id: &str) -> Result<InFlight<'_>> {
        let mut set = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        if !set.insert(id.to_string()) {
            anyhow::bail!("Download already in progress: {id}");
        }
        Ok(InFlight {
            set: &self.in_flight,
            id: id.to_string(),
        })
    }

    async fn refresh_catalog(&self, force_ipv4: bool) -> Result<usize> {
        let entries = self
            .catalog
            .refresh(self.transports.select(force_ipv4), &self.catalog_url)
            .await
            .context("Failed to update animation catalog")?;
        Ok(entries.len())
    }

    /// Load config and local animations, returning the engine still locked
    ///
    /// A fresh store rebuilds its download records against the catalog; that
    /// fetch runs with the lock released.
    async fn load(&self) -> Result<MutexGuard<'_, Engine<S, F>>> {
        let mut engine = self.engine.lock().await;
        if engine.load_config() == ConfigStatus::Fresh {
            if self.catalog.is_empty() {
                let force_ipv4 = engine.config().force_ipv4;
                drop(engine);
                if let Err(e) = self.refresh_catalog(force_ipv4).await {
                    warn!(error = %format!("{e:#}"), "Catalog unavailable, downloads not recovered");
                }
                engine = self.engine.lock().await;
            }
            let snapshot = self.catalog.snapshot();
            if let Err(e) = engine.regenerate_downloads(&snapshot) {
                warn!(error = %format!("{e:#}"), "Failed to regenerate download records");
            }
            if let Err(e) = engine.save() {
                error!(error = %format!("{e:#}"), "Failed to save new config");
            }
        }
        engine.scan().context("Failed to load local animations")?;
        Ok(engine)
    }

    /// Load, scan, apply the startup shuffle and activate every slot
    pub async fn startup(&self) -> Result<Vec<SlotReport>> {
        let mut engine = self.load().await?;

        let mode = engine.config().randomize;
        if mode != ShuffleMode::Off {
            engine.shuffle(mode, &mut StdRng::from_entropy());
            if let Err(e) = engine.save() {
                warn!(error = %format!("{e:#}"), "Failed to persist startup shuffle");
            }
        }

        let reports = engine.activate_all();
        info!("Initialized");
        Ok(reports)
    }

    /// Re-read everything from disk, then re-activate
    pub async fn reload(&self) -> Result<Vec<SlotReport>> {
        Ok(self.load().await?.activate_all())
    }

    async fn delayed_refresh(&self) {
        sleep(STARTUP_REFRESH_DELAY).await;
        if self.is_shutting_down() {
            return;
        }
        let force_ipv4 = self.engine.lock().await.config().force_ipv4;
        match self.refresh_catalog(force_ipv4).await {
            Ok(count) => debug!(count, "Startup catalog refresh complete"),
            Err(e) => warn!(error = %format!("{e:#}"), "Startup catalog refresh failed"),
        }
    }
}

/// Run the daemon until a signal or a `Shutdown` request arrives
pub async fn run(options: DaemonOptions) -> Result<()> {
    info!(
        platform = std::env::consts::OS,
        override_dir = %options.caps.override_dir.display(),
        ui_movies = options.caps.use_ui_movies,
        "Starting animation daemon"
    );

    platform::migrate_legacy_layout(&options.paths);
    let store = JsonFileStore::new(&options.paths.config_file);
    let engine = Engine::new(options.paths, options.caps, store, StdFilesystem);
    engine.create_directories()?;

    let shutdown = Arc::new(AtomicBool::new(false));
    register_signals(&shutdown)?;

    let transports = HttpTransports::new()?;
    let shared = Arc::new(Shared::new(engine, transports, options.catalog_url, shutdown));

    for report in shared.startup().await? {
        if let Some(e) = &report.error {
            warn!(slot = %report.slot, error = %e, "Slot not applied at startup");
        }
    }

    let server = Server::bind_to(options.socket)?;

    let refresher = Arc::clone(&shared);
    tokio::spawn(async move { refresher.delayed_refresh().await });

    serve(server, shared).await;
    info!("Daemon stopped");
    Ok(())
}

#[cfg(unix)]
fn register_signals(flag: &Arc<AtomicBool>) -> Result<()> {
    use signal_hook::consts::{SIGINT, SIGTERM};
    signal_hook::flag::register(SIGTERM, Arc::clone(flag)).context("Failed to register SIGTERM handler")?;
    signal_hook::flag::register(SIGINT, Arc::clone(flag)).context("Failed to register SIGINT handler")?;
    Ok(())
}

/// Ctrl-C is the only shutdown signal outside Unix
#[cfg(not(unix))]
fn register_signals(flag: &Arc<AtomicBool>) -> Result<()> {
    let flag = Arc::clone(flag);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => flag.store(true, Ordering::SeqCst),
            Err(e) => warn!(error = %e, "Failed to listen for Ctrl-C"),
        }
    });
    Ok(())
}

async fn serve<S, F, P>(mut server: Server, shared: Arc<Shared<S, F, P>>)
where
    S: ConfigStore + Send + Sync + 'static,
    F: Filesystem + Send + Sync + 'static,
    P: TransportPool + 'static,
{
    info!(socket = %server.path().display(), "IPC listener started");
    let mut tick = interval(SHUTDOWN_POLL_INTERVAL);

    loop {
        tokio::select! {
            accepted = server.accept() => match accepted {
                Ok(mut stream) => {
                    let shared = Arc::clone(&shared);
                    tokio::spawn(async move {
                        if let Err(e) = serve_connection(&mut stream, &shared).await {
                            warn!(error = %format!("{e:#}"), "IPC connection closed with error");
                        }
                    });
                }
                Err(e) => warn!(error = %format!("{e:#}"), "Failed to accept IPC connection"),
            },
            _ = tick.tick() => {
                if shared.is_shutting_down() {
                    info!("Shutdown requested");
                    break;
                }
            }
        }
    }
}

async fn serve_connection<S, F, P>(stream: &mut ipc::Stream, shared: &Shared<S, F, P>) -> Result<()>
where
    S: ConfigStore,
    F: Filesystem,
    P: TransportPool,
{
    debug!("Client connected");
    while let Some(request) = ipc::read_message(stream).await? {
        let response = ipc_handler::handle(shared, request).await;
        ipc::write_message(stream, &response).await?;
    }
    debug!("Client disconnected");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::testing::{ScriptedTransport, posts_body};
    use std::fs;
    use std::time::Duration;

    pub(super) type TestShared = Shared<JsonFileStore, StdFilesystem, ScriptedTransport>;

    pub(super) struct Fixture {
        pub dir: tempfile::TempDir,
        pub shared: TestShared,
    }

    pub(super) fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let paths = DataPaths::new(&dir.path().join("config"), &dir.path().join("data"));
        let caps = Capabilities::deck(&dir.path().join("steam"));
        let store = JsonFileStore::new(&paths.config_file);
        let engine = Engine::new(paths, caps, store, StdFilesystem);
        engine.create_directories().unwrap();
        let shared = Shared::new(
            engine,
            ScriptedTransport::default(),
            "https://example.invalid/posts".to_string(),
            Arc::new(AtomicBool::new(false)),
        );
        Fixture { dir, shared }
    }

    #[tokio::test]
    async fn test_fresh_startup_recovers_downloads_from_disk() {
        let f = fixture();
        let downloads = f.dir.path().join("data/downloads");
        fs::write(downloads.join("boot1.webm"), b"x").unwrap();
        fs::write(downloads.join("unknown.webm"), b"x").unwrap();
        f.shared.transports.push_json(200, posts_body());

        f.shared.startup().await.unwrap();

        let engine = f.shared.engine.lock().await;
        let ids: Vec<_> = engine.config().downloads.iter().map(|entry| entry.id.as_str()).collect();
        assert_eq!(ids, ["boot1"]);
        assert!(engine.paths().config_file.exists());
    }

    #[tokio::test]
    async fn test_fresh_startup_survives_catalog_outage() {
        let f = fixture();
        f.shared.transports.push_json(429, serde_json::Value::Null);

        let reports = f.shared.startup().await.unwrap();
        assert_eq!(reports.len(), 3);
        assert!(f.shared.engine.lock().await.paths().config_file.exists());
        assert_eq!(f.shared.transports.call_count(), 1);
    }

    #[tokio::test]
    async fn test_existing_config_skips_catalog() {
        let f = fixture();
        let config_file = f.dir.path().join("config/config.json");
        fs::write(&config_file, r#"{"boot": "", "randomize": "all"}"#).unwrap();

        f.shared.startup().await.unwrap();
        assert_eq!(f.shared.transports.call_count(), 0);
    }

    #[tokio::test]
    async fn test_reload_without_config_does_not_block_state() {
        let f = fixture();
        f.shared.transports.push_json(200, posts_body());
        let held = f.shared.transports.gate.lock().await;

        let reload = f.shared.reload();
        let query = async {
            // let the reload reach the catalog fetch
            while f.shared.transports.call_count() == 0 {
                tokio::task::yield_now().await;
            }
            let state = tokio::time::timeout(Duration::from_secs(5), async {
                f.shared.engine.lock().await.state()
            })
            .await;
            drop(held);
            state
        };
        let (reports, state) = tokio::join!(reload, query);
        assert!(state.is_ok(), "state query waited on the catalog fetch");
        assert_eq!(reports.unwrap().len(), 3);
        assert_eq!(f.shared.catalog.snapshot().len(), 2);
    }

    #[test]
    fn test_claim_is_exclusive_until_dropped() {
        let f = fixture();
        let first = f.shared.claim("a").unwrap();
        assert!(f.shared.claim("a").is_err());
        assert!(f.shared.claim("b").is_ok());
        drop(first);
        assert!(f.shared.claim("a").is_ok());
    }
}
