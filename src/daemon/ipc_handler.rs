//! IPC request dispatch

use anyhow::{Context, Result};
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::{debug, info, warn};

use super::Shared;
use crate::activation::Filesystem;
use crate::catalog::{self, TransportPool};
use crate::config::ConfigStore;
use crate::ipc::{Request, Response};
use crate::types::AnimationEntry;

/// Answer one request; failures become `Response::Error` with the full chain
pub async fn handle<S, F, P>(shared: &Shared<S, F, P>, request: Request) -> Response
where
    S: ConfigStore,
    F: Filesystem,
    P: TransportPool,
{
    debug!(request = ?request, "Received IPC request");
    match dispatch(shared, request).await {
        Ok(response) => response,
        Err(e) => {
            let message = format!("{e:#}");
            warn!(error = %message, "IPC request failed");
            Response::Error(message)
        }
    }
}

async fn dispatch<S, F, P>(shared: &Shared<S, F, P>, request: Request) -> Result<Response>
where
    S: ConfigStore,
    F: Filesystem,
    P: TransportPool,
{
    let response = match request {
        Request::GetState => Response::State(shared.engine.lock().await.state()),

        Request::SaveCustomSet(set) => {
            shared.engine.lock().await.save_custom_set(set)?;
            Response::Ready
        }

        Request::RemoveCustomSet(id) => {
            shared.engine.lock().await.remove_custom_set(&id)?;
            Response::Ready
        }

        Request::EnableSet { id, enabled } => {
            shared.engine.lock().await.enable_set(&id, enabled)?;
            Response::Ready
        }

        Request::SaveCustomAnimation(anim) => {
            shared.engine.lock().await.save_custom_animation(anim)?;
            Response::Ready
        }

        Request::RemoveCustomAnimation(id) => {
            shared.engine.lock().await.remove_custom_animation(&id)?;
            Response::Ready
        }

        Request::UpdateCatalog => {
            let force_ipv4 = shared.engine.lock().await.config().force_ipv4;
            shared.refresh_catalog(force_ipv4).await?;
            Response::Ready
        }

        Request::GetCatalog => Response::Catalog(shared.catalog.snapshot().to_vec()),

        Request::GetCatalogEntry(id) => Response::CatalogEntry(shared.catalog.get(&id)),

        Request::GetAvailable => {
            let snapshot = shared.catalog.snapshot();
            let engine = shared.engine.lock().await;
            Response::Animations(
                snapshot
                    .iter()
                    .filter(|entry| !engine.config().is_downloaded(&entry.id))
                    .map(AnimationEntry::catalog)
                    .collect(),
            )
        }

        Request::Download(id) => {
            download(shared, &id).await?;
            Response::Ready
        }

        Request::DeleteDownload(id) => {
            let _claim = shared.claim(&id)?;
            shared.engine.lock().await.delete_download(&id)?;
            Response::Ready
        }

        Request::SaveSettings(update) => Response::Applied(shared.engine.lock().await.save_settings(update)?),

        Request::Reload => Response::Applied(shared.reload().await?),

        Request::Randomize { shuffle } => {
            let mut engine = shared.engine.lock().await;
            let mut rng = StdRng::from_entropy();
            Response::Applied(engine.randomize(shuffle, &mut rng)?)
        }

        Request::Ping => Response::Pong,

        Request::Shutdown => {
            info!("Received shutdown request via IPC");
            shared.request_shutdown();
            Response::Ready
        }
    };
    Ok(response)
}

/// Fetch outside the engine lock; only the record is written under it
async fn download<S, F, P>(shared: &Shared<S, F, P>, id: &str) -> Result<()>
where
    S: ConfigStore,
    F: Filesystem,
    P: TransportPool,
{
    let _claim = shared.claim(id)?;

    let (entry, dest, force_ipv4) = {
        let engine = shared.engine.lock().await;
        let snapshot = shared.catalog.snapshot();
        let Some(entry) = engine.pending_download(id, &snapshot)? else {
            return Ok(());
        };
        (entry, engine.paths().download_file(id), engine.config().force_ipv4)
    };

    catalog::download_to(shared.transports.select(force_ipv4), &entry, &dest)
        .await
        .with_context(|| format!("Failed to download animation {id}"))?;

    shared.engine.lock().await.record_download(entry)
}
