//! Call center server
//!
//! Wires the shared store, the media-server client, and the orchestration
//! engine together, then pumps channel events into the engine. Events for
//! the same channel are handled by a dedicated worker task, so they apply
//! in arrival order; distinct channels progress concurrently.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::api::AdminApi;
use crate::config::CallCenterConfig;
use crate::error::{CallCenterError, Result};
use crate::media::{AriClient, ChannelEvent, MediaClient};
use crate::orchestrator::CallCenterEngine;
use crate::repository::CallCenterRepository;
use crate::store::{RedisStore, Store};

/// Builder for [`CallCenterServer`]
///
/// # Examples
///
/// ```rust,no_run
/// use dialer_call_engine::prelude::*;
///
/// # async fn example() -> Result<()> {
/// let config = CallCenterConfig::from_env()?;
/// let server = CallCenterServerBuilder::new()
///     .with_config(config)
///     .build()
///     .await?;
/// server.run().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Default)]
pub struct CallCenterServerBuilder {
    config: Option<CallCenterConfig>,
    store: Option<Arc<dyn Store>>,
    media: Option<Arc<dyn MediaClient>>,
}

impl CallCenterServerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use the given configuration instead of the defaults
    pub fn with_config(mut self, config: CallCenterConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Use a pre-connected store instead of connecting to Redis
    pub fn with_store(mut self, store: Arc<dyn Store>) -> Self {
        self.store = Some(store);
        self
    }

    /// Use a custom media client instead of the ARI client
    pub fn with_media_client(mut self, media: Arc<dyn MediaClient>) -> Self {
        self.media = Some(media);
        self
    }

    /// Connect the external interfaces and assemble the server
    pub async fn build(self) -> Result<CallCenterServer> {
        let config = self.config.unwrap_or_default();
        config.validate()?;

        let store = match self.store {
            Some(store) => store,
            None => Arc::new(RedisStore::connect(&config.redis).await?),
        };
        let repository = CallCenterRepository::new(store);

        let ari = AriClient::new(config.ari.clone());
        let media = self.media.unwrap_or_else(|| Arc::new(ari.clone()));

        let engine = CallCenterEngine::new(config.clone(), repository, media);
        Ok(CallCenterServer { config, engine, ari })
    }
}

/// Running call center: engine plus the event loop that feeds it
pub struct CallCenterServer {
    config: CallCenterConfig,
    engine: Arc<CallCenterEngine>,
    ari: AriClient,
}

impl CallCenterServer {
    /// Start building a server
    pub fn builder() -> CallCenterServerBuilder {
        CallCenterServerBuilder::new()
    }

    /// The orchestration engine
    pub fn engine(&self) -> Arc<CallCenterEngine> {
        Arc::clone(&self.engine)
    }

    /// Administrative API sharing this server's engine
    pub fn admin(&self) -> AdminApi {
        AdminApi::new(self.engine())
    }

    /// Restore store consistency for a call center
    ///
    /// Run once at startup for each tenant this router serves.
    pub async fn reconcile(&self, call_center_id: &str) -> Result<usize> {
        self.engine.repository().reconcile(call_center_id).await
    }

    /// Consume media-server events until the control transport drops
    ///
    /// A dropped event stream is fatal: the router cannot observe calls
    /// without it, so the error propagates to the caller rather than being
    /// retried here.
    pub async fn run(&self) -> Result<()> {
        info!(
            "🚀 Call center server starting for app {} on {}:{}",
            self.config.ari.app_name, self.config.ari.host, self.config.ari.port
        );

        let (events_tx, mut events_rx) = mpsc::unbounded_channel();
        let ari = self.ari.clone();
        let pump = tokio::spawn(async move { ari.run_events(events_tx).await });

        // One worker per live channel keeps same-channel events in arrival
        // order without blocking the loop on slow work items.
        let workers: Arc<DashMap<String, mpsc::UnboundedSender<ChannelEvent>>> =
            Arc::new(DashMap::new());

        while let Some(event) = events_rx.recv().await {
            let channel_id = event.channel_id().to_string();
            let terminal = matches!(event, ChannelEvent::Destroyed { .. });

            let worker = workers
                .entry(channel_id.clone())
                .or_insert_with(|| self.spawn_channel_worker(&channel_id))
                .clone();
            if worker.send(event).is_err() {
                warn!("Worker for channel {} is gone, dropping event", channel_id);
            }

            // The destroy event is the last one a channel produces; letting
            // the sender drop ends the worker after it drains.
            if terminal {
                workers.remove(&channel_id);
            }
        }

        match pump.await {
            Ok(Err(e)) => {
                error!("Media event stream failed: {}", e);
                Err(e)
            }
            Ok(Ok(())) => Err(CallCenterError::transport("event stream ended")),
            Err(e) => Err(CallCenterError::internal(format!("event pump panicked: {}", e))),
        }
    }

    fn spawn_channel_worker(&self, channel_id: &str) -> mpsc::UnboundedSender<ChannelEvent> {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let engine = self.engine();
        let channel_id = channel_id.to_string();
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                engine.handle_event(event).await;
            }
            tracing::debug!("Worker for channel {} finished", channel_id);
        });
        tx
    }
}
