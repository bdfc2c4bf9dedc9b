//! Glue between the realtime transport, the HTTP client, and the run cache.
//! The transport hands us an ordered stream of events per connection; we
//! apply them in delivery order and let the cache's overwrite semantics
//! absorb redelivery.

use std::sync::Arc;

use tokio::sync::{RwLock, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::client::{ApiError, PlaybookApi};
use crate::core::run::Run;
use crate::core::run_cache::{RunCache, RunEvent};

/// Shared handle to the process-wide run cache. All mutation funnels
/// through [`SharedRunCache::apply`]; readers take value snapshots.
#[derive(Clone, Default)]
pub struct SharedRunCache {
    inner: Arc<RwLock<RunCache>>,
}

impl SharedRunCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn apply(&self, event: RunEvent) {
        let mut cache = self.inner.write().await;
        let next = std::mem::take(&mut *cache).apply(event);
        *cache = next;
    }

    pub async fn snapshot(&self) -> RunCache {
        self.inner.read().await.clone()
    }

    pub async fn run(&self, run_id: &str) -> Option<Run> {
        self.inner.read().await.run(run_id).cloned()
    }

    pub async fn run_for_channel(&self, team_id: &str, channel_id: &str) -> Option<Run> {
        self.inner
            .read()
            .await
            .run_for_channel(team_id, channel_id)
            .cloned()
    }

    /// Lazily populate the cache with every run the current user is in.
    pub async fn refresh_for_user(&self, api: &dyn PlaybookApi) -> Result<usize, ApiError> {
        let runs = api.fetch_runs_for_user().await?;
        let count = runs.len();
        self.apply(RunEvent::BulkReceived(runs)).await;
        info!(count, "run cache refreshed for current user");
        Ok(count)
    }

    /// Populate the cache with one team's runs, typically on team switch.
    pub async fn refresh_for_team(
        &self,
        api: &dyn PlaybookApi,
        team_id: &str,
    ) -> Result<usize, ApiError> {
        let runs = api.fetch_runs_for_team(team_id).await?;
        let count = runs.len();
        self.apply(RunEvent::BulkReceived(runs)).await;
        info!(%team_id, count, "run cache refreshed for team");
        Ok(count)
    }
}

/// Consume a realtime event stream until the sender side closes, applying
/// each event to the cache strictly in delivery order.
pub fn spawn_listener(cache: SharedRunCache, mut events: mpsc::Receiver<RunEvent>) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            debug!(?event, "applying realtime run event");
            cache.apply(event).await;
        }
        info!("realtime run event stream closed");
    })
}
