//! Run cache: two read-optimized projections of the runs the current user
//! participates in, lazily bulk-loaded and kept current by realtime events.

use std::collections::HashMap;

use tracing::debug;

use crate::core::run::Run;

/// Realtime and fetch events the cache reacts to. Delivery is at-least-once
/// and unordered across topics, so every application must be an idempotent
/// overwrite.
#[derive(Debug, Clone, PartialEq)]
pub enum RunEvent {
    Created(Run),
    Updated(Run),
    /// Bulk fetch result, scoped either to the current user or to one team.
    BulkReceived(Vec<Run>),
    /// The current user was removed from a channel; its run leaves the
    /// team projection only.
    RemovedFromChannel(String),
}

/// The run set projected two ways: by run id, and by team -> channel.
///
/// The by-id projection answers "which runs am I in" across teams and only
/// ever grows or overwrites. The team projection answers "which run is live
/// in this channel"; a channel hosts at most one active run, and removal
/// events delete from this projection alone.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RunCache {
    by_id: HashMap<String, Run>,
    by_team: HashMap<String, HashMap<String, Run>>,
}

impl RunCache {
    /// Apply one event and return the next state. Never fails: events that
    /// reference nothing we know about degrade to no-ops.
    pub fn apply(mut self, event: RunEvent) -> RunCache {
        match event {
            RunEvent::Created(run) | RunEvent::Updated(run) => {
                if self.is_stale(&run) {
                    debug!(run_id = %run.id, update_at = run.update_at, "discarding stale run event");
                    return self;
                }
                self.upsert(run);
                self
            }
            RunEvent::BulkReceived(runs) => {
                // An empty team-scoped batch carries no team id, so it must
                // not create or clear a team entry.
                if runs.is_empty() {
                    return self;
                }
                for run in runs {
                    self.upsert(run);
                }
                self
            }
            RunEvent::RemovedFromChannel(channel_id) => {
                let team_id = self
                    .by_team
                    .iter()
                    .find(|(_, channels)| channels.contains_key(&channel_id))
                    .map(|(team_id, _)| team_id.clone());

                // Channel ids map to at most one team in practice; removing
                // only the first match keeps a violation of that invariant
                // from cascading.
                if let Some(team_id) = team_id
                    && let Some(channels) = self.by_team.get_mut(&team_id)
                {
                    channels.remove(&channel_id);
                    debug!(%team_id, %channel_id, "removed run from team projection");
                }
                self
            }
        }
    }

    /// A realtime event is stale when the cached entry is strictly newer.
    /// Equal timestamps still apply, so at-least-once redelivery stays a
    /// no-op rather than an error.
    fn is_stale(&self, run: &Run) -> bool {
        self.by_id
            .get(&run.id)
            .is_some_and(|cached| run.update_at < cached.update_at)
    }

    fn upsert(&mut self, run: Run) {
        self.by_team
            .entry(run.team_id.clone())
            .or_default()
            .insert(run.channel_id.clone(), run.clone());
        self.by_id.insert(run.id.clone(), run);
    }

    pub fn run(&self, run_id: &str) -> Option<&Run> {
        self.by_id.get(run_id)
    }

    /// The active run hosted by a channel, if the team projection knows one.
    pub fn run_for_channel(&self, team_id: &str, channel_id: &str) -> Option<&Run> {
        self.by_team.get(team_id)?.get(channel_id)
    }

    pub fn runs_for_team(&self, team_id: &str) -> impl Iterator<Item = &Run> {
        self.by_team.get(team_id).into_iter().flatten().map(|(_, run)| run)
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}
