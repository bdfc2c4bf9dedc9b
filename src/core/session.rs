//! Editing session for one channel's actions: reconciles the stored subset
//! against the default catalog, tracks local edits, and settles optimistic
//! multi-request saves before promoting a new baseline.

use std::sync::Arc;

use futures_util::future::join_all;
use tracing::{debug, warn};

use crate::client::{ApiError, PlaybookApi};
use crate::core::actions::{
    ActionType, ActionsByTrigger, ChannelAction, TriggerType, group_by_trigger,
};
use crate::core::catalog::ActionCatalog;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    Unloaded,
    Loading,
    Loaded,
}

pub fn can_transition(from: SessionPhase, to: SessionPhase) -> bool {
    if from == to {
        return true;
    }
    match from {
        SessionPhase::Unloaded => matches!(to, SessionPhase::Loading),
        SessionPhase::Loading => matches!(to, SessionPhase::Unloaded | SessionPhase::Loaded),
        // A loaded session may refetch.
        SessionPhase::Loaded => matches!(to, SessionPhase::Loading),
    }
}

/// One failed request out of a save fan-out.
#[derive(Debug)]
pub struct SaveFailure {
    pub trigger_type: TriggerType,
    pub action_type: ActionType,
    pub error: ApiError,
}

/// Outcome of a save: how many requests were issued and which ones failed.
/// Failures do not abort siblings, so `failed` can be any subset.
#[derive(Debug, Default)]
pub struct SaveReport {
    pub attempted: usize,
    pub failed: Vec<SaveFailure>,
}

impl SaveReport {
    pub fn all_succeeded(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Working state for one open editing surface. Created when the surface
/// opens, discarded when it closes; a second session for the same channel
/// is not coordinated with this one (last save wins).
pub struct ActionsSession {
    api: Arc<dyn PlaybookApi>,
    catalog: ActionCatalog,
    channel_id: Option<String>,
    phase: SessionPhase,
    /// Last confirmed baseline; only the triggers the server returned.
    original: ActionsByTrigger,
    /// Editable working copy, always covering the full catalog.
    current: ActionsByTrigger,
    dirty: bool,
}

impl ActionsSession {
    pub fn new(api: Arc<dyn PlaybookApi>, catalog: ActionCatalog) -> Self {
        let current = catalog.seed();
        Self {
            api,
            catalog,
            channel_id: None,
            phase: SessionPhase::Unloaded,
            original: ActionsByTrigger::new(),
            current,
            dirty: false,
        }
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn dirty(&self) -> bool {
        self.dirty
    }

    pub fn current(&self) -> &ActionsByTrigger {
        &self.current
    }

    pub fn original(&self) -> &ActionsByTrigger {
        &self.original
    }

    /// Fetch the stored actions for `channel_id` and reconcile them against
    /// the catalog. A transport failure leaves the session unloaded with
    /// its pre-load defaults intact.
    pub async fn load(&mut self, channel_id: &str) -> Result<(), ApiError> {
        self.transition(SessionPhase::Loading);

        let fetched = match self.api.fetch_channel_actions(channel_id).await {
            Ok(fetched) => fetched,
            Err(err) => {
                self.transition(SessionPhase::Unloaded);
                return Err(err);
            }
        };

        let reconciled = reconcile(&self.catalog, group_by_trigger(fetched));
        self.channel_id = Some(channel_id.to_string());
        self.current = overlay(self.catalog.seed(), &reconciled);
        self.original = reconciled;
        self.dirty = false;
        self.transition(SessionPhase::Loaded);
        debug!(%channel_id, "actions session loaded");
        Ok(())
    }

    /// Replace the working copy's entry for the edited slot, positionally.
    /// An update for a slot the working copy does not hold is a caller bug
    /// and is dropped without touching the dirty flag.
    pub fn update_action(&mut self, new_action: ChannelAction) {
        let slot = self
            .current
            .get(&new_action.trigger_type)
            .and_then(|actions| {
                actions
                    .iter()
                    .position(|action| action.action_type == new_action.action_type)
            });

        match slot {
            Some(idx) => {
                if let Some(actions) = self.current.get_mut(&new_action.trigger_type) {
                    actions[idx] = new_action;
                    self.dirty = true;
                }
            }
            None => {
                warn!(
                    trigger = new_action.trigger_type.as_str(),
                    action = new_action.action_type.as_str(),
                    "dropping update for a slot this session does not hold"
                );
            }
        }
    }

    /// Save every action in the working copy, one request per action, and
    /// promote the copy to the new baseline once all requests have settled.
    /// Individual failures do not abort siblings; a partial failure leaves
    /// the session dirty and is listed in the report.
    pub async fn save(&mut self) -> SaveReport {
        if !self.dirty {
            return SaveReport::default();
        }
        let Some(channel_id) = self.channel_id.clone() else {
            warn!("save called before load; nothing to stamp the actions with");
            return SaveReport::default();
        };

        // Field-level copy so later edits to the working set cannot alias
        // into the baseline we are about to commit.
        let mut copy = self.current.clone();
        for actions in copy.values_mut() {
            for action in actions {
                action.channel_id = channel_id.clone();
            }
        }

        let slots: Vec<(TriggerType, ActionType)> = copy
            .values()
            .flatten()
            .map(|action| (action.trigger_type, action.action_type))
            .collect();

        let requests = copy.values().flatten().cloned().map(|action| {
            let api = Arc::clone(&self.api);
            async move { api.save_channel_action(&action).await }
        });

        // Wait for every request to settle, success or failure, before
        // promoting anything.
        let results = join_all(requests).await;

        let mut report = SaveReport {
            attempted: slots.len(),
            failed: Vec::new(),
        };
        for ((trigger_type, action_type), result) in slots.into_iter().zip(results) {
            match result {
                Ok(server_id) => {
                    if let Some(action) = copy
                        .get_mut(&trigger_type)
                        .and_then(|actions| {
                            actions.iter_mut().find(|a| a.action_type == action_type)
                        })
                        && action.id.is_none()
                    {
                        action.id = Some(server_id);
                    }
                }
                Err(error) => {
                    warn!(
                        trigger = trigger_type.as_str(),
                        action = action_type.as_str(),
                        %error,
                        "channel action save failed"
                    );
                    report.failed.push(SaveFailure {
                        trigger_type,
                        action_type,
                        error,
                    });
                }
            }
        }

        // The settled copy becomes both the working set and the baseline.
        // A failed action keeps its locally edited payload and no server id,
        // so the session stays dirty until a successful save or a reload.
        self.current = copy.clone();
        self.original = copy;
        self.dirty = !report.all_succeeded();
        report
    }

    /// Discard unsaved edits: restore the working copy to the last confirmed
    /// baseline overlaid on the default catalog. The server is untouched.
    pub fn cancel(&mut self) {
        self.current = overlay(self.catalog.seed(), &self.original);
        self.dirty = false;
    }

    fn transition(&mut self, to: SessionPhase) {
        if !can_transition(self.phase, to) {
            warn!(from = ?self.phase, to = ?to, "invalid session phase transition");
            return;
        }
        self.phase = to;
    }
}

/// Merge fetched actions into the catalog's order: for every catalog trigger
/// the server returned anything for, walk the catalog's defaults in order
/// and take the fetched action occupying the same slot when one exists.
/// Fetched actions for slots outside the catalog are dropped.
fn reconcile(catalog: &ActionCatalog, fetched: ActionsByTrigger) -> ActionsByTrigger {
    let mut reconciled = ActionsByTrigger::new();
    for (trigger, fetched_actions) in fetched {
        let Some(defaults) = catalog.defaults_for(trigger) else {
            warn!(trigger = trigger.as_str(), "dropping fetched actions for unknown trigger");
            continue;
        };
        let merged = defaults
            .iter()
            .map(|default| {
                fetched_actions
                    .iter()
                    .find(|fetched| fetched.same_slot(default))
                    .unwrap_or(default)
                    .clone()
            })
            .collect();
        reconciled.insert(trigger, merged);
    }
    reconciled
}

/// Full default seed, with every trigger present in `baseline` replacing its
/// default list. Triggers the baseline never saw keep their full default set.
fn overlay(mut seed: ActionsByTrigger, baseline: &ActionsByTrigger) -> ActionsByTrigger {
    for (trigger, actions) in baseline {
        seed.insert(*trigger, actions.clone());
    }
    seed
}
