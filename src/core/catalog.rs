//! Default channel action catalog. Every channel renders the full catalog;
//! the server only stores the actions a user actually touched, so loading a
//! channel reconciles the stored subset against these defaults.

use anyhow::{Result, bail};
use std::collections::HashSet;

use crate::core::actions::{
    ActionPayload, ActionType, ActionsByTrigger, ChannelAction, TriggerType,
};

fn default_action(
    trigger_type: TriggerType,
    action_type: ActionType,
    payload: ActionPayload,
) -> ChannelAction {
    ChannelAction {
        id: None,
        channel_id: String::new(),
        enabled: false,
        trigger_type,
        action_type,
        payload,
    }
}

/// Validated, ordered set of default actions grouped by trigger. Trigger
/// order and per-trigger action order are the declaration order here, and
/// every reconciled working set follows it.
#[derive(Debug, Clone)]
pub struct ActionCatalog {
    triggers: Vec<(TriggerType, Vec<ChannelAction>)>,
}

impl ActionCatalog {
    /// Build a catalog, rejecting entries that could only fail later:
    /// payload variant not matching the action type, duplicate
    /// `(trigger, action_type)` pairs, or defaults that already carry
    /// server-side identity.
    pub fn new(triggers: Vec<(TriggerType, Vec<ChannelAction>)>) -> Result<Self> {
        let mut seen_triggers = HashSet::new();
        let mut seen_slots = HashSet::new();

        for (trigger, actions) in &triggers {
            if !seen_triggers.insert(*trigger) {
                bail!("catalog declares trigger {} twice", trigger.as_str());
            }
            for action in actions {
                if action.trigger_type != *trigger {
                    bail!(
                        "catalog action {} filed under trigger {} but declares {}",
                        action.action_type.as_str(),
                        trigger.as_str(),
                        action.trigger_type.as_str()
                    );
                }
                if !action.payload.matches(action.action_type) {
                    bail!(
                        "catalog action {} carries a payload for a different action type",
                        action.action_type.as_str()
                    );
                }
                if action.id.is_some() || !action.channel_id.is_empty() {
                    bail!(
                        "catalog default {} must not carry server identity",
                        action.action_type.as_str()
                    );
                }
                if !seen_slots.insert((action.trigger_type, action.action_type)) {
                    bail!(
                        "catalog declares ({}, {}) twice",
                        action.trigger_type.as_str(),
                        action.action_type.as_str()
                    );
                }
            }
        }

        Ok(Self { triggers })
    }

    /// The built-in default set every channel starts from.
    pub fn baseline() -> Self {
        let triggers = vec![
            (
                TriggerType::NewMemberJoins,
                vec![
                    default_action(
                        TriggerType::NewMemberJoins,
                        ActionType::WelcomeMessage,
                        ActionPayload::WelcomeMessage {
                            message: String::new(),
                        },
                    ),
                    default_action(
                        TriggerType::NewMemberJoins,
                        ActionType::CategorizeChannel,
                        ActionPayload::CategorizeChannel {
                            category_name: String::new(),
                        },
                    ),
                ],
            ),
            (
                TriggerType::KeywordsPosted,
                vec![default_action(
                    TriggerType::KeywordsPosted,
                    ActionType::PromptRunPlaybook,
                    ActionPayload::PromptRunPlaybook {
                        keywords: Vec::new(),
                        playbook_id: String::new(),
                    },
                )],
            ),
        ];

        Self::new(triggers).expect("built-in catalog is valid")
    }

    pub fn triggers(&self) -> impl Iterator<Item = (TriggerType, &[ChannelAction])> {
        self.triggers
            .iter()
            .map(|(trigger, actions)| (*trigger, actions.as_slice()))
    }

    pub fn defaults_for(&self, trigger: TriggerType) -> Option<&[ChannelAction]> {
        self.triggers
            .iter()
            .find(|(t, _)| *t == trigger)
            .map(|(_, actions)| actions.as_slice())
    }

    /// A fresh working set containing the full default catalog.
    pub fn seed(&self) -> ActionsByTrigger {
        self.triggers
            .iter()
            .map(|(trigger, actions)| (*trigger, actions.clone()))
            .collect()
    }

    /// Count of `(trigger, action_type)` slots the catalog defines.
    pub fn slot_count(&self) -> usize {
        self.triggers.iter().map(|(_, actions)| actions.len()).sum()
    }
}

impl Default for ActionCatalog {
    fn default() -> Self {
        Self::baseline()
    }
}
