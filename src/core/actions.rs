//! Channel action types: automation rules attached to a channel, fired by
//! a trigger (member joins, keywords posted) and performing one effect.

use std::collections::BTreeMap;

/// Event class that can fire automations in a channel. Declaration order is
/// the canonical display order, so the enum derives `Ord`.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    serde::Serialize,
    serde::Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum TriggerType {
    NewMemberJoins,
    KeywordsPosted,
}

impl TriggerType {
    pub fn as_str(self) -> &'static str {
        match self {
            TriggerType::NewMemberJoins => "new_member_joins",
            TriggerType::KeywordsPosted => "keywords_posted",
        }
    }
}

/// Kind of automated effect performed when a trigger fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    WelcomeMessage,
    CategorizeChannel,
    PromptRunPlaybook,
}

impl ActionType {
    pub fn as_str(self) -> &'static str {
        match self {
            ActionType::WelcomeMessage => "welcome_message",
            ActionType::CategorizeChannel => "categorize_channel",
            ActionType::PromptRunPlaybook => "prompt_run_playbook",
        }
    }
}

/// Per-action configuration. The variant shape is keyed by the action type;
/// `matches` closes the pairing so an invalid combination is rejected when
/// the catalog is built rather than silently ignored at runtime.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(untagged)]
pub enum ActionPayload {
    WelcomeMessage {
        message: String,
    },
    CategorizeChannel {
        category_name: String,
    },
    PromptRunPlaybook {
        #[serde(default)]
        keywords: Vec<String>,
        playbook_id: String,
    },
}

impl ActionPayload {
    pub fn matches(&self, action_type: ActionType) -> bool {
        matches!(
            (self, action_type),
            (ActionPayload::WelcomeMessage { .. }, ActionType::WelcomeMessage)
                | (ActionPayload::CategorizeChannel { .. }, ActionType::CategorizeChannel)
                | (ActionPayload::PromptRunPlaybook { .. }, ActionType::PromptRunPlaybook)
        )
    }
}

/// One automation rule. `(trigger_type, action_type)` is unique per channel.
/// Catalog defaults carry no `id` and an empty `channel_id`; the server
/// assigns an id on first save.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ChannelAction {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub channel_id: String,
    pub enabled: bool,
    pub trigger_type: TriggerType,
    pub action_type: ActionType,
    pub payload: ActionPayload,
}

impl ChannelAction {
    /// Two actions configure the same rule slot when both halves of the
    /// composite key match.
    pub fn same_slot(&self, other: &ChannelAction) -> bool {
        self.trigger_type == other.trigger_type && self.action_type == other.action_type
    }
}

/// Trigger type -> ordered list of actions. `TriggerType`'s `Ord` is its
/// declaration order, so iteration walks triggers in catalog order.
pub type ActionsByTrigger = BTreeMap<TriggerType, Vec<ChannelAction>>;

/// Group a flat fetch result by trigger, preserving fetch order within each
/// trigger.
pub fn group_by_trigger(actions: Vec<ChannelAction>) -> ActionsByTrigger {
    let mut grouped = ActionsByTrigger::new();
    for action in actions {
        grouped.entry(action.trigger_type).or_default().push(action);
    }
    grouped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_matches_only_its_action_type() {
        let payload = ActionPayload::WelcomeMessage {
            message: "hi".to_string(),
        };
        assert!(payload.matches(ActionType::WelcomeMessage));
        assert!(!payload.matches(ActionType::CategorizeChannel));
        assert!(!payload.matches(ActionType::PromptRunPlaybook));
    }

    #[test]
    fn channel_action_round_trips_snake_case() {
        let action = ChannelAction {
            id: Some("a1".to_string()),
            channel_id: "c1".to_string(),
            enabled: true,
            trigger_type: TriggerType::KeywordsPosted,
            action_type: ActionType::PromptRunPlaybook,
            payload: ActionPayload::PromptRunPlaybook {
                keywords: vec!["sev1".to_string()],
                playbook_id: "pb1".to_string(),
            },
        };

        let json = serde_json::to_value(&action).unwrap();
        assert_eq!(json["trigger_type"], "keywords_posted");
        assert_eq!(json["action_type"], "prompt_run_playbook");
        assert_eq!(json["payload"]["playbook_id"], "pb1");

        let back: ChannelAction = serde_json::from_value(json).unwrap();
        assert_eq!(back, action);
    }

    #[test]
    fn default_id_is_omitted_from_wire_shape() {
        let action = ChannelAction {
            id: None,
            channel_id: String::new(),
            enabled: false,
            trigger_type: TriggerType::NewMemberJoins,
            action_type: ActionType::WelcomeMessage,
            payload: ActionPayload::WelcomeMessage {
                message: String::new(),
            },
        };
        let json = serde_json::to_value(&action).unwrap();
        assert!(json.get("id").is_none());
    }

    #[test]
    fn group_by_trigger_preserves_fetch_order_within_trigger() {
        let a = ChannelAction {
            id: Some("1".to_string()),
            channel_id: "c".to_string(),
            enabled: true,
            trigger_type: TriggerType::NewMemberJoins,
            action_type: ActionType::CategorizeChannel,
            payload: ActionPayload::CategorizeChannel {
                category_name: "ops".to_string(),
            },
        };
        let b = ChannelAction {
            id: Some("2".to_string()),
            channel_id: "c".to_string(),
            enabled: true,
            trigger_type: TriggerType::NewMemberJoins,
            action_type: ActionType::WelcomeMessage,
            payload: ActionPayload::WelcomeMessage {
                message: "hello".to_string(),
            },
        };

        let grouped = group_by_trigger(vec![a.clone(), b.clone()]);
        assert_eq!(grouped.len(), 1);
        assert_eq!(grouped[&TriggerType::NewMemberJoins], vec![a, b]);
    }
}
