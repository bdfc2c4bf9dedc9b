/// One instance of an executing operational playbook, scoped to a single
/// channel. Identity and foreign keys are immutable after creation; the
/// remaining fields track whatever the server last told us.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Run {
    pub id: String,
    pub name: String,
    pub team_id: String,
    pub channel_id: String,
    pub playbook_id: String,
    pub owner_user_id: String,
    #[serde(default)]
    pub participant_ids: Vec<String>,
    /// Server-side modification timestamp in epoch milliseconds. Used to
    /// discard realtime events that arrive behind a newer snapshot.
    #[serde(default)]
    pub update_at: i64,
}

impl Run {
    pub fn is_participant(&self, user_id: &str) -> bool {
        self.owner_user_id == user_id || self.participant_ids.iter().any(|id| id == user_id)
    }
}
