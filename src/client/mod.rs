//! HTTP client for the playbook backend. The rest of the crate talks to the
//! backend through the [`PlaybookApi`] trait so tests can substitute a mock.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Method, RequestBuilder};
use tracing::debug;
use url::Url;

use crate::core::actions::ChannelAction;
use crate::core::run::Run;

/// Transport-level failures surfaced to callers. No retry policy lives
/// here; callers decide whether to refetch.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("server returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("unexpected response shape: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

/// Remote operations the state layer depends on.
#[async_trait]
pub trait PlaybookApi: Send + Sync {
    /// All runs the current user participates in, across teams.
    async fn fetch_runs_for_user(&self) -> Result<Vec<Run>, ApiError>;

    /// All runs the current user participates in within one team.
    async fn fetch_runs_for_team(&self, team_id: &str) -> Result<Vec<Run>, ApiError>;

    /// The actions stored server-side for one channel. May be a subset of
    /// the default catalog; reconciliation fills the gaps.
    async fn fetch_channel_actions(&self, channel_id: &str) -> Result<Vec<ChannelAction>, ApiError>;

    /// Create or update one action and return its server id. Creates when
    /// the action has no id yet, updates otherwise.
    async fn save_channel_action(&self, action: &ChannelAction) -> Result<String, ApiError>;
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct ApiConfig {
    pub base_url: String,
    pub auth_token: String,
}

#[derive(serde::Deserialize)]
struct RunList {
    items: Vec<Run>,
}

#[derive(serde::Deserialize)]
struct SavedAction {
    id: String,
}

pub struct HttpClient {
    http: reqwest::Client,
    base_url: Url,
    auth_token: String,
}

impl HttpClient {
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let base_url = Url::parse(&config.base_url)
            .with_context(|| format!("invalid API base url: {}", config.base_url))?;
        Ok(Self {
            http: reqwest::Client::new(),
            base_url,
            auth_token: config.auth_token.clone(),
        })
    }

    fn request(&self, method: Method, path: &str) -> Result<RequestBuilder, ApiError> {
        let url = self
            .base_url
            .join(path)
            .map_err(|e| ApiError::InvalidRequest(format!("bad path {}: {}", path, e)))?;
        Ok(self
            .http
            .request(method, url)
            .header("Authorization", format!("Bearer {}", self.auth_token)))
    }

    async fn send_checked(&self, builder: RequestBuilder) -> Result<reqwest::Response, ApiError> {
        let resp = builder.send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ApiError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(resp)
    }
}

/// Read the body and decode it ourselves so a malformed body is always an
/// [`ApiError::Decode`], never a transport error.
async fn decode_json<T: serde::de::DeserializeOwned>(resp: reqwest::Response) -> Result<T, ApiError> {
    let body = resp.text().await?;
    Ok(serde_json::from_str(&body)?)
}

#[async_trait]
impl PlaybookApi for HttpClient {
    async fn fetch_runs_for_user(&self) -> Result<Vec<Run>, ApiError> {
        let req = self.request(Method::GET, "api/v0/runs")?.query(&[("participant_id", "me")]);
        let list: RunList = decode_json(self.send_checked(req).await?).await?;
        debug!(count = list.items.len(), "fetched runs for current user");
        Ok(list.items)
    }

    async fn fetch_runs_for_team(&self, team_id: &str) -> Result<Vec<Run>, ApiError> {
        let req = self
            .request(Method::GET, "api/v0/runs")?
            .query(&[("participant_id", "me"), ("team_id", team_id)]);
        let list: RunList = decode_json(self.send_checked(req).await?).await?;
        debug!(%team_id, count = list.items.len(), "fetched runs for team");
        Ok(list.items)
    }

    async fn fetch_channel_actions(&self, channel_id: &str) -> Result<Vec<ChannelAction>, ApiError> {
        let path = format!("api/v0/actions/channels/{}", channel_id);
        let actions: Vec<ChannelAction> =
            decode_json(self.send_checked(self.request(Method::GET, &path)?).await?).await?;
        debug!(%channel_id, count = actions.len(), "fetched channel actions");
        Ok(actions)
    }

    async fn save_channel_action(&self, action: &ChannelAction) -> Result<String, ApiError> {
        let req = match &action.id {
            // First save: the server assigns the id.
            None => {
                let path = format!("api/v0/actions/channels/{}", action.channel_id);
                self.request(Method::POST, &path)?.json(action)
            }
            Some(id) => {
                let path = format!("api/v0/actions/channels/{}/{}", action.channel_id, id);
                self.request(Method::PUT, &path)?.json(action)
            }
        };

        let saved: SavedAction = decode_json(self.send_checked(req).await?).await?;
        Ok(saved.id)
    }
}
