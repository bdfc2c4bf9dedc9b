//! Client-side state layer for collaborative playbook runs.
//!
//! Two independent pieces share this crate: a process-wide cache of run
//! entities kept current by bulk fetches and realtime events
//! ([`core::run_cache`], [`events`]), and a per-channel editing session
//! that reconciles stored channel actions against the default catalog and
//! settles optimistic saves ([`core::session`]). Both talk to the backend
//! through [`client::PlaybookApi`].

pub mod client;
pub mod core;
pub mod events;

pub use crate::client::{ApiConfig, ApiError, HttpClient, PlaybookApi};
pub use crate::core::actions::{
    ActionPayload, ActionType, ActionsByTrigger, ChannelAction, TriggerType,
};
pub use crate::core::catalog::ActionCatalog;
pub use crate::core::run::Run;
pub use crate::core::run_cache::{RunCache, RunEvent};
pub use crate::core::session::{ActionsSession, SaveFailure, SaveReport, SessionPhase};
pub use crate::events::{SharedRunCache, spawn_listener};
