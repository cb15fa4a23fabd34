//! `navgate-middleware` – transport-side collaborators.
//!
//! Abstracts the two calls the navigation node makes across process
//! boundaries, without owning any wire protocol.
//!
//! # Modules
//!
//! - [`action_client`] – [`ActionClient`][action_client::ActionClient] trait
//!   and the channel-backed client/server pair built by
//!   [`action_channel`][action_client::action_channel].  Outcomes arrive as
//!   tagged [`GoalOutcome`][navgate_types::GoalOutcome] values polled once per
//!   tick.
//! - [`service_monitor`] – [`ServiceMonitor`][service_monitor::ServiceMonitor]:
//!   heartbeat-based readiness of the truncation configuration service behind
//!   the [`ConfigService`][service_monitor::ConfigService] trait.

pub mod action_client;
pub mod service_monitor;

pub use action_client::{action_channel, ActionClient, ActionServerHandle, ChannelActionClient, GoalCommand};
pub use service_monitor::{ConfigService, ServiceHealth, ServiceMonitor};
