//! dusk-core — shared types for scheduled instance shutdown.
//!
//! - [`types`]: instances, the typed [`Schedule`] view of scheduling tags,
//!   `HHMM` deadlines, tokens, and notices
//! - [`window`]: time-of-day arithmetic against today's deadline
//! - [`capability`]: traits for the repository, token store, and notifier
//! - [`config`]: `dusk.toml` + environment configuration

pub mod capability;
pub mod config;
pub mod error;
pub mod types;
pub mod window;

pub use capability::{InstanceRepository, Notifier, TokenStore};
pub use config::{DaemonConfig, DuskConfig, NotifierConfig, RawConfig};
pub use error::{CoreError, CoreResult};
pub use types::*;
pub use window::{DeadlineWindow, Moment};
