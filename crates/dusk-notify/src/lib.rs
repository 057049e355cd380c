//! dusk-notify — owner notices.
//!
//! Renders postpone/shutdown notices into HTML emails and delivers them
//! through an HTTP mail relay. Without a relay URL the notices are only
//! logged, which keeps a standalone daemon usable for dry runs.

pub mod error;
pub mod log;
pub mod render;
pub mod webhook;

use std::sync::Arc;

use dusk_core::{DuskConfig, Notifier};

pub use error::{NotifyError, NotifyResult};
pub use log::LogNotifier;
pub use render::{EmailMessage, MessageRenderer};
pub use webhook::WebhookNotifier;

/// Pick the notifier the configuration asks for.
pub fn from_config(config: &DuskConfig) -> NotifyResult<Arc<dyn Notifier>> {
    let renderer = MessageRenderer::from_config(config);
    Ok(match &config.notifier.webhook_url {
        Some(url) => Arc::new(WebhookNotifier::new(url, renderer, config.call_timeout())?),
        None => Arc::new(LogNotifier::new(renderer)),
    })
}
