//! Log-only notifier, used when no mail relay is configured.

use async_trait::async_trait;
use tracing::info;

use dusk_core::{Notice, Notifier};

use crate::render::MessageRenderer;

/// Renders every notice and writes it to the log instead of sending it.
pub struct LogNotifier {
    renderer: MessageRenderer,
}

impl LogNotifier {
    pub fn new(renderer: MessageRenderer) -> Self {
        Self { renderer }
    }
}

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, notice: &Notice) -> anyhow::Result<()> {
        let email = self.renderer.render(notice)?;
        info!(
            kind = notice.kind_label(),
            to = %email.to,
            subject = %email.subject,
            "notice not delivered (no mail relay configured)"
        );
        Ok(())
    }
}
