//! Hands rendered emails to an HTTP mail relay.
//!
//! The relay receives one JSON [`EmailMessage`] per POST and is expected to
//! answer with a 2xx status once it has accepted the message.

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use dusk_core::{Notice, Notifier};

use crate::error::{NotifyError, NotifyResult};
use crate::render::{EmailMessage, MessageRenderer};

pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
    renderer: MessageRenderer,
}

impl WebhookNotifier {
    pub fn new(url: &str, renderer: MessageRenderer, timeout: Duration) -> NotifyResult<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.to_string(),
            renderer,
        })
    }

    async fn deliver(&self, email: &EmailMessage) -> NotifyResult<()> {
        let resp = self.client.post(&self.url).json(email).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(NotifyError::Rejected {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn send(&self, notice: &Notice) -> anyhow::Result<()> {
        let email = self.renderer.render(notice)?;
        match self.deliver(&email).await {
            Ok(()) => {
                debug!(kind = notice.kind_label(), to = %email.to, "notice delivered");
                Ok(())
            }
            Err(e) => {
                warn!(
                    kind = notice.kind_label(),
                    to = %email.to,
                    error = %e,
                    "notice delivery failed"
                );
                Err(e.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    use axum::extract::State;
    use axum::http::StatusCode;
    use axum::routing::post;
    use axum::{Json, Router};
    use dusk_core::NoticeKind;

    type Inbox = Arc<Mutex<Vec<EmailMessage>>>;

    async fn relay(status: StatusCode) -> (String, Inbox) {
        let inbox: Inbox = Arc::default();
        let app = Router::new()
            .route(
                "/send",
                post(
                    move |State(inbox): State<Inbox>, Json(email): Json<EmailMessage>| async move {
                        inbox.lock().unwrap().push(email);
                        status
                    },
                ),
            )
            .with_state(inbox.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{addr}/send"), inbox)
    }

    fn notice() -> Notice {
        Notice {
            kind: NoticeKind::Postpone {
                lead_minutes: 10,
                token: "tok".to_string(),
            },
            to: "owner@example.com".to_string(),
            instance_name: "i-1".to_string(),
        }
    }

    fn renderer() -> MessageRenderer {
        MessageRenderer::new("dusk@example.com", "https://dusk/postpone", 1)
    }

    #[tokio::test]
    async fn posts_rendered_email() {
        let (url, inbox) = relay(StatusCode::ACCEPTED).await;
        let notifier = WebhookNotifier::new(&url, renderer(), Duration::from_secs(2)).unwrap();

        notifier.send(&notice()).await.unwrap();

        let received = inbox.lock().unwrap().clone();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].to, "owner@example.com");
        assert!(received[0].html.contains("tok"));
    }

    #[tokio::test]
    async fn relay_rejection_is_an_error() {
        let (url, _) = relay(StatusCode::SERVICE_UNAVAILABLE).await;
        let notifier = WebhookNotifier::new(&url, renderer(), Duration::from_secs(2)).unwrap();

        let err = notifier.send(&notice()).await.unwrap_err();
        assert!(err.to_string().contains("503"));
    }

    #[tokio::test]
    async fn unreachable_relay_is_an_error() {
        let notifier =
            WebhookNotifier::new("http://127.0.0.1:1/send", renderer(), Duration::from_millis(200))
                .unwrap();
        assert!(notifier.send(&notice()).await.is_err());
    }
}
