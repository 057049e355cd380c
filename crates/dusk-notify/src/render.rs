//! Email rendering for owner notices.
//!
//! Bodies come from the askama templates under `templates/`, which escape
//! every interpolated value.

use askama::Template;
use serde::{Deserialize, Serialize};

use dusk_core::{DuskConfig, Notice, NoticeKind};

use crate::error::NotifyResult;

/// A fully rendered HTML email.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailMessage {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub html: String,
}

/// Renders notices into emails. The postpone notice embeds a form whose only
/// field is the token, posted to the callback URL.
#[derive(Debug, Clone)]
pub struct MessageRenderer {
    from_address: String,
    callback_url: String,
    postpone_by_hours: u32,
}

impl MessageRenderer {
    pub fn new(from_address: &str, callback_url: &str, postpone_by_hours: u32) -> Self {
        Self {
            from_address: from_address.to_string(),
            callback_url: callback_url.to_string(),
            postpone_by_hours,
        }
    }

    pub fn from_config(config: &DuskConfig) -> Self {
        Self::new(
            &config.from_address,
            &config.postpone_callback_url,
            config.postpone_by_hours,
        )
    }

    pub fn render(&self, notice: &Notice) -> NotifyResult<EmailMessage> {
        let name = notice.instance_name.as_str();
        let (subject, html) = match &notice.kind {
            NoticeKind::Postpone {
                lead_minutes,
                token,
            } => {
                let page = PostponeEmail {
                    instance_name: name,
                    lead_minutes: *lead_minutes,
                    action: &self.callback_url,
                    token,
                    hours: self.postpone_by_hours,
                };
                (
                    format!("{name} will be shutdown in {lead_minutes} minute(s)"),
                    page.render()?,
                )
            }
            NoticeKind::Shutdown { outcome } => {
                let page = ShutdownEmail {
                    instance_name: name,
                    outcome,
                };
                (
                    format!("{name} has been automatically shutdown"),
                    page.render()?,
                )
            }
        };

        Ok(EmailMessage {
            from: self.from_address.clone(),
            to: notice.to.clone(),
            subject,
            html,
        })
    }
}

#[derive(Template)]
#[template(path = "postpone.html")]
struct PostponeEmail<'a> {
    instance_name: &'a str,
    lead_minutes: i64,
    action: &'a str,
    token: &'a str,
    hours: u32,
}

#[derive(Template)]
#[template(path = "shutdown.html")]
struct ShutdownEmail<'a> {
    instance_name: &'a str,
    outcome: &'a str,
}
