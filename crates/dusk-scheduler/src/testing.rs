//! Shared fixtures for scheduler tests.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};

use dusk_core::{
    DaemonConfig, DuskConfig, Instance, InstanceRepository, InstanceStatus, Moment, Notice,
    NoticeKind, Notifier, NotifierConfig, StopOutcome, TAG_OPT_IN, TAG_OWNER_EMAIL,
    TAG_SCHEDULED_TIME,
};
use dusk_state::{InstanceRecord, StateStore};

pub fn config(lead: u32, window: u32) -> Arc<DuskConfig> {
    Arc::new(DuskConfig {
        notify_lead_minutes: lead,
        shutdown_window_minutes: window,
        from_address: "dusk@example.com".to_string(),
        postpone_callback_url: "https://dusk.example.com/postpone".to_string(),
        token_store_name: "tokens".to_string(),
        token_ttl_minutes: 60,
        postpone_by_hours: 1,
        call_timeout_secs: 1,
        daemon: DaemonConfig::default(),
        notifier: NotifierConfig::default(),
    })
}

pub fn store() -> StateStore {
    StateStore::open_in_memory("tokens").unwrap()
}

/// 14 June 2024 at `h:m` UTC.
pub fn at(h: u32, m: u32) -> Moment {
    Moment::from_datetime(&Utc.with_ymd_and_hms(2024, 6, 14, h, m, 0).unwrap())
}

pub fn scheduled(id: &str, hhmm: &str) -> InstanceRecord {
    InstanceRecord::new(id, InstanceStatus::Running)
        .with_tag(TAG_OPT_IN, "true")
        .with_tag(TAG_SCHEDULED_TIME, hhmm)
        .with_tag(TAG_OWNER_EMAIL, "owner@example.com")
}

/// Notifier that remembers what it was asked to send.
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<Notice>>,
    failing: AtomicBool,
    hangs_for: Mutex<Option<String>>,
}

impl RecordingNotifier {
    /// Never answer for notices about `instance_name`.
    pub fn hang_for(&self, instance_name: &str) {
        *self.hangs_for.lock().unwrap() = Some(instance_name.to_string());
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<Notice> {
        self.sent.lock().unwrap().clone()
    }

    /// Token from the most recent postpone notice.
    pub fn last_token(&self) -> Option<String> {
        self.sent().into_iter().rev().find_map(|n| match n.kind {
            NoticeKind::Postpone { token, .. } => Some(token),
            NoticeKind::Shutdown { .. } => None,
        })
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, notice: &Notice) -> anyhow::Result<()> {
        let hangs =
            self.hangs_for.lock().unwrap().as_deref() == Some(notice.instance_name.as_str());
        if hangs {
            std::future::pending::<()>().await;
        }
        if self.failing.load(Ordering::SeqCst) {
            anyhow::bail!("relay unavailable");
        }
        self.sent.lock().unwrap().push(notice.clone());
        Ok(())
    }
}

/// Repository that delegates to a store but fails every write and stop for
/// one instance, or the listing itself.
pub struct FaultyRepo {
    pub inner: StateStore,
    pub broken: String,
    pub fail_listing: bool,
}

#[async_trait]
impl InstanceRepository for FaultyRepo {
    async fn list_eligible_running_instances(&self) -> anyhow::Result<Vec<Instance>> {
        if self.fail_listing {
            anyhow::bail!("describe call throttled");
        }
        self.inner.list_eligible_running_instances().await
    }

    async fn get_instance(&self, id: &str) -> anyhow::Result<Option<Instance>> {
        InstanceRepository::get_instance(&self.inner, id).await
    }

    async fn set_tags(&self, id: &str, tags: &[(&str, &str)]) -> anyhow::Result<()> {
        if id == self.broken {
            anyhow::bail!("tag write rejected");
        }
        self.inner.set_tags(id, tags).await
    }

    async fn set_tags_if(
        &self,
        id: &str,
        guard_key: &str,
        expected: Option<&str>,
        tags: &[(&str, &str)],
    ) -> anyhow::Result<bool> {
        if id == self.broken {
            anyhow::bail!("tag write rejected");
        }
        self.inner.set_tags_if(id, guard_key, expected, tags).await
    }

    async fn delete_tags(&self, id: &str, keys: &[&str]) -> anyhow::Result<()> {
        if id == self.broken {
            anyhow::bail!("tag delete rejected");
        }
        self.inner.delete_tags(id, keys).await
    }

    async fn stop_instance(&self, id: &str) -> anyhow::Result<StopOutcome> {
        if id == self.broken {
            anyhow::bail!("stop rejected");
        }
        self.inner.stop_instance(id).await
    }
}

/// Repository whose conditional writes commit and then answer after
/// `delay`, as a slow backend would.
pub struct SlowAckRepo {
    pub inner: StateStore,
    pub delay: Duration,
}

#[async_trait]
impl InstanceRepository for SlowAckRepo {
    async fn list_eligible_running_instances(&self) -> anyhow::Result<Vec<Instance>> {
        self.inner.list_eligible_running_instances().await
    }

    async fn get_instance(&self, id: &str) -> anyhow::Result<Option<Instance>> {
        InstanceRepository::get_instance(&self.inner, id).await
    }

    async fn set_tags(&self, id: &str, tags: &[(&str, &str)]) -> anyhow::Result<()> {
        self.inner.set_tags(id, tags).await
    }

    async fn set_tags_if(
        &self,
        id: &str,
        guard_key: &str,
        expected: Option<&str>,
        tags: &[(&str, &str)],
    ) -> anyhow::Result<bool> {
        let applied = self.inner.set_tags_if(id, guard_key, expected, tags).await?;
        tokio::time::sleep(self.delay).await;
        Ok(applied)
    }

    async fn delete_tags(&self, id: &str, keys: &[&str]) -> anyhow::Result<()> {
        self.inner.delete_tags(id, keys).await
    }

    async fn stop_instance(&self, id: &str) -> anyhow::Result<StopOutcome> {
        self.inner.stop_instance(id).await
    }
}
