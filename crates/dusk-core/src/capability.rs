//! Capabilities the scheduler consumes from its collaborators.
//!
//! Implementations live elsewhere (`dusk-state` for the local registry and
//! token store, `dusk-notify` for delivery). Methods return
//! `anyhow::Result` so backends with unrelated error types compose.

use async_trait::async_trait;

use crate::types::{Instance, Notice, PostponementToken, StopOutcome};

/// Instance discovery and tag storage.
#[async_trait]
pub trait InstanceRepository: Send + Sync {
    /// All instances tagged `autoshutdown=true` that are currently running.
    async fn list_eligible_running_instances(&self) -> anyhow::Result<Vec<Instance>>;

    /// Look up one instance regardless of state or eligibility.
    async fn get_instance(&self, id: &str) -> anyhow::Result<Option<Instance>>;

    /// Set (create or overwrite) tags in a single call.
    async fn set_tags(&self, id: &str, tags: &[(&str, &str)]) -> anyhow::Result<()>;

    /// Set tags only if `guard_key` currently holds `expected`
    /// (`None` meaning absent). Returns `false` when the guard did not match
    /// and nothing was written.
    async fn set_tags_if(
        &self,
        id: &str,
        guard_key: &str,
        expected: Option<&str>,
        tags: &[(&str, &str)],
    ) -> anyhow::Result<bool>;

    /// Remove tags in a single call. Missing keys are ignored.
    async fn delete_tags(&self, id: &str, keys: &[&str]) -> anyhow::Result<()>;

    /// Stop the instance.
    async fn stop_instance(&self, id: &str) -> anyhow::Result<StopOutcome>;
}

/// Storage for postponement tokens.
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Store a freshly issued token.
    async fn put(&self, token: &PostponementToken) -> anyhow::Result<()>;

    /// Atomically read and delete a token.
    ///
    /// Returns the instance id only for a live token. Expired tokens are
    /// deleted and reported as absent. Of two concurrent calls with the same
    /// token at most one observes `Some`.
    async fn take(&self, token: &str, now_epoch: i64) -> anyhow::Result<Option<PostponementToken>>;

    /// Delete a token without reading it. Returns whether it existed.
    async fn remove(&self, token: &str) -> anyhow::Result<bool>;

    /// Delete every token that expired at or before `now_epoch`.
    async fn purge_expired(&self, now_epoch: i64) -> anyhow::Result<u32>;
}

/// Delivery of owner notices.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, notice: &Notice) -> anyhow::Result<()>;
}
