//! Typed writes of scheduling state.
//!
//! Every write is bounded by the collaborator timeout. The writes that
//! depend on the current deadline are conditional on it, so a concurrent
//! postponement cannot be silently overwritten by a stale evaluation pass.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use dusk_core::{InstanceRepository, ShutdownTime, TAG_ACTUAL_DEADLINE, TAG_NOTIFICATION_SENT};

use crate::error::{SchedulerError, SchedulerResult};

/// Run one collaborator call under `limit`.
pub(crate) async fn bounded<T, F>(
    limit: Duration,
    operation: &'static str,
    fut: F,
) -> SchedulerResult<T>
where
    F: Future<Output = anyhow::Result<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(source)) => Err(SchedulerError::Collaborator { operation, source }),
        Err(_) => Err(SchedulerError::Timeout {
            operation,
            secs: limit.as_secs(),
        }),
    }
}

#[derive(Clone)]
pub struct ScheduleWriter {
    repo: Arc<dyn InstanceRepository>,
    timeout: Duration,
}

impl ScheduleWriter {
    pub fn new(repo: Arc<dyn InstanceRepository>, timeout: Duration) -> Self {
        Self { repo, timeout }
    }

    /// Start tracking: copy the scheduled time into the deadline, but only
    /// if no deadline exists yet.
    pub async fn init_deadline(&self, id: &str, scheduled: ShutdownTime) -> SchedulerResult<bool> {
        let value = scheduled.to_string();
        bounded(
            self.timeout,
            "initialize deadline",
            self.repo.set_tags_if(
                id,
                TAG_ACTUAL_DEADLINE,
                None,
                &[(TAG_ACTUAL_DEADLINE, value.as_str())],
            ),
        )
        .await
    }

    /// Record that the notice for `deadline` went out.
    pub async fn mark_notified(&self, id: &str, deadline: ShutdownTime) -> SchedulerResult<bool> {
        let expected = deadline.to_string();
        bounded(
            self.timeout,
            "mark notification sent",
            self.repo.set_tags_if(
                id,
                TAG_ACTUAL_DEADLINE,
                Some(expected.as_str()),
                &[(TAG_NOTIFICATION_SENT, "True")],
            ),
        )
        .await
    }

    /// Move the deadline and re-arm the notice, guarded on the deadline that
    /// was read (`None` when it was absent).
    pub async fn postpone(
        &self,
        id: &str,
        current: Option<ShutdownTime>,
        new_deadline: ShutdownTime,
    ) -> SchedulerResult<bool> {
        let expected = current.map(|t| t.to_string());
        let value = new_deadline.to_string();
        bounded(
            self.timeout,
            "postpone deadline",
            self.repo.set_tags_if(
                id,
                TAG_ACTUAL_DEADLINE,
                expected.as_deref(),
                &[(TAG_ACTUAL_DEADLINE, value.as_str()), (TAG_NOTIFICATION_SENT, "False")],
            ),
        )
        .await
    }

    /// Stop tracking: drop the deadline and the notice flag together.
    pub async fn clear(&self, id: &str) -> SchedulerResult<()> {
        bounded(
            self.timeout,
            "clear tracking",
            self.repo.delete_tags(id, &[TAG_ACTUAL_DEADLINE, TAG_NOTIFICATION_SENT]),
        )
        .await
    }
}
