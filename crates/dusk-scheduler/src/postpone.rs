//! Redeems one-time postponement tokens for a later deadline.
//!
//! The token is taken (read and deleted atomically) before anything else
//! happens, so two submissions of the same token can never both extend the
//! deadline. If the extension then fails before the deadline could have
//! moved, the token is put back and stays usable until it expires. A
//! deadline write with an unknown result is checked by re-reading the
//! instance; unless the deadline is provably unchanged the token stays
//! consumed.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, error, info, warn};

use dusk_core::{
    DuskConfig, Instance, InstanceRepository, Moment, PostponementToken, ShutdownTime, TokenStore,
};

use crate::error::SchedulerError;
use crate::tracking::{bounded, ScheduleWriter};

/// Attempts at the conditional deadline write before giving up.
const MAX_ATTEMPTS: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PostponeStatus {
    Success,
    /// Missing, expired, or already used.
    InvalidToken,
    /// The token is fine but its instance is gone or not running.
    InstanceNotRunning,
    /// A store or repository call failed.
    CollaboratorFailure,
}

impl PostponeStatus {
    /// HTTP status for the callback boundary.
    pub fn status_code(&self) -> u16 {
        match self {
            PostponeStatus::Success => 200,
            _ => 400,
        }
    }
}

impl fmt::Display for PostponeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PostponeStatus::Success => "success",
            PostponeStatus::InvalidToken => "invalid_token",
            PostponeStatus::InstanceNotRunning => "instance_not_running",
            PostponeStatus::CollaboratorFailure => "collaborator_failure",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PostponeOutcome {
    pub status: PostponeStatus,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_deadline: Option<ShutdownTime>,
}

impl PostponeOutcome {
    fn invalid_token() -> Self {
        Self {
            status: PostponeStatus::InvalidToken,
            message: "The supplied token cannot be found in our records.\n\
                      This could be due to the following:\n \
                      - token is invalid\n \
                      - token has been used once already\n \
                      - the instance that the token refers to has already been automatically shutdown"
                .to_string(),
            new_deadline: None,
        }
    }

    fn not_running(instance_id: &str) -> Self {
        Self {
            status: PostponeStatus::InstanceNotRunning,
            message: format!(
                "Error: Token is valid however no running instance with id {instance_id} was found"
            ),
            new_deadline: None,
        }
    }

    fn failure() -> Self {
        Self {
            status: PostponeStatus::CollaboratorFailure,
            message: "The shutdown could not be postponed because of an internal error. \
                      Please try again shortly."
                .to_string(),
            new_deadline: None,
        }
    }
}

/// Whether a failed extension may have moved the deadline anyway.
enum WriteState {
    NotAttempted,
    /// The conditional write guarded on this deadline failed or timed out.
    Unconfirmed(Option<ShutdownTime>),
}

struct Incomplete {
    error: SchedulerError,
    write: WriteState,
}

impl From<SchedulerError> for Incomplete {
    fn from(error: SchedulerError) -> Self {
        Self {
            error,
            write: WriteState::NotAttempted,
        }
    }
}

pub struct PostponementHandler {
    config: Arc<DuskConfig>,
    repo: Arc<dyn InstanceRepository>,
    tokens: Arc<dyn TokenStore>,
    writer: ScheduleWriter,
}

impl PostponementHandler {
    pub fn new(
        config: Arc<DuskConfig>,
        repo: Arc<dyn InstanceRepository>,
        tokens: Arc<dyn TokenStore>,
    ) -> Self {
        let writer = ScheduleWriter::new(repo.clone(), config.call_timeout());
        Self {
            config,
            repo,
            tokens,
            writer,
        }
    }

    fn timeout(&self) -> Duration {
        self.config.call_timeout()
    }

    /// Redeem `token` for one deadline extension.
    pub async fn postpone(&self, token: &str, now: &Moment) -> PostponeOutcome {
        let token = token.trim();
        if token.is_empty() {
            return PostponeOutcome::invalid_token();
        }

        let taken = bounded(
            self.timeout(),
            "take token",
            self.tokens.take(token, now.epoch_secs),
        )
        .await;
        let record = match taken {
            Ok(Some(record)) => record,
            Ok(None) => {
                info!("postponement requested with unknown, used, or expired token");
                return PostponeOutcome::invalid_token();
            }
            Err(e) => {
                error!(error = %e, "token lookup failed");
                return PostponeOutcome::failure();
            }
        };

        match self.extend(&record.instance_id).await {
            Ok(outcome) => {
                if outcome.status != PostponeStatus::Success {
                    self.restore(&record).await;
                }
                outcome
            }
            Err(incomplete) => {
                error!(
                    instance_id = %record.instance_id,
                    error = %incomplete.error,
                    "postponement failed"
                );
                let untouched = match incomplete.write {
                    WriteState::NotAttempted => true,
                    WriteState::Unconfirmed(expected) => {
                        self.deadline_unchanged(&record.instance_id, expected).await
                    }
                };
                if untouched {
                    self.restore(&record).await;
                } else {
                    warn!(
                        instance_id = %record.instance_id,
                        "deadline write may have landed; token stays consumed"
                    );
                }
                PostponeOutcome::failure()
            }
        }
    }

    async fn extend(&self, instance_id: &str) -> Result<PostponeOutcome, Incomplete> {
        for attempt in 1..=MAX_ATTEMPTS {
            let instance = bounded(
                self.timeout(),
                "look up instance",
                self.repo.get_instance(instance_id),
            )
            .await?;
            let Some(instance) = instance.filter(Instance::is_running) else {
                info!(%instance_id, "token redeemed for an instance that is not running");
                return Ok(PostponeOutcome::not_running(instance_id));
            };

            let current = instance.schedule.actual_deadline;
            let base = current
                .or(instance.schedule.scheduled_time)
                .ok_or_else(|| SchedulerError::Untracked(instance_id.to_string()))?;
            let new_deadline = base.postponed_by(self.config.postpone_by_hours);

            let written = self
                .writer
                .postpone(instance_id, current, new_deadline)
                .await
                .map_err(|error| Incomplete {
                    error,
                    write: WriteState::Unconfirmed(current),
                })?;
            if written {
                info!(%instance_id, from = %base, to = %new_deadline, "shutdown postponed");
                return Ok(self.success(&instance, new_deadline));
            }
            debug!(%instance_id, attempt, "deadline moved concurrently; retrying");
        }
        Err(SchedulerError::Conflict(instance_id.to_string()).into())
    }

    /// Whether the deadline still reads `expected` after a write whose
    /// result is unknown. Any doubt counts as changed.
    async fn deadline_unchanged(&self, instance_id: &str, expected: Option<ShutdownTime>) -> bool {
        let fresh = bounded(
            self.timeout(),
            "re-read instance",
            self.repo.get_instance(instance_id),
        )
        .await;
        match fresh {
            Ok(Some(instance)) => instance.schedule.actual_deadline == expected,
            Ok(None) => true,
            Err(e) => {
                warn!(%instance_id, error = %e, "could not confirm deadline after failed write");
                false
            }
        }
    }

    fn success(&self, instance: &Instance, new_deadline: ShutdownTime) -> PostponeOutcome {
        PostponeOutcome {
            status: PostponeStatus::Success,
            message: format!(
                "The scheduled shutdown time for your instance {name} has been successfully postponed by {hours} hour(s).\n\
                 It is now scheduled to automatically shutdown at {new_deadline}.\n\
                 You will receive an email notification approximately {lead} minutes before the scheduled shutdown time.",
                name = instance.label(),
                hours = self.config.postpone_by_hours,
                lead = self.config.notify_lead_minutes,
            ),
            new_deadline: Some(new_deadline),
        }
    }

    async fn restore(&self, record: &PostponementToken) {
        match bounded(self.timeout(), "restore token", self.tokens.put(record)).await {
            Ok(()) => debug!(
                instance_id = %record.instance_id,
                "token restored after unsuccessful postponement"
            ),
            Err(e) => warn!(
                instance_id = %record.instance_id,
                error = %e,
                "token could not be restored"
            ),
        }
    }
}
