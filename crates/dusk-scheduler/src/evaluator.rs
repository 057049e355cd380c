//! The periodic shutdown pass.
//!
//! For every eligible running instance the evaluator moves the tracking
//! state machine forward by at most one step:
//!
//! ```text
//! untracked ──(scheduled time present)──▶ tracked(deadline, notified=false)
//! tracked, upcoming within lead, !notified ──▶ token issued, notice sent, notified=true
//! tracked, overdue within shutdown window ──▶ stopped, tracking cleared, notice sent
//! tracked, overdue beyond window ──▶ left running (logged)
//! ```
//!
//! A failure on one instance is recorded in the report and the pass moves
//! on to the next one.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use dusk_core::window::{self, DeadlineWindow};
use dusk_core::{
    DuskConfig, Instance, InstanceRepository, Moment, Notice, NoticeKind, Notifier,
    PostponementToken, ShutdownTime, TokenStore,
};

use crate::error::SchedulerResult;
use crate::tracking::{bounded, ScheduleWriter};

/// What the pass did to one instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// No deadline and no scheduled time: nothing to track.
    Untracked,
    /// Deadline is further away than the lead window.
    NotDue,
    /// Inside the lead window but the notice already went out.
    AlreadyNotified,
    /// Inside the lead window but there is nobody to tell.
    NoRecipient,
    /// Postpone notice sent with this lead time.
    Notified { lead_minutes: i64 },
    /// Instance stopped and tracking cleared.
    ShutDown { notice_sent: bool },
    /// Overdue, but longer ago than the shutdown window.
    OutsideWindow { minutes_since: i64 },
}

/// Per-instance result of one evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceOutcome {
    /// The deadline was initialized from the scheduled time on this pass.
    pub initialized: bool,
    pub action: Action,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstanceFailure {
    pub instance_id: String,
    pub error: String,
}

/// Aggregate result of one pass over all eligible instances.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EvaluationReport {
    pub examined: u32,
    pub initialized: u32,
    pub notified: u32,
    pub shut_down: u32,
    pub outside_window: u32,
    pub failures: Vec<InstanceFailure>,
}

impl EvaluationReport {
    fn record(&mut self, outcome: &InstanceOutcome) {
        if outcome.initialized {
            self.initialized += 1;
        }
        match outcome.action {
            Action::Notified { .. } => self.notified += 1,
            Action::ShutDown { .. } => self.shut_down += 1,
            Action::OutsideWindow { .. } => self.outside_window += 1,
            _ => {}
        }
    }
}

/// Response of the trigger boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerResponse {
    pub status_code: u16,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<EvaluationReport>,
}

pub struct Evaluator {
    config: Arc<DuskConfig>,
    repo: Arc<dyn InstanceRepository>,
    tokens: Arc<dyn TokenStore>,
    notifier: Arc<dyn Notifier>,
    writer: ScheduleWriter,
}

impl Evaluator {
    pub fn new(
        config: Arc<DuskConfig>,
        repo: Arc<dyn InstanceRepository>,
        tokens: Arc<dyn TokenStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let writer = ScheduleWriter::new(repo.clone(), config.call_timeout());
        Self {
            config,
            repo,
            tokens,
            notifier,
            writer,
        }
    }

    fn timeout(&self) -> Duration {
        self.config.call_timeout()
    }

    /// Run one pass over all eligible running instances.
    ///
    /// Only a failure to list the instances fails the pass; everything
    /// per-instance ends up in [`EvaluationReport::failures`].
    pub async fn evaluate_all(&self, now: &Moment) -> SchedulerResult<EvaluationReport> {
        let instances = bounded(
            self.timeout(),
            "list eligible instances",
            self.repo.list_eligible_running_instances(),
        )
        .await?;

        if instances.is_empty() {
            info!("no running instances opted into autoshutdown");
        } else {
            info!(count = instances.len(), "evaluating instances");
        }

        let mut report = EvaluationReport::default();
        for instance in &instances {
            report.examined += 1;
            match self.evaluate_instance(instance, now).await {
                Ok(outcome) => {
                    debug!(instance_id = %instance.id, ?outcome, "instance evaluated");
                    report.record(&outcome);
                }
                Err(e) => {
                    error!(instance_id = %instance.id, error = %e, "instance evaluation failed");
                    report.failures.push(InstanceFailure {
                        instance_id: instance.id.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }
        Ok(report)
    }

    /// Advance one instance's tracking state by a single step.
    pub async fn evaluate_instance(
        &self,
        instance: &Instance,
        now: &Moment,
    ) -> SchedulerResult<InstanceOutcome> {
        let schedule = &instance.schedule;
        let mut initialized = false;
        let mut deadline = schedule.actual_deadline;
        let mut notification_sent = schedule.notification_sent;

        if deadline.is_none()
            && let Some(scheduled) = schedule.scheduled_time
        {
            if self.writer.init_deadline(&instance.id, scheduled).await? {
                info!(
                    instance_id = %instance.id,
                    deadline = %scheduled,
                    "deadline tracking started"
                );
                initialized = true;
                deadline = Some(scheduled);
            } else {
                // Someone else set it between the listing and now; use theirs.
                let fresh = bounded(
                    self.timeout(),
                    "reload instance",
                    self.repo.get_instance(&instance.id),
                )
                .await?;
                if let Some(fresh) = fresh {
                    deadline = fresh.schedule.actual_deadline;
                    notification_sent = fresh.schedule.notification_sent;
                }
            }
        }

        let Some(deadline) = deadline else {
            return Ok(InstanceOutcome {
                initialized,
                action: Action::Untracked,
            });
        };

        let window = window::classify(&now.wall, deadline);
        debug!(
            instance_id = %instance.id,
            %deadline,
            now = %now.wall,
            minutes = ?window.signed_minutes(),
            notification_sent,
            "deadline classified"
        );

        let action = if window.within_lead(self.config.notify_lead_minutes) {
            if notification_sent {
                Action::AlreadyNotified
            } else {
                self.send_postpone_notice(instance, deadline, window, now)
                    .await?
            }
        } else if window.within_shutdown_window(self.config.shutdown_window_minutes) {
            self.shut_down(instance).await?
        } else if let DeadlineWindow::Overdue { seconds_since } = window {
            info!(
                instance_id = %instance.id,
                %deadline,
                minutes_since = seconds_since / 60,
                window = self.config.shutdown_window_minutes,
                "deadline passed outside the shutdown window; leaving instance running"
            );
            Action::OutsideWindow {
                minutes_since: seconds_since / 60,
            }
        } else {
            Action::NotDue
        };

        Ok(InstanceOutcome {
            initialized,
            action,
        })
    }

    async fn send_postpone_notice(
        &self,
        instance: &Instance,
        deadline: ShutdownTime,
        window: DeadlineWindow,
        now: &Moment,
    ) -> SchedulerResult<Action> {
        let Some(to) = instance.schedule.owner_email.clone() else {
            warn!(instance_id = %instance.id, "shutdown is near but no owner_email tag is set");
            return Ok(Action::NoRecipient);
        };

        let lead_minutes = window.signed_minutes().unwrap_or(0).max(0);
        let token = PostponementToken {
            token: uuid::Uuid::new_v4().to_string(),
            instance_id: instance.id.clone(),
            expires_at: now.epoch_secs + self.config.token_ttl_secs(),
        };
        bounded(self.timeout(), "store token", self.tokens.put(&token)).await?;

        let notice = Notice {
            kind: NoticeKind::Postpone {
                lead_minutes,
                token: token.token.clone(),
            },
            to,
            instance_name: instance.label(),
        };
        let sent = bounded(
            self.timeout(),
            "send postpone notice",
            self.notifier.send(&notice),
        )
        .await;
        if let Err(e) = sent {
            // Nobody received this token; drop it so the next pass issues a fresh one.
            if let Err(cleanup) =
                bounded(self.timeout(), "discard token", self.tokens.remove(&token.token)).await
            {
                warn!(
                    instance_id = %instance.id,
                    error = %cleanup,
                    "failed to discard unsent token"
                );
            }
            return Err(e);
        }

        if !self.writer.mark_notified(&instance.id, deadline).await? {
            warn!(
                instance_id = %instance.id,
                %deadline,
                "deadline changed while the notice was being sent"
            );
        }
        info!(instance_id = %instance.id, lead_minutes, "postpone notice sent");
        Ok(Action::Notified { lead_minutes })
    }

    async fn shut_down(&self, instance: &Instance) -> SchedulerResult<Action> {
        let outcome = bounded(
            self.timeout(),
            "stop instance",
            self.repo.stop_instance(&instance.id),
        )
        .await?;
        self.writer.clear(&instance.id).await?;
        info!(instance_id = %instance.id, %outcome, "instance shut down; tracking cleared");

        let Some(to) = instance.schedule.owner_email.clone() else {
            warn!(instance_id = %instance.id, "instance shut down but no owner_email tag is set");
            return Ok(Action::ShutDown { notice_sent: false });
        };
        let notice = Notice {
            kind: NoticeKind::Shutdown {
                outcome: outcome.to_string(),
            },
            to,
            instance_name: instance.label(),
        };
        let sent = bounded(
            self.timeout(),
            "send shutdown notice",
            self.notifier.send(&notice),
        )
        .await;
        let notice_sent = match sent {
            Ok(()) => true,
            Err(e) => {
                warn!(instance_id = %instance.id, error = %e, "shutdown notice not delivered");
                false
            }
        };
        Ok(Action::ShutDown { notice_sent })
    }

    /// Trigger boundary: one pass, summarised as `{statusCode, message}`.
    pub async fn trigger(&self, now: &Moment) -> TriggerResponse {
        match self.evaluate_all(now).await {
            Ok(report) => {
                let message = if report.failures.is_empty() {
                    format!(
                        "successfully checked and actioned any shutdown events ({} examined, {} notified, {} shut down)",
                        report.examined, report.notified, report.shut_down
                    )
                } else {
                    format!(
                        "checked {} instance(s); {} could not be processed",
                        report.examined,
                        report.failures.len()
                    )
                };
                TriggerResponse {
                    status_code: 200,
                    message,
                    report: Some(report),
                }
            }
            Err(e) => {
                error!(error = %e, "evaluation pass failed");
                TriggerResponse {
                    status_code: 500,
                    message: format!("evaluation pass failed: {e}"),
                    report: None,
                }
            }
        }
    }

    /// Drop tokens that can no longer be used.
    pub async fn purge_tokens(&self, now: &Moment) -> SchedulerResult<u32> {
        bounded(
            self.timeout(),
            "purge expired tokens",
            self.tokens.purge_expired(now.epoch_secs),
        )
        .await
    }

    /// Run the periodic pass until `shutdown` flips. The first pass starts
    /// immediately.
    pub async fn run(&self, interval: Duration, mut shutdown: watch::Receiver<bool>) {
        info!(interval_secs = interval.as_secs(), "shutdown evaluator started");

        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let now = Moment::now();
                    let response = self.trigger(&now).await;
                    debug!(
                        status = response.status_code,
                        message = %response.message,
                        "pass complete"
                    );
                    match self.purge_tokens(&now).await {
                        Ok(0) => {}
                        Ok(purged) => debug!(purged, "expired tokens purged"),
                        Err(e) => warn!(error = %e, "token purge failed"),
                    }
                }
                _ = shutdown.changed() => {
                    info!("shutdown evaluator stopping");
                    break;
                }
            }
        }
    }
}
