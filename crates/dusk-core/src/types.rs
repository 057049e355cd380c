//! Shared types used across dusk crates.
//!
//! Scheduling state lives as key/value tags on the instance itself. The
//! repository hands it out already parsed into a typed [`Schedule`]; the
//! tag keys below are the only place the raw names appear.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Opt-in marker; only `autoshutdown=true` instances are evaluated.
pub const TAG_OPT_IN: &str = "autoshutdown";
/// Owner-set shutdown time (`HHMM`), never mutated by dusk.
pub const TAG_SCHEDULED_TIME: &str = "shutdown_time";
/// Currently effective deadline (`HHMM`).
pub const TAG_ACTUAL_DEADLINE: &str = "actual_shutdown_time";
/// `"True"` once a postpone notice went out for the current deadline.
pub const TAG_NOTIFICATION_SENT: &str = "email_notification_sent";
/// Destination address for notices.
pub const TAG_OWNER_EMAIL: &str = "owner_email";
/// Human label.
pub const TAG_NAME: &str = "Name";

/// Unique identifier for an instance.
pub type InstanceId = String;

// ── Shutdown time ──────────────────────────────────────────────────

/// A wall-clock time of day in `HHMM` form, with no date attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ShutdownTime {
    hour: u8,
    minute: u8,
}

impl ShutdownTime {
    pub fn new(hour: u8, minute: u8) -> Option<Self> {
        (hour < 24 && minute < 60).then_some(Self { hour, minute })
    }

    pub fn hour(&self) -> u8 {
        self.hour
    }

    pub fn minute(&self) -> u8 {
        self.minute
    }

    /// The `HHMM` value as a plain integer (`0930` → `930`).
    pub fn as_hhmm(&self) -> u32 {
        u32::from(self.hour) * 100 + u32::from(self.minute)
    }

    /// Shift the deadline by whole hours: `(HHMM + hours*100) mod 2400`.
    ///
    /// Wraps across midnight; the result carries no date.
    pub fn postponed_by(&self, hours: u32) -> Self {
        let shifted = (self.as_hhmm() + (hours % 24) * 100) % 2400;
        Self {
            hour: (shifted / 100) as u8,
            minute: self.minute,
        }
    }
}

impl fmt::Display for ShutdownTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}{:02}", self.hour, self.minute)
    }
}

impl FromStr for ShutdownTime {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || CoreError::InvalidShutdownTime {
            value: s.to_string(),
        };
        if s.len() != 4 || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        let hour: u8 = s[..2].parse().map_err(|_| invalid())?;
        let minute: u8 = s[2..].parse().map_err(|_| invalid())?;
        Self::new(hour, minute).ok_or_else(invalid)
    }
}

impl Serialize for ShutdownTime {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ShutdownTime {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

// ── Instance ───────────────────────────────────────────────────────

/// Lifecycle state reported by the instance repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstanceStatus {
    Running,
    Stopped,
    Other,
}

impl fmt::Display for InstanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            InstanceStatus::Running => "running",
            InstanceStatus::Stopped => "stopped",
            InstanceStatus::Other => "other",
        };
        f.write_str(s)
    }
}

/// Typed view of the scheduling tags on one instance.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Schedule {
    pub scheduled_time: Option<ShutdownTime>,
    pub actual_deadline: Option<ShutdownTime>,
    pub notification_sent: bool,
    pub owner_email: Option<String>,
}

impl Schedule {
    /// Parse the scheduling tags.
    ///
    /// Unknown tags are ignored. A malformed `HHMM` value is an error so the
    /// caller can skip the instance instead of acting on a bad deadline.
    pub fn from_tags(tags: &BTreeMap<String, String>) -> Result<Self, CoreError> {
        let time = |key: &str| -> Result<Option<ShutdownTime>, CoreError> {
            tags.get(key).map(|v| v.parse()).transpose()
        };
        Ok(Self {
            scheduled_time: time(TAG_SCHEDULED_TIME)?,
            actual_deadline: time(TAG_ACTUAL_DEADLINE)?,
            notification_sent: tags
                .get(TAG_NOTIFICATION_SENT)
                .is_some_and(|v| v == "True"),
            owner_email: tags
                .get(TAG_OWNER_EMAIL)
                .filter(|v| !v.is_empty())
                .cloned(),
        })
    }

    /// Tracking is active while a deadline is set.
    pub fn is_tracked(&self) -> bool {
        self.actual_deadline.is_some()
    }
}

/// An instance as seen by the scheduler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instance {
    pub id: InstanceId,
    pub display_name: Option<String>,
    pub status: InstanceStatus,
    pub eligible: bool,
    pub schedule: Schedule,
}

impl Instance {
    /// Name used in notices: `Name(id)` when labelled, else the bare id.
    pub fn label(&self) -> String {
        match &self.display_name {
            Some(name) => format!("{name}({})", self.id),
            None => self.id.clone(),
        }
    }

    pub fn is_running(&self) -> bool {
        self.status == InstanceStatus::Running
    }
}

/// Result of asking the repository to stop an instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StopOutcome {
    pub instance_id: InstanceId,
    pub previous: InstanceStatus,
    pub current: InstanceStatus,
}

impl fmt::Display for StopOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "instance {} transitioned {} -> {}",
            self.instance_id, self.previous, self.current
        )
    }
}

// ── Tokens ─────────────────────────────────────────────────────────

/// Single-use bearer credential authorizing one deadline extension.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostponementToken {
    pub token: String,
    pub instance_id: InstanceId,
    /// Absolute expiry, unix seconds.
    pub expires_at: i64,
}

impl PostponementToken {
    pub fn is_expired(&self, now_epoch: i64) -> bool {
        now_epoch >= self.expires_at
    }
}

// ── Notices ────────────────────────────────────────────────────────

/// What a notice is about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NoticeKind {
    /// Shutdown is `lead_minutes` away; `token` authorizes one postponement.
    Postpone { lead_minutes: i64, token: String },
    /// The instance was stopped; `outcome` describes the stop call.
    Shutdown { outcome: String },
}

/// A message addressed to an instance owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub kind: NoticeKind,
    pub to: String,
    pub instance_name: String,
}

impl Notice {
    pub fn kind_label(&self) -> &'static str {
        match self.kind {
            NoticeKind::Postpone { .. } => "postpone",
            NoticeKind::Shutdown { .. } => "shutdown",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn parse_valid_shutdown_times() {
        let t: ShutdownTime = "0930".parse().unwrap();
        assert_eq!((t.hour(), t.minute()), (9, 30));
        assert_eq!(t.to_string(), "0930");
        assert_eq!("0000".parse::<ShutdownTime>().unwrap().as_hhmm(), 0);
        assert_eq!("2359".parse::<ShutdownTime>().unwrap().as_hhmm(), 2359);
    }

    #[test]
    fn reject_malformed_shutdown_times() {
        for bad in ["930", "09300", "2400", "1260", "ab12", "", "-930", "+930"] {
            assert!(bad.parse::<ShutdownTime>().is_err(), "{bad} should fail");
        }
    }

    #[test]
    fn postpone_wraps_past_midnight() {
        let t: ShutdownTime = "2330".parse().unwrap();
        assert_eq!(t.postponed_by(1).to_string(), "0030");
        let t: ShutdownTime = "0900".parse().unwrap();
        assert_eq!(t.postponed_by(2).to_string(), "1100");
        assert_eq!(t.postponed_by(24).to_string(), "0900");
        assert_eq!(t.postponed_by(25).to_string(), "1000");
    }

    #[test]
    fn schedule_from_tags() {
        let schedule = Schedule::from_tags(&tags(&[
            (TAG_OPT_IN, "true"),
            (TAG_SCHEDULED_TIME, "1800"),
            (TAG_ACTUAL_DEADLINE, "1900"),
            (TAG_NOTIFICATION_SENT, "True"),
            (TAG_OWNER_EMAIL, "ops@example.com"),
        ]))
        .unwrap();

        assert_eq!(schedule.scheduled_time, ShutdownTime::new(18, 0));
        assert_eq!(schedule.actual_deadline, ShutdownTime::new(19, 0));
        assert!(schedule.notification_sent);
        assert_eq!(schedule.owner_email.as_deref(), Some("ops@example.com"));
        assert!(schedule.is_tracked());
    }

    #[test]
    fn notification_flag_only_true_for_literal() {
        for value in ["true", "False", "1", "yes"] {
            let schedule = Schedule::from_tags(&tags(&[(TAG_NOTIFICATION_SENT, value)])).unwrap();
            assert!(!schedule.notification_sent, "{value}");
        }
    }

    #[test]
    fn schedule_rejects_bad_deadline() {
        let result = Schedule::from_tags(&tags(&[(TAG_ACTUAL_DEADLINE, "7pm")]));
        assert!(matches!(result, Err(CoreError::InvalidShutdownTime { .. })));
    }

    #[test]
    fn instance_label() {
        let mut inst = Instance {
            id: "i-0abc".to_string(),
            display_name: None,
            status: InstanceStatus::Running,
            eligible: true,
            schedule: Schedule::default(),
        };
        assert_eq!(inst.label(), "i-0abc");
        inst.display_name = Some("build-box".to_string());
        assert_eq!(inst.label(), "build-box(i-0abc)");
    }

    #[test]
    fn token_expiry_is_inclusive() {
        let token = PostponementToken {
            token: "t".to_string(),
            instance_id: "i-1".to_string(),
            expires_at: 1000,
        };
        assert!(!token.is_expired(999));
        assert!(token.is_expired(1000));
    }
}
