//! Shutdown-window arithmetic.
//!
//! A deadline is a bare time of day. It is always anchored on *today's*
//! calendar date, so once the time has passed the deadline is in the past
//! (negative) rather than rolling over to tomorrow. The difference
//! `deadline_today - now` is split with floor semantics into whole days and
//! a non-negative remainder of seconds:
//!
//! ```text
//! days ==  0  → Upcoming { seconds_until = remainder }
//! days == -1  → Overdue  { seconds_since = 86400 - remainder }
//! otherwise   → Unclassified
//! ```
//!
//! Because the anchor is today, the overdue figure is only meaningful
//! within the last 24 hours; callers must not read more into it.

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, TimeZone};

use crate::types::ShutdownTime;

const SECONDS_PER_DAY: i64 = 24 * 60 * 60;
const MILLIS_PER_DAY: i64 = SECONDS_PER_DAY * 1000;

/// One instant, carried both as local wall-clock time (for time-of-day
/// arithmetic) and as unix seconds (for token expiry).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Moment {
    pub wall: NaiveDateTime,
    pub epoch_secs: i64,
}

impl Moment {
    /// The current instant in the host's local time zone.
    pub fn now() -> Self {
        Self::from_datetime(&Local::now())
    }

    pub fn from_datetime<Tz: TimeZone>(dt: &DateTime<Tz>) -> Self {
        Self {
            wall: dt.naive_local(),
            epoch_secs: dt.timestamp(),
        }
    }

    pub fn today(&self) -> NaiveDate {
        self.wall.date()
    }
}

/// Where `now` sits relative to today's occurrence of a deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeadlineWindow {
    /// The deadline is later today.
    Upcoming { seconds_until: i64 },
    /// The deadline already passed today.
    Overdue { seconds_since: i64 },
    /// Outside the one-day band on either side.
    Unclassified,
}

impl DeadlineWindow {
    /// Signed whole minutes until the deadline; negative once overdue.
    pub fn signed_minutes(&self) -> Option<i64> {
        match *self {
            DeadlineWindow::Upcoming { seconds_until } => Some(seconds_until / 60),
            DeadlineWindow::Overdue { seconds_since } => Some(-(seconds_since / 60)),
            DeadlineWindow::Unclassified => None,
        }
    }

    /// Upcoming and no more than `lead_minutes` away.
    pub fn within_lead(&self, lead_minutes: u32) -> bool {
        matches!(*self, DeadlineWindow::Upcoming { seconds_until }
            if seconds_until <= i64::from(lead_minutes) * 60)
    }

    /// Overdue by no more than `window_minutes`.
    pub fn within_shutdown_window(&self, window_minutes: u32) -> bool {
        matches!(*self, DeadlineWindow::Overdue { seconds_since }
            if seconds_since <= i64::from(window_minutes) * 60)
    }
}

/// Today's occurrence of `deadline`, on `now`'s calendar date.
pub fn deadline_today(now: &NaiveDateTime, deadline: ShutdownTime) -> NaiveDateTime {
    now.date()
        .and_hms_opt(u32::from(deadline.hour()), u32::from(deadline.minute()), 0)
        .unwrap_or(*now)
}

/// Classify `now` against today's occurrence of `deadline`.
pub fn classify(now: &NaiveDateTime, deadline: ShutdownTime) -> DeadlineWindow {
    let diff_ms = (deadline_today(now, deadline) - *now).num_milliseconds();
    let days = diff_ms.div_euclid(MILLIS_PER_DAY);
    let remainder_secs = diff_ms.rem_euclid(MILLIS_PER_DAY) / 1000;

    match days {
        0 => DeadlineWindow::Upcoming {
            seconds_until: remainder_secs,
        },
        -1 => DeadlineWindow::Overdue {
            seconds_since: SECONDS_PER_DAY - remainder_secs,
        },
        _ => DeadlineWindow::Unclassified,
    }
}

/// Signed whole minutes from `now` to today's `deadline`.
pub fn signed_minutes_until(now: &NaiveDateTime, deadline: ShutdownTime) -> Option<i64> {
    classify(now, deadline).signed_minutes()
}
