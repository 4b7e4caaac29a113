//! Age-based note expiry.
//!
//! Temporary notes are hard deleted once they are `retention_days` old, and
//! recycle bin entries once they have been in the bin that long. The sweep is
//! driven by stored timestamps only, so it can run at startup or on a timer
//! without any per-note scheduling.
use std::{collections::BTreeMap, fmt};

use chrono::{DateTime, Duration, Utc};
use log::{debug, info, warn};

use crate::{Note, NoteStore, RemovalReason, Result, SweepReport};

/// Default number of days before temporary notes and bin entries are purged.
pub const DEFAULT_RETENTION_DAYS: i64 = 30;

/// Retention rules used by the sweep and the countdown display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpiryPolicy {
    pub retention_days: i64,
}

impl Default for ExpiryPolicy {
    fn default() -> Self {
        Self {
            retention_days: DEFAULT_RETENTION_DAYS,
        }
    }
}

impl ExpiryPolicy {
    pub fn new(retention_days: i64) -> Self {
        Self { retention_days }
    }

    /// Retention window, or `None` when it does not fit in a `Duration`.
    pub fn retention(&self) -> Option<Duration> {
        Duration::try_days(self.retention_days)
    }

    /// End of the retention window starting at `since`. `None` when the
    /// deadline is past the representable date range.
    pub fn deadline(&self, since: DateTime<Utc>) -> Option<DateTime<Utc>> {
        since.checked_add_signed(self.retention()?)
    }

    /// Whether something that started at `since` has outlived the retention
    /// window at `now`. Counts whole elapsed days.
    pub fn has_elapsed(&self, since: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        (now - since).num_days() >= self.retention_days
    }

    /// First rule that expires `note` at `now`, if any.
    ///
    /// The temporary check runs before the recycle bin check. A bin entry
    /// without a deletion date is measured from `now` and therefore kept.
    pub fn evaluate(&self, note: &Note, now: DateTime<Utc>) -> Option<RemovalReason> {
        if note.temporary && self.has_elapsed(note.created_at, now) {
            return Some(RemovalReason::TemporaryExpired);
        }

        if note.deleted && self.has_elapsed(note.deleted_at.unwrap_or(now), now) {
            return Some(RemovalReason::RecycleBinExpired);
        }

        None
    }

    /// Time left before `note` is purged, for temporary notes and bin entries.
    /// When both apply the earlier deadline wins. A deadline outside the
    /// supported date range counts as no deadline.
    pub fn countdown(&self, note: &Note, now: DateTime<Utc>) -> Option<Countdown> {
        let temporary_deadline = if note.temporary {
            self.deadline(note.created_at)
        } else {
            None
        };
        let bin_deadline = if note.deleted {
            note.deleted_at.and_then(|at| self.deadline(at))
        } else {
            None
        };

        let deadline = match (temporary_deadline, bin_deadline) {
            (Some(a), Some(b)) => a.min(b),
            (Some(a), None) | (None, Some(a)) => a,
            (None, None) => return None,
        };

        Some(Countdown::until(deadline, now))
    }
}

/// Remaining time shown next to expiring notes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Countdown {
    Remaining { days: i64, hours: i64, minutes: i64 },
    UnderAMinute,
    /// Past the deadline but not swept yet
    Expired,
}

impl Countdown {
    pub fn until(deadline: DateTime<Utc>, now: DateTime<Utc>) -> Self {
        let remaining = deadline - now;
        if remaining <= Duration::zero() {
            return Countdown::Expired;
        }

        let days = remaining.num_days();
        let hours = remaining.num_hours() % 24;
        let minutes = remaining.num_minutes() % 60;

        if days == 0 && hours == 0 && minutes == 0 {
            Countdown::UnderAMinute
        } else {
            Countdown::Remaining {
                days,
                hours,
                minutes,
            }
        }
    }
}

impl fmt::Display for Countdown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Countdown::Expired => f.write_str("Expired"),
            Countdown::UnderAMinute => f.write_str("⏱<1m"),
            Countdown::Remaining { days, hours, .. } if days > 0 => {
                write!(f, "⏱{}d {}h", days, hours)
            }
            Countdown::Remaining { hours, minutes, .. } if hours > 0 => {
                write!(f, "⏱{}h {}m", hours, minutes)
            }
            Countdown::Remaining { minutes, .. } => write!(f, "⏱{}m", minutes),
        }
    }
}

/// Runs one sweep at the current time.
pub fn sweep(store: &mut NoteStore, policy: &ExpiryPolicy) -> Result<SweepReport> {
    sweep_at(store, policy, Utc::now())
}

/// Removes every expired or corrupted record and persists if anything changed.
///
/// Records that are JSON objects but could not be read as notes (for example
/// because of a malformed timestamp) are skipped and left as they are.
pub fn sweep_at(
    store: &mut NoteStore,
    policy: &ExpiryPolicy,
    now: DateTime<Utc>,
) -> Result<SweepReport> {
    // Keyed by id so a record matching several rules is removed once.
    let mut queued: BTreeMap<String, RemovalReason> = BTreeMap::new();
    let mut report = SweepReport::default();

    for (id, record) in store.unreadable() {
        if record.is_object() {
            warn!("Skipping note {}: record could not be read", id);
            report.skipped.push(id.clone());
        } else {
            warn!("Corrupted note data found for ID {}, removing", id);
            queued.entry(id.clone()).or_insert(RemovalReason::Corrupted);
        }
    }

    for note in store.notes() {
        if let Some(reason) = policy.evaluate(note, now) {
            debug!("Note {} queued for removal: {}", note.id, reason);
            queued.entry(note.id.clone()).or_insert(reason);
        }
    }

    if queued.is_empty() {
        debug!("Sweep found nothing to remove");
        return Ok(report);
    }

    let removed = store.purge(queued.keys());
    info!("Deleted {} expired/corrupted notes", removed);
    report.removed = queued.into_iter().collect();

    store.save()?;
    Ok(report)
}
