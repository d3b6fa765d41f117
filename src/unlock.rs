//! Unlock evaluation.
//!
//! Pure functions deciding, from the current instant and an entry's dates,
//! whether the entry is visible. Two mutually exclusive modes exist:
//!
//! - [`UnlockMode::UnlockDate`]: an entry unlocks once its own unlock date
//!   has been reached (inclusive).
//! - [`UnlockMode::TimeCapsule`]: the unlock date is ignored and an entry
//!   unlocks one calendar year after it was recorded.
//!
//! Nothing here performs I/O or can fail.

use chrono::{DateTime, Months, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{Entry, EntryState};

const MILLIS_PER_DAY: i64 = 86_400_000;

/// Which predicate governs visibility
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnlockMode {
    /// Each entry's own unlock date decides
    #[default]
    UnlockDate,
    /// Entries open one year after recording, regardless of unlock date
    TimeCapsule,
}

impl UnlockMode {
    /// Map the time-capsule toggle onto a mode
    #[must_use]
    pub const fn from_time_capsule(enabled: bool) -> Self {
        if enabled {
            Self::TimeCapsule
        } else {
            Self::UnlockDate
        }
    }
}

/// True once `now` has reached `unlock_date`. The boundary instant counts.
#[must_use]
pub fn is_unlocked(now: DateTime<Utc>, unlock_date: DateTime<Utc>) -> bool {
    unlock_date <= now
}

/// True once a full calendar year has passed since `recorded_date`.
///
/// Uses calendar addition, so an entry recorded on 29 February becomes
/// eligible on 28 February of the following year.
#[must_use]
pub fn is_time_capsule_eligible(now: DateTime<Utc>, recorded_date: DateTime<Utc>) -> bool {
    match recorded_date.checked_add_months(Months::new(12)) {
        Some(anniversary) => now >= anniversary,
        // Out of chrono's range; the anniversary can never be reached.
        None => false,
    }
}

/// The unlocked predicate for `entry` under `mode`.
#[must_use]
pub fn evaluate(now: DateTime<Utc>, entry: &Entry, mode: UnlockMode) -> bool {
    match mode {
        UnlockMode::UnlockDate => is_unlocked(now, entry.unlock_date),
        UnlockMode::TimeCapsule => is_time_capsule_eligible(now, entry.recorded_date),
    }
}

/// Lifecycle state of a saved entry
#[must_use]
pub fn entry_state(now: DateTime<Utc>, entry: &Entry, mode: UnlockMode) -> EntryState {
    if evaluate(now, entry, mode) {
        EntryState::Unlocked
    } else {
        EntryState::Locked
    }
}

/// Overwrite every cached `is_unlocked` flag. Returns the number of flags that changed.
pub fn refresh_unlock_flags(entries: &mut [Entry], now: DateTime<Utc>, mode: UnlockMode) -> usize {
    let mut changed = 0;
    for entry in entries.iter_mut() {
        let unlocked = evaluate(now, entry, mode);
        if entry.is_unlocked != unlocked {
            entry.is_unlocked = unlocked;
            changed += 1;
        }
    }
    changed
}

/// Entries that became due since the last visit.
///
/// An entry qualifies when `last_visit < unlock_date <= now` and it is
/// currently unlocked under `mode`. With no recorded last visit nothing is
/// new.
#[must_use]
pub fn select_newly_unlocked<'a>(
    entries: &'a [Entry],
    last_visit: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    mode: UnlockMode,
) -> Vec<&'a Entry> {
    let Some(last_visit) = last_visit else {
        return Vec::new();
    };

    entries
        .iter()
        .filter(|entry| entry.unlock_date > last_visit && entry.unlock_date <= now)
        .filter(|entry| evaluate(now, entry, mode))
        .collect()
}

/// Whole days until `unlock_date`, rounded up. Zero or negative once due.
#[must_use]
pub fn days_until_unlock(now: DateTime<Utc>, unlock_date: DateTime<Utc>) -> i64 {
    let millis = (unlock_date - now).num_milliseconds();
    -(-millis).div_euclid(MILLIS_PER_DAY)
}

/// [`days_until_unlock`] clamped at zero for display
#[must_use]
pub fn display_days_until_unlock(now: DateTime<Utc>, unlock_date: DateTime<Utc>) -> i64 {
    days_until_unlock(now, unlock_date).max(0)
}
