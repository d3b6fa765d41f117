//! The per-user session context.
//!
//! A [`Session`] is created when a user logs in and dropped on logout. It
//! owns the user's in-memory entries, recomputes unlock flags against its
//! clock, and writes changes back to the entry store. Store reads that fail
//! are treated as "no data" and leave the session degraded: it refuses writes
//! and does not record the visit, so stored history is never replaced by an
//! empty list. Store writes that fail are rolled back in memory and reported.

use chrono::{DateTime, Datelike, Utc};
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::error::{EchoVerseError, Result};
use crate::metrics::MetricsCollector;
use crate::models::{AudioPayload, Draft, Entry, EntryId, EntryState, TimelineStats, User};
use crate::store::EntryStore;
use crate::unlock::{self, UnlockMode};
use crate::validation::InputValidator;

/// A locked entry with its countdown, for the upcoming-unlocks list
#[derive(Debug, Clone, Copy)]
pub struct UpcomingUnlock<'a> {
    /// The waiting entry
    pub entry: &'a Entry,
    /// Whole days until it unlocks, never negative
    pub days_remaining: i64,
}

/// Session state for one logged-in user
pub struct Session<S, C> {
    user: User,
    store: S,
    clock: C,
    mode: UnlockMode,
    entries: Vec<Entry>,
    newly_unlocked: Vec<EntryId>,
    degraded: bool,
    metrics: MetricsCollector,
}

impl<S: EntryStore, C: Clock> Session<S, C> {
    /// Start a session: load the user's entries, correct cached unlock
    /// flags, work out what unlocked since the last visit, then record this
    /// visit.
    pub fn start(user: User, store: S, clock: C, mode: UnlockMode) -> Self {
        let metrics = MetricsCollector::default();
        let now = clock.now();

        let (loaded, degraded) = match store.entries(&user.id) {
            Ok(entries) => (entries, false),
            Err(err) => {
                warn!(user_id = %user.id, error = %err, "Could not load entries; session is read-only");
                metrics.record_storage_error("load_entries");
                (Vec::new(), true)
            },
        };

        let (last_visit, visit_known) = match store.last_visit(&user.id) {
            Ok(last_visit) => (last_visit, true),
            Err(err) => {
                warn!(user_id = %user.id, error = %err, "Could not load last visit");
                metrics.record_storage_error("load_last_visit");
                (None, false)
            },
        };

        let mut session = Self {
            user,
            store,
            clock,
            mode,
            entries: Vec::new(),
            newly_unlocked: Vec::new(),
            degraded,
            metrics,
        };
        session.entries = session.owned_only(loaded);

        let changed = unlock::refresh_unlock_flags(&mut session.entries, now, mode);
        if changed > 0 {
            debug!(changed, "Corrected stale unlock flags");
            session.persist_quietly();
        }

        session.newly_unlocked = unlock::select_newly_unlocked(&session.entries, last_visit, now, mode)
            .into_iter()
            .map(|entry| entry.id.clone())
            .collect();
        session.metrics.record_newly_unlocked(session.newly_unlocked.len());

        // Moving the mark past unread entries would hide their notifications
        if session.degraded || !visit_known {
            debug!("Last visit left unchanged");
        } else if let Err(err) = session.store.set_last_visit(&session.user.id, now) {
            warn!(error = %err, "Could not record last visit");
            session.metrics.record_storage_error("save_last_visit");
        }

        session.record_evaluation();
        info!(
            user_id = %session.user.id,
            entries = session.entries.len(),
            newly_unlocked = session.newly_unlocked.len(),
            "Session started"
        );
        session
    }

    /// Drop anything not owned by this session's user. This is the
    /// ownership gate: every later lookup only sees what passes here.
    fn owned_only(&self, entries: Vec<Entry>) -> Vec<Entry> {
        entries
            .into_iter()
            .filter(|entry| self.ensure_owner(entry).is_ok())
            .collect()
    }

    /// The logged-in user
    pub const fn user(&self) -> &User {
        &self.user
    }

    /// Active unlock mode
    pub const fn mode(&self) -> UnlockMode {
        self.mode
    }

    /// True when entries could not be loaded; writes are refused until a
    /// new session loads successfully
    pub const fn is_degraded(&self) -> bool {
        self.degraded
    }

    fn ensure_writable(&self) -> Result<()> {
        if self.degraded {
            return Err(EchoVerseError::StorageUnavailable(
                "entries were not loaded; refusing to overwrite them".to_string(),
            ));
        }
        Ok(())
    }

    /// Every entry owned by the user, in creation order
    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    /// Entries that can currently be played
    pub fn unlocked_entries(&self) -> impl Iterator<Item = &Entry> {
        self.entries.iter().filter(|entry| entry.is_unlocked)
    }

    /// Entries still waiting
    pub fn locked_entries(&self) -> impl Iterator<Item = &Entry> {
        self.entries.iter().filter(|entry| !entry.is_unlocked)
    }

    /// Entries that unlocked since the previous visit, for the notification banner
    pub fn newly_unlocked(&self) -> Vec<&Entry> {
        self.newly_unlocked
            .iter()
            .filter_map(|id| self.find(id))
            .collect()
    }

    /// Hide the notification banner for the rest of the session
    pub fn dismiss_notifications(&mut self) {
        self.newly_unlocked.clear();
    }

    /// Look up one of the user's entries
    pub fn entry(&self, id: &EntryId) -> Result<&Entry> {
        self.find(id)
            .ok_or_else(|| EchoVerseError::EntryNotFound(id.clone()))
    }

    /// Lifecycle state of one of the user's entries
    pub fn state_of(&self, id: &EntryId) -> Result<EntryState> {
        let entry = self.entry(id)?;
        Ok(unlock::entry_state(self.clock.now(), entry, self.mode))
    }

    fn find(&self, id: &EntryId) -> Option<&Entry> {
        self.entries.iter().find(|entry| &entry.id == id)
    }

    /// Re-evaluate every entry against the current time. Returns how many flags flipped.
    pub fn refresh(&mut self) -> usize {
        let changed = unlock::refresh_unlock_flags(&mut self.entries, self.clock.now(), self.mode);
        if changed > 0 {
            debug!(changed, "Unlock flags changed on refresh");
            self.persist_quietly();
        }
        self.record_evaluation();
        changed
    }

    /// Switch between unlock-date and time-capsule visibility
    pub fn set_mode(&mut self, mode: UnlockMode) {
        if self.mode == mode {
            return;
        }
        info!(?mode, "Unlock mode changed");
        self.mode = mode;
        self.refresh();
    }

    /// Validate a draft and save it as a new entry.
    ///
    /// On a failed write the entry is not kept in memory either.
    pub fn create_entry(&mut self, draft: Draft) -> Result<&Entry> {
        let now = self.clock.now();
        let valid = InputValidator::validate_draft(draft, now).map_err(|err| {
            debug!(field = err.field(), error = %err, "Draft rejected");
            self.metrics.record_validation_failure(err.field());
            err
        })?;
        self.ensure_writable()?;

        let mut entry = Entry {
            id: EntryId::generate(now),
            owner_id: self.user.id.clone(),
            title: valid.title,
            mood: valid.mood,
            recorded_date: now,
            unlock_date: valid.unlock_date,
            is_unlocked: false,
            audio: valid.audio,
            reflection: None,
        };
        entry.is_unlocked = unlock::evaluate(now, &entry, self.mode);

        let mood = entry.mood;
        self.entries.push(entry);
        if let Err(err) = self.store.put_entries(&self.user.id, &self.entries) {
            self.entries.pop();
            warn!(error = %err, "Could not save new entry");
            self.metrics.record_storage_error("save_entries");
            return Err(err);
        }

        self.metrics.record_entry_saved(mood);
        self.record_evaluation();

        let saved = self
            .entries
            .last()
            .ok_or_else(|| EchoVerseError::Other("entry vanished after save".to_string()))?;
        info!(entry_id = %saved.id, unlock_date = %saved.unlock_date, "Saved new entry");
        Ok(saved)
    }

    /// Audio of an unlocked entry
    pub fn play(&self, id: &EntryId) -> Result<&AudioPayload> {
        let entry = self.unlocked_owned(id)?;
        debug!(entry_id = %entry.id, bytes = entry.audio.len(), "Playing entry");
        Ok(&entry.audio)
    }

    /// Attach (or clear, when blank) the reflection of an unlocked entry
    pub fn save_reflection(&mut self, id: &EntryId, reflection: &str) -> Result<()> {
        self.unlocked_owned(id)?;
        self.ensure_writable()?;

        let text = InputValidator::sanitize_text(reflection);
        let reflection = (!text.is_empty()).then_some(text);

        let index = self
            .entries
            .iter()
            .position(|entry| &entry.id == id)
            .ok_or_else(|| EchoVerseError::EntryNotFound(id.clone()))?;
        let previous = std::mem::replace(&mut self.entries[index].reflection, reflection);

        if let Err(err) = self.store.put_entries(&self.user.id, &self.entries) {
            self.entries[index].reflection = previous;
            warn!(error = %err, "Could not save reflection");
            self.metrics.record_storage_error("save_entries");
            return Err(err);
        }

        self.metrics.record_reflection_saved();
        info!(entry_id = %id, "Saved reflection");
        Ok(())
    }

    /// Find one of the user's entries and make sure it is open right now
    fn unlocked_owned(&self, id: &EntryId) -> Result<&Entry> {
        let entry = self.entry(id)?;

        let now = self.clock.now();
        if !unlock::evaluate(now, entry, self.mode) {
            return Err(EchoVerseError::EntryLocked {
                days_remaining: unlock::display_days_until_unlock(now, entry.unlock_date),
            });
        }

        Ok(entry)
    }

    /// Refuse access to entries owned by someone else
    pub fn ensure_owner(&self, entry: &Entry) -> Result<()> {
        if entry.owner_id == self.user.id {
            return Ok(());
        }

        warn!(
            user_id = %self.user.id,
            entry_id = %entry.id,
            "Refused access to entry owned by another user"
        );
        self.metrics.record_authorization_refused();
        Err(EchoVerseError::Unauthorized)
    }

    /// Dashboard counts
    pub fn stats(&self) -> TimelineStats {
        let now = self.clock.now();
        let unlocked = self.unlocked_entries().count();

        TimelineStats {
            total: self.entries.len(),
            unlocked,
            locked: self.entries.len() - unlocked,
            recorded_this_month: self
                .entries
                .iter()
                .filter(|entry| same_month(entry.recorded_date, now))
                .count(),
        }
    }

    /// Locked entries ordered by unlock date, soonest first
    pub fn upcoming_unlocks(&self, limit: usize) -> Vec<UpcomingUnlock<'_>> {
        let now = self.clock.now();
        let mut upcoming: Vec<_> = self
            .locked_entries()
            .map(|entry| UpcomingUnlock {
                entry,
                days_remaining: unlock::display_days_until_unlock(now, entry.unlock_date),
            })
            .collect();
        upcoming.sort_by_key(|item| item.entry.unlock_date);
        upcoming.truncate(limit);
        upcoming
    }

    /// Days until an entry unlocks by its own date, clamped at zero
    pub fn days_until_unlock(&self, entry: &Entry) -> i64 {
        unlock::display_days_until_unlock(self.clock.now(), entry.unlock_date)
    }

    /// End the session
    pub fn end(self) {
        info!(user_id = %self.user.id, "Session ended");
    }

    fn persist_quietly(&self) {
        if self.degraded {
            return;
        }
        if let Err(err) = self.store.put_entries(&self.user.id, &self.entries) {
            warn!(error = %err, "Could not persist unlock flags");
            self.metrics.record_storage_error("save_entries");
        }
    }

    fn record_evaluation(&self) {
        let unlocked = self.unlocked_entries().count();
        self.metrics
            .record_unlock_evaluation(unlocked, self.entries.len() - unlocked);
    }
}

fn same_month(a: DateTime<Utc>, b: DateTime<Utc>) -> bool {
    a.year() == b.year() && a.month() == b.month()
}
