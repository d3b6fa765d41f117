//! Tests for the session context: load cycle, notifications, ownership and storage failures

use std::cell::Cell;

use chrono::{DateTime, Duration, TimeZone, Utc};
use mockall::mock;

use echoverse::models::{AudioPayload, Draft, Entry, EntryId, EntryState, Mood, User, UserId};
use echoverse::store::{EntryStore, MemoryStore};
use echoverse::{EchoVerseError, FixedClock, Result, Session, UnlockMode, ValidationError};

mock! {
    pub Store {}

    impl EntryStore for Store {
        fn entries(&self, owner: &UserId) -> Result<Vec<Entry>>;
        fn put_entries(&self, owner: &UserId, entries: &[Entry]) -> Result<()>;
        fn last_visit(&self, owner: &UserId) -> Result<Option<DateTime<Utc>>>;
        fn set_last_visit(&self, owner: &UserId, at: DateTime<Utc>) -> Result<()>;
    }
}

fn ymd(y: i32, m: u32, d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
}

fn user(id: &str) -> User {
    User {
        id: UserId::from(id),
        email: format!("{id}@example.com"),
        display_name: id.to_string(),
        created_at: ymd(2023, 1, 1),
    }
}

fn entry(id: &str, owner: &str, recorded: DateTime<Utc>, unlock: DateTime<Utc>) -> Entry {
    Entry {
        id: EntryId::from(id),
        owner_id: UserId::from(owner),
        title: format!("Entry {id}"),
        mood: Mood::Thoughtful,
        recorded_date: recorded,
        unlock_date: unlock,
        is_unlocked: false,
        audio: AudioPayload::new(vec![7; 16]),
        reflection: None,
    }
}

fn draft(unlock: DateTime<Utc>) -> Draft {
    Draft {
        title: "New Year Hopes".to_string(),
        mood: Some("✨".to_string()),
        unlock_date: Some(unlock.to_rfc3339()),
        audio: Some(AudioPayload::new(vec![1; 4096])),
    }
}

fn storage_down() -> EchoVerseError {
    EchoVerseError::StorageUnavailable("disk gone".to_string())
}

#[test]
fn test_start_recomputes_stale_flags_and_writes_back() {
    let store = MemoryStore::new();
    let owner = UserId::from("alice");
    let mut stale = entry("summer", "alice", ymd(2024, 6, 20), ymd(2024, 12, 20));
    stale.is_unlocked = false;
    let mut wrongly_open = entry("future", "alice", ymd(2024, 6, 20), ymd(2026, 1, 1));
    wrongly_open.is_unlocked = true;
    store.put_entries(&owner, &[stale, wrongly_open]).unwrap();

    let clock = FixedClock::new(ymd(2025, 1, 1));
    let session = Session::start(user("alice"), &store, &clock, UnlockMode::UnlockDate);

    let flags: Vec<bool> = session.entries().iter().map(|e| e.is_unlocked).collect();
    assert_eq!(flags, vec![true, false]);

    let persisted: Vec<bool> = store.entries(&owner).unwrap().iter().map(|e| e.is_unlocked).collect();
    assert_eq!(persisted, vec![true, false]);
}

#[test]
fn test_first_visit_has_no_notifications_and_records_visit() {
    let store = MemoryStore::new();
    let owner = UserId::from("alice");
    store
        .put_entries(&owner, &[entry("a", "alice", ymd(2024, 1, 1), ymd(2024, 2, 1))])
        .unwrap();

    let clock = FixedClock::new(ymd(2024, 6, 1));
    let session = Session::start(user("alice"), &store, &clock, UnlockMode::UnlockDate);

    assert!(session.newly_unlocked().is_empty());
    assert_eq!(store.last_visit(&owner).unwrap(), Some(ymd(2024, 6, 1)));
}

#[test]
fn test_entries_unlocked_between_visits_are_announced_once() {
    let store = MemoryStore::new();
    let owner = UserId::from("alice");
    store
        .put_entries(
            &owner,
            &[
                entry("old", "alice", ymd(2024, 1, 1), ymd(2024, 2, 1)),
                entry("due", "alice", ymd(2024, 1, 1), ymd(2024, 3, 15)),
                entry("later", "alice", ymd(2024, 1, 1), ymd(2024, 9, 1)),
            ],
        )
        .unwrap();
    store.set_last_visit(&owner, ymd(2024, 3, 1)).unwrap();

    let clock = FixedClock::new(ymd(2024, 4, 1));
    let session = Session::start(user("alice"), &store, &clock, UnlockMode::UnlockDate);
    let announced: Vec<_> = session.newly_unlocked().iter().map(|e| e.id.to_string()).collect();
    assert_eq!(announced, vec!["due"]);
    session.end();

    clock.advance(Duration::days(1));
    let session = Session::start(user("alice"), &store, &clock, UnlockMode::UnlockDate);
    assert!(session.newly_unlocked().is_empty());
}

#[test]
fn test_dismiss_notifications() {
    let store = MemoryStore::new();
    let owner = UserId::from("alice");
    store
        .put_entries(&owner, &[entry("due", "alice", ymd(2024, 1, 1), ymd(2024, 3, 15))])
        .unwrap();
    store.set_last_visit(&owner, ymd(2024, 3, 1)).unwrap();

    let clock = FixedClock::new(ymd(2024, 4, 1));
    let mut session = Session::start(user("alice"), &store, &clock, UnlockMode::UnlockDate);
    assert_eq!(session.newly_unlocked().len(), 1);
    session.dismiss_notifications();
    assert!(session.newly_unlocked().is_empty());
}

#[test]
fn test_create_entry_persists_locked_entry() {
    let store = MemoryStore::new();
    let clock = FixedClock::new(ymd(2025, 1, 1));
    let mut session = Session::start(user("alice"), &store, &clock, UnlockMode::UnlockDate);

    let entry = session.create_entry(draft(ymd(2026, 1, 1))).unwrap();
    assert!(!entry.is_unlocked);
    assert_eq!(entry.owner_id, UserId::from("alice"));
    assert_eq!(entry.recorded_date, ymd(2025, 1, 1));
    assert_eq!(entry.mood, Mood::Hopeful);
    let id = entry.id.clone();

    assert_eq!(session.state_of(&id).unwrap(), EntryState::Locked);
    let stored = store.entries(&UserId::from("alice")).unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].id, id);
}

#[test]
fn test_create_entry_rejects_invalid_draft_without_saving() {
    let store = MemoryStore::new();
    let clock = FixedClock::new(ymd(2025, 1, 1));
    let mut session = Session::start(user("alice"), &store, &clock, UnlockMode::UnlockDate);

    let err = session.create_entry(draft(ymd(2025, 1, 1))).unwrap_err();
    assert!(matches!(
        err,
        EchoVerseError::Validation(ValidationError::UnlockDateNotInFuture)
    ));
    assert!(session.entries().is_empty());
    assert!(store.entries(&UserId::from("alice")).unwrap().is_empty());
}

#[test]
fn test_entry_unlocks_as_time_passes() {
    let store = MemoryStore::new();
    let clock = FixedClock::new(ymd(2025, 1, 1));
    let mut session = Session::start(user("alice"), &store, &clock, UnlockMode::UnlockDate);
    let id = session.create_entry(draft(ymd(2025, 2, 1))).unwrap().id.clone();

    assert!(matches!(
        session.play(&id),
        Err(EchoVerseError::EntryLocked { days_remaining: 31 })
    ));

    clock.set(ymd(2025, 2, 1));
    assert_eq!(session.refresh(), 1);
    assert_eq!(session.play(&id).unwrap().len(), 4096);
    assert!(store.entries(&UserId::from("alice")).unwrap()[0].is_unlocked);
}

#[test]
fn test_reflection_only_after_unlock() {
    let store = MemoryStore::new();
    let owner = UserId::from("alice");
    store
        .put_entries(
            &owner,
            &[
                entry("open", "alice", ymd(2024, 1, 1), ymd(2024, 2, 1)),
                entry("sealed", "alice", ymd(2024, 1, 1), ymd(2030, 1, 1)),
            ],
        )
        .unwrap();

    let clock = FixedClock::new(ymd(2024, 6, 1));
    let mut session = Session::start(user("alice"), &store, &clock, UnlockMode::UnlockDate);

    session
        .save_reflection(&EntryId::from("open"), "  I sound so young.\u{7} ")
        .unwrap();
    assert_eq!(
        store.entries(&owner).unwrap()[0].reflection.as_deref(),
        Some("I sound so young.")
    );

    let err = session
        .save_reflection(&EntryId::from("sealed"), "peeking")
        .unwrap_err();
    assert!(matches!(err, EchoVerseError::EntryLocked { .. }));
    assert_eq!(store.entries(&owner).unwrap()[1].reflection, None);

    session.save_reflection(&EntryId::from("open"), "   ").unwrap();
    assert_eq!(store.entries(&owner).unwrap()[0].reflection, None);
}

#[test]
fn test_unknown_entry_is_not_found() {
    let store = MemoryStore::new();
    let clock = FixedClock::new(ymd(2024, 6, 1));
    let session = Session::start(user("alice"), &store, &clock, UnlockMode::UnlockDate);
    assert!(matches!(
        session.play(&EntryId::from("nope")),
        Err(EchoVerseError::EntryNotFound(_))
    ));
}

#[test]
fn test_other_users_entries_are_never_visible() {
    let store = MemoryStore::new();
    let alice = UserId::from("alice");
    let bob = UserId::from("bob");
    let alices = entry("alice_entry", "alice", ymd(2024, 1, 1), ymd(2024, 2, 1));
    store.put_entries(&alice, &[alices.clone()]).unwrap();
    // A record filed under bob's key but owned by alice
    store.put_entries(&bob, &[alices.clone()]).unwrap();
    store.set_last_visit(&bob, ymd(2024, 1, 15)).unwrap();

    let clock = FixedClock::new(ymd(2024, 6, 1));
    let session = Session::start(user("bob"), &store, &clock, UnlockMode::UnlockDate);

    assert!(session.entries().is_empty());
    assert!(session.newly_unlocked().is_empty());
    assert_eq!(session.stats().total, 0);
    assert!(matches!(
        session.play(&alices.id),
        Err(EchoVerseError::EntryNotFound(_))
    ));
    assert!(matches!(
        session.ensure_owner(&alices),
        Err(EchoVerseError::Unauthorized)
    ));
    assert_eq!(EchoVerseError::Unauthorized.to_string(), "Action not permitted");
}

#[test]
fn test_time_capsule_mode_toggle() {
    let store = MemoryStore::new();
    let owner = UserId::from("alice");
    store
        .put_entries(
            &owner,
            &[
                entry("young_past_due", "alice", ymd(2023, 1, 1), ymd(2023, 2, 1)),
                entry("old_not_due", "alice", ymd(2022, 1, 1), ymd(2027, 1, 1)),
            ],
        )
        .unwrap();

    let clock = FixedClock::new(ymd(2023, 6, 1));
    let mut session = Session::start(user("alice"), &store, &clock, UnlockMode::UnlockDate);
    let flags: Vec<bool> = session.entries().iter().map(|e| e.is_unlocked).collect();
    assert_eq!(flags, vec![true, false]);

    session.set_mode(UnlockMode::TimeCapsule);
    assert_eq!(session.mode(), UnlockMode::TimeCapsule);
    let flags: Vec<bool> = session.entries().iter().map(|e| e.is_unlocked).collect();
    assert_eq!(flags, vec![false, true]);
    assert!(session.play(&EntryId::from("young_past_due")).is_err());
    assert!(session.play(&EntryId::from("old_not_due")).is_ok());
}

#[test]
fn test_stats_and_upcoming_unlocks() {
    let store = MemoryStore::new();
    let owner = UserId::from("alice");
    store
        .put_entries(
            &owner,
            &[
                entry("open", "alice", ymd(2024, 1, 1), ymd(2024, 2, 1)),
                entry("far", "alice", ymd(2024, 6, 3), ymd(2025, 6, 1)),
                entry("soon", "alice", ymd(2024, 6, 5), ymd(2024, 6, 20)),
            ],
        )
        .unwrap();

    let clock = FixedClock::new(ymd(2024, 6, 10));
    let session = Session::start(user("alice"), &store, &clock, UnlockMode::UnlockDate);

    let stats = session.stats();
    assert_eq!(stats.total, 3);
    assert_eq!(stats.unlocked, 1);
    assert_eq!(stats.locked, 2);
    assert_eq!(stats.recorded_this_month, 2);

    let upcoming = session.upcoming_unlocks(5);
    let order: Vec<_> = upcoming.iter().map(|u| u.entry.id.to_string()).collect();
    assert_eq!(order, vec!["soon", "far"]);
    assert_eq!(upcoming[0].days_remaining, 10);
    assert_eq!(session.upcoming_unlocks(1).len(), 1);
}

#[test]
fn test_unreadable_store_is_treated_as_no_data() {
    let mut store = MockStore::new();
    store.expect_entries().returning(|_| Err(storage_down()));
    store.expect_last_visit().returning(|_| Err(storage_down()));
    store.expect_set_last_visit().never();
    store.expect_put_entries().never();

    let clock = FixedClock::new(ymd(2024, 6, 1));
    let mut session = Session::start(user("alice"), store, &clock, UnlockMode::UnlockDate);

    assert!(session.is_degraded());
    assert!(session.entries().is_empty());
    assert!(session.newly_unlocked().is_empty());
    assert!(matches!(
        session.create_entry(draft(ymd(2025, 1, 1))),
        Err(EchoVerseError::StorageUnavailable(_))
    ));
}

#[test]
fn test_unreadable_last_visit_is_not_overwritten() {
    let mut store = MockStore::new();
    store.expect_entries().returning(|_| Ok(Vec::new()));
    store.expect_last_visit().returning(|_| Err(storage_down()));
    store.expect_set_last_visit().never();

    let clock = FixedClock::new(ymd(2024, 6, 1));
    let session = Session::start(user("alice"), store, &clock, UnlockMode::UnlockDate);
    assert!(!session.is_degraded());
}

/// Memory store whose entry reads can be switched off
struct FlakyStore {
    inner: MemoryStore,
    reads_fail: Cell<bool>,
}

impl EntryStore for FlakyStore {
    fn entries(&self, owner: &UserId) -> Result<Vec<Entry>> {
        if self.reads_fail.get() {
            return Err(storage_down());
        }
        self.inner.entries(owner)
    }

    fn put_entries(&self, owner: &UserId, entries: &[Entry]) -> Result<()> {
        self.inner.put_entries(owner, entries)
    }

    fn last_visit(&self, owner: &UserId) -> Result<Option<DateTime<Utc>>> {
        self.inner.last_visit(owner)
    }

    fn set_last_visit(&self, owner: &UserId, at: DateTime<Utc>) -> Result<()> {
        self.inner.set_last_visit(owner, at)
    }
}

#[test]
fn test_failed_load_never_overwrites_stored_history() {
    let owner = UserId::from("alice");
    let store = FlakyStore {
        inner: MemoryStore::new(),
        reads_fail: Cell::new(false),
    };
    store
        .put_entries(
            &owner,
            &[
                entry("a", "alice", ymd(2024, 1, 1), ymd(2024, 2, 1)),
                entry("b", "alice", ymd(2024, 1, 1), ymd(2024, 5, 15)),
                entry("c", "alice", ymd(2024, 1, 1), ymd(2025, 1, 1)),
            ],
        )
        .unwrap();
    store.set_last_visit(&owner, ymd(2024, 5, 1)).unwrap();

    let clock = FixedClock::new(ymd(2024, 6, 1));
    store.reads_fail.set(true);
    let mut session = Session::start(user("alice"), &store, &clock, UnlockMode::UnlockDate);
    assert!(session.is_degraded());

    let err = session.create_entry(draft(ymd(2025, 1, 1))).unwrap_err();
    assert!(matches!(err, EchoVerseError::StorageUnavailable(_)));
    assert!(session.entries().is_empty());
    assert!(session
        .save_reflection(&EntryId::from("a"), "hello")
        .is_err());
    session.end();

    store.reads_fail.set(false);
    assert_eq!(store.entries(&owner).unwrap().len(), 3);
    assert_eq!(store.last_visit(&owner).unwrap(), Some(ymd(2024, 5, 1)));

    clock.advance(Duration::days(1));
    let mut session = Session::start(user("alice"), &store, &clock, UnlockMode::UnlockDate);
    assert!(!session.is_degraded());
    let announced: Vec<_> = session.newly_unlocked().iter().map(|e| e.id.to_string()).collect();
    assert_eq!(announced, vec!["b"]);

    session.create_entry(draft(ymd(2025, 1, 1))).unwrap();
    assert_eq!(store.entries(&owner).unwrap().len(), 4);
}

#[test]
fn test_failed_write_rolls_back_new_entry() {
    let mut store = MockStore::new();
    store.expect_entries().returning(|_| Ok(Vec::new()));
    store.expect_last_visit().returning(|_| Ok(None));
    store.expect_set_last_visit().returning(|_, _| Ok(()));
    store
        .expect_put_entries()
        .times(1)
        .returning(|_, _| Err(storage_down()));

    let clock = FixedClock::new(ymd(2025, 1, 1));
    let mut session = Session::start(user("alice"), store, &clock, UnlockMode::UnlockDate);

    let err = session.create_entry(draft(ymd(2026, 1, 1))).unwrap_err();
    assert!(matches!(err, EchoVerseError::StorageUnavailable(_)));
    assert!(session.entries().is_empty());
}
