//! Data models for diary entries and users
//!
//! This module contains the data structures shared by the unlock evaluator,
//! the validator, the stores and the session.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::validation::ValidationError;

/// Opaque entry identifier, assigned at creation
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryId(pub String);

/// Opaque user identifier; also namespaces the entry store
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

impl EntryId {
    /// Generate a new id of the form `entry_<millis>_<random>`
    #[must_use]
    pub fn generate(now: DateTime<Utc>) -> Self {
        Self(format!("entry_{}_{}", now.timestamp_millis(), random_suffix()))
    }

    /// Borrow the raw id
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl UserId {
    /// Generate a new id of the form `user_<millis>_<random>`
    #[must_use]
    pub fn generate(now: DateTime<Utc>) -> Self {
        Self(format!("user_{}_{}", now.timestamp_millis(), random_suffix()))
    }

    /// Borrow the raw id
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntryId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<&str> for UserId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Nine lowercase base-36 characters
fn random_suffix() -> String {
    let mut rng = rand::thread_rng();
    (0..9)
        .map(|_| char::from_digit(rng.gen_range(0..36), 36).unwrap_or('0'))
        .collect()
}

/// The fixed set of moods an entry can be tagged with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mood {
    /// 😄
    Excited,
    /// 😌
    Calm,
    /// 😢
    Sad,
    /// 😡
    Angry,
    /// 😍
    Love,
    /// 🤔
    Thoughtful,
    /// 😴
    Tired,
    /// ✨
    Hopeful,
    /// 😰
    Anxious,
    /// 🥳
    Celebratory,
}

impl Mood {
    /// Every mood, in picker order
    pub const ALL: [Self; 10] = [
        Self::Excited,
        Self::Calm,
        Self::Sad,
        Self::Angry,
        Self::Love,
        Self::Thoughtful,
        Self::Tired,
        Self::Hopeful,
        Self::Anxious,
        Self::Celebratory,
    ];

    /// Emoji shown for this mood
    #[must_use]
    pub const fn emoji(self) -> &'static str {
        match self {
            Self::Excited => "😄",
            Self::Calm => "😌",
            Self::Sad => "😢",
            Self::Angry => "😡",
            Self::Love => "😍",
            Self::Thoughtful => "🤔",
            Self::Tired => "😴",
            Self::Hopeful => "✨",
            Self::Anxious => "😰",
            Self::Celebratory => "🥳",
        }
    }

    /// Human-readable label for this mood
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Excited => "Excited",
            Self::Calm => "Calm",
            Self::Sad => "Sad",
            Self::Angry => "Angry",
            Self::Love => "Love",
            Self::Thoughtful => "Thoughtful",
            Self::Tired => "Tired",
            Self::Hopeful => "Hopeful",
            Self::Anxious => "Anxious",
            Self::Celebratory => "Celebratory",
        }
    }
}

impl fmt::Display for Mood {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.emoji(), self.label())
    }
}

impl FromStr for Mood {
    type Err = ValidationError;

    /// Accepts either the emoji or the label, ignoring case and surrounding whitespace.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|mood| mood.emoji() == wanted || mood.label().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| ValidationError::UnknownMood(wanted.to_string()))
    }
}

/// Recorded audio, exclusively owned by its entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioPayload {
    /// MIME type reported by the recorder
    pub mime_type: String,
    /// Raw encoded audio; never inspected beyond its length
    pub bytes: Vec<u8>,
}

impl AudioPayload {
    /// MIME type used when the recorder does not report one
    pub const DEFAULT_MIME_TYPE: &'static str = "audio/webm";

    /// Wrap raw bytes with the default MIME type
    #[must_use]
    pub fn new(bytes: Vec<u8>) -> Self {
        Self {
            mime_type: Self::DEFAULT_MIME_TYPE.to_string(),
            bytes,
        }
    }

    /// Size of the payload in bytes
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// True if nothing was captured
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// A persisted diary entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entry {
    /// Unique id, immutable
    pub id: EntryId,
    /// Owner of the entry; the only user who may see it
    pub owner_id: UserId,
    /// Trimmed title, at most 100 characters
    pub title: String,
    /// Mood tag
    pub mood: Mood,
    /// When the entry was captured
    pub recorded_date: DateTime<Utc>,
    /// When the entry becomes visible; never changes after creation
    pub unlock_date: DateTime<Utc>,
    /// Cached evaluator output, recomputed on every load
    pub is_unlocked: bool,
    /// Recorded audio
    pub audio: AudioPayload,
    /// Reflection written after unlock
    pub reflection: Option<String>,
}

/// Derived lifecycle state of a saved entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryState {
    /// Not yet visible
    Locked,
    /// Visible, playable and open for reflection
    Unlocked,
}

/// An entry being composed; has no id and is never persisted as-is
#[derive(Debug, Clone, Default)]
pub struct Draft {
    /// Title as typed
    pub title: String,
    /// Mood as picked (emoji or label)
    pub mood: Option<String>,
    /// Unlock date as typed (`YYYY-MM-DD` or RFC 3339)
    pub unlock_date: Option<String>,
    /// Captured audio
    pub audio: Option<AudioPayload>,
}

/// Public identity of a registered user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Unique id
    pub id: UserId,
    /// Lower-cased email, unique across users
    pub email: String,
    /// Name shown in the header; the only mutable field
    pub display_name: String,
    /// Registration time
    pub created_at: DateTime<Utc>,
}

/// A user record together with its password hash
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredUser {
    /// Public identity
    pub user: User,
    /// Argon2 PHC string
    pub password_hash: String,
}

/// Counts shown on the dashboard
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineStats {
    /// All entries owned by the user
    pub total: usize,
    /// Entries currently unlocked
    pub unlocked: usize,
    /// Entries still waiting
    pub locked: usize,
    /// Entries recorded in the current calendar month
    pub recorded_this_month: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mood_parses_emoji_and_label() {
        assert_eq!("🥳".parse::<Mood>().ok(), Some(Mood::Celebratory));
        assert_eq!(" thoughtful ".parse::<Mood>().ok(), Some(Mood::Thoughtful));
        assert!("nostalgic".parse::<Mood>().is_err());
    }

    #[test]
    fn test_generated_ids_have_prefix_and_suffix() {
        let now = Utc::now();
        let id = EntryId::generate(now);
        let suffix = id.as_str().rsplit('_').next().unwrap_or_default();
        assert!(id.as_str().starts_with("entry_"));
        assert_eq!(suffix.len(), 9);
        assert!(suffix.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
        assert_ne!(UserId::generate(now), UserId::generate(now));
    }
}
