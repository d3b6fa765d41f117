use chrono::{DateTime, Months, NaiveDate, Utc};
use thiserror::Error;
use unicode_normalization::UnicodeNormalization;

use crate::models::{AudioPayload, Draft, Mood};

/// Longest accepted title, in characters
pub const MAX_TITLE_CHARS: usize = 100;
/// Largest accepted audio payload, in bytes
pub const MAX_AUDIO_BYTES: usize = 1_048_576;
/// Furthest an unlock date may lie in the future, in calendar years
pub const MAX_UNLOCK_YEARS: u32 = 5;
/// Longest accepted display name, in characters
pub const MAX_DISPLAY_NAME_CHARS: usize = 100;
/// Shortest accepted password, in bytes
pub const MIN_PASSWORD_LEN: usize = 8;

/// Why a draft entry was rejected. Each variant names the offending field.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Title is empty or whitespace only
    #[error("Title cannot be empty")]
    EmptyTitle,

    /// Title is longer than [`MAX_TITLE_CHARS`]
    #[error("Title too long ({0} characters, max 100)")]
    TitleTooLong(usize),

    /// No mood was picked
    #[error("Mood is required")]
    MissingMood,

    /// The mood is not one of the fixed set
    #[error("Mood '{0}' is not one of the available moods")]
    UnknownMood(String),

    /// No unlock date was given
    #[error("Unlock date is required")]
    MissingUnlockDate,

    /// Unlock date could not be parsed
    #[error("Unlock date '{0}' is not a valid date (use YYYY-MM-DD or RFC 3339)")]
    InvalidUnlockDate(String),

    /// Unlock date is not strictly after the submission instant
    #[error("Unlock date must be in the future")]
    UnlockDateNotInFuture,

    /// Unlock date is more than [`MAX_UNLOCK_YEARS`] ahead
    #[error("Unlock date cannot be more than 5 years ahead")]
    UnlockDateTooFar,

    /// No audio was recorded
    #[error("Audio recording is required")]
    MissingAudio,

    /// Audio payload exceeds [`MAX_AUDIO_BYTES`]
    #[error("Audio recording too large ({0} bytes, max 1048576)")]
    AudioTooLarge(usize),
}

impl ValidationError {
    /// Name of the field the message refers to
    #[must_use]
    pub const fn field(&self) -> &'static str {
        match self {
            Self::EmptyTitle | Self::TitleTooLong(_) => "title",
            Self::MissingMood | Self::UnknownMood(_) => "mood",
            Self::MissingUnlockDate
            | Self::InvalidUnlockDate(_)
            | Self::UnlockDateNotInFuture
            | Self::UnlockDateTooFar => "unlockDate",
            Self::MissingAudio | Self::AudioTooLarge(_) => "audio",
        }
    }
}

/// A draft that passed every rule, ready to become an entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidDraft {
    /// Trimmed, NFC-normalized title
    pub title: String,
    /// Parsed mood
    pub mood: Mood,
    /// Requested unlock instant
    pub unlock_date: DateTime<Utc>,
    /// Captured audio
    pub audio: AudioPayload,
}

/// Validation utilities for input sanitization and edge case handling
#[derive(Debug, Copy, Clone)]
pub struct InputValidator;

impl InputValidator {
    /// Check a draft against every creation rule, in order. The first failure wins.
    pub fn validate_draft(draft: Draft, now: DateTime<Utc>) -> Result<ValidDraft, ValidationError> {
        let title = Self::validate_title(&draft.title)?;
        let mood = Self::validate_mood(draft.mood.as_deref())?;
        let unlock_date = Self::validate_unlock_date(draft.unlock_date.as_deref(), now)?;
        let audio = Self::validate_audio(draft.audio)?;

        Ok(ValidDraft {
            title,
            mood,
            unlock_date,
            audio,
        })
    }

    /// Check the rules that come before the audio (title, mood, unlock
    /// date) so input mistakes surface before anything is recorded.
    pub fn validate_before_capture(draft: &Draft, now: DateTime<Utc>) -> Result<(), ValidationError> {
        Self::validate_title(&draft.title)?;
        Self::validate_mood(draft.mood.as_deref())?;
        Self::validate_unlock_date(draft.unlock_date.as_deref(), now)?;
        Ok(())
    }

    /// Validate an entry title and return it trimmed and normalized
    pub fn validate_title(title: &str) -> Result<String, ValidationError> {
        let normalized: String = title.trim().nfc().collect();
        if normalized.is_empty() {
            return Err(ValidationError::EmptyTitle);
        }

        let chars = normalized.chars().count();
        if chars > MAX_TITLE_CHARS {
            return Err(ValidationError::TitleTooLong(chars));
        }

        Ok(normalized)
    }

    /// Validate the picked mood
    pub fn validate_mood(mood: Option<&str>) -> Result<Mood, ValidationError> {
        match mood {
            Some(raw) if !raw.trim().is_empty() => raw.parse(),
            _ => Err(ValidationError::MissingMood),
        }
    }

    /// Parse and validate an unlock date against the submission instant.
    ///
    /// Compares exact instants, not calendar days.
    pub fn validate_unlock_date(
        unlock_date: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<DateTime<Utc>, ValidationError> {
        let unlock_date = match unlock_date {
            Some(raw) if !raw.trim().is_empty() => Self::parse_unlock_date(raw)?,
            _ => return Err(ValidationError::MissingUnlockDate),
        };

        if unlock_date <= now {
            return Err(ValidationError::UnlockDateNotInFuture);
        }

        let latest = now
            .checked_add_months(Months::new(MAX_UNLOCK_YEARS * 12))
            .ok_or(ValidationError::UnlockDateTooFar)?;
        if unlock_date > latest {
            return Err(ValidationError::UnlockDateTooFar);
        }

        Ok(unlock_date)
    }

    /// Validate captured audio. Only the size is inspected.
    pub fn validate_audio(audio: Option<AudioPayload>) -> Result<AudioPayload, ValidationError> {
        let audio = audio.ok_or(ValidationError::MissingAudio)?;

        if audio.is_empty() {
            return Err(ValidationError::MissingAudio);
        }

        if audio.len() > MAX_AUDIO_BYTES {
            return Err(ValidationError::AudioTooLarge(audio.len()));
        }

        Ok(audio)
    }

    /// Parse user-typed unlock date input.
    ///
    /// A bare `YYYY-MM-DD` means midnight UTC of that day.
    pub fn parse_unlock_date(input: &str) -> Result<DateTime<Utc>, ValidationError> {
        let input = input.trim();

        if let Ok(date) = NaiveDate::parse_from_str(input, "%Y-%m-%d") {
            if let Some(midnight) = date.and_hms_opt(0, 0, 0) {
                return Ok(midnight.and_utc());
            }
        }

        DateTime::parse_from_rfc3339(input)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|_| ValidationError::InvalidUnlockDate(input.to_string()))
    }

    /// Validate email format
    pub fn validate_email(email: &str) -> Result<(), String> {
        if email.trim().is_empty() {
            return Err("Email cannot be empty".to_string());
        }

        if email.len() > 254 {
            return Err("Email too long (max 254 characters)".to_string());
        }

        let parts: Vec<&str> = email.split('@').collect();
        if parts.len() != 2 {
            return Err("Email must have exactly one @ symbol".to_string());
        }

        let local_part = parts[0];
        let domain_part = parts[1];

        if local_part.is_empty() || local_part.len() > 64 {
            return Err("Email local part invalid".to_string());
        }

        if domain_part.is_empty() || !domain_part.contains('.') {
            return Err("Email domain invalid".to_string());
        }

        Ok(())
    }

    /// Validate a display name and return it trimmed
    pub fn validate_display_name(name: &str) -> Result<String, String> {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err("Display name cannot be empty".to_string());
        }

        if trimmed.chars().count() > MAX_DISPLAY_NAME_CHARS {
            return Err("Display name too long (max 100 characters)".to_string());
        }

        if trimmed.contains('\0') || trimmed.contains('\r') || trimmed.contains('\n') {
            return Err("Display name contains invalid characters".to_string());
        }

        Ok(trimmed.to_string())
    }

    /// Validate a new password
    pub fn validate_password(password: &str) -> Result<(), String> {
        if password.len() < MIN_PASSWORD_LEN {
            return Err(format!(
                "Password must be at least {MIN_PASSWORD_LEN} characters"
            ));
        }

        Ok(())
    }

    /// Sanitize text input
    #[must_use]
    pub fn sanitize_text(text: &str) -> String {
        text.chars()
            .filter(|c| !c.is_control() || *c == '\n' || *c == '\t')
            .collect::<String>()
            .trim()
            .to_string()
    }
}
