//! EchoVerse - Audio Time Capsule Diary
//!
//! A Rust library for recording short voice memos that stay sealed until a
//! chosen unlock date.
//!
//! # Features
//!
//! - Unlock evaluation by unlock date or one-year time capsule mode
//! - "Newly unlocked since your last visit" notifications
//! - Draft validation before anything is saved
//! - Per-user entry storage with local accounts
//! - Capped audio capture from any async byte source

/// Local accounts and login state
pub mod auth;
/// Injectable wall clock
pub mod clock;
/// Configuration management
pub mod config;
/// Error types
pub mod error;
/// Logging setup and utilities
pub mod logging;
/// Metrics collection
pub mod metrics;
/// Data models and structures
pub mod models;
/// Audio capture
pub mod recording;
/// Per-user session context
pub mod session;
/// Embedded on-disk store
pub mod sled_store;
/// Storage contracts and the in-memory store
pub mod store;
/// Unlock evaluation
pub mod unlock;
/// Input validation and sanitization
pub mod validation;

// Re-export key components for easier access
pub use auth::AuthProvider;
pub use clock::{Clock, FixedClock, SystemClock};
pub use error::{AuthError, EchoVerseError, Result};
pub use models::{AudioPayload, Draft, Entry, EntryId, EntryState, Mood, User, UserId};
pub use session::Session;
pub use sled_store::SledStore;
pub use store::{CredentialStore, EntryStore, MemoryStore};
pub use unlock::UnlockMode;
pub use validation::{InputValidator, ValidationError};
