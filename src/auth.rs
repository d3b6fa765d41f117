//! Local account management.
//!
//! Accounts live in a [`CredentialStore`]; passwords are stored as Argon2id
//! PHC strings. The logged-in user is remembered in the store so a new
//! process can resume the session.

use argon2::password_hash::{rand_core::OsRng, SaltString};
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use tracing::{info, warn};

use crate::clock::Clock;
use crate::error::{AuthError, Result};
use crate::models::{StoredUser, User, UserId};
use crate::store::CredentialStore;
use crate::validation::InputValidator;

/// Maps credentials to a [`User`]
pub struct AuthProvider<S, C> {
    store: S,
    clock: C,
}

impl<S: CredentialStore, C: Clock> AuthProvider<S, C> {
    /// Create a provider over `store`
    pub const fn new(store: S, clock: C) -> Self {
        Self { store, clock }
    }

    /// Create an account and log it in.
    ///
    /// Emails are compared and stored lower-cased.
    pub fn register(&self, email: &str, password: &str, display_name: &str) -> Result<User> {
        let email = email.trim().to_lowercase();
        InputValidator::validate_email(&email).map_err(AuthError::InvalidInput)?;
        InputValidator::validate_password(password).map_err(AuthError::InvalidInput)?;
        let display_name =
            InputValidator::validate_display_name(display_name).map_err(AuthError::InvalidInput)?;

        let mut users = self.store.users()?;
        if users.iter().any(|stored| stored.user.email == email) {
            return Err(AuthError::EmailTaken.into());
        }

        let now = self.clock.now();
        let user = User {
            id: UserId::generate(now),
            email,
            display_name,
            created_at: now,
        };

        users.push(StoredUser {
            user: user.clone(),
            password_hash: hash_password(password)?,
        });
        self.store.put_users(&users)?;
        self.store.set_current_user_id(Some(&user.id))?;

        info!(user_id = %user.id, "Registered new user");
        Ok(user)
    }

    /// Log in with email and password
    pub fn login(&self, email: &str, password: &str) -> Result<User> {
        let email = email.trim().to_lowercase();
        let users = self.store.users()?;

        let stored = users
            .into_iter()
            .find(|stored| stored.user.email == email)
            .ok_or(AuthError::InvalidCredentials)?;

        if !verify_password(password, &stored.password_hash) {
            warn!(user_id = %stored.user.id, "Rejected login with wrong password");
            return Err(AuthError::InvalidCredentials.into());
        }

        self.store.set_current_user_id(Some(&stored.user.id))?;
        info!(user_id = %stored.user.id, "User logged in");
        Ok(stored.user)
    }

    /// Forget the logged-in user. Their entries stay in the store.
    pub fn logout(&self) -> Result<()> {
        self.store.set_current_user_id(None)
    }

    /// The logged-in user, if any.
    ///
    /// A pointer to an account that no longer exists is cleared.
    pub fn current_user(&self) -> Result<Option<User>> {
        let Some(current_id) = self.store.current_user_id()? else {
            return Ok(None);
        };

        let user = self
            .store
            .users()?
            .into_iter()
            .find(|stored| stored.user.id == current_id)
            .map(|stored| stored.user);

        if user.is_none() {
            warn!(user_id = %current_id, "Clearing session for unknown user");
            self.store.set_current_user_id(None)?;
        }

        Ok(user)
    }

    /// The logged-in user, or [`AuthError::NotLoggedIn`]
    pub fn require_user(&self) -> Result<User> {
        self.current_user()?
            .ok_or_else(|| AuthError::NotLoggedIn.into())
    }

    /// Change a user's display name, the only mutable profile field
    pub fn update_display_name(&self, user_id: &UserId, display_name: &str) -> Result<User> {
        let display_name =
            InputValidator::validate_display_name(display_name).map_err(AuthError::InvalidInput)?;

        let mut users = self.store.users()?;
        let stored = users
            .iter_mut()
            .find(|stored| &stored.user.id == user_id)
            .ok_or(AuthError::NotLoggedIn)?;
        stored.user.display_name = display_name;
        let user = stored.user.clone();

        self.store.put_users(&users)?;
        Ok(user)
    }
}

fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AuthError::Hashing(e.to_string()).into())
}

fn verify_password(password: &str, phc: &str) -> bool {
    PasswordHash::new(phc)
        .map(|parsed| {
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok()
        })
        .unwrap_or(false)
}
