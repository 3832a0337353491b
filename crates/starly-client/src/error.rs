use thiserror::Error;

use starly_store::StoreError;
use starly_sync::SyncError;

use crate::reducer::Rejected;

/// Failures of the identity gate. Shown to the user inline; they never crash
/// the client.
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Username must be at least 3 letters, digits or underscores")]
    InvalidUsername,

    #[error("Username '{0}' is already taken")]
    UsernameTaken(String),

    #[error("Password must be at least 4 characters")]
    WeakPassword,

    #[error("No user named '{0}'")]
    UnknownUser(String),

    #[error("Wrong password")]
    WrongPassword,

    #[error("A two-step verification code is required")]
    SecondFactorRequired,

    #[error("Invalid two-step verification code")]
    InvalidSecondFactor,

    #[error("Passcode must be exactly 4 digits")]
    InvalidPasscode,

    #[error("Usernames cannot be changed")]
    UsernameImmutable,

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),
}

/// Failures of a [`ChatSession`](crate::ChatSession) operation.
///
/// Soft reducer rejections are not errors; they come back as
/// [`Outcome::Rejected`](crate::Outcome::Rejected).
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    #[error("Sync error: {0}")]
    Sync(#[from] SyncError),

    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    #[error("User '{0}' not found")]
    UserNotFound(String),

    #[error("Action rejected: {0}")]
    Rejected(#[from] Rejected),

    #[error("Chat name cannot be empty")]
    EmptyChatName,

    #[error("Session state lock poisoned")]
    LockPoisoned,
}
