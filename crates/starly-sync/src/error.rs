use thiserror::Error;

use starly_shared::SharedError;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Envelope error: {0}")]
    Envelope(#[from] SharedError),

    #[error("Sync channel '{0}' is closed")]
    Closed(String),

    #[error("Sync hub lock poisoned")]
    LockPoisoned,
}
