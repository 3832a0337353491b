//! Login, registration and account settings over the local user directory.

use tracing::{debug, info};

use starly_shared::constants::{MIN_PASSWORD_LEN, MIN_USERNAME_LEN, PASSCODE_LEN, SECOND_FACTOR_CODE_LEN};
use starly_shared::identity::{generate_two_factor_secret, new_user};
use starly_shared::{PrivacyField, User, UserId};
use starly_store::{SessionStore, SharedStore, UserDirectory};

use crate::error::AuthError;

/// What the login screen submits.
#[derive(Debug, Clone, Default)]
pub struct AuthRequest {
    pub username: String,
    pub password: Option<String>,
    pub display_name: Option<String>,
    pub is_new: bool,
    /// Six-digit code for accounts with two-step verification.
    pub second_factor: Option<String>,
}

impl AuthRequest {
    pub fn login(username: impl Into<String>, password: Option<&str>) -> Self {
        Self {
            username: username.into(),
            password: password.map(str::to_string),
            ..Self::default()
        }
    }

    pub fn register(username: impl Into<String>, password: &str, display_name: Option<&str>) -> Self {
        Self {
            username: username.into(),
            password: Some(password.to_string()),
            display_name: display_name.map(str::to_string),
            is_new: true,
            second_factor: None,
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.second_factor = Some(code.into());
        self
    }
}

/// Trim, drop a leading `@` and lower-case a username.
pub fn normalize_username(raw: &str) -> String {
    raw.trim().trim_start_matches('@').to_lowercase()
}

/// Rules for new usernames only; existing directory entries are looked up
/// as stored.
fn check_new_username(name: &str) -> Result<(), AuthError> {
    let valid_chars = name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if name.chars().count() < MIN_USERNAME_LEN || !valid_chars {
        return Err(AuthError::InvalidUsername);
    }
    Ok(())
}

fn is_digits(code: &str, len: usize) -> bool {
    code.len() == len && code.bytes().all(|b| b.is_ascii_digit())
}

/// Resolves users against the directory and owns the session pointer.
#[derive(Clone)]
pub struct IdentityGate {
    directory: UserDirectory,
    sessions: SessionStore,
}

impl IdentityGate {
    pub fn new(store: SharedStore) -> Self {
        Self {
            directory: UserDirectory::new(store.clone()),
            sessions: SessionStore::new(store),
        }
    }

    /// Log in or register, then record the user as the active session.
    pub fn authenticate(&self, request: AuthRequest) -> Result<User, AuthError> {
        let username = normalize_username(&request.username);

        let user = if request.is_new {
            check_new_username(&username)?;
            if self.directory.contains(&username)? {
                return Err(AuthError::UsernameTaken(username));
            }
            let password = request.password.unwrap_or_default();
            if password.chars().count() < MIN_PASSWORD_LEN {
                return Err(AuthError::WeakPassword);
            }
            let user = new_user(&username, request.display_name.as_deref().unwrap_or(""), Some(password));
            self.directory.upsert(&user)?;
            info!(user = %user.id, username = %user.username, "Registered new user");
            user
        } else {
            let user = self
                .directory
                .find(&username)?
                .ok_or_else(|| AuthError::UnknownUser(username.clone()))?;
            if let Some(stored) = &user.password {
                if request.password.as_deref() != Some(stored.as_str()) {
                    return Err(AuthError::WrongPassword);
                }
            }
            if user.two_factor_enabled {
                let code = request.second_factor.ok_or(AuthError::SecondFactorRequired)?;
                if !is_digits(code.trim(), SECOND_FACTOR_CODE_LEN) {
                    return Err(AuthError::InvalidSecondFactor);
                }
            }
            info!(user = %user.id, "User logged in");
            user
        };

        self.sessions.set(&user)?;
        Ok(user)
    }

    /// Forget the active session. Directory and chats stay untouched.
    pub fn logout(&self) -> Result<(), AuthError> {
        self.sessions.clear()?;
        debug!("Session cleared");
        Ok(())
    }

    /// The user of the active session, if any.
    pub fn current(&self) -> Result<Option<User>, AuthError> {
        Ok(self.sessions.current()?)
    }

    pub fn lookup(&self, username: &str) -> Result<Option<User>, AuthError> {
        let name = normalize_username(username);
        if name.is_empty() {
            return Ok(None);
        }
        Ok(self.directory.find(&name)?)
    }

    /// Every other registered user, as `of` is allowed to see them.
    pub fn contacts(&self, of: &UserId) -> Result<Vec<User>, AuthError> {
        Ok(self
            .directory
            .all()?
            .into_iter()
            .filter(|u| &u.id != of)
            .map(|u| u.visible_to(true))
            .collect())
    }

    /// Save an edited profile. The username cannot change.
    pub fn update_profile(&self, user: &User) -> Result<User, AuthError> {
        self.modify(&user.id, |stored| {
            if stored.username != user.username {
                return Err(AuthError::UsernameImmutable);
            }
            *stored = user.clone();
            Ok(())
        })
    }

    /// Set or clear (`None`) the four-digit lock passcode.
    pub fn set_passcode(&self, user_id: &UserId, passcode: Option<&str>) -> Result<User, AuthError> {
        if let Some(code) = passcode {
            if !is_digits(code, PASSCODE_LEN) {
                return Err(AuthError::InvalidPasscode);
            }
        }
        self.modify(user_id, |user| {
            user.passcode = passcode.map(str::to_string);
            Ok(())
        })
    }

    /// Check a passcode against the lock screen. Users without a passcode
    /// are never locked.
    pub fn unlock(&self, user_id: &UserId, passcode: &str) -> Result<(), AuthError> {
        let user = self.find_by_id(user_id)?;
        match user.passcode {
            Some(expected) if expected != passcode => Err(AuthError::InvalidPasscode),
            _ => Ok(()),
        }
    }

    /// Fresh secret to show while setting up an authenticator app.
    pub fn begin_two_factor(&self) -> String {
        generate_two_factor_secret()
    }

    pub fn enable_two_factor(&self, user_id: &UserId, secret: &str, code: &str) -> Result<User, AuthError> {
        if !is_digits(code.trim(), SECOND_FACTOR_CODE_LEN) {
            return Err(AuthError::InvalidSecondFactor);
        }
        self.modify(user_id, |user| {
            user.two_factor_enabled = true;
            user.two_factor_secret = Some(secret.to_string());
            Ok(())
        })
    }

    pub fn disable_two_factor(&self, user_id: &UserId) -> Result<User, AuthError> {
        self.modify(user_id, |user| {
            user.two_factor_enabled = false;
            user.two_factor_secret = None;
            Ok(())
        })
    }

    /// Flip one privacy audience the way the settings toggle does.
    pub fn cycle_privacy(&self, user_id: &UserId, field: PrivacyField) -> Result<User, AuthError> {
        self.modify(user_id, |user| {
            let next = user.privacy.get(field).toggled();
            user.privacy.set(field, next);
            Ok(())
        })
    }

    fn find_by_id(&self, user_id: &UserId) -> Result<User, AuthError> {
        self.directory
            .find_by_id(user_id)?
            .ok_or_else(|| AuthError::UnknownUser(user_id.to_string()))
    }

    /// Load, edit and write back a directory record, keeping the session
    /// copy in step when it is the logged-in user.
    fn modify(
        &self,
        user_id: &UserId,
        edit: impl FnOnce(&mut User) -> Result<(), AuthError>,
    ) -> Result<User, AuthError> {
        let mut user = self.find_by_id(user_id)?;
        edit(&mut user)?;
        self.directory.upsert(&user)?;
        if self.sessions.current()?.is_some_and(|s| &s.id == user_id) {
            self.sessions.set(&user)?;
        }
        Ok(user)
    }
}
