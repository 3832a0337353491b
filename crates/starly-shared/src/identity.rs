//! Local identities: id generation, generated avatars and the fixed AI user.
//!
//! There are no keys here. An account is a directory record with a random
//! short id; "security" stops at a plaintext password and a local passcode.

use rand::distributions::Alphanumeric;
use rand::Rng;

use crate::constants::{
    AVATAR_BASE_URL, BOT_AVATAR_URL, GROUP_AVATAR_BASE_URL, INVITE_LINK_BASE,
    TWO_FACTOR_SECRET_LEN, USER_ID_LEN,
};
use crate::models::{PrivacySettings, User};
use crate::types::{UserId, UserStatus};

const BASE32_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ234567";

/// Random lower-case base36 id of [`USER_ID_LEN`] characters.
pub fn generate_user_id() -> UserId {
    let id: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .map(|b| (b as char).to_ascii_lowercase())
        .take(USER_ID_LEN)
        .collect();
    UserId(id)
}

/// Generated avatar for a username seed.
pub fn avatar_url(seed: &str) -> String {
    format!("{AVATAR_BASE_URL}{seed}")
}

/// Generated initials avatar for a group or channel name.
pub fn group_avatar_url(name: &str) -> String {
    format!("{GROUP_AVATAR_BASE_URL}{name}")
}

/// Build a brand-new account record. `username` must already be normalised.
pub fn new_user(username: &str, display_name: &str, password: Option<String>) -> User {
    let display_name = match display_name.trim() {
        "" => username.to_string(),
        trimmed => trimmed.to_string(),
    };
    User {
        id: generate_user_id(),
        username: username.to_lowercase(),
        display_name,
        password,
        avatar: avatar_url(username),
        status: UserStatus::Online,
        bio: None,
        passcode: None,
        two_factor_enabled: false,
        two_factor_secret: None,
        privacy: PrivacySettings::default(),
    }
}

/// The AI assistant as it appears in the bot chat's participant list.
pub fn assistant_user() -> User {
    User {
        id: UserId::assistant(),
        username: "gemini_ai".to_string(),
        display_name: "هوش مصنوعی استارلی".to_string(),
        password: None,
        avatar: BOT_AVATAR_URL.to_string(),
        status: UserStatus::Online,
        bio: Some("دستیار هوشمند شما در استارلی جت".to_string()),
        passcode: None,
        two_factor_enabled: false,
        two_factor_secret: None,
        privacy: PrivacySettings::default(),
    }
}

/// Fresh secret for an authenticator app (base32 alphabet).
pub fn generate_two_factor_secret() -> String {
    let mut rng = rand::thread_rng();
    (0..TWO_FACTOR_SECRET_LEN)
        .map(|_| BASE32_ALPHABET[rng.gen_range(0..BASE32_ALPHABET.len())] as char)
        .collect()
}

/// Fresh shareable invite link for a group or channel.
pub fn generate_invite_link() -> String {
    let token: [u8; 8] = rand::thread_rng().gen();
    format!("{INVITE_LINK_BASE}{}", hex::encode(token))
}
