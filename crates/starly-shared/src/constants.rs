/// Application name
pub const APP_NAME: &str = "Starly Chat";

/// Reserved id of the per-user "saved messages" chat
pub const SAVED_MESSAGES_ID: &str = "saved-messages";

/// Reserved id of the AI assistant (both its chat and its user)
pub const AI_ASSISTANT_ID: &str = "ai-assistant";

/// Sender id used for system notices
pub const SYSTEM_SENDER_ID: &str = "system";

/// Storage key of the current session pointer
pub const SESSION_KEY: &str = "gram_session";

/// Storage key of the user directory (lower-cased username -> user)
pub const USERS_KEY: &str = "gram_users";

/// Prefix of the per-user chat list key (`chats_{user_id}`)
pub const CHATS_KEY_PREFIX: &str = "chats_";

/// Name of the cross-tab broadcast channel
pub const SYNC_CHANNEL_NAME: &str = "starly_sync";

/// Number of prior messages sent to the AI as conversation history
pub const AI_HISTORY_WINDOW: usize = 15;

/// Minimum username length accepted at login/registration
pub const MIN_USERNAME_LEN: usize = 3;

/// Minimum password length accepted at registration
pub const MIN_PASSWORD_LEN: usize = 4;

/// Number of digits of the local lock passcode
pub const PASSCODE_LEN: usize = 4;

/// Number of digits of a two-factor confirmation code
pub const SECOND_FACTOR_CODE_LEN: usize = 6;

/// Length of a generated two-factor secret
pub const TWO_FACTOR_SECRET_LEN: usize = 16;

/// Length of a generated user id
pub const USER_ID_LEN: usize = 9;

/// Maximum decoded size of an inline image/audio attachment (5 MiB)
pub const MAX_ATTACHMENT_BYTES: usize = 5 * 1024 * 1024;

/// Avatar generators (DiceBear seeds)
pub const AVATAR_BASE_URL: &str = "https://api.dicebear.com/7.x/avataaars/svg?seed=";
pub const GROUP_AVATAR_BASE_URL: &str = "https://api.dicebear.com/7.x/initials/svg?seed=";
pub const BOT_AVATAR_URL: &str = "https://api.dicebear.com/7.x/bottts/svg?seed=starli";

/// Public prefix of generated invite links
pub const INVITE_LINK_BASE: &str = "https://starly.chat/+";

/// Text yielded by the AI adapter when the model cannot be reached
pub const BOT_FALLBACK_TEXT: &str = "خطایی در برقراری ارتباط با هوش مصنوعی رخ داد.";

/// Seed messages of a freshly created account
pub const WELCOME_SAVED_TEXT: &str = "خوش آمدید به استارلی جت! اینجا فضای امن شماست.";
pub const WELCOME_BOT_TEXT: &str = "سلام! من هوش مصنوعی استارلی هستم. چه خدمتی از من ساخته است؟";
