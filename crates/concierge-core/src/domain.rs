use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Telegram user id (numeric).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct UserId(pub i64);

/// Telegram chat id (numeric). Equals the user id in private chats.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ChatId(pub i64);

/// Telegram message id (numeric).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MessageId(pub i32);

/// A stable reference to a sent message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MessageRef {
    pub chat_id: ChatId,
    pub message_id: MessageId,
}

/// Where a user is in the registration conversation.
///
/// The pre-registration state is represented by record absence; stored states
/// only ever move forward (awaiting_phone -> registered), never back.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RegistrationState {
    AwaitingPhone,
    Registered,
}

impl RegistrationState {
    pub fn as_str(&self) -> &'static str {
        match self {
            RegistrationState::AwaitingPhone => "awaiting_phone",
            RegistrationState::Registered => "registered",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "awaiting_phone" => Some(Self::AwaitingPhone),
            "registered" => Some(Self::Registered),
            _ => None,
        }
    }
}

/// One row per user, keyed by the channel-assigned id.
#[derive(Clone, Debug, PartialEq)]
pub struct UserRecord {
    pub user_id: UserId,
    pub display_name: String,
    pub handle: Option<String>,
    pub phone_number: Option<String>,
    pub referral_code: Option<String>,
    pub state: RegistrationState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserRecord {
    pub fn new(
        user_id: UserId,
        display_name: impl Into<String>,
        handle: Option<String>,
        state: RegistrationState,
    ) -> Self {
        let now = Utc::now();
        Self {
            user_id,
            display_name: display_name.into(),
            handle,
            phone_number: None,
            referral_code: None,
            state,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Append-only record of one text exchange with the completion engine.
#[derive(Clone, Debug)]
pub struct ChatRecord {
    pub id: String,
    pub user_id: UserId,
    pub input: String,
    pub response: String,
    pub created_at: DateTime<Utc>,
}

impl ChatRecord {
    /// Creates a new record with a generated UUID and current timestamp.
    pub fn new(user_id: UserId, input: impl Into<String>, response: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            user_id,
            input: input.into(),
            response: response.into(),
            created_at: Utc::now(),
        }
    }
}

/// Recognized file content categories.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FileCategory {
    Image,
    Pdf,
    Unsupported,
}

impl FileCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileCategory::Image => "image",
            FileCategory::Pdf => "pdf",
            FileCategory::Unsupported => "unsupported",
        }
    }
}

/// Append-only record of one analyzed file. Only written for recognized
/// categories, after the description call succeeded.
#[derive(Clone, Debug)]
pub struct FileRecord {
    pub id: String,
    pub user_id: UserId,
    pub file_name: String,
    pub category: FileCategory,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

impl FileRecord {
    pub fn new(
        user_id: UserId,
        file_name: impl Into<String>,
        category: FileCategory,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            user_id,
            file_name: file_name.into(),
            category,
            description: description.into(),
            created_at: Utc::now(),
        }
    }
}
