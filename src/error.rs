use thiserror::Error;

pub type Result<T> = std::result::Result<T, BotError>;

#[derive(Error, Debug)]
pub enum BotError {
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Unknown timezone: {0}")]
    InvalidTimezone(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to (de)serialize table: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Failed to send message to {user_id}: {reason}")]
    Send { user_id: u64, reason: String },

    #[error("Rejected upload: {0}")]
    Upload(String),

    #[error("Discord error: {0}")]
    Discord(#[from] serenity::Error),
}

impl BotError {
    pub fn send(user_id: u64, reason: impl Into<String>) -> Self {
        Self::Send {
            user_id,
            reason: reason.into(),
        }
    }
}
