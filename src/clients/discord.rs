use std::sync::Arc;

use serenity::async_trait;
use serenity::http::Http;
use serenity::model::id::UserId;

use crate::error::{BotError, Result};

/// Outbound direct messages to a single user.
#[async_trait]
pub trait DmSender: Send + Sync {
    async fn send_dm(&self, user_id: u64, content: &str) -> Result<()>;
}

pub struct DiscordDmSender {
    http: Arc<Http>,
}

impl DiscordDmSender {
    pub fn new(http: Arc<Http>) -> Self {
        Self { http }
    }
}

#[async_trait]
impl DmSender for DiscordDmSender {
    async fn send_dm(&self, user_id: u64, content: &str) -> Result<()> {
        if user_id == 0 {
            return Err(BotError::send(user_id, "invalid user id"));
        }
        let channel = UserId::new(user_id)
            .create_dm_channel(&*self.http)
            .await
            .map_err(|e| BotError::send(user_id, format!("failed to open DM channel: {e}")))?;
        channel
            .say(&*self.http, content)
            .await
            .map_err(|e| BotError::send(user_id, format!("failed to send DM: {e}")))?;
        Ok(())
    }
}

/// Prints reminders instead of delivering them; used by the `check` command.
pub struct StdoutSender;

#[async_trait]
impl DmSender for StdoutSender {
    async fn send_dm(&self, user_id: u64, content: &str) -> Result<()> {
        println!("--- to {user_id} ---\n{content}\n");
        Ok(())
    }
}
