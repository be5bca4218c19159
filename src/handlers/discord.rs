use std::sync::Arc;

use chrono::Utc;
use chrono_tz::Tz;
use serenity::async_trait;
use serenity::model::channel::Message;
use serenity::model::gateway::Ready;
use serenity::prelude::*;
use tracing::{error, info, warn};

use super::commands::CommandService;

pub struct BotHandler {
    commands: Arc<CommandService>,
    timezone: Tz,
}

impl BotHandler {
    pub fn new(commands: Arc<CommandService>, timezone: Tz) -> Self {
        BotHandler { commands, timezone }
    }

    async fn reply(&self, ctx: &Context, msg: &Message, content: &str) {
        if let Err(why) = msg.channel_id.say(&ctx.http, content).await {
            error!("Error sending reply: {:?}", why);
        }
    }
}

#[async_trait]
impl EventHandler for BotHandler {
    async fn ready(&self, _ctx: Context, ready: Ready) {
        info!("{} is connected!", ready.user.name);
    }

    async fn message(&self, ctx: Context, msg: Message) {
        if msg.author.bot {
            return;
        }
        let user_id = msg.author.id.get();

        if let Some(attachment) = msg
            .attachments
            .iter()
            .find(|a| a.filename.to_ascii_lowercase().ends_with(".ics"))
        {
            let reply = match attachment.download().await {
                Ok(bytes) => {
                    self.commands
                        .handle_upload(user_id, &attachment.filename, bytes)
                        .await
                }
                Err(why) => {
                    warn!(user_id, "Failed to download attachment: {:?}", why);
                    "❌ Could not download the file.".to_string()
                }
            };
            self.reply(&ctx, &msg, &reply).await;
            return;
        }

        let today = Utc::now().with_timezone(&self.timezone).date_naive();
        if let Some(reply) = self.commands.handle_text(user_id, &msg.content, today).await {
            self.reply(&ctx, &msg, &reply).await;
        }
    }
}
