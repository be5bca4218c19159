use std::sync::Arc;

use serenity::model::gateway::GatewayIntents;
use tracing::info;

use crate::clients::discord::DiscordDmSender;
use crate::config::Settings;
use crate::error::{BotError, Result};
use crate::handlers::commands::CommandService;
use crate::handlers::discord::BotHandler;
use crate::store::ScheduleStore;
use crate::tasks::reminder_scheduler::ReminderScheduler;

/// Runs the chat client and the reminder scheduler until Ctrl-C.
pub async fn run_bot(settings: Arc<Settings>) -> Result<()> {
    let token = settings
        .bot_token
        .clone()
        .ok_or_else(|| BotError::Config("BOT_TOKEN must be set for bot mode".to_string()))?;
    let store = Arc::new(ScheduleStore::open(&settings.db_location).await?);
    let commands = Arc::new(CommandService::new(store.clone(), settings.clone()));

    let intents = GatewayIntents::GUILD_MESSAGES
        | GatewayIntents::DIRECT_MESSAGES
        | GatewayIntents::MESSAGE_CONTENT;
    let mut client = serenity::Client::builder(&token, intents)
        .event_handler(BotHandler::new(commands, settings.timezone))
        .await?;

    let sender = Arc::new(DiscordDmSender::new(client.http.clone()));
    let scheduler = Arc::new(ReminderScheduler::new(
        store.clone(),
        store,
        sender,
        settings.timezone,
    ));
    scheduler.start(settings.notification_interval_minutes).await;

    let shard_manager = client.shard_manager.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown requested");
            shard_manager.shutdown_all().await;
        }
    });

    info!("Bot starting...");
    let result = client.start().await;
    scheduler.stop().await;
    info!("Cleanup completed");
    result.map_err(BotError::from)
}
