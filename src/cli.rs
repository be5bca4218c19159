use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};

use crate::calendar::{format_for_display, IcsParser};
use crate::clients::discord::StdoutSender;
use crate::config::Settings;
use crate::error::Result;
use crate::runtime;
use crate::service::import_service::{decode_upload, ImportService};
use crate::store::ScheduleStore;
use crate::tasks::reminder_scheduler::ReminderScheduler;

#[derive(Parser)]
#[command(about = "Class schedule bot with lesson reminders")]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the chat bot and the reminder scheduler
    Bot,
    /// Import an .ics file into the schedule
    Import {
        file: PathBuf,
        #[arg(long)]
        group: Option<String>,
    },
    /// Print the events of an .ics file without storing them
    Preview { file: PathBuf },
    /// Run one reminder check, printing reminders instead of sending them
    Check,
}

pub async fn run(cli: Cli, settings: Settings) -> Result<()> {
    let settings = Arc::new(settings);
    match cli.command {
        Commands::Bot => runtime::run_bot(settings).await,
        Commands::Import { file, group } => {
            let parser = IcsParser::new(settings.timezone, settings.offset_policy);
            let events = parser.parse(&read_calendar(&file).await?);
            let store = ScheduleStore::open(&settings.db_location).await?;
            let group = group.unwrap_or_else(|| settings.default_group.clone());
            let summary =
                ImportService::import_events(&store, &events, &group, settings.timezone).await;
            println!(
                "Events found: {}, added to {}: {}",
                summary.parsed, group, summary.added
            );
            Ok(())
        }
        Commands::Preview { file } => {
            let parser = IcsParser::new(settings.timezone, settings.offset_policy);
            let events = parser.parse(&read_calendar(&file).await?);
            println!("{}", format_for_display(&events));
            Ok(())
        }
        Commands::Check => {
            let store = Arc::new(ScheduleStore::open(&settings.db_location).await?);
            let scheduler = ReminderScheduler::new(
                store.clone(),
                store,
                Arc::new(StdoutSender),
                settings.timezone,
            );
            let report = scheduler.check_events().await?;
            println!(
                "Checked {} events for {}, reminders sent for {}",
                report.checked,
                report.date,
                report.reminders.len()
            );
            Ok(())
        }
    }
}

async fn read_calendar(path: &Path) -> Result<String> {
    let bytes = tokio::fs::read(path).await?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    decode_upload(&name, bytes)
}
