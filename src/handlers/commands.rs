use std::sync::Arc;

use chrono::{Datelike, Days, NaiveDate, NaiveTime};
use tracing::{info, warn};

use crate::calendar::{format_for_display, infer_lesson_type, IcsParser};
use crate::config::Settings;
use crate::models::event::{EventRecord, NewEvent};
use crate::models::user::UserRole;
use crate::service::import_service::{decode_upload, ImportService};
use crate::store::ScheduleStore;

/// Discord rejects messages longer than this.
pub const MAX_REPLY_CHARS: usize = 2000;
const PREVIEW_EVENTS: usize = 10;

/// Transport-independent command handling. Every method returns the reply
/// text to send back to the user.
pub struct CommandService {
    store: Arc<ScheduleStore>,
    settings: Arc<Settings>,
    parser: IcsParser,
}

impl CommandService {
    pub fn new(store: Arc<ScheduleStore>, settings: Arc<Settings>) -> Self {
        let parser = IcsParser::new(settings.timezone, settings.offset_policy);
        Self {
            store,
            settings,
            parser,
        }
    }

    /// Handles a `!command`; `None` when the text is not a known command.
    pub async fn handle_text(&self, user_id: u64, text: &str, today: NaiveDate) -> Option<String> {
        let text = text.trim();
        let (command, args) = match text.split_once(char::is_whitespace) {
            Some((command, args)) => (command, args.trim()),
            None => (text, ""),
        };
        let reply = match command {
            "!register" => self.register(user_id, args).await,
            "!setgroup" => self.set_group(user_id, args).await,
            "!notifications" => self.notifications(user_id, args).await,
            "!today" => self.schedule_for(user_id, today).await,
            "!tomorrow" => match today.checked_add_days(Days::new(1)) {
                Some(tomorrow) => self.schedule_for(user_id, tomorrow).await,
                None => "Invalid date.".to_string(),
            },
            "!schedule_week" => self.schedule_week(user_id, today).await,
            "!clear_schedule" => self.clear_schedule(user_id).await,
            "!add_event" | "!edit_event" | "!delete_event" | "!all_events"
            | "!set_user_role" => {
                if !self.is_admin(user_id).await {
                    return Some("This command is available to administrators only.".to_string());
                }
                match command {
                    "!add_event" => self.add_event(args).await,
                    "!edit_event" => self.edit_event(args).await,
                    "!delete_event" => self.delete_event(args).await,
                    "!all_events" => self.all_events().await,
                    _ => self.set_user_role(user_id, args).await,
                }
            }
            _ => return None,
        };
        Some(reply)
    }

    async fn register(&self, user_id: u64, full_name: &str) -> String {
        let name = (!full_name.is_empty()).then(|| full_name.to_string());
        match self.store.upsert_user(user_id, name).await {
            Ok(user) => match user.group_name {
                Some(group) => format!("You are registered in group {group}."),
                None => "You are registered. Set your group with `!setgroup <name>`.".to_string(),
            },
            Err(err) => {
                warn!(user_id, "Failed to register user: {}", err);
                "Registration failed, please try again later.".to_string()
            }
        }
    }

    async fn set_group(&self, user_id: u64, group: &str) -> String {
        if group.is_empty() {
            return "Usage: `!setgroup <name>`".to_string();
        }
        let result = match self.store.upsert_user(user_id, None).await {
            Ok(_) => self.store.set_group(user_id, group).await,
            Err(err) => Err(err),
        };
        match result {
            Ok(()) => format!("Group set to {group}."),
            Err(err) => {
                warn!(user_id, "Failed to set group: {}", err);
                "Could not update your group, please try again later.".to_string()
            }
        }
    }

    async fn notifications(&self, user_id: u64, arg: &str) -> String {
        let enabled = match arg.to_ascii_lowercase().as_str() {
            "on" => true,
            "off" => false,
            _ => return "Usage: `!notifications on|off`".to_string(),
        };
        if self.store.user(user_id).await.is_none() {
            return "Register first with `!register`.".to_string();
        }
        match self.store.set_notifications(user_id, enabled).await {
            Ok(()) if enabled => "Lesson reminders enabled.".to_string(),
            Ok(()) => "Lesson reminders disabled.".to_string(),
            Err(err) => {
                warn!(user_id, "Failed to toggle notifications: {}", err);
                "Could not update your settings, please try again later.".to_string()
            }
        }
    }

    async fn schedule_for(&self, user_id: u64, date: NaiveDate) -> String {
        let Some(group) = self.store.user(user_id).await.and_then(|u| u.group_name) else {
            return "Set your group first with `!setgroup <name>`.".to_string();
        };
        let events = self.store.events_for_group(&group, Some(date)).await;
        let day = date.format("%d.%m.%Y");
        if events.is_empty() {
            return format!("📭 No lessons scheduled for {group} on {day}");
        }
        let mut reply = format!("📅 *Schedule for {group}, {day}*\n\n");
        for event in events {
            reply.push_str(&format!(
                "{} *{}*\n   📖 {}\n   📍 {}\n\n",
                event.lesson_type.icon(),
                event.time.format("%H:%M"),
                event.title,
                event.room
            ));
        }
        truncate_reply(reply)
    }

    async fn schedule_week(&self, user_id: u64, today: NaiveDate) -> String {
        let Some(group) = self.store.user(user_id).await.and_then(|u| u.group_name) else {
            return "Set your group first with `!setgroup <name>`.".to_string();
        };
        let Some((monday, sunday)) = week_bounds(today) else {
            return "Invalid date.".to_string();
        };
        let week: Vec<EventRecord> = self
            .store
            .events_for_group(&group, None)
            .await
            .into_iter()
            .filter(|e| e.date >= monday && e.date <= sunday)
            .collect();
        if week.is_empty() {
            return format!("📭 No lessons for {group} this week");
        }

        let mut reply = format!(
            "📅 *Week schedule for {group} ({} - {})*\n\n",
            monday.format("%d.%m"),
            sunday.format("%d.%m.%Y")
        );
        let mut current = None;
        for event in week {
            if current != Some(event.date) {
                if current.is_some() {
                    reply.push('\n');
                }
                reply.push_str(&format!("📆 *{}:*\n", event.date.format("%d.%m (%a)")));
                current = Some(event.date);
            }
            reply.push_str(&format!(
                "{} {} - {} ({})\n",
                event.lesson_type.icon(),
                event.time.format("%H:%M"),
                event.title,
                event.room
            ));
        }
        truncate_reply(reply)
    }

    /// Configured admin ids and users holding the admin role.
    async fn is_admin(&self, user_id: u64) -> bool {
        self.settings.is_admin(user_id)
            || self
                .store
                .user(user_id)
                .await
                .is_some_and(|user| user.role == UserRole::Admin)
    }

    async fn add_event(&self, args: &str) -> String {
        let fields: Vec<&str> = args.split_whitespace().collect();
        if fields.len() < 5 {
            return "Usage: `!add_event <YYYY-MM-DD> <HH:MM> <title> <room> <group>`".to_string();
        }
        let event = match parse_event_fields(&fields) {
            Ok(event) => event,
            Err(reply) => return reply,
        };
        let reply = format!(
            "📝 {}\n⏰ {} {}\n👥 {}\n🏫 Room {}",
            event.title,
            event.time.format("%H:%M"),
            event.date,
            event.group_name,
            event.room
        );
        match self.store.add_event(event).await {
            Ok(id) => format!("✅ Event #{id} added:\n{reply}"),
            Err(err) => {
                warn!("Failed to add event: {}", err);
                "Could not add the event.".to_string()
            }
        }
    }

    async fn edit_event(&self, args: &str) -> String {
        let fields: Vec<&str> = args.split_whitespace().collect();
        if fields.len() < 6 {
            return "Usage: `!edit_event <id> <YYYY-MM-DD> <HH:MM> <title> <room> <group>`"
                .to_string();
        }
        let Ok(id) = fields[0].parse::<u64>() else {
            return "❌ Event id must be a number".to_string();
        };
        let event = match parse_event_fields(&fields[1..]) {
            Ok(event) => event,
            Err(reply) => return reply,
        };
        match self.store.edit_event(id, event).await {
            Ok(true) => format!("✅ Event #{id} updated"),
            Ok(false) => format!("❌ Event #{id} not found"),
            Err(err) => {
                warn!(event_id = id, "Failed to edit event: {}", err);
                "Could not update the event.".to_string()
            }
        }
    }

    async fn delete_event(&self, args: &str) -> String {
        let Ok(id) = args.parse::<u64>() else {
            return "Usage: `!delete_event <id>`".to_string();
        };
        match self.store.delete_event(id).await {
            Ok(true) => format!("✅ Event #{id} deleted"),
            Ok(false) => format!("❌ Event #{id} not found"),
            Err(err) => {
                warn!(event_id = id, "Failed to delete event: {}", err);
                "Could not delete the event.".to_string()
            }
        }
    }

    async fn all_events(&self) -> String {
        let events = self.store.all_events().await;
        if events.is_empty() {
            return "📭 No events stored".to_string();
        }
        let mut reply = String::from("📋 *All events:*\n\n");
        for event in events {
            reply.push_str(&format!(
                "#{} {} {}: {} (room {}) for {}\n",
                event.id,
                event.date,
                event.time.format("%H:%M"),
                event.title,
                event.room,
                event.group_name
            ));
        }
        truncate_reply(reply)
    }

    async fn set_user_role(&self, admin_id: u64, args: &str) -> String {
        const USAGE: &str = "Usage: `!set_user_role <user_id> <student|group_leader|teacher|admin>`";
        let Some((target, role)) = args.split_once(char::is_whitespace) else {
            return USAGE.to_string();
        };
        let Ok(target) = target.parse::<u64>() else {
            return "❌ user_id must be a number".to_string();
        };
        let Ok(role) = role.parse::<UserRole>() else {
            return format!("❌ Unknown role. {}", USAGE);
        };
        let Some(user) = self.store.user(target).await else {
            return format!("❌ User {target} not found");
        };
        match self.store.set_role(target, role).await {
            Ok(()) => {
                info!(admin_id, target, ?role, "Role assigned");
                let name = user.full_name.unwrap_or_else(|| target.to_string());
                format!("✅ Role assigned\n\n👤 User: {name}\n🪪 New role: *{}*", role.label())
            }
            Err(err) => {
                warn!(target, "Failed to set role: {}", err);
                "Could not assign the role.".to_string()
            }
        }
    }

    async fn clear_schedule(&self, user_id: u64) -> String {
        if !self.is_admin(user_id).await {
            return "This command is available to administrators only.".to_string();
        }
        match self.store.clear_events().await {
            Ok(count) => format!("Schedule cleared. Removed events: {count}"),
            Err(err) => {
                warn!(user_id, "Failed to clear schedule: {}", err);
                "Could not clear the schedule.".to_string()
            }
        }
    }

    /// Imports an uploaded calendar file for the uploader's group.
    pub async fn handle_upload(&self, user_id: u64, filename: &str, bytes: Vec<u8>) -> String {
        if !self.is_admin(user_id).await {
            return "Only administrators can upload schedules.".to_string();
        }
        let content = match decode_upload(filename, bytes) {
            Ok(content) => content,
            Err(err) => return format!("❌ {err}"),
        };

        let events = self.parser.parse(&content);
        if events.is_empty() {
            return "❌ No events could be recognised in the file".to_string();
        }

        let group = self
            .store
            .user(user_id)
            .await
            .and_then(|u| u.group_name)
            .unwrap_or_else(|| self.settings.default_group.clone());
        let summary =
            ImportService::import_events(&self.store, &events, &group, self.settings.timezone).await;
        info!(user_id, "Uploaded {} events from {}", summary.parsed, filename);

        let preview = &events[..events.len().min(PREVIEW_EVENTS)];
        truncate_reply(format!(
            "✅ *Schedule uploaded!*\n\n📊 Events found: {}\n💾 Added to {}: {}\n\n{}",
            summary.parsed,
            group,
            summary.added,
            format_for_display(preview)
        ))
    }
}

/// Builds an event from `date time title room group...`; the group takes the
/// remaining words.
fn parse_event_fields(fields: &[&str]) -> Result<NewEvent, String> {
    let Ok(date) = NaiveDate::parse_from_str(fields[0], "%Y-%m-%d") else {
        return Err("❌ Invalid date, use YYYY-MM-DD".to_string());
    };
    let Ok(time) = NaiveTime::parse_from_str(fields[1], "%H:%M") else {
        return Err("❌ Invalid time, use HH:MM".to_string());
    };
    let title = fields[2].to_string();
    Ok(NewEvent {
        date,
        time,
        lesson_type: infer_lesson_type(&title, None),
        title,
        room: fields[3].to_string(),
        group_name: fields[4..].join(" "),
    })
}

/// Monday and Sunday of the week containing `day`.
fn week_bounds(day: NaiveDate) -> Option<(NaiveDate, NaiveDate)> {
    let monday = day.checked_sub_days(Days::new(u64::from(day.weekday().num_days_from_monday())))?;
    let sunday = monday.checked_add_days(Days::new(6))?;
    Some((monday, sunday))
}

pub fn truncate_reply(mut reply: String) -> String {
    if let Some((idx, _)) = reply.char_indices().nth(MAX_REPLY_CHARS) {
        reply.truncate(idx);
    }
    reply
}
