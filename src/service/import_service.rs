use chrono::{NaiveTime, Timelike};
use chrono_tz::Tz;
use tracing::{info, warn};

use crate::calendar::infer_lesson_type;
use crate::calendar::parser::CalendarEvent;
use crate::error::{BotError, Result};
use crate::models::event::NewEvent;
use crate::store::ScheduleStore;

const ROOM_NOT_SPECIFIED: &str = "Room not specified";
const UTF8_BOM: &str = "\u{feff}";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportSummary {
    pub parsed: usize,
    pub added: usize,
}

/// Validates an uploaded attachment and returns its text.
pub fn decode_upload(filename: &str, bytes: Vec<u8>) -> Result<String> {
    if !filename.to_ascii_lowercase().ends_with(".ics") {
        return Err(BotError::Upload(format!(
            "{filename} must have the .ics extension"
        )));
    }
    let text = String::from_utf8(bytes)
        .map_err(|_| BotError::Upload(format!("{filename} is not valid UTF-8")))?;
    Ok(match text.strip_prefix(UTF8_BOM) {
        Some(rest) => rest.to_string(),
        None => text,
    })
}

/// Converts a parsed event into a schedule entry for `group_name`. The wall
/// clock date and time are taken in `timezone`.
pub fn to_schedule_entry(event: &CalendarEvent, group_name: &str, timezone: Tz) -> NewEvent {
    let local = event.start_time.with_timezone(&timezone);
    let room = if event.location.trim().is_empty() {
        ROOM_NOT_SPECIFIED.to_string()
    } else {
        event.location.clone()
    };
    NewEvent {
        date: local.date_naive(),
        time: NaiveTime::from_hms_opt(local.hour(), local.minute(), 0).unwrap_or_default(),
        title: event.summary.clone(),
        room,
        group_name: group_name.to_string(),
        lesson_type: infer_lesson_type(&event.summary, event.lesson_tag.as_deref()),
    }
}

pub struct ImportService;

impl ImportService {
    /// Stores every parsed event for `group_name`; an event that fails to
    /// save is logged and skipped.
    pub async fn import_events(
        store: &ScheduleStore,
        events: &[CalendarEvent],
        group_name: &str,
        timezone: Tz,
    ) -> ImportSummary {
        let mut added = 0;
        for event in events {
            let entry = to_schedule_entry(event, group_name, timezone);
            match store.add_event(entry).await {
                Ok(_) => added += 1,
                Err(err) => warn!(uid = %event.uid, "Error adding event: {}", err),
            }
        }
        info!(
            "Imported {}/{} events for group {}",
            added,
            events.len(),
            group_name
        );
        ImportSummary {
            parsed: events.len(),
            added,
        }
    }
}
