use std::env;
use std::sync::Arc;

use chrono::{NaiveDate, NaiveTime, TimeZone, Utc};
use scheduleBot::calendar::IcsParser;
use scheduleBot::clients::discord::DmSender;
use scheduleBot::config::Settings;
use scheduleBot::error::Result;
use scheduleBot::handlers::commands::CommandService;
use scheduleBot::models::event::{LessonType, NewEvent};
use scheduleBot::models::user::UserRole;
use scheduleBot::service::import_service::ImportService;
use scheduleBot::store::ScheduleStore;
use scheduleBot::tasks::reminder_scheduler::ReminderScheduler;
use tokio::sync::Mutex;

const SCHEDULE: &str = "BEGIN:VCALENDAR\n\
BEGIN:VEVENT\n\
UID:a@cabinet\n\
DTSTART;TZID=Europe/Kiev:20260212T114000\n\
DTEND;TZID=Europe/Kiev:20260212T130000\n\
SUMMARY:Технології захисту інформації (лабораторне заняття)\n\
LOCATION:H-204\n\
END:VEVENT\n\
BEGIN:VEVENT\n\
UID:b@cabinet\n\
DTSTART;TZID=Europe/Kiev:20260212T140000\n\
SUMMARY:Практичне заняття з алгоритмів\n\
END:VEVENT\n\
END:VCALENDAR\n";

#[derive(Default)]
struct RecordingSender {
    sent: Mutex<Vec<(u64, String)>>,
}

#[serenity::async_trait]
impl DmSender for RecordingSender {
    async fn send_dm(&self, user_id: u64, content: &str) -> Result<()> {
        self.sent.lock().await.push((user_id, content.to_string()));
        Ok(())
    }
}

fn temp_dir() -> std::path::PathBuf {
    env::temp_dir().join(format!("schedulebot_it_{}", uuid::Uuid::new_v4()))
}

#[tokio::test]
async fn imported_schedule_drives_reminders() {
    let dir = temp_dir();
    let store = Arc::new(ScheduleStore::open(&dir).await.unwrap());
    for (user_id, enabled) in [(1, true), (2, false), (3, true)] {
        store.upsert_user(user_id, None).await.unwrap();
        store.set_group(user_id, "IN-23").await.unwrap();
        store.set_notifications(user_id, enabled).await.unwrap();
    }

    let events = IcsParser::default().parse(SCHEDULE);
    let summary =
        ImportService::import_events(&store, &events, "IN-23", chrono_tz::Europe::Kiev).await;
    assert_eq!((summary.parsed, summary.added), (2, 2));

    let day = NaiveDate::from_ymd_opt(2026, 2, 12).unwrap();
    let stored = store.events_for_group("IN-23", Some(day)).await;
    assert_eq!(stored.len(), 2);
    assert_eq!(stored[0].time, NaiveTime::from_hms_opt(11, 40, 0).unwrap());
    assert_eq!(stored[0].lesson_type, LessonType::Laboratory);
    assert_eq!(stored[0].room, "H-204");
    assert_eq!(stored[1].lesson_type, LessonType::Practice);
    assert_eq!(stored[1].room, "Room not specified");

    let sender = Arc::new(RecordingSender::default());
    let scheduler = ReminderScheduler::new(
        store.clone(),
        store.clone(),
        sender.clone(),
        chrono_tz::Europe::Kiev,
    );

    // 11:36 in Kyiv
    let now = Utc.with_ymd_and_hms(2026, 2, 12, 9, 36, 0).unwrap();
    let report = scheduler.check_events_at(now).await.unwrap();
    assert_eq!(report.checked, 2);
    assert_eq!(report.reminders.len(), 1);
    assert_eq!(report.reminders[0].event_id, stored[0].id);

    let sent = sender.sent.lock().await;
    let recipients: Vec<u64> = sent.iter().map(|(id, _)| *id).collect();
    assert_eq!(recipients, vec![1, 3]);
    assert!(sent[0].1.contains("Технології захисту інформації"));
    drop(sent);

    let _ = std::fs::remove_dir_all(&dir);
}

#[tokio::test]
async fn upload_command_imports_for_uploader_group() {
    let dir = temp_dir();
    let store = Arc::new(ScheduleStore::open(&dir).await.unwrap());
    let settings = Settings {
        admin_ids: [42].into_iter().collect(),
        ..Settings::default()
    };
    let service = CommandService::new(store.clone(), Arc::new(settings));
    let day = NaiveDate::from_ymd_opt(2026, 2, 12).unwrap();

    let denied = service
        .handle_upload(7, "schedule.ics", SCHEDULE.as_bytes().to_vec())
        .await;
    assert!(denied.contains("administrators"));

    service.handle_text(42, "!setgroup IN-23", day).await.unwrap();
    let wrong_ext = service
        .handle_upload(42, "schedule.txt", SCHEDULE.as_bytes().to_vec())
        .await;
    assert!(wrong_ext.contains(".ics"));

    let empty = service
        .handle_upload(42, "empty.ics", b"BEGIN:VCALENDAR\nEND:VCALENDAR".to_vec())
        .await;
    assert!(empty.contains("No events"));

    let reply = service
        .handle_upload(42, "schedule.ics", SCHEDULE.as_bytes().to_vec())
        .await;
    assert!(reply.contains("Events found: 2"));
    assert!(reply.contains("Added to IN-23: 2"));
    assert!(reply.contains("12.02.2026"));

    let today = service.handle_text(42, "!today", day).await.unwrap();
    assert!(today.contains("11:40"));
    assert!(today.contains("Практичне заняття з алгоритмів"));

    let tomorrow = service.handle_text(42, "!tomorrow", day).await.unwrap();
    assert!(tomorrow.contains("No lessons"));

    let _ = std::fs::remove_dir_all(&dir);
}

#[tokio::test]
async fn notification_toggle_requires_registration() {
    let dir = temp_dir();
    let store = Arc::new(ScheduleStore::open(&dir).await.unwrap());
    let service = CommandService::new(store.clone(), Arc::new(Settings::default()));
    let day = NaiveDate::from_ymd_opt(2026, 2, 12).unwrap();

    let reply = service.handle_text(5, "!notifications off", day).await.unwrap();
    assert!(reply.contains("Register first"));

    service.handle_text(5, "!register Olena Petrenko", day).await.unwrap();
    service.handle_text(5, "!setgroup IN-23", day).await.unwrap();
    let reply = service.handle_text(5, "!notifications off", day).await.unwrap();
    assert_eq!(reply, "Lesson reminders disabled.");

    let user = store.user(5).await.unwrap();
    assert!(!user.notifications_enabled);
    assert_eq!(user.full_name.as_deref(), Some("Olena Petrenko"));
    assert_eq!(user.group_name.as_deref(), Some("IN-23"));

    let cleared = service.handle_text(5, "!clear_schedule", day).await.unwrap();
    assert!(cleared.contains("administrators only"));

    let _ = std::fs::remove_dir_all(&dir);
}

fn lesson(title: &str, day: NaiveDate, hour: u32) -> NewEvent {
    NewEvent {
        date: day,
        time: NaiveTime::from_hms_opt(hour, 0, 0).unwrap(),
        title: title.to_string(),
        room: "H-204".to_string(),
        group_name: "IN-23".to_string(),
        lesson_type: LessonType::Lecture,
    }
}

#[tokio::test]
async fn schedule_added_after_clear_is_still_reminded() {
    let dir = temp_dir();
    let store = Arc::new(ScheduleStore::open(&dir).await.unwrap());
    store.upsert_user(1, None).await.unwrap();
    store.set_group(1, "IN-23").await.unwrap();
    let day = NaiveDate::from_ymd_opt(2026, 2, 12).unwrap();

    let sender = Arc::new(RecordingSender::default());
    let scheduler =
        ReminderScheduler::new(store.clone(), store.clone(), sender.clone(), chrono_tz::UTC);

    let old_id = store.add_event(lesson("Old lesson", day, 9)).await.unwrap();
    let morning = Utc.with_ymd_and_hms(2026, 2, 12, 8, 58, 0).unwrap();
    assert_eq!(scheduler.check_events_at(morning).await.unwrap().reminders.len(), 1);

    store.clear_events().await.unwrap();
    let new_id = store.add_event(lesson("New lesson", day, 15)).await.unwrap();
    assert_ne!(old_id, new_id);

    let afternoon = Utc.with_ymd_and_hms(2026, 2, 12, 14, 58, 0).unwrap();
    let report = scheduler.check_events_at(afternoon).await.unwrap();
    assert_eq!(report.reminders.len(), 1);
    assert_eq!(report.reminders[0].event_id, new_id);

    let sent = sender.sent.lock().await;
    assert_eq!(sent.len(), 2);
    assert!(sent[1].1.contains("New lesson"));
    drop(sent);

    let _ = std::fs::remove_dir_all(&dir);
}

#[tokio::test]
async fn admin_commands_manage_events_and_roles() {
    let dir = temp_dir();
    let store = Arc::new(ScheduleStore::open(&dir).await.unwrap());
    let settings = Settings {
        admin_ids: [42].into_iter().collect(),
        ..Settings::default()
    };
    let service = CommandService::new(store.clone(), Arc::new(settings));
    let day = NaiveDate::from_ymd_opt(2026, 2, 12).unwrap();

    let denied = service.handle_text(7, "!all_events", day).await.unwrap();
    assert!(denied.contains("administrators only"));

    let added = service
        .handle_text(42, "!add_event 2026-02-13 10:00 Algebra 301 IN-23", day)
        .await
        .unwrap();
    assert!(added.contains("Event #1 added"));
    let bad = service
        .handle_text(42, "!add_event 13.02.2026 10:00 Algebra 301 IN-23", day)
        .await
        .unwrap();
    assert!(bad.contains("Invalid date"));

    let edited = service
        .handle_text(42, "!edit_event 1 2026-02-14 12:30 Geometry 302 IN-23", day)
        .await
        .unwrap();
    assert_eq!(edited, "✅ Event #1 updated");
    let listing = service.handle_text(42, "!all_events", day).await.unwrap();
    assert!(listing.contains("#1 2026-02-14 12:30: Geometry (room 302) for IN-23"));

    service.handle_text(7, "!register Ivan Franko", day).await.unwrap();
    service.handle_text(7, "!setgroup IN-23", day).await.unwrap();
    let week = service.handle_text(7, "!schedule_week", day).await.unwrap();
    assert!(week.contains("09.02 - 15.02.2026"));
    assert!(week.contains("12:30 - Geometry (302)"));

    let missing = service.handle_text(42, "!set_user_role 99 admin", day).await.unwrap();
    assert!(missing.contains("not found"));
    let unknown = service.handle_text(42, "!set_user_role 7 dean", day).await.unwrap();
    assert!(unknown.contains("Unknown role"));
    let promoted = service.handle_text(42, "!set_user_role 7 admin", day).await.unwrap();
    assert!(promoted.contains("Ivan Franko"));
    assert_eq!(store.user(7).await.unwrap().role, UserRole::Admin);

    let deleted = service.handle_text(7, "!delete_event 1", day).await.unwrap();
    assert_eq!(deleted, "✅ Event #1 deleted");
    let gone = service.handle_text(7, "!delete_event 1", day).await.unwrap();
    assert_eq!(gone, "❌ Event #1 not found");

    let _ = std::fs::remove_dir_all(&dir);
}
