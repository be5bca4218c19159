pub mod table;

use std::path::Path;

use chrono::NaiveDate;
use serenity::async_trait;
use tokio::sync::Mutex;
use tracing::info;

use crate::error::{BotError, Result};
use crate::models::event::{EventRecord, NewEvent};
use crate::models::user::{UserRecord, UserRole};
use table::Table;

/// Read access to persisted schedule entries.
#[async_trait]
pub trait EventStore: Send + Sync {
    async fn events_for_date(&self, date: NaiveDate) -> Result<Vec<EventRecord>>;
}

/// Group membership lookups for reminder fan-out.
#[async_trait]
pub trait SubscriberDirectory: Send + Sync {
    /// Members of `group_name` with notifications enabled.
    async fn notification_subscribers(&self, group_name: &str) -> Result<Vec<UserRecord>>;
}

/// Events and users kept in two JSON tables under one directory.
pub struct ScheduleStore {
    events: Mutex<Table<EventRecord>>,
    users: Mutex<Table<UserRecord>>,
}

impl ScheduleStore {
    pub async fn open(dir: &Path) -> Result<Self> {
        let events = Table::load(dir, "events").await?;
        let users = Table::load(dir, "users").await?;
        info!(
            events = events.len(),
            users = users.len(),
            "Opened schedule store at {}",
            dir.display()
        );
        Ok(Self {
            events: Mutex::new(events),
            users: Mutex::new(users),
        })
    }

    pub async fn add_event(&self, event: NewEvent) -> Result<u64> {
        let mut events = self.events.lock().await;
        let id = events.allocate_id();
        events.insert(id, event.into_record(id));
        events.save().await?;
        Ok(id)
    }

    /// Events of one group, optionally restricted to a date, ordered by date
    /// then time.
    pub async fn events_for_group(
        &self,
        group_name: &str,
        date: Option<NaiveDate>,
    ) -> Vec<EventRecord> {
        let events = self.events.lock().await;
        let mut matching: Vec<EventRecord> = events
            .values()
            .filter(|e| e.group_name == group_name && date.is_none_or(|d| e.date == d))
            .cloned()
            .collect();
        matching.sort_by_key(|e| (e.date, e.time));
        matching
    }

    /// Every stored event, ordered by date then time.
    pub async fn all_events(&self) -> Vec<EventRecord> {
        let events = self.events.lock().await;
        let mut all: Vec<EventRecord> = events.values().cloned().collect();
        all.sort_by_key(|e| (e.date, e.time, e.id));
        all
    }

    /// Replaces the fields of event `id`, keeping its id. Returns `false` when
    /// no such event exists.
    pub async fn edit_event(&self, id: u64, event: NewEvent) -> Result<bool> {
        let mut events = self.events.lock().await;
        let Some(slot) = events.get_mut(id) else {
            return Ok(false);
        };
        *slot = event.into_record(id);
        events.save().await?;
        Ok(true)
    }

    pub async fn delete_event(&self, id: u64) -> Result<bool> {
        let mut events = self.events.lock().await;
        let removed = events.remove(id).is_some();
        if removed {
            events.save().await?;
        }
        Ok(removed)
    }

    pub async fn clear_events(&self) -> Result<usize> {
        let mut events = self.events.lock().await;
        let count = events.clear();
        events.save().await?;
        Ok(count)
    }

    pub async fn user(&self, user_id: u64) -> Option<UserRecord> {
        self.users.lock().await.get(user_id).cloned()
    }

    /// Creates the user if missing, optionally updating the full name.
    pub async fn upsert_user(&self, user_id: u64, full_name: Option<String>) -> Result<UserRecord> {
        let mut users = self.users.lock().await;
        let mut record = users
            .get(user_id)
            .cloned()
            .unwrap_or_else(|| UserRecord::new(user_id));
        if full_name.is_some() {
            record.full_name = full_name;
        }
        users.insert(user_id, record.clone());
        users.save().await?;
        Ok(record)
    }

    pub async fn set_group(&self, user_id: u64, group_name: &str) -> Result<()> {
        self.update_user(user_id, |user| user.group_name = Some(group_name.to_string()))
            .await
    }

    pub async fn set_notifications(&self, user_id: u64, enabled: bool) -> Result<()> {
        self.update_user(user_id, |user| user.notifications_enabled = enabled)
            .await
    }

    pub async fn set_role(&self, user_id: u64, role: UserRole) -> Result<()> {
        self.update_user(user_id, |user| user.role = role).await
    }

    async fn update_user<F>(&self, user_id: u64, apply: F) -> Result<()>
    where
        F: FnOnce(&mut UserRecord),
    {
        let mut users = self.users.lock().await;
        let Some(user) = users.get_mut(user_id) else {
            return Err(BotError::Store(format!("Unknown user {user_id}")));
        };
        apply(user);
        users.save().await
    }
}

#[async_trait]
impl EventStore for ScheduleStore {
    async fn events_for_date(&self, date: NaiveDate) -> Result<Vec<EventRecord>> {
        let events = self.events.lock().await;
        Ok(events.values().filter(|e| e.date == date).cloned().collect())
    }
}

#[async_trait]
impl SubscriberDirectory for ScheduleStore {
    async fn notification_subscribers(&self, group_name: &str) -> Result<Vec<UserRecord>> {
        let users = self.users.lock().await;
        Ok(users
            .values()
            .filter(|u| u.notifications_enabled && u.group_name.as_deref() == Some(group_name))
            .cloned()
            .collect())
    }
}
