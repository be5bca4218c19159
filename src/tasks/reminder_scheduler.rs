//! Periodic lesson reminders.
//!
//! Every tick reads today's schedule, and for each event whose start is at most
//! [`NOTIFY_LEAD_MINUTES`] away (or already past) sends one reminder to the
//! subscribed members of its group. Notified event ids are remembered for the
//! lifetime of the process only; a restart forgets them and may repeat
//! reminders for events of the current day.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::clients::discord::DmSender;
use crate::error::Result;
use crate::service::reminder_service::ReminderService;
use crate::store::{EventStore, SubscriberDirectory};

pub const NOTIFY_LEAD_MINUTES: i64 = 5;
/// Longest accepted check interval, one week.
pub const MAX_INTERVAL_MINUTES: u64 = 7 * 24 * 60;
const FIRST_RUN_DELAY: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReminderOutcome {
    pub event_id: u64,
    pub sent: usize,
    pub total: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckReport {
    pub date: NaiveDate,
    pub checked: usize,
    pub reminders: Vec<ReminderOutcome>,
}

struct Job {
    stop_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl Job {
    async fn shutdown(self) {
        let _ = self.stop_tx.send(true);
        if let Err(err) = self.handle.await {
            error!("Reminder job ended abnormally: {}", err);
        }
    }
}

pub struct ReminderScheduler {
    events: Arc<dyn EventStore>,
    subscribers: Arc<dyn SubscriberDirectory>,
    sender: Arc<dyn DmSender>,
    timezone: Tz,
    first_run_delay: Duration,
    notified: Mutex<HashSet<u64>>,
    job: Mutex<Option<Job>>,
}

impl ReminderScheduler {
    pub fn new(
        events: Arc<dyn EventStore>,
        subscribers: Arc<dyn SubscriberDirectory>,
        sender: Arc<dyn DmSender>,
        timezone: Tz,
    ) -> Self {
        Self {
            events,
            subscribers,
            sender,
            timezone,
            first_run_delay: FIRST_RUN_DELAY,
            notified: Mutex::new(HashSet::new()),
            job: Mutex::new(None),
        }
    }

    pub fn with_first_run_delay(mut self, delay: Duration) -> Self {
        self.first_run_delay = delay;
        self
    }

    /// Starts the recurring check. A job that is already running is stopped
    /// first, so there is never more than one.
    pub async fn start(self: &Arc<Self>, interval_minutes: u64) {
        let mut job = self.job.lock().await;
        if let Some(previous) = job.take() {
            info!("Replacing running reminder job");
            previous.shutdown().await;
        }

        let minutes = interval_minutes.clamp(1, MAX_INTERVAL_MINUTES);
        if minutes != interval_minutes {
            warn!("Interval of {} minutes clamped to {}", interval_minutes, minutes);
        }
        let period = Duration::from_secs(minutes * 60);
        let (stop_tx, rx) = watch::channel(false);
        let scheduler = Arc::clone(self);
        let handle = tokio::spawn(async move {
            scheduler.run(period, rx).await;
        });
        *job = Some(Job { stop_tx, handle });
        info!("Scheduler started with {} minute interval", minutes);
    }

    /// Stops the recurring check, letting a tick in progress finish.
    pub async fn stop(&self) {
        let job = self.job.lock().await.take();
        if let Some(job) = job {
            job.shutdown().await;
            info!("Scheduler stopped");
        }
    }

    pub async fn is_running(&self) -> bool {
        self.job
            .lock()
            .await
            .as_ref()
            .is_some_and(|job| !job.handle.is_finished())
    }

    async fn run(&self, period: Duration, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = interval_at(Instant::now() + self.first_run_delay, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                biased;
                _ = shutdown.changed() => break,
                _ = ticker.tick() => {}
            }
            if let Err(err) = self.check_events().await {
                error!("Reminder check failed: {}", err);
            }
        }
        debug!("Reminder loop exited");
    }

    pub async fn check_events(&self) -> Result<CheckReport> {
        self.check_events_at(Utc::now()).await
    }

    /// One pass over the schedule of the day containing `now` (in the
    /// schedule timezone). The notified-set lock is held for the whole pass.
    pub async fn check_events_at(&self, now: DateTime<Utc>) -> Result<CheckReport> {
        let mut notified = self.notified.lock().await;
        let today = now.with_timezone(&self.timezone).date_naive();
        let events = self.events.events_for_date(today).await?;

        let mut report = CheckReport {
            date: today,
            checked: events.len(),
            reminders: Vec::new(),
        };
        if events.is_empty() {
            debug!("No events found for {}", today);
            return Ok(report);
        }
        info!("Checking {} events for {} at {}", events.len(), today, now);

        for event in events {
            if notified.contains(&event.id) {
                continue;
            }
            let Some(start) = self
                .timezone
                .from_local_datetime(&event.date.and_time(event.time))
                .earliest()
            else {
                warn!(event_id = event.id, "Event start does not exist in {}", self.timezone.name());
                continue;
            };
            let threshold = start.with_timezone(&Utc) - chrono::Duration::minutes(NOTIFY_LEAD_MINUTES);
            if now < threshold {
                continue;
            }

            match ReminderService::send_event_reminder(&*self.subscribers, &*self.sender, &event)
                .await
            {
                Ok(delivery) => {
                    notified.insert(event.id);
                    info!("Sent reminder for event #{}", event.id);
                    report.reminders.push(ReminderOutcome {
                        event_id: event.id,
                        sent: delivery.sent,
                        total: delivery.total,
                    });
                }
                Err(err) => {
                    error!(event_id = event.id, "Failed to send reminder, will retry: {}", err);
                }
            }
        }
        Ok(report)
    }

    pub async fn is_notified(&self, event_id: u64) -> bool {
        self.notified.lock().await.contains(&event_id)
    }
}
