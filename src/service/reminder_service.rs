use tracing::{info, warn};

use crate::clients::discord::DmSender;
use crate::error::Result;
use crate::models::event::EventRecord;
use crate::store::SubscriberDirectory;

/// Outcome of one event's reminder fan-out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryReport {
    pub sent: usize,
    pub total: usize,
}

pub fn render_reminder(event: &EventRecord) -> String {
    format!(
        "⏰ *Lesson reminder!*\n\n📝 *{title}*\n⏰ {time} | 📅 {date}\n🏫 Room: {room}\n👥 Group: {group}",
        title = event.title,
        time = event.time.format("%H:%M"),
        date = event.date.format("%Y-%m-%d"),
        room = event.room,
        group = event.group_name,
    )
}

pub struct ReminderService;

impl ReminderService {
    /// Sends the reminder for `event` to every subscribed member of its group.
    /// A failed send is logged and does not stop the remaining deliveries.
    /// Only the subscriber lookup can fail the whole call.
    pub async fn send_event_reminder<D, S>(
        directory: &D,
        sender: &S,
        event: &EventRecord,
    ) -> Result<DeliveryReport>
    where
        D: SubscriberDirectory + ?Sized,
        S: DmSender + ?Sized,
    {
        let users = directory
            .notification_subscribers(&event.group_name)
            .await?;
        if users.is_empty() {
            warn!("No users found for group {}", event.group_name);
            return Ok(DeliveryReport { sent: 0, total: 0 });
        }

        let message = render_reminder(event);
        let mut sent = 0;
        for user in &users {
            match sender.send_dm(user.user_id, &message).await {
                Ok(()) => sent += 1,
                Err(err) => warn!(
                    user_id = user.user_id,
                    "Failed to send notification: {}", err
                ),
            }
        }

        info!(
            "Sent {}/{} notifications for group {}",
            sent,
            users.len(),
            event.group_name
        );
        Ok(DeliveryReport {
            sent,
            total: users.len(),
        })
    }
}
