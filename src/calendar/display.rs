use std::collections::BTreeMap;

use chrono::NaiveDate;

use super::lesson::event_icon;
use super::parser::CalendarEvent;

/// Renders events grouped by start date, each day sorted by start time.
pub fn format_for_display(events: &[CalendarEvent]) -> String {
    if events.is_empty() {
        return "📭 No events".to_string();
    }

    let mut by_date: BTreeMap<NaiveDate, Vec<&CalendarEvent>> = BTreeMap::new();
    for event in events {
        by_date
            .entry(event.start_time.date_naive())
            .or_default()
            .push(event);
    }

    let mut out = String::from("📅 *Class schedule*\n\n");
    for (date, mut day_events) in by_date {
        out.push_str(&format!("📆 *{}*\n", date.format("%d.%m.%Y (%a)")));
        day_events.sort_by_key(|event| event.start_time);
        for event in day_events {
            out.push_str(&format!(
                "{} *{} - {}*\n   📖 {}\n",
                event_icon(&event.summary),
                event.start_time.format("%H:%M"),
                event.end_time.format("%H:%M"),
                event.summary
            ));
            if let Some(teacher) = instructor(&event.description) {
                out.push_str(&format!("   👨‍🏫 {}\n", teacher));
            }
            out.push('\n');
        }
        out.push('\n');
    }
    out
}

/// First description line, when the description has several lines.
fn instructor(description: &str) -> Option<&str> {
    let (first, _) = description.split_once('\n')?;
    let first = first.trim();
    (first.chars().count() > 3).then_some(first)
}
