use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

/// Coarse lesson category, used for storage and display icons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LessonType {
    #[default]
    Lecture,
    Laboratory,
    Practice,
}

impl LessonType {
    pub fn icon(&self) -> &'static str {
        match self {
            LessonType::Lecture => "📚",
            LessonType::Laboratory => "🔬",
            LessonType::Practice => "✍️",
        }
    }
}

/// A persisted schedule entry. `date` and `time` are wall-clock values in the
/// configured schedule timezone.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct EventRecord {
    pub id: u64,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub title: String,
    pub room: String,
    pub group_name: String,
    #[serde(default)]
    pub lesson_type: LessonType,
}

/// Fields supplied when inserting an event; the store assigns the id.
#[derive(Debug, Clone, PartialEq)]
pub struct NewEvent {
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub title: String,
    pub room: String,
    pub group_name: String,
    pub lesson_type: LessonType,
}

impl NewEvent {
    pub fn into_record(self, id: u64) -> EventRecord {
        EventRecord {
            id,
            date: self.date,
            time: self.time,
            title: self.title,
            room: self.room,
            group_name: self.group_name,
            lesson_type: self.lesson_type,
        }
    }
}
