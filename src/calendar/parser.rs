//! Best-effort parser for calendar-interchange (`.ics`) exports.
//!
//! Only the subset of iCalendar needed for lesson schedules is understood:
//! `VEVENT` blocks with `UID`, `SUMMARY`, `DESCRIPTION`, `LOCATION`,
//! `DTSTART`, `DTEND`, `DTSTAMP` and `CLASS`. Malformed blocks are logged and
//! skipped; [`IcsParser::parse`] never fails.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use chrono::{DateTime, Duration, FixedOffset, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use regex::Regex;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::error::BotError;

const UNTITLED: &str = "Untitled";
const DEFAULT_CLASSIFICATION: &str = "PUBLIC";

static FOLD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\r?\n[ \t]+").expect("valid fold pattern"));
static EVENT_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)BEGIN:VEVENT(.+?)END:VEVENT").expect("valid block pattern")
});
static TIMESTAMP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{8}T\d{6})(Z|[+-]\d{4})?$").expect("valid timestamp pattern")
});
static PARENTHETICAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*\(([^)]*)\)\s*").expect("valid summary pattern"));

static UID: LazyLock<Regex> = LazyLock::new(|| field_pattern("UID"));
static SUMMARY: LazyLock<Regex> = LazyLock::new(|| field_pattern("SUMMARY"));
static DESCRIPTION: LazyLock<Regex> = LazyLock::new(|| field_pattern("DESCRIPTION"));
static LOCATION: LazyLock<Regex> = LazyLock::new(|| field_pattern("LOCATION"));
static CLASS: LazyLock<Regex> = LazyLock::new(|| field_pattern("CLASS"));
static DTSTART: LazyLock<Regex> = LazyLock::new(|| field_pattern("DTSTART"));
static DTEND: LazyLock<Regex> = LazyLock::new(|| field_pattern("DTEND"));
static DTSTAMP: LazyLock<Regex> = LazyLock::new(|| field_pattern("DTSTAMP"));

/// `LABEL[;PARAM=...]:value`, anchored at the start of a line.
fn field_pattern(label: &str) -> Regex {
    Regex::new(&format!(r"(?im)^{label}(?:;[^:\r\n]*)?:([^\r\n]*)"))
        .expect("valid field pattern")
}

/// One event extracted from an `.ics` export.
#[derive(Debug, Clone, PartialEq)]
pub struct CalendarEvent {
    pub uid: String,
    /// Title with parenthetical annotations removed.
    pub summary: String,
    /// The annotation stripped from the title, e.g. `laboratory session`.
    pub lesson_tag: Option<String>,
    pub description: String,
    pub location: String,
    pub start_time: DateTime<FixedOffset>,
    pub end_time: DateTime<FixedOffset>,
    pub stamp_time: DateTime<FixedOffset>,
    pub classification: String,
}

/// How a timestamp carrying an explicit `±HHMM` suffix is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OffsetPolicy {
    /// Drop a `+HHMM` offset and read the wall-clock value in the schedule
    /// timezone. `-HHMM` is not understood and makes the timestamp invalid.
    #[default]
    LegacyReinterpret,
    /// Honour the offset exactly, in either direction.
    StrictOffset,
}

impl FromStr for OffsetPolicy {
    type Err = BotError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "legacy-reinterpret" | "legacy" => Ok(OffsetPolicy::LegacyReinterpret),
            "strict-offset" | "strict" => Ok(OffsetPolicy::StrictOffset),
            other => Err(BotError::Config(format!("Unknown offset policy: {other}"))),
        }
    }
}

impl fmt::Display for OffsetPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OffsetPolicy::LegacyReinterpret => write!(f, "legacy-reinterpret"),
            OffsetPolicy::StrictOffset => write!(f, "strict-offset"),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TimestampError {
    #[error("malformed timestamp '{0}'")]
    Malformed(String),
    #[error("unsupported UTC offset '{0}'")]
    UnsupportedOffset(String),
    #[error("'{0}' does not exist in timezone {1}")]
    NonexistentLocalTime(String, String),
}

#[derive(Debug, Clone, Copy)]
pub struct IcsParser {
    timezone: Tz,
    offset_policy: OffsetPolicy,
}

impl Default for IcsParser {
    fn default() -> Self {
        Self::new(chrono_tz::Europe::Kiev, OffsetPolicy::default())
    }
}

impl IcsParser {
    pub fn new(timezone: Tz, offset_policy: OffsetPolicy) -> Self {
        Self {
            timezone,
            offset_policy,
        }
    }

    /// Parses every `VEVENT` block in source order, skipping the ones that
    /// cannot be used.
    pub fn parse(&self, raw: &str) -> Vec<CalendarEvent> {
        let now = Utc::now().fixed_offset();
        let content = unfold_lines(raw);
        let mut events = Vec::new();
        for (index, captures) in EVENT_BLOCK.captures_iter(&content).enumerate() {
            let block = captures.get(1).map_or("", |m| m.as_str());
            if let Some(event) = self.parse_block(index, block, now) {
                events.push(event);
            }
        }
        info!("Parsed {} events from iCalendar", events.len());
        events
    }

    fn parse_block(
        &self,
        index: usize,
        block: &str,
        now: DateTime<FixedOffset>,
    ) -> Option<CalendarEvent> {
        let Some(raw_start) = extract(&DTSTART, block) else {
            warn!(block = index, "Event missing DTSTART, skipping");
            return None;
        };
        let start_time = match self.parse_timestamp(&raw_start, self.timezone) {
            Ok(start) => start,
            Err(err) => {
                warn!(block = index, "Invalid DTSTART, skipping event: {}", err);
                return None;
            }
        };

        let end_time = match extract(&DTEND, block) {
            Some(raw_end) => match self.parse_timestamp(&raw_end, self.timezone) {
                Ok(end) => end,
                Err(err) => {
                    warn!(block = index, "Invalid DTEND, skipping event: {}", err);
                    return None;
                }
            },
            None => start_time + Duration::hours(1),
        };

        let stamp_time = match extract(&DTSTAMP, block) {
            Some(raw_stamp) => match self.parse_timestamp(&raw_stamp, Tz::UTC) {
                Ok(stamp) => stamp,
                Err(err) => {
                    debug!(block = index, "Invalid DTSTAMP, using current time: {}", err);
                    now
                }
            },
            None => now,
        };

        let raw_summary = extract(&SUMMARY, block).unwrap_or_else(|| UNTITLED.to_string());
        let (summary, lesson_tag) = split_summary(&raw_summary);

        Some(CalendarEvent {
            uid: extract(&UID, block).unwrap_or_default(),
            summary,
            lesson_tag,
            description: extract(&DESCRIPTION, block).unwrap_or_default(),
            location: extract(&LOCATION, block).unwrap_or_default(),
            start_time,
            end_time,
            stamp_time,
            classification: extract(&CLASS, block)
                .unwrap_or_else(|| DEFAULT_CLASSIFICATION.to_string()),
        })
    }

    /// Parses `YYYYMMDDTHHMMSS`, optionally suffixed with `Z` or `±HHMM`.
    /// Bare values are wall-clock times in `local`.
    pub fn parse_timestamp(
        &self,
        raw: &str,
        local: Tz,
    ) -> Result<DateTime<FixedOffset>, TimestampError> {
        let value = raw.trim();
        let captures = TIMESTAMP
            .captures(value)
            .ok_or_else(|| TimestampError::Malformed(value.to_string()))?;
        let base = captures.get(1).map_or("", |m| m.as_str());
        let naive = NaiveDateTime::parse_from_str(base, "%Y%m%dT%H%M%S")
            .map_err(|_| TimestampError::Malformed(value.to_string()))?;

        match captures.get(2).map(|m| m.as_str()) {
            None => in_zone(local, naive, value),
            Some("Z") => Ok(Utc.from_utc_datetime(&naive).fixed_offset()),
            Some(offset) => match self.offset_policy {
                OffsetPolicy::LegacyReinterpret if offset.starts_with('+') => {
                    in_zone(self.timezone, naive, value)
                }
                OffsetPolicy::LegacyReinterpret => {
                    Err(TimestampError::UnsupportedOffset(offset.to_string()))
                }
                OffsetPolicy::StrictOffset => {
                    let fixed = parse_offset(offset)
                        .ok_or_else(|| TimestampError::UnsupportedOffset(offset.to_string()))?;
                    fixed
                        .from_local_datetime(&naive)
                        .single()
                        .ok_or_else(|| TimestampError::Malformed(value.to_string()))
                }
            },
        }
    }
}

fn in_zone(
    zone: Tz,
    naive: NaiveDateTime,
    raw: &str,
) -> Result<DateTime<FixedOffset>, TimestampError> {
    zone.from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.fixed_offset())
        .ok_or_else(|| TimestampError::NonexistentLocalTime(raw.to_string(), zone.name().to_string()))
}

fn parse_offset(offset: &str) -> Option<FixedOffset> {
    let (sign, digits) = offset.split_at(1);
    let hours: i32 = digits.get(0..2)?.parse().ok()?;
    let minutes: i32 = digits.get(2..4)?.parse().ok()?;
    if minutes >= 60 {
        return None;
    }
    let seconds = hours * 3600 + minutes * 60;
    match sign {
        "+" => FixedOffset::east_opt(seconds),
        "-" => FixedOffset::west_opt(seconds),
        _ => None,
    }
}

fn extract(pattern: &Regex, block: &str) -> Option<String> {
    let value = pattern.captures(block)?.get(1)?.as_str();
    let value = unescape(value);
    let value = value.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

fn unescape(value: &str) -> String {
    value.replace("\\n", "\n").replace("\\,", ",")
}

/// Rejoins folded lines (a line break followed by a space or tab).
pub fn unfold_lines(content: &str) -> String {
    let mut current = FOLD.replace_all(content, "").into_owned();
    while FOLD.is_match(&current) {
        current = FOLD.replace_all(&current, "").into_owned();
    }
    current
}

/// Removes parenthetical annotations from a title.
pub fn clean_summary(summary: &str) -> String {
    split_summary(summary).0
}

fn split_summary(summary: &str) -> (String, Option<String>) {
    let tag = PARENTHETICAL
        .captures_iter(summary)
        .last()
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|t| !t.is_empty());
    let cleaned = PARENTHETICAL.replace_all(summary, " ");
    (cleaned.trim().to_string(), tag)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    fn kyiv() -> IcsParser {
        IcsParser::default()
    }

    #[test]
    fn unfold_joins_continuation_lines() {
        let folded = "DESCRIPTION:first\r\n  second\n\tthird\nSUMMARY:x";
        assert_eq!(unfold_lines(folded), "DESCRIPTION:firstsecondthird\nSUMMARY:x");
    }

    #[test]
    fn unfold_is_idempotent() {
        let folded = "A:1\n 2\n 3\r\n 4\nB:5";
        let once = unfold_lines(folded);
        assert_eq!(unfold_lines(&once), once);
        assert_eq!(unfold_lines("A:1\nB:2"), "A:1\nB:2");
    }

    #[test]
    fn clean_summary_strips_parentheticals() {
        assert_eq!(clean_summary("Databases (laboratory session)"), "Databases");
        assert_eq!(clean_summary("Databases"), "Databases");
        assert_eq!(clean_summary("Math (x) Analysis"), "Math Analysis");
        assert!(!clean_summary("A (b) (c)").contains('('));
    }

    #[test]
    fn split_summary_keeps_last_tag() {
        let (summary, tag) = split_summary("Networks (laboratory session)");
        assert_eq!(summary, "Networks");
        assert_eq!(tag.as_deref(), Some("laboratory session"));
        assert_eq!(split_summary("Networks").1, None);
    }

    #[test]
    fn bare_timestamp_uses_schedule_timezone() {
        let ts = kyiv()
            .parse_timestamp("20260212T114000", chrono_tz::Europe::Kiev)
            .unwrap();
        assert_eq!(ts.offset().local_minus_utc(), 2 * 3600);
        assert_eq!((ts.hour(), ts.minute()), (11, 40));
    }

    #[test]
    fn utc_timestamp_ignores_local_zone() {
        let ts = kyiv()
            .parse_timestamp("20260116T120325Z", chrono_tz::Europe::Kiev)
            .unwrap();
        assert_eq!(ts.offset().local_minus_utc(), 0);
        assert_eq!(ts.day(), 16);
        assert_eq!(ts.hour(), 12);
    }

    #[test]
    fn legacy_policy_reinterprets_positive_offset() {
        let ts = kyiv()
            .parse_timestamp("20260701T090000+0500", chrono_tz::Europe::Kiev)
            .unwrap();
        // summer time in Kyiv is UTC+3; the +0500 suffix is dropped
        assert_eq!(ts.offset().local_minus_utc(), 3 * 3600);
        assert_eq!(ts.hour(), 9);
    }

    #[test]
    fn legacy_policy_rejects_negative_offset() {
        let err = kyiv()
            .parse_timestamp("20260701T090000-0500", chrono_tz::Europe::Kiev)
            .unwrap_err();
        assert_eq!(err, TimestampError::UnsupportedOffset("-0500".to_string()));
    }

    #[test]
    fn strict_policy_honours_offset() {
        let parser = IcsParser::new(chrono_tz::Europe::Kiev, OffsetPolicy::StrictOffset);
        let plus = parser
            .parse_timestamp("20260701T090000+0500", chrono_tz::Europe::Kiev)
            .unwrap();
        assert_eq!(plus.offset().local_minus_utc(), 5 * 3600);
        let minus = parser
            .parse_timestamp("20260701T090000-0130", chrono_tz::Europe::Kiev)
            .unwrap();
        assert_eq!(minus.offset().local_minus_utc(), -(3600 + 1800));
        assert_eq!(minus.hour(), 9);
    }

    #[test]
    fn malformed_timestamp_is_rejected() {
        assert!(matches!(
            kyiv().parse_timestamp("2026-02-12 11:40", chrono_tz::Europe::Kiev),
            Err(TimestampError::Malformed(_))
        ));
        assert!(matches!(
            kyiv().parse_timestamp("20261312T114000", chrono_tz::Europe::Kiev),
            Err(TimestampError::Malformed(_))
        ));
    }

    #[test]
    fn offset_policy_round_trips_names() {
        for policy in [OffsetPolicy::LegacyReinterpret, OffsetPolicy::StrictOffset] {
            assert_eq!(policy.to_string().parse::<OffsetPolicy>().unwrap(), policy);
        }
        assert!("sometimes".parse::<OffsetPolicy>().is_err());
    }

    #[test]
    fn text_fields_are_unescaped() {
        let ics = "BEGIN:VEVENT\nDTSTART:20260212T114000\nDESCRIPTION:Ivanenko I.\\nIN-23\\, room 5\nEND:VEVENT";
        let events = kyiv().parse(ics);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].description, "Ivanenko I.\nIN-23, room 5");
        assert_eq!(events[0].summary, UNTITLED);
        assert_eq!(events[0].classification, "PUBLIC");
        assert_eq!(events[0].location, "");
        assert_eq!(events[0].uid, "");
    }

    #[test]
    fn labels_must_start_a_line() {
        let ics = "BEGIN:VEVENT\nX-DTSTART:20260212T114000\nEND:VEVENT";
        assert!(kyiv().parse(ics).is_empty());
    }

    #[test]
    fn garbage_input_yields_nothing() {
        assert!(kyiv().parse("").is_empty());
        assert!(kyiv().parse("not a calendar\nBEGIN:VEVENT\n").is_empty());
    }
}
