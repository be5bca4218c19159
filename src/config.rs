use std::collections::{HashMap, HashSet};
use std::env;
use std::fs;
use std::path::PathBuf;
use std::str::FromStr;

use chrono_tz::Tz;
use tracing::warn;

use crate::calendar::parser::OffsetPolicy;
use crate::error::{BotError, Result};
use crate::tasks::reminder_scheduler::MAX_INTERVAL_MINUTES;

const DEFAULT_DB_LOCATION: &str = "./data";
const DEFAULT_INTERVAL_MINUTES: u64 = 15;
const DEFAULT_TIMEZONE: &str = "Europe/Kiev";
const DEFAULT_GROUP: &str = "DEFAULT";

const KNOWN_KEYS: [&str; 7] = [
    "BOT_TOKEN",
    "DB_LOCATION",
    "NOTIFICATION_INTERVAL_MINUTES",
    "SCHEDULE_TIMEZONE",
    "ICS_OFFSET_POLICY",
    "ADMIN_IDS",
    "DEFAULT_GROUP",
];

/// Raw `KEY=VALUE` pairs read from a config file.
#[derive(Debug, Default, Clone)]
pub struct AppConfig {
    values: HashMap<String, String>,
}

impl AppConfig {
    pub fn from_file(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Reads `KEY=VALUE` lines. Blank lines, `#` comments and an `export `
    /// prefix are ignored; keys this bot does not read are kept but logged.
    pub fn parse(content: &str) -> Result<Self> {
        let mut values = HashMap::new();
        for (idx, line) in content.lines().enumerate() {
            let entry = line.trim();
            if entry.is_empty() || entry.starts_with('#') {
                continue;
            }
            let entry = entry.strip_prefix("export ").unwrap_or(entry);
            let (key, value) = entry
                .split_once('=')
                .map(|(key, value)| (key.trim(), value.trim()))
                .filter(|(key, _)| !key.is_empty())
                .ok_or_else(|| {
                    BotError::Config(format!("Invalid config line {}: {}", idx + 1, line))
                })?;
            if !KNOWN_KEYS.contains(&key) {
                warn!(key, line = idx + 1, "Unknown config key");
            }
            values.insert(key.to_string(), unquote(value).to_string());
        }
        Ok(Self { values })
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }
}

/// Typed application settings.
#[derive(Debug, Clone)]
pub struct Settings {
    pub bot_token: Option<String>,
    pub db_location: PathBuf,
    pub notification_interval_minutes: u64,
    pub timezone: Tz,
    pub offset_policy: OffsetPolicy,
    pub admin_ids: HashSet<u64>,
    pub default_group: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bot_token: None,
            db_location: PathBuf::from(DEFAULT_DB_LOCATION),
            notification_interval_minutes: DEFAULT_INTERVAL_MINUTES,
            timezone: chrono_tz::Europe::Kiev,
            offset_policy: OffsetPolicy::default(),
            admin_ids: HashSet::new(),
            default_group: DEFAULT_GROUP.to_string(),
        }
    }
}

impl Settings {
    /// Loads settings from `CONFIG_FILE` (if set), falling back to the
    /// process environment for every key the file does not define.
    pub fn load() -> Result<Self> {
        let config = match env::var("CONFIG_FILE") {
            Ok(path) => AppConfig::from_file(&path)?,
            Err(_) => AppConfig::default(),
        };
        Self::resolve(|key| config.get(key).or_else(|| env::var(key).ok()))
    }

    pub fn resolve<F>(get_prop: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let bot_token = get_prop("BOT_TOKEN").filter(|token| !token.trim().is_empty());
        let db_location = PathBuf::from(
            get_prop("DB_LOCATION").unwrap_or_else(|| DEFAULT_DB_LOCATION.to_string()),
        );

        let notification_interval_minutes = match get_prop("NOTIFICATION_INTERVAL_MINUTES") {
            Some(raw) => raw.trim().parse::<u64>().map_err(|_| {
                BotError::Config(format!("NOTIFICATION_INTERVAL_MINUTES is not a number: {raw}"))
            })?,
            None => DEFAULT_INTERVAL_MINUTES,
        };
        if !(1..=MAX_INTERVAL_MINUTES).contains(&notification_interval_minutes) {
            return Err(BotError::Config(format!(
                "NOTIFICATION_INTERVAL_MINUTES must be between 1 and {}",
                MAX_INTERVAL_MINUTES
            )));
        }

        let tz_name = get_prop("SCHEDULE_TIMEZONE").unwrap_or_else(|| DEFAULT_TIMEZONE.to_string());
        let timezone = parse_timezone(&tz_name)?;

        let offset_policy = match get_prop("ICS_OFFSET_POLICY") {
            Some(raw) => OffsetPolicy::from_str(&raw)?,
            None => OffsetPolicy::default(),
        };

        let mut admin_ids = HashSet::new();
        if let Some(raw) = get_prop("ADMIN_IDS") {
            for part in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
                let id = part
                    .parse::<u64>()
                    .map_err(|_| BotError::Config(format!("Invalid admin id: {part}")))?;
                admin_ids.insert(id);
            }
        }

        let default_group = get_prop("DEFAULT_GROUP")
            .filter(|g| !g.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_GROUP.to_string());

        Ok(Self {
            bot_token,
            db_location,
            notification_interval_minutes,
            timezone,
            offset_policy,
            admin_ids,
            default_group,
        })
    }

    pub fn is_admin(&self, user_id: u64) -> bool {
        self.admin_ids.contains(&user_id)
    }
}

fn unquote(value: &str) -> &str {
    ['"', '\'']
        .iter()
        .find_map(|q| value.strip_prefix(*q)?.strip_suffix(*q))
        .unwrap_or(value)
}

pub fn parse_timezone(name: &str) -> Result<Tz> {
    name.trim()
        .parse::<Tz>()
        .map_err(|_| BotError::InvalidTimezone(name.to_string()))
}
