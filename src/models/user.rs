use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::BotError;

/// Access level. `Admin` unlocks the same commands as a configured admin id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    #[default]
    Student,
    GroupLeader,
    Teacher,
    Admin,
}

impl UserRole {
    pub fn label(&self) -> &'static str {
        match self {
            UserRole::Student => "👨‍🎓 Student",
            UserRole::GroupLeader => "👑 Group leader",
            UserRole::Teacher => "👨‍🏫 Teacher",
            UserRole::Admin => "👨‍💼 Administrator",
        }
    }
}

impl FromStr for UserRole {
    type Err = BotError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "student" => Ok(UserRole::Student),
            "group_leader" => Ok(UserRole::GroupLeader),
            "teacher" => Ok(UserRole::Teacher),
            "admin" => Ok(UserRole::Admin),
            other => Err(BotError::Store(format!("Unknown role: {other}"))),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct UserRecord {
    pub user_id: u64,
    pub group_name: Option<String>,
    pub full_name: Option<String>,
    #[serde(default)]
    pub role: UserRole,
    #[serde(default = "default_notifications")]
    pub notifications_enabled: bool,
}

fn default_notifications() -> bool {
    true
}

impl UserRecord {
    pub fn new(user_id: u64) -> Self {
        Self {
            user_id,
            group_name: None,
            full_name: None,
            role: UserRole::default(),
            notifications_enabled: true,
        }
    }
}
