use std::fmt::{Display, Formatter, Result};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The slice of a demand ticket the notification core needs. The full
/// ticket lives in the intake application's own tables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TicketSummary {
    pub id: Uuid,
    pub name: String,
    pub department: String,
    pub due_at: Option<DateTime<Utc>>,
    pub status: DemandStatus,
    pub assignee_id: Option<Uuid>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DemandStatus {
    Open,
    InProgress,
    Completed,
}

impl Display for DemandStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        match self {
            DemandStatus::Open => write!(f, "open"),
            DemandStatus::InProgress => write!(f, "in_progress"),
            DemandStatus::Completed => write!(f, "completed"),
        }
    }
}

impl FromStr for DemandStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "open" => Ok(DemandStatus::Open),
            "in_progress" => Ok(DemandStatus::InProgress),
            "completed" => Ok(DemandStatus::Completed),
            other => Err(format!("unknown demand status '{}'", other)),
        }
    }
}

/// Contact fields read from the recipient's profile. A missing phone or
/// opt_in = false means "do not send", not an error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContactPreference {
    pub phone: Option<String>,
    pub opt_in: bool,
}
