use std::collections::HashMap;
use std::fmt::{Display, Formatter, Result};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One row in the notification ledger: a single attempted send.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationRecord {
    pub id: Uuid,
    pub recipient_id: Uuid,
    pub ticket_id: Option<Uuid>,
    pub channel: Channel,
    pub template_id: String,
    pub payload: HashMap<String, String>,
    pub dedupe_key: String,
    pub status: NotificationStatus,
    pub provider_message_id: Option<String>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub sent_at: Option<DateTime<Utc>>,
    pub read_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewNotification {
    pub recipient_id: Uuid,
    pub ticket_id: Option<Uuid>,
    pub channel: Channel,
    pub template_id: String,
    pub payload: HashMap<String, String>,
    pub dedupe_key: String,
}

impl NewNotification {
    pub fn new(
        recipient_id: Uuid,
        ticket_id: Option<Uuid>,
        template_id: String,
        payload: HashMap<String, String>,
        dedupe_key: String,
    ) -> Self {
        Self {
            recipient_id,
            ticket_id,
            channel: Channel::Whatsapp,
            template_id,
            payload,
            dedupe_key,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Whatsapp,
}

impl Display for Channel {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        match self {
            Channel::Whatsapp => write!(f, "whatsapp"),
        }
    }
}

/// Terminal states are `Sent` and `Failed`; a record stuck in `Queued`
/// means the process died between the ledger write and the send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationStatus {
    Queued,
    Sent,
    Failed,
}

impl Display for NotificationStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        match self {
            NotificationStatus::Queued => write!(f, "queued"),
            NotificationStatus::Sent => write!(f, "sent"),
            NotificationStatus::Failed => write!(f, "failed"),
        }
    }
}

impl FromStr for NotificationStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "queued" => Ok(NotificationStatus::Queued),
            "sent" => Ok(NotificationStatus::Sent),
            "failed" => Ok(NotificationStatus::Failed),
            other => Err(format!("unknown notification status '{}'", other)),
        }
    }
}

/// Lifecycle events that can produce an outbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyEvent {
    DemandCreated,
    DemandAssigned,
    ManagerCommented,
    DeadlineApproaching,
}

impl NotifyEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotifyEvent::DemandCreated => "demand_created",
            NotifyEvent::DemandAssigned => "demand_assigned",
            NotifyEvent::ManagerCommented => "manager_commented",
            NotifyEvent::DeadlineApproaching => "deadline_approaching",
        }
    }
}

impl Display for NotifyEvent {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        write!(f, "{}", self.as_str())
    }
}

/// A ledger record decorated with the ticket name for inbox display.
#[derive(Debug, Clone, Serialize)]
pub struct InboxEntry {
    #[serde(flatten)]
    pub record: NotificationRecord,
    pub ticket_name: Option<String>,
}
