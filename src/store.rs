use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::models::{
    record::{NewNotification, NotificationRecord},
    ticket::{ContactPreference, TicketSummary},
};

/// Default and hard cap for inbox listings.
pub const LIST_LIMIT: u32 = 50;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("persistence failure: {0}")]
    Persistence(String),

    #[error("record not found")]
    NotFound,

    #[error("record does not belong to caller")]
    Forbidden,
}

/// The notification ledger: one row per attempted send.
///
/// Status transitions are queued -> sent or queued -> failed, exactly
/// once; implementations reject any other transition with a
/// `Persistence` error.
#[async_trait]
pub trait NotificationStore: Send + Sync {
    /// Insert a new record in `queued` status and return its id.
    async fn create(&self, new: NewNotification) -> Result<Uuid, StoreError>;

    async fn mark_sent(&self, id: Uuid, provider_message_id: &str) -> Result<(), StoreError>;

    async fn mark_failed(&self, id: Uuid, error_message: &str) -> Result<(), StoreError>;

    /// Recipient's records, newest first, capped at [`LIST_LIMIT`].
    async fn list_for_recipient(
        &self,
        recipient_id: Uuid,
        limit: Option<u32>,
    ) -> Result<Vec<NotificationRecord>, StoreError>;

    /// Set read_at, only when `recipient_id` owns the record. Re-reading
    /// an already-read record is allowed and refreshes the timestamp.
    async fn mark_read(&self, id: Uuid, recipient_id: Uuid) -> Result<(), StoreError>;

    async fn ping(&self) -> Result<(), StoreError>;
}

/// Profile fields consumed by the policies; owned by the intake app.
#[async_trait]
pub trait ContactDirectory: Send + Sync {
    /// `Ok(None)` means the profile does not exist.
    async fn contact_preference(
        &self,
        user_id: Uuid,
    ) -> Result<Option<ContactPreference>, StoreError>;

    async fn display_name(&self, user_id: Uuid) -> Result<Option<String>, StoreError>;
}

/// Ticket fields consumed by the policies and the deadline scanner.
#[async_trait]
pub trait TicketDirectory: Send + Sync {
    async fn ticket_summary(&self, ticket_id: Uuid) -> Result<Option<TicketSummary>, StoreError>;

    /// Tickets with a due time inside `[start, end]`, regardless of
    /// status or assignment; the scanner filters those.
    async fn find_due_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<TicketSummary>, StoreError>;
}
