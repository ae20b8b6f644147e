use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio_postgres::{Client, NoTls, Row};
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::{
    models::{
        record::{Channel, NewNotification, NotificationRecord, NotificationStatus},
        ticket::{ContactPreference, DemandStatus, TicketSummary},
    },
    store::{ContactDirectory, LIST_LIMIT, NotificationStore, StoreError, TicketDirectory},
};

impl From<tokio_postgres::Error> for StoreError {
    fn from(e: tokio_postgres::Error) -> Self {
        StoreError::Persistence(e.to_string())
    }
}

/// Connects and drives the connection on a background task.
pub async fn connect(database_url: &str) -> Result<Arc<Client>, StoreError> {
    info!("Connecting to PostgreSQL database");

    let (client, connection) = tokio_postgres::connect(database_url, NoTls)
        .await
        .map_err(|e| StoreError::Persistence(format!("Failed to connect to database: {}", e)))?;

    tokio::spawn(async move {
        if let Err(e) = connection.await {
            error!(error = %e, "PostgreSQL connection terminated");
        }
    });

    info!("PostgreSQL connection established");

    Ok(Arc::new(client))
}

/// Ledger persistence over the `notifications` table.
pub struct PgNotificationStore {
    client: Arc<Client>,
}

impl PgNotificationStore {
    pub fn new(client: Arc<Client>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl NotificationStore for PgNotificationStore {
    async fn create(&self, new: NewNotification) -> Result<Uuid, StoreError> {
        let id = Uuid::new_v4();
        let created_at = Utc::now();
        let payload = serde_json::to_value(&new.payload)
            .map_err(|e| StoreError::Persistence(format!("Payload serialization failed: {}", e)))?;

        self.client
            .execute(
                "INSERT INTO notifications \
                 (id, recipient_id, ticket_id, channel, template_id, payload, dedupe_key, status, created_at) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
                &[
                    &id,
                    &new.recipient_id,
                    &new.ticket_id,
                    &new.channel.to_string(),
                    &new.template_id,
                    &payload,
                    &new.dedupe_key,
                    &NotificationStatus::Queued.to_string(),
                    &created_at,
                ],
            )
            .await?;

        debug!(notification_id = %id, dedupe_key = %new.dedupe_key, "Notification queued");

        Ok(id)
    }

    async fn mark_sent(&self, id: Uuid, provider_message_id: &str) -> Result<(), StoreError> {
        let sent_at = Utc::now();

        let updated = self
            .client
            .execute(
                "UPDATE notifications \
                 SET status = 'sent', provider_message_id = $2, sent_at = $3 \
                 WHERE id = $1 AND status = 'queued'",
                &[&id, &provider_message_id, &sent_at],
            )
            .await?;

        if updated == 0 {
            return Err(StoreError::Persistence(format!(
                "notification {} is not in queued state",
                id
            )));
        }

        Ok(())
    }

    async fn mark_failed(&self, id: Uuid, error_message: &str) -> Result<(), StoreError> {
        let updated = self
            .client
            .execute(
                "UPDATE notifications \
                 SET status = 'failed', error_message = $2 \
                 WHERE id = $1 AND status = 'queued'",
                &[&id, &error_message],
            )
            .await?;

        if updated == 0 {
            return Err(StoreError::Persistence(format!(
                "notification {} is not in queued state",
                id
            )));
        }

        Ok(())
    }

    async fn list_for_recipient(
        &self,
        recipient_id: Uuid,
        limit: Option<u32>,
    ) -> Result<Vec<NotificationRecord>, StoreError> {
        let limit = i64::from(limit.unwrap_or(LIST_LIMIT).min(LIST_LIMIT));

        let rows = self
            .client
            .query(
                "SELECT id, recipient_id, ticket_id, channel, template_id, payload, dedupe_key, \
                        status, provider_message_id, error_message, created_at, sent_at, read_at \
                 FROM notifications \
                 WHERE recipient_id = $1 \
                 ORDER BY created_at DESC \
                 LIMIT $2",
                &[&recipient_id, &limit],
            )
            .await?;

        rows.iter().map(record_from_row).collect()
    }

    async fn mark_read(&self, id: Uuid, recipient_id: Uuid) -> Result<(), StoreError> {
        let row = self
            .client
            .query_opt(
                "SELECT recipient_id FROM notifications WHERE id = $1",
                &[&id],
            )
            .await?
            .ok_or(StoreError::NotFound)?;

        let owner: Uuid = row.try_get("recipient_id")?;
        if owner != recipient_id {
            return Err(StoreError::Forbidden);
        }

        let read_at = Utc::now();
        self.client
            .execute(
                "UPDATE notifications SET read_at = $2 WHERE id = $1",
                &[&id, &read_at],
            )
            .await?;

        Ok(())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.client.query_one("SELECT 1", &[]).await?;
        Ok(())
    }
}

fn record_from_row(row: &Row) -> Result<NotificationRecord, StoreError> {
    let channel: String = row.try_get("channel")?;
    let channel = match channel.as_str() {
        "whatsapp" => Channel::Whatsapp,
        other => {
            return Err(StoreError::Persistence(format!(
                "unknown channel '{}'",
                other
            )));
        }
    };

    let status: String = row.try_get("status")?;
    let status = NotificationStatus::from_str(&status).map_err(StoreError::Persistence)?;

    let payload: serde_json::Value = row.try_get("payload")?;
    let payload: HashMap<String, String> = serde_json::from_value(payload)
        .map_err(|e| StoreError::Persistence(format!("Payload deserialization failed: {}", e)))?;

    Ok(NotificationRecord {
        id: row.try_get("id")?,
        recipient_id: row.try_get("recipient_id")?,
        ticket_id: row.try_get("ticket_id")?,
        channel,
        template_id: row.try_get("template_id")?,
        payload,
        dedupe_key: row.try_get("dedupe_key")?,
        status,
        provider_message_id: row.try_get("provider_message_id")?,
        error_message: row.try_get("error_message")?,
        created_at: row.try_get("created_at")?,
        sent_at: row.try_get("sent_at")?,
        read_at: row.try_get("read_at")?,
    })
}

/// Profile and demand lookups against the intake application's tables.
pub struct PgDirectory {
    client: Arc<Client>,
}

impl PgDirectory {
    pub fn new(client: Arc<Client>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ContactDirectory for PgDirectory {
    async fn contact_preference(
        &self,
        user_id: Uuid,
    ) -> Result<Option<ContactPreference>, StoreError> {
        let row = self
            .client
            .query_opt(
                "SELECT phone, whatsapp_opt_in FROM profiles WHERE id = $1",
                &[&user_id],
            )
            .await?;

        Ok(match row {
            Some(row) => Some(ContactPreference {
                phone: row.try_get("phone")?,
                opt_in: row.try_get("whatsapp_opt_in")?,
            }),
            None => None,
        })
    }

    async fn display_name(&self, user_id: Uuid) -> Result<Option<String>, StoreError> {
        let row = self
            .client
            .query_opt("SELECT display_name FROM profiles WHERE id = $1", &[&user_id])
            .await?;

        Ok(match row {
            Some(row) => row.try_get("display_name")?,
            None => None,
        })
    }
}

#[async_trait]
impl TicketDirectory for PgDirectory {
    async fn ticket_summary(&self, ticket_id: Uuid) -> Result<Option<TicketSummary>, StoreError> {
        let row = self
            .client
            .query_opt(
                "SELECT id, name, department, due_at, status, assignee_id \
                 FROM demands WHERE id = $1",
                &[&ticket_id],
            )
            .await?;

        row.as_ref().map(ticket_from_row).transpose()
    }

    async fn find_due_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<TicketSummary>, StoreError> {
        let rows = self
            .client
            .query(
                "SELECT id, name, department, due_at, status, assignee_id \
                 FROM demands \
                 WHERE due_at IS NOT NULL AND due_at >= $1 AND due_at <= $2",
                &[&start, &end],
            )
            .await?;

        rows.iter().map(ticket_from_row).collect()
    }
}

fn ticket_from_row(row: &Row) -> Result<TicketSummary, StoreError> {
    let status: String = row.try_get("status")?;
    let status = DemandStatus::from_str(&status).map_err(StoreError::Persistence)?;

    Ok(TicketSummary {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        department: row.try_get("department")?,
        due_at: row.try_get("due_at")?,
        status,
        assignee_id: row.try_get("assignee_id")?,
    })
}
