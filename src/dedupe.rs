use uuid::Uuid;

use crate::models::record::NotifyEvent;

/// Deterministic key identifying one logical notification attempt.
///
/// Two invocations describing the same event, ticket, recipient and
/// bucket produce the same key. The core computes the key for audit and
/// storage-level dedupe hints; it does not itself reject duplicates.
pub fn dedupe_key(
    event: NotifyEvent,
    ticket_id: Uuid,
    recipient_id: Uuid,
    bucket: Option<&str>,
) -> String {
    let mut key = format!("{}:{}:{}", event.as_str(), ticket_id, recipient_id);

    if let Some(bucket) = bucket {
        key.push(':');
        key.push_str(bucket);
    }

    key
}
