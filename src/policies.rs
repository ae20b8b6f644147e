use std::collections::HashMap;
use std::sync::Arc;

use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{
    clients::whatsapp::Transport,
    config::TemplateConfig,
    dedupe::dedupe_key,
    models::{
        record::{NewNotification, NotifyEvent},
        ticket::TicketSummary,
    },
    store::{ContactDirectory, NotificationStore, TicketDirectory},
};

/// Label used when an actor's display name cannot be resolved.
const GENERIC_ACTOR_LABEL: &str = "Manager";

/// Per-event orchestration: contact gate, context resolution, ledger
/// write, transport send, ledger update.
///
/// Notification is best-effort. Every method swallows and logs internal
/// failures so the lifecycle action that triggered it (ticket create,
/// assignment, comment, deadline sweep) proceeds regardless of outcome.
/// The return value is the ledger entry id when one was created.
pub struct NotificationPolicies {
    store: Arc<dyn NotificationStore>,
    contacts: Arc<dyn ContactDirectory>,
    tickets: Arc<dyn TicketDirectory>,
    transport: Arc<dyn Transport>,
    templates: TemplateConfig,
}

impl NotificationPolicies {
    pub fn new(
        store: Arc<dyn NotificationStore>,
        contacts: Arc<dyn ContactDirectory>,
        tickets: Arc<dyn TicketDirectory>,
        transport: Arc<dyn Transport>,
        templates: TemplateConfig,
    ) -> Self {
        Self {
            store,
            contacts,
            tickets,
            transport,
            templates,
        }
    }

    pub async fn demand_created(&self, ticket_id: Uuid, recipient_id: Uuid) -> Option<Uuid> {
        let event = NotifyEvent::DemandCreated;

        let phone = self.deliverable_phone(recipient_id, event).await?;
        let ticket = self.resolve_ticket(ticket_id, event).await?;

        let mut payload = HashMap::new();
        payload.insert("demand_name".to_string(), ticket.name.clone());
        payload.insert("department".to_string(), ticket.department.clone());

        let key = dedupe_key(event, ticket_id, recipient_id, None);

        self.dispatch(
            event,
            recipient_id,
            ticket_id,
            &phone,
            self.templates.demand_created.clone(),
            payload,
            key,
        )
        .await
    }

    pub async fn demand_assigned(
        &self,
        ticket_id: Uuid,
        recipient_id: Uuid,
        actor_id: Uuid,
    ) -> Option<Uuid> {
        let event = NotifyEvent::DemandAssigned;

        let phone = self.deliverable_phone(recipient_id, event).await?;
        let ticket = self.resolve_ticket(ticket_id, event).await?;
        let assigner = self.actor_label(actor_id).await;

        let mut payload = HashMap::new();
        payload.insert("demand_name".to_string(), ticket.name.clone());
        payload.insert("assigner_name".to_string(), assigner);

        let key = dedupe_key(event, ticket_id, recipient_id, None);

        self.dispatch(
            event,
            recipient_id,
            ticket_id,
            &phone,
            self.templates.demand_assigned.clone(),
            payload,
            key,
        )
        .await
    }

    pub async fn manager_commented(
        &self,
        ticket_id: Uuid,
        recipient_id: Uuid,
        manager_id: Uuid,
    ) -> Option<Uuid> {
        let event = NotifyEvent::ManagerCommented;

        let phone = self.deliverable_phone(recipient_id, event).await?;
        let ticket = self.resolve_ticket(ticket_id, event).await?;
        let manager = self.actor_label(manager_id).await;

        let mut payload = HashMap::new();
        payload.insert("demand_name".to_string(), ticket.name.clone());
        payload.insert("manager_name".to_string(), manager);

        let key = dedupe_key(event, ticket_id, recipient_id, None);

        self.dispatch(
            event,
            recipient_id,
            ticket_id,
            &phone,
            self.templates.manager_comment.clone(),
            payload,
            key,
        )
        .await
    }

    pub async fn deadline_approaching(
        &self,
        ticket_id: Uuid,
        recipient_id: Uuid,
        hours_until_due: i64,
    ) -> Option<Uuid> {
        let event = NotifyEvent::DeadlineApproaching;

        let phone = self.deliverable_phone(recipient_id, event).await?;
        let ticket = self.resolve_ticket(ticket_id, event).await?;

        let days_left = days_until(hours_until_due);

        let mut payload = HashMap::new();
        payload.insert("demand_name".to_string(), ticket.name.clone());
        payload.insert("days_left".to_string(), days_left.to_string());

        // Day-granular bucket so hourly sweeps hitting different
        // thresholds of the same day collapse to one logical attempt.
        let bucket = format!("{}d", days_left);
        let key = dedupe_key(event, ticket_id, recipient_id, Some(&bucket));

        self.dispatch(
            event,
            recipient_id,
            ticket_id,
            &phone,
            self.templates.deadline_approaching.clone(),
            payload,
            key,
        )
        .await
    }

    /// Contact gate. Opt-out and missing phone are deliberate no-sends,
    /// not failures; a directory error is logged and treated the same.
    async fn deliverable_phone(&self, recipient_id: Uuid, event: NotifyEvent) -> Option<String> {
        let preference = match self.contacts.contact_preference(recipient_id).await {
            Ok(Some(preference)) => preference,
            Ok(None) => {
                info!(%recipient_id, %event, "Recipient profile not found, skipping notification");
                return None;
            }
            Err(e) => {
                warn!(%recipient_id, %event, error = %e, "Contact lookup failed, skipping notification");
                return None;
            }
        };

        if !preference.opt_in {
            info!(%recipient_id, %event, "Recipient opted out of WhatsApp notifications");
            return None;
        }

        match preference.phone {
            Some(phone) if !phone.trim().is_empty() => Some(phone),
            _ => {
                info!(%recipient_id, %event, "Recipient has no phone on file, skipping notification");
                None
            }
        }
    }

    /// A notification about a ticket that no longer resolves is
    /// meaningless; abort silently.
    async fn resolve_ticket(&self, ticket_id: Uuid, event: NotifyEvent) -> Option<TicketSummary> {
        match self.tickets.ticket_summary(ticket_id).await {
            Ok(Some(ticket)) => Some(ticket),
            Ok(None) => {
                info!(%ticket_id, %event, "Ticket not found, skipping notification");
                None
            }
            Err(e) => {
                warn!(%ticket_id, %event, error = %e, "Ticket lookup failed, skipping notification");
                None
            }
        }
    }

    async fn actor_label(&self, actor_id: Uuid) -> String {
        match self.contacts.display_name(actor_id).await {
            Ok(Some(name)) => name,
            Ok(None) => GENERIC_ACTOR_LABEL.to_string(),
            Err(e) => {
                warn!(%actor_id, error = %e, "Actor lookup failed, using generic label");
                GENERIC_ACTOR_LABEL.to_string()
            }
        }
    }

    /// Ledger create, transport send, ledger update. The create must
    /// succeed before anything goes on the wire; ledger updates after the
    /// send are best-effort.
    #[allow(clippy::too_many_arguments)]
    async fn dispatch(
        &self,
        event: NotifyEvent,
        recipient_id: Uuid,
        ticket_id: Uuid,
        phone: &str,
        template_id: String,
        payload: HashMap<String, String>,
        dedupe_key: String,
    ) -> Option<Uuid> {
        let new = NewNotification::new(
            recipient_id,
            Some(ticket_id),
            template_id.clone(),
            payload.clone(),
            dedupe_key,
        );

        let id = match self.store.create(new).await {
            Ok(id) => id,
            Err(e) => {
                error!(%recipient_id, %ticket_id, %event, error = %e, "Ledger write failed, not sending");
                return None;
            }
        };

        let link_url = format!("{}/demands/{}", self.templates.public_base_url, ticket_id);

        match self
            .transport
            .send_template_message(phone, &template_id, Some(payload), Some(&link_url))
            .await
        {
            Ok(receipt) => {
                if let Err(e) = self
                    .store
                    .mark_sent(id, &receipt.provider_message_id)
                    .await
                {
                    warn!(notification_id = %id, error = %e, "Failed to record sent status");
                }
            }
            Err(e) => {
                warn!(notification_id = %id, %event, error = %e, "WhatsApp delivery failed");

                if let Err(update_err) = self.store.mark_failed(id, &e.message).await {
                    warn!(notification_id = %id, error = %update_err, "Failed to record failed status");
                }
            }
        }

        Some(id)
    }
}

/// Whole days until the deadline, rounding up: 6h and 24h are both one
/// day out, 25h is two.
pub fn days_until(hours: i64) -> i64 {
    (hours + 23).div_euclid(24)
}
