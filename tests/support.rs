use std::collections::{HashMap, VecDeque};
use std::sync::{
    Arc, Mutex,
    atomic::{AtomicBool, Ordering},
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use notify_service::{
    clients::whatsapp::Transport,
    config::TemplateConfig,
    models::{
        record::{Channel, NewNotification, NotificationRecord, NotificationStatus},
        ticket::{ContactPreference, DemandStatus, TicketSummary},
        whatsapp::{DeliveryError, DeliveryReceipt},
    },
    policies::NotificationPolicies,
    store::{ContactDirectory, LIST_LIMIT, NotificationStore, StoreError, TicketDirectory},
};
use uuid::Uuid;

/// In-memory ledger with the same transition rules as the Postgres store.
#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<Vec<NotificationRecord>>,
    fail_create: AtomicBool,
    fail_updates: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_create(&self) {
        self.fail_create.store(true, Ordering::SeqCst);
    }

    pub fn fail_updates(&self) {
        self.fail_updates.store(true, Ordering::SeqCst);
    }

    pub fn records(&self) -> Vec<NotificationRecord> {
        self.records.lock().unwrap().clone()
    }

    pub fn record(&self, id: Uuid) -> Option<NotificationRecord> {
        self.records
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.id == id)
            .cloned()
    }
}

#[async_trait]
impl NotificationStore for MemoryStore {
    async fn create(&self, new: NewNotification) -> Result<Uuid, StoreError> {
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(StoreError::Persistence("create rejected".to_string()));
        }

        let id = Uuid::new_v4();
        self.records.lock().unwrap().push(NotificationRecord {
            id,
            recipient_id: new.recipient_id,
            ticket_id: new.ticket_id,
            channel: Channel::Whatsapp,
            template_id: new.template_id,
            payload: new.payload,
            dedupe_key: new.dedupe_key,
            status: NotificationStatus::Queued,
            provider_message_id: None,
            error_message: None,
            created_at: Utc::now(),
            sent_at: None,
            read_at: None,
        });

        Ok(id)
    }

    async fn mark_sent(&self, id: Uuid, provider_message_id: &str) -> Result<(), StoreError> {
        if self.fail_updates.load(Ordering::SeqCst) {
            return Err(StoreError::Persistence("update rejected".to_string()));
        }

        let mut records = self.records.lock().unwrap();
        let record = records
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or(StoreError::NotFound)?;

        if record.status != NotificationStatus::Queued {
            return Err(StoreError::Persistence(format!(
                "notification {} is not in queued state",
                id
            )));
        }

        record.status = NotificationStatus::Sent;
        record.provider_message_id = Some(provider_message_id.to_string());
        record.sent_at = Some(Utc::now());

        Ok(())
    }

    async fn mark_failed(&self, id: Uuid, error_message: &str) -> Result<(), StoreError> {
        if self.fail_updates.load(Ordering::SeqCst) {
            return Err(StoreError::Persistence("update rejected".to_string()));
        }

        let mut records = self.records.lock().unwrap();
        let record = records
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or(StoreError::NotFound)?;

        if record.status != NotificationStatus::Queued {
            return Err(StoreError::Persistence(format!(
                "notification {} is not in queued state",
                id
            )));
        }

        record.status = NotificationStatus::Failed;
        record.error_message = Some(error_message.to_string());

        Ok(())
    }

    async fn list_for_recipient(
        &self,
        recipient_id: Uuid,
        limit: Option<u32>,
    ) -> Result<Vec<NotificationRecord>, StoreError> {
        let limit = limit.unwrap_or(LIST_LIMIT).min(LIST_LIMIT) as usize;

        Ok(self
            .records
            .lock()
            .unwrap()
            .iter()
            .rev()
            .filter(|r| r.recipient_id == recipient_id)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn mark_read(&self, id: Uuid, recipient_id: Uuid) -> Result<(), StoreError> {
        let mut records = self.records.lock().unwrap();
        let record = records
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or(StoreError::NotFound)?;

        if record.recipient_id != recipient_id {
            return Err(StoreError::Forbidden);
        }

        record.read_at = Some(Utc::now());

        Ok(())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

/// Fixture-backed profile and ticket lookups. Deadline-window queries
/// return queued responses in order and record their arguments.
#[derive(Default)]
pub struct StaticDirectory {
    contacts: Mutex<HashMap<Uuid, ContactPreference>>,
    names: Mutex<HashMap<Uuid, String>>,
    tickets: Mutex<HashMap<Uuid, TicketSummary>>,
    due_responses: Mutex<VecDeque<Result<Vec<TicketSummary>, String>>>,
    window_calls: Mutex<Vec<(DateTime<Utc>, DateTime<Utc>)>>,
}

impl StaticDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_contact(&self, user_id: Uuid, phone: Option<&str>, opt_in: bool) {
        self.contacts.lock().unwrap().insert(
            user_id,
            ContactPreference {
                phone: phone.map(str::to_string),
                opt_in,
            },
        );
    }

    pub fn add_name(&self, user_id: Uuid, name: &str) {
        self.names
            .lock()
            .unwrap()
            .insert(user_id, name.to_string());
    }

    pub fn add_ticket(&self, ticket: TicketSummary) {
        self.tickets.lock().unwrap().insert(ticket.id, ticket);
    }

    pub fn queue_due_window(&self, response: Result<Vec<TicketSummary>, String>) {
        self.due_responses.lock().unwrap().push_back(response);
    }

    pub fn window_calls(&self) -> Vec<(DateTime<Utc>, DateTime<Utc>)> {
        self.window_calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ContactDirectory for StaticDirectory {
    async fn contact_preference(
        &self,
        user_id: Uuid,
    ) -> Result<Option<ContactPreference>, StoreError> {
        Ok(self.contacts.lock().unwrap().get(&user_id).cloned())
    }

    async fn display_name(&self, user_id: Uuid) -> Result<Option<String>, StoreError> {
        Ok(self.names.lock().unwrap().get(&user_id).cloned())
    }
}

#[async_trait]
impl TicketDirectory for StaticDirectory {
    async fn ticket_summary(&self, ticket_id: Uuid) -> Result<Option<TicketSummary>, StoreError> {
        Ok(self.tickets.lock().unwrap().get(&ticket_id).cloned())
    }

    async fn find_due_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<TicketSummary>, StoreError> {
        self.window_calls.lock().unwrap().push((start, end));

        match self.due_responses.lock().unwrap().pop_front() {
            Some(Ok(tickets)) => Ok(tickets),
            Some(Err(message)) => Err(StoreError::Persistence(message)),
            None => Ok(Vec::new()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TransportCall {
    pub phone: String,
    pub template_id: String,
    pub variables: Option<HashMap<String, String>>,
    pub link_url: Option<String>,
}

/// Records every send; configured to either accept or reject them all.
pub struct RecordingTransport {
    calls: Mutex<Vec<TransportCall>>,
    outcome: Result<String, String>,
}

impl RecordingTransport {
    pub fn succeeding(provider_message_id: &str) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            outcome: Ok(provider_message_id.to_string()),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            outcome: Err(message.to_string()),
        }
    }

    pub fn calls(&self) -> Vec<TransportCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn send_template_message(
        &self,
        phone: &str,
        template_id: &str,
        variables: Option<HashMap<String, String>>,
        link_url: Option<&str>,
    ) -> Result<DeliveryReceipt, DeliveryError> {
        self.calls.lock().unwrap().push(TransportCall {
            phone: phone.to_string(),
            template_id: template_id.to_string(),
            variables,
            link_url: link_url.map(str::to_string),
        });

        match &self.outcome {
            Ok(id) => Ok(DeliveryReceipt {
                provider_message_id: id.clone(),
            }),
            Err(message) => Err(DeliveryError::new(message.clone())),
        }
    }
}

pub fn template_config() -> TemplateConfig {
    TemplateConfig {
        demand_created: "tpl-created".to_string(),
        demand_assigned: "tpl-assigned".to_string(),
        manager_comment: "tpl-comment".to_string(),
        deadline_approaching: "tpl-deadline".to_string(),
        public_base_url: "https://demands.example.com".to_string(),
    }
}

pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub directory: Arc<StaticDirectory>,
    pub transport: Arc<RecordingTransport>,
    pub policies: Arc<NotificationPolicies>,
}

pub fn harness(transport: RecordingTransport) -> Harness {
    let store = Arc::new(MemoryStore::new());
    let directory = Arc::new(StaticDirectory::new());
    let transport = Arc::new(transport);

    let policies = Arc::new(NotificationPolicies::new(
        store.clone(),
        directory.clone(),
        directory.clone(),
        transport.clone(),
        template_config(),
    ));

    Harness {
        store,
        directory,
        transport,
        policies,
    }
}

pub fn open_ticket(name: &str, assignee: Option<Uuid>) -> TicketSummary {
    TicketSummary {
        id: Uuid::new_v4(),
        name: name.to_string(),
        department: "Engineering".to_string(),
        due_at: None,
        status: DemandStatus::Open,
        assignee_id: assignee,
    }
}
