use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    models::ticket::DemandStatus, policies::NotificationPolicies, store::TicketDirectory,
};

/// Lead times, in hours, at which assignees are warned about a due date.
pub const DEADLINE_THRESHOLD_HOURS: [i64; 2] = [24, 6];

/// Half-width of each threshold's match window. The external scheduler
/// must fire more often than this so no ticket skips its window.
pub const WINDOW_TOLERANCE_MINUTES: i64 = 30;

#[derive(Debug, Default, Serialize)]
pub struct ScanReport {
    pub notification_ids: Vec<Uuid>,
    pub errors: u32,
}

impl ScanReport {
    pub fn count(&self) -> usize {
        self.notification_ids.len()
    }
}

/// Periodic sweep over tickets whose due time is entering a warning
/// window. Invoked by an external scheduler through the API.
pub struct DeadlineScanner {
    tickets: Arc<dyn TicketDirectory>,
    policies: Arc<NotificationPolicies>,
}

impl DeadlineScanner {
    pub fn new(tickets: Arc<dyn TicketDirectory>, policies: Arc<NotificationPolicies>) -> Self {
        Self { tickets, policies }
    }

    /// One full sweep across every threshold. A failing threshold query
    /// or ticket is logged and counted; siblings keep processing.
    pub async fn scan(&self, now: DateTime<Utc>) -> ScanReport {
        let mut report = ScanReport::default();

        for hours in DEADLINE_THRESHOLD_HOURS {
            let center = now + Duration::hours(hours);
            let start = center - Duration::minutes(WINDOW_TOLERANCE_MINUTES);
            let end = center + Duration::minutes(WINDOW_TOLERANCE_MINUTES);

            let tickets = match self.tickets.find_due_between(start, end).await {
                Ok(tickets) => tickets,
                Err(e) => {
                    warn!(threshold_hours = hours, error = %e, "Deadline window query failed");
                    report.errors += 1;
                    continue;
                }
            };

            debug!(
                threshold_hours = hours,
                candidates = tickets.len(),
                "Scanning deadline window"
            );

            for ticket in tickets {
                if ticket.status == DemandStatus::Completed {
                    debug!(ticket_id = %ticket.id, "Ticket already completed, skipping");
                    continue;
                }

                let Some(assignee_id) = ticket.assignee_id else {
                    debug!(ticket_id = %ticket.id, "Ticket has no assignee, skipping");
                    continue;
                };

                if let Some(id) = self
                    .policies
                    .deadline_approaching(ticket.id, assignee_id, hours)
                    .await
                {
                    report.notification_ids.push(id);
                }
            }
        }

        info!(
            triggered = report.count(),
            errors = report.errors,
            "Deadline scan finished"
        );

        report
    }
}
