use std::sync::Arc;

use axum::{
    Router,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode, header::AUTHORIZATION},
    response::{IntoResponse, Json},
    routing::{get, post},
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    config::Config,
    models::{record::InboxEntry, response::ApiResponse},
    scan::DeadlineScanner,
    store::{NotificationStore, StoreError, TicketDirectory},
};

pub struct AppState {
    pub store: Arc<dyn NotificationStore>,
    pub tickets: Arc<dyn TicketDirectory>,
    pub scanner: DeadlineScanner,
    pub scheduler_secret: Option<String>,
}

pub async fn run_api_server(
    config: Config,
    state: Arc<AppState>,
) -> Result<(), Box<dyn std::error::Error>> {
    let app = router(state);

    let addr = format!("0.0.0.0:{}", config.server_port);
    let listener = TcpListener::bind(&addr).await?;

    info!(address = %addr, "Notification API server started");

    axum::serve(listener, app).await?;

    Ok(())
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/notifications", get(list_notifications))
        .route("/notifications/{id}/read", post(mark_read))
        .route("/internal/deadline-scan", post(run_deadline_scan))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.store.ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(ApiResponse::success("ok", "Service healthy".to_string())),
        ),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ApiResponse::error(e.to_string(), "Store unreachable".to_string())),
        ),
    }
}

#[derive(Debug, Deserialize)]
struct ListParams {
    limit: Option<u32>,
}

async fn list_notifications(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(params): Query<ListParams>,
) -> impl IntoResponse {
    let recipient_id = match recipient_from_headers(&headers) {
        Ok(id) => id,
        Err(response) => return response.into_response(),
    };

    let records = match state
        .store
        .list_for_recipient(recipient_id, params.limit)
        .await
    {
        Ok(records) => records,
        Err(e) => {
            warn!(%recipient_id, error = %e, "Inbox listing failed");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::<Vec<InboxEntry>>::error(
                    e.to_string(),
                    "Failed to list notifications".to_string(),
                )),
            )
                .into_response();
        }
    };

    // Display-label join; a vanished ticket just renders without a name.
    let mut entries = Vec::with_capacity(records.len());
    for record in records {
        let ticket_name = match record.ticket_id {
            Some(ticket_id) => state
                .tickets
                .ticket_summary(ticket_id)
                .await
                .ok()
                .flatten()
                .map(|ticket| ticket.name),
            None => None,
        };
        entries.push(InboxEntry {
            record,
            ticket_name,
        });
    }

    (
        StatusCode::OK,
        Json(ApiResponse::success(
            entries,
            "Notifications listed".to_string(),
        )),
    )
        .into_response()
}

async fn mark_read(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> impl IntoResponse {
    let recipient_id = match recipient_from_headers(&headers) {
        Ok(id) => id,
        Err(response) => return response.into_response(),
    };

    match state.store.mark_read(id, recipient_id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(StoreError::Forbidden) => (
            StatusCode::FORBIDDEN,
            Json(ApiResponse::<()>::error(
                "forbidden".to_string(),
                "Notification belongs to another recipient".to_string(),
            )),
        )
            .into_response(),
        Err(StoreError::NotFound) => (
            StatusCode::NOT_FOUND,
            Json(ApiResponse::<()>::error(
                "not_found".to_string(),
                "Notification not found".to_string(),
            )),
        )
            .into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiResponse::<()>::error(
                e.to_string(),
                "Failed to mark notification read".to_string(),
            )),
        )
            .into_response(),
    }
}

#[derive(Debug, Serialize)]
struct ScanResponse {
    count: usize,
    notification_ids: Vec<Uuid>,
    errors: u32,
}

/// Invoked by the external scheduler; guarded by a shared secret carried
/// raw in the Authorization header.
async fn run_deadline_scan(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> impl IntoResponse {
    let Some(secret) = state.scheduler_secret.as_deref() else {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiResponse::<ScanResponse>::error(
                "misconfigured".to_string(),
                "Scheduler secret is not configured".to_string(),
            )),
        )
            .into_response();
    };

    let presented = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok());

    if presented != Some(secret) {
        return (
            StatusCode::UNAUTHORIZED,
            Json(ApiResponse::<ScanResponse>::error(
                "unauthorized".to_string(),
                "Invalid scheduler credentials".to_string(),
            )),
        )
            .into_response();
    }

    let report = state.scanner.scan(Utc::now()).await;

    let response = ScanResponse {
        count: report.count(),
        notification_ids: report.notification_ids,
        errors: report.errors,
    };

    (
        StatusCode::OK,
        Json(ApiResponse::success(
            response,
            "Deadline scan completed".to_string(),
        )),
    )
        .into_response()
}

fn recipient_from_headers(
    headers: &HeaderMap,
) -> Result<Uuid, (StatusCode, Json<ApiResponse<()>>)> {
    headers
        .get("x-user-id")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| Uuid::parse_str(value).ok())
        .ok_or((
            StatusCode::UNAUTHORIZED,
            Json(ApiResponse::error(
                "unauthorized".to_string(),
                "Missing or invalid x-user-id header".to_string(),
            )),
        ))
}
