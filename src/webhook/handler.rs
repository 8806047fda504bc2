use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};

use crate::queue::task::{SyncTrigger, Task};
use crate::server::AppState;
use crate::webhook::events::WebhookEvent;
use crate::webhook::routing::Routed;

pub async fn handle_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    let event_type = match headers.get("x-github-event").and_then(|v| v.to_str().ok()) {
        Some(et) => et.to_string(),
        None => {
            tracing::warn!("Missing X-GitHub-Event header");
            return StatusCode::BAD_REQUEST;
        }
    };

    let delivery = headers
        .get("x-github-delivery")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-")
        .to_string();

    let event = match WebhookEvent::parse(&event_type, &body) {
        Ok(event) => event,
        Err(e) => {
            tracing::error!(error = %e, event_type = %event_type, delivery = %delivery, "Failed to parse webhook event");
            return StatusCode::BAD_REQUEST;
        }
    };

    tracing::info!(
        event_type = %event_type,
        action = event.action().unwrap_or("-"),
        delivery = %delivery,
        "Received webhook event"
    );

    match state.router.route(event).await {
        Routed::Synced | Routed::Ignored => StatusCode::OK,
        Routed::SyncRepositories(repos) if repos.is_empty() => StatusCode::OK,
        Routed::SyncRepositories(repos) => {
            let mut queue = state.task_queue.write().await;
            queue.enqueue(Task::SyncRepositories {
                repos,
                trigger: SyncTrigger::Installation,
            });
            StatusCode::ACCEPTED
        }
    }
}
