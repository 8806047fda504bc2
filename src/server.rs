use std::sync::Arc;
use std::time::Duration;

use axum::{routing::post, Router};
use tokio::sync::RwLock;
use tower_http::trace::TraceLayer;

use crate::config::AppConfig;
use crate::platform::github::GitHubPlatform;
use crate::platform::Platform;
use crate::queue::TaskQueue;
use crate::service::Services;
use crate::store::SqliteStore;
use crate::sync::BulkSync;
use crate::webhook::EventRouter;

pub struct AppState {
    pub config: AppConfig,
    pub store: Arc<SqliteStore>,
    pub router: EventRouter,
    pub bulk_sync: BulkSync,
    pub task_queue: RwLock<TaskQueue>,
}

impl AppState {
    /// Connect the database and build the GitHub client from `config`.
    pub async fn new(config: AppConfig) -> crate::error::Result<Self> {
        let store = SqliteStore::connect(&config.database).await?;
        let platform = Arc::new(GitHubPlatform::new(&config.github)?);

        Ok(Self::from_parts(config, store, platform))
    }

    pub fn from_parts(config: AppConfig, store: SqliteStore, platform: Arc<dyn Platform>) -> Self {
        let store = Arc::new(store);
        let services = Services::new(store.clone());
        let page_pause = Duration::from_millis(config.sync.page_pause_ms);

        Self {
            router: EventRouter::new(services.clone(), platform.clone()),
            bulk_sync: BulkSync::new(services, platform, page_pause),
            task_queue: RwLock::new(TaskQueue::new()),
            store,
            config,
        }
    }
}

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/webhooks/github", post(crate::webhook::handler::handle_webhook))
        .route("/health", axum::routing::get(health_check))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check() -> &'static str {
    "ok"
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::json;
    use sqlx::sqlite::SqlitePoolOptions;
    use tower::ServiceExt;

    use crate::config::{DatabaseConfig, GitHubConfig, ServerConfig, SyncConfig};
    use crate::model::PullKey;
    use crate::store::PullStore;
    use crate::test_utils::FakePlatform;

    async fn test_state() -> Arc<AppState> {
        let config = AppConfig {
            server: ServerConfig::default(),
            github: GitHubConfig {
                app_id: 1,
                private_key_path: "/nonexistent/key.pem".into(),
                api_base_url: "https://api.github.com".to_string(),
            },
            database: DatabaseConfig::default(),
            sync: SyncConfig::default(),
        };
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        let store = SqliteStore::from_pool(pool);
        store.init_schema().await.unwrap();

        Arc::new(AppState::from_parts(
            config,
            store,
            Arc::new(FakePlatform::default()),
        ))
    }

    fn webhook(event: Option<&str>, body: serde_json::Value) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri("/webhooks/github")
            .header("content-type", "application/json");
        if let Some(event) = event {
            builder = builder.header("x-github-event", event);
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    #[tokio::test]
    async fn test_health_returns_200() {
        let app = create_router(test_state().await);
        let request = Request::builder().uri("/health").body(Body::empty()).unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_webhook_without_event_header_returns_400() {
        let app = create_router(test_state().await);

        let response = app.oneshot(webhook(None, json!({}))).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_malformed_payload_returns_400() {
        let app = create_router(test_state().await);

        let response = app
            .oneshot(webhook(Some("pull_request"), json!({ "action": "opened" })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_pull_request_event_is_stored() {
        let state = test_state().await;
        let app = create_router(state.clone());
        let body = json!({
            "action": "opened",
            "pull_request": {
                "number": 8,
                "state": "open",
                "title": "Add metrics",
                "body": "details",
                "user": { "login": "author" },
                "labels": [],
                "author_association": "CONTRIBUTOR",
                "created_at": "2021-03-01T00:00:00Z",
                "updated_at": "2021-03-01T00:00:00Z",
                "closed_at": null,
                "merged_at": null
            },
            "repository": { "name": "tidb", "owner": { "login": "pingcap" } },
            "installation": { "id": 3 }
        });

        let response = app.oneshot(webhook(Some("pull_request"), body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let key = PullKey {
            owner: "pingcap".to_string(),
            repo: "tidb".to_string(),
            pull_number: 8,
        };
        let stored = state.store.find_pull(&key).await.unwrap().unwrap();
        assert_eq!(stored.title, "Add metrics");
    }

    #[tokio::test]
    async fn test_installation_event_schedules_sync() {
        let state = test_state().await;
        let app = create_router(state.clone());
        let body = json!({
            "action": "created",
            "installation": { "id": 3, "account": { "login": "pingcap" } },
            "repositories": [
                { "name": "tidb", "full_name": "pingcap/tidb", "private": false }
            ]
        });

        let response = app.oneshot(webhook(Some("installation"), body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        assert_eq!(state.task_queue.read().await.len(), 1);
    }
}
