//! Router over the in-memory store, plus request helpers.

#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::Value as JsonValue;
use tower::ServiceExt;
use uuid::Uuid;

use tally_api::{router, ApiConfig, AppState, RateLimitConfig, Repositories, WebhookSecrets};
use tally_core::memory::{InMemoryStore, RecordingEmailProvider};
use tally_core::{Plan, ReminderDispatcher};

pub const PAYMENTS_SECRET: &str = "whsec_test";

pub struct TestApp {
    pub store: Arc<InMemoryStore>,
    pub email: Arc<RecordingEmailProvider>,
    pub router: Router,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_config(ApiConfig::default().with_rate_limit(RateLimitConfig::disabled()))
    }

    pub fn with_config(config: ApiConfig) -> Self {
        let store = Arc::new(InMemoryStore::new());
        let email = Arc::new(RecordingEmailProvider::new());
        let repos = Repositories::in_memory(store.clone());
        let runner = repos.runner(ReminderDispatcher::new(email.clone()));
        let state = AppState::new(repos, runner)
            .with_webhook_secrets(WebhookSecrets {
                email: config.email_webhook_secret.clone(),
                payments: Some(PAYMENTS_SECRET.to_string()),
            })
            .with_app_base_url("https://app.tally.test")
            .with_rate_limiter(tally_api::build_rate_limiter(&config.rate_limit));
        Self {
            router: router(state, &config),
            store,
            email,
        }
    }

    /// A fresh account on `plan`.
    pub fn owner(&self, plan: Plan) -> Uuid {
        let owner = Uuid::new_v4();
        self.store.set_plan(owner, plan);
        owner
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, JsonValue) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = if bytes.is_empty() {
            JsonValue::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    pub async fn get(&self, owner: Uuid, uri: &str) -> (StatusCode, JsonValue) {
        self.send(
            Request::get(uri)
                .header("x-user-id", owner.to_string())
                .body(Body::empty())
                .unwrap(),
        )
        .await
    }

    pub async fn post(&self, owner: Uuid, uri: &str, body: JsonValue) -> (StatusCode, JsonValue) {
        self.send(json_request("POST", uri, Some(owner), body)).await
    }

    pub async fn create_client(&self, owner: Uuid, name: &str) -> Uuid {
        let (status, body) = self
            .post(
                owner,
                "/api/v1/clients",
                serde_json::json!({
                    "name": name,
                    "email": format!("{}@client.test", name.to_lowercase()),
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        id_of(&body)
    }

    pub async fn create_invoice(&self, owner: Uuid, client_id: Uuid) -> (StatusCode, JsonValue) {
        self.post(
            owner,
            "/api/v1/invoices",
            serde_json::json!({
                "client_id": client_id,
                "line_items": [
                    { "description": "Design sprint", "quantity": 3, "unit_price_cents": 150000 }
                ],
                "tax_rate_bps": 825,
            }),
        )
        .await
    }
}

pub fn json_request(
    method: &str,
    uri: &str,
    owner: Option<Uuid>,
    body: JsonValue,
) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(owner) = owner {
        builder = builder.header("x-user-id", owner.to_string());
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

pub fn id_of(body: &JsonValue) -> Uuid {
    body["id"].as_str().unwrap().parse().unwrap()
}
