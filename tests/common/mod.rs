use std::sync::Arc;

use axum::{
    body::{self, Body},
    http::{Method, Request},
    Router,
};
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, Set};
use serde_json::Value;
use tokio::sync::mpsc;
use tower::ServiceExt;
use uuid::Uuid;

use maplecart_api::{
    auth::{issue_token, AuthUser},
    config::AppConfig,
    db,
    entities::{product, region},
    events::{self, EventSender},
    handlers::AppServices,
    AppState,
};

pub const JWT_SECRET: &str = "test_secret_key_for_testing_purposes_only_32chars";

/// Test harness backed by a throwaway SQLite database file.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    pub user_id: Uuid,
    user_token: String,
    admin_token: String,
    _event_task: tokio::task::JoinHandle<()>,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_config(|_| {}).await
    }

    /// Construct a test application, letting the caller tweak the config
    /// before services are wired.
    pub async fn with_config(adjust: impl FnOnce(&mut AppConfig)) -> Self {
        let db_file = std::env::temp_dir().join(format!("maplecart_test_{}.db", Uuid::new_v4()));
        let db_url = format!("sqlite://{}?mode=rwc", db_file.display());

        let mut cfg = AppConfig::new(db_url, JWT_SECRET, "127.0.0.1", 18080, "test");
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;
        adjust(&mut cfg);

        let pool = db::establish_connection(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");
        let db = Arc::new(pool);

        let (event_tx, event_rx) = mpsc::channel(256);
        let event_sender = EventSender::new(event_tx);
        let event_task = tokio::spawn(events::process_events(event_rx, None));

        let services = AppServices::build(db.clone(), &cfg, event_sender.clone())
            .expect("failed to build services");
        let state = AppState {
            db,
            config: cfg.clone(),
            event_sender,
            services,
        };
        let router = maplecart_api::app_router(state.clone());

        let user_id = Uuid::new_v4();
        let user_token = issue_token(JWT_SECRET, user_id, "shopper@example.com", false, 3600)
            .expect("encode user token");
        let admin_token = issue_token(JWT_SECRET, Uuid::new_v4(), "ops@example.com", true, 3600)
            .expect("encode admin token");

        Self {
            router,
            state,
            user_id,
            user_token,
            admin_token,
            _event_task: event_task,
        }
    }

    pub fn user(&self) -> AuthUser {
        AuthUser {
            id: self.user_id,
            email: "shopper@example.com".to_string(),
            admin: false,
        }
    }

    /// Send a request against the router with an optional bearer token.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> axum::response::Response {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(tok) = token {
            builder = builder.header("authorization", format!("Bearer {}", tok));
        }
        let body = if let Some(json) = body {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&json).expect("failed to serialize json request body"))
        } else {
            Body::empty()
        };
        let request = builder.body(body).expect("failed to build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    pub async fn request_as_user(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> axum::response::Response {
        self.request(method, uri, body, Some(&self.user_token)).await
    }

    pub async fn request_as_admin(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> axum::response::Response {
        self.request(method, uri, body, Some(&self.admin_token)).await
    }

    /// Raw request with arbitrary headers, used by webhook tests.
    pub async fn request_raw(
        &self,
        method: Method,
        uri: &str,
        body: Vec<u8>,
        headers: &[(&str, &str)],
    ) -> axum::response::Response {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        let request = builder
            .body(Body::from(body))
            .expect("failed to build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    pub async fn seed_product(&self, name: &str, price: Decimal) -> product::Model {
        let now = chrono::Utc::now();
        product::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(name.to_string()),
            description: Set(None),
            price: Set(price),
            category: Set(None),
            image_attachment_id: Set(None),
            active: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.state.db)
        .await
        .expect("seed product")
    }

    pub async fn seed_region(
        &self,
        name: &str,
        gst: Option<Decimal>,
        pst: Option<Decimal>,
        hst: Option<Decimal>,
    ) -> region::Model {
        region::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(name.to_string()),
            gst: Set(gst),
            pst: Set(pst),
            hst: Set(hst),
        }
        .insert(&*self.state.db)
        .await
        .expect("seed region")
    }

    /// Ontario with HST only, the standard fixture region (13%).
    pub async fn seed_ontario(&self) -> region::Model {
        self.seed_region("Ontario", None, None, Some(Decimal::new(13, 2)))
            .await
    }
}

pub async fn response_json(response: axum::response::Response) -> Value {
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body bytes");
    serde_json::from_slice(&bytes).expect("json response")
}

/// Money fields serialize as decimal strings; parse them back for numeric
/// comparison so trailing-zero differences cannot fail a test.
pub fn as_decimal(value: &Value) -> Decimal {
    match value {
        Value::String(s) => s.parse().expect("decimal string"),
        Value::Number(n) => n.to_string().parse().expect("decimal number"),
        other => panic!("not a decimal value: {:?}", other),
    }
}
