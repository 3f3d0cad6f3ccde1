//! Shared fixtures: an app on a temp data dir with an in-memory gateway.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use chrono::NaiveDate;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

use fitcoach::auth::MemoryMailer;
use fitcoach::billing::gateway::{Customer, NewCustomer, PixCharge, PixQrCode};
use fitcoach::billing::{GatewayError, PaymentGateway, PaymentStatus};
use fitcoach::{build_router, AppConfig, AppState, Database};

pub const WEBHOOK_TOKEN: &str = "whsec_test";

/// Gateway that issues sequential payment ids and never has a QR ready.
#[derive(Default)]
pub struct TestGateway {
    next_payment: AtomicU32,
    paid: Mutex<Vec<String>>,
}

impl TestGateway {
    pub fn mark_paid(&self, payment_id: &str) {
        self.paid.lock().unwrap().push(payment_id.to_string());
    }
}

#[async_trait]
impl PaymentGateway for TestGateway {
    async fn find_customer(&self, _email: &str, _tax_id: &str) -> Result<Option<Customer>, GatewayError> {
        Ok(None)
    }

    async fn create_customer(&self, customer: &NewCustomer) -> Result<Customer, GatewayError> {
        Ok(Customer {
            id: "cus_test".to_string(),
            name: customer.name.clone(),
            email: Some(customer.email.clone()),
        })
    }

    async fn create_pix_charge(
        &self,
        _customer_id: &str,
        _amount_cents: i64,
        _description: &str,
        _due_date: NaiveDate,
    ) -> Result<PixCharge, GatewayError> {
        let n = self.next_payment.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(PixCharge {
            id: format!("pay_{:04}", n),
            status: "PENDING".to_string(),
            due_date: None,
        })
    }

    async fn pix_qr_code(&self, _payment_id: &str) -> Result<Option<PixQrCode>, GatewayError> {
        Ok(None)
    }

    async fn payment_status(&self, payment_id: &str) -> Result<PaymentStatus, GatewayError> {
        if self.paid.lock().unwrap().iter().any(|p| p == payment_id) {
            Ok(PaymentStatus::Confirmed)
        } else {
            Ok(PaymentStatus::Pending)
        }
    }
}

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub gateway: Arc<TestGateway>,
    pub mailer: Arc<MemoryMailer>,
    _dir: TempDir,
}

pub fn test_app() -> TestApp {
    test_app_with(|_| {})
}

pub fn test_app_with(configure: impl FnOnce(&mut AppConfig)) -> TestApp {
    let dir = TempDir::new().unwrap();

    let mut config = AppConfig::default();
    config.data_dir = dir.path().to_path_buf();
    config.auth.session_secret = "integration-secret".to_string();
    config.auth.password_iterations = 1_000;
    config.billing.webhook_token = Some(WEBHOOK_TOKEN.to_string());
    config.billing.qr_poll_attempts = 1;
    config.billing.qr_poll_delay_ms = 0;
    config.billing.pix_key = "pix@fitcoach.test".to_string();
    configure(&mut config);

    let db = Database::open(&config.database_path()).unwrap();
    let gateway = Arc::new(TestGateway::default());
    let mailer = Arc::new(MemoryMailer::new());
    let state = AppState::new(config, db, gateway.clone(), mailer.clone()).unwrap();

    TestApp {
        router: build_router(state.clone()),
        state,
        gateway,
        mailer,
        _dir: dir,
    }
}

impl TestApp {
    /// Send a request and decode the JSON body (`Value::Null` when empty).
    pub async fn call(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        self.send(request).await
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, value)
    }

    /// Sign up and return `(token, user id)`.
    pub async fn sign_up(&self, email: &str) -> (String, String) {
        self.sign_up_with(json!({
            "email": email,
            "password": "secret123",
            "full_name": "Ana Souza",
        }))
        .await
    }

    pub async fn sign_up_with(&self, body: Value) -> (String, String) {
        let (status, session) = self
            .call(Method::POST, "/v1/auth/signup", None, Some(body))
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", session);
        (
            session["token"].as_str().unwrap().to_string(),
            session["user"]["id"].as_str().unwrap().to_string(),
        )
    }
}
