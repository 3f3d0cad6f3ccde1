//! Payment gateway abstraction and the Asaas REST client.

use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::types::GatewayError;
use crate::storage::config::BillingSettings;

/// A gateway customer.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Customer {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// Data for creating a customer.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCustomer {
    pub name: String,
    pub email: String,
    pub cpf_cnpj: String,
}

/// A created PIX charge.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PixCharge {
    pub id: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub due_date: Option<String>,
}

/// QR code data for a charge.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PixQrCode {
    /// Base64 PNG
    pub encoded_image: String,
    /// Copy-and-paste payload
    pub payload: String,
    #[serde(default)]
    pub expiration_date: Option<String>,
}

/// Gateway-side payment status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentStatus {
    Pending,
    Received,
    Confirmed,
    ReceivedInCash,
    Overdue,
    Refunded,
    Other(String),
}

impl PaymentStatus {
    pub fn parse(s: &str) -> Self {
        match s {
            "PENDING" => PaymentStatus::Pending,
            "RECEIVED" => PaymentStatus::Received,
            "CONFIRMED" => PaymentStatus::Confirmed,
            "RECEIVED_IN_CASH" => PaymentStatus::ReceivedInCash,
            "OVERDUE" => PaymentStatus::Overdue,
            "REFUNDED" => PaymentStatus::Refunded,
            other => PaymentStatus::Other(other.to_string()),
        }
    }

    /// Whether the money has arrived.
    pub fn is_paid(&self) -> bool {
        matches!(
            self,
            PaymentStatus::Received | PaymentStatus::Confirmed | PaymentStatus::ReceivedInCash
        )
    }
}

/// Operations the subscription flow needs from a payment provider.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn find_customer(&self, email: &str, tax_id: &str) -> Result<Option<Customer>, GatewayError>;

    async fn create_customer(&self, customer: &NewCustomer) -> Result<Customer, GatewayError>;

    async fn create_pix_charge(
        &self,
        customer_id: &str,
        amount_cents: i64,
        description: &str,
        due_date: NaiveDate,
    ) -> Result<PixCharge, GatewayError>;

    /// `Ok(None)` while the gateway has not produced the QR yet.
    async fn pix_qr_code(&self, payment_id: &str) -> Result<Option<PixQrCode>, GatewayError>;

    async fn payment_status(&self, payment_id: &str) -> Result<PaymentStatus, GatewayError>;
}

/// Asaas v3 REST client.
pub struct AsaasGateway {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ListResponse<T> {
    #[serde(default = "Vec::new")]
    data: Vec<T>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ChargeRequest<'a> {
    customer: &'a str,
    billing_type: &'static str,
    value: f64,
    due_date: String,
    description: &'a str,
}

#[derive(Debug, Deserialize)]
struct PaymentResponse {
    status: String,
}

impl AsaasGateway {
    pub fn from_settings(settings: &BillingSettings) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            http,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            api_key: settings.api_key.clone().filter(|k| !k.trim().is_empty()),
        })
    }

    fn request(&self, method: reqwest::Method, path: &str) -> Result<reqwest::RequestBuilder, GatewayError> {
        let api_key = self.api_key.as_deref().ok_or(GatewayError::NotConfigured)?;
        Ok(self
            .http
            .request(method, format!("{}{}", self.base_url, path))
            .header("access_token", api_key))
    }

    async fn send<T: serde::de::DeserializeOwned>(
        &self,
        builder: reqwest::RequestBuilder,
    ) -> Result<T, GatewayError> {
        let response = builder
            .send()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(GatewayError::Api {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json()
            .await
            .map_err(|e| GatewayError::Decode(e.to_string()))
    }
}

#[async_trait]
impl PaymentGateway for AsaasGateway {
    async fn find_customer(&self, email: &str, tax_id: &str) -> Result<Option<Customer>, GatewayError> {
        let builder = self
            .request(reqwest::Method::GET, "/customers")?
            .query(&[("email", email), ("cpfCnpj", tax_id)]);
        let list: ListResponse<Customer> = self.send(builder).await?;
        Ok(list.data.into_iter().next())
    }

    async fn create_customer(&self, customer: &NewCustomer) -> Result<Customer, GatewayError> {
        let builder = self.request(reqwest::Method::POST, "/customers")?.json(customer);
        self.send(builder).await
    }

    async fn create_pix_charge(
        &self,
        customer_id: &str,
        amount_cents: i64,
        description: &str,
        due_date: NaiveDate,
    ) -> Result<PixCharge, GatewayError> {
        let body = ChargeRequest {
            customer: customer_id,
            billing_type: "PIX",
            value: amount_cents as f64 / 100.0,
            due_date: due_date.format("%Y-%m-%d").to_string(),
            description,
        };
        let builder = self.request(reqwest::Method::POST, "/payments")?.json(&body);
        self.send(builder).await
    }

    async fn pix_qr_code(&self, payment_id: &str) -> Result<Option<PixQrCode>, GatewayError> {
        let builder = self.request(
            reqwest::Method::GET,
            &format!("/payments/{}/pixQrCode", payment_id),
        )?;
        let qr: PixQrCode = self.send(builder).await?;
        if qr.payload.is_empty() || qr.encoded_image.is_empty() {
            return Ok(None);
        }
        Ok(Some(qr))
    }

    async fn payment_status(&self, payment_id: &str) -> Result<PaymentStatus, GatewayError> {
        let builder = self.request(reqwest::Method::GET, &format!("/payments/{}", payment_id))?;
        let payment: PaymentResponse = self.send(builder).await?;
        Ok(PaymentStatus::parse(&payment.status))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    use axum::{
        extract::{Path, Query},
        http::{HeaderMap, StatusCode},
        routing::{get, post},
        Json, Router,
    };
    use serde_json::{json, Value};

    async fn spawn_stub() -> String {
        fn authorized(headers: &HeaderMap) -> bool {
            headers.get("access_token").and_then(|v| v.to_str().ok()) == Some("test-key")
        }

        let app = Router::new()
            .route(
                "/customers",
                get(|headers: HeaderMap, Query(q): Query<HashMap<String, String>>| async move {
                    if !authorized(&headers) {
                        return (StatusCode::UNAUTHORIZED, Json(json!({})));
                    }
                    let data = if q.get("email").map(String::as_str) == Some("known@test.dev") {
                        json!([{"id": "cus_1", "name": "Known", "email": "known@test.dev"}])
                    } else {
                        json!([])
                    };
                    (StatusCode::OK, Json(json!({ "data": data })))
                })
                .post(|Json(body): Json<Value>| async move {
                    Json(json!({"id": "cus_new", "name": body["name"], "email": body["email"]}))
                }),
            )
            .route(
                "/payments",
                post(|Json(body): Json<Value>| async move {
                    assert_eq!(body["billingType"], "PIX");
                    assert_eq!(body["value"], 29.9);
                    Json(json!({"id": "pay_1", "status": "PENDING", "dueDate": body["dueDate"]}))
                }),
            )
            .route(
                "/payments/:id",
                get(|Path(id): Path<String>| async move {
                    let status = if id == "pay_paid" { "CONFIRMED" } else { "PENDING" };
                    Json(json!({"id": id, "status": status}))
                }),
            )
            .route(
                "/payments/:id/pixQrCode",
                get(|| async { Json(json!({"encodedImage": "iVBORw0KGgo=", "payload": "000201abc", "expirationDate": "2026-12-01 23:59:59"})) }),
            );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn gateway(base_url: &str, api_key: Option<&str>) -> AsaasGateway {
        AsaasGateway::from_settings(&BillingSettings {
            base_url: base_url.to_string(),
            api_key: api_key.map(str::to_string),
            ..BillingSettings::default()
        })
        .unwrap()
    }

    #[test]
    fn test_payment_status_parse() {
        assert!(PaymentStatus::parse("RECEIVED").is_paid());
        assert!(PaymentStatus::parse("CONFIRMED").is_paid());
        assert!(PaymentStatus::parse("RECEIVED_IN_CASH").is_paid());
        assert!(!PaymentStatus::parse("PENDING").is_paid());
        assert_eq!(
            PaymentStatus::parse("CHARGEBACK_REQUESTED"),
            PaymentStatus::Other("CHARGEBACK_REQUESTED".to_string())
        );
    }

    #[tokio::test]
    async fn test_not_configured() {
        let gw = gateway("http://127.0.0.1:9", None);
        assert!(matches!(
            gw.payment_status("pay_1").await,
            Err(GatewayError::NotConfigured)
        ));
    }

    #[tokio::test]
    async fn test_customer_lookup_and_creation() {
        let url = spawn_stub().await;
        let gw = gateway(&url, Some("test-key"));

        let known = gw.find_customer("known@test.dev", "12345678909").await.unwrap();
        assert_eq!(known.unwrap().id, "cus_1");
        assert!(gw.find_customer("new@test.dev", "12345678909").await.unwrap().is_none());

        let created = gw
            .create_customer(&NewCustomer {
                name: "Nova".to_string(),
                email: "new@test.dev".to_string(),
                cpf_cnpj: "12345678909".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(created.id, "cus_new");
    }

    #[tokio::test]
    async fn test_wrong_key_is_api_error() {
        let url = spawn_stub().await;
        let gw = gateway(&url, Some("wrong"));

        assert!(matches!(
            gw.find_customer("known@test.dev", "1").await,
            Err(GatewayError::Api { status: 401, .. })
        ));
    }

    #[tokio::test]
    async fn test_charge_qr_and_status() {
        let url = spawn_stub().await;
        let gw = gateway(&url, Some("test-key"));

        let due = NaiveDate::from_ymd_opt(2026, 6, 2).unwrap();
        let charge = gw.create_pix_charge("cus_1", 2990, "FitCoach Premium", due).await.unwrap();
        assert_eq!(charge.id, "pay_1");
        assert_eq!(charge.due_date.as_deref(), Some("2026-06-02"));

        let qr = gw.pix_qr_code("pay_1").await.unwrap().unwrap();
        assert_eq!(qr.payload, "000201abc");

        assert_eq!(gw.payment_status("pay_1").await.unwrap(), PaymentStatus::Pending);
        assert!(gw.payment_status("pay_paid").await.unwrap().is_paid());
    }
}
