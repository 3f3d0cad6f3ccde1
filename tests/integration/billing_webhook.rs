//! Checkout, webhook activation and referral commissions over HTTP.

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use chrono::{DateTime, Utc};
use serde_json::{json, Value};

use crate::common::{test_app, TestApp, WEBHOOK_TOKEN};

async fn checkout(app: &TestApp, token: &str) -> Value {
    let (status, result) = app
        .call(
            Method::POST,
            "/v1/billing/checkout",
            Some(token),
            Some(json!({
                "full_name": "Maria Silva",
                "email": "maria@example.com",
                "tax_id": "123.456.789-09",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", result);
    result
}

async fn webhook(app: &TestApp, token: Option<&str>, event: &str, payment_id: &str) -> (StatusCode, Value) {
    let mut builder = Request::builder()
        .method(Method::POST)
        .uri("/v1/billing/webhook")
        .header("content-type", "application/json");
    if let Some(token) = token {
        builder = builder.header("asaas-access-token", token);
    }
    let body = json!({ "event": event, "payment": { "id": payment_id, "status": "RECEIVED" } });
    app.send(builder.body(Body::from(body.to_string())).unwrap()).await
}

#[tokio::test]
async fn test_checkout_falls_back_to_local_pix() {
    let app = test_app();
    let (token, _) = app.sign_up("maria@example.com").await;

    let result = checkout(&app, &token).await;
    assert_eq!(result["payment_id"], "pay_0001");
    assert_eq!(result["fallback"], true);
    assert_eq!(result["amount_cents"], 2990);
    assert!(result["pix_payload"].as_str().unwrap().starts_with("000201"));
    assert!(result["qr_code_image"]
        .as_str()
        .unwrap()
        .starts_with("data:image/svg+xml;base64,"));

    let (_, subscription) = app
        .call(Method::GET, "/v1/billing/subscription", Some(&token), None)
        .await;
    assert_eq!(subscription["status"], "pending");
}

#[tokio::test]
async fn test_checkout_rejects_invalid_tax_id() {
    let app = test_app();
    let (token, _) = app.sign_up("bad@example.com").await;

    let (status, body) = app
        .call(
            Method::POST,
            "/v1/billing/checkout",
            Some(&token),
            Some(json!({ "full_name": "Maria", "email": "bad@example.com", "tax_id": "12345" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "validation_error");
}

#[tokio::test]
async fn test_webhook_activates_once() {
    let app = test_app();
    let (token, _) = app.sign_up("maria@example.com").await;
    let payment_id = checkout(&app, &token).await["payment_id"]
        .as_str()
        .unwrap()
        .to_string();

    let (status, body) = webhook(&app, Some("wrong"), "PAYMENT_RECEIVED", &payment_id).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "invalid_webhook_token");

    let (status, body) = webhook(&app, Some(WEBHOOK_TOKEN), "PAYMENT_RECEIVED", &payment_id).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "activated");

    let (_, subscription) = app
        .call(Method::GET, "/v1/billing/subscription", Some(&token), None)
        .await;
    assert_eq!(subscription["status"], "active");
    let expires_at: DateTime<Utc> = subscription["expires_at"].as_str().unwrap().parse().unwrap();
    let hours = (expires_at - Utc::now()).num_hours();
    assert!(hours > 29 * 24 && hours <= 30 * 24, "expires in {} hours", hours);

    let (status, body) = webhook(&app, Some(WEBHOOK_TOKEN), "PAYMENT_CONFIRMED", &payment_id).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "already_active");

    let (_, again) = app
        .call(Method::GET, "/v1/billing/subscription", Some(&token), None)
        .await;
    assert_eq!(again["expires_at"], subscription["expires_at"]);

    let (_, notifications) = app
        .call(Method::GET, "/v1/notifications", Some(&token), None)
        .await;
    let payments: Vec<&Value> = notifications["notifications"]
        .as_array()
        .unwrap()
        .iter()
        .filter(|n| n["kind"] == "payment")
        .collect();
    assert_eq!(payments.len(), 1);

    let (_, me) = app.call(Method::GET, "/v1/me", Some(&token), None).await;
    assert_eq!(me["access"]["has_active_subscription"], true);
}

#[tokio::test]
async fn test_webhook_acknowledges_unknown_and_other_events() {
    let app = test_app();

    let (status, body) = webhook(&app, Some(WEBHOOK_TOKEN), "PAYMENT_RECEIVED", "pay_missing").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "unknown_payment");

    let (status, body) = webhook(&app, Some(WEBHOOK_TOKEN), "PAYMENT_OVERDUE", "pay_missing").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "ignored");
}

#[tokio::test]
async fn test_verify_activates_paid_charge() {
    let app = test_app();
    let (token, _) = app.sign_up("maria@example.com").await;
    let payment_id = checkout(&app, &token).await["payment_id"]
        .as_str()
        .unwrap()
        .to_string();

    let (_, pending) = app
        .call(
            Method::POST,
            "/v1/billing/verify",
            Some(&token),
            Some(json!({ "payment_id": payment_id })),
        )
        .await;
    assert_eq!(pending["status"], "pending");

    app.gateway.mark_paid(&payment_id);
    let (status, active) = app
        .call(
            Method::POST,
            "/v1/billing/verify",
            Some(&token),
            Some(json!({ "payment_id": payment_id })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(active["status"], "active");

    let (_, cancelled) = app
        .call(Method::POST, "/v1/billing/cancel", Some(&token), None)
        .await;
    assert_eq!(cancelled["status"], "cancelled");
}

#[tokio::test]
async fn test_verify_rejects_other_users_payment() {
    let app = test_app();
    let (owner, _) = app.sign_up("owner@example.com").await;
    let (other, _) = app.sign_up("other@example.com").await;
    let payment_id = checkout(&app, &owner).await["payment_id"]
        .as_str()
        .unwrap()
        .to_string();

    let (status, _) = app
        .call(
            Method::POST,
            "/v1/billing/verify",
            Some(&other),
            Some(json!({ "payment_id": payment_id })),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_paid_referral_earns_commission() {
    let app = test_app();
    let (promoter, _) = app.sign_up("promoter@example.com").await;
    let (_, affiliate) = app
        .call(Method::POST, "/v1/affiliate/join", Some(&promoter), None)
        .await;

    let (friend, _) = app
        .sign_up_with(json!({
            "email": "friend@example.com",
            "password": "secret123",
            "full_name": "Bruno Lima",
            "referral_code": affiliate["code"],
        }))
        .await;
    let payment_id = checkout(&app, &friend).await["payment_id"]
        .as_str()
        .unwrap()
        .to_string();

    webhook(&app, Some(WEBHOOK_TOKEN), "PAYMENT_RECEIVED", &payment_id).await;
    webhook(&app, Some(WEBHOOK_TOKEN), "PAYMENT_RECEIVED", &payment_id).await;

    let (_, dashboard) = app.call(Method::GET, "/v1/affiliate", Some(&promoter), None).await;
    assert_eq!(dashboard["converted_referrals"], 1);
    assert_eq!(dashboard["commissions"].as_array().unwrap().len(), 1);
    assert_eq!(dashboard["commissions"][0]["amount_cents"], 897);
    assert_eq!(dashboard["total_earnings_cents"], 897);
}

#[tokio::test]
async fn test_cancel_without_subscription_is_not_found() {
    let app = test_app();
    let (token, _) = app.sign_up("nosub@example.com").await;

    let (status, _) = app
        .call(Method::POST, "/v1/billing/cancel", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, subscription) = app
        .call(Method::GET, "/v1/billing/subscription", Some(&token), None)
        .await;
    assert!(subscription.is_null());
}
