//! End-to-end account, coaching and community flows.

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use serde_json::json;

use crate::common::{test_app, test_app_with};

#[tokio::test]
async fn test_health_and_marketing() {
    let app = test_app_with(|c| c.billing.monthly_price_cents = 3990);

    let (status, body) = app.call(Method::GET, "/healthz", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");

    let (status, page) = app.call(Method::GET, "/v1/marketing", None, None).await;
    assert_eq!(status, StatusCode::OK);
    let premium = page["pricing"]
        .as_array()
        .unwrap()
        .iter()
        .find(|p| p["id"] == "premium_monthly")
        .unwrap()
        .clone();
    assert_eq!(premium["price_label"], "R$ 39,90");
}

#[tokio::test]
async fn test_signup_login_and_access() {
    let app = test_app();
    let (token, _) = app.sign_up("Ana@Example.com").await;

    let (status, me) = app.call(Method::GET, "/v1/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["user"]["email"], "ana@example.com");
    assert_eq!(me["access"]["is_trial_active"], true);
    assert_eq!(me["access"]["has_premium_access"], true);
    assert_eq!(me["access"]["has_active_subscription"], false);

    let (status, _) = app
        .call(
            Method::POST,
            "/v1/auth/login",
            None,
            Some(json!({ "email": "ana@example.com", "password": "secret123" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app
        .call(
            Method::POST,
            "/v1/auth/login",
            None,
            Some(json!({ "email": "ana@example.com", "password": "wrong-pass" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "invalid_credentials");

    let (status, body) = app
        .call(
            Method::POST,
            "/v1/auth/signup",
            None,
            Some(json!({ "email": "ana@example.com", "password": "secret123", "full_name": "Outra" })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "email_taken");
}

#[tokio::test]
async fn test_user_routes_require_token() {
    let app = test_app();

    let (status, body) = app.call(Method::GET, "/v1/me", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "unauthorized");

    let (status, _) = app.call(Method::GET, "/v1/stats", Some("not.a-token"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_password_reset_flow() {
    let app = test_app();
    app.sign_up("reset@example.com").await;

    let (status, _) = app
        .call(
            Method::POST,
            "/v1/auth/reset-password",
            None,
            Some(json!({ "email": "reset@example.com" })),
        )
        .await;
    assert_eq!(status, StatusCode::ACCEPTED);

    let sent = app.mailer.sent();
    assert_eq!(sent.len(), 1);
    let token = sent[0].body.split("token=").nth(1).unwrap().trim().to_string();

    let (status, _) = app
        .call(
            Method::POST,
            "/v1/auth/reset-password/confirm",
            None,
            Some(json!({ "token": token, "new_password": "brand-new" })),
        )
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = app
        .call(
            Method::POST,
            "/v1/auth/login",
            None,
            Some(json!({ "email": "reset@example.com", "password": "brand-new" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    // Unknown emails look the same from outside.
    let (status, _) = app
        .call(
            Method::POST,
            "/v1/auth/reset-password",
            None,
            Some(json!({ "email": "nobody@example.com" })),
        )
        .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(app.mailer.sent().len(), 1);
}

#[tokio::test]
async fn test_workout_updates_gamification_and_onboarding() {
    let app = test_app();
    let (token, _) = app.sign_up("runner@example.com").await;

    let (status, outcome) = app
        .call(
            Method::POST,
            "/v1/workouts",
            Some(&token),
            Some(json!({ "title": "Corrida leve", "duration_minutes": 30 })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(outcome["gamification"]["xp_gained"], 50);
    assert_eq!(outcome["gamification"]["profile"]["current_streak"], 1);
    assert_eq!(
        outcome["gamification"]["new_achievements"][0]["key"],
        "first_workout"
    );

    let (_, stats) = app.call(Method::GET, "/v1/stats", Some(&token), None).await;
    assert_eq!(stats["total_workouts"], 1);
    assert_eq!(stats["total_minutes"], 30);
    assert_eq!(stats["xp"], 50);

    let (_, notifications) = app
        .call(Method::GET, "/v1/notifications", Some(&token), None)
        .await;
    assert_eq!(notifications["unread_count"], 1);
    assert_eq!(notifications["notifications"][0]["kind"], "achievement");

    let (_, checklist) = app.call(Method::GET, "/v1/onboarding", Some(&token), None).await;
    assert_eq!(checklist["progress_percent"], 25);

    let (status, _) = app
        .call(
            Method::POST,
            "/v1/workouts",
            Some(&token),
            Some(json!({ "title": "", "duration_minutes": 30 })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_notifications_read_and_delete() {
    let app = test_app();
    let (token, _) = app.sign_up("bell@example.com").await;
    app.call(
        Method::POST,
        "/v1/workouts",
        Some(&token),
        Some(json!({ "title": "Yoga", "duration_minutes": 20 })),
    )
    .await;

    let (_, list) = app.call(Method::GET, "/v1/notifications", Some(&token), None).await;
    let id = list["notifications"][0]["id"].as_str().unwrap().to_string();

    let uri = format!("/v1/notifications/{}/read", id);
    let (status, _) = app.call(Method::POST, &uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, list) = app
        .call(Method::GET, "/v1/notifications?unread_only=true", Some(&token), None)
        .await;
    assert_eq!(list["notifications"].as_array().unwrap().len(), 0);

    let uri = format!("/v1/notifications/{}", id);
    let (status, _) = app.call(Method::DELETE, &uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = app.call(Method::DELETE, &uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_assistant_falls_back_without_key() {
    let app = test_app();
    let (token, _) = app.sign_up("chat@example.com").await;

    let (status, reply) = app
        .call(
            Method::POST,
            "/v1/assistants/workout/messages",
            Some(&token),
            Some(json!({ "message": "Monte um treino de 20 minutos" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(reply["source"], "fallback");

    let (_, history) = app
        .call(Method::GET, "/v1/assistants/workout/messages", Some(&token), None)
        .await;
    assert_eq!(history.as_array().unwrap().len(), 2);

    let (_, nutrition) = app
        .call(Method::GET, "/v1/assistants/nutrition/messages", Some(&token), None)
        .await;
    assert!(nutrition.as_array().unwrap().is_empty());

    let (_, cleared) = app
        .call(Method::DELETE, "/v1/assistants/workout/messages", Some(&token), None)
        .await;
    assert_eq!(cleared["deleted"], 2);

    let (status, _) = app
        .call(Method::GET, "/v1/assistants/yoga/messages", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_assistant_requires_premium_after_trial() {
    let app = test_app_with(|c| c.auth.trial_hours = 0);
    let (token, _) = app.sign_up("expired@example.com").await;

    let (status, body) = app
        .call(
            Method::POST,
            "/v1/assistants/nutrition/messages",
            Some(&token),
            Some(json!({ "message": "O que comer antes do treino?" })),
        )
        .await;
    assert_eq!(status, StatusCode::PAYMENT_REQUIRED);
    assert_eq!(body["error"]["code"], "premium_required");
}

#[tokio::test]
async fn test_forum_flow() {
    let app = test_app();
    let (author, _) = app.sign_up("author@example.com").await;
    let (reader, _) = app.sign_up("reader@example.com").await;

    let (status, post) = app
        .call(
            Method::POST,
            "/v1/forum/posts",
            Some(&author),
            Some(json!({ "category": "motivation", "title": "Primeira semana", "content": "Consegui treinar 5 dias!" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let post_id = post["id"].as_str().unwrap().to_string();

    let replies_uri = format!("/v1/forum/posts/{}/replies", post_id);
    let (status, _) = app
        .call(
            Method::POST,
            &replies_uri,
            Some(&reader),
            Some(json!({ "content": "Parabéns!" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let like_uri = format!("/v1/forum/posts/{}/like", post_id);
    let (_, liked) = app.call(Method::POST, &like_uri, Some(&reader), None).await;
    assert_eq!(liked["liked"], true);

    let post_uri = format!("/v1/forum/posts/{}", post_id);
    let (_, fetched) = app.call(Method::GET, &post_uri, Some(&reader), None).await;
    assert_eq!(fetched["likes_count"], 1);
    assert_eq!(fetched["replies_count"], 1);
    assert_eq!(fetched["liked"], true);

    let (_, trending) = app.call(Method::GET, "/v1/forum/trending", Some(&reader), None).await;
    assert_eq!(trending["posts"][0]["id"], post_id.as_str());

    let (_, stats) = app.call(Method::GET, "/v1/forum/stats", Some(&reader), None).await;
    assert_eq!(stats["total_members"], 2);
    assert_eq!(stats["total_posts"], 1);
    assert_eq!(stats["total_replies"], 1);

    let (_, filtered) = app
        .call(Method::GET, "/v1/forum/posts?category=nutrition", Some(&reader), None)
        .await;
    assert!(filtered.as_array().unwrap().is_empty());
    let (status, _) = app
        .call(Method::GET, "/v1/forum/posts?category=cooking", Some(&reader), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, notifications) = app
        .call(Method::GET, "/v1/notifications", Some(&author), None)
        .await;
    assert_eq!(notifications["unread_count"], 1);

    let (status, _) = app.call(Method::DELETE, &post_uri, Some(&reader), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = app.call(Method::DELETE, &post_uri, Some(&author), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = app.call(Method::GET, &post_uri, Some(&author), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_signup_with_referral_code() {
    let app = test_app();
    let (promoter, _) = app.sign_up("promoter@example.com").await;

    let (status, affiliate) = app
        .call(Method::POST, "/v1/affiliate/join", Some(&promoter), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let code = affiliate["code"].as_str().unwrap().to_lowercase();

    app.sign_up_with(json!({
        "email": "friend@example.com",
        "password": "secret123",
        "full_name": "Bruno Lima",
        "referral_code": code,
    }))
    .await;

    let (_, dashboard) = app.call(Method::GET, "/v1/affiliate", Some(&promoter), None).await;
    assert_eq!(dashboard["total_referrals"], 1);
    assert_eq!(dashboard["pending_referrals"], 1);
    assert!(dashboard["referral_link"]
        .as_str()
        .unwrap()
        .ends_with(&format!("?ref={}", code.to_uppercase())));

    let (_, me) = app.call(Method::GET, "/v1/me", Some(&promoter), None).await;
    assert_eq!(me["access"]["is_promoter"], true);
}

#[tokio::test]
async fn test_affiliate_dashboard_requires_membership() {
    let app = test_app();
    let (token, _) = app.sign_up("plain@example.com").await;

    let (status, body) = app.call(Method::GET, "/v1/affiliate", Some(&token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "not_affiliate");
}

#[tokio::test]
async fn test_avatar_upload() {
    let app = test_app();
    let (token, _) = app.sign_up("face@example.com").await;
    let png: Vec<u8> = vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];

    let request = Request::builder()
        .method(Method::PUT)
        .uri("/v1/me/avatar")
        .header("authorization", format!("Bearer {}", token))
        .header("content-type", "image/png")
        .body(Body::from(png.clone()))
        .unwrap();
    let (status, body) = app.send(request).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["avatar_path"].as_str().unwrap().ends_with(".png"));

    let request = Request::builder()
        .method(Method::PUT)
        .uri("/v1/me/avatar")
        .header("authorization", format!("Bearer {}", token))
        .body(Body::from("not an image"))
        .unwrap();
    let (status, _) = app.send(request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, checklist) = app.call(Method::GET, "/v1/onboarding", Some(&token), None).await;
    assert_eq!(checklist["items"][0]["completed"], true);
}

#[tokio::test]
async fn test_onboarding_tour_and_tips() {
    let app = test_app();
    let (token, _) = app.sign_up("new@example.com").await;

    let (_, checklist) = app
        .call(Method::POST, "/v1/onboarding/tour", Some(&token), None)
        .await;
    assert_eq!(checklist["has_seen_tour"], true);

    let (_, checklist) = app
        .call(Method::POST, "/v1/onboarding/tips/xp-bar/dismiss", Some(&token), None)
        .await;
    assert_eq!(checklist["dismissed_tips"][0], "xp-bar");
}

#[tokio::test]
async fn test_realtime_stream_accepts_query_token() {
    use tower::ServiceExt;

    let app = test_app();
    let (token, _) = app.sign_up("live@example.com").await;

    let request = Request::builder()
        .uri(format!("/v1/realtime/notifications?access_token={}", token))
        .body(Body::empty())
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("content-type").unwrap(),
        "text/event-stream"
    );
    assert!(response.headers().contains_key("x-request-id"));

    let (status, _) = app
        .call(Method::GET, "/v1/realtime/weather", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
