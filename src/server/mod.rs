//! HTTP API.
//!
//! JSON over axum; user routes take `Authorization: Bearer <token>`.
//! Handlers lock the shared database only for synchronous manager calls;
//! services that talk to external APIs release it while a request is in
//! flight.

mod account;
mod billing;
mod coach;
mod community;
pub mod error;
mod extract;
mod realtime;
mod request_tracing;

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post, put};
use axum::Router;
use chrono::Utc;
use rusqlite::Connection;
use tokio::sync::Mutex;
use tower_http::cors::{Any, CorsLayer};

use crate::assistant::{ChatService, LlmClient};
use crate::auth::{derive_access, AccessPolicy, AccessProfile, AuthManager, Mailer, SessionSigner, User};
use crate::billing::{BillingService, PaymentGateway};
use crate::realtime::RealtimeHub;
use crate::storage::{AppConfig, Database};

pub use error::ApiError;
pub use extract::AuthUser;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Mutex<Database>>,
    pub config: Arc<AppConfig>,
    pub signer: Arc<SessionSigner>,
    pub hub: Arc<RealtimeHub>,
    pub chat: ChatService,
    pub billing: BillingService,
    pub mailer: Arc<dyn Mailer>,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        db: Database,
        gateway: Arc<dyn PaymentGateway>,
        mailer: Arc<dyn Mailer>,
    ) -> Result<Self, reqwest::Error> {
        let db = Arc::new(Mutex::new(db));
        let hub = Arc::new(RealtimeHub::new());
        let signer = Arc::new(SessionSigner::new(
            &config.auth.session_secret,
            config.auth.session_ttl_hours,
        ));

        let client = LlmClient::from_settings(&config.assistant)?;
        let chat = ChatService::new(db.clone(), client, hub.clone());
        let billing = BillingService::new(
            db.clone(),
            gateway,
            hub.clone(),
            config.billing.clone(),
            config.affiliate.commission_rate,
        );

        Ok(Self {
            db,
            config: Arc::new(config),
            signer,
            hub,
            chat,
            billing,
            mailer,
        })
    }

    pub(crate) fn auth<'a>(&'a self, conn: &'a Connection) -> AuthManager<'a> {
        AuthManager::new(conn, &self.signer).with_iterations(self.config.auth.password_iterations)
    }

    pub(crate) fn access(&self, conn: &Connection, user: &User) -> Result<AccessProfile, ApiError> {
        let policy = AccessPolicy::new(&self.config.auth.admin_emails, self.config.auth.trial_hours);
        Ok(derive_access(conn, &policy, user, Utc::now())?)
    }
}

/// Build the API router.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/healthz", get(account::healthz_handler))
        .route("/v1/marketing", get(account::marketing_handler))
        .route("/v1/auth/signup", post(account::signup_handler))
        .route("/v1/auth/login", post(account::login_handler))
        .route("/v1/auth/reset-password", post(account::request_reset_handler))
        .route(
            "/v1/auth/reset-password/confirm",
            post(account::confirm_reset_handler),
        )
        .route("/v1/auth/change-password", post(account::change_password_handler))
        .route("/v1/me", get(account::me_handler))
        .route(
            "/v1/me/avatar",
            put(account::upload_avatar_handler).get(account::avatar_handler),
        )
        .route("/v1/onboarding", get(account::onboarding_handler))
        .route("/v1/onboarding/tour", post(account::onboarding_tour_handler))
        .route(
            "/v1/onboarding/tips/:id/dismiss",
            post(account::dismiss_tip_handler),
        )
        .route("/v1/notifications", get(account::notifications_handler))
        .route(
            "/v1/notifications/read-all",
            post(account::read_all_notifications_handler),
        )
        .route(
            "/v1/notifications/:id/read",
            post(account::read_notification_handler),
        )
        .route(
            "/v1/notifications/:id",
            axum::routing::delete(account::delete_notification_handler),
        )
        .route("/v1/gamification", get(coach::gamification_handler))
        .route(
            "/v1/workouts",
            post(coach::record_workout_handler).get(coach::workouts_handler),
        )
        .route("/v1/stats", get(coach::stats_handler))
        .route(
            "/v1/assistants/:kind/messages",
            post(coach::send_message_handler)
                .get(coach::history_handler)
                .delete(coach::clear_history_handler),
        )
        .route(
            "/v1/forum/posts",
            get(community::list_posts_handler).post(community::create_post_handler),
        )
        .route(
            "/v1/forum/posts/:id",
            get(community::get_post_handler).delete(community::delete_post_handler),
        )
        .route(
            "/v1/forum/posts/:id/replies",
            get(community::list_replies_handler).post(community::add_reply_handler),
        )
        .route("/v1/forum/posts/:id/like", post(community::toggle_like_handler))
        .route("/v1/forum/stats", get(community::forum_stats_handler))
        .route("/v1/forum/trending", get(community::trending_handler))
        .route("/v1/affiliate/join", post(community::join_affiliate_handler))
        .route("/v1/affiliate", get(community::affiliate_dashboard_handler))
        .route("/v1/billing/checkout", post(billing::checkout_handler))
        .route("/v1/billing/verify", post(billing::verify_handler))
        .route("/v1/billing/subscription", get(billing::subscription_handler))
        .route("/v1/billing/cancel", post(billing::cancel_handler))
        .route("/v1/billing/webhook", post(billing::webhook_handler))
        .route("/v1/realtime/:topic", get(realtime::realtime_handler))
        .layer(DefaultBodyLimit::max(state.config.server.max_body_bytes))
        .layer(axum::middleware::from_fn(
            request_tracing::request_tracing_middleware,
        ))
        .layer(cors)
        .with_state(state)
}
