//! FitCoach - Fitness Coaching Backend
//!
//! A self-hosted backend for a fitness coaching product: accounts with a free
//! trial, AI workout and nutrition assistants, gamified workout tracking, a
//! community forum, an affiliate program and PIX subscription billing.

pub mod affiliate;
pub mod assistant;
pub mod auth;
pub mod billing;
pub mod forum;
pub mod gamification;
pub mod marketing;
pub mod notifications;
pub mod onboarding;
pub mod realtime;
pub mod server;
pub mod storage;

// Re-export commonly used types
pub use auth::AuthManager;
pub use billing::{AsaasGateway, BillingService};
pub use gamification::GamificationManager;
pub use realtime::RealtimeHub;
pub use server::{build_router, AppState};
pub use storage::config::AppConfig;
pub use storage::Database;
