//! PIX subscription billing.
//!
//! Checkout creates a charge on the payment gateway and returns its PIX
//! payload and QR image, building them locally when the gateway's QR never
//! arrives. Payment confirmation comes from the gateway webhook or an
//! explicit verify call; both go through the same idempotent activation.

pub mod gateway;
pub mod pix;
pub mod subscriptions;
pub mod types;

pub use gateway::{AsaasGateway, PaymentGateway, PaymentStatus};
pub use subscriptions::{BillingService, SubscriptionManager};
pub use types::{
    BillingError, CheckoutRequest, CheckoutResult, GatewayError, Subscription,
    SubscriptionStatus, WebhookEvent, WebhookOutcome,
};
