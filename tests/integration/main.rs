//! Integration tests driving the full HTTP router.

mod api_flow;
mod billing_webhook;
mod common;
