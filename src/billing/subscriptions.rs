//! Subscription rows and the PIX checkout flow.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::gateway::{NewCustomer, PaymentGateway, PixQrCode};
use super::pix::{build_br_code, qr_svg_data_uri, PixParams};
use super::types::{
    Activation, BillingError, CheckoutRequest, CheckoutResult, Subscription, SubscriptionStatus,
    WebhookEvent, WebhookOutcome,
};
use crate::affiliate::AffiliateManager;
use crate::auth::password::constant_time_eq;
use crate::notifications::{NotificationKind, NotificationStore};
use crate::realtime::{RealtimeHub, Topic};
use crate::storage::config::BillingSettings;
use crate::storage::database::{parse_timestamp, parse_uuid};
use crate::storage::Database;

/// Webhook events that mean the money arrived.
pub const PAID_EVENTS: [&str; 2] = ["PAYMENT_RECEIVED", "PAYMENT_CONFIRMED"];

const SUBSCRIPTION_COLUMNS: &str = "id, user_id, payment_id, status, amount_cents, pix_payload, expires_at, created_at, updated_at";

/// Strip punctuation from a CPF/CNPJ and check its length.
pub fn normalize_tax_id(tax_id: &str) -> Result<String, BillingError> {
    let digits: String = tax_id.chars().filter(|c| c.is_ascii_digit()).collect();
    match digits.len() {
        11 | 14 => Ok(digits),
        _ => Err(BillingError::ValidationError(
            "CPF/CNPJ must have 11 or 14 digits".to_string(),
        )),
    }
}

/// Subscription rows and activation side effects.
pub struct SubscriptionManager<'a> {
    conn: &'a Connection,
    hub: Option<&'a RealtimeHub>,
    period_days: i64,
    commission_rate: f64,
}

impl<'a> SubscriptionManager<'a> {
    pub fn new(conn: &'a Connection, period_days: i64, commission_rate: f64) -> Self {
        Self {
            conn,
            hub: None,
            period_days,
            commission_rate,
        }
    }

    pub fn with_hub(mut self, hub: &'a RealtimeHub) -> Self {
        self.hub = Some(hub);
        self
    }

    /// Insert a pending subscription for a freshly created charge.
    pub fn create_pending(
        &self,
        user_id: Uuid,
        payment_id: &str,
        amount_cents: i64,
        pix_payload: &str,
    ) -> Result<Subscription, BillingError> {
        let now = Utc::now();
        let subscription = Subscription {
            id: Uuid::new_v4(),
            user_id,
            payment_id: payment_id.to_string(),
            status: SubscriptionStatus::Pending,
            amount_cents,
            pix_payload: Some(pix_payload.to_string()),
            expires_at: None,
            created_at: now,
            updated_at: now,
        };

        self.conn.execute(
            "INSERT INTO subscriptions (id, user_id, payment_id, status, amount_cents, pix_payload, expires_at, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, NULL, ?7, ?7)",
            params![
                subscription.id.to_string(),
                user_id.to_string(),
                payment_id,
                subscription.status.as_str(),
                amount_cents,
                pix_payload,
                now.to_rfc3339(),
            ],
        )?;

        Ok(subscription)
    }

    /// Find a subscription by gateway payment id.
    pub fn find_by_payment_id(&self, payment_id: &str) -> Result<Option<Subscription>, BillingError> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM subscriptions WHERE payment_id = ?1", SUBSCRIPTION_COLUMNS),
                params![payment_id],
                parse_subscription_row,
            )
            .optional()
            .map_err(BillingError::from)
    }

    /// The user's most recent subscription.
    pub fn current(&self, user_id: Uuid) -> Result<Option<Subscription>, BillingError> {
        self.conn
            .query_row(
                &format!(
                    "SELECT {} FROM subscriptions WHERE user_id = ?1
                     ORDER BY created_at DESC, rowid DESC LIMIT 1",
                    SUBSCRIPTION_COLUMNS
                ),
                params![user_id.to_string()],
                parse_subscription_row,
            )
            .optional()
            .map_err(BillingError::from)
    }

    /// Activate the subscription paid by `payment_id`.
    ///
    /// Idempotent: an already active row is returned unchanged and no side
    /// effects are repeated. The status change, the payment notification and
    /// the referral commission commit together or not at all.
    pub fn activate(&self, payment_id: &str, now: DateTime<Utc>) -> Result<Option<Activation>, BillingError> {
        let Some(existing) = self.find_by_payment_id(payment_id)? else {
            return Ok(None);
        };

        let tx = self.conn.unchecked_transaction()?;
        let expires_at = now + Duration::days(self.period_days);
        let changed = tx.execute(
            "UPDATE subscriptions SET status = 'active', expires_at = ?1, updated_at = ?2
             WHERE payment_id = ?3 AND status != 'active'",
            params![expires_at.to_rfc3339(), now.to_rfc3339(), payment_id],
        )?;
        if changed == 0 {
            return Ok(Some(Activation::AlreadyActive(existing)));
        }

        let subscription = self
            .find_by_payment_id(payment_id)?
            .ok_or(BillingError::NotFound)?;

        let notification = NotificationStore::new(&tx).create(
            subscription.user_id,
            "Pagamento confirmado",
            &format!(
                "Sua assinatura Premium está ativa até {}.",
                expires_at.format("%d/%m/%Y")
            ),
            NotificationKind::Payment,
        )?;

        AffiliateManager::new(&tx, self.commission_rate).convert_within(
            subscription.user_id,
            subscription.id,
            subscription.amount_cents,
        )?;
        tx.commit()?;

        tracing::info!(
            user_id = %subscription.user_id,
            %payment_id,
            expires_at = %expires_at,
            "Subscription activated"
        );

        if let Some(hub) = self.hub {
            if let Err(e) = NotificationStore::new(self.conn).with_hub(hub).announce(&notification) {
                tracing::warn!(user_id = %subscription.user_id, "Failed to announce payment notification: {}", e);
            }
        }
        self.publish(&subscription);
        Ok(Some(Activation::Activated(subscription)))
    }

    /// Cancel the user's subscription. Access ends immediately.
    pub fn cancel(&self, user_id: Uuid) -> Result<Subscription, BillingError> {
        let current = self.current(user_id)?.ok_or(BillingError::NotFound)?;
        self.conn.execute(
            "UPDATE subscriptions SET status = 'cancelled', updated_at = ?1 WHERE id = ?2",
            params![Utc::now().to_rfc3339(), current.id.to_string()],
        )?;
        tracing::info!(%user_id, subscription_id = %current.id, "Subscription cancelled");

        let cancelled = self.current(user_id)?.ok_or(BillingError::NotFound)?;
        self.publish(&cancelled);
        Ok(cancelled)
    }

    fn publish(&self, subscription: &Subscription) {
        if let Some(hub) = self.hub {
            match serde_json::to_value(subscription) {
                Ok(payload) => hub.publish(subscription.user_id, Topic::Subscription, payload),
                Err(e) => tracing::warn!("Failed to serialize subscription event: {}", e),
            }
        }
    }
}

fn parse_subscription_row(row: &rusqlite::Row) -> rusqlite::Result<Subscription> {
    let id: String = row.get(0)?;
    let user_id: String = row.get(1)?;
    let status: String = row.get(3)?;
    let expires_at: Option<String> = row.get(6)?;
    let created_at: String = row.get(7)?;
    let updated_at: String = row.get(8)?;

    Ok(Subscription {
        id: parse_uuid(0, &id)?,
        user_id: parse_uuid(1, &user_id)?,
        payment_id: row.get(2)?,
        status: SubscriptionStatus::from_str(&status).unwrap_or(SubscriptionStatus::Pending),
        amount_cents: row.get(4)?,
        pix_payload: row.get(5)?,
        expires_at: expires_at.map(|e| parse_timestamp(6, &e)).transpose()?,
        created_at: parse_timestamp(7, &created_at)?,
        updated_at: parse_timestamp(8, &updated_at)?,
    })
}

/// Checkout, verification and webhook handling.
///
/// Gateway calls run without the database lock held.
#[derive(Clone)]
pub struct BillingService {
    db: Arc<Mutex<Database>>,
    gateway: Arc<dyn PaymentGateway>,
    hub: Arc<RealtimeHub>,
    settings: BillingSettings,
    commission_rate: f64,
}

impl BillingService {
    pub fn new(
        db: Arc<Mutex<Database>>,
        gateway: Arc<dyn PaymentGateway>,
        hub: Arc<RealtimeHub>,
        settings: BillingSettings,
        commission_rate: f64,
    ) -> Self {
        Self {
            db,
            gateway,
            hub,
            settings,
            commission_rate,
        }
    }

    fn manager<'a>(&'a self, conn: &'a Connection) -> SubscriptionManager<'a> {
        SubscriptionManager::new(conn, self.settings.period_days, self.commission_rate)
            .with_hub(&self.hub)
    }

    /// Create a PIX charge for one paid period.
    pub async fn checkout(&self, user_id: Uuid, request: &CheckoutRequest) -> Result<CheckoutResult, BillingError> {
        let name = request.full_name.trim();
        let email = request.email.trim().to_lowercase();
        if name.is_empty() {
            return Err(BillingError::ValidationError("Name is required".to_string()));
        }
        if !email.contains('@') {
            return Err(BillingError::ValidationError("Invalid email".to_string()));
        }
        let tax_id = normalize_tax_id(&request.tax_id)?;

        let customer = match self.gateway.find_customer(&email, &tax_id).await? {
            Some(customer) => customer,
            None => {
                self.gateway
                    .create_customer(&NewCustomer {
                        name: name.to_string(),
                        email: email.clone(),
                        cpf_cnpj: tax_id,
                    })
                    .await?
            }
        };

        let amount_cents = self.settings.monthly_price_cents;
        let due_date = Utc::now().date_naive() + Duration::days(1);
        let charge = self
            .gateway
            .create_pix_charge(&customer.id, amount_cents, "FitCoach Premium - mensal", due_date)
            .await?;
        tracing::info!(%user_id, payment_id = %charge.id, "PIX charge created");

        let (pix_payload, qr_code_image, expires_at, fallback) = match self.poll_qr_code(&charge.id).await {
            Some(qr) => (
                qr.payload,
                format!("data:image/png;base64,{}", qr.encoded_image),
                qr.expiration_date,
                false,
            ),
            None => {
                tracing::warn!(payment_id = %charge.id, "Gateway QR code unavailable, building locally");
                let payload = build_br_code(&PixParams {
                    key: &self.settings.pix_key,
                    merchant_name: &self.settings.merchant_name,
                    merchant_city: &self.settings.merchant_city,
                    amount_cents,
                    txid: &charge.id,
                });
                let image = qr_svg_data_uri(&payload)?;
                (payload, image, None, true)
            }
        };

        let subscription = {
            let db = self.db.lock().await;
            self.manager(db.connection())
                .create_pending(user_id, &charge.id, amount_cents, &pix_payload)?
        };

        Ok(CheckoutResult {
            subscription_id: subscription.id,
            payment_id: charge.id,
            pix_payload,
            qr_code_image,
            fallback,
            expires_at,
            amount_cents,
        })
    }

    /// Fetch the QR, retrying with a fixed delay while it is not ready.
    async fn poll_qr_code(&self, payment_id: &str) -> Option<PixQrCode> {
        let attempts = self.settings.qr_poll_attempts.max(1);
        for attempt in 1..=attempts {
            match self.gateway.pix_qr_code(payment_id).await {
                Ok(Some(qr)) => return Some(qr),
                Ok(None) => tracing::debug!(attempt, "QR code not ready"),
                Err(e) => tracing::debug!(attempt, "QR code fetch failed: {}", e),
            }
            if attempt < attempts {
                tokio::time::sleep(StdDuration::from_millis(self.settings.qr_poll_delay_ms)).await;
            }
        }
        None
    }

    /// Ask the gateway whether a charge was paid and activate if so.
    pub async fn verify(&self, user_id: Uuid, payment_id: &str) -> Result<Subscription, BillingError> {
        {
            let db = self.db.lock().await;
            let subscription = self
                .manager(db.connection())
                .find_by_payment_id(payment_id)?
                .filter(|s| s.user_id == user_id)
                .ok_or(BillingError::NotFound)?;
            if subscription.status == SubscriptionStatus::Active {
                return Ok(subscription);
            }
        }

        let status = self.gateway.payment_status(payment_id).await?;

        let db = self.db.lock().await;
        let manager = self.manager(db.connection());
        if status.is_paid() {
            if let Some(activation) = manager.activate(payment_id, Utc::now())? {
                return Ok(activation.subscription().clone());
            }
        }
        manager
            .find_by_payment_id(payment_id)?
            .ok_or(BillingError::NotFound)
    }

    /// Handle a gateway webhook. `token` is the `asaas-access-token` header.
    pub async fn handle_webhook(&self, token: Option<&str>, event: &WebhookEvent) -> Result<WebhookOutcome, BillingError> {
        if let Some(expected) = self.settings.webhook_token.as_deref().filter(|t| !t.is_empty()) {
            let given = token.unwrap_or_default();
            if !constant_time_eq(given.as_bytes(), expected.as_bytes()) {
                tracing::warn!(event = %event.event, "Webhook rejected: bad token");
                return Err(BillingError::InvalidWebhookToken);
            }
        }

        if !PAID_EVENTS.contains(&event.event.as_str()) {
            tracing::debug!(event = %event.event, "Webhook ignored");
            return Ok(WebhookOutcome::Ignored);
        }
        let Some(payment) = event.payment.as_ref() else {
            return Ok(WebhookOutcome::Ignored);
        };

        let db = self.db.lock().await;
        match self.manager(db.connection()).activate(&payment.id, Utc::now())? {
            Some(Activation::Activated(_)) => Ok(WebhookOutcome::Activated),
            Some(Activation::AlreadyActive(_)) => Ok(WebhookOutcome::AlreadyActive),
            None => {
                tracing::warn!(payment_id = %payment.id, "Webhook for unknown payment");
                Ok(WebhookOutcome::UnknownPayment)
            }
        }
    }

    /// The user's most recent subscription.
    pub async fn current(&self, user_id: Uuid) -> Result<Option<Subscription>, BillingError> {
        let db = self.db.lock().await;
        self.manager(db.connection()).current(user_id)
    }

    /// Cancel the user's subscription.
    pub async fn cancel(&self, user_id: Uuid) -> Result<Subscription, BillingError> {
        let db = self.db.lock().await;
        self.manager(db.connection()).cancel(user_id)
    }
}
