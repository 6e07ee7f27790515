//! # Payment Processing
//!
//! Creates payment intents with the external processor, records them locally, and
//! reconciles local payment status against the processor's answer.
//!
//! ## Implementations
//!
//! - [`StripeProcessor`] - Production implementation speaking the Stripe REST API
//! - [`LogPaymentProcessor`] - Development implementation that logs calls and keeps
//!   intents in memory
//!
//! ## Reconciliation
//!
//! | Processor status | Local status |
//! |------------------|--------------|
//! | `succeeded` | `succeeded` |
//! | `canceled` | `cancelled` |
//! | `processing`, `requires_payment_method`, `requires_confirmation` | `pending` |
//! | anything else | `failed` |
//!
//! A rental payment that reconciles to `succeeded` moves the rental from `approved`
//! to `active`.

use async_trait::async_trait;
use dashmap::DashMap;
use rand::Rng;
use rand::distr::Alphanumeric;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use thiserror::Error;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::models::{
    Page, PaginatedResponse, PaginationInfo, Payment, PaymentResponse, PaymentStatus,
    PaymentTarget, PaymentType, RentalStatus, User,
};
use crate::utils::constant::{DEFAULT_CURRENCY, PAYMENT_TIMEOUT};

/// Errors reported by a payment processor
#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("payment processor request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("payment processor returned status {status}: {body}")]
    Api { status: u16, body: String },
    #[error("unknown payment intent: {0}")]
    UnknownIntent(String),
}

/// A freshly created intent, as returned by the processor.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PaymentIntent {
    pub id: String,
    pub client_secret: String,
}

/// Trait for payment processors.
#[async_trait]
pub trait PaymentProcessor: Send + Sync {
    /// Creates a customer record and returns its processor id.
    async fn create_customer(
        &self,
        email: &str,
        name: &str,
        phone: &str,
    ) -> Result<String, PaymentError>;

    /// Creates a payment intent for `amount_cents` in the smallest currency unit.
    async fn create_intent(
        &self,
        amount_cents: i64,
        currency: &str,
        customer_id: &str,
        description: Option<&str>,
        metadata: &[(&str, String)],
    ) -> Result<PaymentIntent, PaymentError>;

    /// Fetches the processor's current status string for an intent.
    async fn retrieve_intent_status(&self, intent_id: &str) -> Result<String, PaymentError>;
}

/// Maps a processor status string onto the local payment status.
pub fn reconcile(processor_status: &str) -> PaymentStatus {
    match processor_status {
        "succeeded" => PaymentStatus::Succeeded,
        "canceled" => PaymentStatus::Cancelled,
        "processing" | "requires_payment_method" | "requires_confirmation" => {
            PaymentStatus::Pending
        }
        _ => PaymentStatus::Failed,
    }
}

/// Converts a decimal amount to the smallest currency unit.
#[inline]
pub fn to_cents(amount: f64) -> i64 {
    (amount * 100.0).round() as i64
}

fn random_id(prefix: &str) -> String {
    let suffix: String = rand::rng()
        .sample_iter(&Alphanumeric)
        .take(24)
        .map(char::from)
        .collect();
    format!("{prefix}_{suffix}")
}

/// Payment processor for development
///
/// Logs every call and stores intents in memory. Intents report `succeeded` unless
/// their status was overridden with [`LogPaymentProcessor::set_status`].
#[derive(Default)]
pub struct LogPaymentProcessor {
    intents: DashMap<String, String>,
}

impl LogPaymentProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overrides the status reported for an intent.
    pub fn set_status(&self, intent_id: &str, status: &str) {
        self.intents.insert(intent_id.to_string(), status.to_string());
    }
}

#[async_trait]
impl PaymentProcessor for LogPaymentProcessor {
    #[instrument(skip(self, _phone))]
    async fn create_customer(
        &self,
        email: &str,
        name: &str,
        _phone: &str,
    ) -> Result<String, PaymentError> {
        let customer_id = random_id("cus");
        info!(%customer_id, "Created mock customer");
        Ok(customer_id)
    }

    #[instrument(skip(self, _metadata))]
    async fn create_intent(
        &self,
        amount_cents: i64,
        currency: &str,
        customer_id: &str,
        description: Option<&str>,
        _metadata: &[(&str, String)],
    ) -> Result<PaymentIntent, PaymentError> {
        let id = random_id("pi");
        let client_secret = format!("{id}_secret_{}", random_id("mock"));
        self.intents.insert(id.clone(), "succeeded".to_string());
        info!(
            intent_id = %id,
            amount_cents,
            description = description.unwrap_or_default(),
            "Created mock payment intent"
        );
        Ok(PaymentIntent { id, client_secret })
    }

    async fn retrieve_intent_status(&self, intent_id: &str) -> Result<String, PaymentError> {
        self.intents
            .get(intent_id)
            .map(|status| status.value().clone())
            .ok_or_else(|| PaymentError::UnknownIntent(intent_id.to_string()))
    }
}

#[derive(Deserialize)]
struct StripeCustomer {
    id: String,
}

#[derive(Deserialize)]
struct StripeIntentStatus {
    status: String,
}

/// Stripe backed payment processor for production use
pub struct StripeProcessor {
    secret_key: SecretString,
    api_base: String,
    http_client: reqwest::Client,
}

impl StripeProcessor {
    pub fn new(secret_key: SecretString, api_base: String) -> Result<Self, reqwest::Error> {
        info!(%api_base, "Initializing Stripe payment processor");
        let http_client = reqwest::Client::builder()
            .timeout(PAYMENT_TIMEOUT)
            .build()?;

        Ok(Self {
            secret_key,
            api_base,
            http_client,
        })
    }

    async fn send<T: for<'de> Deserialize<'de>>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, PaymentError> {
        let response = request
            .bearer_auth(self.secret_key.expose_secret())
            .send()
            .await
            .inspect_err(|e| error!(error = %e, "Network request to payment processor failed"))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error response body".to_string());
            error!(%status, %body, "Payment processor returned error");
            return Err(PaymentError::Api {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response.json().await?)
    }
}

#[async_trait]
impl PaymentProcessor for StripeProcessor {
    #[instrument(skip(self, phone))]
    async fn create_customer(
        &self,
        email: &str,
        name: &str,
        phone: &str,
    ) -> Result<String, PaymentError> {
        let request = self
            .http_client
            .post(format!("{}/v1/customers", self.api_base))
            .form(&[("email", email), ("name", name), ("phone", phone)]);

        let customer: StripeCustomer = self.send(request).await?;
        debug!(customer_id = %customer.id, "Stripe customer created");
        Ok(customer.id)
    }

    #[instrument(skip(self, metadata))]
    async fn create_intent(
        &self,
        amount_cents: i64,
        currency: &str,
        customer_id: &str,
        description: Option<&str>,
        metadata: &[(&str, String)],
    ) -> Result<PaymentIntent, PaymentError> {
        let mut form: Vec<(String, String)> = vec![
            ("amount".into(), amount_cents.to_string()),
            ("currency".into(), currency.to_string()),
            ("customer".into(), customer_id.to_string()),
            ("automatic_payment_methods[enabled]".into(), "true".into()),
        ];
        if let Some(description) = description {
            form.push(("description".into(), description.to_string()));
        }
        for (key, value) in metadata {
            form.push((format!("metadata[{key}]"), value.clone()));
        }

        let request = self
            .http_client
            .post(format!("{}/v1/payment_intents", self.api_base))
            .form(&form);

        let intent: PaymentIntent = self.send(request).await?;
        debug!(intent_id = %intent.id, "Stripe payment intent created");
        Ok(intent)
    }

    #[instrument(skip(self))]
    async fn retrieve_intent_status(&self, intent_id: &str) -> Result<String, PaymentError> {
        let request = self
            .http_client
            .get(format!("{}/v1/payment_intents/{intent_id}", self.api_base));

        let intent: StripeIntentStatus = self.send(request).await?;
        Ok(intent.status)
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreatePaymentIntentRequest {
    pub amount: f64,
    #[validate(length(max = 3, message = "currency must be a three letter code"))]
    pub currency: Option<String>,
    #[serde(rename = "type")]
    pub payment_type: PaymentType,
    pub related_id: Uuid,
    pub description: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreatePaymentIntentResponse {
    pub client_secret: String,
    pub payment_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct ConfirmPaymentRequest {
    pub payment_intent_id: String,
}

pub struct PaymentService;

impl PaymentService {
    /// Creates a payment intent for a completed job or an approved rental.
    ///
    /// The processor customer is created on first use and remembered on the user.
    ///
    /// # Returns
    ///
    /// * `Ok(CreatePaymentIntentResponse)` - Client secret and the local payment id
    /// * `Err(AppError::BadRequest)` - Non-positive amount or an ineligible target
    /// * `Err(AppError::Upstream)` - The processor call failed
    #[instrument(skip(pool, processor, request), fields(%user_id))]
    pub async fn create_intent(
        pool: &PgPool,
        processor: &dyn PaymentProcessor,
        user_id: Uuid,
        request: CreatePaymentIntentRequest,
    ) -> AppResult<CreatePaymentIntentResponse> {
        request.validate()?;
        if request.amount <= 0.0 {
            return Err(AppError::BadRequest("amount must be greater than 0"));
        }

        let target = PaymentTarget::new(request.payment_type, request.related_id);
        Self::ensure_payable(pool, user_id, target).await?;

        let user: User = sqlx::query_as("SELECT * FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(pool)
            .await?
            .ok_or(AppError::NotFound("user not found"))?;

        let customer_id = match user.stripe_customer_id.as_deref().filter(|c| !c.is_empty()) {
            Some(customer_id) => customer_id.to_string(),
            None => {
                let name = format!("{} {}", user.first_name, user.last_name);
                let customer_id = processor
                    .create_customer(&user.email, name.trim(), &user.phone)
                    .await?;
                sqlx::query(
                    "UPDATE users SET stripe_customer_id = $1, updated_at = NOW() WHERE id = $2",
                )
                .bind(&customer_id)
                .bind(user_id)
                .execute(pool)
                .await?;
                info!("Payment processor customer created for user");
                customer_id
            }
        };

        let currency = request
            .currency
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| DEFAULT_CURRENCY.to_string())
            .to_ascii_lowercase();
        let metadata = [
            ("user_id", user_id.to_string()),
            ("type", target.payment_type().to_string()),
            ("related_id", target.related_id().to_string()),
        ];

        let intent = processor
            .create_intent(
                to_cents(request.amount),
                &currency,
                &customer_id,
                request.description.as_deref(),
                &metadata,
            )
            .await?;

        let payment_id: Uuid = sqlx::query_scalar(
            r#"
            INSERT INTO payments (user_id, stripe_payment_intent_id, amount, currency, type, related_id, status)
            VALUES ($1, $2, $3, $4, $5, $6, 'pending')
            RETURNING id
            "#,
        )
        .bind(user_id)
        .bind(&intent.id)
        .bind(request.amount)
        .bind(&currency)
        .bind(target.payment_type())
        .bind(target.related_id())
        .fetch_one(pool)
        .await?;

        info!(%payment_id, intent_id = %intent.id, "Payment intent created");
        Ok(CreatePaymentIntentResponse {
            client_secret: intent.client_secret,
            payment_id,
        })
    }

    async fn ensure_payable(pool: &PgPool, user_id: Uuid, target: PaymentTarget) -> AppResult<()> {
        let eligible: bool = match target {
            PaymentTarget::Job(job_id) => {
                sqlx::query_scalar(
                    "SELECT EXISTS(SELECT 1 FROM jobs WHERE id = $1 AND user_id = $2 AND status = 'completed')",
                )
                .bind(job_id)
                .bind(user_id)
                .fetch_one(pool)
                .await?
            }
            PaymentTarget::Rental(rental_id) => {
                sqlx::query_scalar(
                    "SELECT EXISTS(SELECT 1 FROM equipment_rentals WHERE id = $1 AND renter_user_id = $2 AND status = 'approved')",
                )
                .bind(rental_id)
                .bind(user_id)
                .fetch_one(pool)
                .await?
            }
        };

        if eligible {
            return Ok(());
        }
        warn!(?target, "Payment target not eligible");
        Err(AppError::BadRequest(match target {
            PaymentTarget::Job(_) => "job not found, not owned by user, or not completed",
            PaymentTarget::Rental(_) => "rental not found, not owned by user, or not approved",
        }))
    }

    /// Reconciles a payment with the processor.
    ///
    /// The payment row is updated to the mapped status. When a rental payment
    /// succeeds the rental is activated; a rental that is no longer approved is
    /// left alone and only logged.
    ///
    /// # Returns
    ///
    /// * `Ok(PaymentResponse)` - The payment after reconciliation
    /// * `Err(AppError::NotFound)` - No payment with that intent belongs to the user
    #[instrument(skip(pool, processor), fields(%user_id))]
    pub async fn confirm(
        pool: &PgPool,
        processor: &dyn PaymentProcessor,
        user_id: Uuid,
        intent_id: &str,
    ) -> AppResult<PaymentResponse> {
        let payment: Payment = sqlx::query_as(
            "SELECT * FROM payments WHERE stripe_payment_intent_id = $1 AND user_id = $2",
        )
        .bind(intent_id)
        .bind(user_id)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::NotFound("payment not found"))?;

        let processor_status = processor.retrieve_intent_status(intent_id).await?;
        let status = reconcile(&processor_status);
        debug!(%processor_status, ?status, "Payment status reconciled");

        let payment: Payment = sqlx::query_as(
            "UPDATE payments SET status = $1, updated_at = NOW() WHERE id = $2 RETURNING *",
        )
        .bind(status)
        .bind(payment.id)
        .fetch_one(pool)
        .await?;

        if let (PaymentStatus::Succeeded, PaymentTarget::Rental(rental_id)) =
            (payment.status, payment.target())
        {
            Self::activate_rental(pool, rental_id).await;
        }

        info!(payment_id = %payment.id, status = ?payment.status, "Payment confirmed");
        Ok(payment.to_response())
    }

    async fn activate_rental(pool: &PgPool, rental_id: Uuid) {
        let current: Result<Option<RentalStatus>, sqlx::Error> =
            sqlx::query_scalar("SELECT status FROM equipment_rentals WHERE id = $1")
                .bind(rental_id)
                .fetch_optional(pool)
                .await;

        let next = match current {
            Ok(Some(status)) => status.activate(),
            Ok(None) => {
                warn!(%rental_id, "Paid rental no longer exists");
                return;
            }
            Err(e) => {
                warn!(error = %e, %rental_id, "Failed to load paid rental");
                return;
            }
        };

        match next {
            Ok(next) => {
                let result = sqlx::query(
                    "UPDATE equipment_rentals SET status = $1, updated_at = NOW() WHERE id = $2 AND status = 'approved'",
                )
                .bind(next)
                .bind(rental_id)
                .execute(pool)
                .await;
                match result {
                    Ok(_) => info!(%rental_id, "Rental activated after payment"),
                    Err(e) => warn!(error = %e, %rental_id, "Failed to activate paid rental"),
                }
            }
            Err(e) => warn!(%rental_id, reason = e.0, "Paid rental not activated"),
        }
    }

    /// Lists the user's payments, newest first.
    #[instrument(skip(pool))]
    pub async fn history(
        pool: &PgPool,
        user_id: Uuid,
        page: Page,
    ) -> AppResult<PaginatedResponse<PaymentResponse>> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM payments WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(pool)
            .await?;

        let payments: Vec<Payment> = sqlx::query_as(
            "SELECT * FROM payments WHERE user_id = $1 ORDER BY created_at DESC LIMIT $2 OFFSET $3",
        )
        .bind(user_id)
        .bind(page.limit)
        .bind(page.offset())
        .fetch_all(pool)
        .await?;

        Ok(PaginatedResponse {
            data: payments.iter().map(Payment::to_response).collect(),
            pagination: PaginationInfo::new(page, total),
        })
    }

    /// Fetches one payment. Payments of other users are reported as not found.
    #[instrument(skip(pool))]
    pub async fn get(pool: &PgPool, user_id: Uuid, payment_id: Uuid) -> AppResult<PaymentResponse> {
        let payment: Payment =
            sqlx::query_as("SELECT * FROM payments WHERE id = $1 AND user_id = $2")
                .bind(payment_id)
                .bind(user_id)
                .fetch_optional(pool)
                .await?
                .ok_or(AppError::NotFound("payment not found"))?;

        Ok(payment.to_response())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn processor_statuses_reconcile() {
        assert_eq!(reconcile("succeeded"), PaymentStatus::Succeeded);
        assert_eq!(reconcile("canceled"), PaymentStatus::Cancelled);
        assert_eq!(reconcile("processing"), PaymentStatus::Pending);
        assert_eq!(reconcile("requires_payment_method"), PaymentStatus::Pending);
        assert_eq!(reconcile("requires_confirmation"), PaymentStatus::Pending);
    }

    #[test]
    fn unrecognised_statuses_are_failures() {
        assert_eq!(reconcile("requires_action"), PaymentStatus::Failed);
        assert_eq!(reconcile("requires_capture"), PaymentStatus::Failed);
        assert_eq!(reconcile(""), PaymentStatus::Failed);
    }

    #[test]
    fn amounts_convert_to_cents() {
        assert_eq!(to_cents(90.0), 9000);
        assert_eq!(to_cents(19.99), 1999);
        assert_eq!(to_cents(0.1 + 0.2), 30);
    }

    #[test_log::test(tokio::test)]
    async fn log_processor_intents_succeed_by_default() {
        let processor = LogPaymentProcessor::new();
        let intent = processor
            .create_intent(9000, "usd", "cus_1", Some("Mower rental"), &[])
            .await
            .unwrap();
        assert!(intent.id.starts_with("pi_"));
        assert_eq!(
            processor.retrieve_intent_status(&intent.id).await.unwrap(),
            "succeeded"
        );

        processor.set_status(&intent.id, "processing");
        assert_eq!(
            processor.retrieve_intent_status(&intent.id).await.unwrap(),
            "processing"
        );
    }

    #[tokio::test]
    async fn log_processor_rejects_unknown_intents() {
        let processor = LogPaymentProcessor::new();
        assert!(matches!(
            processor.retrieve_intent_status("pi_missing").await,
            Err(PaymentError::UnknownIntent(_))
        ));
    }
}
