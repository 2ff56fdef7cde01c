//! Payment processor trait and in-memory implementation.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use domain::Money;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Errors returned by a payment processor.
#[derive(Debug, Error)]
pub enum PaymentError {
    /// Transport failure talking to the processor.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The processor answered with a non-success status.
    #[error("Processor error ({status}): {message}")]
    Api { status: u16, message: String },

    /// The call did not finish within the configured bound.
    #[error("Payment processor timed out after {0:?}")]
    Timeout(Duration),

    /// The processor does not know the intent.
    #[error("Payment intent not found: {0}")]
    IntentNotFound(String),

    /// The processor response could not be understood.
    #[error("Invalid processor response: {0}")]
    Parse(String),

    /// The processor refused to create the intent.
    #[error("Payment declined: {0}")]
    Declined(String),
}

/// Processor-side status of a payment intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentStatus {
    RequiresPaymentMethod,
    RequiresConfirmation,
    RequiresAction,
    Processing,
    RequiresCapture,
    Canceled,
    Succeeded,
    #[serde(other)]
    Unknown,
}

impl IntentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            IntentStatus::RequiresPaymentMethod => "requires_payment_method",
            IntentStatus::RequiresConfirmation => "requires_confirmation",
            IntentStatus::RequiresAction => "requires_action",
            IntentStatus::Processing => "processing",
            IntentStatus::RequiresCapture => "requires_capture",
            IntentStatus::Canceled => "canceled",
            IntentStatus::Succeeded => "succeeded",
            IntentStatus::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for IntentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Parameters of a new payment intent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntentRequest {
    /// Amount to collect, in the currency's minor unit.
    pub amount: Money,
    pub currency: String,
    pub metadata: BTreeMap<String, String>,
}

/// A payment intent as reported by the processor.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PaymentIntent {
    pub id: String,

    /// Handed to the client to complete the payment.
    #[serde(default)]
    pub client_secret: String,

    pub status: IntentStatus,
    pub amount: Money,
    pub currency: String,

    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

/// Returns true if `id` has the shape of a processor intent id
/// (ASCII letters, digits and underscores).
pub fn is_intent_id(id: &str) -> bool {
    !id.is_empty() && id.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_')
}

/// Trait for payment processor operations.
#[async_trait]
pub trait PaymentProcessor: Send + Sync {
    /// Creates a payment intent.
    async fn create_intent(&self, request: IntentRequest) -> Result<PaymentIntent, PaymentError>;

    /// Fetches the live state of a payment intent.
    async fn retrieve_intent(&self, intent_id: &str) -> Result<PaymentIntent, PaymentError>;
}

#[derive(Debug, Default)]
struct InMemoryPaymentState {
    intents: HashMap<String, PaymentIntent>,
    next_id: u32,
    fail_on_create: bool,
    delay: Option<Duration>,
}

/// In-memory payment processor for tests and local runs.
///
/// Intents start in `requires_payment_method`; tests move them with
/// [`InMemoryPaymentProcessor::set_status`].
#[derive(Debug, Clone, Default)]
pub struct InMemoryPaymentProcessor {
    state: Arc<RwLock<InMemoryPaymentState>>,
}

impl InMemoryPaymentProcessor {
    /// Creates a new in-memory payment processor.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the processor to decline intent creation.
    pub async fn set_fail_on_create(&self, fail: bool) {
        self.state.write().await.fail_on_create = fail;
    }

    /// Delays every call by `delay`.
    pub async fn set_delay(&self, delay: Option<Duration>) {
        self.state.write().await.delay = delay;
    }

    /// Moves an intent to `status`.
    pub async fn set_status(&self, intent_id: &str, status: IntentStatus) -> Result<(), PaymentError> {
        let mut state = self.state.write().await;
        let intent = state
            .intents
            .get_mut(intent_id)
            .ok_or_else(|| PaymentError::IntentNotFound(intent_id.to_string()))?;
        intent.status = status;
        Ok(())
    }

    /// Marks an intent as succeeded, as if the customer completed payment.
    pub async fn succeed(&self, intent_id: &str) -> Result<(), PaymentError> {
        self.set_status(intent_id, IntentStatus::Succeeded).await
    }

    /// Returns the number of intents created.
    pub async fn intent_count(&self) -> usize {
        self.state.read().await.intents.len()
    }

    async fn wait(&self) {
        let delay = self.state.read().await.delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl PaymentProcessor for InMemoryPaymentProcessor {
    async fn create_intent(&self, request: IntentRequest) -> Result<PaymentIntent, PaymentError> {
        self.wait().await;
        let mut state = self.state.write().await;

        if state.fail_on_create {
            return Err(PaymentError::Declined("card declined".to_string()));
        }

        state.next_id += 1;
        let id = format!("pi_{:04}", state.next_id);
        let intent = PaymentIntent {
            client_secret: format!("{id}_secret_{}", Uuid::new_v4().simple()),
            id: id.clone(),
            status: IntentStatus::RequiresPaymentMethod,
            amount: request.amount,
            currency: request.currency,
            metadata: request.metadata,
        };
        state.intents.insert(id, intent.clone());

        Ok(intent)
    }

    async fn retrieve_intent(&self, intent_id: &str) -> Result<PaymentIntent, PaymentError> {
        self.wait().await;
        self.state
            .read()
            .await
            .intents
            .get(intent_id)
            .cloned()
            .ok_or_else(|| PaymentError::IntentNotFound(intent_id.to_string()))
    }
}
