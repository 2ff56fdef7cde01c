//! Stripe payment intents client.

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::{debug, error, instrument};

use super::payment::{IntentRequest, PaymentError, PaymentIntent, PaymentProcessor, is_intent_id};

/// Stripe API base URL.
pub const STRIPE_API_BASE: &str = "https://api.stripe.com";

/// Connection settings for the Stripe API.
#[derive(Clone)]
pub struct StripeConfig {
    /// Secret API key, sent as the bearer token.
    pub secret_key: SecretString,

    /// API base URL, overridable for test doubles.
    pub api_base: String,
}

impl StripeConfig {
    pub fn new(secret_key: SecretString) -> Self {
        Self {
            secret_key,
            api_base: STRIPE_API_BASE.to_string(),
        }
    }
}

impl std::fmt::Debug for StripeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StripeConfig")
            .field("secret_key", &"[REDACTED]")
            .field("api_base", &self.api_base)
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: Option<String>,
}

/// Payment processor backed by the Stripe payment intents API.
#[derive(Clone)]
pub struct StripePaymentProcessor {
    client: Client,
    secret_key: SecretString,
    api_base: String,
}

impl std::fmt::Debug for StripePaymentProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StripePaymentProcessor")
            .field("secret_key", &"[REDACTED]")
            .field("api_base", &self.api_base)
            .finish_non_exhaustive()
    }
}

impl StripePaymentProcessor {
    /// Create a new Stripe client.
    #[must_use]
    pub fn new(config: StripeConfig) -> Self {
        Self {
            client: Client::new(),
            secret_key: config.secret_key,
            api_base: config.api_base.trim_end_matches('/').to_string(),
        }
    }

    fn intents_url(&self) -> String {
        format!("{}/v1/payment_intents", self.api_base)
    }

    /// Turns a processor response into an intent or an API error.
    async fn read_intent(response: reqwest::Response) -> Result<PaymentIntent, PaymentError> {
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorBody>(&body)
                .ok()
                .and_then(|parsed| parsed.error.message)
                .unwrap_or(body);
            error!(status = status.as_u16(), message = %message, "Stripe API error");
            return Err(PaymentError::Api {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json::<PaymentIntent>()
            .await
            .map_err(|e| PaymentError::Parse(e.to_string()))
    }
}

/// Form fields for `POST /v1/payment_intents`.
fn intent_form(request: &IntentRequest) -> Vec<(String, String)> {
    let mut form = vec![
        ("amount".to_string(), request.amount.cents().to_string()),
        ("currency".to_string(), request.currency.clone()),
        (
            "automatic_payment_methods[enabled]".to_string(),
            "true".to_string(),
        ),
    ];
    form.extend(
        request
            .metadata
            .iter()
            .map(|(key, value)| (format!("metadata[{key}]"), value.clone())),
    );
    form
}

#[async_trait]
impl PaymentProcessor for StripePaymentProcessor {
    #[instrument(skip(self, request), fields(amount = request.amount.cents()))]
    async fn create_intent(&self, request: IntentRequest) -> Result<PaymentIntent, PaymentError> {
        let response = self
            .client
            .post(self.intents_url())
            .bearer_auth(self.secret_key.expose_secret())
            .form(&intent_form(&request))
            .send()
            .await?;

        let intent = Self::read_intent(response).await?;
        debug!(intent_id = %intent.id, status = %intent.status, "payment intent created");
        Ok(intent)
    }

    #[instrument(skip(self))]
    async fn retrieve_intent(&self, intent_id: &str) -> Result<PaymentIntent, PaymentError> {
        // The id becomes a path segment of an authenticated request
        if !is_intent_id(intent_id) {
            return Err(PaymentError::IntentNotFound(intent_id.to_string()));
        }

        let response = self
            .client
            .get(format!("{}/{intent_id}", self.intents_url()))
            .bearer_auth(self.secret_key.expose_secret())
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(PaymentError::IntentNotFound(intent_id.to_string()));
        }

        Self::read_intent(response).await
    }
}
