use axum::http::StatusCode;
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Parameter-translation boundary to the external card-payment gateway.
/// Amounts are already in the gateway's minor currency unit.
#[axum::async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_intent(&self, intent: IntentRequest) -> Result<PaymentIntent, Error>;
}

#[derive(Debug, Clone)]
pub struct IntentRequest {
    pub amount: i64,
    pub currency: &'static str,
    pub payment_method_types: &'static [&'static str],
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct PaymentIntent {
    pub id: String,
    pub client_secret: String,
}

/// Stripe-wire implementation: form-encoded POST against
/// `{base_url}/v1/payment_intents` with the secret key as bearer credential.
pub struct StripeGateway {
    http: reqwest::Client,
    secret_key: String,
    base_url: String,
}

pub const STRIPE_API_URL: &str = "https://api.stripe.com";

impl StripeGateway {
    pub fn new(secret_key: String, base_url: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            secret_key,
            base_url,
        }
    }

    pub fn new_from_env() -> Self {
        let secret_key = std::env::var("PAYMENT_GATEWAY_KEY")
            .expect("Cannot retreive PAYMENT_GATEWAY_KEY from environment variable.");

        let base_url =
            std::env::var("PAYMENT_GATEWAY_URL").unwrap_or_else(|_| STRIPE_API_URL.to_string());

        Self::new(secret_key, base_url)
    }
}

#[axum::async_trait]
impl PaymentGateway for StripeGateway {
    async fn create_intent(&self, intent: IntentRequest) -> Result<PaymentIntent, Error> {
        let mut form = vec![
            ("amount".to_string(), intent.amount.to_string()),
            ("currency".to_string(), intent.currency.to_string()),
        ];

        for (index, method) in intent.payment_method_types.iter().enumerate() {
            form.push((
                format!("payment_method_types[{}]", index),
                method.to_string(),
            ));
        }

        let response = self
            .http
            .post(format!("{}/v1/payment_intents", self.base_url))
            .bearer_auth(&self.secret_key)
            .form(&form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            tracing::error!("payment gateway rejected intent: {}", status);
            return Err(Error::PaymentGatewayStatus(
                StatusCode::from_u16(status.as_u16()).unwrap_or(StatusCode::BAD_GATEWAY),
            ));
        }

        response.json().await.map_err(Into::into)
    }
}
