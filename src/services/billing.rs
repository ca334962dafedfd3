use reqwest::Client;
use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;

#[derive(thiserror::Error, Debug)]
pub enum BillingError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Billing API error: {0}")]
    ApiError(String),

    #[error("Subscription not found")]
    SubscriptionNotFound,
}

impl From<BillingError> for crate::error::AppError {
    fn from(err: BillingError) -> Self {
        match err {
            BillingError::SubscriptionNotFound => crate::error::AppError::not_found("Subscription"),
            other => crate::error::AppError::Internal(anyhow::anyhow!(other)),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CanceledSubscription {
    pub id: String,
    pub status: String,
}

/// Minimal Stripe client: only subscription cancellation is needed.
#[derive(Clone)]
pub struct BillingClient {
    client: Client,
    api_base: String,
    secret_key: Secret<String>,
}

impl BillingClient {
    pub fn new(api_base: &str, secret_key: Secret<String>) -> Self {
        Self {
            client: Client::new(),
            api_base: api_base.trim_end_matches('/').to_string(),
            secret_key,
        }
    }

    #[tracing::instrument(skip(self))]
    pub async fn cancel_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<CanceledSubscription, BillingError> {
        let url = format!("{}/v1/subscriptions/{}", self.api_base, subscription_id);

        let response = self
            .client
            .delete(&url)
            .bearer_auth(self.secret_key.expose_secret())
            .timeout(std::time::Duration::from_secs(10))
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(BillingError::SubscriptionNotFound);
        }

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            tracing::error!(status = %status, error = %error_text, "Billing API request failed");
            return Err(BillingError::ApiError(format!(
                "Status {}: {}",
                status, error_text
            )));
        }

        let canceled: CanceledSubscription = response
            .json()
            .await
            .map_err(|e| BillingError::ApiError(format!("Failed to parse response: {}", e)))?;

        tracing::info!(subscription_id = %canceled.id, status = %canceled.status, "Subscription canceled");
        Ok(canceled)
    }
}
