use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use crate::config;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("provider transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("provider rejected request ({status}): {message}")]
    Api { status: u16, message: String },
    #[error("provider object not found")]
    NotFound,
    #[error("malformed provider response: {0}")]
    Malformed(String),
    #[error("billing provider misconfigured: {0}")]
    Configuration(String),
}

/// Which client the process resolved at startup. Exposed so the batch
/// orchestrator can pace live calls without downcasting the trait object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderMode {
    Live,
    Simulated,
}

impl ProviderMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderMode::Live => "live",
            ProviderMode::Simulated => "simulated",
        }
    }
}

/// Read-only product state, used by the catalog status report.
#[derive(Debug, Clone, Copy)]
pub struct ProductStatus {
    pub active: bool,
}

/// Metadata attached to every provider write. The tier id back-reference is
/// what lets a provider-side record be traced to its local row; `synced_at`
/// is the freshness marker refreshed on every push.
#[derive(Debug, Clone)]
pub struct TierMetadata {
    pub tier_id: Uuid,
    pub synced_at: DateTime<Utc>,
}

impl TierMetadata {
    pub fn new(tier_id: Uuid) -> Self {
        Self {
            tier_id,
            synced_at: Utc::now(),
        }
    }

    fn form_fields(&self) -> Vec<(String, String)> {
        vec![
            ("metadata[tier_id]".to_string(), self.tier_id.to_string()),
            (
                "metadata[synced_at]".to_string(),
                self.synced_at.to_rfc3339(),
            ),
        ]
    }
}

/// key: billing-provider -> contract shared by the live and simulated clients
#[async_trait]
pub trait BillingProvider: Send + Sync {
    fn mode(&self) -> ProviderMode;

    async fn create_product(
        &self,
        name: &str,
        description: &str,
        metadata: &TierMetadata,
    ) -> Result<String, ProviderError>;

    async fn create_price(
        &self,
        product_id: &str,
        unit_amount: i64,
        currency: &str,
        metadata: &TierMetadata,
    ) -> Result<String, ProviderError>;

    async fn update_product(
        &self,
        product_id: &str,
        name: &str,
        description: &str,
        metadata: &TierMetadata,
    ) -> Result<(), ProviderError>;

    /// Marks the product inactive. The provider forbids deleting a product
    /// that has a price attached, so archiving is the only disable path.
    async fn archive_product(
        &self,
        product_id: &str,
        metadata: &TierMetadata,
    ) -> Result<(), ProviderError>;

    /// Read-only lookup. A missing product reports `active=false` instead of
    /// an error so status reports never fail on a single stale id.
    async fn retrieve_product(&self, product_id: &str) -> Result<ProductStatus, ProviderError>;
}

/// Resolves the process-wide billing client once, at startup. A credential
/// that is present but not shaped like a secret key falls back to the
/// simulated client; a malformed one fails fast.
pub fn provider_from_env() -> Result<Arc<dyn BillingProvider>, ProviderError> {
    match config::STRIPE_SECRET_KEY.as_deref() {
        Some(key) if key.starts_with("sk_") => {
            let provider = StripeProvider::new(key.to_string(), config::STRIPE_API_BASE.clone())?;
            tracing::info!(api_base = %*config::STRIPE_API_BASE, "billing provider resolved: live");
            Ok(Arc::new(provider))
        }
        Some(_) => {
            tracing::warn!(
                "STRIPE_SECRET_KEY is set but does not look like a secret key; using simulated billing"
            );
            Ok(Arc::new(SimulatedProvider))
        }
        None => {
            tracing::info!("STRIPE_SECRET_KEY not set; using simulated billing");
            Ok(Arc::new(SimulatedProvider))
        }
    }
}

/// key: billing-provider-live -> Stripe v1 API over form-encoded requests
pub struct StripeProvider {
    http: reqwest::Client,
    api_base: String,
    secret_key: String,
}

impl StripeProvider {
    pub fn new(secret_key: String, api_base: String) -> Result<Self, ProviderError> {
        if secret_key
            .chars()
            .any(|c| c.is_whitespace() || c.is_control())
        {
            return Err(ProviderError::Configuration(
                "secret key contains whitespace or control characters".to_string(),
            ));
        }
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|err| ProviderError::Configuration(err.to_string()))?;
        Ok(Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
            secret_key,
        })
    }

    async fn post_form(
        &self,
        path: &str,
        params: &[(String, String)],
    ) -> Result<Value, ProviderError> {
        let response = self
            .http
            .post(format!("{}{}", self.api_base, path))
            .bearer_auth(&self.secret_key)
            .form(params)
            .send()
            .await?;
        Self::decode(response).await
    }

    async fn get(&self, path: &str) -> Result<Value, ProviderError> {
        let response = self
            .http
            .get(format!("{}{}", self.api_base, path))
            .bearer_auth(&self.secret_key)
            .send()
            .await?;
        Self::decode(response).await
    }

    async fn decode(response: reqwest::Response) -> Result<Value, ProviderError> {
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(ProviderError::NotFound);
        }
        if !status.is_success() {
            let body: Value = response.json().await.unwrap_or(Value::Null);
            let message = body
                .pointer("/error/message")
                .and_then(|value| value.as_str())
                .unwrap_or("unrecognized provider error")
                .to_string();
            return Err(ProviderError::Api {
                status: status.as_u16(),
                message,
            });
        }
        Ok(response.json().await?)
    }

    fn extract_id(body: &Value) -> Result<String, ProviderError> {
        body.get("id")
            .and_then(|value| value.as_str())
            .map(str::to_string)
            .ok_or_else(|| ProviderError::Malformed("response is missing an id".to_string()))
    }
}

#[async_trait]
impl BillingProvider for StripeProvider {
    fn mode(&self) -> ProviderMode {
        ProviderMode::Live
    }

    async fn create_product(
        &self,
        name: &str,
        description: &str,
        metadata: &TierMetadata,
    ) -> Result<String, ProviderError> {
        let mut params = vec![
            ("name".to_string(), name.to_string()),
            ("description".to_string(), description.to_string()),
        ];
        params.extend(metadata.form_fields());
        let body = self.post_form("/v1/products", &params).await?;
        Self::extract_id(&body)
    }

    async fn create_price(
        &self,
        product_id: &str,
        unit_amount: i64,
        currency: &str,
        metadata: &TierMetadata,
    ) -> Result<String, ProviderError> {
        let mut params = vec![
            ("product".to_string(), product_id.to_string()),
            ("unit_amount".to_string(), unit_amount.to_string()),
            ("currency".to_string(), currency.to_string()),
        ];
        params.extend(metadata.form_fields());
        let body = self.post_form("/v1/prices", &params).await?;
        Self::extract_id(&body)
    }

    async fn update_product(
        &self,
        product_id: &str,
        name: &str,
        description: &str,
        metadata: &TierMetadata,
    ) -> Result<(), ProviderError> {
        let mut params = vec![
            ("name".to_string(), name.to_string()),
            ("description".to_string(), description.to_string()),
        ];
        params.extend(metadata.form_fields());
        self.post_form(&format!("/v1/products/{product_id}"), &params)
            .await?;
        Ok(())
    }

    async fn archive_product(
        &self,
        product_id: &str,
        metadata: &TierMetadata,
    ) -> Result<(), ProviderError> {
        let mut params = vec![("active".to_string(), "false".to_string())];
        params.extend(metadata.form_fields());
        self.post_form(&format!("/v1/products/{product_id}"), &params)
            .await?;
        Ok(())
    }

    async fn retrieve_product(&self, product_id: &str) -> Result<ProductStatus, ProviderError> {
        match self.get(&format!("/v1/products/{product_id}")).await {
            Ok(body) => Ok(ProductStatus {
                active: body
                    .get("active")
                    .and_then(|value| value.as_bool())
                    .unwrap_or(false),
            }),
            Err(ProviderError::NotFound) => Ok(ProductStatus { active: false }),
            Err(err) => Err(err),
        }
    }
}

/// key: billing-provider-simulated -> deterministic in-process fake
///
/// Stateless: it never rejects a call and never tracks prior ones. Identifier
/// uniqueness is the only guarantee.
#[derive(Debug, Default, Clone, Copy)]
pub struct SimulatedProvider;

#[async_trait]
impl BillingProvider for SimulatedProvider {
    fn mode(&self) -> ProviderMode {
        ProviderMode::Simulated
    }

    async fn create_product(
        &self,
        _name: &str,
        _description: &str,
        _metadata: &TierMetadata,
    ) -> Result<String, ProviderError> {
        Ok(format!("prod_sim_{}", Uuid::new_v4().simple()))
    }

    async fn create_price(
        &self,
        _product_id: &str,
        _unit_amount: i64,
        _currency: &str,
        _metadata: &TierMetadata,
    ) -> Result<String, ProviderError> {
        Ok(format!("price_sim_{}", Uuid::new_v4().simple()))
    }

    async fn update_product(
        &self,
        _product_id: &str,
        _name: &str,
        _description: &str,
        _metadata: &TierMetadata,
    ) -> Result<(), ProviderError> {
        Ok(())
    }

    async fn archive_product(
        &self,
        _product_id: &str,
        _metadata: &TierMetadata,
    ) -> Result<(), ProviderError> {
        Ok(())
    }

    async fn retrieve_product(&self, _product_id: &str) -> Result<ProductStatus, ProviderError> {
        Ok(ProductStatus { active: true })
    }
}
