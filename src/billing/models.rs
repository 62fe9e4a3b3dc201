use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// key: billing-models -> pricing tiers mirrored into the provider catalog
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct PricingTier {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub price_cents: i32,
    pub service_category: String,
    pub estimated_duration: Option<String>,
    pub active: bool,
    pub sort_order: i32,
    pub stripe_product_id: Option<String>,
    pub stripe_price_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PricingTier {
    /// Display string derived from the stored minor units; never persisted.
    pub fn formatted_price(&self) -> String {
        format!("${:.2}", f64::from(self.price_cents) / 100.0)
    }
}

/// Outcome category of one reconciliation attempt. Closed set so the
/// per-tier branching stays exhaustive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncAction {
    Created,
    Updated,
    Disabled,
    Skipped,
    Error,
}

impl SyncAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncAction::Created => "created",
            SyncAction::Updated => "updated",
            SyncAction::Disabled => "disabled",
            SyncAction::Skipped => "skipped",
            SyncAction::Error => "error",
        }
    }
}

/// key: billing-sync-result -> one record per tier per invocation
#[derive(Debug, Clone, Serialize)]
pub struct SyncResult {
    pub success: bool,
    pub tier_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stripe_product_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stripe_price_id: Option<String>,
    pub action: SyncAction,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SyncResult {
    pub fn failure(tier_id: Uuid, message: String, error: String) -> Self {
        Self {
            success: false,
            tier_id,
            stripe_product_id: None,
            stripe_price_id: None,
            action: SyncAction::Error,
            message,
            error: Some(error),
        }
    }
}

/// Aggregate counters for one batch pass.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncSummary {
    pub total: usize,
    pub created: usize,
    pub updated: usize,
    pub disabled: usize,
    pub skipped: usize,
    pub errors: usize,
}

impl SyncSummary {
    pub fn record(&mut self, action: SyncAction) {
        self.total += 1;
        match action {
            SyncAction::Created => self.created += 1,
            SyncAction::Updated => self.updated += 1,
            SyncAction::Disabled => self.disabled += 1,
            SyncAction::Skipped => self.skipped += 1,
            SyncAction::Error => self.errors += 1,
        }
    }

    pub fn success(&self) -> bool {
        self.errors == 0
    }
}

/// key: billing-sync-outcome -> what a full batch returns to the caller
#[derive(Debug, Clone, Serialize)]
pub struct SyncOutcome {
    pub success: bool,
    pub results: Vec<SyncResult>,
    pub summary: SyncSummary,
}

/// One tier in the read-only catalog cross-reference report.
#[derive(Debug, Clone, Serialize)]
pub struct CatalogStatusEntry {
    #[serde(flatten)]
    pub tier: PricingTier,
    pub formatted_price: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_product_active: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_price_active: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CatalogStatusSummary {
    pub total: usize,
    pub with_external_product: usize,
    pub with_external_price: usize,
    pub active_only: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct CatalogStatusReport {
    pub tiers: Vec<CatalogStatusEntry>,
    pub summary: CatalogStatusSummary,
}
