use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::time;
use tracing::{info, warn};

use crate::config;

use super::catalog::{CatalogError, CatalogRepository};
use super::models::{
    CatalogStatusEntry, CatalogStatusReport, CatalogStatusSummary, PricingTier, SyncAction,
    SyncOutcome, SyncResult, SyncSummary,
};
use super::provider::{BillingProvider, ProviderMode, TierMetadata};

/// What the engine decided to do with one tier. Derived purely from the
/// tier's own fields, so repeated passes over unchanged rows classify
/// identically.
#[derive(Debug, PartialEq, Eq)]
enum TierPlan<'a> {
    Create,
    Update(&'a str),
    Disable(Option<&'a str>),
    Skip,
}

/// key: billing-sync -> reconciliation engine and batch orchestrator
///
/// Holds whichever client the mode selector resolved; the decision logic
/// never knows whether calls leave the process.
pub struct CatalogSyncService {
    repo: Arc<dyn CatalogRepository>,
    provider: Arc<dyn BillingProvider>,
    currency: String,
    pace: Duration,
}

impl CatalogSyncService {
    pub fn new(repo: Arc<dyn CatalogRepository>, provider: Arc<dyn BillingProvider>) -> Self {
        Self::with_options(
            repo,
            provider,
            config::BILLING_CURRENCY.clone(),
            Duration::from_millis(*config::BILLING_SYNC_PACE_MS),
        )
    }

    pub fn with_options(
        repo: Arc<dyn CatalogRepository>,
        provider: Arc<dyn BillingProvider>,
        currency: String,
        pace: Duration,
    ) -> Self {
        Self {
            repo,
            provider,
            currency,
            pace,
        }
    }

    /// First match wins; the only creating branch is gated on the product id
    /// being absent, which is what makes repeated passes duplicate-free.
    fn classify(tier: &PricingTier) -> TierPlan<'_> {
        match (
            tier.active,
            tier.stripe_product_id.as_deref(),
            tier.stripe_price_id.as_deref(),
        ) {
            (true, None, _) => TierPlan::Create,
            (true, Some(product_id), _) => TierPlan::Update(product_id),
            (false, product_id, Some(_)) => TierPlan::Disable(product_id),
            (false, _, None) => TierPlan::Skip,
        }
    }

    /// Reconciles a single tier. Provider and repository failures are folded
    /// into the returned result; this never aborts a batch.
    pub async fn sync_tier(&self, tier: &PricingTier) -> SyncResult {
        match Self::classify(tier) {
            TierPlan::Create => match self.push_new(tier).await {
                Ok((product_id, price_id)) => SyncResult {
                    success: true,
                    tier_id: tier.id,
                    stripe_product_id: Some(product_id),
                    stripe_price_id: Some(price_id),
                    action: SyncAction::Created,
                    message: format!("created provider product and price for '{}'", tier.name),
                    error: None,
                },
                Err(err) => {
                    warn!(?err, tier_id = %tier.id, "failed to create provider records");
                    SyncResult::failure(
                        tier.id,
                        format!("could not create provider records for '{}'", tier.name),
                        format!("{err:#}"),
                    )
                }
            },
            TierPlan::Update(product_id) => {
                let metadata = TierMetadata::new(tier.id);
                match self
                    .provider
                    .update_product(product_id, &tier.name, &tier.description, &metadata)
                    .await
                {
                    Ok(()) => SyncResult {
                        success: true,
                        tier_id: tier.id,
                        stripe_product_id: tier.stripe_product_id.clone(),
                        stripe_price_id: tier.stripe_price_id.clone(),
                        action: SyncAction::Updated,
                        message: format!("pushed current fields for '{}'", tier.name),
                        error: None,
                    },
                    Err(err) => {
                        warn!(?err, tier_id = %tier.id, "failed to update provider product");
                        SyncResult::failure(
                            tier.id,
                            format!("could not update provider product for '{}'", tier.name),
                            err.to_string(),
                        )
                    }
                }
            }
            TierPlan::Disable(product_id) => {
                // The price itself stays as-is: the provider cannot
                // deactivate a price in isolation, so archiving the parent
                // product is the whole disable path.
                if let Some(product_id) = product_id {
                    let metadata = TierMetadata::new(tier.id);
                    if let Err(err) = self.provider.archive_product(product_id, &metadata).await {
                        warn!(?err, tier_id = %tier.id, "failed to archive provider product");
                        return SyncResult::failure(
                            tier.id,
                            format!("could not archive provider product for '{}'", tier.name),
                            err.to_string(),
                        );
                    }
                }
                SyncResult {
                    success: true,
                    tier_id: tier.id,
                    stripe_product_id: tier.stripe_product_id.clone(),
                    stripe_price_id: tier.stripe_price_id.clone(),
                    action: SyncAction::Disabled,
                    message: format!("archived provider product for '{}'", tier.name),
                    error: None,
                }
            }
            TierPlan::Skip => SyncResult {
                success: true,
                tier_id: tier.id,
                stripe_product_id: None,
                stripe_price_id: None,
                action: SyncAction::Skipped,
                message: format!("'{}' needs no provider action", tier.name),
                error: None,
            },
        }
    }

    /// Reconciles every tier in stable order, one at a time. A per-tier
    /// failure is recorded and the batch continues; a partially synced
    /// catalog is a normal steady state the next pass picks up from.
    pub async fn sync_all(&self) -> Result<SyncOutcome, CatalogError> {
        let tiers = self.repo.list_tiers().await?;
        let mut results = Vec::with_capacity(tiers.len());
        let mut summary = SyncSummary::default();

        for (index, tier) in tiers.iter().enumerate() {
            // Pacing keeps the live client under the provider rate ceiling;
            // the simulated client has no such ceiling.
            if index > 0 && self.provider.mode() == ProviderMode::Live && !self.pace.is_zero() {
                time::sleep(self.pace).await;
            }
            let result = self.sync_tier(tier).await;
            summary.record(result.action);
            results.push(result);
        }

        info!(
            mode = self.provider.mode().as_str(),
            total = summary.total,
            created = summary.created,
            updated = summary.updated,
            disabled = summary.disabled,
            skipped = summary.skipped,
            errors = summary.errors,
            "catalog sync pass finished"
        );

        Ok(SyncOutcome {
            success: summary.success(),
            results,
            summary,
        })
    }

    /// Read-only cross-reference of the local catalog against the provider.
    /// One product lookup per linked tier; a failed lookup degrades that
    /// tier's flags to unknown instead of failing the report.
    pub async fn catalog_status(&self) -> Result<CatalogStatusReport, CatalogError> {
        let tiers = self.repo.list_tiers().await?;
        let mut entries = Vec::with_capacity(tiers.len());
        let mut summary = CatalogStatusSummary::default();

        for tier in tiers {
            summary.total += 1;
            if tier.active {
                summary.active_only += 1;
            }

            let mut product_active = None;
            if let Some(product_id) = tier.stripe_product_id.as_deref() {
                summary.with_external_product += 1;
                match self.provider.retrieve_product(product_id).await {
                    Ok(status) => product_active = Some(status.active),
                    Err(err) => {
                        warn!(?err, tier_id = %tier.id, "provider lookup failed during status report");
                    }
                }
            }

            let price_active = if tier.stripe_price_id.is_some() {
                summary.with_external_price += 1;
                // A price is only usable at checkout while its parent
                // product is active; the provider exposes no direct price
                // lookup here.
                product_active
            } else {
                None
            };

            entries.push(CatalogStatusEntry {
                formatted_price: tier.formatted_price(),
                external_product_active: product_active,
                external_price_active: price_active,
                tier,
            });
        }

        Ok(CatalogStatusReport {
            tiers: entries,
            summary,
        })
    }

    async fn push_new(&self, tier: &PricingTier) -> anyhow::Result<(String, String)> {
        let metadata = TierMetadata::new(tier.id);
        let product_id = self
            .provider
            .create_product(&tier.name, &tier.description, &metadata)
            .await?;
        let price_id = self
            .provider
            .create_price(
                &product_id,
                i64::from(tier.price_cents),
                &self.currency,
                &metadata,
            )
            .await?;
        // Persist synchronously: the create branch is gated on the stored
        // product id, so the identifiers must land before this returns.
        self.repo
            .store_external_ids(tier.id, &product_id, &price_id)
            .await
            .context("provider records created but identifiers failed to persist locally")?;
        Ok((product_id, price_id))
    }
}
