use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use backoffice::billing::{
    BillingProvider, CatalogError, CatalogRepository, CatalogSyncService, PricingTier,
    ProductStatus, ProviderError, ProviderMode, SimulatedProvider, SyncAction, TierMetadata,
};

struct InMemoryCatalog {
    tiers: Mutex<Vec<PricingTier>>,
    fail_writes: bool,
}

impl InMemoryCatalog {
    fn new(tiers: Vec<PricingTier>) -> Self {
        Self {
            tiers: Mutex::new(tiers),
            fail_writes: false,
        }
    }

    fn failing_writes(tiers: Vec<PricingTier>) -> Self {
        Self {
            tiers: Mutex::new(tiers),
            fail_writes: true,
        }
    }

    fn snapshot(&self) -> Vec<PricingTier> {
        self.tiers.lock().unwrap().clone()
    }
}

#[async_trait]
impl CatalogRepository for InMemoryCatalog {
    async fn list_tiers(&self) -> Result<Vec<PricingTier>, CatalogError> {
        let mut tiers = self.snapshot();
        tiers.sort_by(|a, b| {
            a.sort_order
                .cmp(&b.sort_order)
                .then(a.created_at.cmp(&b.created_at))
        });
        Ok(tiers)
    }

    async fn get_tier(&self, id: Uuid) -> Result<PricingTier, CatalogError> {
        self.snapshot()
            .into_iter()
            .find(|tier| tier.id == id)
            .ok_or(CatalogError::NotFound)
    }

    async fn store_external_ids(
        &self,
        id: Uuid,
        product_id: &str,
        price_id: &str,
    ) -> Result<PricingTier, CatalogError> {
        if self.fail_writes {
            return Err(CatalogError::Db(sqlx::Error::RowNotFound));
        }
        let mut tiers = self.tiers.lock().unwrap();
        let tier = tiers
            .iter_mut()
            .find(|tier| tier.id == id)
            .ok_or(CatalogError::NotFound)?;
        tier.stripe_product_id = Some(product_id.to_string());
        tier.stripe_price_id = Some(price_id.to_string());
        tier.updated_at = Utc::now();
        Ok(tier.clone())
    }
}

/// Delegates to the simulated client except for one poisoned tier name.
struct FlakyProvider {
    inner: SimulatedProvider,
    fail_on_name: String,
}

#[async_trait]
impl BillingProvider for FlakyProvider {
    fn mode(&self) -> ProviderMode {
        ProviderMode::Simulated
    }

    async fn create_product(
        &self,
        name: &str,
        description: &str,
        metadata: &TierMetadata,
    ) -> Result<String, ProviderError> {
        if name == self.fail_on_name {
            return Err(ProviderError::Api {
                status: 500,
                message: "synthetic outage".to_string(),
            });
        }
        self.inner.create_product(name, description, metadata).await
    }

    async fn create_price(
        &self,
        product_id: &str,
        unit_amount: i64,
        currency: &str,
        metadata: &TierMetadata,
    ) -> Result<String, ProviderError> {
        self.inner
            .create_price(product_id, unit_amount, currency, metadata)
            .await
    }

    async fn update_product(
        &self,
        product_id: &str,
        name: &str,
        description: &str,
        metadata: &TierMetadata,
    ) -> Result<(), ProviderError> {
        if name == self.fail_on_name {
            return Err(ProviderError::Api {
                status: 500,
                message: "synthetic outage".to_string(),
            });
        }
        self.inner
            .update_product(product_id, name, description, metadata)
            .await
    }

    async fn archive_product(
        &self,
        product_id: &str,
        metadata: &TierMetadata,
    ) -> Result<(), ProviderError> {
        self.inner.archive_product(product_id, metadata).await
    }

    async fn retrieve_product(&self, product_id: &str) -> Result<ProductStatus, ProviderError> {
        self.inner.retrieve_product(product_id).await
    }
}

fn tier(name: &str, active: bool, ids: Option<(&str, &str)>) -> PricingTier {
    PricingTier {
        id: Uuid::new_v4(),
        name: name.to_string(),
        description: format!("{name} description"),
        price_cents: 200,
        service_category: "proofreading".to_string(),
        estimated_duration: Some("3 business days".to_string()),
        active,
        sort_order: 0,
        stripe_product_id: ids.map(|(product, _)| product.to_string()),
        stripe_price_id: ids.map(|(_, price)| price.to_string()),
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

fn service(repo: Arc<InMemoryCatalog>, provider: Arc<dyn BillingProvider>) -> CatalogSyncService {
    CatalogSyncService::with_options(repo, provider, "usd".to_string(), Duration::ZERO)
}

#[tokio::test]
async fn fresh_active_tier_is_created_then_updated() {
    let fresh = tier("Standard Proof", true, None);
    let tier_id = fresh.id;
    let repo = Arc::new(InMemoryCatalog::new(vec![fresh]));
    let sync = service(repo.clone(), Arc::new(SimulatedProvider));

    let first = sync.sync_tier(&repo.get_tier(tier_id).await.unwrap()).await;
    assert!(first.success);
    assert_eq!(first.action, SyncAction::Created);
    assert!(first.stripe_product_id.is_some());
    assert!(first.stripe_price_id.is_some());

    let stored = repo.get_tier(tier_id).await.unwrap();
    assert_eq!(stored.stripe_product_id, first.stripe_product_id);
    assert_eq!(stored.stripe_price_id, first.stripe_price_id);

    // Re-invoking must update, never create a second product.
    let second = sync.sync_tier(&stored).await;
    assert_eq!(second.action, SyncAction::Updated);
    assert_eq!(second.stripe_product_id, first.stripe_product_id);

    let after = repo.get_tier(tier_id).await.unwrap();
    assert_eq!(after.stripe_product_id, first.stripe_product_id);
}

#[tokio::test]
async fn disabling_is_idempotent_and_leaves_ids_alone() {
    let inactive = tier("Retired Tier", false, Some(("prod_1", "price_1")));
    let tier_id = inactive.id;
    let repo = Arc::new(InMemoryCatalog::new(vec![inactive]));
    let sync = service(repo.clone(), Arc::new(SimulatedProvider));

    for _ in 0..3 {
        let current = repo.get_tier(tier_id).await.unwrap();
        let result = sync.sync_tier(&current).await;
        assert!(result.success);
        assert_eq!(result.action, SyncAction::Disabled);
    }

    let stored = repo.get_tier(tier_id).await.unwrap();
    assert_eq!(stored.stripe_product_id.as_deref(), Some("prod_1"));
    assert_eq!(stored.stripe_price_id.as_deref(), Some("price_1"));
}

#[tokio::test]
async fn inactive_tier_without_price_is_skipped() {
    let dormant = tier("Draft Tier", false, None);
    let repo = Arc::new(InMemoryCatalog::new(vec![dormant.clone()]));
    let sync = service(repo, Arc::new(SimulatedProvider));

    let result = sync.sync_tier(&dormant).await;
    assert!(result.success);
    assert_eq!(result.action, SyncAction::Skipped);
    assert!(result.stripe_product_id.is_none());
}

#[tokio::test]
async fn batch_aggregates_create_and_disable() {
    let repo = Arc::new(InMemoryCatalog::new(vec![
        tier("New Tier", true, None),
        tier("Old Tier", false, Some(("prod_old", "price_old"))),
    ]));
    let sync = service(repo, Arc::new(SimulatedProvider));

    let outcome = sync.sync_all().await.unwrap();
    assert!(outcome.success);
    assert_eq!(outcome.results.len(), 2);
    assert_eq!(outcome.summary.total, 2);
    assert_eq!(outcome.summary.created, 1);
    assert_eq!(outcome.summary.updated, 0);
    assert_eq!(outcome.summary.disabled, 1);
    assert_eq!(outcome.summary.skipped, 0);
    assert_eq!(outcome.summary.errors, 0);
}

#[tokio::test]
async fn one_failing_tier_never_aborts_the_batch() {
    let poisoned = tier("Poisoned Tier", true, None);
    let poisoned_id = poisoned.id;
    let mut tiers = vec![
        tier("First Tier", true, None),
        poisoned,
        tier("Third Tier", false, Some(("prod_3", "price_3"))),
        tier("Fourth Tier", false, None),
    ];
    // Keep list order deterministic across equal sort_order values.
    for (index, tier) in tiers.iter_mut().enumerate() {
        tier.sort_order = index as i32;
    }
    let total = tiers.len();
    let repo = Arc::new(InMemoryCatalog::new(tiers));
    let sync = service(
        repo,
        Arc::new(FlakyProvider {
            inner: SimulatedProvider,
            fail_on_name: "Poisoned Tier".to_string(),
        }),
    );

    let outcome = sync.sync_all().await.unwrap();
    assert!(!outcome.success);
    assert_eq!(outcome.results.len(), total);

    let failed = &outcome.results[1];
    assert_eq!(failed.tier_id, poisoned_id);
    assert!(!failed.success);
    assert_eq!(failed.action, SyncAction::Error);
    assert!(failed.error.as_deref().unwrap().contains("synthetic outage"));

    assert_eq!(outcome.results[0].action, SyncAction::Created);
    assert_eq!(outcome.results[2].action, SyncAction::Disabled);
    assert_eq!(outcome.results[3].action, SyncAction::Skipped);

    let summary = &outcome.summary;
    assert_eq!(summary.total, total);
    assert_eq!(summary.errors, 1);
    assert_eq!(
        summary.created + summary.updated + summary.disabled + summary.skipped + summary.errors,
        summary.total
    );
}

#[tokio::test]
async fn identifier_persistence_failure_becomes_an_error_result() {
    let fresh = tier("Unsaveable Tier", true, None);
    let repo = Arc::new(InMemoryCatalog::failing_writes(vec![fresh.clone()]));
    let sync = service(repo.clone(), Arc::new(SimulatedProvider));

    let result = sync.sync_tier(&fresh).await;
    assert!(!result.success);
    assert_eq!(result.action, SyncAction::Error);
    assert!(result
        .error
        .as_deref()
        .unwrap()
        .contains("failed to persist"));

    // Local state is untouched, so the next pass will retry the create.
    let stored = repo.get_tier(fresh.id).await.unwrap();
    assert!(stored.stripe_product_id.is_none());
}

#[tokio::test]
async fn status_report_cross_references_linked_tiers() {
    let linked = tier("Linked Tier", true, Some(("prod_a", "price_a")));
    let unlinked = tier("Unlinked Tier", false, None);
    let repo = Arc::new(InMemoryCatalog::new(vec![linked.clone(), unlinked]));
    let sync = service(repo, Arc::new(SimulatedProvider));

    let report = sync.catalog_status().await.unwrap();
    assert_eq!(report.summary.total, 2);
    assert_eq!(report.summary.with_external_product, 1);
    assert_eq!(report.summary.with_external_price, 1);
    assert_eq!(report.summary.active_only, 1);

    let linked_entry = report
        .tiers
        .iter()
        .find(|entry| entry.tier.id == linked.id)
        .expect("linked tier should be reported");
    assert_eq!(linked_entry.external_product_active, Some(true));
    assert_eq!(linked_entry.external_price_active, Some(true));
    assert_eq!(linked_entry.formatted_price, "$2.00");

    let unlinked_entry = report
        .tiers
        .iter()
        .find(|entry| entry.tier.id != linked.id)
        .expect("unlinked tier should be reported");
    assert_eq!(unlinked_entry.external_product_active, None);
    assert_eq!(unlinked_entry.external_price_active, None);
}
