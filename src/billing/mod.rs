pub mod api;
pub mod catalog;
pub mod models;
pub mod provider;
pub mod sync;

pub use catalog::{CatalogError, CatalogRepository, PgCatalogRepository};
pub use models::{
    CatalogStatusEntry, CatalogStatusReport, CatalogStatusSummary, PricingTier, SyncAction,
    SyncOutcome, SyncResult, SyncSummary,
};
pub use provider::{
    provider_from_env, BillingProvider, ProductStatus, ProviderError, ProviderMode,
    SimulatedProvider, StripeProvider, TierMetadata,
};
pub use sync::CatalogSyncService;
