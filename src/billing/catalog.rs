use async_trait::async_trait;
use sqlx::PgPool;
use thiserror::Error;
use uuid::Uuid;

use super::models::PricingTier;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),
    #[error("pricing tier not found")]
    NotFound,
}

/// key: billing-catalog -> durable store of pricing tiers
///
/// The reconciliation engine only ever writes the two external identifiers;
/// everything else on a tier belongs to the administrative CRUD surface.
#[async_trait]
pub trait CatalogRepository: Send + Sync {
    /// All tiers in stable order (sort_order, then created_at).
    async fn list_tiers(&self) -> Result<Vec<PricingTier>, CatalogError>;

    async fn get_tier(&self, id: Uuid) -> Result<PricingTier, CatalogError>;

    /// Persists both provider identifiers in one write, keeping the
    /// price-implies-product invariant intact.
    async fn store_external_ids(
        &self,
        id: Uuid,
        product_id: &str,
        price_id: &str,
    ) -> Result<PricingTier, CatalogError>;
}

#[derive(Clone)]
pub struct PgCatalogRepository {
    pool: PgPool,
}

impl PgCatalogRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CatalogRepository for PgCatalogRepository {
    async fn list_tiers(&self) -> Result<Vec<PricingTier>, CatalogError> {
        let tiers = sqlx::query_as::<_, PricingTier>(
            "SELECT * FROM pricing_tiers ORDER BY sort_order ASC, created_at ASC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(tiers)
    }

    async fn get_tier(&self, id: Uuid) -> Result<PricingTier, CatalogError> {
        sqlx::query_as::<_, PricingTier>("SELECT * FROM pricing_tiers WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(CatalogError::NotFound)
    }

    async fn store_external_ids(
        &self,
        id: Uuid,
        product_id: &str,
        price_id: &str,
    ) -> Result<PricingTier, CatalogError> {
        sqlx::query_as::<_, PricingTier>(
            r#"
            UPDATE pricing_tiers
            SET stripe_product_id = $2,
                stripe_price_id = $3,
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(product_id)
        .bind(price_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(CatalogError::NotFound)
    }
}
