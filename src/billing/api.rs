use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    Json,
};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{AppError, AppResult};

use super::catalog::{CatalogRepository, PgCatalogRepository};
use super::models::{CatalogStatusReport, PricingTier, SyncOutcome, SyncResult};
use super::provider::BillingProvider;
use super::sync::CatalogSyncService;

/// key: billing-api -> thin administrative endpoints
pub async fn list_tiers(Extension(pool): Extension<PgPool>) -> AppResult<Json<Vec<TierEnvelope>>> {
    let tiers = sqlx::query_as::<_, PricingTier>(
        "SELECT * FROM pricing_tiers ORDER BY sort_order ASC, created_at ASC",
    )
    .fetch_all(&pool)
    .await?;
    Ok(Json(tiers.into_iter().map(TierEnvelope::from).collect()))
}

pub async fn create_tier(
    Extension(pool): Extension<PgPool>,
    Json(payload): Json<CreateTierRequest>,
) -> AppResult<Json<TierEnvelope>> {
    if payload.name.trim().is_empty() {
        return Err(AppError::BadRequest("name must not be empty".into()));
    }
    if payload.price_cents < 0 {
        return Err(AppError::BadRequest(
            "price_cents must be non-negative".into(),
        ));
    }

    let tier = sqlx::query_as::<_, PricingTier>(
        r#"
        INSERT INTO pricing_tiers (
            id, name, description, price_cents, service_category,
            estimated_duration, active, sort_order
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(payload.name.trim())
    .bind(&payload.description)
    .bind(payload.price_cents)
    .bind(&payload.service_category)
    .bind(&payload.estimated_duration)
    .bind(payload.active.unwrap_or(true))
    .bind(payload.sort_order.unwrap_or(0))
    .fetch_one(&pool)
    .await?;

    Ok(Json(TierEnvelope::from(tier)))
}

pub async fn update_tier(
    Extension(pool): Extension<PgPool>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateTierRequest>,
) -> AppResult<Json<TierEnvelope>> {
    if let Some(price_cents) = payload.price_cents {
        if price_cents < 0 {
            return Err(AppError::BadRequest(
                "price_cents must be non-negative".into(),
            ));
        }
    }

    // External identifiers are deliberately absent here: only the
    // reconciliation engine writes them.
    let tier = sqlx::query_as::<_, PricingTier>(
        r#"
        UPDATE pricing_tiers
        SET name = COALESCE($2, name),
            description = COALESCE($3, description),
            price_cents = COALESCE($4, price_cents),
            service_category = COALESCE($5, service_category),
            estimated_duration = COALESCE($6, estimated_duration),
            active = COALESCE($7, active),
            sort_order = COALESCE($8, sort_order),
            updated_at = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(&payload.name)
    .bind(&payload.description)
    .bind(payload.price_cents)
    .bind(&payload.service_category)
    .bind(&payload.estimated_duration)
    .bind(payload.active)
    .bind(payload.sort_order)
    .fetch_optional(&pool)
    .await?
    .ok_or(AppError::NotFound)?;

    Ok(Json(TierEnvelope::from(tier)))
}

pub async fn sync_catalog(
    Extension(pool): Extension<PgPool>,
    Extension(provider): Extension<Arc<dyn BillingProvider>>,
) -> AppResult<Json<SyncOutcome>> {
    let service = sync_service(pool, provider);
    let outcome = service.sync_all().await?;
    Ok(Json(outcome))
}

pub async fn sync_single_tier(
    Extension(pool): Extension<PgPool>,
    Extension(provider): Extension<Arc<dyn BillingProvider>>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<SyncResult>> {
    let repo = Arc::new(PgCatalogRepository::new(pool));
    let tier = repo.get_tier(id).await?;
    let service = CatalogSyncService::new(repo, provider);
    Ok(Json(service.sync_tier(&tier).await))
}

pub async fn catalog_status(
    Extension(pool): Extension<PgPool>,
    Extension(provider): Extension<Arc<dyn BillingProvider>>,
) -> AppResult<Json<CatalogStatusReport>> {
    let service = sync_service(pool, provider);
    let report = service.catalog_status().await?;
    Ok(Json(report))
}

fn sync_service(pool: PgPool, provider: Arc<dyn BillingProvider>) -> CatalogSyncService {
    CatalogSyncService::new(Arc::new(PgCatalogRepository::new(pool)), provider)
}

#[derive(Debug, Serialize)]
pub struct TierEnvelope {
    #[serde(flatten)]
    pub tier: PricingTier,
    pub formatted_price: String,
}

impl From<PricingTier> for TierEnvelope {
    fn from(tier: PricingTier) -> Self {
        Self {
            formatted_price: tier.formatted_price(),
            tier,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateTierRequest {
    pub name: String,
    pub description: String,
    pub price_cents: i32,
    pub service_category: String,
    #[serde(default)]
    pub estimated_duration: Option<String>,
    #[serde(default)]
    pub active: Option<bool>,
    #[serde(default)]
    pub sort_order: Option<i32>,
}

#[derive(Debug, Deserialize, Default)]
pub struct UpdateTierRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub price_cents: Option<i32>,
    #[serde(default)]
    pub service_category: Option<String>,
    #[serde(default)]
    pub estimated_duration: Option<String>,
    #[serde(default)]
    pub active: Option<bool>,
    #[serde(default)]
    pub sort_order: Option<i32>,
}
