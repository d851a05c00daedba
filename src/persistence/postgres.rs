//! PostgreSQL implementation of the store ports.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{Postgres, Transaction};
use uuid::Uuid;

use super::models::{ListingRow, PaymentRow, PaymentSummaryRow, TierRow, ViewRow};
use super::{ListingStore, PremiumStore, PremiumUnitOfWork, ViewStore};
use crate::config::GatewayConfig;
use crate::domain::{
    Listing, ListingId, NewPremiumPayment, NewPremiumTier, NewViewEvent, PaymentId, PaymentStatus,
    PaymentSummary, PremiumPayment, PremiumTier, TierId, UserId, ViewEvent,
};
use crate::error::GatewayError;

const VIEW_COLUMNS: &str = "id, listing_id, viewer_id, ip_address, user_agent, country, city, \
     region, view_start_time, view_end_time, session_duration, is_return, created_at";

const PAYMENT_COLUMNS: &str =
    "id, listing_id, user_id, tier_id, proof_url, amount, status, expires_at, created_at";

const TIER_COLUMNS: &str = "id, name, price, duration_days, features, created_at";

/// PostgreSQL-backed store using `sqlx::PgPool`.
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a store over an existing connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Opens a connection pool sized from `config`.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Persistence`] if the database is unreachable.
    pub async fn connect(config: &GatewayConfig) -> Result<Self, GatewayError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.database_max_connections)
            .min_connections(config.database_min_connections)
            .acquire_timeout(Duration::from_secs(config.database_connect_timeout_secs))
            .connect(&config.database_url)
            .await?;
        Ok(Self::new(pool))
    }

    /// Applies the embedded schema migrations.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Persistence`] if a migration fails.
    pub async fn migrate(&self) -> Result<(), GatewayError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl ViewStore for PostgresStore {
    async fn latest_view_since(
        &self,
        listing_id: ListingId,
        ip: &str,
        since: DateTime<Utc>,
    ) -> Result<Option<ViewEvent>, GatewayError> {
        let row = sqlx::query_as::<_, ViewRow>(&format!(
            "SELECT {VIEW_COLUMNS} FROM listing_views \
             WHERE listing_id = $1 AND ip_address = $2 AND created_at >= $3 \
             ORDER BY created_at DESC LIMIT 1"
        ))
        .bind(listing_id.as_uuid())
        .bind(ip)
        .bind(since)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Into::into))
    }

    async fn has_view_between(
        &self,
        listing_id: ListingId,
        ip: &str,
        after: DateTime<Utc>,
        before: DateTime<Utc>,
    ) -> Result<bool, GatewayError> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM listing_views \
             WHERE listing_id = $1 AND ip_address = $2 AND created_at > $3 AND created_at < $4)",
        )
        .bind(listing_id.as_uuid())
        .bind(ip)
        .bind(after)
        .bind(before)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    async fn insert_view(&self, view: NewViewEvent) -> Result<ViewEvent, GatewayError> {
        let event = view.into_event();
        sqlx::query(
            "INSERT INTO listing_views (id, listing_id, viewer_id, ip_address, user_agent, \
             country, city, region, view_start_time, is_return, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
        )
        .bind(event.id.as_uuid())
        .bind(event.listing_id.as_uuid())
        .bind(event.viewer_id.map(Uuid::from))
        .bind(&event.ip_address)
        .bind(&event.user_agent)
        .bind(&event.geo.country)
        .bind(&event.geo.city)
        .bind(&event.geo.region)
        .bind(event.view_start_time)
        .bind(event.is_return)
        .bind(event.created_at)
        .execute(&self.pool)
        .await?;
        Ok(event)
    }

    async fn update_view_end(&self, view: &ViewEvent) -> Result<(), GatewayError> {
        let result = sqlx::query(
            "UPDATE listing_views SET view_end_time = $2, session_duration = $3 WHERE id = $1",
        )
        .bind(view.id.as_uuid())
        .bind(view.view_end_time)
        .bind(view.session_duration)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(GatewayError::not_found("view", view.id));
        }
        Ok(())
    }

    async fn views_for_listing(&self, listing_id: ListingId) -> Result<Vec<ViewEvent>, GatewayError> {
        let rows = sqlx::query_as::<_, ViewRow>(&format!(
            "SELECT {VIEW_COLUMNS} FROM listing_views WHERE listing_id = $1 ORDER BY created_at ASC"
        ))
        .bind(listing_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }
}

#[async_trait]
impl ListingStore for PostgresStore {
    async fn get_listing(&self, id: ListingId) -> Result<Option<Listing>, GatewayError> {
        let row = sqlx::query_as::<_, ListingRow>(
            "SELECT id, owner_id, title, is_premium, premium_tier_id, premium_expires_at, \
             created_at FROM listings WHERE id = $1",
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Into::into))
    }

    async fn count_messages(&self, listing_id: ListingId) -> Result<u64, GatewayError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM messages WHERE listing_id = $1")
            .bind(listing_id.as_uuid())
            .fetch_one(&self.pool)
            .await?;
        Ok(u64::try_from(count).unwrap_or(0))
    }
}

#[async_trait]
impl PremiumStore for PostgresStore {
    async fn list_tiers(&self) -> Result<Vec<PremiumTier>, GatewayError> {
        let rows = sqlx::query_as::<_, TierRow>(&format!(
            "SELECT {TIER_COLUMNS} FROM premium_tiers ORDER BY price ASC, created_at ASC"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn get_tier(&self, id: TierId) -> Result<Option<PremiumTier>, GatewayError> {
        let row = sqlx::query_as::<_, TierRow>(&format!(
            "SELECT {TIER_COLUMNS} FROM premium_tiers WHERE id = $1"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Into::into))
    }

    async fn insert_tier(
        &self,
        tier: NewPremiumTier,
        now: DateTime<Utc>,
    ) -> Result<PremiumTier, GatewayError> {
        let row = sqlx::query_as::<_, TierRow>(&format!(
            "INSERT INTO premium_tiers (id, name, price, duration_days, features, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {TIER_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(&tier.name)
        .bind(tier.price)
        .bind(tier.duration_days)
        .bind(&tier.features)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.into())
    }

    async fn insert_payment(
        &self,
        payment: NewPremiumPayment,
    ) -> Result<PremiumPayment, GatewayError> {
        let row = sqlx::query_as::<_, PaymentRow>(&format!(
            "INSERT INTO premium_payments \
             (id, listing_id, user_id, tier_id, proof_url, amount, status, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING {PAYMENT_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(payment.listing_id.as_uuid())
        .bind(payment.user_id.as_uuid())
        .bind(payment.tier_id.as_uuid())
        .bind(&payment.proof_url)
        .bind(payment.amount)
        .bind(PaymentStatus::Pending.as_str())
        .bind(payment.created_at)
        .fetch_one(&self.pool)
        .await?;
        row.try_into()
    }

    async fn get_payment(&self, id: PaymentId) -> Result<Option<PremiumPayment>, GatewayError> {
        let row = sqlx::query_as::<_, PaymentRow>(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM premium_payments WHERE id = $1"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;
        row.map(TryInto::try_into).transpose()
    }

    async fn payments_for_user(&self, user_id: UserId) -> Result<Vec<PremiumPayment>, GatewayError> {
        let rows = sqlx::query_as::<_, PaymentRow>(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM premium_payments WHERE user_id = $1 \
             ORDER BY created_at DESC"
        ))
        .bind(user_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn list_payment_summaries(&self) -> Result<Vec<PaymentSummary>, GatewayError> {
        let rows = sqlx::query_as::<_, PaymentSummaryRow>(
            "SELECT p.id, p.listing_id, p.user_id, p.tier_id, p.proof_url, p.amount, p.status, \
             p.expires_at, p.created_at, \
             u.name AS user_name, u.email AS user_email, \
             l.title AS listing_title, t.name AS tier_name \
             FROM premium_payments p \
             LEFT JOIN users u ON u.id = p.user_id \
             LEFT JOIN listings l ON l.id = p.listing_id \
             LEFT JOIN premium_tiers t ON t.id = p.tier_id \
             ORDER BY p.created_at DESC",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn begin(&self) -> Result<Box<dyn PremiumUnitOfWork>, GatewayError> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgUnitOfWork { tx }))
    }
}

/// Unit of work over a single PostgreSQL transaction.
///
/// `sqlx` rolls the transaction back when it is dropped uncommitted.
struct PgUnitOfWork {
    tx: Transaction<'static, Postgres>,
}

impl fmt::Debug for PgUnitOfWork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PgUnitOfWork").finish_non_exhaustive()
    }
}

#[async_trait]
impl PremiumUnitOfWork for PgUnitOfWork {
    async fn lock_payment(&mut self, id: PaymentId) -> Result<Option<PremiumPayment>, GatewayError> {
        let row = sqlx::query_as::<_, PaymentRow>(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM premium_payments WHERE id = $1 FOR UPDATE"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await?;
        row.map(TryInto::try_into).transpose()
    }

    async fn tier(&mut self, id: TierId) -> Result<Option<PremiumTier>, GatewayError> {
        let row = sqlx::query_as::<_, TierRow>(&format!(
            "SELECT {TIER_COLUMNS} FROM premium_tiers WHERE id = $1"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(row.map(Into::into))
    }

    async fn activate_listing(
        &mut self,
        listing_id: ListingId,
        tier_id: TierId,
        expires_at: DateTime<Utc>,
    ) -> Result<(), GatewayError> {
        let result = sqlx::query(
            "UPDATE listings SET is_premium = TRUE, premium_tier_id = $2, \
             premium_expires_at = $3 WHERE id = $1",
        )
        .bind(listing_id.as_uuid())
        .bind(tier_id.as_uuid())
        .bind(expires_at)
        .execute(&mut *self.tx)
        .await?;
        if result.rows_affected() == 0 {
            return Err(GatewayError::not_found("listing", listing_id));
        }
        Ok(())
    }

    async fn set_payment_status(
        &mut self,
        id: PaymentId,
        status: PaymentStatus,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<PremiumPayment, GatewayError> {
        let row = sqlx::query_as::<_, PaymentRow>(&format!(
            "UPDATE premium_payments SET status = $2, expires_at = $3 WHERE id = $1 \
             RETURNING {PAYMENT_COLUMNS}"
        ))
        .bind(id.as_uuid())
        .bind(status.as_str())
        .bind(expires_at)
        .fetch_optional(&mut *self.tx)
        .await?;
        row.ok_or_else(|| GatewayError::not_found("payment", id))?
            .try_into()
    }

    async fn commit(self: Box<Self>) -> Result<(), GatewayError> {
        self.tx.commit().await?;
        Ok(())
    }
}
