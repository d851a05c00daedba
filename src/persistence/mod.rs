//! Persistence layer: store ports and their implementations.
//!
//! Services depend on the [`Store`] trait object only. Two backends
//! implement it:
//!
//! - [`postgres::PostgresStore`] backed by `sqlx::PgPool`, with real
//!   database transactions for [`PremiumUnitOfWork`].
//! - [`memory::MemoryStore`], an in-process store whose transactions
//!   stage a copy of the state and swap it in on commit.
//!
//! The listing/payment dual write on approval goes through a
//! [`PremiumUnitOfWork`]: every write made through the handle becomes
//! visible on [`PremiumUnitOfWork::commit`], and dropping the handle
//! without committing discards all of them.

pub mod memory;
pub mod models;
pub mod postgres;

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{
    Listing, ListingId, NewPremiumPayment, NewPremiumTier, NewViewEvent, PaymentId, PaymentStatus,
    PaymentSummary, PremiumPayment, PremiumTier, TierId, UserId, ViewEvent,
};
use crate::error::GatewayError;

pub use memory::MemoryStore;
pub use models::UserProfile;
pub use postgres::PostgresStore;

/// Storage of the raw listing view log.
#[async_trait]
pub trait ViewStore: Send + Sync {
    /// Most recent view of `listing_id` from `ip` created at or after `since`.
    async fn latest_view_since(
        &self,
        listing_id: ListingId,
        ip: &str,
        since: DateTime<Utc>,
    ) -> Result<Option<ViewEvent>, GatewayError>;

    /// Whether a view of `listing_id` from `ip` was created strictly
    /// between `after` and `before`.
    async fn has_view_between(
        &self,
        listing_id: ListingId,
        ip: &str,
        after: DateTime<Utc>,
        before: DateTime<Utc>,
    ) -> Result<bool, GatewayError>;

    /// Inserts a new view event.
    async fn insert_view(&self, view: NewViewEvent) -> Result<ViewEvent, GatewayError>;

    /// Persists `view.view_end_time` and `view.session_duration`.
    async fn update_view_end(&self, view: &ViewEvent) -> Result<(), GatewayError>;

    /// Every view event recorded for `listing_id`.
    async fn views_for_listing(&self, listing_id: ListingId) -> Result<Vec<ViewEvent>, GatewayError>;
}

/// Read access to listings and their message counts.
#[async_trait]
pub trait ListingStore: Send + Sync {
    /// Loads a listing.
    async fn get_listing(&self, id: ListingId) -> Result<Option<Listing>, GatewayError>;

    /// Number of messages referencing `listing_id`.
    async fn count_messages(&self, listing_id: ListingId) -> Result<u64, GatewayError>;
}

/// Premium tiers and payments.
#[async_trait]
pub trait PremiumStore: Send + Sync {
    /// All tiers, ascending by price.
    async fn list_tiers(&self) -> Result<Vec<PremiumTier>, GatewayError>;

    /// Loads a tier.
    async fn get_tier(&self, id: TierId) -> Result<Option<PremiumTier>, GatewayError>;

    /// Inserts a tier.
    async fn insert_tier(
        &self,
        tier: NewPremiumTier,
        now: DateTime<Utc>,
    ) -> Result<PremiumTier, GatewayError>;

    /// Inserts a `pending` payment.
    async fn insert_payment(&self, payment: NewPremiumPayment)
    -> Result<PremiumPayment, GatewayError>;

    /// Loads a payment.
    async fn get_payment(&self, id: PaymentId) -> Result<Option<PremiumPayment>, GatewayError>;

    /// Payments submitted by `user_id`, newest first.
    async fn payments_for_user(&self, user_id: UserId) -> Result<Vec<PremiumPayment>, GatewayError>;

    /// Every payment joined with purchaser, listing, and tier, newest first.
    async fn list_payment_summaries(&self) -> Result<Vec<PaymentSummary>, GatewayError>;

    /// Opens a unit of work for a payment status transition.
    async fn begin(&self) -> Result<Box<dyn PremiumUnitOfWork>, GatewayError>;
}

/// Transaction-scoped handle for the payment approval dual write.
///
/// Writes are invisible to other callers until [`commit`](Self::commit)
/// succeeds. Dropping the handle rolls everything back.
#[async_trait]
pub trait PremiumUnitOfWork: Send {
    /// Loads a payment and holds it against concurrent transitions.
    async fn lock_payment(&mut self, id: PaymentId) -> Result<Option<PremiumPayment>, GatewayError>;

    /// Loads a tier inside the transaction.
    async fn tier(&mut self, id: TierId) -> Result<Option<PremiumTier>, GatewayError>;

    /// Marks a listing premium with the given tier and expiry.
    async fn activate_listing(
        &mut self,
        listing_id: ListingId,
        tier_id: TierId,
        expires_at: DateTime<Utc>,
    ) -> Result<(), GatewayError>;

    /// Writes a payment's status and expiry.
    async fn set_payment_status(
        &mut self,
        id: PaymentId,
        status: PaymentStatus,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<PremiumPayment, GatewayError>;

    /// Makes every write of this unit visible atomically.
    async fn commit(self: Box<Self>) -> Result<(), GatewayError>;
}

/// Everything the services need from a datastore.
pub trait Store: ViewStore + ListingStore + PremiumStore + fmt::Debug {}

impl<T> Store for T where T: ViewStore + ListingStore + PremiumStore + fmt::Debug {}
