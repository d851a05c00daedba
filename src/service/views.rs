//! View deduplication and listing analytics.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::domain::{
    AnalyticsReport, Listing, ListingId, NewViewEvent, UserId, ViewEvent, ViewWindows, summarize,
};
use crate::error::GatewayError;
use crate::geo::GeoResolver;
use crate::persistence::Store;

/// Outcome of recording a view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct RecordedView {
    /// The inserted or extended event.
    pub event: ViewEvent,
    /// `true` if an open event was extended instead of inserting a new one.
    pub was_updated: bool,
}

/// Records listing views and builds owner analytics.
///
/// Deduplication is keyed on `(listing, ip)`, not on viewer identity, so
/// anonymous visitors are counted the same way as signed-in ones. The
/// read-then-write sequence is not transactional: two simultaneous first
/// views from one IP may both insert, which costs at most one extra row.
#[derive(Debug, Clone)]
pub struct ViewService {
    store: Arc<dyn Store>,
    geo: Arc<dyn GeoResolver>,
    windows: ViewWindows,
}

impl ViewService {
    /// Creates a new `ViewService`.
    #[must_use]
    pub fn new(store: Arc<dyn Store>, geo: Arc<dyn GeoResolver>, windows: ViewWindows) -> Self {
        Self {
            store,
            geo,
            windows,
        }
    }

    /// Returns the configured windows.
    #[must_use]
    pub fn windows(&self) -> ViewWindows {
        self.windows
    }

    /// Records a view of `listing_id` from `ip` at `now`.
    ///
    /// Extends the open event for `(listing_id, ip)` if one was created
    /// within the recent window; otherwise inserts a new event, flagged as
    /// a return visit when the IP has an event aged inside the return
    /// window.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::NotFound`] if the listing does not exist and
    /// [`GatewayError::Persistence`] on datastore failure.
    pub async fn record_view(
        &self,
        listing_id: ListingId,
        viewer_id: Option<UserId>,
        ip: &str,
        user_agent: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<RecordedView, GatewayError> {
        self.load_listing(listing_id).await?;

        if let Some(mut open) = self
            .store
            .latest_view_since(listing_id, ip, self.windows.recent_since(now))
            .await?
        {
            open.touch(now);
            self.store.update_view_end(&open).await?;
            tracing::debug!(%listing_id, ip, duration = ?open.session_duration, "view extended");
            return Ok(RecordedView {
                event: open,
                was_updated: true,
            });
        }

        let (after, before) = self.windows.return_range(now);
        let is_return = self
            .store
            .has_view_between(listing_id, ip, after, before)
            .await?;
        let geo = self.geo.resolve(ip);

        let event = self
            .store
            .insert_view(NewViewEvent {
                listing_id,
                viewer_id,
                ip_address: ip.to_string(),
                user_agent,
                geo,
                is_return,
                now,
            })
            .await?;
        tracing::debug!(%listing_id, ip, is_return, "view recorded");

        Ok(RecordedView {
            event,
            was_updated: false,
        })
    }

    /// Builds the analytics report for `listing_id`, visible only to its
    /// owner.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::NotFound`] if the listing does not exist,
    /// [`GatewayError::Forbidden`] if `requester` is not the owner, and
    /// [`GatewayError::Persistence`] on datastore failure.
    pub async fn analytics(
        &self,
        listing_id: ListingId,
        requester: UserId,
        now: DateTime<Utc>,
    ) -> Result<AnalyticsReport, GatewayError> {
        let listing = self.load_listing(listing_id).await?;
        if !listing.is_owned_by(requester) {
            return Err(GatewayError::Forbidden(
                "only the listing owner can view analytics".to_string(),
            ));
        }

        let events = self.store.views_for_listing(listing_id).await?;
        let message_count = self.store.count_messages(listing_id).await?;
        Ok(summarize(&events, message_count, now))
    }

    async fn load_listing(&self, listing_id: ListingId) -> Result<Listing, GatewayError> {
        self.store
            .get_listing(listing_id)
            .await?
            .ok_or_else(|| GatewayError::not_found("listing", listing_id))
    }
}
