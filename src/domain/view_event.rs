//! Recorded listing views.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{ListingId, UserId, ViewId};

/// Coarse location resolved from a viewer's IP address.
///
/// Every field is optional; an unresolvable address yields
/// [`GeoLocation::default`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct GeoLocation {
    /// ISO country name or code.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    /// City name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    /// Region or state name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
}

impl GeoLocation {
    /// Returns `true` when no field was resolved.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.country.is_none() && self.city.is_none() && self.region.is_none()
    }
}

/// One visit to a listing's detail page, keyed by IP for deduplication.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct ViewEvent {
    /// Row identifier.
    pub id: ViewId,
    /// Viewed listing.
    pub listing_id: ListingId,
    /// Authenticated viewer, if any.
    pub viewer_id: Option<UserId>,
    /// Viewer IP address as received (deduplication key).
    pub ip_address: String,
    /// Viewer user agent.
    pub user_agent: Option<String>,
    /// Resolved location.
    pub geo: GeoLocation,
    /// Start of the visit.
    pub view_start_time: DateTime<Utc>,
    /// Latest activity inside the visit window.
    pub view_end_time: Option<DateTime<Utc>>,
    /// Whole seconds between start and latest activity.
    pub session_duration: Option<i64>,
    /// Whether the IP visited this listing in an earlier, separate session.
    pub is_return: bool,
    /// Insertion time.
    pub created_at: DateTime<Utc>,
}

impl ViewEvent {
    /// Extends the visit to `now`, recomputing the truncated session
    /// duration from the start time.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.view_end_time = Some(now);
        self.session_duration = Some((now - self.view_start_time).num_seconds());
    }
}

/// Fields of a view event about to be inserted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewViewEvent {
    /// Viewed listing.
    pub listing_id: ListingId,
    /// Authenticated viewer, if any.
    pub viewer_id: Option<UserId>,
    /// Viewer IP address.
    pub ip_address: String,
    /// Viewer user agent.
    pub user_agent: Option<String>,
    /// Resolved location.
    pub geo: GeoLocation,
    /// Return-visit flag.
    pub is_return: bool,
    /// Start of the visit; also used as the insertion time.
    pub now: DateTime<Utc>,
}

impl NewViewEvent {
    /// Materializes the event with a fresh id.
    #[must_use]
    pub fn into_event(self) -> ViewEvent {
        ViewEvent {
            id: ViewId::new(),
            listing_id: self.listing_id,
            viewer_id: self.viewer_id,
            ip_address: self.ip_address,
            user_agent: self.user_agent,
            geo: self.geo,
            view_start_time: self.now,
            view_end_time: None,
            session_duration: None,
            is_return: self.is_return,
            created_at: self.now,
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn touch_truncates_to_whole_seconds() {
        let start = Utc::now();
        let mut event = NewViewEvent {
            listing_id: ListingId::new(),
            viewer_id: None,
            ip_address: "203.0.113.9".to_string(),
            user_agent: None,
            geo: GeoLocation::default(),
            is_return: false,
            now: start,
        }
        .into_event();

        event.touch(start + Duration::milliseconds(42_900));
        assert_eq!(event.session_duration, Some(42));
        assert_eq!(event.view_end_time, Some(start + Duration::milliseconds(42_900)));
        assert_eq!(event.view_start_time, start);
    }

    #[test]
    fn empty_geo_skips_fields() {
        let Ok(json) = serde_json::to_string(&GeoLocation::default()) else {
            panic!("serialization failed");
        };
        assert_eq!(json, "{}");
        assert!(GeoLocation::default().is_empty());
    }
}
