//! Domain layer: identifiers, entities, and pure business rules.
//!
//! Nothing here performs I/O. View deduplication windows, the payment
//! status state machine, lazy premium expiry, and analytics aggregation
//! are all plain functions over these types so they can be exercised
//! with fixed timestamps.

pub mod analytics;
pub mod ids;
pub mod listing;
pub mod premium;
pub mod view_event;
pub mod windows;

pub use analytics::{AnalyticsReport, CountryCount, DayBucket, HourBucket, summarize};
pub use ids::{ListingId, PaymentId, TierId, UserId, ViewId};
pub use listing::{Listing, PremiumState};
pub use premium::{
    NewPremiumPayment, NewPremiumTier, PaymentStatus, PaymentSummary, PremiumPayment, PremiumTier,
};
pub use view_event::{GeoLocation, NewViewEvent, ViewEvent};
pub use windows::ViewWindows;
