//! Service layer: business logic orchestration.
//!
//! [`ViewService`] deduplicates listing views and builds owner analytics.
//! [`PremiumService`] runs the premium payment lifecycle and is the only
//! writer of a listing's premium fields.

pub mod premium;
pub mod views;

pub use premium::{PaymentSubmission, PremiumService};
pub use views::{RecordedView, ViewService};
