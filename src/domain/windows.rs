//! Named time windows used by view deduplication.

use chrono::{DateTime, Duration, Utc};

use crate::error::GatewayError;

/// Views from the same IP within this span are the same visit.
pub const RECENT_VIEW_WINDOW: Duration = Duration::hours(1);

/// Lower bound on the age of a prior view that marks a returning visitor.
pub const RETURN_VISITOR_MIN_AGE: Duration = Duration::hours(24);

/// Upper bound on the age of a prior view that marks a returning visitor.
pub const RETURN_VISITOR_MAX_AGE: Duration = Duration::days(7);

/// Time windows driving view deduplication and return-visitor detection.
///
/// A view inside `recent` of an existing event updates that event. A
/// prior view aged strictly between `return_min_age` and `return_max_age`
/// flags the new event as a return visit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewWindows {
    /// Deduplication window for an open view.
    pub recent: Duration,
    /// Youngest prior view that still counts as a separate visit.
    pub return_min_age: Duration,
    /// Oldest prior view that still counts as a return.
    pub return_max_age: Duration,
}

impl Default for ViewWindows {
    fn default() -> Self {
        Self {
            recent: RECENT_VIEW_WINDOW,
            return_min_age: RETURN_VISITOR_MIN_AGE,
            return_max_age: RETURN_VISITOR_MAX_AGE,
        }
    }
}

impl ViewWindows {
    /// Builds a validated set of windows.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Validation`] unless
    /// `0 < recent <= return_min_age < return_max_age`.
    pub fn new(
        recent: Duration,
        return_min_age: Duration,
        return_max_age: Duration,
    ) -> Result<Self, GatewayError> {
        if recent <= Duration::zero() {
            return Err(GatewayError::Validation(
                "recent view window must be positive".to_string(),
            ));
        }
        if recent > return_min_age {
            return Err(GatewayError::Validation(
                "recent view window must not exceed the return visitor minimum age".to_string(),
            ));
        }
        if return_min_age >= return_max_age {
            return Err(GatewayError::Validation(
                "return visitor minimum age must be below the maximum age".to_string(),
            ));
        }
        Ok(Self {
            recent,
            return_min_age,
            return_max_age,
        })
    }

    /// Earliest `created_at` of an event still open for update at `now`.
    #[must_use]
    pub fn recent_since(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - self.recent
    }

    /// Exclusive `(after, before)` bounds on a prior view's `created_at`
    /// that mark a return visit at `now`.
    #[must_use]
    pub fn return_range(&self, now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
        (now - self.return_max_age, now - self.return_min_age)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_named_constants() {
        let w = ViewWindows::default();
        assert_eq!(w.recent, Duration::hours(1));
        assert_eq!(w.return_min_age, Duration::hours(24));
        assert_eq!(w.return_max_age, Duration::days(7));
    }

    #[test]
    fn rejects_overlapping_windows() {
        assert!(ViewWindows::new(Duration::hours(2), Duration::hours(1), Duration::days(7)).is_err());
        assert!(ViewWindows::new(Duration::hours(1), Duration::days(7), Duration::days(7)).is_err());
        assert!(ViewWindows::new(Duration::zero(), Duration::hours(1), Duration::days(7)).is_err());
        assert!(ViewWindows::new(Duration::minutes(30), Duration::hours(12), Duration::days(3)).is_ok());
    }

    #[test]
    fn return_range_is_ordered() {
        let now = Utc::now();
        let (after, before) = ViewWindows::default().return_range(now);
        assert_eq!(after, now - Duration::days(7));
        assert_eq!(before, now - Duration::hours(24));
        assert!(after < before);
    }
}
