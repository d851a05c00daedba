//! Listing analytics aggregation over the raw view log.
//!
//! [`summarize`] is a pure function of the events, the listing's message
//! count, and the query time. Buckets are sparse: hours or days without
//! views are omitted rather than zero-filled.

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{DateTime, Duration, NaiveDate, Timelike, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use super::ViewEvent;

/// Span covered by [`AnalyticsReport::hourly_views`].
pub const HOURLY_WINDOW: Duration = Duration::hours(24);

/// Span covered by [`AnalyticsReport::daily_views`].
pub const DAILY_WINDOW: Duration = Duration::days(7);

/// Hour-of-day bucket, labelled `"HH:00"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct HourBucket {
    /// Hour label in UTC, e.g. `"09:00"`.
    pub hour: String,
    /// Views created in that hour.
    pub views: u64,
}

/// Calendar-day bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct DayBucket {
    /// UTC date.
    pub date: NaiveDate,
    /// Views created on that date.
    pub views: u64,
}

/// Views attributed to one country.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct CountryCount {
    /// Resolved country.
    pub country: String,
    /// Number of views.
    pub views: u64,
}

/// Summary statistics and breakdowns for one listing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct AnalyticsReport {
    /// All recorded view events.
    pub total: u64,
    /// Distinct viewer IP addresses.
    pub unique: u64,
    /// Distinct IP addresses with at least one return-flagged event.
    pub returning_visitors: u64,
    /// Mean recorded session duration in whole seconds.
    pub avg_duration: i64,
    /// Views in the last 24 hours, by hour of day, ascending.
    pub hourly_views: Vec<HourBucket>,
    /// Views in the last 7 days, by date, ascending.
    pub daily_views: Vec<DayBucket>,
    /// Views by resolved country, most viewed first.
    pub geo_distribution: Vec<CountryCount>,
    /// Messages referencing the listing.
    pub message_count: u64,
}

/// Aggregates `events` into a report relative to `now`.
#[must_use]
pub fn summarize(events: &[ViewEvent], message_count: u64, now: DateTime<Utc>) -> AnalyticsReport {
    let hourly_cutoff = now - HOURLY_WINDOW;
    let daily_cutoff = now - DAILY_WINDOW;

    let mut ips = HashSet::new();
    let mut returning = HashSet::new();
    let mut duration_sum: i64 = 0;
    let mut duration_count: i64 = 0;
    let mut hourly: BTreeMap<u32, u64> = BTreeMap::new();
    let mut daily: BTreeMap<NaiveDate, u64> = BTreeMap::new();
    let mut countries: HashMap<&str, u64> = HashMap::new();

    for event in events {
        ips.insert(event.ip_address.as_str());
        if event.is_return {
            returning.insert(event.ip_address.as_str());
        }
        if let Some(secs) = event.session_duration {
            duration_sum = duration_sum.saturating_add(secs);
            duration_count += 1;
        }
        if event.created_at >= hourly_cutoff {
            *hourly.entry(event.created_at.hour()).or_default() += 1;
        }
        if event.created_at >= daily_cutoff {
            *daily.entry(event.created_at.date_naive()).or_default() += 1;
        }
        if let Some(country) = event.geo.country.as_deref() {
            *countries.entry(country).or_default() += 1;
        }
    }

    let mut geo_distribution: Vec<CountryCount> = countries
        .into_iter()
        .map(|(country, views)| CountryCount {
            country: country.to_string(),
            views,
        })
        .collect();
    geo_distribution.sort_by(|a, b| b.views.cmp(&a.views).then_with(|| a.country.cmp(&b.country)));

    AnalyticsReport {
        total: events.len() as u64,
        unique: ips.len() as u64,
        returning_visitors: returning.len() as u64,
        avg_duration: if duration_count == 0 {
            0
        } else {
            duration_sum / duration_count
        },
        hourly_views: hourly
            .into_iter()
            .map(|(hour, views)| HourBucket {
                hour: format!("{hour:02}:00"),
                views,
            })
            .collect(),
        daily_views: daily
            .into_iter()
            .map(|(date, views)| DayBucket { date, views })
            .collect(),
        geo_distribution,
        message_count,
    }
}
