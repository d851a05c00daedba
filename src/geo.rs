//! Best-effort IP geolocation.
//!
//! [`GeoResolver::resolve`] never fails: loopback, private, unparseable,
//! or unmatched addresses resolve to an empty [`GeoLocation`].

use std::collections::BTreeMap;
use std::fmt;
use std::net::IpAddr;
use std::path::Path;

use maxminddb::{Reader, geoip2};

use crate::domain::GeoLocation;
use crate::error::GatewayError;

/// Maps an IP address to a coarse location.
pub trait GeoResolver: Send + Sync + fmt::Debug {
    /// Resolves `ip`, returning an empty location on any miss.
    fn resolve(&self, ip: &str) -> GeoLocation;
}

/// Resolver that knows nothing. Used when no geo database is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullGeoResolver;

impl GeoResolver for NullGeoResolver {
    fn resolve(&self, _ip: &str) -> GeoLocation {
        GeoLocation::default()
    }
}

/// Resolver backed by a MaxMind City database (`.mmdb`), e.g. GeoLite2-City.
pub struct MaxMindGeoResolver {
    reader: Reader<Vec<u8>>,
}

impl fmt::Debug for MaxMindGeoResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MaxMindGeoResolver")
            .field("database_type", &self.reader.metadata.database_type)
            .field("build_epoch", &self.reader.metadata.build_epoch)
            .finish_non_exhaustive()
    }
}

impl MaxMindGeoResolver {
    /// Loads the database at `path` into memory.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Storage`] if the file cannot be read and
    /// [`GatewayError::Internal`] if it is not a MaxMind database.
    pub fn from_path(path: &Path) -> Result<Self, GatewayError> {
        let bytes = std::fs::read(path)?;
        Self::from_bytes(bytes)
    }

    /// Builds a resolver over an in-memory database image.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Internal`] if `bytes` is not a MaxMind
    /// database.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, GatewayError> {
        let reader = Reader::from_source(bytes)
            .map_err(|e| GatewayError::Internal(format!("invalid geo database: {e}")))?;
        Ok(Self { reader })
    }

    /// Database type from the file metadata, e.g. `"GeoLite2-City"`.
    #[must_use]
    pub fn database_type(&self) -> &str {
        &self.reader.metadata.database_type
    }
}

impl GeoResolver for MaxMindGeoResolver {
    fn resolve(&self, ip: &str) -> GeoLocation {
        let Ok(addr) = ip.trim().parse::<IpAddr>() else {
            tracing::debug!(ip, "unparseable address, skipping geo lookup");
            return GeoLocation::default();
        };
        if !is_public(addr) {
            return GeoLocation::default();
        }
        match self.reader.lookup::<geoip2::City>(addr) {
            Ok(record) => location_of(&record),
            Err(e) => {
                tracing::debug!(ip, error = %e, "no geo match");
                GeoLocation::default()
            }
        }
    }
}

/// Country ISO code, English city name, and first subdivision (ISO code,
/// else English name).
fn location_of(record: &geoip2::City<'_>) -> GeoLocation {
    let region = record
        .subdivisions
        .as_ref()
        .and_then(|subdivisions| subdivisions.first())
        .and_then(|s| {
            s.iso_code
                .map(str::to_string)
                .or_else(|| english(s.names.as_ref()))
        });
    GeoLocation {
        country: record
            .country
            .as_ref()
            .and_then(|c| c.iso_code)
            .map(str::to_string),
        city: record.city.as_ref().and_then(|c| english(c.names.as_ref())),
        region,
    }
}

fn english(names: Option<&BTreeMap<&str, &str>>) -> Option<String> {
    names?.get("en").map(|name| (*name).to_string())
}

fn is_public(addr: IpAddr) -> bool {
    match addr {
        IpAddr::V4(v4) => {
            !(v4.is_private()
                || v4.is_loopback()
                || v4.is_link_local()
                || v4.is_unspecified()
                || v4.is_broadcast())
        }
        IpAddr::V6(v6) => {
            let unique_local = (v6.segments().first().copied().unwrap_or(0) & 0xfe00) == 0xfc00;
            !(v6.is_loopback() || v6.is_unspecified() || unique_local)
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn city_record_maps_to_location() {
        let raw = r#"{
            "country": {"iso_code": "FR", "names": {"en": "France", "fr": "France"}},
            "city": {"names": {"en": "Paris", "de": "Paris"}},
            "subdivisions": [{"iso_code": "IDF", "names": {"en": "Ile-de-France"}}]
        }"#;
        let Ok(record) = serde_json::from_str::<geoip2::City<'_>>(raw) else {
            panic!("record should deserialize");
        };
        let location = location_of(&record);
        assert_eq!(location.country.as_deref(), Some("FR"));
        assert_eq!(location.city.as_deref(), Some("Paris"));
        assert_eq!(location.region.as_deref(), Some("IDF"));
    }

    #[test]
    fn subdivision_without_code_uses_english_name() {
        let raw = r#"{"subdivisions": [{"names": {"en": "Bavaria"}}]}"#;
        let Ok(record) = serde_json::from_str::<geoip2::City<'_>>(raw) else {
            panic!("record should deserialize");
        };
        let location = location_of(&record);
        assert_eq!(location.region.as_deref(), Some("Bavaria"));
        assert_eq!(location.country, None);
        assert_eq!(location.city, None);
    }

    #[test]
    fn rejects_files_that_are_not_databases() {
        assert!(matches!(
            MaxMindGeoResolver::from_bytes(b"[{\"cidr\": \"81.0.0.0/8\"}]".to_vec()),
            Err(GatewayError::Internal(_))
        ));
        let missing = std::env::temp_dir().join(format!("{}.mmdb", uuid::Uuid::new_v4()));
        assert!(matches!(
            MaxMindGeoResolver::from_path(&missing),
            Err(GatewayError::Storage(_))
        ));
    }

    #[test]
    fn private_and_loopback_addresses_are_not_public() {
        for ip in ["10.1.2.3", "192.168.0.4", "127.0.0.1", "169.254.1.1", "::1", "fd00::7"] {
            let Ok(addr) = ip.parse::<IpAddr>() else {
                panic!("valid address literal");
            };
            assert!(!is_public(addr), "{ip} should be private");
        }
        for ip in ["8.8.8.8", "81.56.1.2", "2a01:e0a::5"] {
            let Ok(addr) = ip.parse::<IpAddr>() else {
                panic!("valid address literal");
            };
            assert!(is_public(addr), "{ip} should be public");
        }
    }

    #[test]
    fn null_resolver_is_empty() {
        assert!(NullGeoResolver.resolve("8.8.8.8").is_empty());
    }
}
