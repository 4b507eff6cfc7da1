//! Resolution of client addresses to a location hierarchy.
//!
//! The loader only depends on the [`GeoResolver`] contract. The production
//! backend is a MaxMind GeoLite2/GeoIP2 City database read with `maxminddb`.

use anyhow::{Context, Result};
use maxminddb::{geoip2, Reader};
use std::collections::HashMap;
use std::net::IpAddr;
use std::path::Path;

/// Name used when the backend knows a location but not its name.
pub const UNKNOWN: &str = "unknown";

/// Location hierarchy of a resolved address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub country_name: String,
    /// ISO country code (e.g. "US"), when the backend has one
    pub country_code: Option<String>,
    /// Finest subdivision known for the address (a US state, for example)
    pub subdivision_name: String,
}

impl Location {
    pub fn new(
        country_name: impl Into<String>,
        country_code: impl Into<String>,
        subdivision_name: impl Into<String>,
    ) -> Self {
        Self {
            country_name: country_name.into(),
            country_code: Some(country_code.into()),
            subdivision_name: subdivision_name.into(),
        }
    }

    pub fn in_country(&self, code: &str) -> bool {
        self.country_code.as_deref() == Some(code)
    }
}

/// Maps a client address to a location.
///
/// Every kind of failure (unparsable address, reserved range, database miss,
/// backend error) is reported as `None`.
pub trait GeoResolver: Send + Sync {
    fn resolve(&self, address: &str) -> Option<Location>;
}

/// Resolver backed by a MaxMind City database.
pub struct GeoIpResolver {
    reader: Reader<Vec<u8>>,
}

impl GeoIpResolver {
    pub fn open(path: &Path) -> Result<Self> {
        let reader = Reader::open_readfile(path)
            .with_context(|| format!("Failed to open GeoIP City database at {}", path.display()))?;
        Ok(Self { reader })
    }
}

impl GeoResolver for GeoIpResolver {
    fn resolve(&self, address: &str) -> Option<Location> {
        let ip: IpAddr = address.parse().ok()?;
        let result = self.reader.lookup(ip).ok()?;
        let city = result.decode::<geoip2::City>().ok()??;
        Some(location_from_city(&city))
    }
}

/// Maps a City record to a location. The finest (last) subdivision wins and
/// missing English names become [`UNKNOWN`].
fn location_from_city(city: &geoip2::City<'_>) -> Location {
    let name = |value: Option<&str>| value.unwrap_or(UNKNOWN).to_string();
    let subdivision = city
        .subdivisions
        .last()
        .and_then(|subdivision| subdivision.names.english);

    Location {
        country_name: name(city.country.names.english),
        country_code: city.country.iso_code.map(|code| code.to_string()),
        subdivision_name: name(subdivision),
    }
}

/// Resolver over a fixed address table.
#[derive(Debug, Clone, Default)]
pub struct StaticResolver {
    entries: HashMap<String, Location>,
}

impl StaticResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, address: impl Into<String>, location: Location) -> Self {
        self.insert(address, location);
        self
    }

    pub fn insert(&mut self, address: impl Into<String>, location: Location) {
        self.entries.insert(address.into(), location);
    }
}

impl GeoResolver for StaticResolver {
    fn resolve(&self, address: &str) -> Option<Location> {
        self.entries.get(address).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn geoip_resolver_invalid_path() {
        assert!(GeoIpResolver::open(Path::new("/nonexistent/path.mmdb")).is_err());
    }

    fn subdivision(english: &'static str) -> geoip2::city::Subdivision<'static> {
        let mut subdivision = geoip2::city::Subdivision::default();
        subdivision.names.english = Some(english);
        subdivision
    }

    #[test]
    fn empty_city_record_is_unknown() {
        let location = location_from_city(&geoip2::City::default());
        assert_eq!(location.country_name, UNKNOWN);
        assert_eq!(location.country_code, None);
        assert_eq!(location.subdivision_name, UNKNOWN);
    }

    #[test]
    fn city_record_uses_finest_subdivision() {
        let mut city = geoip2::City::default();
        city.country.names.english = Some("United Kingdom");
        city.country.iso_code = Some("GB");
        city.subdivisions = vec![subdivision("England"), subdivision("Oxfordshire")];

        assert_eq!(
            location_from_city(&city),
            Location::new("United Kingdom", "GB", "Oxfordshire")
        );
    }

    #[test]
    fn city_record_without_iso_code() {
        let mut city = geoip2::City::default();
        city.country.names.english = Some("Germany");
        city.subdivisions = vec![geoip2::city::Subdivision::default()];

        let location = location_from_city(&city);
        assert_eq!(location.country_name, "Germany");
        assert_eq!(location.country_code, None);
        assert_eq!(location.subdivision_name, UNKNOWN);
        assert!(!location.in_country("DE"));
    }

    #[test]
    fn static_resolver_misses_unknown_addresses() {
        let resolver = StaticResolver::new().with(
            "1.2.3.4",
            Location::new("United States", "US", "California"),
        );
        assert_eq!(
            resolver.resolve("1.2.3.4"),
            Some(Location::new("United States", "US", "California"))
        );
        assert_eq!(resolver.resolve("5.6.7.8"), None);
    }

    #[test]
    fn country_membership_uses_iso_code() {
        let location = Location::new("United States", "US", "Texas");
        assert!(location.in_country("US"));
        assert!(!location.in_country("CA"));

        let no_code = Location {
            country_code: None,
            ..location
        };
        assert!(!no_code.in_country("US"));
    }
}
