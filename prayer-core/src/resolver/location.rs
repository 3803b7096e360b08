use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, error, info};

use crate::{
    cache::{ExpiringCache, LOCATION_KEY},
    error::ResolveError,
    fetch::ResilientFetcher,
    model::Location,
};

use super::ResolverSettings;

/// Resolves the user's country and city from their IP address.
#[derive(Debug, Clone)]
pub struct LocationResolver {
    cache: ExpiringCache,
    fetcher: ResilientFetcher,
    settings: ResolverSettings,
}

impl LocationResolver {
    pub fn new(cache: ExpiringCache, fetcher: ResilientFetcher, settings: ResolverSettings) -> Self {
        Self { cache, fetcher, settings }
    }

    /// Cached location, else a fresh lookup, else the configured default.
    pub async fn resolve(&self) -> Location {
        if let Some(fixed) = &self.settings.fixed_location {
            return fixed.clone();
        }

        if let Some(cached) = self.cache.get::<Location>(LOCATION_KEY) {
            debug!(%cached, "using cached location");
            return cached;
        }

        match self.fetch_location().await {
            Ok(location) => {
                info!(%location, "resolved location from IP");
                self.set_location(&location);
                location
            }
            Err(e) => {
                error!(error = %e, default = %self.settings.default_location,
                    "failed to resolve location, using default");
                self.settings.default_location.clone()
            }
        }
    }

    /// The pinned or cached location, without touching the network.
    pub fn cached(&self) -> Option<Location> {
        self.settings
            .fixed_location
            .clone()
            .or_else(|| self.cache.get::<Location>(LOCATION_KEY))
    }

    pub async fn force_refresh(&self) -> Location {
        self.cache.delete(LOCATION_KEY);
        self.resolve().await
    }

    pub fn set_location(&self, location: &Location) {
        self.cache.set(LOCATION_KEY, location, self.settings.cache_ttl_hours);
    }

    async fn fetch_location(&self) -> Result<Location, ResolveError> {
        let json = self
            .fetcher
            .try_multiple_endpoints(&self.settings.geo_endpoints, self.settings.retry_attempts)
            .await?;

        parse_location(json)
    }
}

/// Either `{country_name, city}` or `{country, city}`.
#[derive(Debug, Default, Deserialize)]
struct GeoResponse {
    country_name: Option<String>,
    country: Option<String>,
    city: Option<String>,
}

pub fn parse_location(json: Value) -> Result<Location, ResolveError> {
    // serde would also fill the struct from an array by position.
    let parsed: GeoResponse = if json.is_object() {
        serde_json::from_value(json).unwrap_or_default()
    } else {
        GeoResponse::default()
    };

    let country = [parsed.country_name, parsed.country]
        .into_iter()
        .flatten()
        .map(|c| c.trim().to_string())
        .find(|c| !c.is_empty())
        .unwrap_or_default();
    let city = parsed.city.map(|c| c.trim().to_string()).unwrap_or_default();

    if country.is_empty() || city.is_empty() {
        return Err(ResolveError::InvalidLocationData { country, city });
    }

    Ok(Location { country, city })
}
