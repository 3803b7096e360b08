use std::sync::Arc;

use crate::{cache::ExpiringCache, config::Config, fetch::ResilientFetcher, model::Location};

pub mod location;
pub mod prayer_times;

pub use location::LocationResolver;
pub use prayer_times::PrayerTimeResolver;

/// Knobs shared by both resolvers, taken from [`Config`].
#[derive(Debug, Clone)]
pub struct ResolverSettings {
    pub cache_ttl_hours: u32,
    pub retry_attempts: u32,
    pub geo_endpoints: Vec<String>,
    pub default_location: Location,
    pub fixed_location: Option<Location>,
    pub prayer_api_url: String,
    pub calculation_method: u32,
}

impl From<&Config> for ResolverSettings {
    fn from(config: &Config) -> Self {
        Self {
            cache_ttl_hours: config.cache_ttl_hours,
            retry_attempts: config.retry_attempts,
            geo_endpoints: config.geo_endpoints.clone(),
            default_location: config.default_location.clone(),
            fixed_location: config.location.clone(),
            prayer_api_url: config.prayer_api_url.clone(),
            calculation_method: config.calculation_method,
        }
    }
}

/// Build the location and prayer times resolvers over one cache and fetcher.
pub fn resolvers_from_config(
    config: &Config,
    cache: ExpiringCache,
    fetcher: ResilientFetcher,
) -> (Arc<LocationResolver>, PrayerTimeResolver) {
    let settings = ResolverSettings::from(config);
    let location = Arc::new(LocationResolver::new(cache.clone(), fetcher.clone(), settings.clone()));
    let prayer_times = PrayerTimeResolver::new(cache, fetcher, location.clone(), settings);
    (location, prayer_times)
}
