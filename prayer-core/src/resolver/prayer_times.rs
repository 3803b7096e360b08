use chrono::NaiveDate;
use reqwest::Url;
use serde::Deserialize;
use serde_json::Value;
use std::sync::{Arc, Mutex};
use tracing::{debug, error, info};

use crate::{
    cache::{ExpiringCache, prayer_times_key},
    error::ResolveError,
    fetch::ResilientFetcher,
    model::{DateInfo, Location, PrayerTimesResult, Timings, clean_time},
};

use super::{LocationResolver, ResolverSettings};

/// Resolves today's prayer timings for the current location.
#[derive(Debug, Clone)]
pub struct PrayerTimeResolver {
    cache: ExpiringCache,
    fetcher: ResilientFetcher,
    location: Arc<LocationResolver>,
    settings: ResolverSettings,
    last_location: Arc<Mutex<Option<Location>>>,
}

impl PrayerTimeResolver {
    pub fn new(
        cache: ExpiringCache,
        fetcher: ResilientFetcher,
        location: Arc<LocationResolver>,
        settings: ResolverSettings,
    ) -> Self {
        Self { cache, fetcher, location, settings, last_location: Arc::default() }
    }

    /// The location the last fetch was made for, if this process fetched at all.
    pub fn last_location(&self) -> Option<Location> {
        self.last_location.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Today's cached result, else a fresh fetch, else a placeholder.
    pub async fn resolve(&self) -> PrayerTimesResult {
        let today = self.cache.today();
        let key = prayer_times_key(today);

        if let Some(cached) = self.cache.get::<PrayerTimesResult>(&key) {
            debug!(%key, "using cached prayer times");
            return cached;
        }

        let location = self.location.resolve().await;
        *self.last_location.lock().unwrap_or_else(|e| e.into_inner()) = Some(location.clone());

        match self.fetch(&location).await {
            Ok(result) => {
                info!(%location, date = %result.date.date, "fetched prayer times");
                self.cache.set(&key, &result, self.settings.cache_ttl_hours);
                result
            }
            Err(e) => {
                error!(%location, error = %e, "failed to fetch prayer times");
                self.placeholder(today)
            }
        }
    }

    pub async fn force_refresh(&self) -> PrayerTimesResult {
        self.cache.delete(&prayer_times_key(self.cache.today()));
        self.resolve().await
    }

    /// Drops today's entry without refetching.
    pub fn clear_cache(&self) {
        self.cache.delete(&prayer_times_key(self.cache.today()));
    }

    pub fn request_url(&self, location: &Location) -> Result<Url, ResolveError> {
        let method = self.settings.calculation_method.to_string();
        Url::parse_with_params(
            &self.settings.prayer_api_url,
            &[
                ("city", location.city.as_str()),
                ("country", location.country.as_str()),
                ("method", method.as_str()),
            ],
        )
        .map_err(|e| ResolveError::InvalidApiResponse(format!("invalid prayer API url: {e}")))
    }

    async fn fetch(&self, location: &Location) -> Result<PrayerTimesResult, ResolveError> {
        let url = self.request_url(location)?;
        let json = self.fetcher.fetch(url.as_str(), self.settings.retry_attempts).await?;
        map_response(json)
    }

    fn placeholder(&self, today: NaiveDate) -> PrayerTimesResult {
        PrayerTimesResult::placeholder(today, self.cache.now_ms() / 1000)
    }
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    code: i64,
    #[serde(default)]
    status: String,
    data: Option<ApiData>,
}

#[derive(Debug, Deserialize)]
struct ApiData {
    date: ApiDate,
    timings: Timings,
}

#[derive(Debug, Deserialize)]
struct ApiDate {
    timestamp: Value,
    gregorian: ApiGregorian,
}

#[derive(Debug, Deserialize)]
struct ApiGregorian {
    /// `DD-MM-YYYY`
    date: String,
    weekday: ApiWeekday,
}

#[derive(Debug, Deserialize)]
struct ApiWeekday {
    en: String,
}

/// Maps the remote schema into a [`PrayerTimesResult`].
pub fn map_response(json: Value) -> Result<PrayerTimesResult, ResolveError> {
    let parsed: ApiResponse = serde_json::from_value(json)
        .map_err(|e| ResolveError::InvalidApiResponse(format!("unexpected shape: {e}")))?;

    if parsed.code != 200 {
        return Err(ResolveError::InvalidApiResponse(format!(
            "code {}: {}",
            parsed.code,
            if parsed.status.is_empty() { "Unknown error" } else { parsed.status.as_str() }
        )));
    }

    let data = parsed
        .data
        .ok_or_else(|| ResolveError::InvalidApiResponse("missing data payload".to_string()))?;

    let timestamp = match &data.date.timestamp {
        Value::String(s) => s.trim().parse::<i64>().ok(),
        Value::Number(n) => n.as_i64(),
        _ => None,
    }
    .ok_or_else(|| {
        ResolveError::InvalidApiResponse(format!("invalid timestamp {}", data.date.timestamp))
    })?;

    let date = NaiveDate::parse_from_str(&data.date.gregorian.date, "%d-%m-%Y")
        .or_else(|_| NaiveDate::parse_from_str(&data.date.gregorian.date, "%Y-%m-%d"))
        .map_err(|e| {
            ResolveError::InvalidApiResponse(format!(
                "invalid date {:?}: {e}",
                data.date.gregorian.date
            ))
        })?;

    let t = &data.timings;
    let clean = |s: &str| clean_time(s).to_string();

    Ok(PrayerTimesResult {
        succeeded: true,
        status_text: parsed.status,
        date: DateInfo { timestamp, date, weekday: data.date.gregorian.weekday.en },
        timings: Timings {
            fajr: clean(&t.fajr),
            sunrise: clean(&t.sunrise),
            dhuhr: clean(&t.dhuhr),
            asr: clean(&t.asr),
            sunset: clean(&t.sunset),
            maghrib: clean(&t.maghrib),
            isha: clean(&t.isha),
        },
    })
}


#[cfg(test)]
mod tests {
    use super::fixtures::aladhan_ok;
    use super::*;
    use crate::{
        clock::ManualClock,
        fetch::testing::{Reply, ScriptedTransport},
        model::{PrayerName, SENTINEL_TIME},
        store::{KeyValueStore, MemoryStore},
    };
    use chrono::{Duration, Local, TimeZone};
    use serde_json::json;

    const API: &str = "https://prayer.test/timings";
    const GEO: &str = "https://geo.test/json";

    struct Harness {
        resolver: PrayerTimeResolver,
        transport: Arc<ScriptedTransport>,
        clock: Arc<ManualClock>,
        store: Arc<MemoryStore>,
    }

    fn harness(transport: ScriptedTransport) -> Harness {
        let start = Local.with_ymd_and_hms(2024, 6, 14, 9, 0, 0).earliest().unwrap();
        let clock = Arc::new(ManualClock::new(start));
        let store = Arc::new(MemoryStore::new());
        let transport = Arc::new(transport);
        let cache = ExpiringCache::new(store.clone(), clock.clone());
        let fetcher = ResilientFetcher::new(transport.clone(), 1_000);
        let settings = ResolverSettings {
            cache_ttl_hours: 24,
            retry_attempts: 2,
            geo_endpoints: vec![GEO.to_string()],
            default_location: Location::new("Turkey", "Istanbul"),
            fixed_location: None,
            prayer_api_url: API.to_string(),
            calculation_method: 14,
        };
        let location = Arc::new(LocationResolver::new(cache.clone(), fetcher.clone(), settings.clone()));
        let resolver = PrayerTimeResolver::new(cache, fetcher, location, settings);
        Harness { resolver, transport, clock, store }
    }

    fn geo_ok() -> Reply {
        Reply::Json(json!({"country_name": "Turkey", "city": "Ankara"}))
    }

    #[test]
    fn maps_response_and_strips_timezones() {
        let result = map_response(aladhan_ok("14-06-2024", "Friday")).unwrap();

        assert!(result.succeeded);
        assert_eq!(result.status_text, "OK");
        assert_eq!(result.date.timestamp, 1_718_352_000);
        assert_eq!(result.date.date, NaiveDate::from_ymd_opt(2024, 6, 14).unwrap());
        assert_eq!(result.date.weekday, "Friday");
        assert_eq!(result.timings.get(PrayerName::Fajr), "04:21");
        assert_eq!(result.timings.get(PrayerName::Isha), "22:05");
    }

    #[test]
    fn rejects_non_200_code_and_missing_data() {
        let err = map_response(json!({"code": 400, "status": "Bad Request", "data": null})).unwrap_err();
        assert!(err.to_string().contains("Bad Request"));

        let err = map_response(json!({"code": 200, "status": "OK"})).unwrap_err();
        assert!(err.to_string().contains("missing data payload"));
    }

    #[test]
    fn request_url_carries_location_and_method() {
        let h = harness(ScriptedTransport::new());
        let url = h.resolver.request_url(&Location::new("Turkey", "Şanlıurfa")).unwrap();

        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(
            pairs,
            vec![
                ("city".to_string(), "Şanlıurfa".to_string()),
                ("country".to_string(), "Turkey".to_string()),
                ("method".to_string(), "14".to_string()),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn resolves_and_caches_per_day() {
        let h = harness(
            ScriptedTransport::new()
                .script(GEO, vec![geo_ok()])
                .script(API, vec![Reply::Json(aladhan_ok("14-06-2024", "Friday"))]),
        );

        let first = h.resolver.resolve().await;
        let second = h.resolver.resolve().await;

        assert!(first.succeeded);
        assert_eq!(first, second);
        assert_eq!(h.transport.call_count(API), 1);
        assert!(h.store.get("prayerTimesCache_2024-06-14").is_some());

        let (url, _) = &h.transport.calls()[1];
        assert!(url.contains("city=Ankara"));
        assert_eq!(h.resolver.last_location(), Some(Location::new("Turkey", "Ankara")));
    }

    #[tokio::test(start_paused = true)]
    async fn records_default_location_when_geolocation_fails() {
        let h = harness(
            ScriptedTransport::new()
                .script(GEO, vec![Reply::Status(503)])
                .script(API, vec![Reply::Json(aladhan_ok("14-06-2024", "Friday"))]),
        );

        assert_eq!(h.resolver.last_location(), None);
        h.resolver.resolve().await;
        assert_eq!(h.resolver.last_location(), Some(Location::new("Turkey", "Istanbul")));
        assert_eq!(h.transport.call_count(GEO), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn next_day_uses_its_own_key() {
        let h = harness(
            ScriptedTransport::new().script(GEO, vec![geo_ok()]).script(
                API,
                vec![
                    Reply::Json(aladhan_ok("14-06-2024", "Friday")),
                    Reply::Json(aladhan_ok("15-06-2024", "Saturday")),
                ],
            ),
        );

        h.resolver.resolve().await;
        h.clock.advance(Duration::days(1));
        let next = h.resolver.resolve().await;

        assert_eq!(next.date.weekday, "Saturday");
        assert!(h.store.get("prayerTimesCache_2024-06-14").is_some());
        assert!(h.store.get("prayerTimesCache_2024-06-15").is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn failure_yields_uncached_placeholder() {
        let h = harness(
            ScriptedTransport::new()
                .script(GEO, vec![geo_ok()])
                .script(API, vec![Reply::Json(json!({"code": 500, "status": "Down"}))]),
        );

        let result = h.resolver.resolve().await;

        assert!(!result.succeeded);
        assert_eq!(result.status_text, "Error");
        assert_eq!(result.date.date, NaiveDate::from_ymd_opt(2024, 6, 14).unwrap());
        assert_eq!(result.date.weekday, "Friday");
        assert_eq!(result.timings.get(PrayerName::Asr), SENTINEL_TIME);
        assert!(h.store.get("prayerTimesCache_2024-06-14").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn network_failure_retries_then_placeholder() {
        let h = harness(
            ScriptedTransport::new()
                .script(GEO, vec![geo_ok()])
                .script(API, vec![Reply::Status(502)]),
        );

        let result = h.resolver.resolve().await;
        assert!(!result.succeeded);
        assert_eq!(h.transport.call_count(API), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn force_refresh_refetches_today() {
        let h = harness(
            ScriptedTransport::new()
                .script(GEO, vec![geo_ok()])
                .script(API, vec![Reply::Json(aladhan_ok("14-06-2024", "Friday"))]),
        );

        h.resolver.resolve().await;
        h.resolver.force_refresh().await;
        assert_eq!(h.transport.call_count(API), 2);
        // Location stays cached across a prayer-times refresh.
        assert_eq!(h.transport.call_count(GEO), 1);

        h.resolver.clear_cache();
        assert!(h.store.get("prayerTimesCache_2024-06-14").is_none());
    }
}
