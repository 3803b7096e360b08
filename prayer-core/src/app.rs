//! Application context tying the resolvers, view, countdown and notices together.

use std::sync::Arc;
use tokio::{
    sync::{mpsc, watch},
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::{
    cache::ExpiringCache,
    clock::Clock,
    config::Config,
    countdown::{CountdownDisplay, CountdownHandle, CountdownScheduler},
    fetch::{HttpTransport, ResilientFetcher},
    model::{Language, Location, PrayerTimesResult},
    notify::{NoticeLevel, NoticeSink, spawn_notifier},
    resolver::{LocationResolver, PrayerTimeResolver, resolvers_from_config},
    store::KeyValueStore,
    view::{ViewAction, ViewBridge, ViewSignal, ViewSink},
};

/// Host-provided collaborators.
#[derive(Debug, Clone)]
pub struct Host {
    pub store: Arc<dyn KeyValueStore>,
    pub transport: Arc<dyn HttpTransport>,
    pub clock: Arc<dyn Clock>,
    pub view: Arc<dyn ViewSink>,
    pub notices: Arc<dyn NoticeSink>,
}

#[derive(Debug)]
pub struct PrayerApp {
    config: Config,
    clock: Arc<dyn Clock>,
    cache: ExpiringCache,
    location: Arc<LocationResolver>,
    prayer_times: PrayerTimeResolver,
    view: ViewBridge,
    notices: Arc<dyn NoticeSink>,
    results: watch::Sender<Option<PrayerTimesResult>>,
}

impl PrayerApp {
    pub fn new(config: Config, host: Host) -> Self {
        let cache = ExpiringCache::new(host.store, host.clock.clone());
        cache.prune_stale();
        let fetcher = ResilientFetcher::new(host.transport, config.request_timeout_ms);
        let (location, prayer_times) = resolvers_from_config(&config, cache.clone(), fetcher);
        let (results, _) = watch::channel(None);

        Self {
            config,
            clock: host.clock,
            cache,
            location,
            prayer_times,
            view: ViewBridge::new(host.view),
            notices: host.notices,
            results,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn language(&self) -> Language {
        self.config.language
    }

    pub fn clock(&self) -> Arc<dyn Clock> {
        self.clock.clone()
    }

    /// The most recently published result, if any.
    pub fn latest(&self) -> Option<PrayerTimesResult> {
        self.results.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<PrayerTimesResult>> {
        self.results.subscribe()
    }

    /// The location today's timings were fetched for, or the cached one when
    /// they came from the cache. Never goes to the network.
    pub fn location(&self) -> Option<Location> {
        self.prayer_times.last_location().or_else(|| self.location.cached())
    }

    /// Resolve today's timings, preferring the cache, and publish them.
    pub async fn load(&self) -> PrayerTimesResult {
        let result = self.prayer_times.resolve().await;
        if !result.succeeded {
            warn!("prayer times unavailable, showing placeholder");
        }
        self.publish(&result);
        result
    }

    /// "Refresh now": bypass today's cache entry.
    pub async fn refresh_now(&self) -> PrayerTimesResult {
        info!("refreshing prayer times");
        let result = self.prayer_times.force_refresh().await;
        self.publish(&result);

        if !result.succeeded {
            self.notices.notify(NoticeLevel::Error, refresh_failed_text(self.language()));
        }
        result
    }

    /// "Clear cache and refresh": forget the location and today's timings, then refetch.
    pub async fn clear_cache_and_refresh(&self) -> PrayerTimesResult {
        self.cache.clear();
        let result = self.refresh_now().await;

        if result.succeeded {
            self.notices.notify(NoticeLevel::Info, cache_cleared_text(self.language()));
        }
        result
    }

    pub async fn handle_view_signal(&self, signal: ViewSignal) {
        if self.view.handle_signal(signal) == ViewAction::Refresh {
            self.refresh_now().await;
        }
    }

    /// Start the one-second countdown and the notifier consuming its threshold events.
    pub fn start_countdown(
        &self,
        display: watch::Sender<CountdownDisplay>,
        cancel: CancellationToken,
    ) -> (CountdownHandle, JoinHandle<()>) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let notifier = spawn_notifier(events_rx, self.notices.clone(), self.language());
        let countdown =
            CountdownScheduler::new(self.clock.clone()).spawn(self.subscribe(), display, events_tx, cancel);
        (countdown, notifier)
    }

    fn publish(&self, result: &PrayerTimesResult) {
        self.results.send_replace(Some(result.clone()));
        self.view.update_prayer_times(result);
    }
}

fn refresh_failed_text(language: Language) -> &'static str {
    match language {
        Language::En => "Prayer times could not be refreshed. Please check your internet connection.",
        Language::Tr => "Namaz vakitleri güncellenemedi. Lütfen internet bağlantınızı kontrol edin.",
    }
}

fn cache_cleared_text(language: Language) -> &'static str {
    match language {
        Language::En => "Cache cleared and prayer times refreshed.",
        Language::Tr => "Önbellek temizlendi ve veriler yenilendi.",
    }
}
