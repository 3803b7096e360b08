//! Core library for the `prayer` CLI.
//!
//! This crate defines:
//! - An expiring cache over a pluggable key-value store
//! - HTTP fetching with retries, backoff and endpoint fallback
//! - Location and prayer times resolution with graceful fallbacks
//! - The next-prayer countdown, threshold notifications and refresh scheduling
//!
//! It is used by `prayer-cli`, but any host able to render a status line and a
//! panel can drive it through [`PrayerApp`].

pub mod app;
pub mod cache;
pub mod clock;
pub mod config;
pub mod countdown;
pub mod error;
pub mod fetch;
pub mod model;
pub mod notify;
pub mod refresh;
pub mod resolver;
pub mod store;
pub mod view;

pub use app::{Host, PrayerApp};
pub use cache::ExpiringCache;
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::Config;
pub use countdown::{CountdownDisplay, CountdownScheduler, ThresholdEvent};
pub use error::{FetchError, ResolveError};
pub use fetch::{HttpTransport, ReqwestTransport, ResilientFetcher};
pub use model::{Language, Location, NextPrayer, PrayerName, PrayerTimesResult, Timings};
pub use notify::{NoticeLevel, NoticeSink};
pub use resolver::{LocationResolver, PrayerTimeResolver};
pub use store::{FileStore, KeyValueStore, MemoryStore};
pub use view::{ViewMessage, ViewSignal, ViewSink};
