use chrono::{DateTime, Days, NaiveTime, TimeZone};
use std::{sync::Arc, time::Duration};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::{app::PrayerApp, clock::Clock};

/// Seconds past midnight at which the new day's timings are fetched.
pub const MIDNIGHT_MARGIN_SECS: u32 = 5;

/// When the next automatic refresh should run.
///
/// Normally this is just after the coming local midnight. After a failed load the
/// refresh comes sooner, `failure_retry` from now, but never later than midnight.
pub fn next_refresh_at<Tz: TimeZone>(
    now: &DateTime<Tz>,
    last_succeeded: bool,
    failure_retry: chrono::Duration,
) -> DateTime<Tz> {
    let margin = NaiveTime::from_hms_opt(0, 0, MIDNIGHT_MARGIN_SECS).unwrap_or_default();
    let midnight = now
        .date_naive()
        .checked_add_days(Days::new(1))
        .map(|tomorrow| tomorrow.and_time(margin))
        .and_then(|local| now.timezone().from_local_datetime(&local).earliest())
        .unwrap_or_else(|| now.clone() + chrono::Duration::hours(1));

    if last_succeeded {
        midnight
    } else {
        midnight.min(now.clone() + failure_retry)
    }
}

/// Reloads prayer times at each wake-up computed by [`next_refresh_at`] until cancelled.
pub fn spawn_auto_refresh(
    app: Arc<PrayerApp>,
    clock: Arc<dyn Clock>,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    let failure_retry = chrono::Duration::minutes(i64::from(app.config().failure_retry_minutes));

    tokio::spawn(async move {
        loop {
            let now = clock.now();
            let last_succeeded = app.latest().is_some_and(|r| r.succeeded);
            let at = next_refresh_at(&now, last_succeeded, failure_retry);
            let wait = (at - now).to_std().unwrap_or(Duration::ZERO);
            debug!(%at, ?wait, "next automatic refresh scheduled");

            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(wait) => {}
            }

            info!("running automatic refresh");
            app.load().await;
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, Utc};

    fn at(d: u32, h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, d, h, m, s).unwrap()
    }

    #[test]
    fn wakes_after_midnight_when_healthy() {
        let next = next_refresh_at(&at(14, 13, 0, 0), true, chrono::Duration::minutes(60));
        assert_eq!(next, at(15, 0, 0, 5));
    }

    #[test]
    fn retries_sooner_after_failure() {
        let next = next_refresh_at(&at(14, 13, 0, 0), false, chrono::Duration::minutes(60));
        assert_eq!(next, at(14, 14, 0, 0));
    }

    #[test]
    fn failure_retry_never_skips_midnight() {
        let next = next_refresh_at(&at(14, 23, 30, 0), false, chrono::Duration::minutes(60));
        assert_eq!(next, at(15, 0, 0, 5));
    }

    #[test]
    fn uses_the_local_calendar_day() {
        let tz = FixedOffset::east_opt(3 * 3600).unwrap();
        let now = tz.with_ymd_and_hms(2024, 6, 14, 22, 0, 0).unwrap();
        let next = next_refresh_at(&now, true, chrono::Duration::minutes(60));
        assert_eq!(next, tz.with_ymd_and_hms(2024, 6, 15, 0, 0, 5).unwrap());
    }

    #[test]
    fn just_after_midnight_waits_for_the_next_one() {
        let next = next_refresh_at(&at(15, 0, 0, 5), true, chrono::Duration::minutes(60));
        assert_eq!(next, at(16, 0, 0, 5));
    }
}
