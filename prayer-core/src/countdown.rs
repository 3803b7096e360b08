//! Next-prayer countdown, ticking once per second, with one-shot threshold events.

use chrono::{DateTime, NaiveDate, TimeZone};
use std::{collections::HashSet, sync::Arc, time::Duration};
use tokio::{
    sync::{mpsc, watch},
    task::JoinHandle,
    time::MissedTickBehavior,
};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::{
    clock::Clock,
    model::{Language, NextPrayer, PrayerName, PrayerTimesResult, Timings},
};

/// Minutes-left marks that raise a notification, once per prayer per day.
pub const THRESHOLDS_MINUTES: [u32; 2] = [30, 10];

/// The first obligatory prayer strictly after `now`, on `now`'s calendar day.
pub fn next_prayer<Tz: TimeZone>(timings: &Timings, now: &DateTime<Tz>) -> Option<NextPrayer> {
    let today = now.date_naive();

    PrayerName::obligatory().iter().find_map(|&name| {
        let time = timings.time_of(name)?;
        let at = now.timezone().from_local_datetime(&today.and_time(time)).earliest()?;
        let remaining_ms = (at - now.clone()).num_milliseconds();

        (remaining_ms > 0).then(|| NextPrayer {
            name,
            time_of_day: time.format("%H:%M").to_string(),
            remaining_ms,
        })
    })
}

/// `2h 30m`, `5m 3s` or `42s`; hours only from one hour up.
pub fn format_remaining(ms: i64, language: Language) -> String {
    let total_seconds = ms.max(0) / 1000;
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    let (h, m, s) = match language {
        Language::En => ("h", "m", "s"),
        Language::Tr => ("sa", "dk", "sn"),
    };

    if hours > 0 {
        format!("{hours}{h} {minutes}{m}")
    } else if minutes > 0 {
        format!("{minutes}{m} {seconds}{s}")
    } else {
        format!("{seconds}{s}")
    }
}

/// What the status indicator shows for one tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CountdownDisplay {
    Loading,
    AllPassed,
    Countdown(NextPrayer),
}

impl CountdownDisplay {
    pub fn status_text(&self, language: Language) -> String {
        match (self, language) {
            (CountdownDisplay::Loading, Language::En) => "Loading prayer times...".to_string(),
            (CountdownDisplay::Loading, Language::Tr) => "Namaz vakitleri yükleniyor...".to_string(),
            (CountdownDisplay::AllPassed, Language::En) => "All prayers completed for today".to_string(),
            (CountdownDisplay::AllPassed, Language::Tr) => "Bugünkü namazlar tamamlandı".to_string(),
            (CountdownDisplay::Countdown(next), _) => format!(
                "{}: {} ({})",
                next.name.label(language),
                next.time_of_day,
                format_remaining(next.remaining_ms, language)
            ),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ThresholdEvent {
    pub prayer: PrayerName,
    pub minutes_left: u32,
}

/// Countdown state between ticks.
#[derive(Debug, Default)]
pub struct Countdown {
    result: Option<PrayerTimesResult>,
    notified: HashSet<ThresholdEvent>,
}

impl Countdown {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the timings being counted down to. Fired thresholds are forgotten
    /// when the new result belongs to a different day.
    pub fn install(&mut self, result: Option<PrayerTimesResult>) {
        let new_day = day_of(&result) != day_of(&self.result);
        if new_day {
            self.notified.clear();
        }
        self.result = result;
    }

    pub fn result(&self) -> Option<&PrayerTimesResult> {
        self.result.as_ref()
    }

    pub fn tick<Tz: TimeZone>(&mut self, now: &DateTime<Tz>) -> (CountdownDisplay, Vec<ThresholdEvent>) {
        let Some(result) = self.result.as_ref().filter(|r| r.succeeded) else {
            return (CountdownDisplay::Loading, Vec::new());
        };

        let Some(next) = next_prayer(&result.timings, now) else {
            return (CountdownDisplay::AllPassed, Vec::new());
        };

        let minutes_left = next.remaining_ms / 60_000;
        let mut events = Vec::new();
        for threshold in THRESHOLDS_MINUTES {
            let event = ThresholdEvent { prayer: next.name, minutes_left: threshold };
            if minutes_left == i64::from(threshold) && self.notified.insert(event) {
                events.push(event);
            }
        }

        (CountdownDisplay::Countdown(next), events)
    }
}

fn day_of(result: &Option<PrayerTimesResult>) -> Option<NaiveDate> {
    result.as_ref().map(|r| r.date.date)
}

/// Drives a [`Countdown`] once per second until cancelled.
#[derive(Debug)]
pub struct CountdownScheduler {
    clock: Arc<dyn Clock>,
    period: Duration,
}

/// Handle to a running scheduler.
#[derive(Debug)]
pub struct CountdownHandle {
    cancel: CancellationToken,
    join: JoinHandle<()>,
}

impl CountdownHandle {
    /// Stop future ticks. The last published display is left as is.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub async fn join(self) {
        if let Err(e) = self.join.await {
            debug!(error = %e, "countdown task ended abnormally");
        }
    }
}

impl CountdownScheduler {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock, period: Duration::from_secs(1) }
    }

    pub fn spawn(
        self,
        mut results: watch::Receiver<Option<PrayerTimesResult>>,
        display: watch::Sender<CountdownDisplay>,
        events: mpsc::UnboundedSender<ThresholdEvent>,
        cancel: CancellationToken,
    ) -> CountdownHandle {
        let token = cancel.clone();

        let join = tokio::spawn(async move {
            let mut countdown = Countdown::new();
            countdown.install(results.borrow_and_update().clone());

            let mut interval = tokio::time::interval(self.period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    _ = interval.tick() => {}
                }

                if results.has_changed().unwrap_or(false) {
                    countdown.install(results.borrow_and_update().clone());
                }

                let (state, fired) = countdown.tick(&self.clock.now());
                display.send_replace(state);

                for event in fired {
                    if events.send(event).is_err() {
                        debug!(?event, "no notifier listening");
                    }
                }
            }
        });

        CountdownHandle { cancel, join }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{clock::ManualClock, model::DateInfo};
    use chrono::{Duration as ChronoDuration, Local, Utc};

    fn timings() -> Timings {
        Timings {
            fajr: "05:00".into(),
            sunrise: "06:30".into(),
            dhuhr: "13:00".into(),
            asr: "16:30".into(),
            sunset: "19:58".into(),
            maghrib: "20:00".into(),
            isha: "21:30".into(),
        }
    }

    fn result_for(day: u32) -> PrayerTimesResult {
        PrayerTimesResult {
            succeeded: true,
            status_text: "OK".into(),
            date: DateInfo::for_day(NaiveDate::from_ymd_opt(2024, 6, day).unwrap(), 0),
            timings: timings(),
        }
    }

    fn utc(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 14, h, m, s).unwrap()
    }

    #[test]
    fn next_prayer_after_dhuhr_is_asr() {
        let next = next_prayer(&timings(), &utc(14, 0, 0)).unwrap();
        assert_eq!(next.name, PrayerName::Asr);
        assert_eq!(next.time_of_day, "16:30");
        assert_eq!(next.remaining_ms, (2 * 60 + 30) * 60 * 1000);
    }

    #[test]
    fn exact_prayer_time_moves_to_the_next() {
        let next = next_prayer(&timings(), &utc(13, 0, 0)).unwrap();
        assert_eq!(next.name, PrayerName::Asr);
    }

    #[test]
    fn nothing_left_after_isha() {
        assert_eq!(next_prayer(&timings(), &utc(21, 30, 1)), None);
    }

    #[test]
    fn sunrise_is_not_a_prayer_and_sentinels_are_skipped() {
        let mut t = timings();
        t.dhuhr = "--:--".into();
        let next = next_prayer(&t, &utc(6, 0, 0)).unwrap();
        assert_eq!(next.name, PrayerName::Asr);
    }

    #[test]
    fn remaining_formats() {
        assert_eq!(format_remaining(9_000_000, Language::En), "2h 30m");
        assert_eq!(format_remaining(303_000, Language::En), "5m 3s");
        assert_eq!(format_remaining(42_999, Language::En), "42s");
        assert_eq!(format_remaining(9_000_000, Language::Tr), "2sa 30dk");
    }

    #[test]
    fn status_texts() {
        let next = next_prayer(&timings(), &utc(14, 0, 0)).unwrap();
        assert_eq!(CountdownDisplay::Countdown(next.clone()).status_text(Language::En), "Asr: 16:30 (2h 30m)");
        assert_eq!(CountdownDisplay::Countdown(next).status_text(Language::Tr), "İkindi: 16:30 (2sa 30dk)");
        assert_eq!(CountdownDisplay::Loading.status_text(Language::En), "Loading prayer times...");
    }

    #[test]
    fn failed_or_missing_result_shows_loading() {
        let mut countdown = Countdown::new();
        assert_eq!(countdown.tick(&utc(14, 0, 0)).0, CountdownDisplay::Loading);

        let mut failed = result_for(14);
        failed.succeeded = false;
        countdown.install(Some(failed));
        assert_eq!(countdown.tick(&utc(14, 0, 0)).0, CountdownDisplay::Loading);
    }

    #[test]
    fn all_passed_display() {
        let mut countdown = Countdown::new();
        countdown.install(Some(result_for(14)));
        assert_eq!(countdown.tick(&utc(23, 0, 0)), (CountdownDisplay::AllPassed, vec![]));
    }

    #[test]
    fn thresholds_fire_once() {
        let mut countdown = Countdown::new();
        countdown.install(Some(result_for(14)));

        // 31 minutes before Asr
        assert!(countdown.tick(&utc(15, 59, 0)).1.is_empty());

        let (_, fired) = countdown.tick(&utc(16, 0, 0));
        assert_eq!(fired, vec![ThresholdEvent { prayer: PrayerName::Asr, minutes_left: 30 }]);
        assert!(countdown.tick(&utc(16, 0, 30)).1.is_empty());

        assert!(countdown.tick(&utc(16, 19, 0)).1.is_empty());
        let (_, fired) = countdown.tick(&utc(16, 20, 0));
        assert_eq!(fired, vec![ThresholdEvent { prayer: PrayerName::Asr, minutes_left: 10 }]);
        assert!(countdown.tick(&utc(16, 20, 59)).1.is_empty());
    }

    #[test]
    fn same_day_reinstall_keeps_fired_thresholds() {
        let mut countdown = Countdown::new();
        countdown.install(Some(result_for(14)));
        assert_eq!(countdown.tick(&utc(15, 59, 30)).1.len(), 1);

        countdown.install(Some(result_for(14)));
        assert!(countdown.tick(&utc(15, 59, 40)).1.is_empty());

        countdown.install(Some(result_for(15)));
        assert_eq!(countdown.tick(&utc(15, 59, 50)).1.len(), 1);
    }

    fn local(h: u32, m: u32, s: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 6, 14, h, m, s).earliest().unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn scheduler_publishes_display_and_events() {
        let clock = Arc::new(ManualClock::new(local(15, 58, 0)));
        let (results_tx, results_rx) = watch::channel(None);
        let (display_tx, mut display_rx) = watch::channel(CountdownDisplay::Loading);
        let (events_tx, mut events_rx) = mpsc::unbounded_channel();

        let handle = CountdownScheduler::new(clock.clone()).spawn(
            results_rx,
            display_tx,
            events_tx,
            CancellationToken::new(),
        );

        results_tx.send_replace(Some(result_for(14)));
        display_rx
            .wait_for(|d| matches!(d, CountdownDisplay::Countdown(n) if n.name == PrayerName::Asr))
            .await
            .unwrap();

        clock.set(local(16, 0, 0));
        let event = events_rx.recv().await.unwrap();
        assert_eq!(event, ThresholdEvent { prayer: PrayerName::Asr, minutes_left: 30 });

        clock.advance(ChronoDuration::seconds(1));
        tokio::time::sleep(Duration::from_secs(3)).await;
        assert!(events_rx.try_recv().is_err());

        handle.cancel();
        handle.join().await;
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_stops_ticks_and_keeps_last_display() {
        let clock = Arc::new(ManualClock::new(local(14, 0, 0)));
        let (_results_tx, results_rx) = watch::channel(Some(result_for(14)));
        let (display_tx, mut display_rx) = watch::channel(CountdownDisplay::Loading);
        let (events_tx, _events_rx) = mpsc::unbounded_channel();

        let handle = CountdownScheduler::new(clock.clone()).spawn(
            results_rx,
            display_tx,
            events_tx,
            CancellationToken::new(),
        );

        display_rx.wait_for(|d| matches!(d, CountdownDisplay::Countdown(_))).await.unwrap();
        handle.cancel();
        handle.join().await;

        let last = display_rx.borrow().clone();
        clock.set(local(23, 0, 0));
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(*display_rx.borrow(), last);
    }
}
