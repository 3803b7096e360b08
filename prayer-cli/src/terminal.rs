use chrono::{DateTime, Local};
use prayer_core::{
    Clock, Language, NoticeLevel, NoticeSink, PrayerName, PrayerTimesResult, ViewMessage, ViewSink,
    countdown::{CountdownDisplay, format_remaining, next_prayer},
};
use std::{io::Write, sync::Arc};

/// Renders the timings panel to stdout and notices to stderr.
#[derive(Debug)]
pub struct Terminal {
    language: Language,
    show_panel: bool,
    clock: Arc<dyn Clock>,
}

impl Terminal {
    pub fn new(language: Language, show_panel: bool, clock: Arc<dyn Clock>) -> Self {
        Self { language, show_panel, clock }
    }

    pub fn panel(&self, result: &PrayerTimesResult) -> String {
        render_panel(result, self.language, &self.clock.now())
    }
}

impl ViewSink for Terminal {
    fn post(&self, message: &ViewMessage) {
        if !self.show_panel {
            return;
        }

        match message {
            ViewMessage::UpdatePrayerTimes { prayer_times } => {
                let mut out = std::io::stdout().lock();
                // Start on a clean line in case the status line is active.
                let _ = write!(out, "\r\x1b[2K{}", self.panel(prayer_times));
                let _ = out.flush();
            }
        }
    }
}

impl NoticeSink for Terminal {
    fn notify(&self, level: NoticeLevel, message: &str) {
        let tag = match level {
            NoticeLevel::Info => "info",
            NoticeLevel::Warning => "warning",
            NoticeLevel::Error => "error",
        };
        eprintln!("\r\x1b[2K[{tag}] {message}");
    }
}

pub fn render_panel(result: &PrayerTimesResult, language: Language, now: &DateTime<Local>) -> String {
    let mut out = String::new();

    let heading = match language {
        Language::En => "Prayer times",
        Language::Tr => "Namaz vakitleri",
    };
    out.push_str(&format!(
        "{heading} for {}, {}\n",
        result.date.weekday,
        result.date.date.format("%Y-%m-%d")
    ));

    let highlight = if result.succeeded {
        next_prayer(&result.timings, now).map(|n| n.name)
    } else {
        None
    };

    for name in PrayerName::all() {
        let marker = if Some(*name) == highlight { ">" } else { " " };
        out.push_str(&format!(
            "{marker} {:<12} {}\n",
            name.label(language),
            result.timings.get(*name)
        ));
    }

    if !result.succeeded {
        out.push_str(match language {
            Language::En => "Prayer times are unavailable right now.\n",
            Language::Tr => "Namaz vakitleri şu anda alınamıyor.\n",
        });
    }

    out
}

pub fn render_next(result: &PrayerTimesResult, language: Language, now: &DateTime<Local>) -> String {
    if !result.succeeded {
        return CountdownDisplay::Loading.status_text(language);
    }

    match next_prayer(&result.timings, now) {
        Some(next) => format!(
            "{} {} ({})",
            next.name.label(language),
            next.time_of_day,
            format_remaining(next.remaining_ms, language)
        ),
        None => CountdownDisplay::AllPassed.status_text(language),
    }
}
