use std::{fmt::Debug, sync::Arc, sync::Mutex};
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::debug;

use crate::{countdown::ThresholdEvent, model::Language};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

/// Where user-facing, non-blocking notices end up.
pub trait NoticeSink: Send + Sync + Debug {
    fn notify(&self, level: NoticeLevel, message: &str);
}

/// Collects notices in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    notices: Mutex<Vec<(NoticeLevel, String)>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notices(&self) -> Vec<(NoticeLevel, String)> {
        self.notices.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl NoticeSink for MemorySink {
    fn notify(&self, level: NoticeLevel, message: &str) {
        self.notices.lock().unwrap_or_else(|e| e.into_inner()).push((level, message.to_string()));
    }
}

pub fn threshold_notice(event: ThresholdEvent, language: Language) -> (NoticeLevel, String) {
    let name = event.prayer.label(language);
    let minutes = event.minutes_left;

    let level = if minutes <= 10 { NoticeLevel::Warning } else { NoticeLevel::Info };
    let icon = if minutes <= 10 { "⏰" } else { "🕌" };

    let text = match language {
        Language::En => format!("{icon} {minutes} minutes left until {name}!"),
        Language::Tr => format!("{icon} {name} namazına {minutes} dakika kaldı!"),
    };

    (level, text)
}

/// Forwards threshold events to `sink` until every sender is dropped.
pub fn spawn_notifier(
    mut events: mpsc::UnboundedReceiver<ThresholdEvent>,
    sink: Arc<dyn NoticeSink>,
    language: Language,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            let (level, text) = threshold_notice(event, language);
            debug!(?event, "prayer approaching");
            sink.notify(level, &text);
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PrayerName;

    #[test]
    fn thirty_minutes_is_info_ten_is_warning() {
        let event = ThresholdEvent { prayer: PrayerName::Maghrib, minutes_left: 30 };
        assert_eq!(
            threshold_notice(event, Language::En),
            (NoticeLevel::Info, "🕌 30 minutes left until Maghrib!".to_string())
        );

        let event = ThresholdEvent { prayer: PrayerName::Maghrib, minutes_left: 10 };
        assert_eq!(
            threshold_notice(event, Language::Tr),
            (NoticeLevel::Warning, "⏰ Akşam namazına 10 dakika kaldı!".to_string())
        );
    }

    #[tokio::test]
    async fn notifier_drains_channel() {
        let (tx, rx) = mpsc::unbounded_channel();
        let sink = Arc::new(MemorySink::new());
        let handle = spawn_notifier(rx, sink.clone(), Language::En);

        tx.send(ThresholdEvent { prayer: PrayerName::Isha, minutes_left: 30 }).unwrap();
        tx.send(ThresholdEvent { prayer: PrayerName::Isha, minutes_left: 10 }).unwrap();
        drop(tx);
        handle.await.unwrap();

        let notices = sink.notices();
        assert_eq!(notices.len(), 2);
        assert_eq!(notices[1].0, NoticeLevel::Warning);
        assert!(notices[0].1.contains("Isha"));
    }
}
