//! Bridge to the panel that renders the day's timings.

use serde::{Deserialize, Serialize};
use std::{
    fmt::Debug,
    sync::{Arc, Mutex},
};
use tracing::debug;

use crate::model::PrayerTimesResult;

/// Outbound messages, serialized as `{"command": "updatePrayerTimes", ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "camelCase")]
pub enum ViewMessage {
    #[serde(rename_all = "camelCase")]
    UpdatePrayerTimes { prayer_times: PrayerTimesResult },
}

/// Inbound signals from the view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "camelCase")]
pub enum ViewSignal {
    Ready,
    #[serde(alias = "refresh")]
    RefreshRequested,
}

/// What the application should do in response to a [`ViewSignal`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewAction {
    None,
    Refresh,
}

pub trait ViewSink: Send + Sync + Debug {
    fn post(&self, message: &ViewMessage);
}

#[derive(Debug, Default)]
struct BridgeState {
    ready: bool,
    pending: Vec<ViewMessage>,
}

/// Holds messages back until the view reports ready, then delivers them in order.
#[derive(Debug)]
pub struct ViewBridge {
    sink: Arc<dyn ViewSink>,
    state: Mutex<BridgeState>,
}

impl ViewBridge {
    pub fn new(sink: Arc<dyn ViewSink>) -> Self {
        Self { sink, state: Mutex::default() }
    }

    pub fn update_prayer_times(&self, result: &PrayerTimesResult) {
        self.send(ViewMessage::UpdatePrayerTimes { prayer_times: result.clone() });
    }

    pub fn send(&self, message: ViewMessage) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if state.ready {
            self.sink.post(&message);
        } else {
            debug!("view not ready, queueing message");
            state.pending.push(message);
        }
    }

    pub fn handle_signal(&self, signal: ViewSignal) -> ViewAction {
        match signal {
            ViewSignal::Ready => {
                let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
                if !state.ready {
                    state.ready = true;
                    for message in state.pending.drain(..) {
                        self.sink.post(&message);
                    }
                }
                ViewAction::None
            }
            ViewSignal::RefreshRequested => ViewAction::Refresh,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).ready
    }
}
