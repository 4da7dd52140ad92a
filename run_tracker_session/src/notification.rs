use std::str::FromStr;

use run_tracker_lib::stopwatch::format_stopwatch;
use tokio_util::sync::CancellationToken;

use crate::{Command, SessionState, StateBus};

pub const NOTIFICATION_TITLE: &str = "Running App";

/// The single button on the session notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationAction {
    Pause,
    Resume,
}

impl NotificationAction {
    pub fn label(&self) -> &'static str {
        match self {
            NotificationAction::Pause => "Pause",
            NotificationAction::Resume => "Resume",
        }
    }

    pub fn command(&self) -> Command {
        match self {
            NotificationAction::Pause => Command::Pause,
            NotificationAction::Resume => Command::StartOrResume,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TimerPrecision {
    #[default]
    Seconds,
    Centis,
}

impl FromStr for TimerPrecision {
    type Err = ();

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "seconds" => Ok(TimerPrecision::Seconds),
            "centis" => Ok(TimerPrecision::Centis),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NotificationState {
    pub title: &'static str,
    pub content_text: String,
    pub action: NotificationAction,
}

impl NotificationState {
    /// Built from scratch every time. There is no notification without a session.
    pub fn build(state: SessionState, elapsed_millis: i64, precision: TimerPrecision) -> Option<Self> {
        let action = match state {
            SessionState::Tracking => NotificationAction::Pause,
            SessionState::Paused => NotificationAction::Resume,
            SessionState::Idle | SessionState::Stopped => return None,
        };

        Some(Self {
            title: NOTIFICATION_TITLE,
            content_text: format_stopwatch(elapsed_millis, precision == TimerPrecision::Centis),
            action,
        })
    }
}

/// Keeps the notification on the bus in line with the session state and timer.
pub struct NotificationSync {
    bus: StateBus,
    precision: TimerPrecision,
}

impl NotificationSync {
    pub fn new(bus: StateBus, precision: TimerPrecision) -> Self {
        Self { bus, precision }
    }

    pub fn rebuild(&self) -> Option<NotificationState> {
        let state = self.bus.state().latest().unwrap_or(SessionState::Idle);
        let elapsed_millis = match self.precision {
            TimerPrecision::Seconds => self.bus.elapsed_seconds().latest().unwrap_or(0) * 1000,
            TimerPrecision::Centis => self.bus.elapsed_millis().latest().unwrap_or(0),
        };
        NotificationState::build(state, elapsed_millis, self.precision)
    }

    pub async fn run(self, cancel: CancellationToken) {
        let mut states = self.bus.state().subscribe();
        let mut timer = match self.precision {
            TimerPrecision::Seconds => self.bus.elapsed_seconds().subscribe(),
            TimerPrecision::Centis => self.bus.elapsed_millis().subscribe(),
        };

        let mut current = self.bus.notification().latest().flatten();

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                Some(_) = states.recv() => {}
                Some(_) = timer.recv() => {}
                else => break,
            }

            let next = self.rebuild();
            if next != current {
                self.bus.notification().publish(next.clone());
                current = next;
            }
        }

        tracing::debug!("Notification sync stopped");
    }
}
