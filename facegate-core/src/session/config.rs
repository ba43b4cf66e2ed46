use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tokio::time::{interval, Interval, MissedTickBehavior};

use crate::capture::StreamConstraints;

/// What drives the sampling loop.
#[derive(Debug, Clone)]
pub enum FrameCadence {
    /// One sample attempt per display refresh.
    Display { refresh_hz: u32 },
    /// One sample attempt per `notify_one` from a renderer.
    External(Arc<Notify>),
}

impl Default for FrameCadence {
    fn default() -> Self {
        Self::Display { refresh_hz: 60 }
    }
}

/// Tunables of a [`VerificationSession`](super::VerificationSession).
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Run a mode-independent precheck before the confirm call.
    pub precheck_then_confirm: bool,
    pub cadence: FrameCadence,
    /// Delay between a match and the terminal transition.
    pub grace_period: Duration,
    /// How long transient presentation events stay visible.
    pub feedback_window: Duration,
    /// Upper bound on one outstanding request; `None` waits forever.
    pub request_timeout: Option<Duration>,
    pub max_attempts: Option<u32>,
    pub max_duration: Option<Duration>,
    pub constraints: StreamConstraints,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            precheck_then_confirm: false,
            cadence: FrameCadence::default(),
            grace_period: Duration::from_secs(1),
            feedback_window: Duration::from_secs(3),
            request_timeout: Some(Duration::from_secs(15)),
            max_attempts: None,
            max_duration: None,
            constraints: StreamConstraints::default(),
        }
    }
}

impl SessionConfig {
    pub fn with_precheck(mut self, enabled: bool) -> Self {
        self.precheck_then_confirm = enabled;
        self
    }

    pub fn with_cadence(mut self, cadence: FrameCadence) -> Self {
        self.cadence = cadence;
        self
    }

    pub fn with_grace_period(mut self, grace: Duration) -> Self {
        self.grace_period = grace;
        self
    }

    pub fn with_feedback_window(mut self, window: Duration) -> Self {
        self.feedback_window = window;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_max_attempts(mut self, attempts: Option<u32>) -> Self {
        self.max_attempts = attempts;
        self
    }

    pub fn with_max_duration(mut self, duration: Option<Duration>) -> Self {
        self.max_duration = duration;
        self
    }

    pub fn with_constraints(mut self, constraints: StreamConstraints) -> Self {
        self.constraints = constraints;
        self
    }
}

/// Running form of a [`FrameCadence`].
pub(crate) enum FrameClock {
    Interval(Interval),
    External(Arc<Notify>),
}

impl FrameClock {
    pub(crate) fn new(cadence: &FrameCadence) -> Self {
        match cadence {
            FrameCadence::Display { refresh_hz } => {
                let period = Duration::from_secs(1) / (*refresh_hz).max(1);
                let mut ticker = interval(period);
                // A slow paint skips frames rather than bursting to catch up.
                ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
                Self::Interval(ticker)
            }
            FrameCadence::External(notify) => Self::External(Arc::clone(notify)),
        }
    }

    pub(crate) async fn tick(&mut self) {
        match self {
            Self::Interval(ticker) => {
                ticker.tick().await;
            }
            Self::External(notify) => notify.notified().await,
        }
    }
}
