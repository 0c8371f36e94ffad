//! Cancelable countdowns for the login flow.
//!
//! Three countdowns run per console session: code expiry, resend cooldown
//! and session inactivity. Starting a countdown cancels the previous one of
//! the same kind, and every expiry event carries a generation number so an
//! event that raced a cancel or restart is recognized as stale.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::debug;

/// Kind of countdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKind {
    /// The pending one-time code expires.
    OtpExpiry,
    /// A new code may be requested.
    ResendCooldown,
    /// The session times out.
    Inactivity,
}

/// Expiry notification sent by a countdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerEvent {
    /// Which countdown fired.
    pub kind: TimerKind,
    generation: u64,
}

/// A single restartable countdown.
#[derive(Debug)]
pub struct Countdown {
    kind: TimerKind,
    generation: u64,
    deadline: Option<Instant>,
    handle: Option<JoinHandle<()>>,
}

impl Countdown {
    /// Create an idle countdown.
    pub fn new(kind: TimerKind) -> Self {
        Self {
            kind,
            generation: 0,
            deadline: None,
            handle: None,
        }
    }

    /// Start counting down, replacing any running countdown.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&mut self, duration: Duration, tx: &mpsc::UnboundedSender<TimerEvent>) {
        self.cancel();
        self.generation += 1;

        let event = TimerEvent {
            kind: self.kind,
            generation: self.generation,
        };
        let deadline = Instant::now() + duration;
        let tx = tx.clone();

        self.handle = Some(tokio::spawn(async move {
            sleep_until(deadline).await;
            // The receiver is gone once the session loop has exited.
            let _ = tx.send(event);
        }));
        self.deadline = Some(deadline);

        debug!(kind = ?self.kind, secs = duration.as_secs(), "Countdown started");
    }

    /// Stop the countdown. Safe to call when idle.
    pub fn cancel(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
        self.deadline = None;
    }

    /// Whether the countdown is running.
    pub fn is_active(&self) -> bool {
        self.deadline.is_some_and(|d| Instant::now() < d)
    }

    /// Time left while running.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }

    /// Accept an expiry event if it belongs to the running countdown.
    ///
    /// An accepted event leaves the countdown idle.
    pub fn acknowledge(&mut self, event: TimerEvent) -> bool {
        if event.kind != self.kind || event.generation != self.generation || self.deadline.is_none()
        {
            debug!(kind = ?event.kind, "Stale countdown event ignored");
            return false;
        }
        self.deadline = None;
        self.handle = None;
        true
    }
}

impl Drop for Countdown {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// The countdowns of one console session.
#[derive(Debug)]
pub struct SessionTimers {
    otp_expiry: Countdown,
    resend_cooldown: Countdown,
    inactivity: Countdown,
    tx: mpsc::UnboundedSender<TimerEvent>,
}

impl SessionTimers {
    /// Create idle timers and the channel their expiry events arrive on.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<TimerEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let timers = Self {
            otp_expiry: Countdown::new(TimerKind::OtpExpiry),
            resend_cooldown: Countdown::new(TimerKind::ResendCooldown),
            inactivity: Countdown::new(TimerKind::Inactivity),
            tx,
        };
        (timers, rx)
    }

    fn countdown(&self, kind: TimerKind) -> &Countdown {
        match kind {
            TimerKind::OtpExpiry => &self.otp_expiry,
            TimerKind::ResendCooldown => &self.resend_cooldown,
            TimerKind::Inactivity => &self.inactivity,
        }
    }

    fn countdown_mut(&mut self, kind: TimerKind) -> &mut Countdown {
        match kind {
            TimerKind::OtpExpiry => &mut self.otp_expiry,
            TimerKind::ResendCooldown => &mut self.resend_cooldown,
            TimerKind::Inactivity => &mut self.inactivity,
        }
    }

    /// Start (or restart) a countdown.
    pub fn start(&mut self, kind: TimerKind, duration: Duration) {
        let tx = self.tx.clone();
        self.countdown_mut(kind).start(duration, &tx);
    }

    /// Stop a countdown.
    pub fn cancel(&mut self, kind: TimerKind) {
        self.countdown_mut(kind).cancel();
    }

    /// Stop every countdown.
    pub fn cancel_all(&mut self) {
        self.otp_expiry.cancel();
        self.resend_cooldown.cancel();
        self.inactivity.cancel();
    }

    /// Whether a countdown is running.
    pub fn is_active(&self, kind: TimerKind) -> bool {
        self.countdown(kind).is_active()
    }

    /// Time left on a countdown.
    pub fn remaining(&self, kind: TimerKind) -> Option<Duration> {
        self.countdown(kind).remaining()
    }

    /// Number of running countdowns.
    pub fn active_count(&self) -> usize {
        [TimerKind::OtpExpiry, TimerKind::ResendCooldown, TimerKind::Inactivity]
            .into_iter()
            .filter(|kind| self.is_active(*kind))
            .count()
    }

    /// Filter an expiry event; returns its kind when it is current.
    pub fn accept(&mut self, event: TimerEvent) -> Option<TimerKind> {
        self.countdown_mut(event.kind)
            .acknowledge(event)
            .then_some(event.kind)
    }
}
