//! Send cooldown.
//!
//! The timestamp of the last accepted send is the only source of truth. The
//! seconds shown to the user are derived from it, and the ticker merely
//! republishes that derived value once per second for library consumers that
//! hold a receiver. With no receivers no task is spawned.

use std::sync::Arc;
use std::time::Duration;

use log::debug;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

#[derive(Debug, Clone, Copy)]
pub struct Cooldown {
    duration: Duration,
    last_send: Option<Instant>,
}

impl Cooldown {
    pub fn new(duration: Duration) -> Self {
        Self {
            duration,
            last_send: None,
        }
    }

    pub fn start(&mut self, now: Instant) {
        self.last_send = Some(now);
    }

    pub fn last_send(&self) -> Option<Instant> {
        self.last_send
    }

    pub fn remaining(&self, now: Instant) -> Duration {
        match self.last_send {
            Some(sent) => self.duration.saturating_sub(now.saturating_duration_since(sent)),
            None => Duration::ZERO,
        }
    }

    /// Whole seconds left, rounded up so the counter never shows 0 while
    /// sending is still blocked.
    pub fn remaining_secs(&self, now: Instant) -> u64 {
        let remaining = self.remaining(now);
        remaining.as_secs() + u64::from(remaining.subsec_nanos() > 0)
    }

    pub fn is_active(&self, now: Instant) -> bool {
        !self.remaining(now).is_zero()
    }
}

/// Once-per-second publisher of the remaining cooldown seconds.
pub struct CooldownTicker {
    tx: Arc<watch::Sender<u64>>,
    task: Option<JoinHandle<()>>,
}

impl CooldownTicker {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(0);
        Self {
            tx: Arc::new(tx),
            task: None,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.tx.subscribe()
    }

    /// Cancels any running ticker and starts a new one for `cooldown`.
    ///
    /// Only the initial value is published when nobody is subscribed or when
    /// called outside a tokio runtime.
    pub fn restart(&mut self, cooldown: Cooldown) {
        self.cancel();
        self.tx.send_replace(cooldown.remaining_secs(Instant::now()));

        if self.tx.receiver_count() == 0 {
            return;
        }

        let Ok(handle) = Handle::try_current() else {
            debug!("No runtime available, cooldown ticker not started");
            return;
        };

        let tx = self.tx.clone();
        self.task = Some(handle.spawn(async move {
            let mut interval = time::interval(Duration::from_secs(1));
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                let remaining = cooldown.remaining_secs(Instant::now());
                tx.send_replace(remaining);
                if remaining == 0 || tx.receiver_count() == 0 {
                    break;
                }
            }
        }));
    }

    pub fn cancel(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }
}

impl Default for CooldownTicker {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for CooldownTicker {
    fn drop(&mut self) {
        self.cancel();
    }
}
