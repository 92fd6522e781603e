//! Sale status derived from the wall clock
//!
//! [`Countdown`] is the synchronous state machine; [`CountdownTimer`] drives
//! one on a tokio task, once immediately and then every tick, until the sale
//! ends or the timer is dropped.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::clock::Clock;

/// Where a sale window stands relative to now. Ordered by lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SaleStatus {
    Upcoming,
    Active,
    Ended,
}

impl SaleStatus {
    /// `now < start` is upcoming, `start <= now < end` active, otherwise ended
    pub fn derive(now: DateTime<Utc>, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        if now < start {
            Self::Upcoming
        } else if now < end {
            Self::Active
        } else {
            Self::Ended
        }
    }

    /// Heading shown above the countdown
    pub fn label(&self) -> &'static str {
        match self {
            Self::Upcoming => "距离开始还有",
            Self::Active => "距离结束还有",
            Self::Ended => "已结束",
        }
    }
}

impl fmt::Display for SaleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Upcoming => "upcoming",
            Self::Active => "active",
            Self::Ended => "ended",
        })
    }
}

/// Time left until the next boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Remaining {
    pub days: u64,
    pub hours: u64,
    pub minutes: u64,
    pub seconds: u64,
}

impl Remaining {
    /// Break a millisecond delta down; negative deltas clamp to zero
    pub fn from_millis(millis: i64) -> Self {
        let total_secs = u64::try_from(millis.max(0)).unwrap_or(0) / 1000;
        Self {
            days: total_secs / 86_400,
            hours: (total_secs / 3_600) % 24,
            minutes: (total_secs / 60) % 60,
            seconds: total_secs % 60,
        }
    }

    /// `HH:MM:SS`, prefixed with `DD天 ` only when there are whole days left
    pub fn display(&self) -> String {
        let clock = format!("{:02}:{:02}:{:02}", self.hours, self.minutes, self.seconds);
        if self.days > 0 {
            format!("{:02}天 {}", self.days, clock)
        } else {
            clock
        }
    }
}

/// Result of one recomputation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Evaluation {
    pub status: SaleStatus,
    /// `None` once ended
    pub remaining: Option<Remaining>,
    /// The new status if this evaluation changed it
    pub transition: Option<SaleStatus>,
}

impl fmt::Display for Evaluation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.remaining {
            Some(remaining) => write!(f, "{} {}", self.status.label(), remaining.display()),
            None => f.write_str(self.status.label()),
        }
    }
}

/// Status state machine for one sale window.
///
/// Starts out upcoming and only ever moves forward; ended is terminal.
#[derive(Debug, Clone)]
pub struct Countdown {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    status: SaleStatus,
}

impl Countdown {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            start,
            end,
            status: SaleStatus::Upcoming,
        }
    }

    pub fn status(&self) -> SaleStatus {
        self.status
    }

    pub fn window(&self) -> (DateTime<Utc>, DateTime<Utc>) {
        (self.start, self.end)
    }

    /// Replace the window and start a fresh lifecycle for it
    pub fn set_window(
        &mut self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Evaluation {
        *self = Self::new(start, end);
        self.evaluate(now)
    }

    /// Recompute the status at `now`
    pub fn evaluate(&mut self, now: DateTime<Utc>) -> Evaluation {
        if self.status == SaleStatus::Ended {
            return Evaluation {
                status: SaleStatus::Ended,
                remaining: None,
                transition: None,
            };
        }

        let mut next = SaleStatus::derive(now, self.start, self.end).max(self.status);
        let target = match next {
            SaleStatus::Upcoming => Some(self.start),
            SaleStatus::Active => Some(self.end),
            SaleStatus::Ended => None,
        };
        let delta = target.map(|t| (t - now).num_milliseconds());
        if next == SaleStatus::Active && delta.map_or(true, |ms| ms <= 0) {
            next = SaleStatus::Ended;
        }

        let transition = (next != self.status).then_some(next);
        self.status = next;

        Evaluation {
            status: next,
            remaining: match next {
                SaleStatus::Ended => None,
                _ => delta.map(Remaining::from_millis),
            },
            transition,
        }
    }
}

/// A [`Countdown`] running on its own task.
///
/// The task is aborted when the timer is cancelled or dropped.
#[derive(Debug)]
pub struct CountdownTimer {
    handle: JoinHandle<()>,
    latest: watch::Receiver<Evaluation>,
}

impl CountdownTimer {
    /// Evaluate the window now, then every `period`, calling `on_change` once
    /// per status transition. Must be called inside a tokio runtime.
    pub fn spawn<F>(
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        clock: Arc<dyn Clock>,
        period: Duration,
        mut on_change: F,
    ) -> Self
    where
        F: FnMut(SaleStatus) + Send + 'static,
    {
        let mut countdown = Countdown::new(start, end);
        let first = countdown.evaluate(clock.now());
        if let Some(status) = first.transition {
            on_change(status);
        }

        let (tx, latest) = watch::channel(first);
        let handle = tokio::spawn(async move {
            if first.status == SaleStatus::Ended {
                return;
            }

            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // the first tick is immediate and already covered above
            ticker.tick().await;

            loop {
                ticker.tick().await;
                let evaluation = countdown.evaluate(clock.now());
                if let Some(status) = evaluation.transition {
                    log::debug!("Sale window {} - {} is now {}", start, end, status);
                    on_change(status);
                }
                if tx.send(evaluation).is_err() || evaluation.status == SaleStatus::Ended {
                    break;
                }
            }
        });

        Self { handle, latest }
    }

    /// The most recent evaluation
    pub fn latest(&self) -> Evaluation {
        *self.latest.borrow()
    }

    /// The most recent status
    pub fn status(&self) -> SaleStatus {
        self.latest.borrow().status
    }

    /// Receiver that is notified on every evaluation
    pub fn subscribe(&self) -> watch::Receiver<Evaluation> {
        self.latest.clone()
    }

    /// Stop ticking
    pub fn cancel(&self) {
        self.handle.abort();
    }

    /// Whether the task has stopped (ended or cancelled)
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for CountdownTimer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
