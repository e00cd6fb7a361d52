//! Account lockout state machine
//!
//! Every account is either UNLOCKED (with a count of consecutive failures) or
//! LOCKED until some instant. The transitions here are pure functions of the
//! stored [`LockoutRecord`], the configuration and an explicit `now`; persisting
//! the result atomically is the job of [`crate::services::LockoutService`].
//!
//! ```text
//!            failure (count + 1 < max)
//!           ┌───────┐
//!           ▼       │
//!       UNLOCKED ───┘ ── failure (count + 1 == max) ──▶ LOCKED
//!           ▲                                            │
//!           └──────────── now >= locked_until ───────────┘
//! ```
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Configuration for account lockout
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockoutConfig {
    /// Whether lockout is enforced at all
    pub enabled: bool,
    /// Consecutive failures that lock the account
    pub max_failed_attempts: u32,
    /// How long an account stays locked
    pub lockout_duration: Duration,
    /// How often the background sweeper clears expired lockouts
    pub sweep_interval: std::time::Duration,
}

impl Default for LockoutConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_failed_attempts: 5,
            lockout_duration: Duration::minutes(30),
            sweep_interval: std::time::Duration::from_secs(300),
        }
    }
}

impl LockoutConfig {
    /// A configuration that never locks anyone out
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Default::default()
        }
    }

    pub fn with_max_failed_attempts(mut self, max_failed_attempts: u32) -> Self {
        self.max_failed_attempts = max_failed_attempts;
        self
    }

    pub fn with_lockout_duration(mut self, lockout_duration: Duration) -> Self {
        self.lockout_duration = lockout_duration;
        self
    }

    pub fn with_sweep_interval(mut self, sweep_interval: std::time::Duration) -> Self {
        self.sweep_interval = sweep_interval;
        self
    }

    /// When a lockout that starts at `now` ends
    ///
    /// Rounded up to a whole second, so storing the instant as unix seconds
    /// never shortens the window.
    pub fn lock_deadline(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let until = now + self.lockout_duration;
        if until.timestamp_subsec_nanos() == 0 {
            return until;
        }
        DateTime::from_timestamp(until.timestamp() + 1, 0).unwrap_or(until)
    }
}

/// The lockout fragment of an account row
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockoutRecord {
    pub failed_attempts: u32,
    pub locked_until: Option<DateTime<Utc>>,
}

/// Interpreted lockout state at a given instant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockoutState {
    Unlocked { failed_attempts: u32 },
    Locked { until: DateTime<Utc> },
}

impl LockoutRecord {
    /// Whether the record denies attempts at `now`
    ///
    /// The lockout window is half-open: at `now == locked_until` the account is
    /// already unlocked.
    pub fn is_locked(&self, now: DateTime<Utc>) -> bool {
        self.locked_until.is_some_and(|until| now < until)
    }

    pub fn state(&self, now: DateTime<Utc>) -> LockoutState {
        match self.locked_until {
            Some(until) if now < until => LockoutState::Locked { until },
            Some(_) => LockoutState::Unlocked { failed_attempts: 0 },
            None => LockoutState::Unlocked {
                failed_attempts: self.failed_attempts,
            },
        }
    }

    /// The record with an expired lockout cleared
    ///
    /// An elapsed lockout also resets the failure counter so the account starts
    /// over with a full set of attempts.
    pub fn normalize(self, now: DateTime<Utc>) -> Self {
        match self.locked_until {
            Some(until) if now >= until => Self::default(),
            _ => self,
        }
    }

    /// The record after a failed attempt at `now`
    ///
    /// A record that is still locked is returned unchanged: attempts made while
    /// locked are rejected without counting.
    pub fn on_failure(self, config: &LockoutConfig, now: DateTime<Utc>) -> Self {
        let current = self.normalize(now);
        if current.is_locked(now) {
            return current;
        }

        let failed_attempts = current.failed_attempts.saturating_add(1);
        if failed_attempts >= config.max_failed_attempts {
            Self {
                failed_attempts,
                locked_until: Some(config.lock_deadline(now)),
            }
        } else {
            Self {
                failed_attempts,
                locked_until: None,
            }
        }
    }

    /// The record after a successful attempt
    pub fn on_success(self) -> Self {
        Self::default()
    }
}

/// Lockout status of an account, for diagnostics and admin tooling
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockoutStatus {
    pub failed_attempts: u32,
    pub is_locked: bool,
    pub locked_until: Option<DateTime<Utc>>,
}

impl LockoutStatus {
    pub fn unlocked() -> Self {
        Self {
            failed_attempts: 0,
            is_locked: false,
            locked_until: None,
        }
    }

    pub fn from_record(record: LockoutRecord, now: DateTime<Utc>) -> Self {
        match record.state(now) {
            LockoutState::Locked { until } => Self {
                failed_attempts: record.failed_attempts,
                is_locked: true,
                locked_until: Some(until),
            },
            LockoutState::Unlocked { failed_attempts } => Self {
                failed_attempts,
                is_locked: false,
                locked_until: None,
            },
        }
    }

    /// Seconds until the lockout ends, or `None` when not locked
    pub fn retry_after_seconds(&self, now: DateTime<Utc>) -> Option<i64> {
        if !self.is_locked {
            return None;
        }
        self.locked_until
            .map(|until| (until - now).num_seconds().max(0))
    }
}
