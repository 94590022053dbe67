//! Idle/lock monitor.
//!
//! Clears the master key when the system goes idle or the screen locks,
//! depending on the configured [`IdlePolicy`]. The listener is installed at
//! most once per process; there is no way to disarm it.

use crate::master_key::MasterKey;
use serde::{Deserialize, Serialize};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use tracing::{debug, info};

/// Default idle threshold
pub const DEFAULT_THRESHOLD_MINUTES: u32 = 15;

/// When the master key is cleared.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LockMode {
    #[default]
    Disabled,
    LockOnScreenLock,
    LockOnIdle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdlePolicy {
    pub mode: LockMode,
    pub threshold_minutes: u32,
}

impl Default for IdlePolicy {
    fn default() -> Self {
        Self {
            mode: LockMode::Disabled,
            threshold_minutes: DEFAULT_THRESHOLD_MINUTES,
        }
    }
}

impl IdlePolicy {
    pub fn new(mode: LockMode, threshold_minutes: u32) -> Self {
        Self {
            mode,
            threshold_minutes,
        }
    }

    /// Detection interval handed to the idle-state provider.
    pub fn detection_interval_secs(&self) -> u64 {
        u64::from(self.threshold_minutes) * 60
    }

    /// Whether a transition to `state` should clear the master key.
    pub fn should_lock(&self, state: IdleState) -> bool {
        match self.mode {
            LockMode::Disabled => false,
            LockMode::LockOnScreenLock => state == IdleState::Locked,
            LockMode::LockOnIdle => state != IdleState::Active,
        }
    }
}

/// System state reported by the idle-state provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdleState {
    Active,
    Idle,
    Locked,
}

pub type IdleListener = Box<dyn Fn(IdleState) + Send + Sync>;

/// Source of system idle/lock notifications.
pub trait IdleStateProvider: Send + Sync {
    fn set_detection_interval(&self, secs: u64);
    fn add_listener(&self, listener: IdleListener);
}

impl<P: IdleStateProvider> IdleStateProvider for Arc<P> {
    fn set_detection_interval(&self, secs: u64) {
        (**self).set_detection_interval(secs)
    }

    fn add_listener(&self, listener: IdleListener) {
        (**self).add_listener(listener)
    }
}

/// Arms an idle listener that clears the master key.
pub struct IdleMonitor<P> {
    provider: P,
    master_key: Arc<MasterKey>,
    armed: AtomicBool,
}

impl<P: IdleStateProvider> IdleMonitor<P> {
    pub fn new(provider: P, master_key: Arc<MasterKey>) -> Self {
        Self {
            provider,
            master_key,
            armed: AtomicBool::new(false),
        }
    }

    pub fn is_armed(&self) -> bool {
        self.armed.load(Ordering::SeqCst)
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Install the listener for `policy`. Returns true if this call armed the
    /// monitor; a disabled policy or an already armed monitor does nothing.
    pub fn start(&self, policy: IdlePolicy) -> bool {
        if policy.mode == LockMode::Disabled {
            debug!("Idle locking disabled");
            return false;
        }
        if self
            .armed
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return false;
        }

        self.provider
            .set_detection_interval(policy.detection_interval_secs());

        let master_key = Arc::clone(&self.master_key);
        self.provider.add_listener(Box::new(move |state| {
            if policy.should_lock(state) && master_key.lock() {
                info!("Master key cleared after system became {:?}", state);
            }
        }));

        info!(
            "Idle monitor armed: {:?} after {} minutes",
            policy.mode, policy.threshold_minutes
        );
        true
    }
}
