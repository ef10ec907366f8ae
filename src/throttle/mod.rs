//! Pin-event throttle engine.
//!
//! A fixed-capacity registry of per-pin monitoring rules, evaluated once
//! per main-loop iteration.  Each rule reads its pin, compares against its
//! debounce state, and fires its callback when the trigger policy holds.
//!
//! ```text
//!   main loop ──▶ process_all(now)
//!                   │
//!                   ├─ entry 0: read ─▶ elapsed? changed? ─▶ policy ─▶ callback ─▶ refresh state
//!                   ├─ entry 1: ...
//!                   └─ entry N-1
//! ```
//!
//! Evaluation is strictly sequential in registration order.  Callbacks run
//! inline, so a slow callback delays every entry registered after it.
//!
//! ## Debounce state
//!
//! Every entry starts with `last_value = -1` (outside any legal reading)
//! and no fire time, so its first evaluation sees both "changed" and
//! "elapsed" and fires regardless of policy.  State is refreshed only
//! after the callback returns `Ok`; a failed callback leaves the entry as
//! it was and the same decision is taken again on the next cycle.

pub mod policy;

pub use policy::{ReadKind, TriggerPolicy};

use heapless::Vec;
use log::{error, info, warn};

use crate::app::ports::PinReader;
use crate::error::CapacityExceeded;
use crate::pins::PinId;

/// Registry size used when no explicit capacity is given.
pub const DEFAULT_CAPACITY: usize = 16;

/// `last_value` of an entry that has never fired.
pub const NEVER_OBSERVED: i32 = -1;

/// Outcome of a monitor callback.  Errors are opaque to the engine.
pub type CallbackResult = anyhow::Result<()>;

/// Owned, type-erased monitor callback.  Receives the freshly read value
/// and the invocation context passed to [`PinThrottle::process_all`].
pub type Callback<C> = Box<dyn FnMut(i32, &mut C) -> CallbackResult>;

struct MonitorEntry<C> {
    pin: PinId,
    read_kind: ReadKind,
    policy: TriggerPolicy,
    min_interval_ms: u32,
    callback: Callback<C>,
    last_fire_ms: Option<u32>,
    last_value: i32,
}

impl<C> MonitorEntry<C> {
    /// Rollover-tolerant: the difference is taken with wrapping subtraction.
    fn is_time_elapsed(&self, now_ms: u32) -> bool {
        match self.last_fire_ms {
            None => true,
            Some(last) => now_ms.wrapping_sub(last) >= self.min_interval_ms,
        }
    }

    fn info(&self) -> MonitorInfo {
        MonitorInfo {
            pin: self.pin,
            read_kind: self.read_kind,
            policy: self.policy,
            min_interval_ms: self.min_interval_ms,
            last_fire_ms: self.last_fire_ms,
            last_value: self.last_value,
        }
    }
}

/// Read-only view of a registered monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorInfo {
    pub pin: PinId,
    pub read_kind: ReadKind,
    pub policy: TriggerPolicy,
    pub min_interval_ms: u32,
    /// `None` until the first successful fire.
    pub last_fire_ms: Option<u32>,
    /// [`NEVER_OBSERVED`] until the first successful fire.
    pub last_value: i32,
}

/// Per-cycle counters returned by [`PinThrottle::process_all_counted`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub evaluated: usize,
    pub fired: usize,
    pub failed: usize,
}

/// The throttle engine: an append-only registry of up to `N` monitors.
///
/// `C` is the callback invocation context (e.g. an MQTT client) handed to
/// every callback that fires during a cycle.
pub struct PinThrottle<C, const N: usize = DEFAULT_CAPACITY> {
    entries: Vec<MonitorEntry<C>, N>,
}

impl<C, const N: usize> Default for PinThrottle<C, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C, const N: usize> PinThrottle<C, N> {
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Register a monitor.  Fails closed when the registry is full.
    pub fn register<F>(
        &mut self,
        pin: PinId,
        read_kind: ReadKind,
        policy: TriggerPolicy,
        min_interval_ms: u32,
        callback: F,
    ) -> Result<(), CapacityExceeded>
    where
        F: FnMut(i32, &mut C) -> CallbackResult + 'static,
    {
        let entry = MonitorEntry {
            pin,
            read_kind,
            policy,
            min_interval_ms,
            callback: Box::new(callback),
            last_fire_ms: None,
            last_value: NEVER_OBSERVED,
        };

        if self.entries.push(entry).is_err() {
            error!(
                "Throttle: cannot register pin {} ({:?}/{:?}), registry full ({} slots)",
                pin, read_kind, policy, N
            );
            return Err(CapacityExceeded { capacity: N });
        }

        info!(
            "Throttle: registered pin {} {:?} {:?} every {}ms at slot {}",
            pin,
            read_kind,
            policy,
            min_interval_ms,
            self.entries.len() - 1
        );
        Ok(())
    }

    /// [`register`](Self::register) for callbacks that cannot fail.
    pub fn register_infallible<F>(
        &mut self,
        pin: PinId,
        read_kind: ReadKind,
        policy: TriggerPolicy,
        min_interval_ms: u32,
        mut callback: F,
    ) -> Result<(), CapacityExceeded>
    where
        F: FnMut(i32, &mut C) + 'static,
    {
        self.register(pin, read_kind, policy, min_interval_ms, move |value, ctx| {
            callback(value, ctx);
            Ok(())
        })
    }

    /// Run one process cycle over every monitor, in registration order.
    ///
    /// `now_ms` is a monotonic millisecond counter; it may wrap.
    pub fn process_all(&mut self, now_ms: u32, reader: &mut impl PinReader, ctx: &mut C) {
        self.process_all_counted(now_ms, reader, ctx);
    }

    /// Same as [`process_all`](Self::process_all), returning counters for
    /// diagnostics.
    pub fn process_all_counted(
        &mut self,
        now_ms: u32,
        reader: &mut impl PinReader,
        ctx: &mut C,
    ) -> CycleReport {
        let mut report = CycleReport::default();

        for entry in self.entries.iter_mut() {
            report.evaluated += 1;

            let current = reader.read(entry.pin, entry.read_kind);
            let is_time_elapsed = entry.is_time_elapsed(now_ms);
            let has_changed = current != entry.last_value;

            if !entry.policy.should_fire(is_time_elapsed, has_changed) {
                continue;
            }

            match (entry.callback)(current, &mut *ctx) {
                Ok(()) => {
                    entry.last_fire_ms = Some(now_ms);
                    entry.last_value = current;
                    report.fired += 1;
                }
                Err(e) => {
                    warn!(
                        "Throttle: pin {} callback failed ({:#}), re-evaluating next cycle",
                        entry.pin, e
                    );
                    report.failed += 1;
                }
            }
        }

        report
    }

    /// Number of registered monitors.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub const fn capacity(&self) -> usize {
        N
    }

    pub fn is_full(&self) -> bool {
        self.entries.is_full()
    }

    /// Registered monitors in evaluation order.
    pub fn entries(&self) -> impl Iterator<Item = MonitorInfo> + '_ {
        self.entries.iter().map(MonitorEntry::info)
    }
}

// ═══════════════════════════════════════════════════════════════
//  Tests
// ═══════════════════════════════════════════════════════════════
