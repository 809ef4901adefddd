//! Hotplug debounce and reset arbitration.
//!
//! A raw bitmap that differs from the last confirmed one starts a countdown.
//! The countdown is armed and decremented on the tick that first sees the
//! change, so with the default of two ticks a change is confirmed on the
//! second consecutive differing sample. Reverting to the confirmed value
//! cancels the countdown without an event.
//!
//! Every channel toggle is logged when first sampled, including toggles
//! within a pending change.
//!
//! Confirmation latches `reset_required`; only an explicit acknowledgement
//! clears it.

use crate::regs::NUM_CHANNELS;
use std::time::Duration;

/// All four channels present.
pub const ALL_CHANNELS: u8 = (1 << NUM_CHANNELS) - 1;

/// Emitted once per confirmed bitmap transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HotplugEvent {
    /// Newly confirmed bitmap.
    pub bitmap: u8,
    /// Bitmap confirmed before this change.
    pub previous: u8,
}

impl HotplugEvent {
    /// Channels whose state differs between `previous` and `bitmap`.
    pub fn changes(&self) -> impl Iterator<Item = ChannelChange> {
        channel_changes(self.previous, self.bitmap)
    }
}

/// A single channel gaining or losing its signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelChange {
    /// Signal appeared on the channel.
    PlugIn(u8),
    /// Signal disappeared from the channel.
    PlugOut(u8),
}

/// Per-channel plug transitions from `old` to `new`.
pub fn channel_changes(old: u8, new: u8) -> impl Iterator<Item = ChannelChange> {
    let toggled = old ^ new;
    (0..NUM_CHANNELS)
        .filter(move |ch| toggled & (1 << ch) != 0)
        .map(move |ch| {
            if new & (1 << ch) != 0 {
                ChannelChange::PlugIn(ch)
            } else {
                ChannelChange::PlugOut(ch)
            }
        })
}

/// Debouncer phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebounceState {
    /// Nothing pending.
    Stable,
    /// Change seen; `n` more differing ticks until it is confirmed.
    ConfirmWait(u8),
}

/// Result of feeding one sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Sample matches the confirmed bitmap and nothing was pending.
    Unchanged,
    /// A change is pending.
    Pending {
        /// Differing ticks still needed.
        remaining: u8,
    },
    /// A pending change went back to the confirmed bitmap.
    Reverted,
    /// The sample was confirmed.
    Confirmed(HotplugEvent),
}

/// Countdown that turns raw samples into confirmed transitions.
///
/// The countdown is not restarted when the pending value itself changes, so
/// `0000 -> 0001 -> 0011` confirms `0011` on the second tick.
#[derive(Debug, Clone)]
pub struct Debouncer {
    confirmed: u8,
    /// Last sample seen while a change is pending.
    pending: u8,
    state: DebounceState,
    ticks: u8,
}

impl Debouncer {
    /// Start from `confirmed`, requiring `ticks` differing samples (at least one).
    pub fn new(confirmed: u8, ticks: u8) -> Self {
        Self {
            confirmed,
            pending: confirmed,
            state: DebounceState::Stable,
            ticks: ticks.max(1),
        }
    }

    /// Last confirmed bitmap.
    pub fn confirmed(&self) -> u8 {
        self.confirmed
    }

    /// Current phase.
    pub fn state(&self) -> DebounceState {
        self.state
    }

    /// Restart from `bitmap` with nothing pending.
    pub fn rebase(&mut self, bitmap: u8) {
        self.confirmed = bitmap;
        self.pending = bitmap;
        self.state = DebounceState::Stable;
    }

    /// Feed one sample.
    pub fn tick(&mut self, bitmap: u8) -> TickOutcome {
        if bitmap == self.confirmed {
            let was_pending = self.state != DebounceState::Stable;
            self.pending = bitmap;
            self.state = DebounceState::Stable;
            return if was_pending {
                tracing::debug!(bitmap, "hotplug change reverted before confirmation");
                TickOutcome::Reverted
            } else {
                TickOutcome::Unchanged
            };
        }

        let seen = match self.state {
            DebounceState::Stable => self.confirmed,
            DebounceState::ConfirmWait(_) => self.pending,
        };
        for change in channel_changes(seen, bitmap) {
            match change {
                ChannelChange::PlugIn(ch) => tracing::info!(channel = ch, "plug in"),
                ChannelChange::PlugOut(ch) => tracing::info!(channel = ch, "plug out"),
            }
        }
        self.pending = bitmap;

        let remaining = match self.state {
            DebounceState::Stable => self.ticks,
            DebounceState::ConfirmWait(n) => n,
        }
        .saturating_sub(1);

        if remaining == 0 {
            let event = HotplugEvent {
                bitmap,
                previous: self.confirmed,
            };
            self.rebase(bitmap);
            TickOutcome::Confirmed(event)
        } else {
            self.state = DebounceState::ConfirmWait(remaining);
            TickOutcome::Pending { remaining }
        }
    }
}

/// Shared hotplug view published by the poll task.
#[derive(Debug, Clone)]
pub struct HotplugState {
    /// Bitmap of the most recent poll.
    pub bitmap: u8,
    /// Latched on every confirmed change; cleared by the receiver.
    pub reset_required: bool,
    debouncer: Debouncer,
}

impl HotplugState {
    /// Empty state with a `debounce_ticks` confirmation window.
    pub fn new(debounce_ticks: u8) -> Self {
        Self {
            bitmap: 0,
            reset_required: false,
            debouncer: Debouncer::new(0, debounce_ticks),
        }
    }

    /// Last confirmed bitmap.
    pub fn confirmed(&self) -> u8 {
        self.debouncer.confirmed()
    }

    /// Phase of the debouncer.
    pub fn debounce_state(&self) -> DebounceState {
        self.debouncer.state()
    }

    /// Take `bitmap` as the starting point without raising an event.
    pub fn baseline(&mut self, bitmap: u8) {
        self.bitmap = bitmap;
        self.reset_required = false;
        self.debouncer.rebase(bitmap);
    }

    /// Feed one poll result. Returns the event when a change is confirmed.
    pub fn apply(&mut self, bitmap: u8) -> Option<HotplugEvent> {
        self.bitmap = bitmap;
        match self.debouncer.tick(bitmap) {
            TickOutcome::Confirmed(event) => {
                self.reset_required = true;
                tracing::info!(bitmap = event.bitmap, previous = event.previous, "hotplug confirmed, reset required");
                Some(event)
            }
            _ => None,
        }
    }
}

/// Poll period for the next tick.
pub fn poll_interval(bitmap: u8, fast: Duration, slow: Duration) -> Duration {
    if bitmap == ALL_CHANNELS {
        fast
    } else {
        slow
    }
}
