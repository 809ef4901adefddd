//! Background hotplug poll task.
//!
//! One task per device samples the channel status registers without taking
//! the device lock, runs the debouncer and publishes the result through a
//! short `parking_lot` section. Confirmed changes go out on a broadcast
//! channel. The task never surfaces errors; failed reads keep the previous
//! channel state.

use crate::debounce::{poll_interval, HotplugEvent, HotplugState};
use crate::detect;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, oneshot};
use tokio::task::JoinHandle;
use vcap_core::SharedBus;

/// Everything the poll task shares with the device handle.
#[derive(Clone)]
pub struct PollContext {
    /// Register bus, shared with the device.
    pub bus: SharedBus,
    /// Debounce state, shared with the device.
    pub hotplug: Arc<Mutex<HotplugState>>,
    /// Mirror of the device power flag, readable without the device lock.
    pub powered: Arc<AtomicBool>,
    /// Confirmed changes.
    pub events: broadcast::Sender<HotplugEvent>,
    /// Interval while all channels are present.
    pub fast: Duration,
    /// Interval otherwise.
    pub slow: Duration,
}

/// Handle to a running poll task.
#[derive(Default)]
pub struct Poller {
    poll_task: Option<JoinHandle<()>>,
    poll_shutdown: Option<oneshot::Sender<()>>,
}

impl Poller {
    /// Idle handle.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a task has been started and not stopped.
    pub fn is_running(&self) -> bool {
        self.poll_task.is_some()
    }

    /// Spawn the poll task. No-op if one is already running.
    pub fn start(&mut self, ctx: PollContext) {
        if self.poll_task.is_some() {
            return;
        }
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        self.poll_task = Some(tokio::spawn(poll_loop(ctx, shutdown_rx)));
        self.poll_shutdown = Some(shutdown_tx);
        tracing::debug!("hotplug poller started");
    }

    /// Signal the task and wait for it to exit. No events are sent after
    /// this returns.
    pub async fn stop(&mut self) {
        if let Some(tx) = self.poll_shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(task) = self.poll_task.take() {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "hotplug poller exited abnormally");
            }
            tracing::debug!("hotplug poller stopped");
        }
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        if let Some(task) = self.poll_task.take() {
            task.abort();
        }
    }
}

async fn poll_loop(ctx: PollContext, mut shutdown_rx: oneshot::Receiver<()>) {
    if ctx.powered.load(Ordering::Acquire) {
        let previous = ctx.hotplug.lock().bitmap;
        let (_, bitmap) = detect::read_bitmap(ctx.bus.as_ref(), previous).await;
        ctx.hotplug.lock().baseline(bitmap);
        tracing::debug!(bitmap, "hotplug baseline");
    }

    loop {
        if ctx.powered.load(Ordering::Acquire) {
            let previous = ctx.hotplug.lock().bitmap;
            let (_, bitmap) = detect::read_bitmap(ctx.bus.as_ref(), previous).await;
            let event = ctx.hotplug.lock().apply(bitmap);
            if let Some(event) = event {
                // No subscribers is fine.
                let _ = ctx.events.send(event);
            }
        }

        let interval = poll_interval(ctx.hotplug.lock().bitmap, ctx.fast, ctx.slow);
        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = &mut shutdown_rx => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::regs;
    use vcap_driver_mock::MockRegisterBus;

    const PRESENT: u8 = 0x00;
    const ABSENT: u8 = regs::VIDEO_LOSS_BIT;

    fn context(bus: Arc<MockRegisterBus>) -> PollContext {
        let (events, _) = broadcast::channel(16);
        PollContext {
            bus,
            hotplug: Arc::new(Mutex::new(HotplugState::new(2))),
            powered: Arc::new(AtomicBool::new(true)),
            events,
            fast: Duration::from_millis(100),
            slow: Duration::from_millis(1000),
        }
    }

    fn all_absent(bus: &MockRegisterBus) {
        for ch in 0..regs::NUM_CHANNELS {
            bus.set_register(regs::video_status_reg(ch), ABSENT);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_plug_in_emits_one_event() {
        let bus = Arc::new(MockRegisterBus::new());
        all_absent(&bus);
        let ctx = context(bus.clone());
        let mut rx = ctx.events.subscribe();
        let hotplug = ctx.hotplug.clone();

        let mut poller = Poller::new();
        poller.start(ctx);
        tokio::task::yield_now().await;

        bus.set_register(regs::video_status_reg(0), PRESENT);
        let event = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("event before timeout")
            .unwrap();
        assert_eq!(event.bitmap, 0b0001);
        assert_eq!(event.previous, 0b0000);
        assert!(hotplug.lock().reset_required);

        poller.stop().await;
        assert!(!poller.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_joins_and_silences() {
        let bus = Arc::new(MockRegisterBus::new());
        all_absent(&bus);
        let ctx = context(bus.clone());
        let mut rx = ctx.events.subscribe();

        let mut poller = Poller::new();
        poller.start(ctx);
        tokio::task::yield_now().await;
        poller.stop().await;

        bus.clear_log();
        bus.set_register(regs::video_status_reg(1), PRESENT);
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(bus.transactions().is_empty());
        assert!(matches!(
            rx.try_recv(),
            Err(broadcast::error::TryRecvError::Empty)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unpowered_device_is_not_sampled() {
        let bus = Arc::new(MockRegisterBus::new());
        let ctx = context(bus.clone());
        ctx.powered.store(false, Ordering::Release);

        let mut poller = Poller::new();
        poller.start(ctx);
        tokio::time::sleep(Duration::from_secs(5)).await;
        poller.stop().await;
        assert!(bus.transactions().is_empty());
    }
}
