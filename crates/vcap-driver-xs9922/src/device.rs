//! XS9922 device handle.
//!
//! One [`Xs9922`] per chip. Format, stream, power and control operations run
//! under a single async device lock held for the whole operation, including
//! awaited bus I/O. The hotplug poll task never takes that lock: it samples
//! the bus directly and publishes through a short `parking_lot` section, so
//! the bitmap seen by the request surface may lag by one poll period.
//!
//! # Example
//!
//! ```rust,ignore
//! let dev = Xs9922::probe(config, bus, power).await?;
//! let mut events = dev.subscribe();
//!
//! dev.set_format(FormatRequest::active(1280, 720, BusFormat::Uyvy8_2x8)).await?;
//! dev.set_stream(true).await?;
//!
//! while let Ok(event) = events.recv().await {
//!     println!("channels now {:04b}", event.bitmap);
//! }
//! ```

use crate::config::Xs9922Config;
use crate::controls::{Controls, PictureControl};
use crate::debounce::{HotplugEvent, HotplugState};
use crate::error::Xs9922Error;
use crate::modes::{BusFormat, Fraction, VideoMode, MODES};
use crate::poller::{PollContext, Poller};
use crate::power;
use crate::regs::{self, NUM_CHANNELS};
use crate::request::{
    pad_index, BusType, FormatRequest, FormatWhich, FrameIntervalDesc, FrameSizeRange,
    MbusConfig, ModuleInfo, PadFormat, ResetInfo, ResetReason, StartStreamSeq, PADS,
};
use crate::stream;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};
use tracing::instrument;
use vcap_core::{GpioLine, RegisterBus, SharedBus, SharedPower, WriteReport};

/// Capacity of the hotplug event channel.
const EVENT_CAPACITY: usize = 16;

/// State guarded by the device lock.
#[derive(Debug)]
pub struct DeviceState {
    /// Active mode.
    pub mode: &'static VideoMode,
    /// Outputs enabled.
    pub streaming: bool,
    /// Power-on sequence completed.
    pub power_on: bool,
    /// The chip holds the program for `mode`.
    pub mode_programmed: bool,
    /// Negotiated try format per pad.
    pub try_formats: [PadFormat; PADS],
}

/// Register values captured from one channel by [`Xs9922::dump_registers`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelDump {
    /// Channel index.
    pub channel: u8,
    /// `(address, value)` pairs; failed reads are omitted.
    pub registers: Vec<(u16, u8)>,
}

/// Handle to one probed XS9922.
pub struct Xs9922 {
    config: Xs9922Config,
    bus: SharedBus,
    power: SharedPower,
    state: Mutex<DeviceState>,
    hotplug: Arc<parking_lot::Mutex<HotplugState>>,
    powered: Arc<AtomicBool>,
    events: broadcast::Sender<HotplugEvent>,
    controls: Controls,
    poller: Mutex<Poller>,
}

impl std::fmt::Debug for Xs9922 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Xs9922")
            .field("module", &self.config.module_name)
            .field("powered", &self.powered.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl Xs9922 {
    /// Validate config, power up, verify the chip, program the default mode
    /// and start hotplug polling.
    #[instrument(skip_all, fields(module = %config.module_name))]
    pub async fn probe(
        config: Xs9922Config,
        bus: SharedBus,
        power: SharedPower,
    ) -> Result<Self, Xs9922Error> {
        config.validate()?;

        power::power_on(power.as_ref()).await?;

        if config.verify_chip_id {
            if let Err(e) = check_chip_id(bus.as_ref()).await {
                tracing::error!(error = %e, "chip id check failed");
                power::power_off(power.as_ref()).await;
                return Err(e);
            }
        }

        if power.has_line(GpioLine::Camera) {
            if let Err(e) = power.set_line(GpioLine::Camera, true).await {
                tracing::warn!(error = %e, "could not enable camera supply");
            }
        }

        let mode = config.default_video_mode();
        let mut mode_programmed = false;
        if !config.sensor_output_disabled {
            let report = stream::program_mode(bus.as_ref(), mode).await;
            log_report("initial mode program", &report);
            mode_programmed = true;
        }

        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let device = Self {
            hotplug: Arc::new(parking_lot::Mutex::new(HotplugState::new(
                config.debounce_ticks,
            ))),
            powered: Arc::new(AtomicBool::new(true)),
            controls: Controls::new(mode),
            state: Mutex::new(DeviceState {
                mode,
                streaming: false,
                power_on: true,
                mode_programmed,
                try_formats: [0, 1, 2, 3].map(|pad| PadFormat::from_mode(mode, pad)),
            }),
            events,
            poller: Mutex::new(Poller::new()),
            config,
            bus,
            power,
        };
        device.start_polling().await;

        tracing::info!(mode = %mode.label(), "xs9922 probed");
        Ok(device)
    }

    /// Configuration the device was probed with.
    pub fn config(&self) -> &Xs9922Config {
        &self.config
    }

    /// Picture and link controls.
    pub fn controls(&self) -> &Controls {
        &self.controls
    }

    /// Receive confirmed hotplug transitions.
    pub fn subscribe(&self) -> broadcast::Receiver<HotplugEvent> {
        self.events.subscribe()
    }

    /// Start the hotplug poll task if it is not running.
    pub async fn start_polling(&self) {
        let ctx = PollContext {
            bus: self.bus.clone(),
            hotplug: self.hotplug.clone(),
            powered: self.powered.clone(),
            events: self.events.clone(),
            fast: self.config.fast_poll(),
            slow: self.config.slow_poll(),
        };
        self.poller.lock().await.start(ctx);
    }

    /// Stop the poll task and wait for it to exit.
    pub async fn stop_polling(&self) {
        self.poller.lock().await.stop().await;
    }

    /// Whether the poll task is running.
    pub async fn is_polling(&self) -> bool {
        self.poller.lock().await.is_running()
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Module identity from the configuration.
    pub fn module_info(&self) -> ModuleInfo {
        ModuleInfo {
            sensor: regs::CHIP_NAME.to_string(),
            module: self.config.module_name.clone(),
            lens: self.config.lens_name.clone(),
            index: self.config.module_index,
            facing: self.config.module_facing.clone(),
        }
    }

    /// Channel presence bitmap from the most recent poll.
    pub fn hotplug_info(&self) -> u8 {
        self.hotplug.lock().bitmap
    }

    /// Last confirmed bitmap.
    pub fn confirmed_hotplug(&self) -> u8 {
        self.hotplug.lock().confirmed()
    }

    /// Pending receiver reset.
    pub fn reset_info(&self) -> ResetInfo {
        ResetInfo {
            needs_reset: self.hotplug.lock().reset_required,
            reason: ResetReason::Hotplug,
        }
    }

    /// Store the reset-required flag. The receiver clears it with `false`
    /// once it has restarted.
    pub fn set_reset_info(&self, needs_reset: bool) {
        self.hotplug.lock().reset_required = needs_reset;
        tracing::debug!(needs_reset, "reset info updated");
    }

    /// This device starts before the receiver.
    pub fn start_stream_sequence(&self) -> StartStreamSeq {
        StartStreamSeq::Front
    }

    /// Active mode.
    pub async fn current_mode(&self) -> &'static VideoMode {
        self.state.lock().await.mode
    }

    /// Whether outputs are enabled.
    pub async fn is_streaming(&self) -> bool {
        self.state.lock().await.streaming
    }

    /// Whether the chip is powered.
    pub async fn is_powered(&self) -> bool {
        self.state.lock().await.power_on
    }

    // =========================================================================
    // Formats
    // =========================================================================

    /// Resolve the closest mode and either store it as a pad's try format or
    /// make it current and program the chip.
    ///
    /// An active format change always runs to completion; failed writes are
    /// returned as [`Xs9922Error::Sequence`] with the new mode already in
    /// effect.
    #[instrument(skip(self))]
    pub async fn set_format(&self, request: FormatRequest) -> Result<PadFormat, Xs9922Error> {
        let mode = crate::modes::find_best_fit(request.width, request.height, request.code)?;
        let pad = pad_index(request.pad);
        let applied = PadFormat::from_mode(mode, pad);

        let mut state = self.state.lock().await;
        if request.which == FormatWhich::Try {
            state.try_formats[pad] = applied;
            return Ok(applied);
        }

        state.mode = mode;
        self.controls.publish_mode(mode);

        let mut report = WriteReport::new();
        if self.config.sensor_output_disabled {
            state.mode_programmed = false;
        } else {
            report.merge(stream::program_mode(self.bus.as_ref(), mode).await);
            state.mode_programmed = true;
        }
        report.merge(stream::mipi_reset(self.bus.as_ref()).await);

        tracing::info!(mode = %mode.label(), "format applied");
        log_report("format change", &report);
        report.into_result()?;
        Ok(applied)
    }

    /// Active format, or the try format stored for `pad`.
    pub async fn get_format(&self, pad: u32, which: FormatWhich) -> PadFormat {
        let pad = pad_index(pad);
        let state = self.state.lock().await;
        match which {
            FormatWhich::Try => state.try_formats[pad],
            FormatWhich::Active => PadFormat::from_mode(state.mode, pad),
        }
    }

    /// Reset every pad's try format to the current mode.
    pub async fn open(&self) {
        let mut state = self.state.lock().await;
        let mode = state.mode;
        state.try_formats = [0, 1, 2, 3].map(|pad| PadFormat::from_mode(mode, pad));
    }

    /// Bus format at `index`; only index 0 exists.
    pub fn enum_mbus_code(&self, index: u32) -> Result<BusFormat, Xs9922Error> {
        MODES
            .get(index as usize)
            .map(|m| m.bus_format)
            .ok_or(Xs9922Error::IndexOutOfRange {
                what: "mbus code",
                index,
            })
    }

    /// Frame size of mode `index`, which must carry `code`.
    pub fn enum_frame_size(
        &self,
        index: u32,
        code: BusFormat,
    ) -> Result<FrameSizeRange, Xs9922Error> {
        let mode = MODES.get(index as usize).ok_or(Xs9922Error::IndexOutOfRange {
            what: "frame size",
            index,
        })?;
        if mode.bus_format != code {
            return Err(Xs9922Error::FormatMismatch {
                requested: code,
                expected: mode.bus_format,
            });
        }
        Ok(FrameSizeRange {
            min_width: mode.width,
            max_width: mode.width,
            min_height: mode.height,
            max_height: mode.height,
        })
    }

    /// Frame interval enumeration. Every valid index reports the first mode.
    pub fn enum_frame_interval(&self, index: u32) -> Result<FrameIntervalDesc, Xs9922Error> {
        if index as usize >= MODES.len() {
            return Err(Xs9922Error::IndexOutOfRange {
                what: "frame interval",
                index,
            });
        }
        let mode = &MODES[0];
        Ok(FrameIntervalDesc {
            code: mode.bus_format,
            width: mode.width,
            height: mode.height,
            interval: mode.max_fps,
        })
    }

    /// Frame interval of the active mode.
    pub async fn frame_interval(&self) -> Fraction {
        self.state.lock().await.mode.max_fps
    }

    /// Output link: CSI-2 D-PHY, four lanes, four virtual channels.
    pub fn mbus_config(&self) -> MbusConfig {
        MbusConfig {
            bus_type: BusType::Csi2Dphy,
            lanes: crate::modes::LANES,
            channels: (1 << NUM_CHANNELS) - 1,
        }
    }

    // =========================================================================
    // Streaming and power
    // =========================================================================

    /// Start or stop streaming. Requesting the current state does nothing.
    ///
    /// Starting powers the chip if needed, applies the mode program if the
    /// chip does not hold it, resets the MIPI logic, enables all outputs and
    /// waits for the link to settle.
    #[instrument(skip(self))]
    pub async fn set_stream(&self, on: bool) -> Result<(), Xs9922Error> {
        let mut state = self.state.lock().await;
        if state.streaming == on {
            tracing::debug!(on, "stream already in requested state");
            return Ok(());
        }

        let report = if on {
            if !state.power_on {
                self.power_up(&mut state).await?;
            }
            let reprogram = !state.mode_programmed;
            let report = stream::start(
                self.bus.as_ref(),
                state.mode,
                reprogram,
                self.config.stream_settle(),
            )
            .await;
            state.mode_programmed = true;
            report
        } else {
            stream::stop(self.bus.as_ref()).await
        };
        state.streaming = on;

        tracing::info!(on, "stream {}", if on { "started" } else { "stopped" });
        log_report("stream", &report);
        report.into_result()?;
        Ok(())
    }

    /// Abbreviated restart that keeps the current mode program.
    #[instrument(skip(self))]
    pub async fn quick_stream(&self, on: bool) -> Result<(), Xs9922Error> {
        let _state = self.state.lock().await;
        let report = if on {
            stream::quick_start(self.bus.as_ref()).await
        } else {
            stream::quick_stop(self.bus.as_ref()).await
        };
        tracing::info!(on, "quick stream");
        log_report("quick stream", &report);
        report.into_result()?;
        Ok(())
    }

    /// Run the power-on or power-off sequence. Repeating the current state is a no-op.
    #[instrument(skip(self))]
    pub async fn set_power(&self, on: bool) -> Result<(), Xs9922Error> {
        let mut state = self.state.lock().await;
        if state.power_on == on {
            return Ok(());
        }
        if on {
            self.power_up(&mut state).await
        } else {
            self.power_down(&mut state).await;
            Ok(())
        }
    }

    async fn power_up(&self, state: &mut DeviceState) -> Result<(), Xs9922Error> {
        power::power_on(self.power.as_ref()).await?;
        state.power_on = true;
        self.powered.store(true, Ordering::Release);
        tracing::info!("powered on");
        Ok(())
    }

    async fn power_down(&self, state: &mut DeviceState) {
        self.powered.store(false, Ordering::Release);
        power::power_off(self.power.as_ref()).await;
        state.power_on = false;
        state.streaming = false;
        state.mode_programmed = false;
        tracing::info!("powered off");
    }

    /// Drive the camera supply line.
    pub async fn set_camera_power(&self, on: bool) -> Result<(), Xs9922Error> {
        self.power.set_line(GpioLine::Camera, on).await?;
        tracing::info!(on, "camera supply");
        Ok(())
    }

    // =========================================================================
    // Controls
    // =========================================================================

    /// Write a picture control.
    #[instrument(skip(self))]
    pub async fn set_control(&self, control: PictureControl, value: i64) -> Result<(), Xs9922Error> {
        let _state = self.state.lock().await;
        let report = self
            .controls
            .set_picture(self.bus.as_ref(), control, value)
            .await?;
        report.into_result()?;
        Ok(())
    }

    /// Read a picture control back from the chip.
    pub async fn get_control(&self, control: PictureControl) -> Result<i64, Xs9922Error> {
        let _state = self.state.lock().await;
        Ok(self.controls.read_picture(self.bus.as_ref(), control).await?)
    }

    // =========================================================================
    // Diagnostics and teardown
    // =========================================================================

    /// Read the diagnostic register ranges of every channel. Unreadable
    /// registers are skipped.
    #[instrument(skip(self))]
    pub async fn dump_registers(&self) -> Vec<ChannelDump> {
        let mut dumps = Vec::with_capacity(usize::from(NUM_CHANNELS));
        for ch in 0..NUM_CHANNELS {
            let base = regs::channel_base(ch);
            let mut registers = Vec::new();
            for range in regs::DIAG_RANGES {
                for offset in range {
                    let addr = base | offset;
                    match self.bus.read(addr).await {
                        Ok(val) => {
                            tracing::trace!(
                                channel = ch,
                                addr = format_args!("{:#06x}", addr),
                                val = format_args!("{:#04x}", val),
                                "dump"
                            );
                            registers.push((addr, val));
                        }
                        Err(e) => tracing::warn!(channel = ch, error = %e, "dump read failed"),
                    }
                }
            }
            tracing::info!(channel = ch, count = registers.len(), "channel registers dumped");
            dumps.push(ChannelDump {
                channel: ch,
                registers,
            });
        }
        dumps
    }

    /// Stop polling, drop the supplies and power down.
    #[instrument(skip(self))]
    pub async fn remove(&self) {
        self.stop_polling().await;

        let mut state = self.state.lock().await;
        for line in [GpioLine::Camera, GpioLine::Power] {
            if self.power.has_line(line) {
                if let Err(e) = self.power.set_line(line, false).await {
                    tracing::warn!(line = line.name(), error = %e, "could not release line");
                }
            }
        }
        if state.power_on {
            self.power_down(&mut state).await;
        }
        tracing::info!("xs9922 removed");
    }
}

async fn check_chip_id(bus: &dyn RegisterBus) -> Result<(), Xs9922Error> {
    let high = bus.read(regs::CHIP_ID_HIGH_REG).await?;
    let low = bus.read(regs::CHIP_ID_LOW_REG).await?;
    let found = u16::from(high) << 8 | u16::from(low);
    if found != regs::CHIP_ID {
        return Err(Xs9922Error::ChipIdMismatch {
            expected: regs::CHIP_ID,
            found,
        });
    }
    tracing::debug!(id = format_args!("{:#06x}", found), "chip id verified");
    Ok(())
}

fn log_report(what: &str, report: &WriteReport) {
    if !report.is_ok() {
        tracing::warn!(
            failed = report.failures().len(),
            attempted = report.attempted(),
            "{} completed with write errors",
            what
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vcap_driver_mock::{MockPowerControl, MockRegisterBus};

    async fn probe_default() -> (Xs9922, Arc<MockRegisterBus>, Arc<MockPowerControl>) {
        let bus = Arc::new(MockRegisterBus::new());
        bus.set_register(regs::CHIP_ID_HIGH_REG, 0x99);
        bus.set_register(regs::CHIP_ID_LOW_REG, 0x22);
        let power = Arc::new(MockPowerControl::new());
        let dev = Xs9922::probe(Xs9922Config::default(), bus.clone(), power.clone())
            .await
            .unwrap();
        (dev, bus, power)
    }

    #[tokio::test(start_paused = true)]
    async fn test_probe_rejects_wrong_chip() {
        let bus = Arc::new(MockRegisterBus::new());
        bus.set_register(regs::CHIP_ID_HIGH_REG, 0x12);
        let power = Arc::new(MockPowerControl::new());
        let err = Xs9922::probe(Xs9922Config::default(), bus, power.clone())
            .await
            .unwrap_err();
        assert!(matches!(err, Xs9922Error::ChipIdMismatch { found: 0x1200, .. }));
        assert!(!power.clock_enabled());
    }

    #[tokio::test(start_paused = true)]
    async fn test_probe_programs_default_mode() {
        let (dev, bus, power) = probe_default().await;
        assert_eq!(dev.current_mode().await.index(), 0);
        assert!(bus.writes().starts_with(&[(0x0803, 0x03)]));
        assert_eq!(power.line_level(GpioLine::Camera), Some(true));
        assert!(dev.is_polling().await);
        dev.remove().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_try_format_touches_nothing() {
        let (dev, bus, _) = probe_default().await;
        bus.clear_log();
        let fmt = dev
            .set_format(FormatRequest::try_on(2, 1280, 720, BusFormat::Uyvy8_2x8))
            .await
            .unwrap();
        assert_eq!((fmt.width, fmt.vc), (1280, 2));
        assert!(bus.writes().is_empty());
        assert_eq!(dev.get_format(2, FormatWhich::Try).await, fmt);
        assert_eq!(dev.get_format(2, FormatWhich::Active).await.width, 1920);

        dev.open().await;
        assert_eq!(dev.get_format(2, FormatWhich::Try).await.width, 1920);
        dev.remove().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_enumeration() {
        let (dev, _, _) = probe_default().await;
        assert_eq!(dev.enum_mbus_code(3).unwrap(), BusFormat::Uyvy8_2x8);
        assert!(dev.enum_mbus_code(4).is_err());

        let size = dev.enum_frame_size(1, BusFormat::Uyvy8_2x8).unwrap();
        assert_eq!((size.min_width, size.max_height), (1280, 720));
        assert!(matches!(
            dev.enum_frame_size(1, BusFormat::Yuyv8_2x8),
            Err(Xs9922Error::FormatMismatch { .. })
        ));

        let fie = dev.enum_frame_interval(3).unwrap();
        assert_eq!((fie.width, fie.height), (1920, 1080));
        assert_eq!(dev.frame_interval().await, Fraction::new(10000, 250000));

        let cfg = dev.mbus_config();
        assert_eq!(cfg.lanes, 4);
        assert_eq!(cfg.channels, 0b1111);
        dev.remove().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_picture_control_writes_all_channels() {
        let (dev, bus, _) = probe_default().await;
        bus.clear_log();
        dev.set_control(PictureControl::Hue, 0x90).await.unwrap();
        assert_eq!(
            bus.writes(),
            vec![(0x0109, 0x10), (0x1109, 0x10), (0x2109, 0x10), (0x3109, 0x10)]
        );
        assert_eq!(dev.get_control(PictureControl::Hue).await.unwrap(), 0x90);
        assert!(dev.set_control(PictureControl::Contrast, 300).await.is_err());
        dev.remove().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_remove_powers_down() {
        let (dev, _, power) = probe_default().await;
        dev.remove().await;
        assert!(!dev.is_polling().await);
        assert!(!dev.is_powered().await);
        assert_eq!(power.line_level(GpioLine::Camera), Some(false));
        assert_eq!(power.line_level(GpioLine::Power), Some(false));
        assert!(!power.clock_enabled());
    }
}
