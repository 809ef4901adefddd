//! CLI entry point for the XS9922 simulator.
//!
//! Runs the driver against the mock register bus and power collaborators:
//!
//! ```bash
//! xs9922-sim modes
//! xs9922-sim simulate --format 1280x720 --stream 0000 0001 0001 0011
//! xs9922-sim status --command 2
//! ```
//!
//! Set `RUST_LOG=vcap_driver_xs9922=debug` for driver logs.

#[cfg(not(test))]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use vcap_driver_mock::{MockPowerControl, MockRegisterBus};
use vcap_driver_xs9922::regs;
use vcap_driver_xs9922::{
    modes, CommandOutput, FormatRequest, Xs9922, Xs9922Config, MODES,
};

#[derive(Parser)]
#[command(name = "xs9922-sim")]
#[command(about = "Drive the XS9922 deserializer driver against simulated hardware", long_about = None)]
struct Cli {
    /// Device configuration file (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the supported mode table
    Modes,

    /// Probe a simulated chip and replay a sequence of channel bitmaps
    Simulate {
        /// Active format as WIDTHxHEIGHT
        #[arg(long)]
        format: Option<String>,

        /// Start streaming before replaying bitmaps
        #[arg(long)]
        stream: bool,

        /// Inject random bus failures with this seed
        #[arg(long)]
        chaos_seed: Option<u64>,

        /// Channel presence bitmaps, bit 0 = channel 0 (e.g. 0101)
        bitmaps: Vec<String>,
    },

    /// Read the status surface and optionally store a command
    Status {
        /// 0 = camera off, 1 = camera on, 2 = register dump
        #[arg(long)]
        command: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => Xs9922Config::load_from(path)?,
        None => Xs9922Config::default(),
    };

    match cli.command {
        Commands::Modes => {
            print_modes();
            Ok(())
        }
        Commands::Simulate {
            format,
            stream,
            chaos_seed,
            bitmaps,
        } => simulate(config, format, stream, chaos_seed, bitmaps).await,
        Commands::Status { command } => status(config, command).await,
    }
}

fn print_modes() {
    println!("{:<3} {:<10} {:<12} {:>8} {:>14}", "idx", "size", "format", "fps", "pixel rate");
    for mode in MODES.iter() {
        println!(
            "{:<3} {:<10} {:<12} {:>8.2} {:>14}",
            mode.index(),
            mode.label(),
            mode.bus_format.to_string(),
            mode.max_fps.fps(),
            mode.pixel_rate()
        );
    }
}

/// Simulated chip with every channel absent.
fn simulated_bus(chaos_seed: Option<u64>) -> Arc<MockRegisterBus> {
    let bus = match chaos_seed {
        Some(seed) => MockRegisterBus::chaos_seeded(seed),
        None => MockRegisterBus::new(),
    };
    bus.set_register(regs::CHIP_ID_HIGH_REG, (regs::CHIP_ID >> 8) as u8);
    bus.set_register(regs::CHIP_ID_LOW_REG, (regs::CHIP_ID & 0xff) as u8);
    apply_bitmap(&bus, 0);
    Arc::new(bus)
}

fn apply_bitmap(bus: &MockRegisterBus, bitmap: u8) {
    for ch in 0..regs::NUM_CHANNELS {
        let status = if bitmap & (1 << ch) != 0 {
            0
        } else {
            regs::VIDEO_LOSS_BIT
        };
        bus.set_register(regs::video_status_reg(ch), status);
    }
}

fn parse_bitmap(text: &str) -> Result<u8> {
    let digits = text.trim().trim_start_matches("0b");
    let value = u8::from_str_radix(digits, 2)
        .with_context(|| format!("invalid channel bitmap '{}'", text))?;
    if value > 0xf {
        bail!("bitmap '{}' names more than four channels", text);
    }
    Ok(value)
}

async fn simulate(
    config: Xs9922Config,
    format: Option<String>,
    stream: bool,
    chaos_seed: Option<u64>,
    bitmaps: Vec<String>,
) -> Result<()> {
    let steps = bitmaps
        .iter()
        .map(|b| parse_bitmap(b))
        .collect::<Result<Vec<_>>>()?;

    // Long enough for a change to be confirmed at the slow poll rate.
    let step = config.slow_poll() * (u32::from(config.debounce_ticks) + 1);

    let bus = simulated_bus(chaos_seed);
    let power = Arc::new(MockPowerControl::new());
    let dev = Xs9922::probe(config, bus.clone(), power).await?;
    let mut events = dev.subscribe();

    if let Some(label) = format {
        let mode = modes::find_by_label(&label)
            .with_context(|| format!("no mode named '{}'", label))?;
        let fmt = dev
            .set_format(FormatRequest::active(mode.width, mode.height, mode.bus_format))
            .await?;
        println!("format: {}x{} {} vc0-3", fmt.width, fmt.height, fmt.code);
    }
    if stream {
        dev.set_stream(true).await?;
        println!("streaming");
    }

    for (i, bitmap) in steps.into_iter().enumerate() {
        tracing::info!(step = i, bitmap = %format!("{:04b}", bitmap), "applying channel bitmap");
        apply_bitmap(&bus, bitmap);
        tokio::select! {
            _ = tokio::time::sleep(step) => {}
            _ = tokio::signal::ctrl_c() => break,
        }
        while let Ok(event) = events.try_recv() {
            for change in event.changes() {
                println!("{:?}", change);
            }
        }
        let reset = dev.reset_info();
        println!(
            "raw {:04b} confirmed {:04b} reset_required {}",
            dev.hotplug_info(),
            dev.confirmed_hotplug(),
            reset.needs_reset
        );
        if reset.needs_reset {
            dev.set_reset_info(false);
            tracing::info!(step = i, reason = ?reset.reason, "reset acknowledged");
        }
    }

    dev.remove().await;
    Ok(())
}

async fn status(config: Xs9922Config, command: Option<String>) -> Result<()> {
    let bus = simulated_bus(None);
    let power = Arc::new(MockPowerControl::new());
    let dev = Xs9922::probe(config, bus, power).await?;

    print!("{}", dev.hotplug_status());
    if let Some(command) = command {
        match dev.store_command(&command).await? {
            CommandOutput::Done => println!("ok"),
            CommandOutput::Dump(dumps) => {
                for dump in dumps {
                    println!("channel {}", dump.channel);
                    for (addr, val) in dump.registers {
                        println!("  {:#06x} = {:#04x}", addr, val);
                    }
                }
            }
        }
    }

    dev.remove().await;
    Ok(())
}
