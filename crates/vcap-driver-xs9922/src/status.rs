//! Text status surface.
//!
//! Reading yields the raw hotplug bitmap as a decimal line. Writing accepts
//! a decimal command:
//!
//! | command | effect                         |
//! |---------|--------------------------------|
//! | `0`     | camera supply off              |
//! | `1`     | camera supply on               |
//! | `2`     | dump per-channel registers     |

use crate::device::{ChannelDump, Xs9922};
use crate::error::Xs9922Error;

/// A parsed status command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCommand {
    /// Switch the camera supply line.
    CameraPower(bool),
    /// Read back every channel's diagnostic registers.
    DumpRegisters,
}

/// Parse one command written to the status surface.
pub fn parse_command(text: &str) -> Result<StatusCommand, Xs9922Error> {
    let trimmed = text.trim();
    match trimmed.parse::<u32>() {
        Ok(0) => Ok(StatusCommand::CameraPower(false)),
        Ok(1) => Ok(StatusCommand::CameraPower(true)),
        Ok(2) => Ok(StatusCommand::DumpRegisters),
        _ => Err(Xs9922Error::InvalidCommand(trimmed.to_string())),
    }
}

/// Outcome of a stored command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutput {
    /// Command applied.
    Done,
    /// Registers read by `2`.
    Dump(Vec<ChannelDump>),
}

impl Xs9922 {
    /// Raw hotplug bitmap as a decimal line.
    pub fn hotplug_status(&self) -> String {
        format!("{}\n", self.hotplug_info())
    }

    /// Parse and apply a written command.
    pub async fn store_command(&self, text: &str) -> Result<CommandOutput, Xs9922Error> {
        match parse_command(text)? {
            StatusCommand::CameraPower(on) => {
                self.set_camera_power(on).await?;
                Ok(CommandOutput::Done)
            }
            StatusCommand::DumpRegisters => Ok(CommandOutput::Dump(self.dump_registers().await)),
        }
    }
}
