//! Shared fixtures for the integration suites.

#![allow(dead_code)]

use std::sync::Arc;
use vcap_driver_mock::{MockPowerControl, MockRegisterBus};
use vcap_driver_xs9922::regs;
use vcap_driver_xs9922::{Xs9922, Xs9922Config};

pub const PRESENT: u8 = 0x00;
pub const ABSENT: u8 = regs::VIDEO_LOSS_BIT;

pub struct Rig {
    pub dev: Xs9922,
    pub bus: Arc<MockRegisterBus>,
    pub power: Arc<MockPowerControl>,
}

/// Bus answering with the right chip id and every channel reporting `status`.
pub fn chip_bus(status: u8) -> Arc<MockRegisterBus> {
    let bus = Arc::new(MockRegisterBus::new());
    bus.set_register(regs::CHIP_ID_HIGH_REG, 0x99);
    bus.set_register(regs::CHIP_ID_LOW_REG, 0x22);
    for ch in 0..regs::NUM_CHANNELS {
        bus.set_register(regs::video_status_reg(ch), status);
    }
    bus
}

pub async fn rig_with(config: Xs9922Config, status: u8) -> Rig {
    let bus = chip_bus(status);
    let power = Arc::new(MockPowerControl::new());
    let dev = Xs9922::probe(config, bus.clone(), power.clone())
        .await
        .expect("probe");
    // Let the poller take its baseline before the test changes anything.
    tokio::task::yield_now().await;
    Rig { dev, bus, power }
}

pub async fn rig(status: u8) -> Rig {
    rig_with(Xs9922Config::default(), status).await
}
