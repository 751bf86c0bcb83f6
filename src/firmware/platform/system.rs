use alloc::{rc::Rc, string::String};

use embassy_time::{Instant, Timer};
use esp_hal::{efuse::Efuse, rng::Rng};

use super::net::NetDriver;
use crate::firmware::{
    config::format_hardware_id,
    runtime::{Clock, Delay, RandomSource, SystemControl},
};

#[derive(Clone, Copy, Debug, Default)]
pub struct EspClock;

impl Clock for EspClock {
    fn now_ms(&self) -> u64 {
        Instant::now().as_millis()
    }
}

/// Sleeps while the network stack keeps running.
pub struct EspDelay {
    net: Rc<NetDriver>,
}

impl EspDelay {
    pub fn new(net: Rc<NetDriver>) -> Self {
        Self { net }
    }
}

impl Delay for EspDelay {
    fn delay_ms(&mut self, ms: u32) {
        self.net.drive(Timer::after_millis(u64::from(ms)));
    }
}

pub struct EspRandom(Rng);

impl EspRandom {
    pub fn new() -> Self {
        Self(Rng::new())
    }
}

impl RandomSource for EspRandom {
    fn next_u32(&mut self) -> u32 {
        self.0.random()
    }
}

pub struct EspSystem;

impl SystemControl for EspSystem {
    fn restart(&mut self) -> ! {
        esp_hal::system::software_reset()
    }
}

pub fn console_write(line: &str) {
    esp_println::println!("{}", line);
}

/// Factory MAC, formatted the way per-device config keys expect it.
pub fn hardware_id() -> String {
    format_hardware_id(Efuse::mac_address())
}
