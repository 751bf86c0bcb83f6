#![no_std]
#![no_main]

use esp_backtrace as _;
use esp_hal::timer::timg::TimerGroup;
use log::{error, warn};
use tether::firmware::{
    app::{AppIdentity, DeviceApp},
    config::{DeviceConfig, KeyValueConfig, HOSTNAME_DEFAULT},
    logging::{self, BacklogQueue, ConsoleSink, Severity, CRITICAL},
    platform::{self, console_write, hardware_id, Esp32, EspSystem},
    runtime::{Step, SystemControl, RESTART},
};

const HEAP_BYTES: usize = 96 * 1024;
const LOG_BACKLOG_CAPACITY: usize = 32;
const DEVICE_CONFIG: &str = include_str!("../config/device.conf");
const IDENTITY: AppIdentity = AppIdentity {
    name: env!("CARGO_PKG_NAME"),
    version: env!("CARGO_PKG_VERSION"),
};

static LOG_BACKLOG: BacklogQueue<LOG_BACKLOG_CAPACITY> = BacklogQueue::new();

#[esp_hal::main]
fn main() -> ! {
    let peripherals = esp_hal::init(esp_hal::Config::default());
    esp_alloc::heap_allocator!(size: HEAP_BYTES);
    let timg0 = TimerGroup::new(peripherals.TIMG0);
    esp_rtos::start(timg0.timer0);

    if logging::install(ConsoleSink::new(console_write, Severity::Information)).is_err() {
        console_write("main: logger already installed");
    }

    let config = DeviceConfig::new(KeyValueConfig::parse(DEVICE_CONFIG), &hardware_id());
    let hostname = config.get("hostname", HOSTNAME_DEFAULT);
    let (parts, net) = match platform::setup(peripherals.WIFI, hostname) {
        Ok(setup) => setup,
        Err(err) => {
            error!(target: CRITICAL, "main: {}", err.as_str());
            halt_forever();
        }
    };

    let mut app =
        DeviceApp::<Esp32, LOG_BACKLOG_CAPACITY>::start(IDENTITY, &config, parts, &LOG_BACKLOG, &RESTART);
    let mut system = EspSystem;
    loop {
        net.poll();
        if app.step() == Step::Restart {
            warn!("main: restart requested, rebooting");
            system.restart();
        }
    }
}

fn halt_forever() -> ! {
    loop {
        core::hint::spin_loop();
    }
}
