//! ESP32 implementations of the radio, transport, clock and system seams.

mod net;
mod radio;
mod system;

use alloc::rc::Rc;

use embassy_net::{DhcpConfig, StackResources};
use esp_hal::rng::Rng;
use esp_radio::wifi::Config as WifiRuntimeConfig;
use static_cell::StaticCell;

pub use net::{NetDriver, TcpStream, TcpTransport};
pub use radio::EspRadio;
pub use system::{console_write, hardware_id, EspClock, EspDelay, EspRandom, EspSystem};

use crate::firmware::{
    app::{DevicePlatform, PlatformParts},
    broker::WireSession,
};

const WIFI_RX_QUEUE_SIZE: usize = 3;
const WIFI_TX_QUEUE_SIZE: usize = 2;
const WIFI_STATIC_RX_BUF_NUM: u8 = 4;
const WIFI_DYNAMIC_RX_BUF_NUM: u16 = 8;
const WIFI_DYNAMIC_TX_BUF_NUM: u16 = 8;
const WIFI_RX_BA_WIN: u8 = 3;
const SOCKET_BUFFER_BYTES: usize = 2048;
const MQTT_RX_CAPACITY: usize = 1024;

pub struct Esp32;

impl DevicePlatform for Esp32 {
    type Radio = EspRadio;
    type Session = WireSession<TcpTransport, EspClock>;
    type Random = EspRandom;
    type Clock = EspClock;
    type Delay = EspDelay;

    fn free_heap_bytes() -> usize {
        esp_alloc::HEAP.free()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SetupError {
    RadioInit,
    WifiInit,
    DhcpHostname,
}

impl SetupError {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::RadioInit => "radio init failed",
            Self::WifiInit => "wifi init failed",
            Self::DhcpHostname => "hostname too long for DHCP",
        }
    }
}

/// Brings up the Wi-Fi controller and the DHCP network stack. Returns the
/// platform parts plus the driver the main loop keeps polling.
pub fn setup(
    wifi: esp_hal::peripherals::WIFI<'static>,
    hostname: &str,
) -> Result<(PlatformParts<Esp32>, Rc<NetDriver>), SetupError> {
    static RADIO_CTRL: StaticCell<esp_radio::Controller<'static>> = StaticCell::new();
    static STACK_RESOURCES: StaticCell<StackResources<3>> = StaticCell::new();
    static NET_RUNNER: StaticCell<embassy_net::Runner<'static, esp_radio::wifi::WifiDevice<'static>>> =
        StaticCell::new();
    static RX_BUFFER: StaticCell<[u8; SOCKET_BUFFER_BYTES]> = StaticCell::new();
    static TX_BUFFER: StaticCell<[u8; SOCKET_BUFFER_BYTES]> = StaticCell::new();

    let radio_ctrl = esp_radio::init().map_err(|_| SetupError::RadioInit)?;
    let radio_ctrl = RADIO_CTRL.init(radio_ctrl);
    let (controller, ifaces) = esp_radio::wifi::new(radio_ctrl, wifi, wifi_runtime_config())
        .map_err(|_| SetupError::WifiInit)?;

    let mut dhcp = DhcpConfig::default();
    dhcp.hostname = Some(hostname.try_into().map_err(|_| SetupError::DhcpHostname)?);

    let rng = Rng::new();
    let seed = (rng.random() as u64) << 32 | rng.random() as u64;
    let (stack, runner) = embassy_net::new(
        ifaces.sta,
        embassy_net::Config::dhcpv4(dhcp),
        STACK_RESOURCES.init(StackResources::<3>::new()),
        seed,
    );
    let net = Rc::new(NetDriver::new(NET_RUNNER.init(runner)));

    let transport = TcpTransport::new(
        stack,
        net.clone(),
        RX_BUFFER.init([0; SOCKET_BUFFER_BYTES]),
        TX_BUFFER.init([0; SOCKET_BUFFER_BYTES]),
    );
    let parts = PlatformParts {
        radio: EspRadio::new(controller, stack, net.clone()),
        session: WireSession::new(transport, EspClock, MQTT_RX_CAPACITY),
        random: EspRandom::new(),
        clock: EspClock,
        delay: EspDelay::new(net.clone()),
    };
    Ok((parts, net))
}

fn wifi_runtime_config() -> WifiRuntimeConfig {
    WifiRuntimeConfig::default()
        .with_rx_queue_size(WIFI_RX_QUEUE_SIZE)
        .with_tx_queue_size(WIFI_TX_QUEUE_SIZE)
        .with_static_rx_buf_num(WIFI_STATIC_RX_BUF_NUM)
        .with_dynamic_rx_buf_num(WIFI_DYNAMIC_RX_BUF_NUM)
        .with_dynamic_tx_buf_num(WIFI_DYNAMIC_TX_BUF_NUM)
        .with_ampdu_rx_enable(false)
        .with_ampdu_tx_enable(false)
        .with_rx_ba_win(WIFI_RX_BA_WIN)
}
