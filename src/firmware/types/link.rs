use alloc::string::String;
use core::fmt;

pub const LINK_SSID_MAX: usize = 32;
pub const LINK_PASSPHRASE_MAX: usize = 64;

pub type Bssid = [u8; 6];

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LinkCredentials {
    pub ssid: String,
    pub passphrase: String,
    pub hostname: String,
}

impl LinkCredentials {
    pub fn new(ssid: &str, passphrase: &str, hostname: &str) -> Self {
        Self {
            ssid: String::from(ssid),
            passphrase: String::from(passphrase),
            hostname: String::from(hostname),
        }
    }

    pub fn has_primary(&self) -> bool {
        !self.ssid.is_empty()
    }
}

/// Self-hosted network brought up when the primary one is unreachable.
///
/// A non-permanent access point is torn down the next time the primary
/// network is confirmed reachable; a permanent one stays up alongside it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FallbackAccessPoint {
    pub ssid: String,
    pub passphrase: Option<String>,
    pub permanent: bool,
}

impl FallbackAccessPoint {
    pub fn new(ssid: &str, passphrase: Option<&str>, permanent: bool) -> Self {
        Self {
            ssid: String::from(ssid),
            passphrase: passphrase.map(String::from),
            permanent,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScanRecord {
    pub ssid: String,
    pub bssid: Bssid,
    pub channel: u8,
    pub rssi: i8,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BssidDisplay(pub Bssid);

impl fmt::Display for BssidDisplay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02x}:{b:02x}:{c:02x}:{d:02x}:{e:02x}:{g:02x}")
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LinkState {
    Disconnected,
    Scanning,
    Connecting,
    Connected,
    AccessPointActive,
}

impl LinkState {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "Disconnected",
            Self::Scanning => "Scanning",
            Self::Connecting => "Connecting",
            Self::Connected => "Connected",
            Self::AccessPointActive => "AccessPointActive",
        }
    }
}
