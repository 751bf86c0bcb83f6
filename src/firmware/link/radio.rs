use alloc::vec::Vec;
use core::net::Ipv4Addr;

use crate::firmware::types::{FallbackAccessPoint, LinkCredentials, ScanRecord};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RadioMode {
    Station,
    StationAndAccessPoint,
}

impl RadioMode {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Station => "STA",
            Self::StationAndAccessPoint => "AP+STA",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RadioError {
    NotStarted,
    InvalidConfig,
    ScanFailed,
    ConnectFailed,
    AccessPoint,
    Driver,
}

impl RadioError {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotStarted => "not started",
            Self::InvalidConfig => "invalid config",
            Self::ScanFailed => "scan failed",
            Self::ConnectFailed => "connect failed",
            Self::AccessPoint => "access point failed",
            Self::Driver => "driver error",
        }
    }
}

/// Station/access-point radio as the link manager drives it.
///
/// Every call returns promptly; waiting for association is the caller's
/// job, via [`Radio::is_connected`].
pub trait Radio {
    fn configure(&mut self, hostname: &str, mode: RadioMode) -> Result<(), RadioError>;

    /// Directed scan: only networks named `ssid` are expected back.
    fn scan(&mut self, ssid: &str) -> Result<Vec<ScanRecord>, RadioError>;

    /// Starts associating with one specific radio of the network.
    fn connect(&mut self, credentials: &LinkCredentials, target: &ScanRecord)
        -> Result<(), RadioError>;

    fn is_connected(&mut self) -> bool;

    fn disconnect(&mut self) -> Result<(), RadioError>;

    fn start_access_point(&mut self, access_point: &FallbackAccessPoint) -> Result<(), RadioError>;

    fn stop_access_point(&mut self) -> Result<(), RadioError>;

    fn ip_address(&self) -> Option<Ipv4Addr>;
}
