use alloc::{rc::Rc, string::String, vec::Vec};
use core::net::Ipv4Addr;

use embassy_net::Stack;
use esp_radio::wifi::{
    AccessPointConfig, AuthMethod, ClientConfig, ModeConfig, ScanConfig, WifiController,
};
use log::{debug, info, warn};

use super::net::NetDriver;
use crate::firmware::{
    link::{Radio, RadioError, RadioMode},
    types::{BssidDisplay, FallbackAccessPoint, LinkCredentials, ScanRecord},
};

const SCAN_MAX: usize = 32;

/// Station plus optional access point on the ESP32 Wi-Fi controller.
pub struct EspRadio {
    controller: WifiController<'static>,
    stack: Stack<'static>,
    net: Rc<NetDriver>,
    mode: RadioMode,
    station: ClientConfig,
    access_point: Option<AccessPointConfig>,
}

impl EspRadio {
    pub fn new(controller: WifiController<'static>, stack: Stack<'static>, net: Rc<NetDriver>) -> Self {
        Self {
            controller,
            stack,
            net,
            mode: RadioMode::Station,
            station: ClientConfig::default(),
            access_point: None,
        }
    }

    fn apply(&mut self) -> Result<(), RadioError> {
        let mode = match &self.access_point {
            Some(access_point) => ModeConfig::ApSta(self.station.clone(), access_point.clone()),
            None => ModeConfig::Client(self.station.clone()),
        };
        self.controller.set_config(&mode).map_err(|err| {
            warn!("radio: config rejected: {:?}", err);
            RadioError::InvalidConfig
        })?;
        self.ensure_started()
    }

    fn ensure_started(&mut self) -> Result<(), RadioError> {
        match self.controller.is_started() {
            Ok(true) => Ok(()),
            Ok(false) => self.net.drive(self.controller.start_async()).map_err(|err| {
                warn!("radio: start failed: {:?}", err);
                RadioError::NotStarted
            }),
            Err(err) => {
                warn!("radio: status unavailable: {:?}", err);
                Err(RadioError::Driver)
            }
        }
    }
}

fn auth_method(passphrase: &str) -> AuthMethod {
    if passphrase.is_empty() {
        AuthMethod::None
    } else {
        AuthMethod::Wpa2Personal
    }
}

impl Radio for EspRadio {
    fn configure(&mut self, hostname: &str, mode: RadioMode) -> Result<(), RadioError> {
        info!("radio: {} mode as '{}'", mode.as_str(), hostname);
        self.mode = mode;
        self.apply()
    }

    fn scan(&mut self, ssid: &str) -> Result<Vec<ScanRecord>, RadioError> {
        self.ensure_started()?;
        let config = ScanConfig::default()
            .with_ssid(ssid)
            .with_show_hidden(false)
            .with_max(SCAN_MAX);
        let found = self
            .net
            .drive(self.controller.scan_with_config_async(config))
            .map_err(|err| {
                warn!("radio: scan failed: {:?}", err);
                RadioError::ScanFailed
            })?;
        Ok(found
            .iter()
            .map(|ap| ScanRecord {
                ssid: String::from(ap.ssid.as_str()),
                bssid: ap.bssid,
                channel: ap.channel,
                rssi: ap.signal_strength,
            })
            .collect())
    }

    fn connect(
        &mut self,
        credentials: &LinkCredentials,
        target: &ScanRecord,
    ) -> Result<(), RadioError> {
        debug!(
            "radio: joining {} on channel {}",
            BssidDisplay(target.bssid),
            target.channel
        );
        self.station = ClientConfig::default()
            .with_ssid(credentials.ssid.clone())
            .with_password(credentials.passphrase.clone())
            .with_auth_method(auth_method(&credentials.passphrase))
            .with_bssid(target.bssid)
            .with_channel(target.channel);
        self.apply()?;
        self.net
            .drive(self.controller.connect_async())
            .map_err(|err| {
                warn!("radio: association failed: {:?}", err);
                RadioError::ConnectFailed
            })
    }

    /// Associated and holding a DHCP lease.
    fn is_connected(&mut self) -> bool {
        self.net.poll();
        matches!(self.controller.is_connected(), Ok(true)) && self.stack.config_v4().is_some()
    }

    fn disconnect(&mut self) -> Result<(), RadioError> {
        self.net
            .drive(self.controller.disconnect_async())
            .map_err(|err| {
                debug!("radio: disconnect: {:?}", err);
                RadioError::Driver
            })
    }

    fn start_access_point(&mut self, access_point: &FallbackAccessPoint) -> Result<(), RadioError> {
        let passphrase = access_point.passphrase.clone().unwrap_or_default();
        self.access_point = Some(
            AccessPointConfig::default()
                .with_ssid(access_point.ssid.clone())
                .with_auth_method(auth_method(&passphrase))
                .with_password(passphrase),
        );
        self.apply().map_err(|_| RadioError::AccessPoint)
    }

    fn stop_access_point(&mut self) -> Result<(), RadioError> {
        if self.mode == RadioMode::StationAndAccessPoint {
            debug!("radio: access point kept for {} mode", self.mode.as_str());
        }
        self.access_point = None;
        self.apply()
    }

    fn ip_address(&self) -> Option<Ipv4Addr> {
        self.stack
            .config_v4()
            .map(|config| config.address.address())
    }
}
