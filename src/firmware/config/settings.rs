use alloc::{format, string::String};

use log::warn;

use super::source::{ConfigSource, DeviceConfig};
use crate::firmware::{
    logging::Severity,
    types::{
        BrokerEndpoint, BrokerIdentity, FallbackAccessPoint, LinkCredentials,
        CLIENT_ID_RANDOM_TOKEN, LINK_PASSPHRASE_MAX, LINK_SSID_MAX,
    },
};

pub const HOSTNAME_DEFAULT: &str = "missing-hostname";
pub const HOSTNAME_TOKEN: &str = "#HOSTNAME#";

pub const LINK_WATCHDOG_DEFAULT_MS: u32 = 30_000;
pub const LINK_CHECK_INTERVAL_DEFAULT_MS: u32 = 30_000;
pub const LINK_RECONNECT_WAIT_DEFAULT_MS: u32 = 20_000;
pub const LINK_POLL_INTERVAL_MS: u32 = 200;
pub const LINK_RESTART_GRACE_MS: u32 = 1_000;

pub const BROKER_PORT_DEFAULT: u16 = 1883;
pub const BROKER_RECONNECT_INTERVAL_DEFAULT_MS: u32 = 300_000;
pub const BROKER_KEEP_ALIVE_DEFAULT_SECS: u16 = 15;
pub const BROKER_INBOUND_PER_TICK: u8 = 16;

pub const MEMORY_INTERVAL_DEFAULT_MS: u32 = 60_000;
pub const IP_INTERVAL_DEFAULT_MS: u32 = 600_000;
pub const PING_INTERVAL_DEFAULT_MS: u32 = 900_000;
pub const AUTO_RESTART_INTERVAL_DEFAULT_MS: u32 = 900_000;
pub const LOG_BACKLOG_DEFAULT: usize = 20;

const fn clamp_u32(value: u32, min: u32, max: u32) -> u32 {
    if value < min {
        min
    } else if value > max {
        max
    } else {
        value
    }
}

/// Zero stays zero ("disabled"); anything else is clamped.
const fn clamp_optional_u32(value: u32, min: u32, max: u32) -> u32 {
    if value == 0 {
        0
    } else {
        clamp_u32(value, min, max)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LinkSettings {
    pub credentials: LinkCredentials,
    pub fallback: Option<FallbackAccessPoint>,
    /// Bound on the blocking connect in `init` and on how long the link may
    /// stay down afterwards. Zero retries forever.
    pub watchdog_ms: u32,
    /// Zero disables the periodic check.
    pub check_interval_ms: u32,
    pub reconnect_wait_ms: u32,
    pub poll_interval_ms: u32,
    pub restart_grace_ms: u32,
}

impl LinkSettings {
    pub fn new(credentials: LinkCredentials, fallback: Option<FallbackAccessPoint>) -> Self {
        Self {
            credentials,
            fallback,
            watchdog_ms: LINK_WATCHDOG_DEFAULT_MS,
            check_interval_ms: LINK_CHECK_INTERVAL_DEFAULT_MS,
            reconnect_wait_ms: LINK_RECONNECT_WAIT_DEFAULT_MS,
            poll_interval_ms: LINK_POLL_INTERVAL_MS,
            restart_grace_ms: LINK_RESTART_GRACE_MS,
        }
    }

    pub fn from_config<S: ConfigSource>(config: &DeviceConfig<S>, hostname: &str) -> Self {
        let credentials = LinkCredentials::new(
            config.get("wifi-ssid", ""),
            config.get("wifi-password", ""),
            hostname,
        );

        let ap_ssid = config.get("wifi-ap-ssid", "").replace(HOSTNAME_TOKEN, hostname);
        let fallback = if ap_ssid.is_empty() {
            None
        } else {
            let passphrase = config.get("wifi-ap-password", "");
            Some(FallbackAccessPoint::new(
                &ap_ssid,
                (!passphrase.is_empty()).then_some(passphrase),
                config.flag("wifi-ap-permanent", false),
            ))
        };

        Self {
            watchdog_ms: config.seconds("wifi-watchdog-timeout", "30").saturating_mul(1_000),
            check_interval_ms: config.seconds("wifi-interval", "30").saturating_mul(1_000),
            reconnect_wait_ms: config.seconds("wifi-wait", "20").saturating_mul(1_000),
            ..Self::new(credentials, fallback)
        }
        .sanitized()
    }

    pub fn sanitized(mut self) -> Self {
        self.poll_interval_ms = clamp_u32(self.poll_interval_ms, 10, 5_000);
        self.restart_grace_ms = clamp_u32(self.restart_grace_ms, 0, 60_000);
        self.watchdog_ms = clamp_optional_u32(self.watchdog_ms, self.poll_interval_ms, 3_600_000);
        self.check_interval_ms = clamp_optional_u32(self.check_interval_ms, 1_000, 86_400_000);
        self.reconnect_wait_ms = clamp_u32(self.reconnect_wait_ms, self.poll_interval_ms, 300_000);

        if self.credentials.ssid.len() > LINK_SSID_MAX {
            warn!("config: wifi-ssid longer than {} bytes", LINK_SSID_MAX);
        }
        if self.credentials.passphrase.len() > LINK_PASSPHRASE_MAX {
            warn!("config: wifi-password longer than {} bytes", LINK_PASSPHRASE_MAX);
        }
        if let Some(fallback) = self.fallback.as_mut() {
            if fallback
                .passphrase
                .as_ref()
                .is_some_and(|passphrase| passphrase.len() < 8)
            {
                warn!("config: wifi-ap-password shorter than 8 characters, access point left open");
                fallback.passphrase = None;
            }
        }
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BrokerSettings {
    pub endpoint: BrokerEndpoint,
    pub identity: BrokerIdentity,
    pub prefix: String,
    pub reconnect_interval_ms: u32,
    pub keep_alive_secs: u16,
    pub max_inbound_per_tick: u8,
}

impl BrokerSettings {
    pub fn new(host: &str, port: u16, identity: BrokerIdentity) -> Self {
        Self {
            endpoint: BrokerEndpoint {
                host: String::from(host),
                port,
            },
            identity,
            prefix: String::new(),
            reconnect_interval_ms: BROKER_RECONNECT_INTERVAL_DEFAULT_MS,
            keep_alive_secs: BROKER_KEEP_ALIVE_DEFAULT_SECS,
            max_inbound_per_tick: BROKER_INBOUND_PER_TICK,
        }
    }

    pub fn from_config<S: ConfigSource>(config: &DeviceConfig<S>, hostname: &str) -> Self {
        let default_client_id = format!("{}-{}", hostname, CLIENT_ID_RANDOM_TOKEN);
        let identity = BrokerIdentity {
            client_id_template: String::from(config.get("mqtt-client-id", &default_client_id)),
            username: String::from(config.get("mqtt-username", "")),
            password: String::from(config.get("mqtt-password", "")),
            will: None,
        };

        Self {
            prefix: String::from(config.get("mqtt-prefix", "")),
            reconnect_interval_ms: config.seconds("mqtt-interval", "300").saturating_mul(1_000),
            keep_alive_secs: config.parsed("mqtt-keepalive", BROKER_KEEP_ALIVE_DEFAULT_SECS),
            ..Self::new(
                config.get("mqtt-server", ""),
                config.parsed("mqtt-port", BROKER_PORT_DEFAULT),
                identity,
            )
        }
        .sanitized()
    }

    pub fn is_configured(&self) -> bool {
        !self.endpoint.host.is_empty()
    }

    pub fn sanitized(mut self) -> Self {
        if self.endpoint.port == 0 {
            self.endpoint.port = BROKER_PORT_DEFAULT;
        }
        self.reconnect_interval_ms = clamp_u32(self.reconnect_interval_ms, 1_000, 86_400_000);
        self.max_inbound_per_tick = self.max_inbound_per_tick.clamp(1, 64);
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AppSettings {
    pub memory_interval_ms: u32,
    /// Zero disables the job.
    pub ip_interval_ms: u32,
    /// Zero disables the job.
    pub ping_interval_ms: u32,
    /// Uptime after which the device restarts itself. Zero disables.
    pub auto_restart_after_min: u32,
    pub auto_restart_interval_ms: u32,
    pub log_backlog_size: usize,
    pub log_level: Severity,
    pub serial_log_level: Severity,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            memory_interval_ms: MEMORY_INTERVAL_DEFAULT_MS,
            ip_interval_ms: IP_INTERVAL_DEFAULT_MS,
            ping_interval_ms: PING_INTERVAL_DEFAULT_MS,
            auto_restart_after_min: 0,
            auto_restart_interval_ms: AUTO_RESTART_INTERVAL_DEFAULT_MS,
            log_backlog_size: LOG_BACKLOG_DEFAULT,
            log_level: Severity::Information,
            serial_log_level: Severity::Information,
        }
    }
}

impl AppSettings {
    pub fn from_config<S: ConfigSource>(config: &DeviceConfig<S>) -> Self {
        let defaults = Self::default();
        Self {
            memory_interval_ms: config.seconds("memory-interval", "60").saturating_mul(1_000),
            ip_interval_ms: config.seconds("ip-interval", "600").saturating_mul(1_000),
            ping_interval_ms: config.seconds("ping-interval", "900").saturating_mul(1_000),
            auto_restart_after_min: config.integer("auto-restart-timeout", 0).clamp(0, 525_600)
                as u32,
            auto_restart_interval_ms: config
                .seconds("auto-restart-interval", "900")
                .saturating_mul(1_000),
            log_backlog_size: config.parsed("log-backlog-size", defaults.log_backlog_size),
            log_level: Severity::parse(config.get("log-level", ""), defaults.log_level),
            serial_log_level: Severity::parse(
                config.get("serial-log-level", ""),
                defaults.serial_log_level,
            ),
        }
        .sanitized()
    }

    pub fn sanitized(mut self) -> Self {
        self.memory_interval_ms = clamp_u32(self.memory_interval_ms, 1_000, 86_400_000);
        self.ip_interval_ms = clamp_optional_u32(self.ip_interval_ms, 1_000, 86_400_000);
        self.ping_interval_ms = clamp_optional_u32(self.ping_interval_ms, 1_000, 86_400_000);
        self.auto_restart_interval_ms =
            clamp_u32(self.auto_restart_interval_ms, 1_000, 86_400_000);
        self.log_backlog_size = self.log_backlog_size.max(1);
        self
    }

    pub fn auto_restart_after_ms(&self) -> u64 {
        u64::from(self.auto_restart_after_min) * 60_000
    }
}
