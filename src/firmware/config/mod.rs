pub mod duration;
mod settings;
mod source;

pub use settings::{
    AppSettings, BrokerSettings, LinkSettings, BROKER_INBOUND_PER_TICK,
    BROKER_KEEP_ALIVE_DEFAULT_SECS, BROKER_PORT_DEFAULT, BROKER_RECONNECT_INTERVAL_DEFAULT_MS,
    HOSTNAME_DEFAULT, HOSTNAME_TOKEN, LINK_CHECK_INTERVAL_DEFAULT_MS, LINK_POLL_INTERVAL_MS,
    LINK_RECONNECT_WAIT_DEFAULT_MS, LINK_RESTART_GRACE_MS, LINK_WATCHDOG_DEFAULT_MS,
    LOG_BACKLOG_DEFAULT,
};
pub use source::{format_hardware_id, ConfigSource, DeviceConfig, KeyValueConfig};

#[cfg(test)]
mod tests;
