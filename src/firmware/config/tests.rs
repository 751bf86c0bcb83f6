use super::{
    duration::{parse_millis, parse_seconds},
    format_hardware_id, AppSettings, BrokerSettings, ConfigSource, DeviceConfig, KeyValueConfig,
    LinkSettings, BROKER_PORT_DEFAULT, LINK_POLL_INTERVAL_MS,
};
use crate::firmware::logging::Severity;

const HW: &str = "24:0A:C4:00:11:22";

fn device(text: &str) -> DeviceConfig<KeyValueConfig> {
    DeviceConfig::new(KeyValueConfig::parse(text), HW)
}

#[test]
fn duration_groups_add_up() {
    assert_eq!(parse_seconds("1d5h", 's'), 86_400 + 5 * 3_600);
    assert_eq!(parse_seconds("2h 30m", 's'), 2 * 3_600 + 30 * 60);
    assert_eq!(parse_seconds(",,1w;;", 's'), 7 * 86_400);
}

#[test]
fn duration_bare_number_uses_default_unit() {
    assert_eq!(parse_seconds("45", 's'), 45);
    assert_eq!(parse_seconds("45", 'm'), 45 * 60);
    assert_eq!(parse_seconds("1h:15", 'm'), 3_600 + 15 * 60);
    assert_eq!(parse_millis("3", 's'), 3_000);
}

#[test]
fn duration_unknown_unit_is_ignored() {
    assert_eq!(parse_seconds("5x 10s", 's'), 10);
    assert_eq!(parse_seconds("", 's'), 0);
    assert_eq!(parse_seconds(" / . ", 's'), 0);
}

#[test]
fn duration_saturates() {
    assert_eq!(parse_seconds("99999999999w", 's'), u32::MAX);
}

#[test]
fn key_value_parser_skips_comments_and_blank_lines() {
    let config = KeyValueConfig::parse("# comment\r\n\r\nhostname=kitchen\r\nflag\nempty=\n");
    assert_eq!(config.len(), 3);
    assert_eq!(config.get("hostname"), Some("kitchen"));
    assert_eq!(config.get("flag"), Some(""));
    assert_eq!(config.get("empty"), Some(""));
    assert_eq!(config.get("missing"), None);
}

#[test]
fn key_value_first_occurrence_wins() {
    let config = KeyValueConfig::parse("a=1\na=2\nurl=http://x/?q=1");
    assert_eq!(config.get("a"), Some("1"));
    assert_eq!(config.get("url"), Some("http://x/?q=1"));
}

#[test]
fn hardware_specific_key_overrides_generic_one() {
    let config = device("hostname=generic\nhostname-24:0A:C4:00:11:22=specific\nport=1");
    assert_eq!(config.get("hostname", "x"), "specific");
    assert_eq!(config.get("port", "x"), "1");
    assert_eq!(config.get("absent", "fallback"), "fallback");
}

#[test]
fn numeric_lookups_behave_like_atoi() {
    let config = device("a=42abc\nb=junk\nc=-7\nd=1\ne=0");
    assert_eq!(config.integer("a", 5), 42);
    assert_eq!(config.integer("b", 5), 0);
    assert_eq!(config.integer("c", 5), -7);
    assert_eq!(config.integer("missing", 5), 5);
    assert!(config.flag("d", false));
    assert!(!config.flag("e", true));
    assert!(config.flag("missing", true));
}

#[test]
fn hardware_id_is_upper_case_colon_separated() {
    assert_eq!(
        format_hardware_id([0x24, 0x0a, 0xc4, 0x00, 0x11, 0x22]),
        "24:0A:C4:00:11:22"
    );
}

#[test]
fn link_settings_defaults() {
    let settings = LinkSettings::from_config(&device("wifi-ssid=Home"), "kitchen");
    assert_eq!(settings.credentials.ssid, "Home");
    assert_eq!(settings.credentials.hostname, "kitchen");
    assert!(settings.fallback.is_none());
    assert_eq!(settings.watchdog_ms, 30_000);
    assert_eq!(settings.check_interval_ms, 30_000);
    assert_eq!(settings.reconnect_wait_ms, 20_000);
    assert_eq!(settings.poll_interval_ms, LINK_POLL_INTERVAL_MS);
}

#[test]
fn link_settings_fallback_expands_hostname() {
    let settings = LinkSettings::from_config(
        &device("wifi-ap-ssid=#HOSTNAME#-AP\nwifi-ap-password=changeme\nwifi-ap-permanent=1"),
        "kitchen",
    );
    let fallback = settings.fallback.as_ref().map(|ap| {
        (ap.ssid.as_str(), ap.passphrase.as_deref(), ap.permanent)
    });
    assert_eq!(fallback, Some(("kitchen-AP", Some("changeme"), true)));
}

#[test]
fn link_settings_short_ap_password_leaves_ap_open() {
    let settings =
        LinkSettings::from_config(&device("wifi-ap-ssid=ap\nwifi-ap-password=short"), "h");
    assert!(settings
        .fallback
        .as_ref()
        .is_some_and(|ap| ap.passphrase.is_none()));
}

#[test]
fn link_settings_zero_interval_disables_checks() {
    let settings = LinkSettings::from_config(
        &device("wifi-interval=0\nwifi-watchdog-timeout=0\nwifi-wait=1m"),
        "h",
    );
    assert_eq!(settings.check_interval_ms, 0);
    assert_eq!(settings.watchdog_ms, 0);
    assert_eq!(settings.reconnect_wait_ms, 60_000);
}

#[test]
fn broker_settings_from_config() {
    let settings = BrokerSettings::from_config(
        &device("mqtt-server=broker.lan\nmqtt-username=dev\nmqtt-interval=5m\nmqtt-prefix=home"),
        "kitchen",
    );
    assert!(settings.is_configured());
    assert_eq!(settings.endpoint.host, "broker.lan");
    assert_eq!(settings.endpoint.port, BROKER_PORT_DEFAULT);
    assert_eq!(settings.identity.client_id_template, "kitchen-#RANDOM#");
    assert_eq!(settings.identity.username, "dev");
    assert_eq!(settings.reconnect_interval_ms, 300_000);
    assert_eq!(settings.prefix, "home");
}

#[test]
fn broker_settings_bad_port_falls_back() {
    let settings = BrokerSettings::from_config(&device("mqtt-port=nope"), "h");
    assert!(!settings.is_configured());
    assert_eq!(settings.endpoint.port, BROKER_PORT_DEFAULT);
    let settings = BrokerSettings::from_config(&device("mqtt-port=0"), "h");
    assert_eq!(settings.endpoint.port, BROKER_PORT_DEFAULT);
}

#[test]
fn app_settings_from_config() {
    let settings = AppSettings::from_config(&device(
        "memory-interval=2m\nip-interval=0\nauto-restart-timeout=1440\nlog-level=W\nserial-log-level=debug",
    ));
    assert_eq!(settings.memory_interval_ms, 120_000);
    assert_eq!(settings.ip_interval_ms, 0);
    assert_eq!(settings.ping_interval_ms, 900_000);
    assert_eq!(settings.auto_restart_after_ms(), 1_440 * 60_000);
    assert_eq!(settings.log_level, Severity::Warning);
    assert_eq!(settings.serial_log_level, Severity::Debug);
    assert_eq!(settings.log_backlog_size, 20);
}
