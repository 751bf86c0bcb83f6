use alloc::{
    format,
    string::{String, ToString},
    vec::Vec,
};
use core::str::FromStr;

use log::trace;

use super::duration::parse_seconds;

pub trait ConfigSource {
    fn get(&self, key: &str) -> Option<&str>;
}

/// `key=value` lines. CR is stripped, blank lines and `#` comments are
/// skipped, and a line without `=` is a key with an empty value. The first
/// occurrence of a key wins.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct KeyValueConfig {
    entries: Vec<(String, String)>,
}

impl KeyValueConfig {
    pub fn parse(text: &str) -> Self {
        let mut entries = Vec::new();
        for line in text.split('\n') {
            let line = line.strip_suffix('\r').unwrap_or(line);
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let (key, value) = line.split_once('=').unwrap_or((line, ""));
            entries.push((key.to_string(), value.to_string()));
        }
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }
}

impl ConfigSource for KeyValueConfig {
    fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(candidate, _)| candidate == key)
            .map(|(_, value)| value.as_str())
    }
}

/// Configuration as seen by one device: `key-<hardware id>` beats `key`,
/// which beats the caller's default.
pub struct DeviceConfig<S: ConfigSource> {
    source: S,
    hardware_id: String,
}

impl<S: ConfigSource> DeviceConfig<S> {
    pub fn new(source: S, hardware_id: &str) -> Self {
        Self {
            source,
            hardware_id: String::from(hardware_id),
        }
    }

    pub fn hardware_id(&self) -> &str {
        &self.hardware_id
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn lookup(&self, key: &str) -> Option<&str> {
        let specific = format!("{}-{}", key, self.hardware_id);
        self.source
            .get(&specific)
            .or_else(|| self.source.get(key))
    }

    pub fn get<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        let value = self.lookup(key).unwrap_or(default);
        trace!("config: {} = '{}'", key, value);
        value
    }

    pub fn seconds(&self, key: &str, default: &str) -> u32 {
        parse_seconds(self.get(key, default), 's')
    }

    /// Leading integer, like C `atoi`: garbage parses as zero.
    pub fn integer(&self, key: &str, default: i64) -> i64 {
        match self.lookup(key) {
            Some(value) => leading_integer(value),
            None => default,
        }
    }

    pub fn flag(&self, key: &str, default: bool) -> bool {
        match self.lookup(key) {
            Some(value) => leading_integer(value) != 0,
            None => default,
        }
    }

    pub fn parsed<T: FromStr>(&self, key: &str, default: T) -> T {
        self.lookup(key)
            .and_then(|value| value.trim().parse().ok())
            .unwrap_or(default)
    }
}

fn leading_integer(text: &str) -> i64 {
    let text = text.trim_start();
    let (negative, digits) = match text.as_bytes().first() {
        Some(b'-') => (true, &text[1..]),
        Some(b'+') => (false, &text[1..]),
        _ => (false, text),
    };
    let mut value: i64 = 0;
    for digit in digits.chars().map_while(|ch| ch.to_digit(10)) {
        value = value.saturating_mul(10).saturating_add(i64::from(digit));
    }
    if negative {
        -value
    } else {
        value
    }
}

/// Upper-case colon separated MAC, the form used for per-device keys.
pub fn format_hardware_id(mac: [u8; 6]) -> String {
    let [a, b, c, d, e, f] = mac;
    format!("{a:02X}:{b:02X}:{c:02X}:{d:02X}:{e:02X}:{f:02X}")
}
