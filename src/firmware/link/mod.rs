//! Wireless link lifecycle: directed scan, BSSID-pinned association,
//! watchdog-bounded waits and the fallback access point.

mod machine;
mod radio;
mod select;

use core::net::Ipv4Addr;

use log::{debug, error, info, warn};

pub use machine::{LinkEvent, LinkStateEngine};
pub use radio::{Radio, RadioError, RadioMode};
pub use select::strongest_candidate;

use crate::firmware::{
    config::LinkSettings,
    logging::{Severity, CRITICAL},
    runtime::{Clock, Component, Delay, RestartSignal, StatusSlot},
    types::{Bssid, BssidDisplay, LinkState, ScanRecord},
};

pub const STATUS_CONNECTED: i32 = 0;
pub const STATUS_ACCESS_POINT: i32 = 1;
pub const STATUS_DISCONNECTED: i32 = 2;
pub const STATUS_NO_NETWORK: i32 = -1;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Association {
    pub bssid: Bssid,
    pub channel: u8,
    pub rssi: i8,
    pub at_ms: u64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LinkStats {
    pub scans: u32,
    pub connect_attempts: u32,
    pub connect_failures: u32,
    pub access_point_starts: u32,
    pub last_association: Option<Association>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum AttemptOutcome {
    Connected,
    NoCandidate,
    TimedOut,
}

pub struct LinkManager<R: Radio, C: Clock, D: Delay> {
    settings: LinkSettings,
    radio: R,
    clock: C,
    delay: D,
    restart: &'static RestartSignal,
    engine: LinkStateEngine,
    stats: LinkStats,
    last_check_ms: u64,
    down_since_ms: Option<u64>,
}

impl<R: Radio, C: Clock, D: Delay> LinkManager<R, C, D> {
    pub fn new(
        settings: LinkSettings,
        radio: R,
        clock: C,
        delay: D,
        restart: &'static RestartSignal,
    ) -> Self {
        Self {
            settings: settings.sanitized(),
            radio,
            clock,
            delay,
            restart,
            engine: LinkStateEngine::new(),
            stats: LinkStats::default(),
            last_check_ms: 0,
            down_since_ms: None,
        }
    }

    pub fn state(&self) -> LinkState {
        self.engine.state()
    }

    pub fn is_connected(&self) -> bool {
        self.engine.state() == LinkState::Connected
    }

    pub fn access_point_active(&self) -> bool {
        self.engine.access_point_up()
    }

    pub fn ip_address(&self) -> Option<Ipv4Addr> {
        self.radio.ip_address()
    }

    pub fn stats(&self) -> LinkStats {
        self.stats
    }

    pub fn settings(&self) -> &LinkSettings {
        &self.settings
    }

    pub fn radio(&self) -> &R {
        &self.radio
    }

    pub fn radio_mut(&mut self) -> &mut R {
        &mut self.radio
    }

    fn permanent_access_point(&self) -> bool {
        self.settings
            .fallback
            .as_ref()
            .is_some_and(|fallback| fallback.permanent)
    }

    fn start_access_point(&mut self) -> bool {
        if self.engine.access_point_up() {
            return true;
        }
        let Some(fallback) = self.settings.fallback.as_ref() else {
            return false;
        };
        match self.radio.start_access_point(fallback) {
            Ok(()) => {
                info!("link: access point '{}' started", fallback.ssid);
                self.stats.access_point_starts = self.stats.access_point_starts.saturating_add(1);
                self.engine.handle(LinkEvent::AccessPointStarted);
                true
            }
            Err(err) => {
                error!("link: access point '{}' failed: {}", fallback.ssid, err.as_str());
                false
            }
        }
    }

    fn stop_access_point(&mut self) {
        if !self.engine.access_point_up() {
            return;
        }
        match self.radio.stop_access_point() {
            Ok(()) => {
                info!("link: primary network healthy, access point stopped");
                self.engine.handle(LinkEvent::AccessPointStopped);
            }
            Err(err) => warn!("link: access point stop failed: {}", err.as_str()),
        }
    }

    fn request_restart(&mut self, status: &mut StatusSlot, reason: &str) {
        status.set(STATUS_NO_NETWORK, Severity::Critical, reason);
        // The pending target stands; later checks must not postpone it.
        if let Some(at_ms) = self.restart.requested_at() {
            debug!("link: {}, restart already due at {} ms", reason, at_ms);
            return;
        }
        let now_ms = self.clock.now_ms();
        let at_ms = self
            .restart
            .schedule(now_ms, u64::from(self.settings.restart_grace_ms));
        error!(target: CRITICAL, "link: {}, restarting at {} ms", reason, at_ms);
    }

    /// Directed scan for the primary network. Returns the strongest radio.
    fn scan_for_primary(&mut self) -> Option<ScanRecord> {
        let ssid = self.settings.credentials.ssid.clone();
        self.engine.handle(LinkEvent::ScanStarted);
        self.stats.scans = self.stats.scans.saturating_add(1);

        let records = match self.radio.scan(&ssid) {
            Ok(records) => records,
            Err(err) => {
                warn!("link: scan for '{}' failed: {}", ssid, err.as_str());
                self.engine.handle(LinkEvent::AttemptFailed);
                return None;
            }
        };
        debug!("link: scan for '{}' returned {} records", ssid, records.len());

        match strongest_candidate(&records, &ssid) {
            Some(candidate) => {
                info!(
                    "link: '{}' found at {} ch {} rssi {}",
                    ssid,
                    BssidDisplay(candidate.bssid),
                    candidate.channel,
                    candidate.rssi
                );
                self.engine.handle(LinkEvent::CandidateFound);
                Some(candidate.clone())
            }
            None => {
                warn!("link: '{}' not found", ssid);
                self.engine.handle(LinkEvent::AttemptFailed);
                None
            }
        }
    }

    /// Issues the association request and polls until connected or `bound_ms`
    /// elapses. A zero bound polls forever.
    fn connect_bounded(&mut self, target: &ScanRecord, bound_ms: u32) -> bool {
        self.stats.connect_attempts = self.stats.connect_attempts.saturating_add(1);
        if let Err(err) = self.radio.connect(&self.settings.credentials, target) {
            warn!("link: connect request failed: {}", err.as_str());
        }

        let started_ms = self.clock.now_ms();
        loop {
            if self.radio.is_connected() {
                let now_ms = self.clock.now_ms();
                self.stats.last_association = Some(Association {
                    bssid: target.bssid,
                    channel: target.channel,
                    rssi: target.rssi,
                    at_ms: now_ms,
                });
                self.engine.handle(LinkEvent::Associated);
                info!(
                    "link: connected to {} after {} ms",
                    BssidDisplay(target.bssid),
                    now_ms.saturating_sub(started_ms)
                );
                return true;
            }
            let elapsed_ms = self.clock.now_ms().saturating_sub(started_ms);
            if bound_ms != 0 && elapsed_ms >= u64::from(bound_ms) {
                break;
            }
            self.delay.delay_ms(self.settings.poll_interval_ms);
        }

        self.stats.connect_failures = self.stats.connect_failures.saturating_add(1);
        if let Err(err) = self.radio.disconnect() {
            debug!("link: disconnect after failed attempt: {}", err.as_str());
        }
        self.engine.handle(LinkEvent::AttemptFailed);
        warn!("link: no association within {} ms", bound_ms);
        false
    }

    fn attempt(&mut self, bound_ms: u32) -> AttemptOutcome {
        let Some(target) = self.scan_for_primary() else {
            return AttemptOutcome::NoCandidate;
        };
        if self.connect_bounded(&target, bound_ms) {
            AttemptOutcome::Connected
        } else {
            AttemptOutcome::TimedOut
        }
    }

    fn report(&self, status: &mut StatusSlot) {
        match self.engine.state() {
            LinkState::Connected => {
                status.set(STATUS_CONNECTED, Severity::Information, "connected");
            }
            LinkState::AccessPointActive => {
                status.set(STATUS_ACCESS_POINT, Severity::Warning, "fallback access point");
            }
            _ => status.set(STATUS_DISCONNECTED, Severity::Warning, "disconnected"),
        }
    }

    fn on_connected(&mut self, status: &mut StatusSlot) {
        self.down_since_ms = None;
        if !self.permanent_access_point() {
            self.stop_access_point();
        }
        self.report(status);
    }
}

impl<R: Radio, C: Clock, D: Delay> Component for LinkManager<R, C, D> {
    fn name(&self) -> &'static str {
        "link"
    }

    fn init(&mut self, status: &mut StatusSlot) {
        let mode = if self.permanent_access_point() {
            RadioMode::StationAndAccessPoint
        } else {
            RadioMode::Station
        };
        let hostname = self.settings.credentials.hostname.clone();
        match self.radio.configure(&hostname, mode) {
            Ok(()) => debug!("link: hostname '{}' mode {}", hostname, mode.as_str()),
            Err(err) => error!("link: configure failed: {}", err.as_str()),
        }
        if mode == RadioMode::StationAndAccessPoint {
            self.start_access_point();
        }

        let outcome = if self.settings.credentials.has_primary() {
            self.attempt(self.settings.watchdog_ms)
        } else {
            warn!("link: no primary network configured");
            AttemptOutcome::NoCandidate
        };

        match outcome {
            AttemptOutcome::Connected => self.on_connected(status),
            AttemptOutcome::NoCandidate => {
                if self.start_access_point() {
                    self.report(status);
                } else {
                    self.request_restart(status, "no network and no fallback access point");
                }
            }
            AttemptOutcome::TimedOut => {
                let fallback_idle =
                    self.settings.fallback.is_some() && !self.engine.access_point_up();
                if fallback_idle && self.start_access_point() {
                    self.report(status);
                } else {
                    self.request_restart(status, "watchdog expired");
                }
            }
        }

        let now_ms = self.clock.now_ms();
        self.last_check_ms = now_ms;
        if !self.is_connected() {
            self.down_since_ms = Some(now_ms);
        }
    }

    fn tick(&mut self, status: &mut StatusSlot) {
        let interval_ms = u64::from(self.settings.check_interval_ms);
        if interval_ms == 0 {
            return;
        }
        let now_ms = self.clock.now_ms();
        if now_ms.saturating_sub(self.last_check_ms) < interval_ms {
            return;
        }
        self.last_check_ms = now_ms;

        if self.radio.is_connected() {
            if self.engine.state() != LinkState::Connected {
                self.engine.handle(LinkEvent::Associated);
            }
            self.on_connected(status);
            return;
        }

        if self.engine.state() == LinkState::Connected {
            warn!("link: connection lost");
            self.engine.handle(LinkEvent::LinkLost);
        }
        let down_since_ms = *self.down_since_ms.get_or_insert(now_ms);

        if self.settings.credentials.has_primary() {
            match self.attempt(self.settings.reconnect_wait_ms) {
                AttemptOutcome::Connected => {
                    info!("link: reconnected");
                    self.on_connected(status);
                    return;
                }
                AttemptOutcome::NoCandidate => info!("link: reconnect found no candidate"),
                AttemptOutcome::TimedOut => info!("link: reconnect timed out"),
            }
        }

        let watchdog_ms = u64::from(self.settings.watchdog_ms);
        let down_ms = self.clock.now_ms().saturating_sub(down_since_ms);
        // A running access point means degraded operation, not a restart.
        if watchdog_ms != 0
            && down_ms >= watchdog_ms
            && !self.engine.access_point_up()
            && !self.start_access_point()
        {
            self.request_restart(status, "link down past watchdog");
            return;
        }
        self.report(status);
    }
}
