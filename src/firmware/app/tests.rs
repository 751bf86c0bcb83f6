use alloc::{boxed::Box, string::String, vec, vec::Vec};
use core::net::Ipv4Addr;

use super::{
    AppIdentity, DeviceApp, DevicePlatform, PlatformParts, TopicScheme, OFFLINE, ONLINE,
};
use crate::firmware::{
    config::{DeviceConfig, KeyValueConfig},
    logging::BacklogQueue,
    runtime::{RestartSignal, Step},
    testing::{record, FakeRadio, FakeSession, ManualClock, SeqRandom},
    types::{BrokerState, LastWill, LinkState, QoS},
};

const FREE_HEAP: usize = 123_456;
const IDENTITY: AppIdentity = AppIdentity {
    name: "Thermostat",
    version: "1.4.0",
};
const BASE_CONFIG: &str = "\
hostname=kitchen
wifi-ssid=Home
wifi-password=secret
mqtt-server=broker.lan
mqtt-prefix=home
";

struct TestPlatform;

impl DevicePlatform for TestPlatform {
    type Radio = FakeRadio;
    type Session = FakeSession;
    type Random = SeqRandom;
    type Clock = ManualClock;
    type Delay = ManualClock;

    fn free_heap_bytes() -> usize {
        FREE_HEAP
    }
}

type App = DeviceApp<TestPlatform, 8>;

fn start(extra: &str) -> (App, ManualClock, &'static RestartSignal) {
    let mut text = String::from(BASE_CONFIG);
    text.push_str(extra);
    let config = DeviceConfig::new(KeyValueConfig::parse(&text), "24:0A:C4:00:11:22");

    let clock = ManualClock::new();
    let parts = PlatformParts {
        radio: FakeRadio::with_networks(vec![record("Home", 1, 6, -50)], Some(0)),
        session: FakeSession::default(),
        random: SeqRandom::new(&[0xBEEF]),
        clock: clock.clone(),
        delay: clock.clone(),
    };
    let backlog: &'static BacklogQueue<8> = Box::leak(Box::new(BacklogQueue::new()));
    let restart: &'static RestartSignal = Box::leak(Box::new(RestartSignal::new()));

    let app = DeviceApp::start(IDENTITY, &config, parts, backlog, restart);
    (app, clock, restart)
}

fn published(app: &App, topic: &str) -> Vec<(String, bool)> {
    app.broker().borrow().session().published_on(topic)
}

fn strings(items: &[(&str, bool)]) -> Vec<(String, bool)> {
    items
        .iter()
        .map(|(payload, retain)| (String::from(*payload), *retain))
        .collect()
}

#[test]
fn topics_always_carry_prefix_and_hostname() {
    let topics = TopicScheme::new("home", "kitchen");
    assert_eq!(topics.topic("log", None), "home/log/kitchen");
    assert_eq!(
        topics.topic("sensor", Some("temperature")),
        "home/sensor/kitchen/temperature"
    );
    assert_eq!(topics.online_topic(), "home/status/kitchen/online");
}

#[test]
fn components_register_in_fixed_order() {
    let (app, _clock, _restart) = start("");
    let names: Vec<&str> = app.info().statuses.iter().map(|(name, _)| *name).collect();
    assert_eq!(names, ["link", "broker", "log-backlog", "scheduler"]);
}

#[test]
fn start_connects_with_presence_will_and_announces_identity() {
    let (app, _clock, _restart) = start("");

    {
        let broker = app.broker().borrow();
        let seen = &broker.session().connects;
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].client_id, "kitchen-BEEF");
        assert_eq!(
            seen[0].will,
            Some(LastWill {
                topic: String::from("home/status/kitchen/online"),
                payload: String::from(OFFLINE),
                retain: true,
                qos: QoS::AtMostOnce,
            })
        );
        assert_eq!(
            broker.session().subscriptions,
            ["home/status/kitchen/online"]
        );
    }

    assert_eq!(
        published(&app, "home/status/kitchen/online"),
        strings(&[(ONLINE, true)])
    );
    assert_eq!(
        published(&app, "home/status/kitchen/application"),
        strings(&[("Thermostat", true)])
    );
    assert_eq!(
        published(&app, "home/status/kitchen/version"),
        strings(&[("1.4.0", true)])
    );
}

#[test]
fn overwritten_presence_is_reasserted() {
    let (mut app, _clock, _restart) = start("");
    app.broker()
        .borrow_mut()
        .session_mut()
        .deliver("home/status/kitchen/online", OFFLINE);

    assert_eq!(app.step(), Step::Continue);

    assert_eq!(
        published(&app, "home/status/kitchen/online"),
        strings(&[(ONLINE, true), (ONLINE, true)])
    );
}

#[test]
fn unrelated_messages_leave_presence_alone() {
    let (mut app, _clock, _restart) = start("");
    app.broker()
        .borrow_mut()
        .session_mut()
        .deliver("home/status/kitchen/online", ONLINE);
    app.broker()
        .borrow_mut()
        .session_mut()
        .deliver("home/status/other/online", OFFLINE);

    app.step();

    assert_eq!(
        published(&app, "home/status/kitchen/online"),
        strings(&[(ONLINE, true)])
    );
}

#[test]
fn first_tick_runs_every_standard_job() {
    let (mut app, _clock, _restart) = start("");

    app.step();

    assert_eq!(
        published(&app, "home/status/kitchen/free"),
        strings(&[("123456", false)])
    );
    assert!(published(&app, "home/status/kitchen/loops").is_empty());
    assert_eq!(
        published(&app, "home/status/kitchen/IP"),
        strings(&[("192.168.1.50", false)])
    );
    assert_eq!(
        published(&app, "home/ping/kitchen"),
        strings(&[("IP=192.168.1.50;Up=0;", true)])
    );
    assert_eq!(app.scheduler().borrow().len(), 3);
}

#[test]
fn memory_job_reports_loop_rate_after_first_run() {
    let (mut app, clock, _restart) = start("memory-interval=10\n");

    for _ in 0..50 {
        app.step();
    }
    clock.set(10_000);
    app.step();

    assert_eq!(
        published(&app, "home/status/kitchen/loops"),
        strings(&[("5", false)])
    );
    assert_eq!(published(&app, "home/status/kitchen/free").len(), 2);
}

#[test]
fn zero_intervals_disable_ip_and_ping() {
    let (mut app, _clock, _restart) = start("ip-interval=0\nping-interval=0\n");

    app.step();

    assert_eq!(app.scheduler().borrow().len(), 1);
    assert!(published(&app, "home/status/kitchen/IP").is_empty());
    assert!(published(&app, "home/ping/kitchen").is_empty());
}

#[test]
fn auto_restart_announces_disconnects_and_restarts_later() {
    let (mut app, clock, restart) = start("auto-restart-timeout=1\nauto-restart-interval=60\n");

    assert_eq!(app.step(), Step::Continue);
    assert!(!restart.is_requested());

    clock.set(60_000);
    assert_eq!(app.step(), Step::Continue);
    assert_eq!(restart.requested_at(), Some(65_000));
    assert_eq!(
        published(&app, "home/status/kitchen/autorestart"),
        strings(&[("Up=60", true)])
    );
    assert_eq!(app.broker().borrow().session().disconnects, 1);

    clock.set(65_000);
    assert_eq!(app.step(), Step::Restart);
}

#[test]
fn schedule_restart_sets_a_deadline() {
    let (mut app, clock, restart) = start("");
    clock.set(1_000);

    assert_eq!(app.schedule_restart(2_000), 3_000);
    assert_eq!(app.step(), Step::Continue);

    clock.set(3_000);
    assert_eq!(restart.requested_at(), Some(3_000));
    assert_eq!(app.step(), Step::Restart);
}

#[test]
fn info_reports_current_health() {
    let (app, clock, _restart) = start("");
    clock.set(4_200);

    let info = app.info();

    assert_eq!(info.hostname, "kitchen");
    assert_eq!(info.application, "Thermostat");
    assert_eq!(info.version, "1.4.0");
    assert_eq!(info.link_state, LinkState::Connected);
    assert!(!info.access_point_active);
    assert_eq!(info.broker_state, BrokerState::Connected);
    assert!(info.broker_connected);
    assert_eq!(info.ip_address, Some(Ipv4Addr::new(192, 168, 1, 50)));
    assert_eq!(info.uptime_ms, 4_200);
    assert_eq!(info.restart_at_ms, None);
}

#[test]
fn missing_hostname_gets_placeholder() {
    let config = DeviceConfig::new(KeyValueConfig::parse("mqtt-prefix=home\n"), "hw");
    let clock = ManualClock::new();
    let parts = PlatformParts::<TestPlatform> {
        radio: FakeRadio::default(),
        session: FakeSession::default(),
        random: SeqRandom::new(&[1]),
        clock: clock.clone(),
        delay: clock.clone(),
    };
    let backlog: &'static BacklogQueue<8> = Box::leak(Box::new(BacklogQueue::new()));
    let restart: &'static RestartSignal = Box::leak(Box::new(RestartSignal::new()));

    let app: App = DeviceApp::start(IDENTITY, &config, parts, backlog, restart);

    assert_eq!(app.hostname(), "missing-hostname");
    assert_eq!(
        app.topics().online_topic(),
        "home/status/missing-hostname/online"
    );
    assert_eq!(app.broker().borrow().state(), BrokerState::Disconnected);
}
