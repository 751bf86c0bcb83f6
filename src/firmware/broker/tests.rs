use alloc::{rc::Rc, string::String, vec::Vec};
use core::cell::RefCell;

use super::{
    expand_client_id, BrokerManager, Publish, SessionError, STATUS_CONNECTED,
    STATUS_NOT_CONFIGURED,
};
use crate::firmware::{
    config::BrokerSettings,
    runtime::{Component, StatusSlot},
    testing::{FakeSession, ManualClock, SeqRandom},
    types::{BrokerIdentity, BrokerState, LastWill, QoS, CLIENT_ID_MAX},
};

const MINUTE: u64 = 60_000;

type Manager = BrokerManager<FakeSession, SeqRandom, ManualClock>;

fn identity(template: &str) -> BrokerIdentity {
    BrokerIdentity {
        client_id_template: String::from(template),
        username: String::from("device"),
        password: String::from("pw"),
        will: Some(LastWill {
            topic: String::from("home/status/kitchen/online"),
            payload: String::from("false"),
            retain: true,
            qos: QoS::AtMostOnce,
        }),
    }
}

fn manager(template: &str, random: &[u32]) -> (Manager, ManualClock) {
    let clock = ManualClock::new();
    let settings = BrokerSettings::new("broker.lan", 1883, identity(template));
    let manager = BrokerManager::new(
        settings,
        FakeSession::default(),
        SeqRandom::new(random),
        clock.clone(),
    );
    (manager, clock)
}

#[test]
fn placeholder_expands_to_upper_hex() {
    let mut random = SeqRandom::new(&[0xABCD_12EF, 0x0001]);
    let id = expand_client_id("dev-#RANDOM#-#RANDOM#", &mut random);
    assert_eq!(id.as_str(), "dev-12EF-0001");
}

#[test]
fn template_without_placeholder_is_stable() {
    let mut random = SeqRandom::new(&[1, 2, 3]);
    let first = expand_client_id("kitchen", &mut random);
    let second = expand_client_id("kitchen", &mut random);
    assert_eq!(first, second);
    assert_eq!(first.as_str(), "kitchen");
}

#[test]
fn overlong_client_id_is_cut() {
    let template = "x".repeat(CLIENT_ID_MAX + 10);
    let mut random = SeqRandom::new(&[0]);
    assert_eq!(expand_client_id(&template, &mut random).len(), CLIENT_ID_MAX);
}

#[test]
fn init_connects_with_identity_and_will() {
    let (mut broker, _clock) = manager("kitchen-#RANDOM#", &[0xBEEF]);
    let mut status = StatusSlot::default();

    broker.init(&mut status);

    assert_eq!(broker.state(), BrokerState::Connected);
    assert_eq!(broker.client_id(), "kitchen-BEEF");
    assert_eq!(status.code(), Some(STATUS_CONNECTED));
    let seen = &broker.session().connects;
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].client_id, "kitchen-BEEF");
    assert_eq!(seen[0].username.as_deref(), Some("device"));
    assert_eq!(
        seen[0].will.as_ref().map(|will| (will.payload.as_str(), will.retain)),
        Some(("false", true))
    );
}

#[test]
fn each_attempt_draws_a_fresh_client_id() {
    let (mut broker, clock) = manager("kitchen-#RANDOM#", &[0x1111, 0x2222, 0x3333]);
    broker.session_mut().broker_up = false;
    let mut status = StatusSlot::default();

    broker.init(&mut status);
    clock.advance(5 * MINUTE);
    broker.tick(&mut status);

    let ids: Vec<_> = broker
        .session()
        .connects
        .iter()
        .map(|seen| seen.client_id.clone())
        .collect();
    assert_eq!(ids, ["kitchen-1111", "kitchen-2222"]);
}

#[test]
fn connected_callback_runs_on_every_connect() {
    let (mut broker, clock) = manager("kitchen", &[0]);
    let calls = Rc::new(RefCell::new(0));
    let counter = calls.clone();
    broker.on_connected(move |session| {
        *counter.borrow_mut() += 1;
        session.subscribe("home/status/kitchen/online");
        session.publish("home/status/kitchen/online", b"true", true);
    });
    let mut status = StatusSlot::default();

    broker.init(&mut status);
    broker.session_mut().connected = false;
    clock.advance(5 * MINUTE);
    broker.tick(&mut status);

    assert_eq!(*calls.borrow(), 2);
    let session = broker.session();
    assert_eq!(session.subscriptions.len(), 2);
    assert_eq!(
        session.published_on("home/status/kitchen/online"),
        [(String::from("true"), true), (String::from("true"), true)]
    );
}

#[test]
fn outage_is_retried_only_on_interval_boundaries() {
    let (mut broker, clock) = manager("kitchen", &[0]);
    let mut status = StatusSlot::default();
    broker.init(&mut status);

    let mut attempts_at = Vec::new();
    for minute in 1..=11 {
        clock.set(minute * MINUTE);
        if minute == 2 {
            broker.session_mut().broker_down();
        }
        if minute == 6 {
            broker.session_mut().broker_up = true;
        }
        let before = broker.session().connects.len();
        broker.tick(&mut status);
        if broker.session().connects.len() > before {
            attempts_at.push((minute, broker.state()));
        }
    }

    assert_eq!(
        attempts_at,
        [(5, BrokerState::Disconnected), (10, BrokerState::Connected)]
    );
    assert_eq!(broker.stats().connect_failures, 1);
}

#[test]
fn refused_connect_reports_broker_status_code() {
    let (mut broker, _clock) = manager("kitchen", &[0]);
    broker.session_mut().refuse = Some(4);
    let mut status = StatusSlot::default();

    broker.init(&mut status);

    assert_eq!(broker.state(), BrokerState::Disconnected);
    assert_eq!(broker.stats().last_status, 4);
    assert_eq!(status.code(), Some(4));
}

#[test]
fn status_codes_match_broker_conventions() {
    assert_eq!(SessionError::ConnectionTimeout.status_code(), -4);
    assert_eq!(SessionError::ConnectionLost.status_code(), -3);
    assert_eq!(SessionError::ConnectFailed.status_code(), -2);
    assert_eq!(SessionError::NotConnected.status_code(), -1);
    assert_eq!(SessionError::Refused(5).status_code(), 5);
}

#[test]
fn missing_connack_reports_connection_timeout() {
    let err = SessionError::from(mqttwire::SessionError::<()>::ConnackTimeout);
    assert_eq!(err, SessionError::ConnectionTimeout);
    assert_eq!(err.status_code(), -4);

    let lost = SessionError::from(mqttwire::SessionError::<()>::Closed);
    assert_eq!(lost.status_code(), -3);
}

#[test]
fn inbound_messages_are_delivered_on_every_tick() {
    let (mut broker, clock) = manager("kitchen", &[0]);
    let received: Rc<RefCell<Vec<(String, String)>>> = Rc::default();
    let sink = received.clone();
    broker.on_message(move |session, message| {
        let payload = String::from(message.payload_str().unwrap_or(""));
        sink.borrow_mut().push((message.topic.clone(), payload));
        session.publish("echo", message.payload.as_slice(), false);
    });
    let mut status = StatusSlot::default();
    broker.init(&mut status);

    broker.session_mut().deliver("cmd/a", "1");
    clock.advance(1);
    broker.tick(&mut status);
    broker.session_mut().deliver("cmd/b", "2");
    clock.advance(1);
    broker.tick(&mut status);

    assert_eq!(
        *received.borrow(),
        [
            (String::from("cmd/a"), String::from("1")),
            (String::from("cmd/b"), String::from("2"))
        ]
    );
    assert_eq!(broker.session().published_on("echo").len(), 2);
    assert_eq!(broker.stats().received, 2);
}

#[test]
fn inbound_delivery_is_bounded_per_tick() {
    let (mut broker, _clock) = manager("kitchen", &[0]);
    let mut status = StatusSlot::default();
    broker.init(&mut status);
    for _ in 0..20 {
        broker.session_mut().deliver("flood", "x");
    }

    broker.tick(&mut status);
    assert_eq!(broker.stats().received, 16);
    broker.tick(&mut status);
    assert_eq!(broker.stats().received, 20);
}

#[test]
fn publish_while_disconnected_is_dropped() {
    let (mut broker, _clock) = manager("kitchen", &[0]);
    broker.session_mut().broker_up = false;
    let mut status = StatusSlot::default();
    broker.init(&mut status);

    assert!(!broker.publish("home/free/kitchen", b"1000", false));
    assert!(broker.session().published.is_empty());
    assert_eq!(broker.stats().publish_failures, 1);

    broker.session_mut().broker_up = true;
    broker.session_mut().connected = true;
    assert!(broker.publish("home/free/kitchen", b"1000", false));
    assert_eq!(broker.stats().published, 1);
}

#[test]
fn missing_server_never_connects() {
    let clock = ManualClock::new();
    let settings = BrokerSettings::new("", 1883, BrokerIdentity::default());
    let mut broker = BrokerManager::new(
        settings,
        FakeSession::default(),
        SeqRandom::new(&[0]),
        clock.clone(),
    );
    let mut status = StatusSlot::default();

    broker.init(&mut status);
    clock.advance(10 * MINUTE);
    broker.tick(&mut status);

    assert!(broker.session().connects.is_empty());
    assert_eq!(status.code(), Some(STATUS_NOT_CONFIGURED));
}

#[test]
fn disconnect_closes_the_session() {
    let (mut broker, _clock) = manager("kitchen", &[0]);
    let mut status = StatusSlot::default();
    broker.init(&mut status);

    broker.disconnect();
    assert_eq!(broker.state(), BrokerState::Disconnected);
    assert!(!broker.is_connected());
    assert_eq!(broker.session().disconnects, 1);
}
