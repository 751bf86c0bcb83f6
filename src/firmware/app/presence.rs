use alloc::string::String;

use log::info;

use super::topics::TopicScheme;
use crate::firmware::{
    broker::{BrokerManager, BrokerSession, Publish},
    runtime::{Clock, RandomSource},
    types::{LastWill, QoS},
};

pub const ONLINE: &str = "true";
pub const OFFLINE: &str = "false";

/// Broker-held "offline" marker for this device.
pub fn presence_will(topics: &TopicScheme) -> LastWill {
    LastWill {
        topic: topics.online_topic(),
        payload: String::from(OFFLINE),
        retain: true,
        qos: QoS::AtMostOnce,
    }
}

/// Marks the device online on every connect and reasserts it when the
/// previous session's will overwrites the marker.
pub fn install_presence<S, G, C>(broker: &mut BrokerManager<S, G, C>, topics: &TopicScheme)
where
    S: BrokerSession,
    G: RandomSource,
    C: Clock,
{
    let online_topic = topics.online_topic();
    let topic = online_topic.clone();
    broker.on_connected(move |session: &mut dyn Publish| {
        session.subscribe(&topic);
        session.publish(&topic, ONLINE.as_bytes(), true);
    });

    broker.on_message(move |session, message| {
        if message.topic == online_topic && message.payload_str() == Some(OFFLINE) {
            info!("app: presence overwritten by will, marking online again");
            session.publish(&online_topic, ONLINE.as_bytes(), true);
        }
    });
}
