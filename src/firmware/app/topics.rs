use alloc::{format, rc::Rc, string::String};
use core::cell::RefCell;

use log::{trace, warn};

use crate::firmware::broker::Publish;

/// `<prefix>/<channel>/<hostname>[/<property>]`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TopicScheme {
    prefix: String,
    hostname: String,
}

impl TopicScheme {
    pub const STATUS: &'static str = "status";
    pub const LOG: &'static str = "log";
    pub const PING: &'static str = "ping";

    pub fn new(prefix: &str, hostname: &str) -> Self {
        Self {
            prefix: String::from(prefix),
            hostname: String::from(hostname),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    pub fn topic(&self, channel: &str, property: Option<&str>) -> String {
        match property {
            Some(property) => format!("{}/{}/{}/{}", self.prefix, channel, self.hostname, property),
            None => format!("{}/{}/{}", self.prefix, channel, self.hostname),
        }
    }

    pub fn status_topic(&self, property: &str) -> String {
        self.topic(Self::STATUS, Some(property))
    }

    pub fn online_topic(&self) -> String {
        self.status_topic("online")
    }
}

/// Publishes device data under the [`TopicScheme`] through a shared
/// broker handle.
#[derive(Clone)]
pub struct DataPublisher {
    broker: Rc<RefCell<dyn Publish>>,
    topics: Rc<TopicScheme>,
}

impl DataPublisher {
    pub fn new(broker: Rc<RefCell<dyn Publish>>, topics: Rc<TopicScheme>) -> Self {
        Self { broker, topics }
    }

    pub fn topics(&self) -> &TopicScheme {
        &self.topics
    }

    pub fn publish_data(
        &self,
        channel: &str,
        property: Option<&str>,
        value: &str,
        retain: bool,
    ) -> bool {
        let topic = self.topics.topic(channel, property);
        trace!(
            "app: publishing '{}' = '{}'{}",
            topic,
            value,
            if retain { " (retained)" } else { "" }
        );
        let Ok(mut broker) = self.broker.try_borrow_mut() else {
            warn!("app: broker busy, dropped publish to {}", topic);
            return false;
        };
        broker.publish(&topic, value.as_bytes(), retain)
    }

    pub fn publish_property(&self, property: &str, value: &str, retain: bool) -> bool {
        self.publish_data(TopicScheme::STATUS, Some(property), value, retain)
    }
}
