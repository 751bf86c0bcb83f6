//! Device application: wires link, broker, log backlog and scheduler from
//! configuration and installs the standard status jobs.

mod jobs;
mod presence;
mod topics;

use alloc::{boxed::Box, rc::Rc, string::String, vec::Vec};
use core::{cell::RefCell, net::Ipv4Addr};

use log::{info, warn};

pub use jobs::AUTO_RESTART_DELAY_MS;
pub use presence::{presence_will, OFFLINE, ONLINE};
pub use topics::{DataPublisher, TopicScheme};

use crate::firmware::{
    broker::{BrokerManager, BrokerSession, Publish},
    config::{
        AppSettings, BrokerSettings, ConfigSource, DeviceConfig, LinkSettings, HOSTNAME_DEFAULT,
    },
    link::{LinkManager, Radio},
    logging::{self, BacklogLogComponent, BacklogQueue, BacklogSink},
    runtime::{
        Clock, ComponentRegistry, ComponentStatus, Delay, LoopCounter, RandomSource,
        RestartSignal, Scheduler, Step, Supervisor, SystemControl,
    },
    types::{BrokerState, LinkState},
};

/// The concrete seams one board provides.
pub trait DevicePlatform {
    type Radio: Radio + 'static;
    type Session: BrokerSession + 'static;
    type Random: RandomSource + 'static;
    type Clock: Clock + Clone + 'static;
    type Delay: Delay + 'static;

    fn free_heap_bytes() -> usize;
}

pub struct PlatformParts<P: DevicePlatform> {
    pub radio: P::Radio,
    pub session: P::Session,
    pub random: P::Random,
    pub clock: P::Clock,
    pub delay: P::Delay,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AppIdentity {
    pub name: &'static str,
    pub version: &'static str,
}

pub type AppLink<P> = LinkManager<
    <P as DevicePlatform>::Radio,
    <P as DevicePlatform>::Clock,
    <P as DevicePlatform>::Delay,
>;
pub type AppBroker<P> = BrokerManager<
    <P as DevicePlatform>::Session,
    <P as DevicePlatform>::Random,
    <P as DevicePlatform>::Clock,
>;

/// Health snapshot for a status page or display.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeviceInfo {
    pub hostname: String,
    pub application: &'static str,
    pub version: &'static str,
    pub link_state: LinkState,
    pub access_point_active: bool,
    pub broker_state: BrokerState,
    pub broker_connected: bool,
    pub ip_address: Option<Ipv4Addr>,
    pub uptime_ms: u64,
    pub restart_at_ms: Option<u64>,
    pub statuses: Vec<(&'static str, Option<ComponentStatus>)>,
}

pub struct DeviceApp<P: DevicePlatform, const N: usize> {
    identity: AppIdentity,
    hostname: String,
    settings: AppSettings,
    clock: P::Clock,
    restart: &'static RestartSignal,
    publisher: DataPublisher,
    link: Rc<RefCell<AppLink<P>>>,
    broker: Rc<RefCell<AppBroker<P>>>,
    backlog: Rc<RefCell<BacklogLogComponent<N>>>,
    scheduler: Rc<RefCell<Scheduler<P::Clock>>>,
    supervisor: Supervisor<P::Clock>,
}

impl<P: DevicePlatform, const N: usize> DeviceApp<P, N> {
    /// Builds and registers every component, in this order: link, broker,
    /// log backlog, scheduler. Each is initialized as it is registered.
    pub fn start<S: ConfigSource>(
        identity: AppIdentity,
        config: &DeviceConfig<S>,
        parts: PlatformParts<P>,
        backlog_queue: &'static BacklogQueue<N>,
        restart: &'static RestartSignal,
    ) -> Self {
        let PlatformParts {
            radio,
            session,
            random,
            clock,
            delay,
        } = parts;

        let hostname = String::from(config.get("hostname", HOSTNAME_DEFAULT));
        let settings = AppSettings::from_config(config);
        info!(
            "app: starting '{}' v{} on '{}'",
            identity.name, identity.version, hostname
        );

        let backlog_limit = backlog_queue.set_limit(settings.log_backlog_size);
        if backlog_limit < settings.log_backlog_size {
            warn!("app: log backlog capped at {} lines", backlog_limit);
        }
        logging::add_sink(Box::new(BacklogSink::new(backlog_queue, settings.log_level)));
        logging::set_console_level(settings.serial_log_level);

        let mut broker_settings = BrokerSettings::from_config(config, &hostname);
        let topics = Rc::new(TopicScheme::new(&broker_settings.prefix, &hostname));
        broker_settings.identity.will = Some(presence_will(&topics));

        let loops = LoopCounter::new();
        let mut registry = ComponentRegistry::new();

        let link = registry.register(Rc::new(RefCell::new(LinkManager::new(
            LinkSettings::from_config(config, &hostname),
            radio,
            clock.clone(),
            delay,
            restart,
        ))));

        let mut broker = BrokerManager::new(broker_settings, session, random, clock.clone());
        presence::install_presence(&mut broker, &topics);
        let broker = registry.register(Rc::new(RefCell::new(broker)));
        let shared: Rc<RefCell<dyn Publish>> = broker.clone();
        let publisher = DataPublisher::new(shared.clone(), topics.clone());

        let backlog = registry.register(Rc::new(RefCell::new(BacklogLogComponent::new(
            backlog_queue,
            &topics.topic(TopicScheme::LOG, None),
            shared,
        ))));

        let scheduler = registry.register(Rc::new(RefCell::new(Scheduler::new(clock.clone()))));

        let supervisor =
            Supervisor::new(registry, clock.clone(), restart).with_loop_counter(loops.clone());

        let app = Self {
            identity,
            hostname,
            settings,
            clock,
            restart,
            publisher,
            link,
            broker,
            backlog,
            scheduler,
            supervisor,
        };
        app.publisher
            .publish_property("application", identity.name, true);
        app.publisher
            .publish_property("version", identity.version, true);
        app.install_jobs(loops);
        app
    }

    fn install_jobs(&self, loops: LoopCounter) {
        let mut scheduler = self.scheduler.borrow_mut();
        scheduler.add_job(
            "Show memory/loop status",
            u64::from(self.settings.memory_interval_ms),
            jobs::memory_status(
                self.publisher.clone(),
                self.clock.clone(),
                loops,
                P::free_heap_bytes,
            ),
        );

        if self.settings.ip_interval_ms != 0 {
            scheduler.add_job(
                "Publish IP",
                u64::from(self.settings.ip_interval_ms),
                jobs::publish_ip(self.publisher.clone(), self.link.clone()),
            );
        }

        if self.settings.ping_interval_ms != 0 {
            scheduler.add_job(
                "Ping",
                u64::from(self.settings.ping_interval_ms),
                jobs::ping(self.publisher.clone(), self.link.clone(), self.clock.clone()),
            );
        }

        if self.settings.auto_restart_after_min > 0 {
            scheduler.add_job_with_outcome(
                "Check auto-restart",
                u64::from(self.settings.auto_restart_interval_ms),
                jobs::auto_restart(
                    self.publisher.clone(),
                    self.broker.clone(),
                    self.clock.clone(),
                    self.restart,
                    self.settings.auto_restart_after_ms(),
                ),
            );
        }
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    pub fn identity(&self) -> AppIdentity {
        self.identity
    }

    pub fn settings(&self) -> &AppSettings {
        &self.settings
    }

    pub fn topics(&self) -> &TopicScheme {
        self.publisher.topics()
    }

    pub fn publisher(&self) -> &DataPublisher {
        &self.publisher
    }

    pub fn link(&self) -> &Rc<RefCell<AppLink<P>>> {
        &self.link
    }

    pub fn broker(&self) -> &Rc<RefCell<AppBroker<P>>> {
        &self.broker
    }

    pub fn backlog(&self) -> &Rc<RefCell<BacklogLogComponent<N>>> {
        &self.backlog
    }

    pub fn scheduler(&self) -> &Rc<RefCell<Scheduler<P::Clock>>> {
        &self.scheduler
    }

    pub fn registry_mut(&mut self) -> &mut ComponentRegistry {
        self.supervisor.registry_mut()
    }

    /// Adds an application job next to the standard ones.
    pub fn add_job(&self, name: &str, interval_ms: u64, action: impl FnMut() + 'static) -> usize {
        self.scheduler
            .borrow_mut()
            .add_job(name, interval_ms, action)
    }

    pub fn publish_data(
        &self,
        channel: &str,
        property: Option<&str>,
        value: &str,
        retain: bool,
    ) -> bool {
        self.publisher.publish_data(channel, property, value, retain)
    }

    pub fn publish_property(&self, property: &str, value: &str, retain: bool) -> bool {
        self.publisher.publish_property(property, value, retain)
    }

    /// Restart primitive for update and reset handlers.
    pub fn schedule_restart(&self, delay_ms: u64) -> u64 {
        let at_ms = self.restart.schedule(self.clock.now_ms(), delay_ms);
        info!("app: restart scheduled at {} ms", at_ms);
        at_ms
    }

    pub fn step(&mut self) -> Step {
        self.supervisor.step()
    }

    pub fn run<Y: SystemControl>(self, system: &mut Y) -> ! {
        self.supervisor.run(system)
    }

    pub fn info(&self) -> DeviceInfo {
        let (link_state, access_point_active, ip_address) = match self.link.try_borrow() {
            Ok(link) => (link.state(), link.access_point_active(), link.ip_address()),
            Err(_) => (LinkState::Disconnected, false, None),
        };
        let (broker_state, broker_connected) = match self.broker.try_borrow_mut() {
            Ok(mut broker) => (broker.state(), broker.is_connected()),
            Err(_) => (BrokerState::Disconnected, false),
        };

        DeviceInfo {
            hostname: self.hostname.clone(),
            application: self.identity.name,
            version: self.identity.version,
            link_state,
            access_point_active,
            broker_state,
            broker_connected,
            ip_address,
            uptime_ms: self.clock.now_ms(),
            restart_at_ms: self.restart.requested_at(),
            statuses: self
                .supervisor
                .registry()
                .statuses()
                .map(|(name, status)| (name, status.cloned()))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests;
