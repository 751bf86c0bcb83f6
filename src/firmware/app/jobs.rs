use alloc::{format, rc::Rc, string::ToString};
use core::{cell::RefCell, net::Ipv4Addr};

use log::{debug, info};

use super::topics::{DataPublisher, TopicScheme};
use crate::firmware::{
    broker::{BrokerManager, BrokerSession},
    link::{LinkManager, Radio},
    runtime::{Clock, Delay, JobOutcome, LoopCounter, RandomSource, RestartSignal},
};

pub const AUTO_RESTART_DELAY_MS: u64 = 5_000;

/// "Show memory/loop status": free heap and main-loop rate.
pub fn memory_status(
    publisher: DataPublisher,
    clock: impl Clock + 'static,
    loops: LoopCounter,
    free_heap: fn() -> usize,
) -> impl FnMut() + 'static {
    let mut last_run_ms: Option<u64> = None;
    move || {
        let now_ms = clock.now_ms();
        let count = loops.take();
        let rate = last_run_ms.map_or(0, |last_ms| {
            u64::from(count) * 1_000 / now_ms.saturating_sub(last_ms).max(1)
        });
        let first_run = last_run_ms.is_none();
        last_run_ms = Some(now_ms);

        let free = free_heap();
        info!("app: free {} bytes, loop count {} ({}/s)", free, count, rate);
        publisher.publish_property("free", &free.to_string(), false);
        if !first_run && count > 1 {
            publisher.publish_property("loops", &rate.to_string(), false);
        }
    }
}

pub fn publish_ip<R, C, D>(
    publisher: DataPublisher,
    link: Rc<RefCell<LinkManager<R, C, D>>>,
) -> impl FnMut() + 'static
where
    R: Radio + 'static,
    C: Clock + 'static,
    D: Delay + 'static,
{
    move || {
        let address = current_ip(&link);
        info!("app: IP address is now {}", address);
        publisher.publish_property("IP", &address.to_string(), false);
    }
}

pub fn ping<R, C, D>(
    publisher: DataPublisher,
    link: Rc<RefCell<LinkManager<R, C, D>>>,
    clock: impl Clock + 'static,
) -> impl FnMut() + 'static
where
    R: Radio + 'static,
    C: Clock + 'static,
    D: Delay + 'static,
{
    move || {
        let message = format!("IP={};Up={};", current_ip(&link), clock.now_ms() / 1_000);
        info!("app: ping '{}'", message);
        publisher.publish_data(TopicScheme::PING, None, &message, true);
    }
}

/// Restarts the device once uptime reaches `max_uptime_ms`. The job stops
/// itself after requesting the restart.
pub fn auto_restart<S, G, C>(
    publisher: DataPublisher,
    broker: Rc<RefCell<BrokerManager<S, G, C>>>,
    clock: impl Clock + 'static,
    restart: &'static RestartSignal,
    max_uptime_ms: u64,
) -> impl FnMut() -> JobOutcome + 'static
where
    S: BrokerSession + 'static,
    G: RandomSource + 'static,
    C: Clock + 'static,
{
    move || {
        let uptime_ms = clock.now_ms();
        debug!(
            "app: uptime {} s (max {} s)",
            uptime_ms / 1_000,
            max_uptime_ms / 1_000
        );
        if uptime_ms < max_uptime_ms {
            return JobOutcome::Continue;
        }

        info!("app: uptime past {} minutes, restarting", max_uptime_ms / 60_000);
        publisher.publish_property("autorestart", &format!("Up={}", uptime_ms / 1_000), true);
        match broker.try_borrow_mut() {
            Ok(mut broker) => broker.disconnect(),
            Err(_) => debug!("app: broker busy, restarting without disconnect"),
        }
        restart.schedule(uptime_ms, AUTO_RESTART_DELAY_MS);
        JobOutcome::Stop
    }
}

fn current_ip<R: Radio, C: Clock, D: Delay>(link: &Rc<RefCell<LinkManager<R, C, D>>>) -> Ipv4Addr {
    link.try_borrow()
        .ok()
        .and_then(|link| link.ip_address())
        .unwrap_or(Ipv4Addr::UNSPECIFIED)
}
