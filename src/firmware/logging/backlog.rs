use alloc::{rc::Rc, string::String};
use core::{
    cell::RefCell,
    sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering},
};

use embassy_sync::blocking_mutex::{raw::CriticalSectionRawMutex, Mutex};
use heapless::Deque;
use log::{debug, info};

use super::{truncated_line, LogLine, LogSink, Severity};
use crate::firmware::{
    broker::Publish,
    runtime::{Component, StatusSlot},
};

/// Bounded FIFO of log lines waiting for the broker.
///
/// `N` is the compile-time capacity; [`BacklogQueue::set_limit`] lowers the
/// effective maximum at runtime. Once full, the oldest line is evicted.
pub struct BacklogQueue<const N: usize> {
    entries: Mutex<CriticalSectionRawMutex, RefCell<Deque<LogLine, N>>>,
    limit: AtomicUsize,
    draining: AtomicBool,
    evicted: AtomicU32,
    suppressed: AtomicU32,
}

impl<const N: usize> Default for BacklogQueue<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> BacklogQueue<N> {
    pub const fn new() -> Self {
        Self {
            entries: Mutex::new(RefCell::new(Deque::new())),
            limit: AtomicUsize::new(N),
            draining: AtomicBool::new(false),
            evicted: AtomicU32::new(0),
            suppressed: AtomicU32::new(0),
        }
    }

    /// Sets the effective maximum, clamped to `1..=N`, and evicts the oldest
    /// lines beyond it. Returns the effective maximum.
    pub fn set_limit(&self, max: usize) -> usize {
        let limit = max.clamp(1, N.max(1));
        self.limit.store(limit, Ordering::Relaxed);
        self.entries.lock(|entries| {
            let mut entries = entries.borrow_mut();
            while entries.len() > limit {
                entries.pop_front();
                self.evicted.fetch_add(1, Ordering::Relaxed);
            }
        });
        limit
    }

    pub fn limit(&self) -> usize {
        self.limit.load(Ordering::Relaxed)
    }

    /// Appends a line unless a drain is in progress. Returns whether the line
    /// was queued.
    pub fn push(&self, line: &str) -> bool {
        if self.draining.load(Ordering::Acquire) {
            self.suppressed.fetch_add(1, Ordering::Relaxed);
            return false;
        }
        let limit = self.limit();
        let line = truncated_line(line);
        self.entries.lock(|entries| {
            let mut entries = entries.borrow_mut();
            while entries.len() >= limit {
                entries.pop_front();
                self.evicted.fetch_add(1, Ordering::Relaxed);
            }
            entries.push_back(line).is_ok()
        })
    }

    pub fn front(&self) -> Option<LogLine> {
        self.entries.lock(|entries| entries.borrow().front().cloned())
    }

    pub fn pop_front(&self) -> Option<LogLine> {
        self.entries.lock(|entries| entries.borrow_mut().pop_front())
    }

    pub fn len(&self) -> usize {
        self.entries.lock(|entries| entries.borrow().len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_draining(&self) -> bool {
        self.draining.load(Ordering::Acquire)
    }

    /// Raises the draining flag for the lifetime of the returned guard.
    /// `None` if a drain is already running.
    pub fn begin_drain(&self) -> Option<DrainGuard<'_, N>> {
        if self.draining.swap(true, Ordering::AcqRel) {
            return None;
        }
        Some(DrainGuard { queue: self })
    }

    /// Lines evicted to make room for newer ones.
    pub fn evicted(&self) -> u32 {
        self.evicted.load(Ordering::Relaxed)
    }

    /// Lines dropped because they were logged during a drain.
    pub fn suppressed(&self) -> u32 {
        self.suppressed.load(Ordering::Relaxed)
    }
}

pub struct DrainGuard<'a, const N: usize> {
    queue: &'a BacklogQueue<N>,
}

impl<const N: usize> Drop for DrainGuard<'_, N> {
    fn drop(&mut self) {
        self.queue.draining.store(false, Ordering::Release);
    }
}

pub struct BacklogSink<const N: usize> {
    queue: &'static BacklogQueue<N>,
    min: Severity,
}

impl<const N: usize> BacklogSink<N> {
    pub const NAME: &'static str = "backlog";

    pub const fn new(queue: &'static BacklogQueue<N>, min: Severity) -> Self {
        Self { queue, min }
    }
}

impl<const N: usize> LogSink for BacklogSink<N> {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn min_severity(&self) -> Severity {
        self.min
    }

    fn set_min_severity(&mut self, severity: Severity) {
        self.min = severity;
    }

    fn write(&mut self, _severity: Severity, line: &str) {
        let _ = self.queue.push(line);
    }
}

/// Publishes queued log lines in FIFO order on every tick while the broker is
/// connected. A line leaves the queue only once its publish succeeded.
pub struct BacklogLogComponent<const N: usize> {
    queue: &'static BacklogQueue<N>,
    topic: String,
    publisher: Rc<RefCell<dyn Publish>>,
    published: u32,
}

impl<const N: usize> BacklogLogComponent<N> {
    pub fn new(
        queue: &'static BacklogQueue<N>,
        topic: &str,
        publisher: Rc<RefCell<dyn Publish>>,
    ) -> Self {
        Self {
            queue,
            topic: String::from(topic),
            publisher,
            published: 0,
        }
    }

    pub fn published(&self) -> u32 {
        self.published
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    fn drain(&mut self) -> usize {
        if self.queue.is_empty() {
            return 0;
        }
        let Ok(mut publisher) = self.publisher.try_borrow_mut() else {
            return 0;
        };
        if !publisher.is_connected() {
            return 0;
        }
        let Some(_guard) = self.queue.begin_drain() else {
            return 0;
        };

        let mut sent = 0;
        while let Some(line) = self.queue.front() {
            if !publisher.publish(&self.topic, line.as_bytes(), false) {
                break;
            }
            let _ = self.queue.pop_front();
            sent += 1;
        }
        if sent > 0 {
            // Still inside the drain, so this line reaches the console only.
            info!("log-backlog: flushed {} lines", sent);
        }
        self.published = self.published.saturating_add(sent as u32);
        sent
    }
}

impl<const N: usize> Component for BacklogLogComponent<N> {
    fn name(&self) -> &'static str {
        "log-backlog"
    }

    fn init(&mut self, _status: &mut StatusSlot) {
        debug!(
            "log-backlog: buffering up to {} lines for {}",
            self.queue.limit(),
            self.topic
        );
    }

    fn tick(&mut self, _status: &mut StatusSlot) {
        let _ = self.drain();
    }
}
