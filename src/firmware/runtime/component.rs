use alloc::{boxed::Box, rc::Rc, string::String, vec::Vec};
use core::cell::RefCell;

use log::{debug, error, log};

use crate::firmware::logging::{Severity, CRITICAL};

/// A unit of device functionality driven by the supervisor loop.
pub trait Component {
    fn name(&self) -> &'static str;

    /// Runs once, right after registration.
    fn init(&mut self, status: &mut StatusSlot);

    /// Runs once per loop iteration, in registration order.
    fn tick(&mut self, status: &mut StatusSlot);
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ComponentStatus {
    pub code: i32,
    pub severity: Severity,
    pub message: String,
}

/// Latest status reported by one component.
#[derive(Debug, Default)]
pub struct StatusSlot {
    current: Option<ComponentStatus>,
    changed: bool,
}

impl StatusSlot {
    /// Records a status. Repeating the current one is not a change.
    pub fn set(&mut self, code: i32, severity: Severity, message: &str) {
        if self.current.as_ref().is_some_and(|current| {
            current.code == code && current.severity == severity && current.message == message
        }) {
            return;
        }
        self.current = Some(ComponentStatus {
            code,
            severity,
            message: String::from(message),
        });
        self.changed = true;
    }

    pub fn current(&self) -> Option<&ComponentStatus> {
        self.current.as_ref()
    }

    pub fn code(&self) -> Option<i32> {
        self.current.as_ref().map(|status| status.code)
    }

    fn take_changed(&mut self) -> Option<&ComponentStatus> {
        if !core::mem::take(&mut self.changed) {
            return None;
        }
        self.current.as_ref()
    }
}

pub type StatusObserver = Box<dyn FnMut(&'static str, &ComponentStatus)>;

struct Entry {
    name: &'static str,
    component: Rc<RefCell<dyn Component>>,
    status: StatusSlot,
}

/// Ordered, append-only set of components.
///
/// Registration and initialization are one step: a component is never
/// registered without having been initialized.
#[derive(Default)]
pub struct ComponentRegistry {
    entries: Vec<Entry>,
    observer: Option<StatusObserver>,
}

impl ComponentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs the hook told about every status change (display, health
    /// page).
    pub fn set_status_observer(&mut self, observer: StatusObserver) {
        self.observer = Some(observer);
    }

    /// Appends `component`, initializes it and hands the typed handle back.
    pub fn register<T: Component + 'static>(&mut self, component: Rc<RefCell<T>>) -> Rc<RefCell<T>> {
        self.register_shared(component.clone());
        component
    }

    pub fn register_shared(&mut self, component: Rc<RefCell<dyn Component>>) -> usize {
        let name = component.borrow().name();
        debug!("registry: adding component {}", name);

        self.entries.push(Entry {
            name,
            component,
            status: StatusSlot::default(),
        });
        let index = self.entries.len() - 1;
        let entry = &mut self.entries[index];
        match entry.component.try_borrow_mut() {
            Ok(mut component) => component.init(&mut entry.status),
            Err(_) => error!("registry: {} is busy, init skipped", name),
        }
        Self::report(&mut self.observer, entry);
        index
    }

    pub fn tick_all(&mut self) {
        for entry in self.entries.iter_mut() {
            match entry.component.try_borrow_mut() {
                Ok(mut component) => component.tick(&mut entry.status),
                Err(_) => {
                    error!("registry: {} is busy, tick skipped", entry.name);
                    continue;
                }
            }
            Self::report(&mut self.observer, entry);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.iter().map(|entry| entry.name)
    }

    pub fn statuses(&self) -> impl Iterator<Item = (&'static str, Option<&ComponentStatus>)> + '_ {
        self.entries
            .iter()
            .map(|entry| (entry.name, entry.status.current()))
    }

    fn report(observer: &mut Option<StatusObserver>, entry: &mut Entry) {
        let Some(status) = entry.status.take_changed() else {
            return;
        };
        match status.severity {
            Severity::None => {}
            Severity::Critical => error!(
                target: CRITICAL,
                "{}: status {} {}",
                entry.name,
                status.code,
                status.message
            ),
            severity => log!(
                log_level(severity),
                "{}: status {} {}",
                entry.name,
                status.code,
                status.message
            ),
        }
        if let Some(observer) = observer.as_mut() {
            observer(entry.name, status);
        }
    }
}

fn log_level(severity: Severity) -> log::Level {
    match severity {
        Severity::Trace => log::Level::Trace,
        Severity::Debug => log::Level::Debug,
        Severity::Information => log::Level::Info,
        Severity::Warning => log::Level::Warn,
        Severity::Error | Severity::Critical | Severity::None => log::Level::Error,
    }
}
