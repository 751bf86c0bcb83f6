use alloc::rc::Rc;
use core::cell::Cell;

use log::warn;

use super::{Clock, ComponentRegistry, RestartSignal, SystemControl};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Step {
    Continue,
    Restart,
}

/// Loop iterations since the counter was last taken.
#[derive(Clone, Debug, Default)]
pub struct LoopCounter(Rc<Cell<u32>>);

impl LoopCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bump(&self) {
        self.0.set(self.0.get().wrapping_add(1));
    }

    pub fn get(&self) -> u32 {
        self.0.get()
    }

    pub fn take(&self) -> u32 {
        self.0.replace(0)
    }
}

/// The single thread of control: tick every component, then honour a due
/// restart request.
pub struct Supervisor<C: Clock> {
    registry: ComponentRegistry,
    clock: C,
    restart: &'static RestartSignal,
    loops: LoopCounter,
}

impl<C: Clock> Supervisor<C> {
    pub fn new(registry: ComponentRegistry, clock: C, restart: &'static RestartSignal) -> Self {
        Self {
            registry,
            clock,
            restart,
            loops: LoopCounter::new(),
        }
    }

    pub fn with_loop_counter(mut self, loops: LoopCounter) -> Self {
        self.loops = loops;
        self
    }

    pub fn loop_counter(&self) -> LoopCounter {
        self.loops.clone()
    }

    pub fn registry(&self) -> &ComponentRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut ComponentRegistry {
        &mut self.registry
    }

    pub fn step(&mut self) -> Step {
        self.registry.tick_all();
        self.loops.bump();
        if self.restart.is_due(self.clock.now_ms()) {
            return Step::Restart;
        }
        Step::Continue
    }

    pub fn run<S: SystemControl>(mut self, system: &mut S) -> ! {
        loop {
            if self.step() == Step::Restart {
                warn!("supervisor: restart requested, rebooting");
                system.restart();
            }
        }
    }
}
