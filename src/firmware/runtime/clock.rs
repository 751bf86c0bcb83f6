use alloc::rc::Rc;

/// Monotonic milliseconds since boot.
pub trait Clock {
    fn now_ms(&self) -> u64;
}

impl<T: Clock + ?Sized> Clock for &T {
    fn now_ms(&self) -> u64 {
        (**self).now_ms()
    }
}

impl<T: Clock + ?Sized> Clock for Rc<T> {
    fn now_ms(&self) -> u64 {
        (**self).now_ms()
    }
}

/// Busy-wait used by the few blocking loops of the core.
pub trait Delay {
    fn delay_ms(&mut self, ms: u32);
}

pub trait RandomSource {
    fn next_u32(&mut self) -> u32;
}

pub trait SystemControl {
    fn restart(&mut self) -> !;
}
