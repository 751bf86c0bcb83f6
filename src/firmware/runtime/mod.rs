mod clock;
mod component;
mod restart;
mod scheduler;
mod supervisor;

pub use clock::{Clock, Delay, RandomSource, SystemControl};
pub use component::{Component, ComponentRegistry, ComponentStatus, StatusObserver, StatusSlot};
pub use restart::{RestartSignal, RESTART};
pub use scheduler::{JobInfo, JobOutcome, Scheduler};
pub use supervisor::{LoopCounter, Step, Supervisor};
