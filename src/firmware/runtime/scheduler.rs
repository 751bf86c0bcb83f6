use alloc::{boxed::Box, string::String, vec::Vec};

use log::{debug, info, warn};

use super::{Clock, Component, StatusSlot};

/// What a job asks of the scheduler after running.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JobOutcome {
    Continue,
    /// The run failed; logged, and the job still runs again next interval.
    Failed,
    /// Never run this job again.
    Stop,
}

type JobAction = Box<dyn FnMut() -> JobOutcome>;

struct ScheduledJob {
    name: String,
    interval_ms: u64,
    next_due_ms: u64,
    stopped: bool,
    runs: u32,
    action: JobAction,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JobInfo<'a> {
    pub name: &'a str,
    pub interval_ms: u64,
    pub next_due_ms: u64,
    pub stopped: bool,
    pub runs: u32,
}

/// Cooperative periodic runner.
///
/// Jobs run in the order they were added. A new job is due immediately; after
/// each run it is due again `interval_ms` after the tick that ran it, however
/// many intervals that tick was late.
pub struct Scheduler<C: Clock> {
    clock: C,
    jobs: Vec<ScheduledJob>,
}

impl<C: Clock> Scheduler<C> {
    pub fn new(clock: C) -> Self {
        Self {
            clock,
            jobs: Vec::new(),
        }
    }

    /// Adds a job that always reschedules. Returns its index.
    pub fn add_job(
        &mut self,
        name: &str,
        interval_ms: u64,
        mut action: impl FnMut() + 'static,
    ) -> usize {
        self.add_job_with_outcome(name, interval_ms, move || {
            action();
            JobOutcome::Continue
        })
    }

    pub fn add_job_with_outcome(
        &mut self,
        name: &str,
        interval_ms: u64,
        action: impl FnMut() -> JobOutcome + 'static,
    ) -> usize {
        debug!("scheduler: adding job '{}' every {} ms", name, interval_ms);
        self.jobs.push(ScheduledJob {
            name: String::from(name),
            interval_ms,
            next_due_ms: 0,
            stopped: false,
            runs: 0,
            action: Box::new(action),
        });
        self.jobs.len() - 1
    }

    /// Runs every job due at `now_ms`, once each. Returns how many ran.
    pub fn run_due(&mut self, now_ms: u64) -> usize {
        let mut ran = 0;
        for job in self.jobs.iter_mut() {
            if job.stopped || job.next_due_ms > now_ms {
                continue;
            }
            let outcome = (job.action)();
            job.runs = job.runs.saturating_add(1);
            ran += 1;
            match outcome {
                JobOutcome::Continue => {}
                JobOutcome::Failed => warn!("scheduler: job '{}' failed", job.name),
                JobOutcome::Stop => {
                    info!("scheduler: job '{}' stopped", job.name);
                    job.stopped = true;
                }
            }
            job.next_due_ms = now_ms.saturating_add(job.interval_ms);
        }
        ran
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn job(&self, index: usize) -> Option<JobInfo<'_>> {
        self.jobs.get(index).map(|job| JobInfo {
            name: &job.name,
            interval_ms: job.interval_ms,
            next_due_ms: job.next_due_ms,
            stopped: job.stopped,
            runs: job.runs,
        })
    }
}

impl<C: Clock> Component for Scheduler<C> {
    fn name(&self) -> &'static str {
        "scheduler"
    }

    fn init(&mut self, _status: &mut StatusSlot) {
        debug!("scheduler: {} jobs", self.jobs.len());
    }

    fn tick(&mut self, _status: &mut StatusSlot) {
        let now_ms = self.clock.now_ms();
        let _ = self.run_due(now_ms);
    }
}
