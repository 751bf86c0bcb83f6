use log::info;
use statig::{blocking::IntoStateMachineExt as _, prelude::*};

use crate::firmware::types::LinkState;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LinkEvent {
    ScanStarted,
    CandidateFound,
    Associated,
    AttemptFailed,
    LinkLost,
    AccessPointStarted,
    AccessPointStopped,
}

impl LinkEvent {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ScanStarted => "scan started",
            Self::CandidateFound => "candidate found",
            Self::Associated => "associated",
            Self::AttemptFailed => "attempt failed",
            Self::LinkLost => "link lost",
            Self::AccessPointStarted => "access point started",
            Self::AccessPointStopped => "access point stopped",
        }
    }
}

#[derive(Default)]
struct DispatchContext {
    transition: Option<(LinkState, LinkState)>,
}

pub struct LinkStateEngine {
    machine: statig::blocking::StateMachine<LinkHsm>,
}

impl Default for LinkStateEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl LinkStateEngine {
    pub fn new() -> Self {
        Self {
            machine: LinkHsm::new().state_machine(),
        }
    }

    /// Feeds one event; returns `(from, to)` when the state changed.
    pub fn handle(&mut self, event: LinkEvent) -> Option<(LinkState, LinkState)> {
        let mut context = DispatchContext::default();
        self.machine.handle_with_context(&event, &mut context);
        if let Some((from, to)) = context.transition {
            info!("link: state {} -> {} ({})", from.as_str(), to.as_str(), event.as_str());
        }
        context.transition
    }

    pub fn state(&self) -> LinkState {
        self.machine.inner().current
    }

    pub fn access_point_up(&self) -> bool {
        self.machine.inner().access_point_up
    }
}

struct LinkHsm {
    current: LinkState,
    access_point_up: bool,
}

impl LinkHsm {
    fn new() -> Self {
        Self {
            current: LinkState::Disconnected,
            access_point_up: false,
        }
    }

    fn enter(&mut self, context: &mut DispatchContext, to: LinkState) -> Outcome<State> {
        if self.current == to {
            return Handled;
        }
        context.transition = Some((self.current, to));
        self.current = to;
        Transition(match to {
            LinkState::Disconnected => State::disconnected(),
            LinkState::Scanning => State::scanning(),
            LinkState::Connecting => State::connecting(),
            LinkState::Connected => State::connected(),
            LinkState::AccessPointActive => State::access_point_active(),
        })
    }

    /// Where the machine rests when the station is not associated.
    fn settle(&mut self, context: &mut DispatchContext) -> Outcome<State> {
        if self.access_point_up {
            self.enter(context, LinkState::AccessPointActive)
        } else {
            self.enter(context, LinkState::Disconnected)
        }
    }
}

#[state_machine(initial = "State::disconnected()")]
impl LinkHsm {
    #[state(superstate = "radio")]
    fn disconnected(&mut self, context: &mut DispatchContext, event: &LinkEvent) -> Outcome<State> {
        match event {
            LinkEvent::ScanStarted => self.enter(context, LinkState::Scanning),
            _ => Super,
        }
    }

    #[state(superstate = "radio")]
    fn scanning(&mut self, context: &mut DispatchContext, event: &LinkEvent) -> Outcome<State> {
        match event {
            LinkEvent::CandidateFound => self.enter(context, LinkState::Connecting),
            LinkEvent::AttemptFailed => self.settle(context),
            _ => Super,
        }
    }

    #[state(superstate = "radio")]
    fn connecting(&mut self, context: &mut DispatchContext, event: &LinkEvent) -> Outcome<State> {
        match event {
            LinkEvent::AttemptFailed => self.settle(context),
            _ => Super,
        }
    }

    #[state(superstate = "radio")]
    fn connected(&mut self, context: &mut DispatchContext, event: &LinkEvent) -> Outcome<State> {
        match event {
            LinkEvent::LinkLost => self.settle(context),
            LinkEvent::AccessPointStarted => {
                self.access_point_up = true;
                Handled
            }
            _ => Super,
        }
    }

    #[state(superstate = "radio")]
    fn access_point_active(
        &mut self,
        context: &mut DispatchContext,
        event: &LinkEvent,
    ) -> Outcome<State> {
        match event {
            LinkEvent::ScanStarted => self.enter(context, LinkState::Scanning),
            _ => Super,
        }
    }

    #[superstate]
    fn radio(&mut self, context: &mut DispatchContext, event: &LinkEvent) -> Outcome<State> {
        match event {
            LinkEvent::Associated => self.enter(context, LinkState::Connected),
            LinkEvent::AccessPointStarted => {
                self.access_point_up = true;
                self.enter(context, LinkState::AccessPointActive)
            }
            LinkEvent::AccessPointStopped => {
                self.access_point_up = false;
                if self.current == LinkState::AccessPointActive {
                    self.enter(context, LinkState::Disconnected)
                } else {
                    Handled
                }
            }
            LinkEvent::ScanStarted
            | LinkEvent::CandidateFound
            | LinkEvent::AttemptFailed
            | LinkEvent::LinkLost => Handled,
        }
    }
}
