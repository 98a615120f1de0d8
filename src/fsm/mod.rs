//! State machine substrate
//!
//! A small, statically-typed FSM used by protocol- and lifecycle-bearing
//! components. States are the variants of a single state type `S`; handlers
//! return an [`Action`] drawn from a closed set, and the machine executes the
//! returned action exactly once per dispatch.
//!
//! Transition data travels inside the target state value itself: a handler
//! that wants to enter `Loading { retries: 1 }` returns
//! `Action::TransitionTo(MyState::Loading { retries: 1 })`, and the target's
//! `on_enter` observes the carried data. Alternate handler paths are
//! expressed by returning different variants of the one `Action` enum.
//!
//! Lifecycle rules:
//! - `on_leave` returning a terminal status cancels the transition; the
//!   machine terminates in the previous state.
//! - `on_enter` returning a terminal status completes the transition, but the
//!   machine is terminal afterwards.
//! - A panicking handler or hook terminates the machine with an error status
//!   instead of propagating.

use std::panic::{AssertUnwindSafe, catch_unwind};

/// Action returned by a state's event handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action<S> {
    /// No state change, no side effect.
    Continue,
    /// Explicit no-op, useful as a default arm.
    DoNothing,
    /// Leave the current state and enter `S` (which carries any payload).
    TransitionTo(S),
    /// Absorbing stop.
    Terminate,
    /// Absorbing stop with an error message.
    TerminateWithError(String),
    /// Re-invoke the handler with the same event, in the (possibly new)
    /// current state.
    ReissueEvent,
    /// Non-fatal error report; the machine keeps running.
    ReportError(String),
}

/// Status of a dispatch or lifecycle hook.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Status {
    /// The machine keeps running.
    #[default]
    Continue,
    /// The machine reached an absorbing stop.
    Terminated,
    /// The machine reached an absorbing stop with an error.
    TerminatedWithError(String),
    /// A non-fatal error was reported; the machine keeps running.
    ErrorReported(String),
}

impl Status {
    /// True for `Terminated` and `TerminatedWithError`.
    #[inline]
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Status::Terminated | Status::TerminatedWithError(_))
    }
}

/// Behavior of a state type for events of type `E`.
///
/// `handle` is mandatory; the lifecycle hooks default to [`Status::Continue`].
pub trait State<E>: Sized {
    /// React to `event`, returning the action the machine must execute.
    fn handle(&mut self, event: &E) -> Action<Self>;

    /// Invoked on the target state after it becomes current.
    fn on_enter(&mut self, _event: &E) -> Status {
        Status::Continue
    }

    /// Invoked on the current state before it is replaced.
    fn on_leave(&mut self, _event: &E) -> Status {
        Status::Continue
    }
}

/// The machine: a current state plus the status of the last dispatch.
#[derive(Debug)]
pub struct StateMachine<S> {
    state: S,
    status: Status,
}

impl<S> StateMachine<S> {
    #[must_use]
    pub fn new(initial: S) -> Self {
        Self { state: initial, status: Status::Continue }
    }

    /// Current state, for inspection.
    #[inline]
    #[must_use]
    pub fn state(&self) -> &S {
        &self.state
    }

    /// Status of the most recent dispatch.
    #[inline]
    #[must_use]
    pub fn status(&self) -> &Status {
        &self.status
    }

    /// True once the machine reached an absorbing stop.
    #[inline]
    #[must_use]
    pub fn is_terminated(&self) -> bool {
        self.status.is_terminal()
    }

    /// Force the machine into `state` without running hooks. Intended for
    /// setup code and tests.
    pub fn force_transition(&mut self, state: S) -> &mut S {
        self.state = state;
        &mut self.state
    }

    /// Dispatch `event` to the current state's handler and execute the
    /// returned action. Once terminal, dispatch is a no-op that returns the
    /// terminal status.
    pub fn handle<E>(&mut self, event: &E) -> &Status
    where
        S: State<E>,
    {
        if self.status.is_terminal() {
            return &self.status;
        }

        loop {
            let action = match guarded(|| self.state.handle(event)) {
                Ok(action) => action,
                Err(message) => {
                    self.status = Status::TerminatedWithError(message);
                    return &self.status;
                }
            };

            match action {
                Action::Continue | Action::DoNothing => {
                    self.status = Status::Continue;
                    return &self.status;
                }
                Action::Terminate => {
                    self.status = Status::Terminated;
                    return &self.status;
                }
                Action::TerminateWithError(message) => {
                    self.status = Status::TerminatedWithError(message);
                    return &self.status;
                }
                Action::ReportError(message) => {
                    self.status = Status::ErrorReported(message);
                    return &self.status;
                }
                Action::ReissueEvent => {
                    // Loop: re-invoke the handler with the same event.
                }
                Action::TransitionTo(target) => {
                    self.status = self.transition(target, event);
                    return &self.status;
                }
            }
        }
    }

    fn transition<E>(&mut self, target: S, event: &E) -> Status
    where
        S: State<E>,
    {
        let leave = match guarded(|| self.state.on_leave(event)) {
            Ok(status) => status,
            Err(message) => return Status::TerminatedWithError(message),
        };
        if leave.is_terminal() {
            // Transition canceled: terminal in the previous state.
            return leave;
        }

        self.state = target;

        let enter = match guarded(|| self.state.on_enter(event)) {
            Ok(status) => status,
            Err(message) => return Status::TerminatedWithError(message),
        };
        if enter.is_terminal() {
            // Transition completed, but the machine is terminal.
            return enter;
        }

        match (leave, enter) {
            (Status::ErrorReported(message), _) | (_, Status::ErrorReported(message)) => {
                Status::ErrorReported(message)
            }
            _ => Status::Continue,
        }
    }
}

/// Runs `f`, converting a panic into an error message.
fn guarded<T>(f: impl FnOnce() -> T) -> std::result::Result<T, String> {
    catch_unwind(AssertUnwindSafe(f)).map_err(|payload| {
        let message = payload
            .downcast_ref::<&str>()
            .map(ToString::to_string)
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "handler panicked".to_string());
        log::error!("state handler panicked: {message}");
        message
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    #[derive(Debug, Clone, Copy)]
    struct Tick;

    #[derive(Debug, PartialEq)]
    enum Door {
        Open,
        Closed { slams: u32 },
    }

    impl State<Tick> for Door {
        fn handle(&mut self, _event: &Tick) -> Action<Self> {
            match self {
                Door::Open => Action::TransitionTo(Door::Closed { slams: 1 }),
                Door::Closed { .. } => Action::TransitionTo(Door::Open),
            }
        }
    }

    #[test]
    fn transition_carries_data_and_round_trips() {
        let mut machine = StateMachine::new(Door::Open);
        machine.handle(&Tick);
        assert_eq!(machine.state(), &Door::Closed { slams: 1 });

        machine.handle(&Tick);
        assert_eq!(machine.state(), &Door::Open);
        assert_eq!(machine.status(), &Status::Continue);
    }

    // Counts handler and hook invocations through shared cells so the tests
    // can assert exactly-once execution.
    #[derive(Clone)]
    struct Probe {
        handled: Rc<Cell<u32>>,
        entered: Rc<Cell<u32>>,
        left: Rc<Cell<u32>>,
    }

    impl Probe {
        fn new() -> Self {
            Self {
                handled: Rc::new(Cell::new(0)),
                entered: Rc::new(Cell::new(0)),
                left: Rc::new(Cell::new(0)),
            }
        }
    }

    enum Probed {
        A(Probe),
        B(Probe, u32),
    }

    struct Go {
        data: u32,
    }

    impl State<Go> for Probed {
        fn handle(&mut self, event: &Go) -> Action<Self> {
            match self {
                Probed::A(probe) => {
                    probe.handled.set(probe.handled.get() + 1);
                    Action::TransitionTo(Probed::B(probe.clone(), event.data))
                }
                Probed::B(..) => Action::DoNothing,
            }
        }

        fn on_enter(&mut self, _event: &Go) -> Status {
            if let Probed::B(probe, _) = self {
                probe.entered.set(probe.entered.get() + 1);
            }
            Status::Continue
        }

        fn on_leave(&mut self, _event: &Go) -> Status {
            if let Probed::A(probe) = self {
                probe.left.set(probe.left.get() + 1);
            }
            Status::Continue
        }
    }

    #[test]
    fn transition_with_data_runs_hooks_exactly_once() {
        let probe = Probe::new();
        let mut machine = StateMachine::new(Probed::A(probe.clone()));

        machine.handle(&Go { data: 1 });

        assert!(matches!(machine.state(), Probed::B(_, 1)));
        assert_eq!(probe.handled.get(), 1);
        assert_eq!(probe.left.get(), 1);
        assert_eq!(probe.entered.get(), 1);
        assert_eq!(machine.status(), &Status::Continue);
    }

    enum Guarded {
        Stay,
        Blocked,
        Doomed,
        Target,
    }

    struct Poke;

    impl State<Poke> for Guarded {
        fn handle(&mut self, _event: &Poke) -> Action<Self> {
            match self {
                Guarded::Stay => Action::Continue,
                Guarded::Blocked => Action::TransitionTo(Guarded::Target),
                Guarded::Doomed => Action::TransitionTo(Guarded::Target),
                Guarded::Target => Action::DoNothing,
            }
        }

        fn on_enter(&mut self, _event: &Poke) -> Status {
            match self {
                Guarded::Target => Status::Terminated,
                _ => Status::Continue,
            }
        }

        fn on_leave(&mut self, _event: &Poke) -> Status {
            match self {
                Guarded::Blocked => Status::TerminatedWithError("leave refused".into()),
                _ => Status::Continue,
            }
        }
    }

    #[test]
    fn terminal_on_leave_cancels_transition() {
        let mut machine = StateMachine::new(Guarded::Blocked);
        machine.handle(&Poke);
        // Still in the previous state, but terminal.
        assert!(matches!(machine.state(), Guarded::Blocked));
        assert!(machine.is_terminated());
        assert!(matches!(machine.status(), Status::TerminatedWithError(_)));
    }

    #[test]
    fn terminal_on_enter_completes_transition_then_terminates() {
        let mut machine = StateMachine::new(Guarded::Doomed);
        machine.handle(&Poke);
        assert!(matches!(machine.state(), Guarded::Target));
        assert_eq!(machine.status(), &Status::Terminated);
    }

    #[test]
    fn terminated_machine_absorbs_events() {
        let mut machine = StateMachine::new(Guarded::Doomed);
        machine.handle(&Poke);
        assert!(machine.is_terminated());
        // Handler must not run again; Stay's handle would reset to Continue.
        machine.force_transition(Guarded::Stay);
        machine.handle(&Poke);
        assert!(machine.is_terminated());
    }

    struct Reissuer {
        invocations: u32,
    }

    impl State<Poke> for Reissuer {
        fn handle(&mut self, _event: &Poke) -> Action<Self> {
            self.invocations += 1;
            if self.invocations < 2 {
                Action::ReissueEvent
            } else {
                Action::Continue
            }
        }
    }

    #[test]
    fn reissue_reinvokes_handler_with_same_event() {
        let mut machine = StateMachine::new(Reissuer { invocations: 0 });
        machine.handle(&Poke);
        assert_eq!(machine.state().invocations, 2);
        assert_eq!(machine.status(), &Status::Continue);
    }

    struct Panicky;

    impl State<Poke> for Panicky {
        fn handle(&mut self, _event: &Poke) -> Action<Self> {
            panic!("boom");
        }
    }

    #[test]
    fn panicking_handler_terminates_with_error() {
        let mut machine = StateMachine::new(Panicky);
        let status = machine.handle(&Poke).clone();
        assert_eq!(status, Status::TerminatedWithError("boom".to_string()));
        assert!(machine.is_terminated());
    }

    struct Reporter;

    impl State<Poke> for Reporter {
        fn handle(&mut self, _event: &Poke) -> Action<Self> {
            Action::ReportError("soft failure".into())
        }
    }

    #[test]
    fn report_error_is_not_terminal() {
        let mut machine = StateMachine::new(Reporter);
        machine.handle(&Poke);
        assert_eq!(machine.status(), &Status::ErrorReported("soft failure".into()));
        assert!(!machine.is_terminated());
        // Still dispatches afterwards.
        machine.handle(&Poke);
        assert!(!machine.is_terminated());
    }
}
