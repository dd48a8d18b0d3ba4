//! Single-in-flight request/response scheduling over the peer line link.
//!
//! Commands are served strictly in submission order and only the front one
//! may be active. A command leaves the queue exactly once: when a received
//! line satisfies it, or when its deadline passes.

use std::collections::VecDeque;

use tracing::{debug, warn};

use crate::constants::DEFAULT_RESPONSE_TIMEOUT_MS;
use crate::error::LinkResult;

/// Actions of one request/response transaction. `Ctx` is whatever the
/// transaction needs to do its work (serial channel, reply sink), lent for
/// the duration of each call.
pub trait Transaction<Ctx: ?Sized> {
    /// Identifier used in diagnostics
    fn name(&self) -> &str;

    /// Write the request. Called exactly once.
    fn execute(&mut self, ctx: &mut Ctx) -> LinkResult<()>;

    /// Returns true when `line` completes the transaction
    fn handle_response(&mut self, line: &str, ctx: &mut Ctx) -> bool;

    /// Called exactly once if no line satisfied the transaction in time
    fn handle_timeout(&mut self, _ctx: &mut Ctx) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandState {
    Pending,
    Active { deadline: u64 },
}

pub struct Command<T> {
    pub action: T,
    /// Earliest tick at which the request may be written
    pub request_start_time: u64,
    pub response_timeout: u64,
    state: CommandState,
}

impl<T> Command<T> {
    pub fn new(action: T) -> Self {
        Command {
            action,
            request_start_time: 0,
            response_timeout: DEFAULT_RESPONSE_TIMEOUT_MS,
            state: CommandState::Pending,
        }
    }

    pub fn start_at(mut self, tick: u64) -> Self {
        self.request_start_time = tick;
        self
    }

    pub fn timeout(mut self, ms: u64) -> Self {
        self.response_timeout = ms;
        self
    }

    pub fn state(&self) -> CommandState {
        self.state
    }

    pub fn execution_started(&self) -> bool {
        matches!(self.state, CommandState::Active { .. })
    }
}

/// What became of a line handed to [`CommandScheduler::on_line`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineRoute {
    /// The active command was satisfied and removed
    Completed,
    /// Matched an entry of the unsolicited-event table
    Unsolicited,
    /// Neither
    Unmatched,
}

struct UnsolicitedEvent {
    literal: String,
    callback: Box<dyn FnMut()>,
}

pub struct CommandScheduler<T> {
    queue: VecDeque<Command<T>>,
    events: Vec<UnsolicitedEvent>,
}

impl<T> CommandScheduler<T> {
    pub fn new() -> Self {
        CommandScheduler {
            queue: VecDeque::new(),
            events: Vec::new(),
        }
    }

    pub fn enqueue(&mut self, command: Command<T>) {
        self.queue.push_back(command);
    }

    /// Run `callback` whenever the peer sends exactly `literal`, whatever
    /// the queue is doing
    pub fn register_event(&mut self, literal: impl Into<String>, callback: impl FnMut() + 'static) {
        self.events.push(UnsolicitedEvent {
            literal: literal.into(),
            callback: Box::new(callback),
        });
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn front(&self) -> Option<&Command<T>> {
        self.queue.front()
    }

    pub fn active(&self) -> Option<&Command<T>> {
        self.queue.front().filter(|c| c.execution_started())
    }

    /// Advance the queue to `now`: expire overdue commands, then start at
    /// most one pending command.
    pub fn tick<Ctx: ?Sized>(&mut self, now: u64, ctx: &mut Ctx)
    where
        T: Transaction<Ctx>,
    {
        while let Some(front) = self.queue.front_mut() {
            match front.state {
                CommandState::Active { deadline } if now >= deadline => {
                    debug!("Command {} timed out", front.action.name());
                    front.action.handle_timeout(ctx);
                    self.queue.pop_front();
                }
                CommandState::Pending if now >= front.request_start_time => {
                    front.state = CommandState::Active {
                        deadline: now.saturating_add(front.response_timeout),
                    };
                    debug!("Executing command {}", front.action.name());
                    // A failed write leaves the command to its timeout
                    if let Err(e) = front.action.execute(ctx) {
                        warn!("Command {} failed to send: {}", front.action.name(), e);
                    }
                    return;
                }
                _ => return,
            }
        }
    }

    /// Offer a received line to the active command, then to the
    /// unsolicited-event table.
    pub fn on_line<Ctx: ?Sized>(&mut self, line: &str, ctx: &mut Ctx) -> LineRoute
    where
        T: Transaction<Ctx>,
    {
        if let Some(front) = self.queue.front_mut() {
            if front.execution_started() && front.action.handle_response(line, ctx) {
                debug!("Command {} completed", front.action.name());
                self.queue.pop_front();
                return LineRoute::Completed;
            }
        }

        let mut route = LineRoute::Unmatched;
        for event in self.events.iter_mut().filter(|e| e.literal == line) {
            (event.callback)();
            route = LineRoute::Unsolicited;
        }
        route
    }
}

impl<T> Default for CommandScheduler<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use super::*;

    #[derive(Default)]
    struct Trace {
        events: Vec<String>,
    }

    struct Stub {
        name: &'static str,
        ack: &'static str,
    }

    impl Transaction<Trace> for Stub {
        fn name(&self) -> &str {
            self.name
        }

        fn execute(&mut self, ctx: &mut Trace) -> LinkResult<()> {
            ctx.events.push(format!("execute {}", self.name));
            Ok(())
        }

        fn handle_response(&mut self, line: &str, ctx: &mut Trace) -> bool {
            let done = line == self.ack;
            if done {
                ctx.events.push(format!("done {}", self.name));
            }
            done
        }

        fn handle_timeout(&mut self, ctx: &mut Trace) {
            ctx.events.push(format!("timeout {}", self.name));
        }
    }

    fn stub(name: &'static str, ack: &'static str) -> Command<Stub> {
        Command::new(Stub { name, ack })
    }

    #[test]
    fn response_completes_active_command() {
        let mut scheduler = CommandScheduler::new();
        let mut trace = Trace::default();
        scheduler.enqueue(stub("a", "ACK a").timeout(2000));

        scheduler.tick(0, &mut trace);
        assert_eq!(trace.events, vec!["execute a"]);

        assert_eq!(scheduler.on_line("ACK a", &mut trace), LineRoute::Completed);
        assert!(scheduler.is_empty());

        scheduler.tick(500, &mut trace);
        scheduler.tick(5000, &mut trace);
        assert_eq!(trace.events, vec!["execute a", "done a"]);
    }

    #[test]
    fn unanswered_command_times_out_once() {
        let mut scheduler = CommandScheduler::new();
        let mut trace = Trace::default();
        scheduler.enqueue(stub("a", "ACK a").timeout(2000));

        for now in (0..=4000).step_by(250) {
            scheduler.tick(now, &mut trace);
        }
        assert!(scheduler.is_empty());
        assert_eq!(trace.events, vec!["execute a", "timeout a"]);
    }

    #[test]
    fn deadline_is_inclusive() {
        let mut scheduler = CommandScheduler::new();
        let mut trace = Trace::default();
        scheduler.enqueue(stub("a", "ACK a").timeout(100));

        assert_eq!(scheduler.front().map(|c| c.state()), Some(CommandState::Pending));
        scheduler.tick(10, &mut trace);
        assert_eq!(
            scheduler.active().map(|c| c.state()),
            Some(CommandState::Active { deadline: 110 })
        );
        scheduler.tick(109, &mut trace);
        assert_eq!(scheduler.len(), 1);
        scheduler.tick(110, &mut trace);
        assert!(scheduler.is_empty());
    }

    #[test]
    fn only_one_execute_per_tick() {
        let mut scheduler = CommandScheduler::new();
        let mut trace = Trace::default();
        scheduler.enqueue(stub("a", "ACK a"));
        scheduler.enqueue(stub("b", "ACK b"));

        scheduler.tick(0, &mut trace);
        scheduler.tick(1, &mut trace);
        assert_eq!(trace.events, vec!["execute a"]);

        scheduler.on_line("ACK a", &mut trace);
        assert!(!scheduler.front().unwrap().execution_started());
        scheduler.tick(2, &mut trace);
        assert_eq!(trace.events, vec!["execute a", "done a", "execute b"]);
    }

    #[test]
    fn lines_are_ignored_until_execution() {
        let mut scheduler = CommandScheduler::new();
        let mut trace = Trace::default();
        scheduler.enqueue(stub("a", "ACK a").start_at(100));

        assert_eq!(scheduler.on_line("ACK a", &mut trace), LineRoute::Unmatched);
        scheduler.tick(50, &mut trace);
        assert!(trace.events.is_empty());
        assert!(scheduler.active().is_none());

        scheduler.tick(100, &mut trace);
        assert_eq!(scheduler.active().map(|c| c.action.name), Some("a"));
    }

    #[test]
    fn timeouts_cascade_within_one_tick() {
        let mut scheduler = CommandScheduler::new();
        let mut trace = Trace::default();
        scheduler.enqueue(stub("a", "ACK a").timeout(10));
        scheduler.enqueue(stub("b", "ACK b").timeout(10));
        scheduler.enqueue(stub("c", "ACK c").timeout(10));

        scheduler.tick(0, &mut trace);
        scheduler.tick(10, &mut trace);
        assert_eq!(trace.events, vec!["execute a", "timeout a", "execute b"]);
        assert_eq!(scheduler.len(), 2);
    }

    #[test]
    fn at_most_one_command_is_active() {
        let mut scheduler = CommandScheduler::new();
        let mut trace = Trace::default();
        for name in ["a", "b", "c", "d"] {
            scheduler.enqueue(stub(name, "ACK").timeout(30));
        }

        for now in 0..200u64 {
            scheduler.tick(now, &mut trace);
            if now % 7 == 0 {
                scheduler.on_line("ACK", &mut trace);
            }
            let active = scheduler
                .queue
                .iter()
                .filter(|c| c.execution_started())
                .count();
            assert!(active <= 1);
            if let Some(pos) = scheduler.queue.iter().position(|c| c.execution_started()) {
                assert_eq!(pos, 0);
            }
        }
        assert!(scheduler.is_empty());

        let executes = trace.events.iter().filter(|e| e.starts_with("execute")).count();
        let resolved = trace
            .events
            .iter()
            .filter(|e| e.starts_with("done") || e.starts_with("timeout"))
            .count();
        assert_eq!(executes, 4);
        assert_eq!(resolved, 4);
    }

    #[test]
    fn unsolicited_event_fires_regardless_of_queue() {
        let mut scheduler: CommandScheduler<Stub> = CommandScheduler::new();
        let mut trace = Trace::default();
        let hits = Rc::new(Cell::new(0));
        let counter = Rc::clone(&hits);
        scheduler.register_event("TOESP: RESETESP", move || counter.set(counter.get() + 1));

        assert_eq!(
            scheduler.on_line("TOESP: RESETESP", &mut trace),
            LineRoute::Unsolicited
        );

        scheduler.enqueue(stub("a", "ACK a"));
        scheduler.tick(0, &mut trace);
        assert_eq!(
            scheduler.on_line("TOESP: RESETESP", &mut trace),
            LineRoute::Unsolicited
        );
        assert_eq!(scheduler.len(), 1);
        assert_eq!(scheduler.on_line("noise", &mut trace), LineRoute::Unmatched);
        assert_eq!(hits.get(), 2);
    }
}
