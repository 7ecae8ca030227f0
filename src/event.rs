use crate::{
    agenda::{Action, Agenda},
    era::Era,
    message::{Ballot, Message},
    tick::Tick,
};

/// A protocol event produced by one runtime step.
///
/// Events are emitted for the relay and storage layers to consume; the runtime
/// itself never reads them back.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HighwayEvent {
    /// The local validator emitted the round's lambda message: a block in the
    /// era's active period, or a ballot once a switch block exists.
    CreatedLambdaMessage(Message),
    /// The local validator answered the round's lambda message.
    CreatedLambdaResponse(Ballot),
    /// The local validator cast its omega ballot.
    CreatedOmegaMessage(Ballot),
    /// A switch block was observed and the child era constructed.
    CreatedEra(Era),
}

/// An append-only log of the events produced by one handler call, in emission
/// order. The relay must preserve this order when publishing.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EventLog(Vec<HighwayEvent>);

impl EventLog {
    /// Returns an empty log.
    pub fn new() -> EventLog {
        EventLog::default()
    }

    /// Appends an event.
    pub fn push(&mut self, event: HighwayEvent) {
        self.0.push(event);
    }

    /// Returns the logged events in order.
    pub fn iter(&self) -> impl Iterator<Item = &HighwayEvent> {
        self.0.iter()
    }

    /// Returns the number of logged events.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns whether nothing was logged.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the logged events as a slice.
    pub fn as_slice(&self) -> &[HighwayEvent] {
        &self.0
    }
}

impl IntoIterator for EventLog {
    type Item = HighwayEvent;
    type IntoIter = std::vec::IntoIter<HighwayEvent>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// What one handler call produced: the events to publish and the agenda items
/// to merge into the outer schedule.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct HandlerOutcome {
    pub events: EventLog,
    pub agenda: Agenda,
}

impl HandlerOutcome {
    /// Returns an outcome with no events and no agenda items.
    pub fn new() -> HandlerOutcome {
        HandlerOutcome::default()
    }

    /// Appends an event to the log.
    pub fn emit(&mut self, event: HighwayEvent) {
        self.events.push(event);
    }

    /// Schedules a future action.
    pub fn schedule(&mut self, tick: Tick, action: Action) {
        self.agenda.schedule(tick, action);
    }

    /// Returns whether the call produced neither events nor agenda items.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty() && self.agenda.is_empty()
    }
}
