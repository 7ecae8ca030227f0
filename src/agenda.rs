use std::convert::identity;

use datasize::DataSize;
use serde::{Deserialize, Serialize};

use crate::tick::Tick;

/// Work the runtime schedules for its future self.
///
/// At equal ticks, `StartRound` sorts before `CreateOmegaMessage`; the derived
/// ordering relies on the declaration order.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, DataSize,
)]
pub enum Action {
    /// Open the round starting at the given tick.
    StartRound { round_id: Tick },
    /// Emit the omega ballot for the given round.
    CreateOmegaMessage { round_id: Tick },
}

/// An action due at a tick. The tick is advisory: a handler that runs late
/// compensates by skipping ahead.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, DataSize,
)]
pub struct DelayedAction {
    pub tick: Tick,
    pub action: Action,
}

/// An ordered collection of future actions.
///
/// The agenda never blocks; it is a plain value returned from each handler and
/// merged into the outer scheduler's queue.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, DataSize)]
pub struct Agenda(Vec<DelayedAction>);

impl Agenda {
    /// Returns an empty agenda.
    pub fn empty() -> Agenda {
        Agenda(Vec::new())
    }

    /// Adds an action due at the given tick, keeping the agenda ordered.
    pub fn schedule(&mut self, tick: Tick, action: Action) {
        let item = DelayedAction { tick, action };
        let index = self.0.binary_search(&item).unwrap_or_else(identity);
        self.0.insert(index, item);
    }

    /// Merges two agendas into one ordered agenda.
    pub fn merge(self, other: Agenda) -> Agenda {
        Agenda(itertools::merge(self.0, other.0).collect())
    }

    /// Returns the scheduled actions in order.
    pub fn iter(&self) -> impl Iterator<Item = &DelayedAction> {
        self.0.iter()
    }

    /// Returns the number of scheduled actions.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns whether nothing is scheduled.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the scheduled actions as a slice.
    pub fn as_slice(&self) -> &[DelayedAction] {
        &self.0
    }
}

impl IntoIterator for Agenda {
    type Item = DelayedAction;
    type IntoIter = std::vec::IntoIter<DelayedAction>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}
