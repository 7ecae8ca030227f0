//! The per-era runtime of the Highway consensus protocol.
//!
//! Highway organizes block production into fixed-duration eras, each governed
//! by a validator set drawn from a key block of the preceding era. Within an
//! era, bonded validators proceed in synchronized rounds: the round's leader
//! emits a lambda block, the other bonded validators answer with a lambda
//! response ballot, and every bonded validator casts an omega ballot later in
//! the round. After the era ends, a voting period collects the ballots that
//! finalize the era's switch block, from which the child era is constructed.
//!
//! The entry point is [`EraRuntime`]: a single-era, single-threaded state
//! machine. The outer scheduler feeds it received [`Message`]s (via
//! [`EraRuntime::validate`] and [`EraRuntime::handle_message`]) and due
//! [`Action`]s (via [`EraRuntime::handle_agenda`]); each call synchronously
//! returns the [`HighwayEvent`]s it produced and the [`Agenda`] items to merge
//! into the global schedule. Gossip, storage, fork choice, message signing and
//! the wall clock are external capabilities passed in as trait parameters.

pub mod agenda;
pub mod boundaries;
pub mod classifier;
pub mod config;
pub mod era;
pub mod error;
pub mod event;
pub mod leaders;
pub mod message;
pub mod runtime;
pub mod tick;
pub mod traits;
pub mod validators;

#[cfg(test)]
pub(crate) mod testing;

pub use agenda::{Action, Agenda, DelayedAction};
pub use boundaries::EraBoundaries;
pub use classifier::MessageClass;
pub use config::{ConfigError, HighwayConf};
pub use era::Era;
pub use error::{EraError, FatalError, ProtocolViolation};
pub use event::{EventLog, HandlerOutcome, HighwayEvent};
pub use leaders::{era_seed, LeaderSequencer, StakeLeaders};
pub use message::{Ballot, Block, Justifications, Message, MessageHash};
pub use runtime::{EraRuntime, LocalValidator};
pub use tick::{next_round, round_id, round_length, Tick, TickDiff};
pub use traits::{Clock, Dag, EraStorage, ForkChoice, ForkChoiceResult, IsSynced, MessageProducer};
pub use validators::{ValidatorId, Weight};
