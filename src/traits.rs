use std::{collections::BTreeMap, time::SystemTime};

use crate::{
    era::Era,
    error::FatalError,
    message::{Ballot, Block, Justifications, Message, MessageHash},
    tick::Tick,
    validators::{ValidatorId, Weight},
};

/// Read access to the local message DAG.
///
/// Lookups are expected to be total for any hash the runtime has previously
/// seen as a justification; a miss is reported as a fatal error, not retried.
pub trait Dag {
    /// Returns the message with the given hash.
    fn message(&self, hash: &MessageHash) -> Result<Message, FatalError>;

    /// Returns the latest message by `validator` in the era identified by
    /// `key_block_hash`, if any.
    fn latest_message(
        &self,
        key_block_hash: &MessageHash,
        validator: &ValidatorId,
    ) -> Result<Option<Message>, FatalError>;

    /// Returns the bonded validator set recorded in the post-state of the
    /// given block.
    fn bonds_at(&self, block: &MessageHash) -> Result<BTreeMap<ValidatorId, Weight>, FatalError>;
}

/// Durable store of constructed eras.
pub trait EraStorage {
    /// Returns whether the era with the given key block is already stored.
    fn contains_era(&self, key_block_hash: &MessageHash) -> Result<bool, FatalError>;

    /// Persists an era. Idempotent on the era's key block hash.
    fn add_era(&self, era: Era) -> Result<(), FatalError>;
}

/// The tip selected by the fork choice, together with the justifications a
/// message built on it should carry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ForkChoiceResult {
    pub main_parent: MessageHash,
    pub justifications: Justifications,
}

/// The fork choice oracle.
pub trait ForkChoice {
    /// Runs the fork choice over the era identified by its key block.
    fn from_key_block(&self, key_block_hash: &MessageHash) -> Result<ForkChoiceResult, FatalError>;
}

/// Produces, signs and hashes the messages the local validator emits.
pub trait MessageProducer {
    /// Produces a block for the given round.
    fn block(
        &self,
        era_id: &MessageHash,
        round_id: Tick,
        main_parent: MessageHash,
        justifications: Justifications,
        is_booking_block: bool,
    ) -> Result<Block, FatalError>;

    /// Produces a ballot voting for `target`.
    fn ballot(
        &self,
        era_id: &MessageHash,
        round_id: Tick,
        target: MessageHash,
        justifications: Justifications,
    ) -> Result<Ballot, FatalError>;
}

/// The wall clock. Instants appear only at this boundary; everything past it
/// is tick arithmetic.
pub trait Clock {
    /// Returns the current wall-clock time.
    fn now(&self) -> SystemTime;
}

/// A snapshot of whether the node's initial sync has completed. Polled on
/// every input; must be safe to read while the sync subsystem writes it.
pub trait IsSynced {
    /// Returns whether the node is synced.
    fn is_synced(&self) -> bool;
}
