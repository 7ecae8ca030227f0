use std::collections::BTreeMap;

use datasize::DataSize;
use serde::{Deserialize, Serialize};

use crate::{
    config::HighwayConf,
    message::MessageHash,
    tick::Tick,
    validators::{ValidatorId, Weight},
};

/// A fixed tick interval of consensus with a frozen validator set.
///
/// An era is identified by its key block hash and is immutable for the
/// lifetime of the runtime that owns it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, DataSize)]
pub struct Era {
    start_tick: Tick,
    end_tick: Tick,
    key_block_hash: MessageHash,
    booking_block_hash: MessageHash,
    leader_seed: u64,
    parent_key_block_hash: MessageHash,
    bonds: BTreeMap<ValidatorId, Weight>,
}

impl Era {
    /// Creates a new era record.
    pub fn new(
        start_tick: Tick,
        end_tick: Tick,
        key_block_hash: MessageHash,
        booking_block_hash: MessageHash,
        leader_seed: u64,
        parent_key_block_hash: MessageHash,
        bonds: BTreeMap<ValidatorId, Weight>,
    ) -> Era {
        assert!(
            bonds.values().any(|weight| !weight.is_zero()),
            "cannot start an era with total weight 0"
        );
        assert!(start_tick < end_tick, "era must end after it starts");
        Era {
            start_tick,
            end_tick,
            key_block_hash,
            booking_block_hash,
            leader_seed,
            parent_key_block_hash,
            bonds,
        }
    }

    /// Creates era 0. The genesis block stands in for the booking and key
    /// blocks, and the era is extended per `conf` so the first child era's
    /// booking and key blocks fall inside it.
    pub fn genesis(
        conf: &HighwayConf,
        genesis_block_hash: MessageHash,
        leader_seed: u64,
        bonds: BTreeMap<ValidatorId, Weight>,
    ) -> Era {
        Era::new(
            conf.genesis_era_start_tick(),
            conf.genesis_era_end_tick(),
            genesis_block_hash,
            genesis_block_hash,
            leader_seed,
            genesis_block_hash,
            bonds,
        )
    }

    /// The era's identity: its key block hash.
    pub fn id(&self) -> &MessageHash {
        &self.key_block_hash
    }

    /// The first tick of the era.
    pub fn start_tick(&self) -> Tick {
        self.start_tick
    }

    /// The first tick after the era. A block at this tick whose parent is
    /// earlier is the era's switch block.
    pub fn end_tick(&self) -> Tick {
        self.end_tick
    }

    /// The hash of the key block the era's validator set was frozen at.
    pub fn key_block_hash(&self) -> &MessageHash {
        &self.key_block_hash
    }

    /// The hash of the booking block the validator set was drawn from.
    pub fn booking_block_hash(&self) -> &MessageHash {
        &self.booking_block_hash
    }

    /// The seed of the era's leader schedule.
    pub fn leader_seed(&self) -> u64 {
        self.leader_seed
    }

    /// The key block hash of the parent era.
    pub fn parent_key_block_hash(&self) -> &MessageHash {
        &self.parent_key_block_hash
    }

    /// The era's validator set and stakes, in canonical order.
    pub fn bonds(&self) -> &BTreeMap<ValidatorId, Weight> {
        &self.bonds
    }

    /// Returns whether the validator is bonded in this era.
    pub fn is_bonded(&self, validator: &ValidatorId) -> bool {
        self.bonds.contains_key(validator)
    }

    /// The stake of the given validator; zero if unbonded.
    pub fn weight(&self, validator: &ValidatorId) -> Weight {
        self.bonds.get(validator).copied().unwrap_or_default()
    }

    /// The sum of all bonded stakes.
    pub fn total_weight(&self) -> Weight {
        self.bonds.values().copied().sum()
    }

    /// The tick at which the era's post-era voting period ends.
    pub fn voting_end_tick(&self, conf: &HighwayConf) -> Tick {
        self.end_tick + conf.post_era_voting_duration_ticks()
    }
}
