use std::convert::identity;

use blake2::{
    digest::{Input, VariableOutput},
    VarBlake2b,
};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::{
    era::Era,
    tick::Tick,
    validators::{ValidatorId, Weight},
};

/// Selects the leader of each round.
///
/// The trait exists so tests can pin a leader; production code uses
/// [`StakeLeaders`].
pub trait LeaderSequencer {
    /// Returns the leader of the round starting at `round_id`.
    fn leader(&self, round_id: Tick) -> ValidatorId;
}

/// Stake-weighted pseudo-random leader selection for one era.
///
/// Each round id is hashed together with the era's seed into a weight unit in
/// `[1, total_stake]`, and the validator owning that unit's cumulative-stake
/// interval leads the round. Bonds are enumerated in canonical (id) order so
/// all nodes agree on the intervals.
#[derive(Clone, Debug)]
pub struct StakeLeaders {
    seed: u64,
    ids: Vec<ValidatorId>,
    /// Entry `i` contains the sum of the weights of validators `0` through `i`.
    cumulative: Vec<Weight>,
}

impl StakeLeaders {
    /// Creates the leader schedule for the given era.
    pub fn new(era: &Era) -> StakeLeaders {
        let mut ids = Vec::with_capacity(era.bonds().len());
        let mut cumulative = Vec::with_capacity(era.bonds().len());
        let mut sum = Weight(0);
        for (id, weight) in era.bonds() {
            if weight.is_zero() {
                continue; // A zero stake owns no weight unit.
            }
            sum = sum.checked_add(*weight).expect("total stake must be < 2^64");
            ids.push(*id);
            cumulative.push(sum);
        }
        assert!(!sum.is_zero(), "cannot select leaders with total stake 0");
        StakeLeaders {
            seed: era.leader_seed(),
            ids,
            cumulative,
        }
    }

    fn total_stake(&self) -> Weight {
        *self.cumulative.last().expect("stake list cannot be empty")
    }
}

impl LeaderSequencer for StakeLeaders {
    fn leader(&self, round_id: Tick) -> ValidatorId {
        let seed = self.seed.wrapping_add(round_id.value() as u64);
        // We select a random one out of the `total_stake` weight units, starting numbering at 1.
        let r = Weight(leader_prng(self.total_stake().0, seed));
        // `binary_search` returns the first `i` with `cumulative[i] >= r`, i.e. the validator
        // who owns the randomly selected weight unit.
        let index = self.cumulative.binary_search(&r).unwrap_or_else(identity);
        self.ids[index]
    }
}

/// Returns a pseudorandom `u64` between `1` and `upper` (inclusive).
fn leader_prng(upper: u64, seed: u64) -> u64 {
    ChaCha8Rng::seed_from_u64(seed).gen_range(0, upper) + 1
}

const SEED_DOMAIN: &[u8] = b"highway-era-seed;";
const SEED_LENGTH: usize = 8;

/// Derives a child era's leader seed from the parent era's seed and the magic
/// bits of the blocks from the booking block through the key block. The hash
/// input is domain-tagged and records the bit count, so the derivation cannot
/// collide with other uses of the parent seed.
pub fn era_seed(parent_seed: u64, magic_bits: &[bool]) -> u64 {
    let mut hasher = VarBlake2b::new(SEED_LENGTH).expect("should create hasher");
    hasher.input(SEED_DOMAIN);
    hasher.input(parent_seed.to_le_bytes());
    let mut packed = vec![0u8; (magic_bits.len() + 7) / 8];
    for (i, bit) in magic_bits.iter().enumerate() {
        if *bit {
            packed[i / 8] |= 1 << (i % 8);
        }
    }
    hasher.input(&packed);
    hasher.input((magic_bits.len() as u64).to_le_bytes());
    let mut seed_bytes = [0u8; SEED_LENGTH];
    hasher.variable_result(|slice| seed_bytes.copy_from_slice(slice));
    u64::from_le_bytes(seed_bytes)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::{
        testing::{bonds, test_conf, test_hash, ALICE, BOB, CAROL},
        tick::round_length,
    };

    fn era_with(seed: u64, stakes: &[(ValidatorId, u64)]) -> Era {
        let conf = test_conf();
        Era::new(
            conf.genesis_era_start_tick(),
            conf.genesis_era_end_tick(),
            test_hash(0),
            test_hash(0),
            seed,
            test_hash(0),
            bonds(stakes),
        )
    }

    #[test]
    fn two_sequencers_agree_on_every_round() {
        let era = era_with(42, &[(ALICE, 3), (BOB, 4), (CAROL, 5)]);
        let first = StakeLeaders::new(&era);
        let second = StakeLeaders::new(&era);
        let start = era.start_tick();
        for k in 0..500i64 {
            let round_id = start + round_length(14) * k;
            assert_eq!(first.leader(round_id), second.leader(round_id));
        }
    }

    #[test]
    fn leader_frequency_tracks_stake() {
        let era = era_with(7, &[(ALICE, 1), (BOB, 2), (CAROL, 7)]);
        let leaders = StakeLeaders::new(&era);
        let mut counts: HashMap<ValidatorId, u64> = HashMap::new();
        let rounds = 10_000i64;
        for k in 0..rounds {
            let round_id = era.start_tick() + round_length(14) * k;
            *counts.entry(leaders.leader(round_id)).or_insert(0) += 1;
        }
        // With 10k samples the observed share should be within a couple of
        // percentage points of the stake share.
        let share = |id: &ValidatorId| *counts.get(id).unwrap_or(&0) as f64 / rounds as f64;
        assert!((share(&ALICE) - 0.1).abs() < 0.03, "{}", share(&ALICE));
        assert!((share(&BOB) - 0.2).abs() < 0.03, "{}", share(&BOB));
        assert!((share(&CAROL) - 0.7).abs() < 0.03, "{}", share(&CAROL));
    }

    #[test]
    fn zero_stake_validators_never_lead() {
        let era = era_with(3, &[(ALICE, 0), (BOB, 1)]);
        let leaders = StakeLeaders::new(&era);
        for k in 0..100i64 {
            let round_id = era.start_tick() + round_length(10) * k;
            assert_eq!(BOB, leaders.leader(round_id));
        }
    }

    #[test]
    fn era_seed_depends_on_every_input() {
        let bits = [true, false, true];
        let seed = era_seed(1, &bits);
        assert_eq!(seed, era_seed(1, &[true, false, true]));
        assert_ne!(seed, era_seed(2, &bits));
        assert_ne!(seed, era_seed(1, &[false, false, true]));
        assert_ne!(seed, era_seed(1, &[true, false, true, false]));
        // An empty bit string is distinct from the parent seed itself.
        assert_ne!(1, era_seed(1, &[]));
    }
}
