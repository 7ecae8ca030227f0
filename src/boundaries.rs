use itertools::iterate;

use crate::{
    config::HighwayConf,
    era::Era,
    tick::{Tick, TickDiff},
};

/// The booking, key and switch boundary predicates of one era.
///
/// The boundary sets are computed once per era; the predicates themselves are
/// pure functions of two message timestamps and never read the DAG.
#[derive(Clone, Debug)]
pub struct EraBoundaries {
    end_tick: Tick,
    /// Booking boundaries inside the era, earliest first. Crossing one of
    /// these on the main chain picks a child era's booking block.
    booking: Vec<Tick>,
    entropy: TickDiff,
}

impl EraBoundaries {
    /// Computes the boundary sets for the given era.
    pub fn new(conf: &HighwayConf, era: &Era) -> EraBoundaries {
        let era_len = conf.era_duration_ticks();
        // The latest relevant boundary is the child era's: its end is one era
        // length past ours. Earlier eras' boundaries follow at era-length
        // steps until they leave the interval.
        let latest = era.end_tick() + era_len - conf.booking_duration_ticks();
        let mut booking: Vec<Tick> = iterate(latest, |boundary| *boundary - era_len)
            .take_while(|boundary| *boundary >= era.start_tick())
            .filter(|boundary| *boundary < era.end_tick())
            .collect();
        booking.reverse();
        EraBoundaries {
            end_tick: era.end_tick(),
            booking,
            entropy: conf.entropy_duration_ticks(),
        }
    }

    /// The booking boundaries inside the era, earliest first.
    pub fn booking_boundaries(&self) -> &[Tick] {
        &self.booking
    }

    /// The key boundaries: each booking boundary shifted by the entropy
    /// duration.
    pub fn key_boundaries(&self) -> impl Iterator<Item = Tick> + '_ {
        let entropy = self.entropy;
        self.booking.iter().map(move |boundary| *boundary + entropy)
    }

    /// Returns whether some booking boundary `b` satisfies
    /// `parent < b <= child`.
    pub fn is_booking_boundary(&self, parent: Tick, child: Tick) -> bool {
        Self::crosses(self.booking.iter().copied(), parent, child)
    }

    /// Returns whether some key boundary `b` satisfies `parent < b <= child`.
    pub fn is_key_boundary(&self, parent: Tick, child: Tick) -> bool {
        Self::crosses(self.key_boundaries(), parent, child)
    }

    /// Returns whether the pair crosses the era's end: `parent` strictly
    /// before the end, `child` at or after it. A block timestamped exactly at
    /// the end is the switch block only if its parent is strictly before.
    pub fn is_switch_boundary(&self, parent: Tick, child: Tick) -> bool {
        parent < self.end_tick && self.end_tick <= child
    }

    fn crosses<I: IntoIterator<Item = Tick>>(boundaries: I, parent: Tick, child: Tick) -> bool {
        boundaries
            .into_iter()
            .any(|boundary| parent < boundary && boundary <= child)
    }
}
