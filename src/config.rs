use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::tick::{Tick, TickDiff};

/// The tunable parameters of the Highway era calendar.
///
/// This is protocol configuration: it has to be identical on all nodes of a
/// network. Durations are wall-clock values and get converted to ticks via
/// `tick_unit`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HighwayConf {
    /// Wall-clock length of one tick, e.g. one millisecond.
    pub tick_unit: Duration,
    /// Wall-clock start of era 0.
    pub genesis_era_start: SystemTime,
    /// Fixed length of each era.
    pub era_duration: Duration,
    /// Distance before an era's end at which the child era's booking block is
    /// picked, e.g. 10 days.
    pub booking_duration: Duration,
    /// Gap between the booking block and the key block, e.g. 3 hours.
    pub entropy_duration: Duration,
    /// Length of the voting period that follows an era's end.
    pub post_era_voting_duration: Duration,
    /// Start of the window within a round where the omega ballot is scheduled,
    /// as a fraction of the round length.
    pub omega_message_time_start: f64,
    /// End of the omega window, as a fraction of the round length.
    pub omega_message_time_end: f64,
}

/// An error in the configured parameters.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("the tick unit must not be zero")]
    ZeroTickUnit,
    #[error("the era duration must be at least one tick")]
    ZeroEraDuration,
    #[error("the omega window must satisfy 0 < start < end <= 1")]
    OmegaWindow,
}

impl HighwayConf {
    /// Converts a wall-clock instant to the tick containing it.
    pub fn to_ticks(&self, instant: SystemTime) -> Tick {
        let unit = self.tick_unit.as_nanos() as i128;
        let nanos = match instant.duration_since(UNIX_EPOCH) {
            Ok(since) => since.as_nanos() as i128,
            Err(err) => -(err.duration().as_nanos() as i128),
        };
        Tick::new(nanos.div_euclid(unit) as i64)
    }

    /// Converts a tick back to the wall-clock instant at its start.
    pub fn to_instant(&self, tick: Tick) -> SystemTime {
        let unit = self.tick_unit.as_nanos() as i128;
        let nanos = i128::from(tick.value()) * unit;
        if nanos >= 0 {
            UNIX_EPOCH + Duration::from_nanos(nanos as u64)
        } else {
            UNIX_EPOCH - Duration::from_nanos((-nanos) as u64)
        }
    }

    /// Converts a wall-clock duration to whole ticks, rounding down.
    pub fn duration_to_ticks(&self, duration: Duration) -> TickDiff {
        TickDiff::new((duration.as_nanos() / self.tick_unit.as_nanos()) as i64)
    }

    /// The start tick of era 0.
    pub fn genesis_era_start_tick(&self) -> Tick {
        self.to_ticks(self.genesis_era_start)
    }

    /// The end tick of era 0.
    ///
    /// The genesis era is longer than a regular one if necessary: it is
    /// extended to a whole number of era durations so that the first child
    /// era's booking and key blocks fall inside it.
    pub fn genesis_era_end_tick(&self) -> Tick {
        let era = self.era_duration_ticks().value();
        let needed = (self.booking_duration_ticks() + self.entropy_duration_ticks()).value();
        let count = ((needed + era - 1).div_euclid(era)).max(1);
        self.genesis_era_start_tick() + self.era_duration_ticks() * count
    }

    /// The era duration in ticks.
    pub fn era_duration_ticks(&self) -> TickDiff {
        self.duration_to_ticks(self.era_duration)
    }

    /// The booking duration in ticks.
    pub fn booking_duration_ticks(&self) -> TickDiff {
        self.duration_to_ticks(self.booking_duration)
    }

    /// The entropy duration in ticks.
    pub fn entropy_duration_ticks(&self) -> TickDiff {
        self.duration_to_ticks(self.entropy_duration)
    }

    /// The post-era voting duration in ticks.
    pub fn post_era_voting_duration_ticks(&self) -> TickDiff {
        self.duration_to_ticks(self.post_era_voting_duration)
    }

    /// Checks the parameters for consistency.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_unit.as_nanos() == 0 {
            return Err(ConfigError::ZeroTickUnit);
        }
        if self.era_duration_ticks().value() <= 0 {
            return Err(ConfigError::ZeroEraDuration);
        }
        let (start, end) = (self.omega_message_time_start, self.omega_message_time_end);
        if !(0.0 < start && start < end && end <= 1.0) {
            return Err(ConfigError::OmegaWindow);
        }
        Ok(())
    }
}
