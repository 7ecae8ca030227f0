
use std::collections::BTreeSet;

use rand::Rng;
use tracing::{info, trace, warn};

use crate::{
    agenda::{Action, Agenda},
    boundaries::EraBoundaries,
    classifier::{MessageClass, MessageClassifier},
    config::HighwayConf,
    era::Era,
    error::{EraError, FatalError, ProtocolViolation},
    event::{HandlerOutcome, HighwayEvent},
    leaders::{era_seed, LeaderSequencer, StakeLeaders},
    message::{Block, Justifications, Message},
    tick::{next_round, round_id, round_length, Tick},
    traits::{Clock, Dag, EraStorage, ForkChoice, IsSynced, MessageProducer},
    validators::ValidatorId,
};

/// The identity and signer of the validator this node runs as.
pub struct LocalValidator<P> {
    pub id: ValidatorId,
    pub producer: P,
}

/// A single-era deterministic state machine.
///
/// The runtime owns its immutable [`Era`], classifies and validates incoming
/// messages against the era's leader schedule, schedules its own future work
/// on a tick agenda, and emits protocol events as a write-only log. It has no
/// internal concurrency: the outer scheduler delivers one message or due
/// action at a time, and every handler synchronously returns the events and
/// agenda additions it produced.
///
/// Constructed without a [`LocalValidator`] the runtime is a passive
/// observer: it still validates messages and constructs child eras, but never
/// emits messages of its own.
pub struct EraRuntime<D, S, F, P, C, Y, L = StakeLeaders> {
    conf: HighwayConf,
    era: Era,
    boundaries: EraBoundaries,
    leaders: L,
    round_exponent: u8,
    local: Option<LocalValidator<P>>,
    dag: D,
    era_storage: S,
    fork_choice: F,
    clock: C,
    synced: Y,
}

impl<D, S, F, P, C, Y, L> EraRuntime<D, S, F, P, C, Y, L>
where
    D: Dag,
    S: EraStorage,
    F: ForkChoice,
    P: MessageProducer,
    C: Clock,
    Y: IsSynced,
    L: LeaderSequencer,
{
    /// Creates the runtime for one era.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        conf: HighwayConf,
        era: Era,
        round_exponent: u8,
        local: Option<LocalValidator<P>>,
        leaders: L,
        dag: D,
        era_storage: S,
        fork_choice: F,
        clock: C,
        synced: Y,
    ) -> Self {
        let boundaries = EraBoundaries::new(&conf, &era);
        EraRuntime {
            conf,
            era,
            boundaries,
            leaders,
            round_exponent,
            local,
            dag,
            era_storage,
            fork_choice,
            clock,
            synced,
        }
    }

    /// The era this runtime drives.
    pub fn era(&self) -> &Era {
        &self.era
    }

    /// The era's boundary predicates.
    pub fn boundaries(&self) -> &EraBoundaries {
        &self.boundaries
    }

    /// The round exponent this runtime schedules with.
    pub fn round_exponent(&self) -> u8 {
        self.round_exponent
    }

    /// Computes the initial agenda, called once when the runtime starts.
    ///
    /// Unbonded observers, and runtimes started after the era's voting period
    /// has passed, get an empty agenda. Otherwise a single `StartRound` is
    /// scheduled at the next round tick.
    pub fn init_agenda(&self) -> Agenda {
        let mut agenda = Agenda::empty();
        if !self.is_bonded_local() {
            return agenda;
        }
        let now = self.now();
        if now >= self.era.voting_end_tick(&self.conf) {
            info!(era = %self.era.id(), "era is already past its voting period; not scheduling");
            return agenda;
        }
        let after = self.era.start_tick().max(now);
        let round_id = next_round(self.era.start_tick(), self.round_exponent, after);
        agenda.schedule(round_id, Action::StartRound { round_id });
        agenda
    }

    /// Classifies the message's role in its round.
    pub fn classify(&self, message: &Message) -> Result<MessageClass, FatalError> {
        self.classifier().classify(message)
    }

    /// Checks a received message against the protocol rules.
    ///
    /// A rejection carries the human-readable reason; nothing mutates either
    /// way.
    pub fn validate(&self, message: &Message) -> Result<(), EraError> {
        if let Some(local) = &self.local {
            if local.id == *message.validator_id() {
                // The relay never hands back what we created ourselves, so
                // another node must be signing with our key.
                return Err(ProtocolViolation::Doppelganger.into());
            }
        }
        if message.key_block_hash() != self.era.id() {
            return Err(ProtocolViolation::WrongEra.into());
        }
        if !self.era.is_bonded(message.validator_id()) {
            return Err(ProtocolViolation::NotBonded.into());
        }
        let classifier = self.classifier();
        match message {
            Message::Block(block) => {
                if self.leaders.leader(block.round_id) != block.validator_id {
                    return Err(ProtocolViolation::NotFromLeader.into());
                }
                if !self.on_round_lattice(block.round_id) {
                    return Err(ProtocolViolation::InvalidRoundId.into());
                }
                if classifier.has_other_lambda_message_in_same_round(message)? {
                    return Err(ProtocolViolation::DuplicateLambda.into());
                }
            }
            Message::Ballot(ballot) => {
                if !self.on_round_lattice(ballot.round_id) {
                    return Err(ProtocolViolation::InvalidRoundId.into());
                }
                // A leader ballot that cites its own earlier message in the
                // round is a follow-up and exempt from the duplicate check.
                if classifier.is_lambda_like_ballot(ballot)?
                    && classifier.has_other_lambda_message_in_same_round(message)?
                {
                    return Err(ProtocolViolation::DuplicateLambda.into());
                }
            }
        }
        Ok(())
    }

    /// Applies a validated message to the runtime.
    pub fn handle_message(&self, message: &Message) -> Result<HandlerOutcome, FatalError> {
        let mut outcome = HandlerOutcome::new();
        if !self.synced.is_synced() {
            // Historical replay: the dag layer records the message, but the
            // runtime produces no effects for it.
            trace!(message = %message.hash(), "ignoring message during initial sync");
            return Ok(outcome);
        }
        if let Some(local) = &self.local {
            if local.id == *message.validator_id() {
                return Err(FatalError::OwnMessage(*message.hash()));
            }
        }
        match self.classify(message)? {
            MessageClass::LambdaBlock => self.handle_lambda_message(message, &mut outcome)?,
            MessageClass::LambdaLikeBallot => {
                self.handle_lambda_like_ballot(message, &mut outcome)?
            }
            MessageClass::LambdaResponse | MessageClass::Omega | MessageClass::Other => (),
        }
        if let Message::Block(block) = message {
            self.maybe_create_era(block, &mut outcome)?;
        }
        Ok(outcome)
    }

    /// Executes one due agenda action.
    pub fn handle_agenda<R: Rng>(
        &self,
        action: Action,
        rng: &mut R,
    ) -> Result<HandlerOutcome, FatalError> {
        match action {
            Action::StartRound { round_id } => self.handle_start_round(round_id, rng),
            Action::CreateOmegaMessage { round_id } => self.handle_create_omega(round_id),
        }
    }

    fn handle_start_round<R: Rng>(
        &self,
        round_id: Tick,
        rng: &mut R,
    ) -> Result<HandlerOutcome, FatalError> {
        let mut outcome = HandlerOutcome::new();
        let now = self.now();
        let length = round_length(self.round_exponent);
        if now > round_id + length {
            // The scheduler slipped past the whole round. Skip ahead: no
            // lambda and no omega for the missed round, just the next start.
            let next = next_round(self.era.start_tick(), self.round_exponent, now);
            warn!(%round_id, %now, %next, "missed a round; skipping ahead");
            outcome.schedule(next, Action::StartRound { round_id: next });
            return Ok(outcome);
        }
        if self.synced.is_synced() {
            if let Some(local) = &self.local {
                if self.era.is_bonded(&local.id) && self.leaders.leader(round_id) == local.id {
                    self.create_lambda_message(local, round_id, &mut outcome)?;
                }
            }
        }
        let next = next_round(self.era.start_tick(), self.round_exponent, round_id);
        outcome.schedule(next, Action::StartRound { round_id: next });
        let omega_tick = self.omega_tick(round_id, rng);
        outcome.schedule(omega_tick, Action::CreateOmegaMessage { round_id });
        Ok(outcome)
    }

    /// The leader's turn: produce the round's lambda message.
    ///
    /// Within the active period this is a block; the first leader block at or
    /// past the era's end doubles as the switch block. Once the fork choice
    /// tip already crossed the era's end, the leader votes with a lambda-like
    /// ballot instead.
    fn create_lambda_message(
        &self,
        local: &LocalValidator<P>,
        round_id: Tick,
        outcome: &mut HandlerOutcome,
    ) -> Result<(), FatalError> {
        let fork_choice = self.fork_choice.from_key_block(self.era.id())?;
        let tip = match self.dag.message(&fork_choice.main_parent)? {
            Message::Block(block) => block,
            Message::Ballot(_) => {
                return Err(FatalError::InconsistentDag(format!(
                    "fork choice tip {} is not a block",
                    fork_choice.main_parent
                )));
            }
        };
        let switch_block_exists = tip.round_id >= self.era.end_tick();
        if round_id < self.era.end_tick() || !switch_block_exists {
            let is_booking = self.boundaries.is_booking_boundary(tip.round_id, round_id);
            let block = local.producer.block(
                self.era.id(),
                round_id,
                fork_choice.main_parent,
                fork_choice.justifications,
                is_booking,
            )?;
            info!(%round_id, block = %block.hash, "proposing lambda block");
            outcome.emit(HighwayEvent::CreatedLambdaMessage(Message::Block(block)));
        } else {
            // Post-era voting: the era is closed, vote for the tip instead.
            let ballot = local.producer.ballot(
                self.era.id(),
                round_id,
                fork_choice.main_parent,
                fork_choice.justifications,
            )?;
            trace!(%round_id, "voting with a lambda-like ballot");
            outcome.emit(HighwayEvent::CreatedLambdaMessage(Message::Ballot(ballot)));
        }
        Ok(())
    }

    fn handle_create_omega(&self, round_id: Tick) -> Result<HandlerOutcome, FatalError> {
        let mut outcome = HandlerOutcome::new();
        if !self.synced.is_synced() {
            return Ok(outcome);
        }
        let local = match &self.local {
            Some(local) if self.era.is_bonded(&local.id) => local,
            _ => return Ok(outcome),
        };
        let fork_choice = self.fork_choice.from_key_block(self.era.id())?;
        let ballot = local.producer.ballot(
            self.era.id(),
            round_id,
            fork_choice.main_parent,
            fork_choice.justifications,
        )?;
        outcome.emit(HighwayEvent::CreatedOmegaMessage(ballot));
        Ok(outcome)
    }

    /// Answers the round leader's lambda message with a ballot citing the
    /// lambda and the local validator's latest own message, and nothing else.
    fn handle_lambda_message(
        &self,
        message: &Message,
        outcome: &mut HandlerOutcome,
    ) -> Result<(), FatalError> {
        let local = match &self.local {
            Some(local) if self.era.is_bonded(&local.id) => local,
            _ => return Ok(()),
        };
        let now = self.now();
        let current_round = round_id(self.era.start_tick(), self.round_exponent, now);
        if message.round_id() != current_round {
            trace!(
                round_id = %message.round_id(),
                %current_round,
                "not answering a lambda message outside the current round"
            );
            return Ok(());
        }
        let mut justifications = Justifications::new();
        justifications
            .entry(*message.validator_id())
            .or_insert_with(BTreeSet::new)
            .insert(*message.hash());
        if let Some(own) = self.dag.latest_message(self.era.id(), &local.id)? {
            justifications
                .entry(local.id)
                .or_insert_with(BTreeSet::new)
                .insert(*own.hash());
        }
        let ballot = local.producer.ballot(
            self.era.id(),
            message.round_id(),
            *message.hash(),
            justifications,
        )?;
        outcome.emit(HighwayEvent::CreatedLambdaResponse(ballot));
        Ok(())
    }

    /// The voting-period counterpart of [`Self::handle_lambda_message`]: the
    /// leader's first ballot of a voting round is answered like a lambda
    /// block. Kept separate so the voting-period rules can evolve on their
    /// own.
    fn handle_lambda_like_ballot(
        &self,
        message: &Message,
        outcome: &mut HandlerOutcome,
    ) -> Result<(), FatalError> {
        self.handle_lambda_message(message, outcome)
    }

    /// If the block crosses the era's end against its main parent, constructs
    /// the child era. Handling the same switch block twice yields the
    /// `CreatedEra` event at most once.
    fn maybe_create_era(&self, block: &Block, outcome: &mut HandlerOutcome) -> Result<(), FatalError> {
        let parent = self.dag.message(&block.main_parent)?;
        if !self
            .boundaries
            .is_switch_boundary(parent.round_id(), block.round_id)
        {
            return Ok(());
        }
        let child = self.create_child_era(block)?;
        if self.era_storage.contains_era(child.id())? {
            trace!(era = %child.id(), "child era already known");
            return Ok(());
        }
        self.era_storage.add_era(child.clone())?;
        info!(
            era = %child.id(),
            start = %child.start_tick(),
            booking_block = %child.booking_block_hash(),
            "created child era"
        );
        outcome.emit(HighwayEvent::CreatedEra(child));
        Ok(())
    }

    /// Builds the child era from a switch block: locates the booking and key
    /// blocks on the main-chain ancestry, collects the magic bits between
    /// them, and derives the child's leader seed.
    fn create_child_era(&self, switch_block: &Block) -> Result<Era, FatalError> {
        let start_tick = self.era.end_tick();
        let end_tick = start_tick + self.conf.era_duration_ticks();
        let booking_boundary = end_tick - self.conf.booking_duration_ticks();
        let key_boundary = booking_boundary + self.conf.entropy_duration_ticks();

        // Collect the main-chain ancestry from the switch block down to the
        // block that crosses the booking boundary.
        let mut chain = vec![switch_block.clone()];
        loop {
            let last = chain.last().expect("chain is never empty");
            if last.round_id < booking_boundary {
                // The whole chain is below the boundary, which only happens
                // with a booking interval shorter than one era; the switch
                // block itself stands in for the booking block.
                break;
            }
            let parent = match self.dag.message(&last.main_parent)? {
                Message::Block(block) => block,
                Message::Ballot(_) => {
                    return Err(FatalError::InconsistentDag(format!(
                        "main parent {} of {} is not a block",
                        last.main_parent, last.hash
                    )));
                }
            };
            if parent.round_id < booking_boundary {
                break; // `last` is the booking block.
            }
            chain.push(parent);
        }
        chain.reverse();

        let booking_block = &chain[0];
        let key_index = chain
            .iter()
            .position(|block| block.round_id >= key_boundary)
            .unwrap_or(chain.len() - 1);
        let key_block = &chain[key_index];
        let magic_bits: Vec<bool> = chain[..=key_index]
            .iter()
            .map(|block| block.magic_bit)
            .collect();
        let leader_seed = era_seed(self.era.leader_seed(), &magic_bits);
        let bonds = self.dag.bonds_at(&key_block.hash)?;
        Ok(Era::new(
            start_tick,
            end_tick,
            key_block.hash,
            booking_block.hash,
            leader_seed,
            *self.era.id(),
            bonds,
        ))
    }

    /// Draws the omega delay for a round: a uniform integer tick offset
    /// within the configured fractional window of the round length.
    fn omega_tick<R: Rng>(&self, round_id: Tick, rng: &mut R) -> Tick {
        let length = round_length(self.round_exponent).value() as f64;
        let lo = (self.conf.omega_message_time_start * length).ceil() as i64;
        let hi = (self.conf.omega_message_time_end * length).ceil() as i64;
        let offset = if hi > lo { rng.gen_range(lo, hi) } else { lo };
        round_id + crate::tick::TickDiff::new(offset)
    }

    fn now(&self) -> Tick {
        self.conf.to_ticks(self.clock.now())
    }

    fn is_bonded_local(&self) -> bool {
        self.local
            .as_ref()
            .map_or(false, |local| self.era.is_bonded(&local.id))
    }

    fn on_round_lattice(&self, round_id: Tick) -> bool {
        let length = round_length(self.round_exponent).value();
        round_id >= self.era.start_tick()
            && (round_id - self.era.start_tick()).value() % length == 0
    }

    fn classifier(&self) -> MessageClassifier<D, L> {
        MessageClassifier {
            era: &self.era,
            leaders: &self.leaders,
            dag: &self.dag,
        }
    }
}
