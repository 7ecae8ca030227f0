use std::collections::BTreeSet;

use crate::{
    era::Era,
    error::FatalError,
    leaders::LeaderSequencer,
    message::{Ballot, Justifications, Message, MessageHash},
    tick::Tick,
    traits::Dag,
    validators::ValidatorId,
};

/// The role a message plays in its round.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MessageClass {
    /// The leader's proposal for a round in the era's active period.
    LambdaBlock,
    /// A non-leader ballot citing exactly the round's lambda block.
    LambdaResponse,
    /// The leader's first message in a voting-period round: the ballot that
    /// stands in for a lambda block once the era has ended.
    LambdaLikeBallot,
    /// A later ballot a bonded validator casts in its own round.
    Omega,
    /// Anything else; produces no effects.
    Other,
}

/// Classifies messages against the era's leader schedule and period layout.
///
/// Classification reads only the message and the DAG view; it never consults
/// the clock, so it is deterministic for a given DAG state.
pub(crate) struct MessageClassifier<'a, D, L> {
    pub(crate) era: &'a Era,
    pub(crate) leaders: &'a L,
    pub(crate) dag: &'a D,
}

impl<'a, D: Dag, L: LeaderSequencer> MessageClassifier<'a, D, L> {
    /// Partitions the message into its round role.
    pub(crate) fn classify(&self, message: &Message) -> Result<MessageClass, FatalError> {
        match message {
            Message::Block(block) => {
                let in_active_period = block.round_id < self.era.end_tick();
                if in_active_period && self.leaders.leader(block.round_id) == block.validator_id {
                    Ok(MessageClass::LambdaBlock)
                } else {
                    Ok(MessageClass::Other)
                }
            }
            Message::Ballot(ballot) => {
                if self.is_lambda_like_ballot(ballot)? {
                    Ok(MessageClass::LambdaLikeBallot)
                } else if self.is_lambda_response(ballot)? {
                    Ok(MessageClass::LambdaResponse)
                } else if self.era.is_bonded(&ballot.validator_id) {
                    Ok(MessageClass::Omega)
                } else {
                    Ok(MessageClass::Other)
                }
            }
        }
    }

    /// Returns whether the ballot is the voting-period counterpart of a
    /// lambda block: sent by the round's leader, in a round at or past the
    /// era's end, without citing an own message from the same round.
    pub(crate) fn is_lambda_like_ballot(&self, ballot: &Ballot) -> Result<bool, FatalError> {
        if ballot.round_id < self.era.end_tick() {
            return Ok(false);
        }
        if self.leaders.leader(ballot.round_id) != ballot.validator_id {
            return Ok(false);
        }
        let cites_own_round = self.cites_own_round(
            &ballot.validator_id,
            ballot.round_id,
            &ballot.justifications,
        )?;
        Ok(!cites_own_round)
    }

    /// Returns whether the ballot is a non-leader vote for exactly the
    /// round's lambda block.
    fn is_lambda_response(&self, ballot: &Ballot) -> Result<bool, FatalError> {
        if self.leaders.leader(ballot.round_id) == ballot.validator_id {
            return Ok(false);
        }
        match self.dag.message(&ballot.target)? {
            Message::Block(target) => Ok(target.round_id == ballot.round_id
                && self.leaders.leader(target.round_id) == target.validator_id),
            Message::Ballot(_) => Ok(false),
        }
    }

    /// Returns whether the message cites a message by its own creator from
    /// the same round.
    pub(crate) fn has_justification_in_own_round(
        &self,
        message: &Message,
    ) -> Result<bool, FatalError> {
        self.cites_own_round(
            message.validator_id(),
            message.round_id(),
            message.justifications(),
        )
    }

    fn cites_own_round(
        &self,
        validator: &ValidatorId,
        round_id: Tick,
        justifications: &Justifications,
    ) -> Result<bool, FatalError> {
        if let Some(hashes) = justifications.get(validator) {
            for hash in hashes {
                if self.dag.message(hash)?.round_id() == round_id {
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }

    /// Returns whether the creator already has a different lambda message in
    /// the message's round, observed through the DAG: the walk covers the
    /// creator's cited own messages and the DAG's latest message by the
    /// creator, staying within the round and the era.
    pub(crate) fn has_other_lambda_message_in_same_round(
        &self,
        message: &Message,
    ) -> Result<bool, FatalError> {
        let creator = message.validator_id();
        let round_id = message.round_id();
        let mut queue: Vec<MessageHash> = message.justifications_of(creator).copied().collect();
        if let Some(latest) = self.dag.latest_message(self.era.id(), creator)? {
            if latest.hash() != message.hash() {
                queue.push(*latest.hash());
            }
        }
        let mut seen: BTreeSet<MessageHash> = queue.iter().copied().collect();
        while let Some(hash) = queue.pop() {
            let prior = self.dag.message(&hash)?;
            if prior.round_id() < round_id || prior.key_block_hash() != message.key_block_hash() {
                continue;
            }
            if prior.round_id() == round_id && self.is_lambda_message(&prior)? {
                return Ok(true);
            }
            for cited in prior.justifications_of(creator) {
                if seen.insert(*cited) {
                    queue.push(*cited);
                }
            }
        }
        Ok(false)
    }

    /// Returns whether the message is the leader's canonical message of its
    /// round: a block by the round leader, or a lambda-like ballot.
    fn is_lambda_message(&self, message: &Message) -> Result<bool, FatalError> {
        match message {
            Message::Block(block) => Ok(self.leaders.leader(block.round_id) == block.validator_id),
            Message::Ballot(ballot) => self.is_lambda_like_ballot(ballot),
        }
    }
}
