use std::{
    collections::{BTreeMap, BTreeSet},
    fmt::{self, Debug, Display},
};

use datasize::DataSize;
use hex_fmt::HexFmt;
use serde::{Deserialize, Serialize};

use crate::{tick::Tick, validators::ValidatorId};

/// The hash identifying a consensus message.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, DataSize)]
pub struct MessageHash([u8; MessageHash::LENGTH]);

impl MessageHash {
    /// The number of bytes in a message hash.
    pub const LENGTH: usize = 32;

    /// Returns the hash with the given bytes.
    pub const fn new(bytes: [u8; MessageHash::LENGTH]) -> Self {
        MessageHash(bytes)
    }

    /// Returns the raw bytes of the hash.
    pub fn as_bytes(&self) -> &[u8; MessageHash::LENGTH] {
        &self.0
    }
}

impl Display for MessageHash {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:10}", HexFmt(&self.0))
    }
}

impl Debug for MessageHash {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "MessageHash({:10})", HexFmt(&self.0))
    }
}

/// The messages a sender cites, by their creator. Every cited creator must be
/// bonded in the message's era.
pub type Justifications = BTreeMap<ValidatorId, BTreeSet<MessageHash>>;

/// A proposal block: the payload-carrying message a round's leader emits.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    /// The hash of the signed message.
    pub hash: MessageHash,
    /// The creator of the block.
    pub validator_id: ValidatorId,
    /// The start tick of the round the block was created in, which doubles as
    /// the block's timestamp.
    pub round_id: Tick,
    /// The key block of the era this block belongs to.
    pub key_block_hash: MessageHash,
    /// The block this one builds on.
    pub main_parent: MessageHash,
    /// The messages the creator has seen.
    pub justifications: Justifications,
    /// A random bit; the bits between the booking and key blocks seed the
    /// child era's leader schedule.
    pub magic_bit: bool,
}

/// A ballot: a vote citing a block, without a payload of its own.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ballot {
    /// The hash of the signed message.
    pub hash: MessageHash,
    /// The creator of the ballot.
    pub validator_id: ValidatorId,
    /// The start tick of the round the ballot was created in.
    pub round_id: Tick,
    /// The key block of the era this ballot belongs to.
    pub key_block_hash: MessageHash,
    /// The block this ballot votes for.
    pub target: MessageHash,
    /// The messages the creator has seen.
    pub justifications: Justifications,
}

/// A consensus message. The enum discriminant is the wire-level message type.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Message {
    Block(Block),
    Ballot(Ballot),
}

impl Message {
    /// The hash of the message.
    pub fn hash(&self) -> &MessageHash {
        match self {
            Message::Block(block) => &block.hash,
            Message::Ballot(ballot) => &ballot.hash,
        }
    }

    /// The creator of the message.
    pub fn validator_id(&self) -> &ValidatorId {
        match self {
            Message::Block(block) => &block.validator_id,
            Message::Ballot(ballot) => &ballot.validator_id,
        }
    }

    /// The round the message was created in. Message timestamps are round ids.
    pub fn round_id(&self) -> Tick {
        match self {
            Message::Block(block) => block.round_id,
            Message::Ballot(ballot) => ballot.round_id,
        }
    }

    /// The key block identifying the message's era.
    pub fn key_block_hash(&self) -> &MessageHash {
        match self {
            Message::Block(block) => &block.key_block_hash,
            Message::Ballot(ballot) => &ballot.key_block_hash,
        }
    }

    /// All cited messages, by creator.
    pub fn justifications(&self) -> &Justifications {
        match self {
            Message::Block(block) => &block.justifications,
            Message::Ballot(ballot) => &ballot.justifications,
        }
    }

    /// The hashes the message cites from the given creator.
    pub fn justifications_of<'a>(
        &'a self,
        validator: &ValidatorId,
    ) -> impl Iterator<Item = &'a MessageHash> {
        self.justifications().get(validator).into_iter().flatten()
    }

    /// Returns whether this is a block.
    pub fn is_block(&self) -> bool {
        matches!(self, Message::Block(_))
    }

    /// Returns the block, if this is one.
    pub fn as_block(&self) -> Option<&Block> {
        match self {
            Message::Block(block) => Some(block),
            Message::Ballot(_) => None,
        }
    }

    /// Returns the ballot, if this is one.
    pub fn as_ballot(&self) -> Option<&Ballot> {
        match self {
            Message::Block(_) => None,
            Message::Ballot(ballot) => Some(ballot),
        }
    }
}

impl From<Block> for Message {
    fn from(block: Block) -> Message {
        Message::Block(block)
    }
}

impl From<Ballot> for Message {
    fn from(ballot: Ballot) -> Message {
        Message::Ballot(ballot)
    }
}
