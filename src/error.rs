use thiserror::Error;

use crate::message::MessageHash;

/// A protocol-rule rejection of a received message.
///
/// Rejections are local: no state mutates and no event is emitted. The outer
/// layer may drop or penalize the sender, but must never treat this as fatal.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ProtocolViolation {
    #[error("The block is coming from a doppelganger.")]
    Doppelganger,
    #[error("The message does not belong to this era.")]
    WrongEra,
    #[error("The message is not coming from a validator bonded in this era.")]
    NotBonded,
    #[error("The block is not coming from the leader of the round.")]
    NotFromLeader,
    #[error("The round id is not a valid round start tick.")]
    InvalidRoundId,
    #[error("The leader has already sent a lambda message in this round.")]
    DuplicateLambda,
}

/// An internal failure that must halt consumption of this runtime.
///
/// These indicate a configuration, relay or storage bug; the caller is
/// expected to surface the error and stop feeding the runtime. The node may
/// continue with its other era runtimes.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum FatalError {
    #[error("the local validator's own message {0} was delivered back into the runtime")]
    OwnMessage(MessageHash),
    #[error("message {0} is missing from the dag")]
    MissingMessage(MessageHash),
    #[error("inconsistent dag: {0}")]
    InconsistentDag(String),
    #[error("era storage failure: {0}")]
    Storage(String),
    #[error("message producer failure: {0}")]
    Producer(String),
}

/// Either of the two failure regimes of [`crate::EraRuntime::validate`]: a
/// soft rejection carrying the human-readable reason, or a hard internal
/// failure.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum EraError {
    #[error(transparent)]
    Rejected(#[from] ProtocolViolation),
    #[error(transparent)]
    Fatal(#[from] FatalError),
}
