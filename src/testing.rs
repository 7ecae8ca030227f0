//! In-memory fakes of the external capabilities, plus shared fixtures.
//!
//! All fakes are deterministic handles over `Rc<RefCell<_>>` state, so a test
//! keeps a clone of each capability it hands to the runtime and inspects or
//! mutates it mid-scenario.

use std::{
    cell::{Cell, RefCell},
    collections::{BTreeMap, HashMap},
    rc::Rc,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use crate::{
    config::HighwayConf,
    era::Era,
    error::FatalError,
    leaders::LeaderSequencer,
    message::{Ballot, Block, Justifications, Message, MessageHash},
    runtime::{EraRuntime, LocalValidator},
    tick::{Tick, TickDiff},
    traits::{Clock, Dag, EraStorage, ForkChoice, ForkChoiceResult, IsSynced, MessageProducer},
    validators::{ValidatorId, Weight},
};

pub(crate) const ALICE: ValidatorId = ValidatorId::new([0xA1; 32]);
pub(crate) const BOB: ValidatorId = ValidatorId::new([0xB2; 32]);
pub(crate) const CAROL: ValidatorId = ValidatorId::new([0xC3; 32]);
pub(crate) const DAN: ValidatorId = ValidatorId::new([0xD4; 32]);

/// The creator of the seeded key block; never bonded in the era under test.
const GENESIS_VALIDATOR: ValidatorId = ValidatorId::new([0xFF; 32]);

/// A conf matching the usual calendar: millisecond ticks, eras of one week,
/// booking 10 days and entropy 3 hours before an era's end, 2 days of voting.
/// Era 0 starts on 2019-12-09.
pub(crate) fn test_conf() -> HighwayConf {
    HighwayConf {
        tick_unit: Duration::from_millis(1),
        genesis_era_start: UNIX_EPOCH + Duration::from_secs(1_575_849_600),
        era_duration: Duration::from_secs(7 * 24 * 60 * 60),
        booking_duration: Duration::from_secs(10 * 24 * 60 * 60),
        entropy_duration: Duration::from_secs(3 * 60 * 60),
        post_era_voting_duration: Duration::from_secs(2 * 24 * 60 * 60),
        omega_message_time_start: 0.5,
        omega_message_time_end: 0.75,
    }
}

pub(crate) fn bonds(entries: &[(ValidatorId, u64)]) -> BTreeMap<ValidatorId, Weight> {
    entries
        .iter()
        .map(|(id, weight)| (*id, Weight(*weight)))
        .collect()
}

/// A recognizable hash for hand-built fixtures.
pub(crate) fn test_hash(tag: u8) -> MessageHash {
    MessageHash::new([tag; 32])
}

/// A hash for the `index`th block of a generated chain.
pub(crate) fn chain_hash(index: u64) -> MessageHash {
    let mut bytes = [0u8; 32];
    bytes[..8].copy_from_slice(&index.to_le_bytes());
    bytes[31] = 0xCC;
    MessageHash::new(bytes)
}

/// The genesis era with Alice, Bob and Carol bonded 3:4:5.
pub(crate) fn genesis_era(conf: &HighwayConf) -> Era {
    Era::genesis(
        conf,
        test_hash(0),
        0,
        bonds(&[(ALICE, 3), (BOB, 4), (CAROL, 5)]),
    )
}

/// A sequencer that always returns the pinned leader.
#[derive(Clone, Copy, Debug)]
pub(crate) struct FixedLeaders(pub(crate) ValidatorId);

impl LeaderSequencer for FixedLeaders {
    fn leader(&self, _round_id: Tick) -> ValidatorId {
        self.0
    }
}

#[derive(Clone, Default)]
pub(crate) struct TestDag {
    inner: Rc<RefCell<DagInner>>,
}

#[derive(Default)]
struct DagInner {
    messages: HashMap<MessageHash, Message>,
    latest: HashMap<(MessageHash, ValidatorId), MessageHash>,
    bonds: HashMap<MessageHash, BTreeMap<ValidatorId, Weight>>,
}

impl TestDag {
    pub(crate) fn new() -> TestDag {
        TestDag::default()
    }

    /// Records a message; it becomes its creator's latest in its era.
    pub(crate) fn add(&self, message: Message) {
        let mut inner = self.inner.borrow_mut();
        let key = (*message.key_block_hash(), *message.validator_id());
        inner.latest.insert(key, *message.hash());
        inner.messages.insert(*message.hash(), message);
    }

    /// Sets the bonded validator set at a block.
    pub(crate) fn set_bonds(&self, block: MessageHash, bonds: BTreeMap<ValidatorId, Weight>) {
        self.inner.borrow_mut().bonds.insert(block, bonds);
    }
}

impl Dag for TestDag {
    fn message(&self, hash: &MessageHash) -> Result<Message, FatalError> {
        self.inner
            .borrow()
            .messages
            .get(hash)
            .cloned()
            .ok_or(FatalError::MissingMessage(*hash))
    }

    fn latest_message(
        &self,
        key_block_hash: &MessageHash,
        validator: &ValidatorId,
    ) -> Result<Option<Message>, FatalError> {
        let inner = self.inner.borrow();
        Ok(inner
            .latest
            .get(&(*key_block_hash, *validator))
            .and_then(|hash| inner.messages.get(hash))
            .cloned())
    }

    fn bonds_at(&self, block: &MessageHash) -> Result<BTreeMap<ValidatorId, Weight>, FatalError> {
        self.inner
            .borrow()
            .bonds
            .get(block)
            .cloned()
            .ok_or_else(|| FatalError::InconsistentDag(format!("no bonds recorded at {}", block)))
    }
}

#[derive(Clone, Default)]
pub(crate) struct TestEraStorage {
    eras: Rc<RefCell<BTreeMap<MessageHash, Era>>>,
}

impl TestEraStorage {
    pub(crate) fn new() -> TestEraStorage {
        TestEraStorage::default()
    }

    pub(crate) fn era_count(&self) -> usize {
        self.eras.borrow().len()
    }

    pub(crate) fn contains(&self, key_block_hash: &MessageHash) -> bool {
        self.eras.borrow().contains_key(key_block_hash)
    }
}

impl EraStorage for TestEraStorage {
    fn contains_era(&self, key_block_hash: &MessageHash) -> Result<bool, FatalError> {
        Ok(self.eras.borrow().contains_key(key_block_hash))
    }

    fn add_era(&self, era: Era) -> Result<(), FatalError> {
        self.eras.borrow_mut().entry(*era.id()).or_insert(era);
        Ok(())
    }
}

#[derive(Clone)]
pub(crate) struct TestForkChoice {
    result: Rc<RefCell<ForkChoiceResult>>,
}

impl TestForkChoice {
    pub(crate) fn new(result: ForkChoiceResult) -> TestForkChoice {
        TestForkChoice {
            result: Rc::new(RefCell::new(result)),
        }
    }

    /// Points the fork choice at a new tip.
    pub(crate) fn set_tip(&self, main_parent: MessageHash) {
        self.result.borrow_mut().main_parent = main_parent;
    }
}

impl ForkChoice for TestForkChoice {
    fn from_key_block(&self, _key_block_hash: &MessageHash) -> Result<ForkChoiceResult, FatalError> {
        Ok(self.result.borrow().clone())
    }
}

/// A producer that "signs" by numbering its messages. The produced block
/// records the booking flag in its magic bit so tests can observe it.
#[derive(Clone)]
pub(crate) struct TestProducer {
    id: ValidatorId,
    counter: Rc<Cell<u64>>,
}

impl TestProducer {
    pub(crate) fn new(id: ValidatorId) -> TestProducer {
        TestProducer {
            id,
            counter: Rc::new(Cell::new(0)),
        }
    }

    fn next_hash(&self, tag: u8) -> MessageHash {
        let count = self.counter.get() + 1;
        self.counter.set(count);
        let mut bytes = [0u8; 32];
        bytes[..8].copy_from_slice(&count.to_le_bytes());
        bytes[8] = tag;
        bytes[9] = self.id.as_bytes()[0];
        bytes[31] = 0xEE;
        MessageHash::new(bytes)
    }
}

impl MessageProducer for TestProducer {
    fn block(
        &self,
        era_id: &MessageHash,
        round_id: Tick,
        main_parent: MessageHash,
        justifications: Justifications,
        is_booking_block: bool,
    ) -> Result<Block, FatalError> {
        Ok(Block {
            hash: self.next_hash(1),
            validator_id: self.id,
            round_id,
            key_block_hash: *era_id,
            main_parent,
            justifications,
            magic_bit: is_booking_block,
        })
    }

    fn ballot(
        &self,
        era_id: &MessageHash,
        round_id: Tick,
        target: MessageHash,
        justifications: Justifications,
    ) -> Result<Ballot, FatalError> {
        Ok(Ballot {
            hash: self.next_hash(2),
            validator_id: self.id,
            round_id,
            key_block_hash: *era_id,
            target,
            justifications,
        })
    }
}

#[derive(Clone)]
pub(crate) struct TestClock {
    conf: HighwayConf,
    tick: Rc<Cell<i64>>,
}

impl TestClock {
    pub(crate) fn new(conf: &HighwayConf, tick: Tick) -> TestClock {
        TestClock {
            conf: conf.clone(),
            tick: Rc::new(Cell::new(tick.value())),
        }
    }

    pub(crate) fn set(&self, tick: Tick) {
        self.tick.set(tick.value());
    }
}

impl Clock for TestClock {
    fn now(&self) -> SystemTime {
        self.conf.to_instant(Tick::new(self.tick.get()))
    }
}

#[derive(Clone, Default)]
pub(crate) struct TestSynced {
    synced: Rc<Cell<bool>>,
}

impl TestSynced {
    pub(crate) fn new(synced: bool) -> TestSynced {
        let flag = TestSynced::default();
        flag.synced.set(synced);
        flag
    }

    pub(crate) fn set(&self, synced: bool) {
        self.synced.set(synced);
    }
}

impl IsSynced for TestSynced {
    fn is_synced(&self) -> bool {
        self.synced.get()
    }
}

pub(crate) type TestRuntime<L> =
    EraRuntime<TestDag, TestEraStorage, TestForkChoice, TestProducer, TestClock, TestSynced, L>;

/// A runtime wired to fresh fakes, with handles on all of them.
pub(crate) struct TestBed<L> {
    pub(crate) conf: HighwayConf,
    pub(crate) dag: TestDag,
    pub(crate) storage: TestEraStorage,
    pub(crate) fork_choice: TestForkChoice,
    pub(crate) clock: TestClock,
    pub(crate) synced: TestSynced,
    pub(crate) runtime: TestRuntime<L>,
}

pub(crate) fn test_bed<L: LeaderSequencer>(
    conf: HighwayConf,
    era: Era,
    round_exponent: u8,
    local: Option<ValidatorId>,
    leaders: L,
) -> TestBed<L> {
    let dag = TestDag::new();
    // Seed the era's key block so the default fork choice tip resolves. Its
    // creator is never bonded, so it doesn't count as anyone's latest message.
    dag.add(Message::Block(Block {
        hash: *era.key_block_hash(),
        validator_id: GENESIS_VALIDATOR,
        round_id: era.start_tick() - TickDiff::new(1),
        key_block_hash: *era.parent_key_block_hash(),
        main_parent: test_hash(0xFE),
        justifications: Justifications::new(),
        magic_bit: false,
    }));
    let storage = TestEraStorage::new();
    let fork_choice = TestForkChoice::new(ForkChoiceResult {
        main_parent: *era.key_block_hash(),
        justifications: Justifications::new(),
    });
    let clock = TestClock::new(&conf, era.start_tick());
    let synced = TestSynced::new(true);
    let local = local.map(|id| LocalValidator {
        id,
        producer: TestProducer::new(id),
    });
    let runtime = EraRuntime::new(
        conf.clone(),
        era,
        round_exponent,
        local,
        leaders,
        dag.clone(),
        storage.clone(),
        fork_choice.clone(),
        clock.clone(),
        synced.clone(),
    );
    TestBed {
        conf,
        dag,
        storage,
        fork_choice,
        clock,
        synced,
        runtime,
    }
}

/// Builds a main chain of blocks by `validator` over the whole era at the
/// given cadence, records it in the dag, and returns the blocks in order. The
/// last block sits at or just past the era's end, i.e. it is the switch block.
pub(crate) fn build_chain<F: Fn(usize) -> bool>(
    dag: &TestDag,
    era: &Era,
    step: TickDiff,
    validator: ValidatorId,
    magic_bit: F,
) -> Vec<Block> {
    let mut blocks = Vec::new();
    let mut parent = *era.key_block_hash();
    let mut tick = era.start_tick() + step;
    let mut index = 0u64;
    loop {
        let block = Block {
            hash: chain_hash(index),
            validator_id: validator,
            round_id: tick,
            key_block_hash: *era.id(),
            main_parent: parent,
            justifications: Justifications::new(),
            magic_bit: magic_bit(index as usize),
        };
        dag.add(Message::Block(block.clone()));
        parent = block.hash;
        blocks.push(block);
        if tick >= era.end_tick() {
            return blocks;
        }
        tick = tick + step;
        index += 1;
    }
}
