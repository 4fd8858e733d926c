//! Integration test: ledger-wide accounting under random operation streams.
//!
//! Drives seeded random sequences of votes, producer-set changes, deposits
//! and claims, and after every step checks:
//! 1. `total = allocating + allocated` for every producer
//! 2. `rewards_per_vote` never decreases
//! 3. Every producer's votes equal the summed weight of its backers
//! 4. Voter balances account for exactly what producers allocated
//! 5. Payouts equal what voters claimed
//! 6. The global total equals the sum of producer totals
//!
//! After a final settlement the undistributed remainder is bounded by
//! unattributed zero-vote deposits plus one unit per settlement. The same
//! stream replayed against SQLite must end in identical records.

use std::collections::BTreeMap;

use accrue_db::queries::{global, producers, transfers, voters};
use accrue_db::{SqliteOutbox, SqliteStore};
use accrue_ledger::{
    Clock, ErrorKind, LedgerConfig, LedgerError, ManualClock, MemoryStore, RecordStore,
    RewardLedger, Signers, TokenTransfer, TransferLog,
};
use accrue_types::{Asset, GlobalRewardState, Name, Producer, Symbol, Voter};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rusqlite::Connection;

const VOTERS: [&str; 5] = ["alice", "bob", "carol", "dave", "erin"];
/// `bpe` never registers; votes may still land on it.
const PRODUCERS: [&str; 5] = ["bpa", "bpb", "bpc", "bpd", "bpe"];
const STEPS: usize = 400;

fn name(s: &str) -> Name {
    Name::new(s).expect("valid name")
}

fn flon() -> Symbol {
    Symbol::new(4, "FLON").expect("valid symbol")
}

fn signers(accounts: &[&str]) -> Signers {
    accounts.iter().map(|s| name(s)).collect()
}

fn config() -> LedgerConfig {
    LedgerConfig::new(name("flon"), name("flon.token"))
}

#[derive(Clone, Debug)]
enum Op {
    AddVote(&'static str, i64),
    SubVote(&'static str, i64),
    Vote(&'static str, Vec<&'static str>),
    Deposit(&'static str, i64),
    Claim(&'static str),
    ClaimFor(&'static str, &'static str),
}

impl Op {
    fn voter(&self) -> Option<&'static str> {
        match self {
            Op::AddVote(v, _) | Op::SubVote(v, _) | Op::Vote(v, _) | Op::Claim(v) => Some(*v),
            Op::ClaimFor(_, v) => Some(*v),
            Op::Deposit(..) => None,
        }
    }
}

fn random_op(rng: &mut StdRng) -> Op {
    let voter = VOTERS[rng.gen_range(0..VOTERS.len())];
    let producer = PRODUCERS[rng.gen_range(0..PRODUCERS.len())];
    match rng.gen_range(0..10) {
        0 | 1 => Op::AddVote(voter, rng.gen_range(1..5_000)),
        2 => Op::SubVote(voter, rng.gen_range(1..3_000)),
        3 | 4 => {
            let mut list: Vec<&'static str> = PRODUCERS
                .iter()
                .copied()
                .filter(|_| rng.gen_bool(0.4))
                .collect();
            if list.len() > 1 && rng.gen_ratio(1, 10) {
                list.reverse();
            }
            Op::Vote(voter, list)
        }
        5..=7 => Op::Deposit(producer, rng.gen_range(1..1_000_000)),
        8 => Op::Claim(voter),
        _ => Op::ClaimFor("flon", voter),
    }
}

fn apply<S, T, C>(ledger: &mut RewardLedger<S, T, C>, op: &Op) -> accrue_ledger::Result<()>
where
    S: RecordStore,
    T: TokenTransfer,
    C: Clock,
{
    match op {
        Op::AddVote(v, n) => ledger.add_vote(&signers(&["flon", *v]), &name(v), *n),
        Op::SubVote(v, n) => ledger.sub_vote(&signers(&["flon", *v]), &name(v), *n),
        Op::Vote(v, list) => {
            let list: Vec<Name> = list.iter().map(|p| name(p)).collect();
            ledger.vote_for_producers(&signers(&["flon", *v]), &name(v), &list)
        }
        Op::Deposit(p, amount) => ledger.on_deposit(
            &signers(&["flon.token"]),
            &name(p),
            &Asset::new(*amount, flon()),
        ),
        Op::Claim(v) => ledger.claim(&signers(&[*v]), &name(v)).map(|_| ()),
        Op::ClaimFor(c, v) => ledger
            .claim_for(&signers(&[*c]), &name(c), &name(v))
            .map(|_| ()),
    }
}

/// Errors a well-formed random stream may legitimately hit.
fn expected_rejection(err: &LedgerError) -> bool {
    matches!(err.kind(), ErrorKind::Validation | ErrorKind::NotFound)
}

/// Full ledger contents, comparable across backends.
#[derive(Debug, PartialEq, Eq)]
struct Snapshot {
    global: GlobalRewardState,
    producers: Vec<Producer>,
    voters: Vec<Voter>,
    paid_out: i64,
}

trait Backend {
    fn apply(&mut self, op: &Op) -> accrue_ledger::Result<()>;
    fn snapshot(&self) -> Snapshot;
}

struct MemoryBackend {
    ledger: RewardLedger<MemoryStore, TransferLog, ManualClock>,
}

impl MemoryBackend {
    fn new() -> Self {
        let mut ledger = RewardLedger::new(
            MemoryStore::new(),
            TransferLog::new(),
            ManualClock::new(1_000),
            config(),
        );
        ledger.init(&signers(&["flon"]), &flon()).expect("init");
        for p in &PRODUCERS[..4] {
            ledger
                .register_producer(&signers(&[*p]), &name(p))
                .expect("register");
        }
        Self { ledger }
    }
}

impl Backend for MemoryBackend {
    fn apply(&mut self, op: &Op) -> accrue_ledger::Result<()> {
        apply(&mut self.ledger, op)
    }

    fn snapshot(&self) -> Snapshot {
        let store = self.ledger.store();
        Snapshot {
            global: self
                .ledger
                .global_state()
                .expect("global")
                .expect("initialized"),
            producers: store.producers().cloned().collect(),
            voters: store.voters().cloned().collect(),
            paid_out: self
                .ledger
                .transfer()
                .transfers()
                .iter()
                .map(|t| t.quantity.amount)
                .sum(),
        }
    }
}

struct SqliteBackend {
    conn: Connection,
    clock: ManualClock,
}

impl SqliteBackend {
    fn new() -> Self {
        let mut backend = Self {
            conn: accrue_db::open_memory().expect("open db"),
            clock: ManualClock::new(1_000),
        };
        backend
            .run(|l| l.init(&signers(&["flon"]), &flon()))
            .expect("init");
        for p in &PRODUCERS[..4] {
            backend
                .run(|l| l.register_producer(&signers(&[*p]), &name(p)))
                .expect("register");
        }
        backend
    }

    fn run(
        &mut self,
        op: impl FnOnce(
            &mut RewardLedger<SqliteStore<'_>, SqliteOutbox<'_>, &ManualClock>,
        ) -> accrue_ledger::Result<()>,
    ) -> accrue_ledger::Result<()> {
        let tx = self
            .conn
            .transaction()
            .map_err(|e| LedgerError::Storage(e.to_string()))?;
        {
            let mut ledger = RewardLedger::new(
                SqliteStore::new(&tx),
                SqliteOutbox::new(&tx),
                &self.clock,
                config(),
            );
            op(&mut ledger)?;
        }
        tx.commit().map_err(|e| LedgerError::Storage(e.to_string()))
    }
}

impl Backend for SqliteBackend {
    fn apply(&mut self, op: &Op) -> accrue_ledger::Result<()> {
        self.run(|l| apply(l, op))
    }

    fn snapshot(&self) -> Snapshot {
        Snapshot {
            global: global::get(&self.conn).expect("global").expect("initialized"),
            producers: producers::list(&self.conn, false).expect("producers"),
            voters: voters::list(&self.conn).expect("voters"),
            paid_out: transfers::list(&self.conn)
                .expect("transfers")
                .iter()
                .map(|t| t.quantity.amount)
                .sum(),
        }
    }
}

/// Running tallies the invariants are checked against.
#[derive(Default)]
struct Tally {
    deposited: BTreeMap<String, i64>,
    unattributed: BTreeMap<String, i64>,
    settlements: BTreeMap<String, i64>,
    last_rewards_per_vote: BTreeMap<String, i128>,
}

impl Tally {
    /// Record what `op` settled or deposited, given the state before it.
    ///
    /// Settlements count even when the call was rejected: a rolled-back
    /// claim leaves its sub-unit earnings pending in `allocating_rewards`.
    fn record(&mut self, op: &Op, prior: &Snapshot, applied: bool) {
        if let Op::Deposit(p, amount) = op {
            if !applied {
                return;
            }
            let votes = prior
                .producers
                .iter()
                .find(|r| r.owner.as_str() == *p)
                .map_or(0, |r| r.votes);
            *self.deposited.entry(p.to_string()).or_default() += amount;
            if votes == 0 {
                *self.unattributed.entry(p.to_string()).or_default() += amount;
            }
            return;
        }
        let Some(v) = op.voter() else { return };
        let backed: Vec<String> = prior
            .voters
            .iter()
            .find(|r| r.owner.as_str() == v)
            .map(|r| r.producers.keys().map(|k| k.to_string()).collect())
            .unwrap_or_default();
        for p in backed {
            *self.settlements.entry(p).or_default() += 1;
        }
    }

    fn check(&mut self, snap: &Snapshot) {
        let mut weight: BTreeMap<String, i64> = BTreeMap::new();
        for v in &snap.voters {
            assert!(v.votes >= 0, "{} has negative votes", v.owner);
            for p in v.producers.keys() {
                *weight.entry(p.to_string()).or_default() += v.votes;
            }
        }

        for p in &snap.producers {
            let owner = p.owner.to_string();
            assert_eq!(
                p.total_rewards.amount,
                p.allocating_rewards.amount + p.allocated_rewards.amount,
                "balance split broken for {owner}"
            );
            let last = self.last_rewards_per_vote.entry(owner.clone()).or_default();
            assert!(p.rewards_per_vote >= *last, "accumulator of {owner} decreased");
            *last = p.rewards_per_vote;

            assert_eq!(p.votes, weight.get(&owner).copied().unwrap_or(0), "votes of {owner}");
            assert_eq!(
                p.total_rewards.amount,
                self.deposited.get(&owner).copied().unwrap_or(0)
            );
            assert!(
                p.allocating_rewards.amount >= self.unattributed.get(&owner).copied().unwrap_or(0),
                "{owner} paid out unattributed funds"
            );
        }

        let allocated: i64 = snap.producers.iter().map(|p| p.allocated_rewards.amount).sum();
        let credited: i64 = snap
            .voters
            .iter()
            .map(|v| v.unclaimed_rewards.amount + v.claimed_rewards.amount)
            .sum();
        assert_eq!(allocated, credited);

        let claimed: i64 = snap.voters.iter().map(|v| v.claimed_rewards.amount).sum();
        assert_eq!(snap.paid_out, claimed);

        let total: i64 = snap.producers.iter().map(|p| p.total_rewards.amount).sum();
        assert_eq!(snap.global.total_rewards.amount, total);
    }
}

fn run_stream(backend: &mut dyn Backend, seed: u64) -> Tally {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut tally = Tally::default();
    tally.check(&backend.snapshot());

    for step in 0..STEPS {
        let op = random_op(&mut rng);
        let prior = backend.snapshot();
        let applied = match backend.apply(&op) {
            Ok(()) => true,
            Err(err) if expected_rejection(&err) => false,
            Err(err) => panic!("step {step}: {op:?} failed unexpectedly: {err}"),
        };
        tally.record(&op, &prior, applied);
        tally.check(&backend.snapshot());
    }

    // Final settlement: everyone with weight claims.
    for v in VOTERS {
        let op = Op::Claim(v);
        let prior = backend.snapshot();
        let applied = match backend.apply(&op) {
            Ok(()) => true,
            Err(err) if expected_rejection(&err) => false,
            Err(err) => panic!("final claim for {v} failed: {err}"),
        };
        tally.record(&op, &prior, applied);
        tally.check(&backend.snapshot());
    }
    tally
}

#[test]
fn accounting_holds_across_random_streams() {
    for seed in [1_u64, 7, 42, 2024, 0xACC2] {
        let mut backend = MemoryBackend::new();
        let tally = run_stream(&mut backend, seed);
        let snap = backend.snapshot();

        for p in &snap.producers {
            let owner = p.owner.to_string();
            let unattributed = tally.unattributed.get(&owner).copied().unwrap_or(0);
            let settlements = tally.settlements.get(&owner).copied().unwrap_or(0);
            let deposits = tally.deposited.get(&owner).map_or(0, |_| 1);
            let backed_now = snap.voters.iter().any(|v| {
                v.votes > 0 && v.producers.contains_key(&p.owner)
            });
            if backed_now {
                // Residual is rounding dust plus whatever arrived with no votes.
                let rounding = p.allocating_rewards.amount - unattributed;
                assert!(
                    rounding <= settlements + deposits,
                    "seed {seed}: {owner} keeps {rounding} beyond rounding bound"
                );
            }
        }
    }
}

#[test]
fn sqlite_replays_memory_exactly() {
    for seed in [3_u64, 99] {
        let mut memory = MemoryBackend::new();
        let mut sqlite = SqliteBackend::new();
        run_stream(&mut memory, seed);
        run_stream(&mut sqlite, seed);
        assert_eq!(memory.snapshot(), sqlite.snapshot(), "seed {seed}");
    }
}

#[test]
fn add_then_sub_round_trips_votes() {
    let mut backend = MemoryBackend::new();
    for op in [
        Op::AddVote("alice", 700),
        Op::Vote("alice", vec!["bpa", "bpc"]),
        Op::AddVote("bob", 300),
        Op::Vote("bob", vec!["bpc"]),
        Op::Deposit("bpc", 12_345),
    ] {
        backend.apply(&op).expect("setup");
    }
    let before = backend.snapshot();

    backend.apply(&Op::AddVote("alice", 250)).expect("add");
    backend.apply(&Op::SubVote("alice", 250)).expect("sub");
    let after = backend.snapshot();

    for (b, a) in before.producers.iter().zip(&after.producers) {
        assert_eq!(b.votes, a.votes, "votes of {}", b.owner);
    }
    let alice = |s: &Snapshot| {
        s.voters
            .iter()
            .find(|v| v.owner.as_str() == "alice")
            .map(|v| v.votes)
    };
    assert_eq!(alice(&before), alice(&after));
}
