//! Record store seam and per-call changeset.
//!
//! A [`RecordStore`] offers point lookups by key and one atomic
//! [`RecordStore::commit`]. Entry points never write through to the store
//! while they run: every record they touch is loaded once into a
//! [`Changeset`], mutated there, and handed back as a single [`WriteBatch`]
//! only after the whole call succeeded. A failing call drops its changeset,
//! which is the rollback.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

use accrue_types::{GlobalRewardState, Name, Producer, Symbol, Timestamp, Voter};

use crate::Result;

/// Keyed, ordered persistent record store.
pub trait RecordStore {
    /// The singleton global state, if `init` has run.
    fn load_global(&self) -> Result<Option<GlobalRewardState>>;

    /// Point lookup of a producer record.
    fn load_producer(&self, owner: &Name) -> Result<Option<Producer>>;

    /// Point lookup of a voter record, including its snapshot map.
    fn load_voter(&self, owner: &Name) -> Result<Option<Voter>>;

    /// Apply every write in `batch` atomically.
    fn commit(&mut self, batch: WriteBatch) -> Result<()>;
}

/// All record upserts produced by one successful call.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WriteBatch {
    pub global: Option<GlobalRewardState>,
    pub producers: Vec<Producer>,
    pub voters: Vec<Voter>,
}

impl WriteBatch {
    pub fn is_empty(&self) -> bool {
        self.global.is_none() && self.producers.is_empty() && self.voters.is_empty()
    }
}

/// In-memory [`RecordStore`] backed by ordered maps.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    global: Option<GlobalRewardState>,
    producers: BTreeMap<Name, Producer>,
    voters: BTreeMap<Name, Voter>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Iterate over every producer record in key order.
    pub fn producers(&self) -> impl Iterator<Item = &Producer> {
        self.producers.values()
    }

    /// Iterate over every voter record in key order.
    pub fn voters(&self) -> impl Iterator<Item = &Voter> {
        self.voters.values()
    }
}

impl RecordStore for MemoryStore {
    fn load_global(&self) -> Result<Option<GlobalRewardState>> {
        Ok(self.global.clone())
    }

    fn load_producer(&self, owner: &Name) -> Result<Option<Producer>> {
        Ok(self.producers.get(owner).cloned())
    }

    fn load_voter(&self, owner: &Name) -> Result<Option<Voter>> {
        Ok(self.voters.get(owner).cloned())
    }

    fn commit(&mut self, batch: WriteBatch) -> Result<()> {
        if let Some(global) = batch.global {
            self.global = Some(global);
        }
        for producer in batch.producers {
            self.producers.insert(producer.owner.clone(), producer);
        }
        for voter in batch.voters {
            self.voters.insert(voter.owner.clone(), voter);
        }
        Ok(())
    }
}

/// Mutable access to producer records during settlement.
pub trait ProducerAccounts {
    /// The producer record for `owner`, materialized with zero balances if
    /// it does not exist yet.
    fn producer_mut(&mut self, owner: &Name) -> Result<&mut Producer>;

    /// Timestamp of the current call.
    fn now(&self) -> Timestamp;
}

/// Working copy of every record one call touches.
pub struct Changeset<'s, S: RecordStore + ?Sized> {
    store: &'s S,
    symbol: Symbol,
    now: Timestamp,
    global: Option<GlobalRewardState>,
    producers: BTreeMap<Name, Producer>,
    voters: BTreeMap<Name, Voter>,
}

impl<'s, S: RecordStore + ?Sized> Changeset<'s, S> {
    /// Start a changeset over `store` for a call at `now`.
    pub fn new(store: &'s S, symbol: Symbol, now: Timestamp) -> Self {
        Self {
            store,
            symbol,
            now,
            global: None,
            producers: BTreeMap::new(),
            voters: BTreeMap::new(),
        }
    }

    /// The core symbol new records are denominated in.
    pub fn symbol(&self) -> &Symbol {
        &self.symbol
    }

    /// Stage a new global state.
    pub fn set_global(&mut self, global: GlobalRewardState) {
        self.global = Some(global);
    }

    /// The producer record for `owner`, or `None` if it was never created.
    pub fn find_producer_mut(&mut self, owner: &Name) -> Result<Option<&mut Producer>> {
        match self.producers.entry(owner.clone()) {
            Entry::Occupied(entry) => Ok(Some(entry.into_mut())),
            Entry::Vacant(entry) => match self.store.load_producer(owner)? {
                Some(producer) => Ok(Some(entry.insert(producer))),
                None => Ok(None),
            },
        }
    }

    /// Take a copy of the voter record out of the changeset. Changes become
    /// part of the batch only once handed back through [`Self::put_voter`].
    pub fn voter(&mut self, owner: &Name) -> Result<Option<Voter>> {
        if let Some(voter) = self.voters.get(owner) {
            return Ok(Some(voter.clone()));
        }
        self.store.load_voter(owner)
    }

    /// The voter record for `owner`, or a fresh one.
    pub fn voter_or_new(&mut self, owner: &Name) -> Result<Voter> {
        Ok(self
            .voter(owner)?
            .unwrap_or_else(|| Voter::new(owner.clone(), &self.symbol, self.now)))
    }

    /// Stage a voter record.
    pub fn put_voter(&mut self, voter: Voter) {
        self.voters.insert(voter.owner.clone(), voter);
    }

    /// Every staged record, ready for [`RecordStore::commit`].
    pub fn into_batch(self) -> WriteBatch {
        WriteBatch {
            global: self.global,
            producers: self.producers.into_values().collect(),
            voters: self.voters.into_values().collect(),
        }
    }
}

impl<S: RecordStore + ?Sized> ProducerAccounts for Changeset<'_, S> {
    fn producer_mut(&mut self, owner: &Name) -> Result<&mut Producer> {
        match self.producers.entry(owner.clone()) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => {
                let producer = match self.store.load_producer(owner)? {
                    Some(producer) => producer,
                    None => {
                        tracing::debug!(producer = %owner, "materializing producer record");
                        Producer::new(owner.clone(), &self.symbol, self.now)
                    }
                };
                Ok(entry.insert(producer))
            }
        }
    }

    fn now(&self) -> Timestamp {
        self.now
    }
}
