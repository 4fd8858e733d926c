//! Ledger seams backed by SQLite.

use rusqlite::Connection;

use accrue_ledger::{LedgerError, RecordStore, TokenTransfer, WriteBatch};
use accrue_types::{Asset, GlobalRewardState, Name, Producer, Voter};

use crate::queries::{global, producers, transfers, voters};

/// [`RecordStore`] over a borrowed connection.
///
/// `commit` runs inside a savepoint. The caller must hold a transaction on
/// `conn` that also covers the paired [`SqliteOutbox`]; otherwise a claim's
/// queued payout is committed before the voter update that settles it.
pub struct SqliteStore<'c> {
    conn: &'c Connection,
}

impl<'c> SqliteStore<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    fn apply(&self, batch: &WriteBatch) -> crate::Result<()> {
        if let Some(state) = &batch.global {
            global::put(self.conn, state)?;
        }
        for producer in &batch.producers {
            producers::upsert(self.conn, producer)?;
        }
        for voter in &batch.voters {
            voters::upsert(self.conn, voter)?;
        }
        Ok(())
    }
}

impl RecordStore for SqliteStore<'_> {
    fn load_global(&self) -> accrue_ledger::Result<Option<GlobalRewardState>> {
        Ok(global::get(self.conn)?)
    }

    fn load_producer(&self, owner: &Name) -> accrue_ledger::Result<Option<Producer>> {
        Ok(producers::get(self.conn, owner)?)
    }

    fn load_voter(&self, owner: &Name) -> accrue_ledger::Result<Option<Voter>> {
        Ok(voters::get(self.conn, owner)?)
    }

    fn commit(&mut self, batch: WriteBatch) -> accrue_ledger::Result<()> {
        if batch.is_empty() {
            return Ok(());
        }
        self.conn
            .execute_batch("SAVEPOINT ledger_commit")
            .map_err(crate::DbError::from)?;

        match self.apply(&batch) {
            Ok(()) => {
                self.conn
                    .execute_batch("RELEASE ledger_commit")
                    .map_err(crate::DbError::from)?;
                tracing::trace!(
                    producers = batch.producers.len(),
                    voters = batch.voters.len(),
                    "batch committed"
                );
                Ok(())
            }
            Err(e) => {
                if let Err(rollback) = self
                    .conn
                    .execute_batch("ROLLBACK TO ledger_commit; RELEASE ledger_commit")
                {
                    tracing::error!("savepoint rollback failed: {rollback}");
                }
                Err(e.into())
            }
        }
    }
}

/// [`TokenTransfer`] that queues payouts in `outbound_transfers`.
///
/// Share one caller-held transaction with the [`SqliteStore`] so the queued
/// row and the record writes commit or roll back together.
pub struct SqliteOutbox<'c> {
    conn: &'c Connection,
}

impl<'c> SqliteOutbox<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }
}

impl TokenTransfer for SqliteOutbox<'_> {
    fn transfer(&mut self, to: &Name, quantity: &Asset, memo: &str) -> accrue_ledger::Result<()> {
        let id = transfers::enqueue(self.conn, to, quantity, memo)
            .map_err(|e| LedgerError::Transfer(e.to_string()))?;
        tracing::debug!(id, to = %to, quantity = %quantity, "payout queued");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use accrue_types::Symbol;

    fn flon() -> Symbol {
        Symbol::new(4, "FLON").expect("symbol")
    }

    fn name(s: &str) -> Name {
        Name::new(s).expect("name")
    }

    #[test]
    fn test_commit_batch() {
        let conn = crate::open_memory().expect("open");
        let mut store = SqliteStore::new(&conn);
        let batch = WriteBatch {
            global: Some(GlobalRewardState::new(&flon())),
            producers: vec![Producer::new(name("bp1"), &flon(), 1)],
            voters: vec![Voter::new(name("alice"), &flon(), 1)],
        };
        store.commit(batch).expect("commit");

        assert!(store.load_global().expect("global").is_some());
        assert!(store.load_producer(&name("bp1")).expect("producer").is_some());
        assert!(store.load_voter(&name("alice")).expect("voter").is_some());
    }

    #[test]
    fn test_failed_commit_rolls_back() {
        let conn = crate::open_memory().expect("open");
        let mut store = SqliteStore::new(&conn);

        let mut broken = Producer::new(name("bp2"), &flon(), 1);
        broken.total_rewards.amount = 10;
        let batch = WriteBatch {
            global: None,
            producers: vec![Producer::new(name("bp1"), &flon(), 1), broken],
            voters: vec![],
        };
        let err = store.commit(batch).expect_err("check constraint");
        assert_eq!(err.kind(), accrue_ledger::ErrorKind::Storage);
        assert!(store.load_producer(&name("bp1")).expect("load").is_none());
    }

    #[test]
    fn test_commit_inside_outer_transaction() {
        let mut conn = crate::open_memory().expect("open");
        {
            let tx = conn.transaction().expect("tx");
            let mut store = SqliteStore::new(&tx);
            store
                .commit(WriteBatch {
                    global: Some(GlobalRewardState::new(&flon())),
                    ..WriteBatch::default()
                })
                .expect("commit");
            // dropped without commit
        }
        assert!(global::get(&conn).expect("get").is_none());
    }

    #[test]
    fn test_outbox_queues_transfer() {
        let conn = crate::open_memory().expect("open");
        let mut outbox = SqliteOutbox::new(&conn);
        outbox
            .transfer(&name("alice"), &Asset::new(25, flon()), "voted rewards")
            .expect("transfer");

        let pending = transfers::pending(&conn).expect("pending");
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].recipient, name("alice"));
        assert_eq!(pending[0].memo, "voted rewards");
    }

    #[test]
    fn test_outbox_and_store_share_transaction() {
        let mut conn = crate::open_memory().expect("open");
        {
            let tx = conn.transaction().expect("tx");
            let mut outbox = SqliteOutbox::new(&tx);
            let mut store = SqliteStore::new(&tx);
            outbox
                .transfer(&name("alice"), &Asset::new(25, flon()), "voted rewards")
                .expect("transfer");
            let mut broken = Producer::new(name("bp1"), &flon(), 1);
            broken.total_rewards.amount = 10;
            store
                .commit(WriteBatch {
                    global: None,
                    producers: vec![broken],
                    voters: vec![],
                })
                .expect_err("check constraint");
            // caller abandons the claim
        }
        assert!(transfers::list(&conn).expect("list").is_empty());

        let tx = conn.transaction().expect("tx");
        SqliteOutbox::new(&tx)
            .transfer(&name("alice"), &Asset::new(25, flon()), "voted rewards")
            .expect("transfer");
        SqliteStore::new(&tx)
            .commit(WriteBatch {
                voters: vec![Voter::new(name("alice"), &flon(), 1)],
                ..WriteBatch::default()
            })
            .expect("commit");
        tx.commit().expect("tx commit");

        assert_eq!(transfers::pending(&conn).expect("pending").len(), 1);
        assert!(SqliteStore::new(&conn)
            .load_voter(&name("alice"))
            .expect("load")
            .is_some());
    }
}
