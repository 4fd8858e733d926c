//! Producer record queries.

use rusqlite::{Connection, OptionalExtension, Row};

use accrue_types::{Asset, Name, Producer, Symbol};

use crate::queries::parse_i128;
use crate::Result;

const PRODUCER_COLUMNS: &str = "owner, is_registered, symbol, total_rewards, allocating_rewards,
     allocated_rewards, votes, rewards_per_vote, updated_at";

/// A raw producer row.
#[derive(Debug)]
pub struct ProducerRow {
    pub owner: String,
    pub is_registered: bool,
    pub symbol: String,
    pub total_rewards: i64,
    pub allocating_rewards: i64,
    pub allocated_rewards: i64,
    pub votes: i64,
    pub rewards_per_vote: String,
    pub updated_at: u64,
}

impl ProducerRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            owner: row.get(0)?,
            is_registered: row.get(1)?,
            symbol: row.get(2)?,
            total_rewards: row.get(3)?,
            allocating_rewards: row.get(4)?,
            allocated_rewards: row.get(5)?,
            votes: row.get(6)?,
            rewards_per_vote: row.get(7)?,
            updated_at: row.get::<_, i64>(8)? as u64,
        })
    }

    fn into_producer(self) -> Result<Producer> {
        let symbol: Symbol = self.symbol.parse()?;
        Ok(Producer {
            owner: Name::new(self.owner)?,
            is_registered: self.is_registered,
            total_rewards: Asset::new(self.total_rewards, symbol.clone()),
            allocating_rewards: Asset::new(self.allocating_rewards, symbol.clone()),
            allocated_rewards: Asset::new(self.allocated_rewards, symbol),
            votes: self.votes,
            rewards_per_vote: parse_i128(&self.rewards_per_vote)?,
            updated_at: self.updated_at,
        })
    }
}

/// Point lookup by owner.
pub fn get(conn: &Connection, owner: &Name) -> Result<Option<Producer>> {
    let row = conn
        .query_row(
            &format!("SELECT {PRODUCER_COLUMNS} FROM producers WHERE owner = ?1"),
            [owner.as_str()],
            ProducerRow::from_row,
        )
        .optional()?;
    row.map(ProducerRow::into_producer).transpose()
}

/// Insert or update a producer record.
pub fn upsert(conn: &Connection, producer: &Producer) -> Result<()> {
    conn.execute(
        "INSERT INTO producers (owner, is_registered, symbol, total_rewards, allocating_rewards,
                                allocated_rewards, votes, rewards_per_vote, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
         ON CONFLICT(owner) DO UPDATE SET
             is_registered = excluded.is_registered,
             symbol = excluded.symbol,
             total_rewards = excluded.total_rewards,
             allocating_rewards = excluded.allocating_rewards,
             allocated_rewards = excluded.allocated_rewards,
             votes = excluded.votes,
             rewards_per_vote = excluded.rewards_per_vote,
             updated_at = excluded.updated_at",
        rusqlite::params![
            producer.owner.as_str(),
            producer.is_registered,
            producer.total_rewards.symbol.to_string(),
            producer.total_rewards.amount,
            producer.allocating_rewards.amount,
            producer.allocated_rewards.amount,
            producer.votes,
            producer.rewards_per_vote.to_string(),
            producer.updated_at as i64,
        ],
    )?;
    Ok(())
}

/// All producers, ordered by owner.
pub fn list(conn: &Connection, registered_only: bool) -> Result<Vec<Producer>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {PRODUCER_COLUMNS} FROM producers
         WHERE is_registered = 1 OR ?1 = 0 ORDER BY owner"
    ))?;
    let rows = stmt
        .query_map([registered_only], ProducerRow::from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    rows.into_iter().map(ProducerRow::into_producer).collect()
}
