//! Voter record queries.
//!
//! A voter spans two tables: the `voters` row and its `voter_producers`
//! snapshot rows. Upserts never delete the parent row, so the cascade on
//! `voter_producers` only fires on an explicit delete.

use rusqlite::{Connection, OptionalExtension};

use accrue_types::{Asset, Name, Symbol, VotedProducerInfo, VotedProducerMap, Voter};

use crate::queries::parse_i128;
use crate::Result;

/// Point lookup by owner, snapshots included.
pub fn get(conn: &Connection, owner: &Name) -> Result<Option<Voter>> {
    let row = conn
        .query_row(
            "SELECT votes, symbol, unclaimed_rewards, claimed_rewards, updated_at
             FROM voters WHERE owner = ?1",
            [owner.as_str()],
            |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, i64>(3)?,
                    row.get::<_, i64>(4)?,
                ))
            },
        )
        .optional()?;

    let Some((votes, symbol, unclaimed, claimed, updated_at)) = row else {
        return Ok(None);
    };
    let symbol: Symbol = symbol.parse()?;

    Ok(Some(Voter {
        owner: owner.clone(),
        votes,
        producers: snapshots(conn, owner)?,
        unclaimed_rewards: Asset::new(unclaimed, symbol.clone()),
        claimed_rewards: Asset::new(claimed, symbol),
        updated_at: updated_at as u64,
    }))
}

/// All voters, ordered by owner.
pub fn list(conn: &Connection) -> Result<Vec<Voter>> {
    let mut stmt = conn.prepare("SELECT owner FROM voters ORDER BY owner")?;
    let owners = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let mut voters = Vec::with_capacity(owners.len());
    for owner in owners {
        let owner = Name::new(owner)?;
        if let Some(voter) = get(conn, &owner)? {
            voters.push(voter);
        }
    }
    Ok(voters)
}

/// Snapshot map of one voter.
pub fn snapshots(conn: &Connection, owner: &Name) -> Result<VotedProducerMap> {
    let mut stmt = conn.prepare(
        "SELECT producer, last_rewards_per_vote FROM voter_producers
         WHERE voter = ?1 ORDER BY producer",
    )?;
    let rows = stmt
        .query_map([owner.as_str()], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let mut map = VotedProducerMap::new();
    for (producer, last) in rows {
        map.insert(
            Name::new(producer)?,
            VotedProducerInfo {
                last_rewards_per_vote: parse_i128(&last)?,
            },
        );
    }
    Ok(map)
}

/// Insert or update a voter and replace its snapshot rows.
pub fn upsert(conn: &Connection, voter: &Voter) -> Result<()> {
    conn.execute(
        "INSERT INTO voters (owner, votes, symbol, unclaimed_rewards, claimed_rewards, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         ON CONFLICT(owner) DO UPDATE SET
             votes = excluded.votes,
             symbol = excluded.symbol,
             unclaimed_rewards = excluded.unclaimed_rewards,
             claimed_rewards = excluded.claimed_rewards,
             updated_at = excluded.updated_at",
        rusqlite::params![
            voter.owner.as_str(),
            voter.votes,
            voter.unclaimed_rewards.symbol.to_string(),
            voter.unclaimed_rewards.amount,
            voter.claimed_rewards.amount,
            voter.updated_at as i64,
        ],
    )?;

    conn.execute(
        "DELETE FROM voter_producers WHERE voter = ?1",
        [voter.owner.as_str()],
    )?;

    let mut stmt = conn.prepare(
        "INSERT INTO voter_producers (voter, producer, last_rewards_per_vote)
         VALUES (?1, ?2, ?3)",
    )?;
    for (producer, info) in &voter.producers {
        stmt.execute(rusqlite::params![
            voter.owner.as_str(),
            producer.as_str(),
            info.last_rewards_per_vote.to_string(),
        ])?;
    }
    Ok(())
}

/// Number of voters holding a snapshot of `producer`.
pub fn count_for_producer(conn: &Connection, producer: &Name) -> Result<u64> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM voter_producers WHERE producer = ?1",
        [producer.as_str()],
        |row| row.get(0),
    )?;
    Ok(count as u64)
}
