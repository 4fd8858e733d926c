//! Outbound transfer queue.
//!
//! Claims enqueue payouts here inside the same transaction as the voter
//! update. Delivery to the token ledger happens elsewhere and flips `sent`.

use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use accrue_types::{Asset, Name, Symbol};

use crate::Result;

/// A queued payout.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundTransfer {
    pub id: i64,
    pub recipient: Name,
    pub quantity: Asset,
    pub memo: String,
    pub created_at: u64,
    pub sent: bool,
}

/// Queue a payout and return its id.
pub fn enqueue(conn: &Connection, recipient: &Name, quantity: &Asset, memo: &str) -> Result<i64> {
    conn.execute(
        "INSERT INTO outbound_transfers (recipient, amount, symbol, memo) VALUES (?1, ?2, ?3, ?4)",
        rusqlite::params![
            recipient.as_str(),
            quantity.amount,
            quantity.symbol.to_string(),
            memo
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Payouts not yet delivered, oldest first.
pub fn pending(conn: &Connection) -> Result<Vec<OutboundTransfer>> {
    query(
        conn,
        "SELECT id, recipient, amount, symbol, memo, created_at, sent
         FROM outbound_transfers WHERE sent = 0 ORDER BY id",
    )
}

/// Every payout ever queued, oldest first.
pub fn list(conn: &Connection) -> Result<Vec<OutboundTransfer>> {
    query(
        conn,
        "SELECT id, recipient, amount, symbol, memo, created_at, sent
         FROM outbound_transfers ORDER BY id",
    )
}

/// Mark a payout as delivered. Returns `false` if the id is unknown or
/// already sent.
pub fn mark_sent(conn: &Connection, id: i64) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE outbound_transfers SET sent = 1 WHERE id = ?1 AND sent = 0",
        [id],
    )?;
    Ok(changed > 0)
}

fn query(conn: &Connection, sql: &str) -> Result<Vec<OutboundTransfer>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, i64>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, i64>(5)?,
                row.get::<_, bool>(6)?,
            ))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    rows.into_iter()
        .map(|(id, recipient, amount, symbol, memo, created_at, sent)| {
            let symbol: Symbol = symbol.parse()?;
            Ok(OutboundTransfer {
                id,
                recipient: Name::new(recipient)?,
                quantity: Asset::new(amount, symbol),
                memo,
                created_at: created_at as u64,
                sent,
            })
        })
        .collect()
}
