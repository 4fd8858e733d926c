//! Global state queries.

use rusqlite::{Connection, OptionalExtension};

use accrue_types::{Asset, GlobalRewardState, Symbol};

use crate::Result;

/// Load the singleton global state.
pub fn get(conn: &Connection) -> Result<Option<GlobalRewardState>> {
    let row = conn
        .query_row(
            "SELECT symbol, total_rewards FROM global_state WHERE id = 1",
            [],
            |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)),
        )
        .optional()?;

    match row {
        Some((symbol, total)) => {
            let symbol: Symbol = symbol.parse()?;
            Ok(Some(GlobalRewardState {
                total_rewards: Asset::new(total, symbol),
            }))
        }
        None => Ok(None),
    }
}

/// Insert or overwrite the singleton global state.
pub fn put(conn: &Connection, state: &GlobalRewardState) -> Result<()> {
    conn.execute(
        "INSERT INTO global_state (id, symbol, total_rewards) VALUES (1, ?1, ?2)
         ON CONFLICT(id) DO UPDATE SET symbol = excluded.symbol,
                                       total_rewards = excluded.total_rewards",
        rusqlite::params![
            state.core_symbol().to_string(),
            state.total_rewards.amount
        ],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_global() {
        let conn = crate::open_memory().expect("open");
        assert!(get(&conn).expect("get").is_none());
    }

    #[test]
    fn test_put_and_update_global() {
        let conn = crate::open_memory().expect("open");
        let symbol = Symbol::new(4, "FLON").expect("symbol");
        let mut state = GlobalRewardState::new(&symbol);
        put(&conn, &state).expect("insert");

        state.total_rewards.amount = 1234;
        put(&conn, &state).expect("update");

        let loaded = get(&conn).expect("get").expect("present");
        assert_eq!(loaded, state);
    }
}
