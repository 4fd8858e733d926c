//! SQL schema definitions.

/// Complete schema for the v1 ledger database.
pub const SCHEMA_V1: &str = r#"
-- ============================================================
-- Ledger-wide state (singleton)
-- ============================================================

CREATE TABLE IF NOT EXISTS global_state (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    symbol TEXT NOT NULL,
    total_rewards INTEGER NOT NULL
);

-- ============================================================
-- Producers
-- ============================================================

CREATE TABLE IF NOT EXISTS producers (
    owner TEXT PRIMARY KEY,
    is_registered INTEGER NOT NULL DEFAULT 0,
    symbol TEXT NOT NULL,
    total_rewards INTEGER NOT NULL,
    allocating_rewards INTEGER NOT NULL,
    allocated_rewards INTEGER NOT NULL,
    votes INTEGER NOT NULL CHECK (votes >= 0),
    rewards_per_vote TEXT NOT NULL,
    updated_at INTEGER NOT NULL,
    CHECK (total_rewards = allocating_rewards + allocated_rewards)
);

-- ============================================================
-- Voters and their per-producer snapshots
-- ============================================================

CREATE TABLE IF NOT EXISTS voters (
    owner TEXT PRIMARY KEY,
    votes INTEGER NOT NULL CHECK (votes >= 0),
    symbol TEXT NOT NULL,
    unclaimed_rewards INTEGER NOT NULL,
    claimed_rewards INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS voter_producers (
    voter TEXT NOT NULL REFERENCES voters(owner) ON DELETE CASCADE,
    producer TEXT NOT NULL,
    last_rewards_per_vote TEXT NOT NULL,
    PRIMARY KEY (voter, producer)
);

-- ============================================================
-- Outbound transfers queued by claims
-- ============================================================

CREATE TABLE IF NOT EXISTS outbound_transfers (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    recipient TEXT NOT NULL,
    amount INTEGER NOT NULL CHECK (amount > 0),
    symbol TEXT NOT NULL,
    memo TEXT NOT NULL,
    created_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now')),
    sent INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_transfers_unsent ON outbound_transfers(sent) WHERE sent = 0;
"#;
