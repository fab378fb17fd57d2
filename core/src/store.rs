//! SQLite refresh journal.
//!
//! RULE: Only store.rs talks to the database.
//! The engine calls store methods; nothing else executes SQL.

use crate::{error::CustodyResult, signal::SignalLogEntry};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

pub struct CustodyStore {
    conn: Connection,
}

/// One journaled refresh cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefreshRow {
    pub refresh_id: String,
    pub refreshed_at: String,
    pub group_count: i64,
    pub certificate_count: i64,
    pub synthetic_count: i64,
    pub balances_json: String,
    pub groups_json: String,
    pub snapshot_json: String,
}

impl CustodyStore {
    /// Open (or create) the journal database at `path`.
    pub fn open(path: &str) -> CustodyResult<Self> {
        let conn = Connection::open(path)?;
        // WAL mode: better concurrent read performance.
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn })
    }

    /// Open an in-memory database (used in tests).
    pub fn in_memory() -> CustodyResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn })
    }

    /// Apply all schema migrations in order.
    pub fn migrate(&self) -> CustodyResult<()> {
        self.conn
            .execute_batch(include_str!("../../migrations/001_foundation.sql"))?;
        Ok(())
    }

    // ── Refresh ────────────────────────────────────────────────

    /// Write a refresh row and its signals atomically.
    pub fn record_refresh(&self, row: &RefreshRow, signals: &[SignalLogEntry]) -> CustodyResult<()> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "INSERT INTO refresh
             (refresh_id, refreshed_at, group_count, certificate_count, synthetic_count,
              balances_json, groups_json, snapshot_json)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                row.refresh_id,
                row.refreshed_at,
                row.group_count,
                row.certificate_count,
                row.synthetic_count,
                row.balances_json,
                row.groups_json,
                row.snapshot_json,
            ],
        )?;
        for entry in signals {
            tx.execute(
                "INSERT INTO data_quality_signal (refresh_id, signal_type, payload)
                 VALUES (?1, ?2, ?3)",
                params![entry.refresh_id, entry.signal_type, entry.payload],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    pub fn latest_refresh(&self) -> CustodyResult<Option<RefreshRow>> {
        let row = self
            .conn
            .query_row(
                "SELECT refresh_id, refreshed_at, group_count, certificate_count, synthetic_count,
                        balances_json, groups_json, snapshot_json
                 FROM refresh
                 ORDER BY refreshed_at DESC, rowid DESC LIMIT 1",
                [],
                |row| {
                    Ok(RefreshRow {
                        refresh_id:        row.get(0)?,
                        refreshed_at:      row.get(1)?,
                        group_count:       row.get(2)?,
                        certificate_count: row.get(3)?,
                        synthetic_count:   row.get(4)?,
                        balances_json:     row.get(5)?,
                        groups_json:       row.get(6)?,
                        snapshot_json:     row.get(7)?,
                    })
                },
            )
            .optional()?;
        Ok(row)
    }

    pub fn refresh_count(&self) -> CustodyResult<i64> {
        let count = self
            .conn
            .query_row("SELECT COUNT(*) FROM refresh", [], |row| row.get(0))?;
        Ok(count)
    }

    // ── Signals ────────────────────────────────────────────────

    pub fn signals_for_refresh(&self, refresh_id: &str) -> CustodyResult<Vec<SignalLogEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, refresh_id, signal_type, payload
             FROM data_quality_signal WHERE refresh_id = ?1
             ORDER BY id ASC",
        )?;
        let entries = stmt
            .query_map(params![refresh_id], |row| {
                Ok(SignalLogEntry {
                    id:          Some(row.get(0)?),
                    refresh_id:  row.get(1)?,
                    signal_type: row.get(2)?,
                    payload:     row.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }
}
