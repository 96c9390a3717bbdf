// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::config::Settings;
use crate::error::{PersistContext, Result as LedgerResult};
use crate::models::{Account, DebitCreditLine, LedgerRow, Transaction};
use anyhow::{Context, Result};
use directories::ProjectDirs;
use once_cell::sync::Lazy;
use rusqlite::types::Type;
use rusqlite::{Connection, Row, TransactionBehavior};
use std::fs;
use std::path::PathBuf;
use std::str::FromStr;

static APP: Lazy<(&str, &str, &str)> =
    Lazy::new(|| ("com.alphavelocity", "Treeledger", "treeledger"));

pub fn default_db_path() -> Result<PathBuf> {
    let proj = ProjectDirs::from(APP.0, APP.1, APP.2)
        .context("Could not determine platform-specific data dir")?;
    let data_dir = proj.data_dir();
    fs::create_dir_all(data_dir).context("Failed to create data dir")?;
    Ok(data_dir.join("treeledger.sqlite"))
}

pub fn open_or_init(settings: &Settings) -> Result<Connection> {
    let path = &settings.resolved_db_path()?;
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;
    }
    let conn =
        Connection::open(path).with_context(|| format!("Open DB at {}", path.display()))?;
    conn.busy_timeout(settings.busy_timeout)
        .context("Failed to set busy timeout")?;
    init_schema(&conn)?;
    tracing::debug!(path = %path.display(), "database ready");
    Ok(conn)
}

pub fn open_in_memory() -> Result<Connection> {
    let conn = Connection::open_in_memory().context("Open in-memory DB")?;
    init_schema(&conn)?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
    PRAGMA foreign_keys = ON;

    CREATE TABLE IF NOT EXISTS accounts(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        parent_id INTEGER, -- NULL for top-level accounts
        name TEXT NOT NULL,
        full_name TEXT NOT NULL DEFAULT '',
        memo TEXT NOT NULL DEFAULT '',
        current INTEGER NOT NULL DEFAULT 1,
        lft INTEGER NOT NULL,
        rgt INTEGER NOT NULL,
        balance TEXT NOT NULL DEFAULT '0',
        subtotal TEXT NOT NULL DEFAULT '0',
        decimals INTEGER NOT NULL DEFAULT 2,
        reconcile_date TEXT,
        flagged INTEGER NOT NULL DEFAULT 0,
        locked INTEGER NOT NULL DEFAULT 0,
        open_date TEXT NOT NULL,
        close_date TEXT,
        code TEXT,
        sign TEXT NOT NULL CHECK(sign IN ('DEBIT','CREDIT')),
        type TEXT NOT NULL CHECK(type IN ('ASSET','LIABILITY','EQUITY','INCOME','EXPENSE','GAIN','LOSS')),
        created_at TEXT NOT NULL DEFAULT (datetime('now')),
        FOREIGN KEY(parent_id) REFERENCES accounts(id)
    );
    -- lft/rgt are rewritten in bulk while gaps open and close, so no UNIQUE here
    CREATE INDEX IF NOT EXISTS idx_accounts_lft ON accounts(lft);
    CREATE INDEX IF NOT EXISTS idx_accounts_rgt ON accounts(rgt);
    CREATE INDEX IF NOT EXISTS idx_accounts_parent ON accounts(parent_id);

    CREATE TABLE IF NOT EXISTS transactions(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        date TEXT NOT NULL,
        reconcile_date TEXT,
        comment TEXT NOT NULL,
        amount TEXT NOT NULL,
        reference TEXT NOT NULL DEFAULT '',
        is_reconciled INTEGER NOT NULL DEFAULT 0,
        is_split INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL DEFAULT (datetime('now'))
    );
    CREATE INDEX IF NOT EXISTS idx_transactions_date ON transactions(date);

    CREATE TABLE IF NOT EXISTS transaction_lines(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        transaction_id INTEGER NOT NULL,
        account_id INTEGER NOT NULL,
        amount TEXT NOT NULL,
        sign TEXT NOT NULL CHECK(sign IN ('DEBIT','CREDIT')),
        FOREIGN KEY(transaction_id) REFERENCES transactions(id) ON DELETE CASCADE,
        FOREIGN KEY(account_id) REFERENCES accounts(id)
    );
    CREATE INDEX IF NOT EXISTS idx_lines_tx ON transaction_lines(transaction_id);
    CREATE INDEX IF NOT EXISTS idx_lines_account ON transaction_lines(account_id);
    "#,
    )?;
    Ok(())
}

/// Opens the write transaction every mutation runs in.
///
/// IMMEDIATE takes SQLite's reserved lock up front, so a second writer waits
/// (up to the busy timeout) instead of failing halfway through a gap shift.
pub(crate) fn begin_write(conn: &mut Connection) -> LedgerResult<rusqlite::Transaction<'_>> {
    conn.transaction_with_behavior(TransactionBehavior::Immediate)
        .persist("starting write transaction")
}

/// Runs a multi-statement read against one consistent snapshot.
pub(crate) fn with_snapshot<T, F>(conn: &Connection, f: F) -> LedgerResult<T>
where
    F: FnOnce(&Connection) -> LedgerResult<T>,
{
    if !conn.is_autocommit() {
        return f(conn);
    }
    let tx = conn
        .unchecked_transaction()
        .persist("starting read snapshot")?;
    let out = f(&tx)?;
    tx.commit().persist("closing read snapshot")?;
    Ok(out)
}

const ACCOUNT_FIELDS: [&str; 19] = [
    "id",
    "parent_id",
    "name",
    "full_name",
    "memo",
    "current",
    "lft",
    "rgt",
    "balance",
    "subtotal",
    "decimals",
    "reconcile_date",
    "flagged",
    "locked",
    "open_date",
    "close_date",
    "code",
    "sign",
    "type",
];

/// Column list matching `account_from_row`, qualified with `alias`.
pub(crate) fn account_columns(alias: &str) -> String {
    ACCOUNT_FIELDS
        .iter()
        .map(|f| format!("{alias}.{f}"))
        .collect::<Vec<_>>()
        .join(", ")
}

fn parse_column<T>(r: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: String = r.get(idx)?;
    raw.trim()
        .parse::<T>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

pub(crate) fn account_from_row(r: &Row<'_>) -> rusqlite::Result<Account> {
    Ok(Account {
        id: r.get(0)?,
        parent_id: r.get(1)?,
        name: r.get(2)?,
        full_name: r.get(3)?,
        memo: r.get(4)?,
        current: r.get(5)?,
        left: r.get(6)?,
        right: r.get(7)?,
        balance: parse_column(r, 8)?,
        subtotal: parse_column(r, 9)?,
        decimals: r.get(10)?,
        reconcile_date: r.get(11)?,
        flagged: r.get(12)?,
        locked: r.get(13)?,
        open_date: r.get(14)?,
        close_date: r.get(15)?,
        code: r.get(16)?,
        sign: parse_column(r, 17)?,
        account_type: parse_column(r, 18)?,
    })
}

pub(crate) const TRANSACTION_COLUMNS: &str =
    "id, date, reconcile_date, comment, amount, reference, is_reconciled, is_split";

/// Maps a header row; lines are attached by the caller.
pub(crate) fn transaction_from_row(r: &Row<'_>) -> rusqlite::Result<Transaction> {
    Ok(Transaction {
        id: r.get(0)?,
        date: r.get(1)?,
        reconcile_date: r.get(2)?,
        comment: r.get(3)?,
        amount: parse_column(r, 4)?,
        reference: r.get(5)?,
        is_reconciled: r.get(6)?,
        is_split: r.get(7)?,
        lines: Vec::new(),
    })
}

pub(crate) const LINE_COLUMNS: &str = "id, transaction_id, account_id, amount, sign";

pub(crate) fn line_from_row(r: &Row<'_>) -> rusqlite::Result<DebitCreditLine> {
    Ok(DebitCreditLine {
        id: r.get(0)?,
        transaction_id: r.get(1)?,
        account_id: r.get(2)?,
        amount: parse_column(r, 3)?,
        sign: parse_column(r, 4)?,
    })
}

pub(crate) fn ledger_row_from_row(r: &Row<'_>) -> rusqlite::Result<LedgerRow> {
    Ok(LedgerRow {
        transaction_id: r.get(0)?,
        line_id: r.get(1)?,
        account_id: r.get(2)?,
        date: r.get(3)?,
        reconcile_date: r.get(4)?,
        comment: r.get(5)?,
        reference: r.get(6)?,
        is_reconciled: r.get(7)?,
        is_split: r.get(8)?,
        amount: parse_column(r, 9)?,
        sign: parse_column(r, 10)?,
        split: r.get(11)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LedgerError;

    #[test]
    fn schema_is_idempotent() {
        let conn = open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        let n: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name IN ('accounts','transactions','transaction_lines')",
                [],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(n, 3);
    }

    #[test]
    fn bad_sign_text_reads_back_as_corrupt() {
        let conn = open_in_memory().unwrap();
        conn.execute_batch(
            "PRAGMA ignore_check_constraints = ON;
             INSERT INTO accounts(name, full_name, lft, rgt, open_date, sign, type)
             VALUES ('Cash', 'Cash', 1, 2, '2025-01-01', 'SIDEWAYS', 'ASSET');",
        )
        .unwrap();
        let sql = format!("SELECT {} FROM accounts a", account_columns("a"));
        let err = conn
            .query_row(&sql, [], account_from_row)
            .persist("loading account")
            .unwrap_err();
        assert!(matches!(err, LedgerError::Corrupt(_)));
    }

    #[test]
    fn snapshot_nests_inside_open_transaction() {
        let mut conn = open_in_memory().unwrap();
        let tx = begin_write(&mut conn).unwrap();
        let n = with_snapshot(&tx, |c| {
            c.query_row("SELECT COUNT(*) FROM accounts", [], |r| r.get::<_, i64>(0))
                .persist("counting")
        })
        .unwrap();
        assert_eq!(n, 0);
        tx.commit().unwrap();
    }
}
