// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Posting, replacing and reconciling double-entry transactions.

use crate::db::{self, line_from_row, transaction_from_row, LINE_COLUMNS, TRANSACTION_COLUMNS};
use crate::error::{LedgerError, PersistContext, Result};
use crate::ledger::subtotals;
use crate::ledger::validate::{validate, ValidatedEntry};
use crate::models::{AccountSign, Issue, Transaction, TransactionDraft};
use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info};

fn ensure_accounts_exist(conn: &Connection, entry: &ValidatedEntry) -> Result<()> {
    let mut stmt = conn
        .prepare("SELECT 1 FROM accounts WHERE id = ?1")
        .persist("preparing account check")?;
    for id in entry.account_ids() {
        if !stmt.exists(params![id]).persist("checking account")? {
            return Err(LedgerError::AccountNotFound(id));
        }
    }
    Ok(())
}

fn insert_lines(tx: &rusqlite::Transaction<'_>, tx_id: i64, entry: &ValidatedEntry) -> Result<()> {
    let mut stmt = tx
        .prepare(
            "INSERT INTO transaction_lines(transaction_id, account_id, amount, sign)
             VALUES (?1, ?2, ?3, ?4)",
        )
        .persist("preparing line insert")?;
    for l in &entry.lines {
        stmt.execute(params![
            tx_id,
            l.account_id,
            l.amount.to_string(),
            l.sign.as_str()
        ])
        .with_persist(|| format!("inserting line for account {}", l.account_id))?;
    }
    Ok(())
}

fn line_accounts(conn: &Connection, tx_id: i64) -> Result<Vec<i64>> {
    let mut stmt = conn
        .prepare("SELECT DISTINCT account_id FROM transaction_lines WHERE transaction_id = ?1")
        .persist("preparing line account query")?;
    let ids = stmt
        .query_map(params![tx_id], |r| r.get::<_, i64>(0))
        .persist("loading line accounts")?
        .collect::<rusqlite::Result<Vec<_>>>()
        .persist("loading line accounts")?;
    Ok(ids)
}

/// Validates and persists a new transaction with its lines.
pub fn store(conn: &mut Connection, draft: &TransactionDraft) -> Result<Transaction> {
    let entry = validate(draft)?;
    let tx = db::begin_write(conn)?;
    ensure_accounts_exist(&tx, &entry)?;

    tx.execute(
        "INSERT INTO transactions(date, comment, amount, reference, is_reconciled, is_split)
         VALUES (?1, ?2, ?3, ?4, 0, ?5)",
        params![
            draft.date,
            draft.comment.trim(),
            entry.total.to_string(),
            draft.reference,
            entry.is_split()
        ],
    )
    .persist("inserting transaction")?;
    let id = tx.last_insert_rowid();
    insert_lines(&tx, id, &entry)?;
    subtotals::refresh_caches(&tx, &entry.account_ids())?;
    tx.commit().persist("committing transaction")?;

    info!(
        transaction_id = id,
        amount = %entry.total,
        lines = entry.lines.len(),
        "Transaction stored"
    );
    get(conn, id)
}

/// Replaces the header and the whole line set of an existing transaction.
///
/// The reconciliation state is left as it was.
pub fn update(conn: &mut Connection, id: i64, draft: &TransactionDraft) -> Result<Transaction> {
    let entry = validate(draft)?;
    let tx = db::begin_write(conn)?;
    let exists = tx
        .query_row("SELECT 1 FROM transactions WHERE id = ?1", params![id], |_| Ok(()))
        .optional()
        .with_persist(|| format!("loading transaction {id}"))?;
    if exists.is_none() {
        return Err(LedgerError::TransactionNotFound(id));
    }
    ensure_accounts_exist(&tx, &entry)?;

    let mut touched = line_accounts(&tx, id)?;
    tx.execute(
        "UPDATE transactions SET date = ?1, comment = ?2, amount = ?3, reference = ?4, is_split = ?5
         WHERE id = ?6",
        params![
            draft.date,
            draft.comment.trim(),
            entry.total.to_string(),
            draft.reference,
            entry.is_split(),
            id
        ],
    )
    .with_persist(|| format!("updating transaction {id}"))?;
    tx.execute(
        "DELETE FROM transaction_lines WHERE transaction_id = ?1",
        params![id],
    )
    .with_persist(|| format!("clearing lines of {id}"))?;
    insert_lines(&tx, id, &entry)?;

    for a in entry.account_ids() {
        if !touched.contains(&a) {
            touched.push(a);
        }
    }
    subtotals::refresh_caches(&tx, &touched)?;
    tx.commit().persist("committing transaction update")?;

    info!(transaction_id = id, amount = %entry.total, "Transaction updated");
    get(conn, id)
}

/// Removes a transaction and its lines.
pub fn delete(conn: &mut Connection, id: i64) -> Result<()> {
    let tx = db::begin_write(conn)?;
    let touched = line_accounts(&tx, id)?;
    let n = tx
        .execute("DELETE FROM transactions WHERE id = ?1", params![id])
        .with_persist(|| format!("deleting transaction {id}"))?;
    if n == 0 {
        return Err(LedgerError::TransactionNotFound(id));
    }
    subtotals::refresh_caches(&tx, &touched)?;
    tx.commit().persist("committing transaction delete")?;
    info!(transaction_id = id, "Transaction deleted");
    Ok(())
}

pub fn get(conn: &Connection, id: i64) -> Result<Transaction> {
    db::with_snapshot(conn, |c| {
        let mut t = c
            .query_row(
                &format!("SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE id = ?1"),
                params![id],
                transaction_from_row,
            )
            .optional()
            .with_persist(|| format!("loading transaction {id}"))?
            .ok_or(LedgerError::TransactionNotFound(id))?;
        let mut stmt = c
            .prepare(&format!(
                "SELECT {LINE_COLUMNS} FROM transaction_lines WHERE transaction_id = ?1 ORDER BY id"
            ))
            .persist("preparing line query")?;
        t.lines = stmt
            .query_map(params![id], line_from_row)
            .with_persist(|| format!("loading lines of {id}"))?
            .collect::<rusqlite::Result<Vec<_>>>()
            .with_persist(|| format!("loading lines of {id}"))?;
        Ok(t)
    })
}

fn set_reconcile_state(
    conn: &mut Connection,
    id: i64,
    date: Option<NaiveDate>,
) -> Result<Transaction> {
    let tx = db::begin_write(conn)?;
    let n = tx
        .execute(
            "UPDATE transactions SET is_reconciled = ?1, reconcile_date = ?2 WHERE id = ?3",
            params![date.is_some(), date, id],
        )
        .with_persist(|| format!("updating reconcile state of {id}"))?;
    if n == 0 {
        return Err(LedgerError::TransactionNotFound(id));
    }
    tx.commit().persist("committing reconcile state")?;
    get(conn, id)
}

/// Marks the transaction reconciled as of `date`.
pub fn set_reconciled(conn: &mut Connection, id: i64, date: NaiveDate) -> Result<Transaction> {
    let t = set_reconcile_state(conn, id, Some(date))?;
    info!(transaction_id = id, %date, "Transaction reconciled");
    Ok(t)
}

/// Returns the transaction to the unreconciled state and clears its date.
pub fn set_unreconciled(conn: &mut Connection, id: i64) -> Result<Transaction> {
    let t = set_reconcile_state(conn, id, None)?;
    info!(transaction_id = id, "Transaction unreconciled");
    Ok(t)
}

/// Recomputes each stored transaction's debit and credit totals and
/// compares them with each other and with the stored amount.
pub fn verify_balances(conn: &Connection) -> Result<Vec<Issue>> {
    db::with_snapshot(conn, |c| {
        let mut stmt = c
            .prepare("SELECT id FROM transactions ORDER BY id")
            .persist("preparing transaction scan")?;
        let ids = stmt
            .query_map([], |r| r.get::<_, i64>(0))
            .persist("scanning transactions")?
            .collect::<rusqlite::Result<Vec<_>>>()
            .persist("scanning transactions")?;

        let mut issues = Vec::new();
        for id in ids {
            let t = get(c, id)?;
            let (Some(debit), Some(credit)) = (
                t.total_for(AccountSign::Debit),
                t.total_for(AccountSign::Credit),
            ) else {
                issues.push(Issue::new(
                    "total_overflow",
                    format!("#{id}: line totals overflow"),
                ));
                continue;
            };
            if debit != credit {
                issues.push(Issue::new(
                    "unbalanced_transaction",
                    format!("#{id}: debits {debit} != credits {credit}"),
                ));
            } else if debit != t.amount {
                issues.push(Issue::new(
                    "amount_mismatch",
                    format!("#{id}: stored amount {} but lines total {debit}", t.amount),
                ));
            }
        }
        debug!(issues = issues.len(), "transaction balances verified");
        Ok(issues)
    })
}
