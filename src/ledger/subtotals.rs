// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Debit/credit aggregation over accounts and subtree intervals.
//!
//! Range queries take the `[left, right]` interval of a subtree. Reconciliation
//! views only count lines whose transaction also touches an account outside
//! that interval, so transfers inside the subtree cancel out of the view.

use crate::db::ledger_row_from_row;
use crate::error::{LedgerError, PersistContext, Result};
use crate::ledger::tree;
use crate::models::{DebitCreditTotals, LedgerRow};
use chrono::NaiveDate;
use rusqlite::{params, Connection, Transaction};
use rust_decimal::Decimal;
use std::str::FromStr;

const OUTSIDE_RANGE: &str = "EXISTS (SELECT 1 FROM transaction_lines o
         JOIN accounts oa ON oa.id = o.account_id
         WHERE o.transaction_id = l.transaction_id AND oa.lft NOT BETWEEN ?1 AND ?2)";

fn split_column(other: &str) -> String {
    format!(
        "COALESCE((SELECT group_concat(oa.full_name, ',') FROM transaction_lines o
         JOIN accounts oa ON oa.id = o.account_id
         WHERE o.transaction_id = l.transaction_id AND {other}), '')"
    )
}

fn ledger_sql(filter: &str, other: &str) -> String {
    format!(
        "SELECT t.id, l.id, l.account_id, t.date, t.reconcile_date, t.comment, t.reference,
                t.is_reconciled, t.is_split, l.amount, l.sign, {}
         FROM transaction_lines l
         JOIN accounts a ON a.id = l.account_id
         JOIN transactions t ON t.id = l.transaction_id
         WHERE {filter}
         ORDER BY t.date, t.id, l.id",
        split_column(other)
    )
}

fn ledger_rows<P: rusqlite::Params>(
    conn: &Connection,
    sql: &str,
    params: P,
    context: &str,
) -> Result<Vec<LedgerRow>> {
    let mut stmt = conn.prepare(sql).persist(context)?;
    let rows = stmt
        .query_map(params, ledger_row_from_row)
        .persist(context)?
        .collect::<rusqlite::Result<Vec<_>>>()
        .persist(context)?;
    Ok(rows)
}

fn sum_lines<P: rusqlite::Params>(
    conn: &Connection,
    sql: &str,
    params: P,
    context: &str,
) -> Result<DebitCreditTotals> {
    let mut stmt = conn.prepare(sql).persist(context)?;
    let mut rows = stmt.query(params).persist(context)?;
    let mut totals = DebitCreditTotals::default();
    while let Some(r) = rows.next().persist(context)? {
        let amount: String = r.get(0).persist(context)?;
        let sign: String = r.get(1).persist(context)?;
        totals
            .add(parse_stored(&sign, context)?, parse_stored(&amount, context)?)
            .ok_or_else(|| LedgerError::Corrupt(format!("{context}: total overflowed")))?;
    }
    Ok(totals)
}

fn parse_stored<T: FromStr>(raw: &str, context: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse::<T>()
        .map_err(|e| LedgerError::Corrupt(format!("{context}: '{raw}': {e}")))
}

/// Debit and credit sums for every line posted to the account.
pub fn subtotals(conn: &Connection, account_id: i64) -> Result<DebitCreditTotals> {
    sum_lines(
        conn,
        "SELECT amount, sign FROM transaction_lines WHERE account_id = ?1",
        params![account_id],
        "summing account lines",
    )
}

/// Sums for lines in `[left, right]` on transactions reconciled on or before `cutoff`.
pub fn reconciled_subtotals(
    conn: &Connection,
    left: i64,
    right: i64,
    cutoff: NaiveDate,
) -> Result<DebitCreditTotals> {
    let sql = format!(
        "SELECT l.amount, l.sign
         FROM transaction_lines l
         JOIN accounts a ON a.id = l.account_id
         JOIN transactions t ON t.id = l.transaction_id
         WHERE a.lft BETWEEN ?1 AND ?2
           AND t.is_reconciled = 1
           AND t.reconcile_date <= ?3
           AND {OUTSIDE_RANGE}"
    );
    sum_lines(
        conn,
        &sql,
        params![left, right, cutoff],
        "summing reconciled lines",
    )
}

/// Lines still open as of `search_date`: unreconciled, or reconciled only
/// after `cutoff`. Without a cutoff only unreconciled lines qualify.
pub fn unreconciled_for_date(
    conn: &Connection,
    left: i64,
    right: i64,
    search_date: NaiveDate,
    cutoff: Option<NaiveDate>,
) -> Result<Vec<LedgerRow>> {
    let filter = format!(
        "a.lft BETWEEN ?1 AND ?2
         AND t.date <= ?3
         AND (t.is_reconciled = 0 OR (?4 IS NOT NULL AND t.reconcile_date > ?4))
         AND {OUTSIDE_RANGE}"
    );
    let sql = ledger_sql(&filter, "oa.lft NOT BETWEEN ?1 AND ?2");
    ledger_rows(
        conn,
        &sql,
        params![left, right, search_date, cutoff],
        "loading unreconciled lines",
    )
}

/// Lines in range on transactions reconciled within `[start, end]`.
pub fn reconciled_in_range(
    conn: &Connection,
    left: i64,
    right: i64,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Vec<LedgerRow>> {
    let filter = format!(
        "a.lft BETWEEN ?1 AND ?2
         AND t.is_reconciled = 1
         AND t.reconcile_date BETWEEN ?3 AND ?4
         AND {OUTSIDE_RANGE}"
    );
    let sql = ledger_sql(&filter, "oa.lft NOT BETWEEN ?1 AND ?2");
    ledger_rows(
        conn,
        &sql,
        params![left, right, start, end],
        "loading reconciled lines",
    )
}

/// Every line posted to one account, with the other accounts of each transaction.
pub fn ledger_for_account(conn: &Connection, account_id: i64) -> Result<Vec<LedgerRow>> {
    let sql = ledger_sql("l.account_id = ?1", "o.id <> l.id");
    ledger_rows(conn, &sql, params![account_id], "loading account ledger")
}

/// Lines anywhere in `[left, right]` on transactions dated within `[start, end]`.
pub fn ledger_in_range(
    conn: &Connection,
    left: i64,
    right: i64,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Vec<LedgerRow>> {
    let sql = ledger_sql(
        "a.lft BETWEEN ?1 AND ?2 AND t.date BETWEEN ?3 AND ?4",
        "o.id <> l.id",
    );
    ledger_rows(
        conn,
        &sql,
        params![left, right, start, end],
        "loading ranged ledger",
    )
}

/// Stores the signed net of the account's own lines as its subtotal.
pub(crate) fn refresh_subtotal(tx: &Transaction<'_>, account_id: i64) -> Result<Decimal> {
    let account = tree::get(tx, account_id)?;
    let net = subtotals(tx, account_id)?.net_for(account.sign);
    tx.execute(
        "UPDATE accounts SET subtotal = ?1 WHERE id = ?2",
        params![net.to_string(), account_id],
    )
    .with_persist(|| format!("storing subtotal of {account_id}"))?;
    Ok(net)
}

/// Stores the sum of subtotals over the account's subtree as its balance.
pub(crate) fn refresh_balance(tx: &Transaction<'_>, account_id: i64) -> Result<Decimal> {
    let account = tree::get(tx, account_id)?;
    let mut stmt = tx
        .prepare("SELECT subtotal FROM accounts WHERE lft BETWEEN ?1 AND ?2")
        .persist("preparing balance query")?;
    let subtotals = stmt
        .query_map(params![account.left, account.right], |r| r.get::<_, String>(0))
        .persist("loading subtree subtotals")?
        .collect::<rusqlite::Result<Vec<_>>>()
        .persist("loading subtree subtotals")?;
    let mut balance = Decimal::ZERO;
    for s in &subtotals {
        balance = balance
            .checked_add(parse_stored::<Decimal>(s, "summing subtree subtotals")?)
            .ok_or_else(|| {
                LedgerError::Corrupt(format!("balance of {account_id} overflowed"))
            })?;
    }
    tx.execute(
        "UPDATE accounts SET balance = ?1 WHERE id = ?2",
        params![balance.to_string(), account_id],
    )
    .with_persist(|| format!("storing balance of {account_id}"))?;
    Ok(balance)
}

/// Refreshes subtotals of `touched`, then balances of `touched` and all of
/// their ancestors.
pub(crate) fn refresh_caches(tx: &Transaction<'_>, touched: &[i64]) -> Result<()> {
    let mut rollup: Vec<i64> = Vec::new();
    for id in touched {
        refresh_subtotal(tx, *id)?;
        for a in tree::ancestors_of(tx, *id)? {
            if !rollup.contains(&a.id) {
                rollup.push(a.id);
            }
        }
        if !rollup.contains(id) {
            rollup.push(*id);
        }
    }
    for id in &rollup {
        refresh_balance(tx, *id)?;
    }
    tracing::debug!(touched = touched.len(), refreshed = rollup.len(), "caches refreshed");
    Ok(())
}

