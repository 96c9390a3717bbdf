// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::ledger::subtotals;
use crate::models::LedgerRow;
use crate::utils::{arg, fmt_date, resolve_account};
use anyhow::{Context, Result};
use chrono::NaiveDate;
use rusqlite::Connection;
use serde_json::json;

pub fn handle(conn: &Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("ledger", sub)) => export_ledger(conn, sub),
        _ => Ok(()),
    }
}

/// Every line in the subtree of `account`, or in the whole tree when `None`.
pub fn ledger_rows(conn: &Connection, account: Option<&str>) -> Result<Vec<LedgerRow>> {
    let (left, right) = match account {
        Some(r) => {
            let a = resolve_account(conn, r)?;
            (a.left, a.right)
        }
        None => (1, i64::MAX),
    };
    let start = NaiveDate::from_ymd_opt(1, 1, 1).context("Invalid start date")?;
    let end = NaiveDate::from_ymd_opt(9999, 12, 31).context("Invalid end date")?;
    Ok(subtotals::ledger_in_range(conn, left, right, start, end)?)
}

fn export_ledger(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let fmt = arg(sub, "format")?.to_lowercase();
    let out = arg(sub, "out")?;
    let rows = ledger_rows(conn, sub.get_one::<String>("account").map(String::as_str))?;

    match fmt.as_str() {
        "csv" => {
            let mut wtr = csv::Writer::from_path(out)
                .with_context(|| format!("Failed to open {}", out))?;
            wtr.write_record([
                "transaction_id",
                "date",
                "account_id",
                "sign",
                "amount",
                "comment",
                "reference",
                "split",
                "reconciled",
                "reconcile_date",
            ])?;
            for r in &rows {
                wtr.write_record([
                    r.transaction_id.to_string(),
                    r.date.to_string(),
                    r.account_id.to_string(),
                    r.sign.to_string(),
                    r.amount.to_string(),
                    r.comment.clone(),
                    r.reference.clone(),
                    r.split.clone(),
                    r.is_reconciled.to_string(),
                    fmt_date(r.reconcile_date),
                ])?;
            }
            wtr.flush()?;
        }
        "json" => {
            let items: Vec<_> = rows
                .iter()
                .map(|r| {
                    json!({
                        "transaction_id": r.transaction_id,
                        "date": r.date,
                        "account_id": r.account_id,
                        "sign": r.sign,
                        "amount": r.amount.to_string(),
                        "comment": r.comment,
                        "reference": r.reference,
                        "split": r.split,
                        "reconciled": r.is_reconciled,
                        "reconcile_date": r.reconcile_date,
                    })
                })
                .collect();
            std::fs::write(out, serde_json::to_string_pretty(&items)?)
                .with_context(|| format!("Failed to write {}", out))?;
        }
        _ => {
            anyhow::bail!("Unknown format: {} (use csv|json)", fmt);
        }
    }
    println!("Exported {} ledger lines to {}", rows.len(), out);
    Ok(())
}
