// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::ledger::{engine, subtotals, tree};
use crate::models::{AccountSign, LedgerRow, Transaction, TransactionDraft};
use crate::utils::{
    arg, fmt_date, json_flags, maybe_print_json, parse_date, parse_posting, pretty_table,
    resolve_account,
};
use anyhow::{Context, Result};
use rusqlite::Connection;

pub fn handle(conn: &mut Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("add", sub)) => {
            let draft = draft_from_args(conn, sub)?;
            let t = engine::store(conn, &draft)?;
            println!(
                "Recorded #{} {} on {} ({} lines{})",
                t.id,
                t.amount,
                t.date,
                t.lines.len(),
                if t.is_split { ", split" } else { "" }
            );
        }
        Some(("update", sub)) => {
            let id = tx_id(sub)?;
            let draft = draft_from_args(conn, sub)?;
            let t = engine::update(conn, id, &draft)?;
            println!("Updated #{} {} on {}", t.id, t.amount, t.date);
        }
        Some(("show", sub)) => {
            let t = engine::get(conn, tx_id(sub)?)?;
            show(conn, sub, &t)?;
        }
        Some(("delete", sub)) => {
            let id = tx_id(sub)?;
            engine::delete(conn, id)?;
            println!("Deleted #{}", id);
        }
        Some(("reconcile", sub)) => {
            let id = tx_id(sub)?;
            let date = parse_date(arg(sub, "date")?)?;
            engine::set_reconciled(conn, id, date)?;
            println!("Reconciled #{} on {}", id, date);
        }
        Some(("unreconcile", sub)) => {
            let id = tx_id(sub)?;
            engine::set_unreconciled(conn, id)?;
            println!("Unreconciled #{}", id);
        }
        Some(("ledger", sub)) => {
            let acct = resolve_account(conn, arg(sub, "account")?)?;
            let rows = subtotals::ledger_for_account(conn, acct.id)?;
            print_ledger(sub, &rows)?;
        }
        _ => {}
    }
    Ok(())
}

fn tx_id(sub: &clap::ArgMatches) -> Result<i64> {
    sub.get_one::<i64>("id")
        .copied()
        .context("Missing transaction id")
}

/// Builds a draft from `--date/--comment/--reference` and the repeated
/// `--debit`/`--credit ACCOUNT=AMOUNT` postings, debits first.
pub fn draft_from_args(conn: &Connection, sub: &clap::ArgMatches) -> Result<TransactionDraft> {
    let date = parse_date(arg(sub, "date")?)?;
    let mut draft = TransactionDraft::new(date, arg(sub, "comment")?)
        .reference(sub.get_one::<String>("reference").cloned().unwrap_or_default());
    for (id, sign) in [("debit", AccountSign::Debit), ("credit", AccountSign::Credit)] {
        for raw in sub.get_many::<String>(id).into_iter().flatten() {
            draft = draft.line(parse_posting(conn, raw, sign)?);
        }
    }
    Ok(draft)
}

fn show(conn: &Connection, sub: &clap::ArgMatches, t: &Transaction) -> Result<()> {
    let (json_flag, jsonl_flag) = json_flags(sub);
    if maybe_print_json(json_flag, jsonl_flag, t)? {
        return Ok(());
    }
    println!(
        "#{} {} {} '{}' ref='{}' reconciled={}{}",
        t.id,
        t.date,
        t.amount,
        t.comment,
        t.reference,
        t.is_reconciled,
        t.reconcile_date
            .map(|d| format!(" ({})", d))
            .unwrap_or_default()
    );
    let mut rows = Vec::new();
    for l in &t.lines {
        let name = tree::get(conn, l.account_id)?.full_name;
        let (dr, cr) = match l.sign {
            AccountSign::Debit => (l.amount.to_string(), String::new()),
            AccountSign::Credit => (String::new(), l.amount.to_string()),
        };
        rows.push(vec![name, dr, cr]);
    }
    println!("{}", pretty_table(&["Account", "Debit", "Credit"], rows));
    Ok(())
}

pub fn print_ledger(sub: &clap::ArgMatches, rows: &[LedgerRow]) -> Result<()> {
    let (json_flag, jsonl_flag) = json_flags(sub);
    if !maybe_print_json(json_flag, jsonl_flag, &rows)? {
        let data = rows
            .iter()
            .map(|r| {
                let (dr, cr) = match r.sign {
                    AccountSign::Debit => (r.amount.to_string(), String::new()),
                    AccountSign::Credit => (String::new(), r.amount.to_string()),
                };
                vec![
                    r.transaction_id.to_string(),
                    r.date.to_string(),
                    r.comment.clone(),
                    r.split.clone(),
                    dr,
                    cr,
                    fmt_date(r.reconcile_date),
                ]
            })
            .collect();
        println!(
            "{}",
            pretty_table(
                &["#", "Date", "Comment", "Split", "Debit", "Credit", "Reconciled"],
                data,
            )
        );
    }
    Ok(())
}
