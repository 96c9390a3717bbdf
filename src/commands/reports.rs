// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::commands::transactions::print_ledger;
use crate::ledger::{subtotals, tree};
use crate::models::Account;
use crate::utils::{
    arg, fmt_amount, json_flags, maybe_print_json, opt_date, parse_date, pretty_table,
    resolve_account,
};
use anyhow::Result;
use rusqlite::Connection;
use serde::Serialize;

pub fn handle(conn: &Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("subtotals", sub)) => account_subtotals(conn, sub)?,
        Some(("balances", sub)) => balances(conn, sub)?,
        Some(("reconciled", sub)) => reconciled(conn, sub)?,
        Some(("unreconciled", sub)) => {
            let acct = resolve_account(conn, arg(sub, "account")?)?;
            let date = parse_date(arg(sub, "date")?)?;
            let cutoff = opt_date(sub, "cutoff")?;
            let rows =
                subtotals::unreconciled_for_date(conn, acct.left, acct.right, date, cutoff)?;
            print_ledger(sub, &rows)?;
        }
        Some(("range", sub)) => {
            let acct = resolve_account(conn, arg(sub, "account")?)?;
            let from = parse_date(arg(sub, "from")?)?;
            let to = parse_date(arg(sub, "to")?)?;
            let rows = if sub.get_flag("reconciled") {
                subtotals::reconciled_in_range(conn, acct.left, acct.right, from, to)?
            } else {
                subtotals::ledger_in_range(conn, acct.left, acct.right, from, to)?
            };
            print_ledger(sub, &rows)?;
        }
        _ => {}
    }
    Ok(())
}

#[derive(Serialize)]
pub struct TotalsRow {
    pub account: String,
    pub debit: String,
    pub credit: String,
    pub net: String,
}

fn totals_row(acct: &Account, totals: &crate::models::DebitCreditTotals) -> TotalsRow {
    TotalsRow {
        account: acct.full_name.clone(),
        debit: fmt_amount(&totals.debit, acct.decimals),
        credit: fmt_amount(&totals.credit, acct.decimals),
        net: fmt_amount(&totals.net_for(acct.sign), acct.decimals),
    }
}

fn print_totals(sub: &clap::ArgMatches, row: TotalsRow) -> Result<()> {
    let (json_flag, jsonl_flag) = json_flags(sub);
    if !maybe_print_json(json_flag, jsonl_flag, &row)? {
        println!(
            "{}",
            pretty_table(
                &["Account", "Debit", "Credit", "Net"],
                vec![vec![row.account, row.debit, row.credit, row.net]],
            )
        );
    }
    Ok(())
}

fn account_subtotals(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let acct = resolve_account(conn, arg(sub, "account")?)?;
    let totals = subtotals::subtotals(conn, acct.id)?;
    print_totals(sub, totals_row(&acct, &totals))
}

fn reconciled(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let acct = resolve_account(conn, arg(sub, "account")?)?;
    let as_of = parse_date(arg(sub, "as-of")?)?;
    let totals = subtotals::reconciled_subtotals(conn, acct.left, acct.right, as_of)?;
    print_totals(sub, totals_row(&acct, &totals))
}

#[derive(Serialize)]
pub struct BalanceRow {
    pub account: String,
    pub level: i64,
    pub sign: String,
    pub subtotal: String,
    pub balance: String,
}

pub fn balance_rows(conn: &Connection) -> Result<Vec<BalanceRow>> {
    Ok(tree::list_with_levels(conn)?
        .into_iter()
        .map(|r| BalanceRow {
            level: r.level,
            sign: r.account.sign.to_string(),
            subtotal: fmt_amount(&r.account.subtotal, r.account.decimals),
            balance: fmt_amount(&r.account.balance, r.account.decimals),
            account: r.account.full_name,
        })
        .collect())
}

fn balances(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let (json_flag, jsonl_flag) = json_flags(sub);
    let data = balance_rows(conn)?;
    if !maybe_print_json(json_flag, jsonl_flag, &data)? {
        let rows = data
            .iter()
            .map(|r| {
                vec![
                    r.account.clone(),
                    r.sign.clone(),
                    r.subtotal.clone(),
                    r.balance.clone(),
                ]
            })
            .collect();
        println!(
            "{}",
            pretty_table(&["Account", "Sign", "Subtotal", "Balance"], rows)
        );
    }
    Ok(())
}
