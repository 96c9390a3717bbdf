// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::ledger::tree;
use crate::models::{Account, AccountSign, LineDraft};
use anyhow::{Context, Result};
use chrono::NaiveDate;
use comfy_table::{presets::UTF8_FULL, Cell, Table};
use rusqlite::Connection;
use rust_decimal::Decimal;

pub fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .with_context(|| format!("Invalid date '{}', expected YYYY-MM-DD", s))
}

pub fn parse_decimal(s: &str) -> Result<Decimal> {
    s.parse::<Decimal>()
        .with_context(|| format!("Invalid decimal '{}'", s))
}

pub fn parse_bool(s: &str) -> Result<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(anyhow::anyhow!("Invalid flag value '{}', expected true|false", s)),
    }
}

/// Value of an argument clap has already marked as required.
pub fn arg<'a>(m: &'a clap::ArgMatches, id: &str) -> Result<&'a str> {
    m.get_one::<String>(id)
        .map(String::as_str)
        .with_context(|| format!("Missing argument '{}'", id))
}

pub fn opt_date(m: &clap::ArgMatches, id: &str) -> Result<Option<NaiveDate>> {
    m.get_one::<String>(id).map(|s| parse_date(s)).transpose()
}

pub fn fmt_amount(d: &Decimal, decimals: u32) -> String {
    format!("{:.*}", decimals as usize, d.round_dp(decimals))
}

pub fn fmt_date(d: Option<NaiveDate>) -> String {
    d.map(|d| d.to_string()).unwrap_or_default()
}

pub fn pretty_table(headers: &[&str], rows: Vec<Vec<String>>) -> Table {
    let mut t = Table::new();
    t.load_preset(UTF8_FULL);
    t.set_header(headers.iter().map(|h| Cell::new(*h)));
    for r in rows {
        t.add_row(r.into_iter().map(Cell::new));
    }
    t
}

/// Looks an account up by numeric id or by full name (`Assets:Bank:Checking`).
pub fn resolve_account(conn: &Connection, reference: &str) -> Result<Account> {
    let reference = reference.trim();
    if let Ok(id) = reference.parse::<i64>() {
        return tree::get(conn, id).with_context(|| format!("Account '{}' not found", reference));
    }
    tree::find_by_full_name(conn, reference)?
        .with_context(|| format!("Account '{}' not found", reference))
}

/// Parses a `REF=AMOUNT` posting argument into a line draft.
pub fn parse_posting(conn: &Connection, raw: &str, sign: AccountSign) -> Result<LineDraft> {
    let (reference, amount) = raw
        .rsplit_once('=')
        .with_context(|| format!("Invalid posting '{}', expected ACCOUNT=AMOUNT", raw))?;
    let account = resolve_account(conn, reference)?;
    Ok(LineDraft {
        account_id: account.id,
        amount: parse_decimal(amount.trim())?,
        sign: Some(sign),
    })
}

pub fn maybe_print_json<T: serde::Serialize>(
    json_flag: bool,
    jsonl_flag: bool,
    v: &T,
) -> Result<bool> {
    if json_flag {
        println!("{}", serde_json::to_string_pretty(v)?);
        return Ok(true);
    }
    if jsonl_flag {
        // arrays stream one element per line
        let val = serde_json::to_value(v)?;
        if let Some(arr) = val.as_array() {
            for item in arr {
                println!("{}", serde_json::to_string(item)?);
            }
        } else {
            println!("{}", serde_json::to_string(&val)?);
        }
        return Ok(true);
    }
    Ok(false)
}

/// Reads the `--json`/`--jsonl` pair most listing commands accept.
pub fn json_flags(m: &clap::ArgMatches) -> (bool, bool) {
    let flag = |id: &str| {
        m.try_get_one::<bool>(id)
            .ok()
            .flatten()
            .copied()
            .unwrap_or(false)
    };
    (flag("json"), flag("jsonl"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::models::{AccountType, NewAccount};

    #[test]
    fn amounts_render_with_account_precision() {
        assert_eq!(fmt_amount(&Decimal::new(12346, 3), 2), "12.35");
        assert_eq!(fmt_amount(&Decimal::new(100, 0), 2), "100.00");
        assert_eq!(fmt_amount(&Decimal::new(7, 0), 0), "7");
    }

    #[test]
    fn postings_resolve_by_full_name_or_id() {
        let mut conn = db::open_in_memory().unwrap();
        let bank = tree::insert(&mut conn, &NewAccount::top_level("Bank", AccountType::Asset)).unwrap();
        let chk = tree::insert(&mut conn, &NewAccount::child_of(bank.id, "Checking")).unwrap();

        let l = parse_posting(&conn, "Bank:Checking=12.50", AccountSign::Debit).unwrap();
        assert_eq!(l.account_id, chk.id);
        assert_eq!(l.amount, Decimal::new(1250, 2));

        let l = parse_posting(&conn, &format!("{}=3", bank.id), AccountSign::Credit).unwrap();
        assert_eq!(l.account_id, bank.id);
        assert_eq!(l.sign, Some(AccountSign::Credit));

        assert!(parse_posting(&conn, "Nowhere=1", AccountSign::Debit).is_err());
        assert!(parse_posting(&conn, "Bank", AccountSign::Debit).is_err());
    }

    #[test]
    fn bools_accept_common_spellings() {
        assert!(parse_bool("Yes").unwrap());
        assert!(!parse_bool("off").unwrap());
        assert!(parse_bool("maybe").is_err());
    }
}
