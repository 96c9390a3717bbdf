// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::ledger::tree;
use crate::models::{Account, AccountChanges, AccountType, AccountWithLevel, NewAccount};
use crate::utils::{
    arg, fmt_amount, fmt_date, json_flags, maybe_print_json, opt_date, parse_bool, pretty_table,
    resolve_account,
};
use anyhow::{Context, Result};
use rusqlite::Connection;
use serde_json::json;

pub fn handle(conn: &mut Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("add", sub)) => add(conn, sub)?,
        Some(("list", sub)) => {
            let rows = tree::list_with_levels(conn)?;
            print_tree(sub, &rows)?;
        }
        Some(("show", sub)) => {
            let acct = resolve_account(conn, arg(sub, "account")?)?;
            let (json_flag, jsonl_flag) = json_flags(sub);
            if !maybe_print_json(json_flag, jsonl_flag, &acct)? {
                println!("{}", detail_table(&acct));
            }
        }
        Some(("move", sub)) => {
            let acct = resolve_account(conn, arg(sub, "account")?)?;
            let target = match sub.get_one::<String>("to") {
                Some(r) => Some(resolve_account(conn, r)?.id),
                None => None,
            };
            let moved = tree::move_account(conn, acct.id, target)
                .with_context(|| format!("Moving '{}'", acct.full_name))?;
            println!(
                "Moved '{}' -> '{}' [{}, {}]",
                acct.full_name, moved.full_name, moved.left, moved.right
            );
        }
        Some(("edit", sub)) => edit(conn, sub)?,
        Some(("children", sub)) => {
            let parent = match sub.get_one::<String>("account") {
                Some(r) => Some(resolve_account(conn, r)?.id),
                None => None,
            };
            let rows = tree::direct_children_of(conn, parent)?;
            print_accounts(sub, &rows)?;
        }
        Some(("ancestors", sub)) => {
            let acct = resolve_account(conn, arg(sub, "account")?)?;
            let rows = tree::ancestors_of(conn, acct.id)?;
            print_accounts(sub, &rows)?;
        }
        Some(("descendants", sub)) => {
            let acct = resolve_account(conn, arg(sub, "account")?)?;
            let rows = tree::subtree_with_levels(conn, acct.id)?;
            print_tree(sub, &rows)?;
        }
        Some(("types", sub)) => {
            let (json_flag, jsonl_flag) = json_flags(sub);
            let data: Vec<_> = AccountType::ALL
                .iter()
                .map(|t| json!({ "type": t, "sign": t.normal_sign() }))
                .collect();
            if !maybe_print_json(json_flag, jsonl_flag, &data)? {
                let rows = AccountType::ALL
                    .iter()
                    .map(|t| vec![t.to_string(), t.normal_sign().to_string()])
                    .collect();
                println!("{}", pretty_table(&["Type", "Sign"], rows));
            }
        }
        Some(("reconcile-date", sub)) => {
            let acct = resolve_account(conn, arg(sub, "account")?)?;
            let date = opt_date(sub, "date")?;
            let updated = tree::set_reconcile_date(conn, acct.id, date)?;
            match updated.reconcile_date {
                Some(d) => println!("'{}' reconciled through {}", updated.full_name, d),
                None => println!("Cleared reconcile date of '{}'", updated.full_name),
            }
        }
        _ => {}
    }
    Ok(())
}

fn add(conn: &mut Connection, sub: &clap::ArgMatches) -> Result<()> {
    let name = arg(sub, "name")?;
    let parent_id = match sub.get_one::<String>("parent") {
        Some(r) => Some(resolve_account(conn, r)?.id),
        None => None,
    };
    let account_type = sub
        .get_one::<String>("type")
        .map(|t| t.parse::<AccountType>())
        .transpose()?;
    let new = NewAccount {
        parent_id,
        name: name.to_string(),
        account_type,
        memo: arg(sub, "memo")?.to_string(),
        code: sub.get_one::<String>("code").cloned(),
        open_date: opt_date(sub, "open-date")?,
        decimals: sub.get_one::<u32>("decimals").copied(),
    };
    let acct = tree::insert(conn, &new)?;
    println!(
        "Added account '{}' ({}, {}) [{}, {}]",
        acct.full_name, acct.account_type, acct.sign, acct.left, acct.right
    );
    Ok(())
}

fn edit(conn: &mut Connection, sub: &clap::ArgMatches) -> Result<()> {
    let acct = resolve_account(conn, arg(sub, "account")?)?;
    let flag = |id: &str| sub.get_one::<String>(id).map(|v| parse_bool(v)).transpose();
    let changes = AccountChanges {
        name: sub.get_one::<String>("name").cloned(),
        account_type: sub
            .get_one::<String>("type")
            .map(|t| t.parse::<AccountType>())
            .transpose()?,
        memo: sub.get_one::<String>("memo").cloned(),
        code: sub
            .get_one::<String>("code")
            .map(|c| Some(c.clone()).filter(|c| !c.is_empty())),
        current: flag("current")?,
        flagged: flag("flagged")?,
        locked: flag("locked")?,
        close_date: opt_date(sub, "close-date")?.map(Some),
    };
    let updated = tree::update_details(conn, acct.id, &changes)?;
    println!("Updated account '{}'", updated.full_name);
    Ok(())
}

fn print_accounts(sub: &clap::ArgMatches, accounts: &[Account]) -> Result<()> {
    let (json_flag, jsonl_flag) = json_flags(sub);
    if !maybe_print_json(json_flag, jsonl_flag, &accounts)? {
        let rows = accounts
            .iter()
            .map(|a| {
                vec![
                    a.id.to_string(),
                    a.full_name.clone(),
                    a.account_type.to_string(),
                    a.sign.to_string(),
                    fmt_amount(&a.balance, a.decimals),
                ]
            })
            .collect();
        println!(
            "{}",
            pretty_table(&["ID", "Account", "Type", "Sign", "Balance"], rows)
        );
    }
    Ok(())
}

fn print_tree(sub: &clap::ArgMatches, rows: &[AccountWithLevel]) -> Result<()> {
    let (json_flag, jsonl_flag) = json_flags(sub);
    if !maybe_print_json(json_flag, jsonl_flag, &rows)? {
        let data = rows
            .iter()
            .map(|r| {
                let a = &r.account;
                vec![
                    a.id.to_string(),
                    format!("{}{}", "  ".repeat(r.level.max(0) as usize), a.name),
                    a.account_type.to_string(),
                    a.sign.to_string(),
                    format!("{}-{}", a.left, a.right),
                    fmt_amount(&a.balance, a.decimals),
                ]
            })
            .collect();
        println!(
            "{}",
            pretty_table(&["ID", "Account", "Type", "Sign", "Interval", "Balance"], data)
        );
    }
    Ok(())
}

fn detail_table(a: &Account) -> comfy_table::Table {
    let rows = vec![
        vec!["ID".into(), a.id.to_string()],
        vec!["Full name".into(), a.full_name.clone()],
        vec!["Type".into(), a.account_type.to_string()],
        vec!["Sign".into(), a.sign.to_string()],
        vec!["Interval".into(), format!("{}-{}", a.left, a.right)],
        vec!["Subtotal".into(), fmt_amount(&a.subtotal, a.decimals)],
        vec!["Balance".into(), fmt_amount(&a.balance, a.decimals)],
        vec!["Reconciled".into(), fmt_date(a.reconcile_date)],
        vec!["Opened".into(), a.open_date.to_string()],
        vec!["Closed".into(), fmt_date(a.close_date)],
        vec!["Code".into(), a.code.clone().unwrap_or_default()],
        vec!["Memo".into(), a.memo.clone()],
        vec![
            "Flags".into(),
            format!(
                "current={} flagged={} locked={}",
                a.current, a.flagged, a.locked
            ),
        ],
    ];
    pretty_table(&["Field", "Value"], rows)
}
