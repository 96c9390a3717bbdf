// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use clap::{crate_version, Arg, ArgAction, Command};

fn json_args() -> [Arg; 2] {
    [
        Arg::new("json")
            .long("json")
            .action(ArgAction::SetTrue)
            .conflicts_with("jsonl")
            .help("Print as pretty JSON"),
        Arg::new("jsonl")
            .long("jsonl")
            .action(ArgAction::SetTrue)
            .help("Print as JSON lines"),
    ]
}

fn account_ref(id: &'static str, help: &'static str) -> Arg {
    Arg::new(id).required(true).help(help)
}

fn posting_args() -> [Arg; 5] {
    [
        Arg::new("date").long("date").required(true).help("YYYY-MM-DD"),
        Arg::new("comment").long("comment").required(true),
        Arg::new("reference").long("reference").default_value(""),
        Arg::new("debit")
            .long("debit")
            .action(ArgAction::Append)
            .value_name("ACCOUNT=AMOUNT")
            .help("Debit line; repeat for splits"),
        Arg::new("credit")
            .long("credit")
            .action(ArgAction::Append)
            .value_name("ACCOUNT=AMOUNT")
            .help("Credit line; repeat for splits"),
    ]
}

fn account_cmd() -> Command {
    Command::new("account")
        .about("Chart of accounts")
        .subcommand_required(true)
        .subcommand(
            Command::new("add")
                .about("Add an account")
                .arg(Arg::new("name").required(true))
                .arg(Arg::new("parent").long("parent").help("Parent id or full name"))
                .arg(
                    Arg::new("type")
                        .long("type")
                        .help("ASSET|LIABILITY|EQUITY|INCOME|EXPENSE|GAIN|LOSS (top level only)"),
                )
                .arg(Arg::new("memo").long("memo").default_value(""))
                .arg(Arg::new("code").long("code"))
                .arg(Arg::new("open-date").long("open-date").help("YYYY-MM-DD"))
                .arg(
                    Arg::new("decimals")
                        .long("decimals")
                        .value_parser(clap::value_parser!(u32)),
                ),
        )
        .subcommand(Command::new("list").about("List accounts as a tree").args(json_args()))
        .subcommand(
            Command::new("show")
                .arg(account_ref("account", "Account id or full name"))
                .args(json_args()),
        )
        .subcommand(
            Command::new("move")
                .about("Move an account and its subtree")
                .arg(account_ref("account", "Account to move"))
                .arg(
                    Arg::new("to")
                        .long("to")
                        .required_unless_present("top")
                        .help("New parent id or full name"),
                )
                .arg(
                    Arg::new("top")
                        .long("top")
                        .action(ArgAction::SetTrue)
                        .conflicts_with("to")
                        .help("Make it a top-level account"),
                ),
        )
        .subcommand(
            Command::new("edit")
                .about("Rename or change account attributes")
                .arg(account_ref("account", "Account id or full name"))
                .arg(Arg::new("name").long("name"))
                .arg(
                    Arg::new("type")
                        .long("type")
                        .help("New account type; top-level accounts only, applied to the subtree"),
                )
                .arg(Arg::new("memo").long("memo"))
                .arg(Arg::new("code").long("code"))
                .arg(Arg::new("current").long("current").value_name("BOOL"))
                .arg(Arg::new("flagged").long("flagged").value_name("BOOL"))
                .arg(Arg::new("locked").long("locked").value_name("BOOL"))
                .arg(Arg::new("close-date").long("close-date").help("YYYY-MM-DD")),
        )
        .subcommand(
            Command::new("children")
                .about("Direct children (top-level accounts when omitted)")
                .arg(Arg::new("account"))
                .args(json_args()),
        )
        .subcommand(
            Command::new("ancestors")
                .arg(account_ref("account", "Account id or full name"))
                .args(json_args()),
        )
        .subcommand(
            Command::new("descendants")
                .arg(account_ref("account", "Account id or full name"))
                .args(json_args()),
        )
        .subcommand(Command::new("types").about("Account types and their signs").args(json_args()))
        .subcommand(
            Command::new("reconcile-date")
                .about("Set or clear the last reconciliation date")
                .arg(account_ref("account", "Account id or full name"))
                .arg(
                    Arg::new("date")
                        .long("date")
                        .required_unless_present("clear"),
                )
                .arg(
                    Arg::new("clear")
                        .long("clear")
                        .action(ArgAction::SetTrue)
                        .conflicts_with("date"),
                ),
        )
}

fn tx_cmd() -> Command {
    let id = || {
        Arg::new("id")
            .required(true)
            .value_parser(clap::value_parser!(i64))
    };
    Command::new("tx")
        .about("Transactions")
        .subcommand_required(true)
        .subcommand(Command::new("add").about("Post a transaction").args(posting_args()))
        .subcommand(
            Command::new("update")
                .about("Replace a transaction's header and lines")
                .arg(id())
                .args(posting_args()),
        )
        .subcommand(Command::new("show").arg(id()).args(json_args()))
        .subcommand(Command::new("delete").arg(id()))
        .subcommand(
            Command::new("reconcile")
                .arg(id())
                .arg(Arg::new("date").long("date").required(true)),
        )
        .subcommand(Command::new("unreconcile").arg(id()))
        .subcommand(
            Command::new("ledger")
                .about("Lines posted to one account")
                .arg(account_ref("account", "Account id or full name"))
                .args(json_args()),
        )
}

fn report_cmd() -> Command {
    Command::new("report")
        .about("Subtotals and reconciliation views")
        .subcommand_required(true)
        .subcommand(
            Command::new("subtotals")
                .about("Debit/credit totals of one account")
                .arg(account_ref("account", "Account id or full name"))
                .args(json_args()),
        )
        .subcommand(Command::new("balances").about("Cached subtotals and balances").args(json_args()))
        .subcommand(
            Command::new("reconciled")
                .about("Reconciled totals of a subtree as of a date")
                .arg(account_ref("account", "Account id or full name"))
                .arg(Arg::new("as-of").long("as-of").required(true))
                .args(json_args()),
        )
        .subcommand(
            Command::new("unreconciled")
                .about("Open lines of a subtree on a date")
                .arg(account_ref("account", "Account id or full name"))
                .arg(Arg::new("date").long("date").required(true))
                .arg(
                    Arg::new("cutoff")
                        .long("cutoff")
                        .help("Also list lines reconciled after this date"),
                )
                .args(json_args()),
        )
        .subcommand(
            Command::new("range")
                .about("Subtree ledger for a date window")
                .arg(account_ref("account", "Account id or full name"))
                .arg(Arg::new("from").long("from").required(true))
                .arg(Arg::new("to").long("to").required(true))
                .arg(
                    Arg::new("reconciled")
                        .long("reconciled")
                        .action(ArgAction::SetTrue)
                        .help("Window on reconcile date, reconciled lines only"),
                )
                .args(json_args()),
        )
}

pub fn build_cli() -> Command {
    Command::new("treeledger")
        .version(crate_version!())
        .about("Nested-set chart of accounts and double-entry ledger")
        .arg(
            Arg::new("db")
                .long("db")
                .global(true)
                .value_name("PATH")
                .help("SQLite database file (overrides TREELEDGER_DB)"),
        )
        .subcommand(Command::new("init").about("Create the database"))
        .subcommand(account_cmd())
        .subcommand(tx_cmd())
        .subcommand(report_cmd())
        .subcommand(
            Command::new("export")
                .about("Export data")
                .subcommand_required(true)
                .subcommand(
                    Command::new("ledger")
                        .arg(
                            Arg::new("format")
                                .long("format")
                                .default_value("csv")
                                .value_parser(["csv", "json"]),
                        )
                        .arg(Arg::new("out").long("out").required(true))
                        .arg(
                            Arg::new("account")
                                .long("account")
                                .help("Limit to one account's subtree"),
                        ),
                ),
        )
        .subcommand(Command::new("doctor").about("Check tree and balance invariants"))
}
