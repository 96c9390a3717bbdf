// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::ledger::{engine, tree};
use crate::models::Issue;
use crate::utils::pretty_table;
use anyhow::Result;
use rusqlite::Connection;

pub fn collect(conn: &Connection) -> Result<Vec<Issue>> {
    // 1) Interval encoding of the account tree
    let mut issues = tree::verify(conn)?;
    // 2) Debit/credit balance of every stored transaction
    issues.extend(engine::verify_balances(conn)?);
    Ok(issues)
}

pub fn handle(conn: &Connection) -> Result<()> {
    let issues = collect(conn)?;
    if issues.is_empty() {
        println!("doctor: no issues found");
    } else {
        let rows = issues
            .into_iter()
            .map(|i| vec![i.code.to_string(), i.detail])
            .collect();
        println!("{}", pretty_table(&["Issue", "Detail"], rows));
    }
    Ok(())
}
