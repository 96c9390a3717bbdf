// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Chart of accounts stored as a nested-set interval tree.
//!
//! Each account owns the interval `[left, right]`; descendants lie strictly
//! inside it and siblings are laid out left to right in byte-wise name order.
//! Structural changes shift intervals with [`intervals::open_gap`] and
//! [`intervals::close_gap`] inside a single write transaction.

use crate::db::{self, account_columns, account_from_row};
use crate::error::{LedgerError, PersistContext, Result};
use crate::ledger::intervals::{self, LEAF_SPREAD};
use crate::ledger::subtotals;
use crate::models::{Account, AccountChanges, AccountWithLevel, Issue, NewAccount};
use chrono::{Local, NaiveDate};
use rusqlite::{params, Connection, OptionalExtension, Transaction};
use tracing::{debug, info};

/// Separator between path segments of a full account name.
pub const PATH_DELIMITER: char = ':';

fn select_accounts(where_clause: &str) -> String {
    format!(
        "SELECT {} FROM accounts a {where_clause}",
        account_columns("a")
    )
}

fn query_accounts<P: rusqlite::Params>(
    conn: &Connection,
    sql: &str,
    params: P,
    context: &str,
) -> Result<Vec<Account>> {
    let mut stmt = conn.prepare(sql).persist(context)?;
    let rows = stmt
        .query_map(params, account_from_row)
        .persist(context)?
        .collect::<rusqlite::Result<Vec<_>>>()
        .persist(context)?;
    Ok(rows)
}

pub fn get(conn: &Connection, id: i64) -> Result<Account> {
    conn.query_row(&select_accounts("WHERE a.id = ?1"), params![id], account_from_row)
        .optional()
        .with_persist(|| format!("loading account {id}"))?
        .ok_or(LedgerError::AccountNotFound(id))
}

pub fn find_by_full_name(conn: &Connection, full_name: &str) -> Result<Option<Account>> {
    conn.query_row(
        &select_accounts("WHERE a.full_name = ?1 ORDER BY a.lft LIMIT 1"),
        params![full_name],
        account_from_row,
    )
    .optional()
    .with_persist(|| format!("looking up account '{full_name}'"))
}

/// All accounts in tree (pre-order) order.
pub fn list(conn: &Connection) -> Result<Vec<Account>> {
    query_accounts(
        conn,
        &select_accounts("ORDER BY a.lft"),
        [],
        "listing accounts",
    )
}

const LEVEL_COLUMN: &str =
    "(SELECT COUNT(*) FROM accounts p WHERE p.lft < a.lft AND p.rgt > a.rgt)";

fn query_with_levels<P: rusqlite::Params>(
    conn: &Connection,
    where_clause: &str,
    params: P,
    context: &str,
) -> Result<Vec<AccountWithLevel>> {
    let sql = format!(
        "SELECT {}, {LEVEL_COLUMN} FROM accounts a {where_clause} ORDER BY a.lft",
        account_columns("a")
    );
    let mut stmt = conn.prepare(&sql).persist(context)?;
    let rows = stmt
        .query_map(params, |r| {
            Ok(AccountWithLevel {
                account: account_from_row(r)?,
                level: r.get(19)?,
            })
        })
        .persist(context)?
        .collect::<rusqlite::Result<Vec<_>>>()
        .persist(context)?;
    Ok(rows)
}

pub fn list_with_levels(conn: &Connection) -> Result<Vec<AccountWithLevel>> {
    query_with_levels(conn, "", [], "listing accounts with levels")
}

/// The account and its descendants, each with its depth in the whole tree.
pub fn subtree_with_levels(conn: &Connection, id: i64) -> Result<Vec<AccountWithLevel>> {
    db::with_snapshot(conn, |c| {
        let root = get(c, id)?;
        query_with_levels(
            c,
            "WHERE a.lft BETWEEN ?1 AND ?2",
            params![root.left, root.right],
            "loading subtree",
        )
    })
}

/// Direct children ordered by position, which is also name order.
/// `None` lists the top-level accounts.
pub fn direct_children_of(conn: &Connection, parent: Option<i64>) -> Result<Vec<Account>> {
    query_accounts(
        conn,
        &select_accounts("WHERE a.parent_id IS ?1 ORDER BY a.lft"),
        params![parent],
        "loading children",
    )
}

/// Strict ancestors, root first.
pub fn ancestors_of(conn: &Connection, id: i64) -> Result<Vec<Account>> {
    db::with_snapshot(conn, |c| {
        let node = get(c, id)?;
        query_accounts(
            c,
            &select_accounts("WHERE a.lft < ?1 AND a.rgt > ?2 ORDER BY a.lft"),
            params![node.left, node.right],
            "loading ancestors",
        )
    })
}

pub fn all_descendants_of(conn: &Connection, id: i64) -> Result<Vec<Account>> {
    db::with_snapshot(conn, |c| {
        let node = get(c, id)?;
        query_accounts(
            c,
            &select_accounts("WHERE a.lft > ?1 AND a.lft < ?2 ORDER BY a.lft"),
            params![node.left, node.right],
            "loading descendants",
        )
    })
}

/// Joins the names on the path from the root down to `id`.
pub fn full_name(conn: &Connection, id: i64) -> Result<String> {
    let mut stmt = conn
        .prepare(
            "SELECT p.name FROM accounts p, accounts a
             WHERE a.id = ?1 AND p.lft <= a.lft AND p.rgt >= a.rgt
             ORDER BY p.lft",
        )
        .persist("preparing full name query")?;
    let names = stmt
        .query_map(params![id], |r| r.get::<_, String>(0))
        .with_persist(|| format!("computing full name of {id}"))?
        .collect::<rusqlite::Result<Vec<_>>>()
        .with_persist(|| format!("computing full name of {id}"))?;
    if names.is_empty() {
        return Err(LedgerError::AccountNotFound(id));
    }
    Ok(names.join(&PATH_DELIMITER.to_string()))
}

/// Position after which an account called `name` belongs under `parent`.
///
/// That is the right bound of the last child sorting strictly before `name`,
/// else the parent's left bound, else 0 for the first top-level slot.
/// `exclude` leaves one account out of the sibling set.
pub fn find_insertion_point(
    conn: &Connection,
    parent: Option<i64>,
    name: &str,
    exclude: Option<i64>,
) -> Result<i64> {
    let mut stmt = conn
        .prepare("SELECT id, name, rgt FROM accounts WHERE parent_id IS ?1")
        .persist("preparing sibling query")?;
    let mut siblings = stmt
        .query_map(params![parent], |r| {
            Ok((r.get::<_, i64>(0)?, r.get::<_, String>(1)?, r.get::<_, i64>(2)?))
        })
        .persist("loading siblings")?
        .collect::<rusqlite::Result<Vec<_>>>()
        .persist("loading siblings")?;
    siblings.retain(|(id, _, _)| Some(*id) != exclude);
    siblings.sort_by(|a, b| a.1.as_bytes().cmp(b.1.as_bytes()).then(a.2.cmp(&b.2)));

    if let Some((_, _, right)) = siblings
        .iter()
        .filter(|(_, sibling, _)| sibling.as_bytes() < name.as_bytes())
        .next_back()
    {
        return Ok(*right);
    }
    match parent {
        Some(pid) => Ok(get(conn, pid)?.left),
        None => Ok(0),
    }
}

pub fn insert(conn: &mut Connection, new: &NewAccount) -> Result<Account> {
    let name = new.name.trim();
    if name.is_empty() {
        return Err(LedgerError::EmptyAccountName);
    }

    let tx = db::begin_write(conn)?;
    let (account_type, sign) = match new.parent_id {
        Some(pid) => {
            let parent = get(&tx, pid)?;
            (parent.account_type, parent.sign)
        }
        None => {
            let ty = new.account_type.ok_or(LedgerError::MissingAccountType)?;
            (ty, ty.normal_sign())
        }
    };

    let anchor = find_insertion_point(&tx, new.parent_id, name, None)?;
    intervals::open_gap(&tx, anchor, LEAF_SPREAD)?;

    let open_date = new.open_date.unwrap_or_else(|| Local::now().date_naive());
    tx.execute(
        "INSERT INTO accounts(parent_id, name, memo, lft, rgt, decimals, open_date, code, sign, type)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            new.parent_id,
            name,
            new.memo,
            anchor + 1,
            anchor + LEAF_SPREAD,
            new.decimals.unwrap_or(2),
            open_date,
            new.code,
            sign.as_str(),
            account_type.as_str(),
        ],
    )
    .with_persist(|| format!("inserting account '{name}'"))?;
    let id = tx.last_insert_rowid();

    let full = full_name(&tx, id)?;
    tx.execute(
        "UPDATE accounts SET full_name = ?1 WHERE id = ?2",
        params![full, id],
    )
    .persist("storing full name")?;
    tx.commit().persist("committing account insert")?;

    info!(
        account_id = id,
        full_name = %full,
        left = anchor + 1,
        right = anchor + LEAF_SPREAD,
        "Account created"
    );
    get(conn, id)
}

/// Re-slots `account` (and its subtree) under `parent` with name `name`.
///
/// Coordinates for the new slot are derived from the bounds loaded before
/// the gaps moved, so the stale rows of the subtree never feed back in.
fn relocate(
    tx: &Transaction<'_>,
    account: &Account,
    parent: Option<i64>,
    name: &str,
) -> Result<(i64, i64)> {
    let descendants = all_descendants_of(tx, account.id)?;
    let spread = account.spread();
    if spread != LEAF_SPREAD * (descendants.len() as i64 + 1) {
        return Err(LedgerError::StructuralInvariant(format!(
            "account {} spans {} positions but has {} descendants",
            account.id,
            spread,
            descendants.len()
        )));
    }

    intervals::close_gap(tx, account.right, spread)?;
    let anchor = find_insertion_point(tx, parent, name, Some(account.id))?;
    intervals::open_gap(tx, anchor, spread)?;

    let left = anchor + 1;
    let right = anchor + spread;
    let shift = left - account.left;
    tx.execute(
        "UPDATE accounts SET parent_id = ?1, name = ?2, lft = ?3, rgt = ?4 WHERE id = ?5",
        params![parent, name, left, right, account.id],
    )
    .with_persist(|| format!("re-slotting account {}", account.id))?;

    let mut stmt = tx
        .prepare("UPDATE accounts SET lft = ?1, rgt = ?2 WHERE id = ?3")
        .persist("preparing descendant shift")?;
    for d in &descendants {
        stmt.execute(params![d.left + shift, d.right + shift, d.id])
            .with_persist(|| format!("shifting descendant {}", d.id))?;
    }

    debug!(
        account_id = account.id,
        anchor,
        spread,
        shift,
        descendants = descendants.len(),
        "subtree relocated"
    );
    Ok((left, right))
}

/// Recomputes stored full names for `id` and everything beneath it.
fn refresh_full_names(tx: &Transaction<'_>, id: i64) -> Result<Vec<i64>> {
    let root = get(tx, id)?;
    let mut stmt = tx
        .prepare("SELECT id FROM accounts WHERE lft BETWEEN ?1 AND ?2 ORDER BY lft")
        .persist("preparing subtree query")?;
    let ids = stmt
        .query_map(params![root.left, root.right], |r| r.get::<_, i64>(0))
        .persist("loading subtree ids")?
        .collect::<rusqlite::Result<Vec<_>>>()
        .persist("loading subtree ids")?;
    for sub in &ids {
        let full = full_name(tx, *sub)?;
        tx.execute(
            "UPDATE accounts SET full_name = ?1 WHERE id = ?2",
            params![full, sub],
        )
        .with_persist(|| format!("storing full name of {sub}"))?;
    }
    Ok(ids)
}

/// Moves an account and its subtree beneath `new_parent` (`None` = top level).
///
/// A move to the current parent changes nothing. A move beneath the account
/// itself or one of its descendants is rejected before anything is written.
/// When the destination has a parent, the subtree adopts its type and sign.
pub fn move_account(conn: &mut Connection, id: i64, new_parent: Option<i64>) -> Result<Account> {
    let tx = db::begin_write(conn)?;
    let account = get(&tx, id)?;
    if account.parent_id == new_parent {
        debug!(account_id = id, "move to current parent ignored");
        return Ok(account);
    }

    let target = match new_parent {
        Some(pid) => {
            let p = get(&tx, pid)?;
            if p.id == account.id || account.is_ancestor_of(&p) {
                return Err(LedgerError::MoveIntoOwnSubtree {
                    account: id,
                    target: pid,
                });
            }
            Some(p)
        }
        None => None,
    };

    let old_ancestors = ancestors_of(&tx, id)?;
    let (left, right) = relocate(&tx, &account, new_parent, &account.name)?;

    if let Some(parent) = &target {
        tx.execute(
            "UPDATE accounts SET type = ?1, sign = ?2 WHERE lft BETWEEN ?3 AND ?4",
            params![parent.account_type.as_str(), parent.sign.as_str(), left, right],
        )
        .persist("propagating type and sign")?;
    }

    let mut touched = refresh_full_names(&tx, id)?;
    touched.extend(old_ancestors.iter().map(|a| a.id));
    subtotals::refresh_caches(&tx, &touched)?;
    tx.commit().persist("committing account move")?;

    info!(
        account_id = id,
        from = ?account.parent_id,
        to = ?new_parent,
        left,
        right,
        "Account moved"
    );
    get(conn, id)
}

/// Applies name, type and attribute edits. A new name re-slots the account
/// among its siblings and refreshes the full names of its subtree. A new type
/// is written with its normal sign over the whole subtree and the cached
/// subtotals and balances are recomputed under the new sign.
pub fn update_details(conn: &mut Connection, id: i64, changes: &AccountChanges) -> Result<Account> {
    let tx = db::begin_write(conn)?;
    let mut account = get(&tx, id)?;

    let retype = changes
        .account_type
        .filter(|t| *t != account.account_type);
    if retype.is_some() && account.parent_id.is_some() {
        return Err(LedgerError::TypeChangeOnChild(id));
    }

    if let Some(raw) = &changes.name {
        let name = raw.trim();
        if name.is_empty() {
            return Err(LedgerError::EmptyAccountName);
        }
        if name != account.name {
            relocate(&tx, &account, account.parent_id, name)?;
            refresh_full_names(&tx, id)?;
            info!(account_id = id, from = %account.name, to = %name, "Account renamed");
        }
    }

    if let Some(account_type) = retype {
        let root = get(&tx, id)?;
        let sign = account_type.normal_sign();
        tx.execute(
            "UPDATE accounts SET type = ?1, sign = ?2 WHERE lft BETWEEN ?3 AND ?4",
            params![account_type.as_str(), sign.as_str(), root.left, root.right],
        )
        .with_persist(|| format!("retyping subtree of {id}"))?;
        let mut subtree = vec![id];
        subtree.extend(all_descendants_of(&tx, id)?.iter().map(|d| d.id));
        subtotals::refresh_caches(&tx, &subtree)?;
        info!(
            account_id = id,
            from = %account.account_type,
            to = %account_type,
            sign = %sign,
            accounts = subtree.len(),
            "Account retyped"
        );
    }

    if let Some(memo) = &changes.memo {
        account.memo = memo.clone();
    }
    if let Some(code) = &changes.code {
        account.code = code.clone();
    }
    if let Some(current) = changes.current {
        account.current = current;
    }
    if let Some(flagged) = changes.flagged {
        account.flagged = flagged;
    }
    if let Some(locked) = changes.locked {
        account.locked = locked;
    }
    if let Some(close_date) = changes.close_date {
        account.close_date = close_date;
    }
    tx.execute(
        "UPDATE accounts SET memo = ?1, code = ?2, current = ?3, flagged = ?4, locked = ?5, close_date = ?6
         WHERE id = ?7",
        params![
            account.memo,
            account.code,
            account.current,
            account.flagged,
            account.locked,
            account.close_date,
            id
        ],
    )
    .with_persist(|| format!("updating account {id}"))?;
    tx.commit().persist("committing account update")?;
    get(conn, id)
}

/// Records the date the account was last reconciled (`None` clears it).
pub fn set_reconcile_date(
    conn: &mut Connection,
    id: i64,
    date: Option<NaiveDate>,
) -> Result<Account> {
    let tx = db::begin_write(conn)?;
    let n = tx
        .execute(
            "UPDATE accounts SET reconcile_date = ?1 WHERE id = ?2",
            params![date, id],
        )
        .with_persist(|| format!("setting reconcile date of {id}"))?;
    if n == 0 {
        return Err(LedgerError::AccountNotFound(id));
    }
    tx.commit().persist("committing reconcile date")?;
    info!(account_id = id, date = ?date, "Account reconcile date set");
    get(conn, id)
}

/// Checks the interval encoding of the whole table.
///
/// Reports gaps or overlaps in the bound sequence, parent links that disagree
/// with containment, siblings out of name order, type/sign drift from the
/// parent, and stale full names.
pub fn verify(conn: &Connection) -> Result<Vec<Issue>> {
    let accounts = list(conn)?;
    let mut issues = Vec::new();

    let mut bounds: Vec<i64> = accounts.iter().flat_map(|a| [a.left, a.right]).collect();
    bounds.sort_unstable();
    for (i, b) in bounds.iter().enumerate() {
        if *b != i as i64 + 1 {
            issues.push(Issue::new(
                "interval_packing",
                format!("expected bound {} but found {}", i + 1, b),
            ));
            break;
        }
    }

    // (account, path) stack of open containers while walking in left order
    let mut stack: Vec<(&Account, String)> = Vec::new();
    let mut last_child: Vec<(Option<i64>, &str)> = Vec::new();
    for a in &accounts {
        while stack.last().is_some_and(|(top, _)| top.right < a.left) {
            stack.pop();
        }
        if a.right <= a.left {
            issues.push(Issue::new(
                "inverted_interval",
                format!("{} has left {} >= right {}", a.full_name, a.left, a.right),
            ));
        }
        let expected_parent = stack.last().map(|(p, _)| p.id);
        if a.parent_id != expected_parent {
            issues.push(Issue::new(
                "parent_mismatch",
                format!(
                    "{} points at parent {:?} but sits inside {:?}",
                    a.full_name, a.parent_id, expected_parent
                ),
            ));
        }
        if let Some((p, _)) = stack.last() {
            if p.sign != a.sign || p.account_type != a.account_type {
                issues.push(Issue::new(
                    "sign_drift",
                    format!("{} is {}/{} under {}/{}", a.full_name, a.account_type, a.sign, p.account_type, p.sign),
                ));
            }
        }

        if let Some(prev) = last_child
            .iter()
            .rev()
            .find(|(parent, _)| *parent == a.parent_id)
        {
            if prev.1.as_bytes() > a.name.as_bytes() {
                issues.push(Issue::new(
                    "sibling_order",
                    format!("{} is placed after {}", a.name, prev.1),
                ));
            }
        }
        last_child.push((a.parent_id, a.name.as_str()));

        let path = match stack.last() {
            Some((_, parent_path)) => format!("{parent_path}{PATH_DELIMITER}{}", a.name),
            None => a.name.clone(),
        };
        if path != a.full_name {
            issues.push(Issue::new(
                "stale_full_name",
                format!("account {} stores '{}' but its path is '{}'", a.id, a.full_name, path),
            ));
        }
        stack.push((a, path));
    }
    Ok(issues)
}
