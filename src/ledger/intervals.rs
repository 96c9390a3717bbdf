// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Interval bookkeeping for the nested-set encoding.

use crate::error::{PersistContext, Result};
use rusqlite::{params, Transaction};

/// Interval width of an account with no descendants.
pub const LEAF_SPREAD: i64 = 2;

/// Makes room for `spread` positions immediately after `after`.
///
/// Right bounds move first, then left bounds; an account whose left bound
/// equals `after` keeps it and therefore grows to contain the new slot.
pub fn open_gap(tx: &Transaction<'_>, after: i64, spread: i64) -> Result<()> {
    tx.execute(
        "UPDATE accounts SET rgt = rgt + ?1 WHERE rgt > ?2",
        params![spread, after],
    )
    .with_persist(|| format!("opening gap of {spread} after {after} (right bounds)"))?;
    tx.execute(
        "UPDATE accounts SET lft = lft + ?1 WHERE lft > ?2",
        params![spread, after],
    )
    .with_persist(|| format!("opening gap of {spread} after {after} (left bounds)"))?;
    tracing::debug!(after, spread, "gap opened");
    Ok(())
}

/// Removes `spread` positions that ended at `after`.
pub fn close_gap(tx: &Transaction<'_>, after: i64, spread: i64) -> Result<()> {
    tx.execute(
        "UPDATE accounts SET rgt = rgt - ?1 WHERE rgt > ?2",
        params![spread, after],
    )
    .with_persist(|| format!("closing gap of {spread} after {after} (right bounds)"))?;
    tx.execute(
        "UPDATE accounts SET lft = lft - ?1 WHERE lft > ?2",
        params![spread, after],
    )
    .with_persist(|| format!("closing gap of {spread} after {after} (left bounds)"))?;
    tracing::debug!(after, spread, "gap closed");
    Ok(())
}
