// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Randomised insert/move/rename sequences must keep the interval encoding intact.

use proptest::prelude::*;
use treeledger::db;
use treeledger::ledger::tree;
use treeledger::models::{AccountChanges, AccountType, NewAccount};
use treeledger::LedgerError;

#[derive(Debug, Clone)]
enum Op {
    Insert { parent: Option<usize>, name: String },
    Move { account: usize, parent: Option<usize> },
    Rename { account: usize, name: String },
}

fn name() -> impl Strategy<Value = String> {
    "[A-Za-z]{1,6}"
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (proptest::option::of(0usize..16), name())
            .prop_map(|(parent, name)| Op::Insert { parent, name }),
        2 => (0usize..16, proptest::option::of(0usize..16))
            .prop_map(|(account, parent)| Op::Move { account, parent }),
        1 => (0usize..16, name()).prop_map(|(account, name)| Op::Rename { account, name }),
    ]
}

fn pick(ids: &[i64], i: usize) -> Option<i64> {
    (!ids.is_empty()).then(|| ids[i % ids.len()])
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn interval_encoding_survives_random_edits(ops in prop::collection::vec(op(), 1..40)) {
        let mut conn = db::open_in_memory().unwrap();
        let mut ids: Vec<i64> = Vec::new();
        for op in ops {
            match op {
                Op::Insert { parent, name } => {
                    let new = match parent.and_then(|p| pick(&ids, p)) {
                        Some(pid) => NewAccount::child_of(pid, name),
                        None => NewAccount::top_level(name, AccountType::Asset),
                    };
                    ids.push(tree::insert(&mut conn, &new).unwrap().id);
                }
                Op::Move { account, parent } => {
                    let Some(id) = pick(&ids, account) else { continue };
                    let target = parent.and_then(|p| pick(&ids, p));
                    match tree::move_account(&mut conn, id, target) {
                        Ok(_) | Err(LedgerError::MoveIntoOwnSubtree { .. }) => {}
                        Err(e) => panic!("unexpected move failure: {e}"),
                    }
                }
                Op::Rename { account, name } => {
                    let Some(id) = pick(&ids, account) else { continue };
                    let changes = AccountChanges { name: Some(name), ..AccountChanges::default() };
                    tree::update_details(&mut conn, id, &changes).unwrap();
                }
            }

            let issues = tree::verify(&conn).unwrap();
            prop_assert!(issues.is_empty(), "{:?}", issues);
            for a in tree::list(&conn).unwrap() {
                let below = tree::all_descendants_of(&conn, a.id).unwrap().len() as i64;
                prop_assert_eq!(a.right, a.left + 1 + 2 * below);
            }
        }
    }
}
