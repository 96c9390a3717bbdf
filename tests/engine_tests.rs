// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use chrono::NaiveDate;
use rusqlite::Connection;
use rust_decimal::Decimal;
use treeledger::db;
use treeledger::ledger::{engine, subtotals, tree};
use treeledger::models::{
    Account, AccountChanges, AccountType, LineDraft, NewAccount, TransactionDraft,
};
use treeledger::{ErrorKind, LedgerError, ValidationError};

fn day(m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, m, d).unwrap()
}

fn amt(s: &str) -> Decimal {
    s.parse().unwrap()
}

struct Fixture {
    conn: Connection,
    bank: Account,
    checking: Account,
    savings: Account,
    salary: Account,
}

fn setup() -> Fixture {
    let mut conn = db::open_in_memory().unwrap();
    let bank = tree::insert(&mut conn, &NewAccount::top_level("Bank", AccountType::Asset)).unwrap();
    let checking = tree::insert(&mut conn, &NewAccount::child_of(bank.id, "Checking")).unwrap();
    let savings = tree::insert(&mut conn, &NewAccount::child_of(bank.id, "Savings")).unwrap();
    let salary =
        tree::insert(&mut conn, &NewAccount::top_level("Salary", AccountType::Equity)).unwrap();
    Fixture {
        conn,
        bank,
        checking,
        savings,
        salary,
    }
}

#[test]
fn unbalanced_entry_is_rejected_without_writing() {
    let mut f = setup();
    let draft = TransactionDraft::new(day(1, 5), "paycheck")
        .line(LineDraft::credit(f.salary.id, amt("10000")))
        .line(LineDraft::debit(f.checking.id, amt("9900")));
    let err = engine::store(&mut f.conn, &draft).unwrap_err();
    assert_eq!(err.validation(), Some(ValidationError::DebitCreditsNotBalanced));
    assert_eq!(err.kind(), ErrorKind::Validation);
    let n: i64 = f
        .conn
        .query_row("SELECT COUNT(*) FROM transactions", [], |r| r.get(0))
        .unwrap();
    assert_eq!(n, 0);
}

#[test]
fn reconciled_subtotals_respect_cutoff() {
    let mut f = setup();
    let draft = TransactionDraft::new(day(1, 5), "paycheck")
        .line(LineDraft::debit(f.checking.id, amt("10000")))
        .line(LineDraft::credit(f.salary.id, amt("10000")));
    let t = engine::store(&mut f.conn, &draft).unwrap();
    assert_eq!(t.amount, amt("10000"));
    assert!(!t.is_reconciled);
    assert!(!t.is_split);

    engine::set_reconciled(&mut f.conn, t.id, day(1, 31)).unwrap();
    let bank = tree::get(&f.conn, f.bank.id).unwrap();

    let on = subtotals::reconciled_subtotals(&f.conn, bank.left, bank.right, day(1, 31)).unwrap();
    assert_eq!(on.debit, amt("10000"));
    assert_eq!(on.credit, Decimal::ZERO);

    let before =
        subtotals::reconciled_subtotals(&f.conn, bank.left, bank.right, day(1, 30)).unwrap();
    assert_eq!(before.debit, Decimal::ZERO);
}

#[test]
fn reconcile_transitions_are_idempotent() {
    let mut f = setup();
    let draft = TransactionDraft::new(day(2, 1), "transfer")
        .line(LineDraft::debit(f.savings.id, amt("50")))
        .line(LineDraft::credit(f.checking.id, amt("50")));
    let t = engine::store(&mut f.conn, &draft).unwrap();

    let once = engine::set_reconciled(&mut f.conn, t.id, day(2, 28)).unwrap();
    let twice = engine::set_reconciled(&mut f.conn, t.id, day(2, 28)).unwrap();
    assert_eq!(once, twice);
    assert_eq!(twice.reconcile_date, Some(day(2, 28)));

    let open = engine::set_unreconciled(&mut f.conn, t.id).unwrap();
    assert!(!open.is_reconciled);
    assert_eq!(open.reconcile_date, None);
    assert_eq!(engine::set_unreconciled(&mut f.conn, t.id).unwrap(), open);

    assert!(matches!(
        engine::set_reconciled(&mut f.conn, 999, day(1, 1)).unwrap_err(),
        LedgerError::TransactionNotFound(999)
    ));
}

#[test]
fn overflowing_lines_are_rejected_not_panicking() {
    let mut f = setup();
    let draft = TransactionDraft::new(day(1, 9), "too much")
        .line(LineDraft::debit(f.checking.id, Decimal::MAX))
        .line(LineDraft::debit(f.checking.id, Decimal::MAX))
        .line(LineDraft::credit(f.salary.id, Decimal::ONE));
    let err = engine::store(&mut f.conn, &draft).unwrap_err();
    assert_eq!(err.validation(), Some(ValidationError::DebitCreditAmountInvalid));

    // each entry is fine alone but the account total cannot hold both
    let max = TransactionDraft::new(day(1, 10), "max")
        .line(LineDraft::debit(f.checking.id, Decimal::MAX))
        .line(LineDraft::credit(f.salary.id, Decimal::MAX));
    engine::store(&mut f.conn, &max).unwrap();
    let err = engine::store(&mut f.conn, &max).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Persistence);
    let n: i64 = f
        .conn
        .query_row("SELECT COUNT(*) FROM transactions", [], |r| r.get(0))
        .unwrap();
    assert_eq!(n, 1);
    assert_eq!(tree::get(&f.conn, f.checking.id).unwrap().subtotal, Decimal::MAX);
}

#[test]
fn unknown_account_is_not_found() {
    let mut f = setup();
    let draft = TransactionDraft::new(day(1, 1), "ghost")
        .line(LineDraft::debit(f.checking.id, amt("1")))
        .line(LineDraft::credit(404, amt("1")));
    let err = engine::store(&mut f.conn, &draft).unwrap_err();
    assert!(matches!(err, LedgerError::AccountNotFound(404)));
}

#[test]
fn caches_follow_postings() {
    let mut f = setup();
    let pay = TransactionDraft::new(day(3, 1), "paycheck")
        .line(LineDraft::debit(f.checking.id, amt("1200.50")))
        .line(LineDraft::credit(f.salary.id, amt("1200.50")));
    engine::store(&mut f.conn, &pay).unwrap();
    let save = TransactionDraft::new(day(3, 2), "save")
        .line(LineDraft::debit(f.savings.id, amt("200")))
        .line(LineDraft::credit(f.checking.id, amt("200")));
    let t = engine::store(&mut f.conn, &save).unwrap();

    let checking = tree::get(&f.conn, f.checking.id).unwrap();
    assert_eq!(checking.subtotal, amt("1000.50"));
    let bank = tree::get(&f.conn, f.bank.id).unwrap();
    assert_eq!(bank.subtotal, Decimal::ZERO);
    assert_eq!(bank.balance, amt("1200.50"));
    // CREDIT-normal account sees credits as positive
    assert_eq!(tree::get(&f.conn, f.salary.id).unwrap().balance, amt("1200.50"));

    engine::delete(&mut f.conn, t.id).unwrap();
    assert_eq!(tree::get(&f.conn, f.checking.id).unwrap().subtotal, amt("1200.50"));
    assert_eq!(tree::get(&f.conn, f.savings.id).unwrap().subtotal, Decimal::ZERO);
    assert_eq!(tree::get(&f.conn, f.bank.id).unwrap().balance, amt("1200.50"));
}

#[test]
fn update_replaces_lines_and_keeps_reconcile_state() {
    let mut f = setup();
    let draft = TransactionDraft::new(day(4, 1), "dinner")
        .line(LineDraft::debit(f.checking.id, amt("30")))
        .line(LineDraft::credit(f.salary.id, amt("30")));
    let t = engine::store(&mut f.conn, &draft).unwrap();
    engine::set_reconciled(&mut f.conn, t.id, day(4, 30)).unwrap();

    let split = TransactionDraft::new(day(4, 2), "dinner, split")
        .reference("R-1")
        .line(LineDraft::debit(f.checking.id, amt("20")))
        .line(LineDraft::debit(f.savings.id, amt("25")))
        .line(LineDraft::credit(f.salary.id, amt("45")));
    let updated = engine::update(&mut f.conn, t.id, &split).unwrap();
    assert_eq!(updated.id, t.id);
    assert_eq!(updated.amount, amt("45"));
    assert!(updated.is_split);
    assert_eq!(updated.lines.len(), 3);
    assert_eq!(updated.reference, "R-1");
    assert!(updated.is_reconciled);
    assert_eq!(updated.reconcile_date, Some(day(4, 30)));

    let lines: i64 = f
        .conn
        .query_row(
            "SELECT COUNT(*) FROM transaction_lines WHERE transaction_id = ?1",
            [t.id],
            |r| r.get(0),
        )
        .unwrap();
    assert_eq!(lines, 3);
    assert_eq!(tree::get(&f.conn, f.savings.id).unwrap().subtotal, amt("25"));

    let missing = engine::update(&mut f.conn, 77, &split).unwrap_err();
    assert!(matches!(missing, LedgerError::TransactionNotFound(77)));
}

#[test]
fn delete_removes_lines() {
    let mut f = setup();
    let draft = TransactionDraft::new(day(5, 1), "fee")
        .line(LineDraft::debit(f.savings.id, amt("2")))
        .line(LineDraft::credit(f.checking.id, amt("2")));
    let t = engine::store(&mut f.conn, &draft).unwrap();
    engine::delete(&mut f.conn, t.id).unwrap();
    let lines: i64 = f
        .conn
        .query_row("SELECT COUNT(*) FROM transaction_lines", [], |r| r.get(0))
        .unwrap();
    assert_eq!(lines, 0);
    assert!(matches!(
        engine::get(&f.conn, t.id).unwrap_err(),
        LedgerError::TransactionNotFound(_)
    ));
    assert!(matches!(
        engine::delete(&mut f.conn, t.id).unwrap_err(),
        LedgerError::TransactionNotFound(_)
    ));
}

#[test]
fn stored_transactions_stay_balanced() {
    let mut f = setup();
    for (i, a) in ["10", "20.25", "0.01"].iter().enumerate() {
        let draft = TransactionDraft::new(day(6, i as u32 + 1), format!("t{i}"))
            .line(LineDraft::debit(f.checking.id, amt(a)))
            .line(LineDraft::credit(f.salary.id, amt(a)));
        engine::store(&mut f.conn, &draft).unwrap();
    }
    assert!(engine::verify_balances(&f.conn).unwrap().is_empty());

    f.conn
        .execute("UPDATE transactions SET amount = '999' WHERE id = 1", [])
        .unwrap();
    let issues = engine::verify_balances(&f.conn).unwrap();
    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0].code, "amount_mismatch");
}

#[test]
fn retyping_recomputes_cached_totals() {
    let mut f = setup();
    let draft = TransactionDraft::new(day(8, 1), "deposit")
        .line(LineDraft::debit(f.checking.id, amt("100")))
        .line(LineDraft::credit(f.salary.id, amt("100")));
    engine::store(&mut f.conn, &draft).unwrap();

    let changes = AccountChanges {
        account_type: Some(AccountType::Liability),
        ..AccountChanges::default()
    };
    tree::update_details(&mut f.conn, f.bank.id, &changes).unwrap();
    assert_eq!(tree::get(&f.conn, f.checking.id).unwrap().subtotal, amt("-100"));
    assert_eq!(tree::get(&f.conn, f.bank.id).unwrap().balance, amt("-100"));
    assert_eq!(tree::get(&f.conn, f.salary.id).unwrap().balance, amt("100"));
}

#[test]
fn moving_an_account_moves_its_balance() {
    let mut f = setup();
    let draft = TransactionDraft::new(day(7, 1), "deposit")
        .line(LineDraft::debit(f.savings.id, amt("75")))
        .line(LineDraft::credit(f.salary.id, amt("75")));
    engine::store(&mut f.conn, &draft).unwrap();
    let other =
        tree::insert(&mut f.conn, &NewAccount::top_level("Other", AccountType::Asset)).unwrap();

    tree::move_account(&mut f.conn, f.savings.id, Some(other.id)).unwrap();
    assert_eq!(tree::get(&f.conn, f.bank.id).unwrap().balance, Decimal::ZERO);
    assert_eq!(tree::get(&f.conn, other.id).unwrap().balance, amt("75"));
}
