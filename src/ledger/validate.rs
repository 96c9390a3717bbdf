// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::error::ValidationError;
use crate::models::{AccountSign, DebitCreditTotals, TransactionDraft};
use rust_decimal::Decimal;

#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedLine {
    pub account_id: i64,
    pub amount: Decimal,
    pub sign: AccountSign,
}

/// A line set that passed every rule, with its common debit/credit total.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedEntry {
    pub total: Decimal,
    pub lines: Vec<ValidatedLine>,
}

impl ValidatedEntry {
    pub fn is_split(&self) -> bool {
        self.lines.len() > 2
    }

    /// Distinct account ids in first-seen order.
    pub fn account_ids(&self) -> Vec<i64> {
        let mut ids: Vec<i64> = Vec::with_capacity(self.lines.len());
        for l in &self.lines {
            if !ids.contains(&l.account_id) {
                ids.push(l.account_id);
            }
        }
        ids
    }
}

/// Applies the ledger entry rules in order; the first failure is returned.
pub fn validate(draft: &TransactionDraft) -> Result<ValidatedEntry, ValidationError> {
    if draft.comment.trim().is_empty() {
        return Err(ValidationError::NoComment);
    }
    if draft.lines.is_empty() {
        return Err(ValidationError::NoDebitsCredits);
    }

    let mut lines = Vec::with_capacity(draft.lines.len());
    let mut totals = DebitCreditTotals::default();
    let mut overflowed = false;
    for line in &draft.lines {
        if line.account_id <= 0 {
            return Err(ValidationError::DebitCreditAccountInvalid);
        }
        let sign = line.sign.ok_or(ValidationError::DebitCreditIsNeither)?;
        if totals.add(sign, line.amount).is_none() {
            overflowed = true;
        }
        lines.push(ValidatedLine {
            account_id: line.account_id,
            amount: line.amount,
            sign,
        });
    }

    // a side that cannot be represented has no meaningful total to compare
    if overflowed {
        return Err(ValidationError::DebitCreditAmountInvalid);
    }
    let DebitCreditTotals {
        debit: debits,
        credit: credits,
    } = totals;
    if debits <= Decimal::ZERO || credits <= Decimal::ZERO {
        return Err(ValidationError::DebitCreditsZero);
    }
    if debits != credits {
        return Err(ValidationError::DebitCreditsNotBalanced);
    }
    if lines.iter().any(|l| l.amount <= Decimal::ZERO) {
        return Err(ValidationError::DebitCreditAmountInvalid);
    }

    Ok(ValidatedEntry {
        total: debits,
        lines,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::LineDraft;
    use chrono::NaiveDate;
    use proptest::prelude::*;

    fn draft(comment: &str, lines: Vec<LineDraft>) -> TransactionDraft {
        let mut d = TransactionDraft::new(NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(), comment);
        d.lines = lines;
        d
    }

    fn dec(n: i64) -> Decimal {
        Decimal::new(n, 2)
    }

    #[test]
    fn balanced_pair_passes() {
        let e = validate(&draft(
            "rent",
            vec![LineDraft::debit(1, dec(10000)), LineDraft::credit(2, dec(10000))],
        ))
        .unwrap();
        assert_eq!(e.total, dec(10000));
        assert!(!e.is_split());
        assert_eq!(e.account_ids(), vec![1, 2]);
    }

    #[test]
    fn unbalanced_pair_is_rejected() {
        let err = validate(&draft(
            "rent",
            vec![LineDraft::credit(1, dec(10000)), LineDraft::debit(2, dec(9900))],
        ))
        .unwrap_err();
        assert_eq!(err, ValidationError::DebitCreditsNotBalanced);
    }

    #[test]
    fn comment_is_checked_first() {
        let err = validate(&draft("  ", vec![])).unwrap_err();
        assert_eq!(err, ValidationError::NoComment);
        let err = validate(&draft("x", vec![])).unwrap_err();
        assert_eq!(err, ValidationError::NoDebitsCredits);
    }

    #[test]
    fn per_line_checks_follow_line_order() {
        let neither = LineDraft {
            account_id: 1,
            amount: dec(100),
            sign: None,
        };
        // sign problem on the first line wins over the account id on the second
        let err = validate(&draft("x", vec![neither.clone(), LineDraft::debit(0, dec(100))]))
            .unwrap_err();
        assert_eq!(err, ValidationError::DebitCreditIsNeither);
        let err = validate(&draft("x", vec![LineDraft::debit(-3, dec(100)), neither]))
            .unwrap_err();
        assert_eq!(err, ValidationError::DebitCreditAccountInvalid);
    }

    #[test]
    fn one_sided_sets_total_zero() {
        let err = validate(&draft(
            "x",
            vec![LineDraft::debit(1, dec(100)), LineDraft::debit(2, dec(100))],
        ))
        .unwrap_err();
        assert_eq!(err, ValidationError::DebitCreditsZero);
    }

    #[test]
    fn non_positive_line_is_caught_after_balance() {
        let err = validate(&draft(
            "x",
            vec![
                LineDraft::debit(1, dec(200)),
                LineDraft::debit(2, dec(-100)),
                LineDraft::credit(3, dec(100)),
            ],
        ))
        .unwrap_err();
        assert_eq!(err, ValidationError::DebitCreditAmountInvalid);
    }

    #[test]
    fn three_lines_make_a_split() {
        let e = validate(&draft(
            "groceries and cash back",
            vec![
                LineDraft::debit(1, dec(6000)),
                LineDraft::debit(2, dec(4000)),
                LineDraft::credit(3, dec(10000)),
            ],
        ))
        .unwrap();
        assert!(e.is_split());
        assert_eq!(e.total, dec(10000));
    }

    #[test]
    fn overflowing_side_is_an_invalid_amount() {
        let lines = vec![
            LineDraft::debit(1, Decimal::MAX),
            LineDraft::debit(1, Decimal::MAX),
            LineDraft::credit(2, Decimal::ONE),
        ];
        let err = validate(&draft("huge", lines.clone())).unwrap_err();
        assert_eq!(err, ValidationError::DebitCreditAmountInvalid);

        // per-line rules still run first
        let mut bad = lines;
        bad.push(LineDraft::credit(0, Decimal::ONE));
        let err = validate(&draft("huge", bad)).unwrap_err();
        assert_eq!(err, ValidationError::DebitCreditAccountInvalid);
    }

    proptest! {
        #[test]
        fn balanced_positive_sets_always_validate(
            debits in prop::collection::vec(1i64..1_000_000, 1..6),
            split_at in 0usize..5,
        ) {
            let total: i64 = debits.iter().sum();
            let cut = total * (split_at as i64 % 2 + 1) / 3;
            let mut credits = vec![total - cut];
            if cut > 0 {
                credits.push(cut);
            }
            let mut lines: Vec<LineDraft> = debits
                .iter()
                .enumerate()
                .map(|(i, d)| LineDraft::debit(i as i64 + 1, dec(*d)))
                .collect();
            lines.extend(credits.iter().map(|c| LineDraft::credit(99, dec(*c))));
            let e = validate(&draft("generated", lines)).unwrap();
            prop_assert_eq!(e.total, dec(total));
        }

        #[test]
        fn any_imbalance_is_rejected(amount in 1i64..1_000_000, delta in 1i64..1000) {
            let err = validate(&draft(
                "generated",
                vec![LineDraft::debit(1, dec(amount)), LineDraft::credit(2, dec(amount + delta))],
            ))
            .unwrap_err();
            prop_assert_eq!(err, ValidationError::DebitCreditsNotBalanced);
        }
    }
}
