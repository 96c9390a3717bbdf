// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind} '{value}'")]
pub struct ParseEnumError {
    kind: &'static str,
    value: String,
}

/// Side of the ledger a line or an account's normal balance sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AccountSign {
    Debit,
    Credit,
}

impl AccountSign {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountSign::Debit => "DEBIT",
            AccountSign::Credit => "CREDIT",
        }
    }
}

impl fmt::Display for AccountSign {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccountSign {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "DEBIT" => Ok(AccountSign::Debit),
            "CREDIT" => Ok(AccountSign::Credit),
            _ => Err(ParseEnumError {
                kind: "account sign",
                value: s.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AccountType {
    Asset,
    Liability,
    Equity,
    Income,
    Expense,
    Gain,
    Loss,
}

impl AccountType {
    pub const ALL: [AccountType; 7] = [
        AccountType::Asset,
        AccountType::Liability,
        AccountType::Equity,
        AccountType::Income,
        AccountType::Expense,
        AccountType::Gain,
        AccountType::Loss,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AccountType::Asset => "ASSET",
            AccountType::Liability => "LIABILITY",
            AccountType::Equity => "EQUITY",
            AccountType::Income => "INCOME",
            AccountType::Expense => "EXPENSE",
            AccountType::Gain => "GAIN",
            AccountType::Loss => "LOSS",
        }
    }

    /// Sign given to a top-level account of this type.
    ///
    /// INCOME is DEBIT-normal and EXPENSE is CREDIT-normal here. Existing
    /// ledgers depend on this table, so keep it as is.
    pub fn normal_sign(&self) -> AccountSign {
        match self {
            AccountType::Asset => AccountSign::Debit,
            AccountType::Liability => AccountSign::Credit,
            AccountType::Equity => AccountSign::Credit,
            AccountType::Income => AccountSign::Debit,
            AccountType::Expense => AccountSign::Credit,
            AccountType::Gain => AccountSign::Credit,
            AccountType::Loss => AccountSign::Debit,
        }
    }
}

impl fmt::Display for AccountType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccountType {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        AccountType::ALL
            .into_iter()
            .find(|t| t.as_str() == upper)
            .ok_or_else(|| ParseEnumError {
                kind: "account type",
                value: s.to_string(),
            })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: i64,
    pub parent_id: Option<i64>,
    pub name: String,
    pub full_name: String,
    pub memo: String,
    pub current: bool,
    pub left: i64,
    pub right: i64,
    pub balance: Decimal,
    pub subtotal: Decimal,
    pub decimals: u32,
    pub reconcile_date: Option<NaiveDate>,
    pub flagged: bool,
    pub locked: bool,
    pub open_date: NaiveDate,
    pub close_date: Option<NaiveDate>,
    pub code: Option<String>,
    pub sign: AccountSign,
    #[serde(rename = "type")]
    pub account_type: AccountType,
}

impl Account {
    /// Width of the interval the account and its subtree occupy.
    pub fn spread(&self) -> i64 {
        self.right - self.left + 1
    }

    pub fn descendant_count(&self) -> i64 {
        (self.right - self.left - 1) / 2
    }

    /// Strict interval containment.
    pub fn is_ancestor_of(&self, other: &Account) -> bool {
        self.left < other.left && other.right < self.right
    }
}

/// Request to place a new account in the tree.
#[derive(Debug, Clone, Default)]
pub struct NewAccount {
    pub parent_id: Option<i64>,
    pub name: String,
    /// Required for top-level accounts; children inherit the parent's type.
    pub account_type: Option<AccountType>,
    pub memo: String,
    pub code: Option<String>,
    pub open_date: Option<NaiveDate>,
    pub decimals: Option<u32>,
}

impl NewAccount {
    pub fn top_level(name: impl Into<String>, account_type: AccountType) -> Self {
        Self {
            name: name.into(),
            account_type: Some(account_type),
            ..Self::default()
        }
    }

    pub fn child_of(parent_id: i64, name: impl Into<String>) -> Self {
        Self {
            parent_id: Some(parent_id),
            name: name.into(),
            ..Self::default()
        }
    }
}

/// Editable account attributes. Renames re-slot the account; a type change
/// is only accepted on a top-level account and carries down its subtree.
#[derive(Debug, Clone, Default)]
pub struct AccountChanges {
    pub name: Option<String>,
    pub account_type: Option<AccountType>,
    pub memo: Option<String>,
    pub code: Option<Option<String>>,
    pub current: Option<bool>,
    pub flagged: Option<bool>,
    pub locked: Option<bool>,
    pub close_date: Option<Option<NaiveDate>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccountWithLevel {
    #[serde(flatten)]
    pub account: Account,
    /// Number of accounts strictly containing this one.
    pub level: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DebitCreditLine {
    pub id: i64,
    pub transaction_id: i64,
    pub account_id: i64,
    pub amount: Decimal,
    pub sign: AccountSign,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: i64,
    pub date: NaiveDate,
    pub reconcile_date: Option<NaiveDate>,
    pub comment: String,
    pub amount: Decimal,
    pub reference: String,
    pub is_reconciled: bool,
    pub is_split: bool,
    pub lines: Vec<DebitCreditLine>,
}

impl Transaction {
    /// Sum of the lines on `sign`; `None` if the sum overflows.
    pub fn total_for(&self, sign: AccountSign) -> Option<Decimal> {
        self.lines
            .iter()
            .filter(|l| l.sign == sign)
            .try_fold(Decimal::ZERO, |acc, l| acc.checked_add(l.amount))
    }
}

/// A line as submitted by a caller, before validation.
#[derive(Debug, Clone, PartialEq)]
pub struct LineDraft {
    pub account_id: i64,
    pub amount: Decimal,
    /// `None` when the submitted sign was neither DEBIT nor CREDIT.
    pub sign: Option<AccountSign>,
}

impl LineDraft {
    pub fn debit(account_id: i64, amount: Decimal) -> Self {
        Self {
            account_id,
            amount,
            sign: Some(AccountSign::Debit),
        }
    }

    pub fn credit(account_id: i64, amount: Decimal) -> Self {
        Self {
            account_id,
            amount,
            sign: Some(AccountSign::Credit),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransactionDraft {
    pub date: NaiveDate,
    pub comment: String,
    pub reference: String,
    pub lines: Vec<LineDraft>,
}

impl TransactionDraft {
    pub fn new(date: NaiveDate, comment: impl Into<String>) -> Self {
        Self {
            date,
            comment: comment.into(),
            reference: String::new(),
            lines: Vec::new(),
        }
    }

    pub fn reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = reference.into();
        self
    }

    pub fn line(mut self, line: LineDraft) -> Self {
        self.lines.push(line);
        self
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DebitCreditTotals {
    pub debit: Decimal,
    pub credit: Decimal,
}

impl DebitCreditTotals {
    /// Adds `amount` to the `sign` side. Returns `None` and leaves the totals
    /// untouched when the side would overflow.
    #[must_use]
    pub fn add(&mut self, sign: AccountSign, amount: Decimal) -> Option<()> {
        let side = match sign {
            AccountSign::Debit => &mut self.debit,
            AccountSign::Credit => &mut self.credit,
        };
        *side = side.checked_add(amount)?;
        Some(())
    }

    /// Net amount seen from an account whose normal side is `sign`.
    pub fn net_for(&self, sign: AccountSign) -> Decimal {
        match sign {
            AccountSign::Debit => self.debit - self.credit,
            AccountSign::Credit => self.credit - self.debit,
        }
    }
}

/// One debit/credit line joined with its transaction header.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LedgerRow {
    pub transaction_id: i64,
    pub line_id: i64,
    pub account_id: i64,
    pub date: NaiveDate,
    pub reconcile_date: Option<NaiveDate>,
    pub comment: String,
    pub reference: String,
    pub is_reconciled: bool,
    pub is_split: bool,
    pub amount: Decimal,
    pub sign: AccountSign,
    /// Comma-separated full names of the accounts on the other side.
    pub split: String,
}

/// A consistency problem reported by `doctor`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Issue {
    pub code: &'static str,
    pub detail: String,
}

impl Issue {
    pub fn new(code: &'static str, detail: impl Into<String>) -> Self {
        Self {
            code,
            detail: detail.into(),
        }
    }
}
