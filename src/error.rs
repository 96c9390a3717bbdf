// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Error taxonomy for the account tree and the transaction engine.

use thiserror::Error;

/// Reasons a transaction's debit/credit line set is rejected.
///
/// Variants are listed in evaluation order; the first failing rule wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("transaction has no comment")]
    NoComment,

    #[error("transaction has no debits/credits")]
    NoDebitsCredits,

    #[error("transaction debit-credit has invalid account id")]
    DebitCreditAccountInvalid,

    #[error("transaction debit-credit is neither DEBIT nor CREDIT")]
    DebitCreditIsNeither,

    #[error("transaction debits or credits total zero")]
    DebitCreditsZero,

    #[error("transaction debits do not equal credits")]
    DebitCreditsNotBalanced,

    #[error("transaction debit-credit amount must be positive")]
    DebitCreditAmountInvalid,
}

impl ValidationError {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NoComment => "NO_COMMENT",
            Self::NoDebitsCredits => "NO_DEBITS_CREDITS",
            Self::DebitCreditAccountInvalid => "DEBIT_CREDIT_ACCOUNT_INVALID",
            Self::DebitCreditIsNeither => "DEBIT_CREDIT_IS_NEITHER",
            Self::DebitCreditsZero => "DEBIT_CREDITS_ZERO",
            Self::DebitCreditsNotBalanced => "DEBIT_CREDITS_NOT_BALANCED",
            Self::DebitCreditAmountInvalid => "DEBIT_CREDIT_AMOUNT_INVALID",
        }
    }
}

/// Coarse classification callers branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Structural,
    Validation,
    NotFound,
    Persistence,
}

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("account name cannot be empty")]
    EmptyAccountName,

    #[error("top-level account needs an account type to determine its sign")]
    MissingAccountType,

    #[error("account {0} inherits its type from its parent; retype the top-level account instead")]
    TypeChangeOnChild(i64),

    #[error("account not found: {0}")]
    AccountNotFound(i64),

    #[error("transaction not found: {0}")]
    TransactionNotFound(i64),

    #[error("cannot move account {account} beneath its own subtree (target parent {target})")]
    MoveIntoOwnSubtree { account: i64, target: i64 },

    #[error("account tree invariant violated: {0}")]
    StructuralInvariant(String),

    #[error("stored value could not be read back: {0}")]
    Corrupt(String),

    #[error("persistence failure while {context}")]
    Persistence {
        context: String,
        #[source]
        source: rusqlite::Error,
    },
}

impl LedgerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_)
            | Self::EmptyAccountName
            | Self::MissingAccountType
            | Self::TypeChangeOnChild(_) => ErrorKind::Validation,
            Self::AccountNotFound(_) | Self::TransactionNotFound(_) => ErrorKind::NotFound,
            Self::MoveIntoOwnSubtree { .. } | Self::StructuralInvariant(_) => {
                ErrorKind::Structural
            }
            Self::Corrupt(_) | Self::Persistence { .. } => ErrorKind::Persistence,
        }
    }

    /// The validator rule that rejected the request, if any.
    pub fn validation(&self) -> Option<ValidationError> {
        match self {
            Self::Validation(v) => Some(*v),
            _ => None,
        }
    }
}

pub type Result<T, E = LedgerError> = std::result::Result<T, E>;

/// Attaches a description of the attempted storage operation to SQLite errors.
pub trait PersistContext<T> {
    fn persist(self, context: &str) -> Result<T>;

    fn with_persist<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

fn classify(context: String, source: rusqlite::Error) -> LedgerError {
    match source {
        rusqlite::Error::FromSqlConversionFailure(col, _, err) => {
            LedgerError::Corrupt(format!("{context}: column {col}: {err}"))
        }
        source => LedgerError::Persistence { context, source },
    }
}

impl<T> PersistContext<T> for std::result::Result<T, rusqlite::Error> {
    fn persist(self, context: &str) -> Result<T> {
        self.map_err(|source| classify(context.to_string(), source))
    }

    fn with_persist<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|source| classify(f(), source))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_errors_classify_as_validation() {
        let err = LedgerError::from(ValidationError::DebitCreditsNotBalanced);
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(
            err.validation(),
            Some(ValidationError::DebitCreditsNotBalanced)
        );
        assert_eq!(err.to_string(), "transaction debits do not equal credits");
    }

    #[test]
    fn kinds_cover_the_taxonomy() {
        assert_eq!(LedgerError::AccountNotFound(7).kind(), ErrorKind::NotFound);
        assert_eq!(
            LedgerError::MoveIntoOwnSubtree {
                account: 1,
                target: 2
            }
            .kind(),
            ErrorKind::Structural
        );
        assert_eq!(
            LedgerError::Corrupt("bad sign".into()).kind(),
            ErrorKind::Persistence
        );
        assert!(LedgerError::TransactionNotFound(3).validation().is_none());
    }

    #[test]
    fn persist_wraps_sqlite_errors_with_context() {
        let res: std::result::Result<(), rusqlite::Error> =
            Err(rusqlite::Error::QueryReturnedNoRows);
        let err = res.persist("loading account 4").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Persistence);
        assert_eq!(err.to_string(), "persistence failure while loading account 4");
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn conversion_failures_surface_as_corrupt() {
        let bad = "SIDEWAYS".parse::<crate::models::AccountSign>().unwrap_err();
        let res: std::result::Result<(), rusqlite::Error> = Err(
            rusqlite::Error::FromSqlConversionFailure(
                17,
                rusqlite::types::Type::Text,
                Box::new(bad),
            ),
        );
        let err = res.with_persist(|| "loading account 9".into()).unwrap_err();
        assert!(matches!(err, LedgerError::Corrupt(_)));
        assert_eq!(
            err.to_string(),
            "stored value could not be read back: loading account 9: column 17: unknown account sign 'SIDEWAYS'"
        );
    }

    #[test]
    fn codes_are_stable() {
        assert_eq!(ValidationError::NoComment.code(), "NO_COMMENT");
        assert_eq!(
            ValidationError::DebitCreditsZero.code(),
            "DEBIT_CREDITS_ZERO"
        );
    }
}
