// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Core ledger: the nested-set account tree, the double-entry transaction
//! engine and the range aggregations over both.
//!
//! Every mutation takes `&mut Connection` and runs inside one IMMEDIATE
//! SQLite transaction; reads take `&Connection`.

pub mod engine;
pub mod intervals;
pub mod subtotals;
pub mod tree;
pub mod validate;
