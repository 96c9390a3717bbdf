// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Runtime settings, read from the environment (and a `.env` file if present).

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::time::Duration;

pub const ENV_DB: &str = "TREELEDGER_DB";
pub const ENV_BUSY_TIMEOUT: &str = "TREELEDGER_BUSY_TIMEOUT_MS";
pub const ENV_LOG: &str = "TREELEDGER_LOG";
pub const ENV_LOG_JSON: &str = "TREELEDGER_LOG_JSON";

const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5000;
const DEFAULT_LOG_FILTER: &str = "warn";

#[derive(Debug, Clone)]
pub struct Settings {
    /// SQLite database file; `None` means the per-user data directory.
    pub db_path: Option<PathBuf>,
    /// How long a writer waits for another writer's lock.
    pub busy_timeout: Duration,
    /// `tracing_subscriber::EnvFilter` directive.
    pub log_filter: String,
    /// Emit log events as JSON lines.
    pub log_json: bool,
}

impl Settings {
    pub fn load() -> Result<Self> {
        // a missing .env file is normal
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds settings from an arbitrary key lookup.
    pub fn from_lookup<F>(get: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let db_path = get(ENV_DB)
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from);
        let busy_timeout = match get(ENV_BUSY_TIMEOUT) {
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .with_context(|| format!("Invalid {ENV_BUSY_TIMEOUT} '{raw}'"))?,
            None => DEFAULT_BUSY_TIMEOUT_MS,
        };
        let log_filter = get(ENV_LOG)
            .or_else(|| get("RUST_LOG"))
            .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string());
        let log_json = get(ENV_LOG_JSON)
            .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);
        Ok(Self {
            db_path,
            busy_timeout: Duration::from_millis(busy_timeout),
            log_filter,
            log_json,
        })
    }

    pub fn with_db_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.db_path = Some(path.into());
        self
    }

    /// The configured database file, falling back to the data directory
    /// (created on demand) only when none was given.
    pub fn resolved_db_path(&self) -> Result<PathBuf> {
        match &self.db_path {
            Some(p) => Ok(p.clone()),
            None => crate::db::default_db_path(),
        }
    }
}
