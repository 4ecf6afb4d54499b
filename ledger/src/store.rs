//! Portfolio persistence.

use std::path::{Path, PathBuf};

use fxhub_common::{storage, Result};

use crate::wallet::Portfolio;

/// File-backed store for user portfolios.
///
/// All portfolios live in one JSON array. The document on disk is the
/// source of truth: mutations re-read it, replace one element and write
/// the whole array back atomically. A single writing process is assumed.
#[derive(Debug, Clone)]
pub struct PortfolioStore {
    path: PathBuf,
}

impl PortfolioStore {
    /// Store over the given portfolio file.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the portfolio document.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every stored portfolio. A missing file is an empty list.
    pub fn read_all(&self) -> Result<Vec<Portfolio>> {
        storage::read_json_or_default(&self.path)
    }

    /// Find one user's portfolio.
    pub fn find(&self, user_id: i64) -> Result<Option<Portfolio>> {
        Ok(self
            .read_all()?
            .into_iter()
            .find(|p| p.user_id() == user_id))
    }

    /// Insert or replace one user's portfolio and persist the list.
    pub fn upsert(&self, portfolio: &Portfolio) -> Result<()> {
        let mut all = self.read_all()?;
        match all.iter_mut().find(|p| p.user_id() == portfolio.user_id()) {
            Some(slot) => *slot = portfolio.clone(),
            None => all.push(portfolio.clone()),
        }
        storage::write_json_atomic(&self.path, &all)
    }
}
