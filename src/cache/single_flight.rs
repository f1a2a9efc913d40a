use std::future::Future;

use bytes::Bytes;
use tokio::sync::OnceCell;

use crate::error::Result;

/// Write-once cell whose value is produced by exactly one caller.
///
/// Concurrent callers of [`SingleFlight::get_or_fetch`] block until the first
/// caller's fetch completes and then all observe the same outcome, including
/// the same error.  The outcome is never invalidated.  If the fetching caller
/// is dropped mid-flight the cell stays empty and the next caller fetches.
#[derive(Debug)]
pub struct SingleFlight<T> {
    cell: OnceCell<Result<T>>,
}

impl<T> Default for SingleFlight<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> SingleFlight<T> {
    pub fn new() -> Self {
        Self {
            cell: OnceCell::new(),
        }
    }

    pub fn is_populated(&self) -> bool {
        self.cell.initialized()
    }
}

impl<T: Clone> SingleFlight<T> {
    /// Return the stored outcome, running `fetch` first if nobody has yet.
    pub async fn get_or_fetch<F, Fut>(&self, fetch: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.cell.get_or_init(fetch).await.clone()
    }
}

/// Canonical package bytes of one layer.
pub type LayerContentCache = SingleFlight<Bytes>;
