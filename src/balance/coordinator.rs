//! Two-phase balancing run.
//!
//! Discovery probes every (layer, region) pair and reduces the observations
//! to a single target version.  Harmonization then brings every pair up to
//! that target.  Both phases are fail-fast: the first error cancels the
//! phase's token, all tasks are joined, and that first error is returned.

use std::future::Future;
use std::sync::Arc;

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use super::context::{CanonicalLayer, RunContext};
use super::harmonizer::harmonize;
use super::prober::probe;
use crate::error::{BalanceError, Result};

pub struct Coordinator {
    ctx: Arc<RunContext>,
    /// Cancelled by the operator interrupt.
    shutdown: CancellationToken,
}

impl Coordinator {
    pub fn new(ctx: RunContext, shutdown: CancellationToken) -> Self {
        Self {
            ctx: Arc::new(ctx),
            shutdown,
        }
    }

    pub fn context(&self) -> &RunContext {
        &self.ctx
    }

    /// Run discovery then harmonization, returning the version every pair was
    /// brought to.
    pub async fn run(&self) -> Result<i64> {
        let target = self.discover().await.inspect_err(|e| {
            error!(error = %e, "failed to discover layer versions");
        })?;
        self.ctx.metrics.metrics.target_version.set(target);
        info!(target, "greatest version found, bumping all regions");

        self.balance(target).await.inspect_err(|e| {
            error!(error = %e, "failed to balance regions");
        })?;

        info!(target, "all layers balanced");
        Ok(target)
    }

    /// Greatest version published for any layer in any region.
    pub async fn discover(&self) -> Result<i64> {
        let versions = self
            .fan_out(|ctx, layer, region| async move { probe(&ctx, layer.name(), &region).await })
            .await?;

        versions
            .into_iter()
            .max()
            .ok_or_else(|| BalanceError::Config("no layer and region pairs to balance".into()))
    }

    /// Bring every pair up to `target`.
    pub async fn balance(&self, target: i64) -> Result<()> {
        self.fan_out(move |ctx, layer, region| async move {
            harmonize(&ctx, &region, &layer, target).await
        })
        .await?;
        Ok(())
    }

    async fn fan_out<T, F, Fut>(&self, task: F) -> Result<Vec<T>>
    where
        T: Send + 'static,
        F: Fn(Arc<RunContext>, Arc<CanonicalLayer>, String) -> Fut,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let token = self.shutdown.child_token();
        let mut tasks = JoinSet::new();

        for (layer, region) in self.ctx.pairs() {
            let token = token.clone();
            let work = task(Arc::clone(&self.ctx), layer, region);
            tasks.spawn(async move {
                tokio::select! {
                    biased;
                    () = token.cancelled() => Err(BalanceError::Cancelled),
                    res = work => res,
                }
            });
        }

        let mut results = Vec::with_capacity(tasks.len());
        let mut first_error = None;

        while let Some(joined) = tasks.join_next().await {
            let res = match joined {
                Ok(res) => res,
                Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
                Err(_) => Err(BalanceError::Cancelled),
            };
            match res {
                Ok(value) => results.push(value),
                Err(e) if first_error.is_none() => {
                    token.cancel();
                    first_error = Some(e);
                }
                Err(_) => {}
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(results),
        }
    }
}
