use tracing::info;

use super::context::RunContext;
use crate::error::{BalanceError, Result};

/// Latest published version of `layer_name` in `region`.
///
/// A layer that was never published in the region is a [`BalanceError::NotFound`],
/// not version 0.
pub async fn probe(ctx: &RunContext, layer_name: &str, region: &str) -> Result<i64> {
    ctx.metrics.metrics.probes.inc();

    let version = ctx
        .provider
        .latest_version(layer_name, region)
        .await?
        .ok_or_else(|| BalanceError::not_found(layer_name, region))?;

    info!(layer = layer_name, region, version, "probed layer version");
    Ok(version)
}
