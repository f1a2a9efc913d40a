use tracing::{debug, info, instrument};

use super::context::{CanonicalLayer, RunContext};
use super::fetcher::fetch_canonical_content;
use super::prober::probe;
use crate::error::Result;
use crate::metrics::RegionLabels;
use crate::provider::{PermissionGrant, PublishRequest};

/// Publish copies of the canonical package in `region` until its latest
/// version number reaches `target`.
///
/// Each publish is followed by its public-access grant before the next publish
/// starts.  Versions already published stay published if a later step fails.
/// A region already at or above `target` is left untouched.
#[instrument(skip(ctx, layer), fields(layer = %layer.name()))]
pub async fn harmonize(
    ctx: &RunContext,
    region: &str,
    layer: &CanonicalLayer,
    target: i64,
) -> Result<()> {
    let mut current = probe(ctx, layer.name(), region).await?;
    if current >= target {
        debug!(current, target, "region already balanced");
        return Ok(());
    }

    while current < target {
        info!(current, target, "bumping layer version");

        let content = fetch_canonical_content(ctx, layer).await?;
        let request = PublishRequest {
            layer_name: layer.name().to_string(),
            description: layer.definition.description.clone(),
            content,
            architecture: ctx.regions.publish_architecture(&layer.definition, region),
            compatible_runtimes: ctx.publish.compatible_runtimes.clone(),
            license: ctx.publish.license.clone(),
        };

        let published = ctx.provider.publish_version(region, &request).await?;
        ctx.metrics
            .metrics
            .publishes
            .get_or_create(&RegionLabels {
                region: region.to_string(),
            })
            .inc();

        ctx.provider
            .grant_permission(region, &permission_for(ctx, layer, published))
            .await?;
        ctx.metrics.metrics.permission_grants.inc();

        debug!(published, "layer version published and made public");
        current += 1;
    }

    info!(target, "region balanced");
    Ok(())
}

fn permission_for(ctx: &RunContext, layer: &CanonicalLayer, version: i64) -> PermissionGrant {
    PermissionGrant {
        layer_name: layer.name().to_string(),
        version,
        statement_id: ctx.publish.statement_id.clone(),
        action: ctx.publish.action.clone(),
        principal: ctx.publish.principal.clone(),
    }
}
