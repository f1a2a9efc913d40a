use bytes::Bytes;
use tracing::{debug, info, instrument};

use super::context::{CanonicalLayer, RunContext};
use super::prober::probe;
use crate::error::Result;

/// Package bytes of `layer`'s latest version in the canonical region.
///
/// The first caller downloads; every other caller, concurrent or later,
/// receives the cached outcome.
pub async fn fetch_canonical_content(ctx: &RunContext, layer: &CanonicalLayer) -> Result<Bytes> {
    if layer.content.is_populated() {
        debug!(layer = %layer.name(), "reusing canonical layer package");
    }
    layer
        .content
        .get_or_fetch(|| download_canonical(ctx, layer))
        .await
}

#[instrument(skip_all, fields(layer = %layer.name(), region = %ctx.canonical_region))]
async fn download_canonical(ctx: &RunContext, layer: &CanonicalLayer) -> Result<Bytes> {
    let region = ctx.canonical_region.as_str();

    let version = probe(ctx, layer.name(), region).await?;
    let location = ctx
        .provider
        .content_location(layer.name(), version, region)
        .await?;

    info!(version, "downloading canonical layer package");
    let body = ctx.provider.download(&location).await?;

    let m = &ctx.metrics.metrics;
    m.downloads.inc();
    m.download_bytes.inc_by(body.len() as u64);

    info!(version, bytes = body.len(), "canonical layer package downloaded");
    Ok(body)
}
