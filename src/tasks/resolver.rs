use std::time::Duration;

use futures::future::join_all;
use tracing::{debug, warn};

use crate::asset::{Asset, Dimensions};
use crate::error::Error;
use crate::probe::{AssetProbe, probe_within};

/// Resolves one batch of assets concurrently.
///
/// Results come back in input order. A failed item never aborts the batch;
/// it is logged and returned as [`Error::ResolutionFailed`].
pub async fn resolve_batch(
    probe: &dyn AssetProbe,
    assets: &[Asset],
    timeout: Duration,
) -> Vec<Result<Dimensions, Error>> {
    join_all(assets.iter().map(|asset| async move {
        match probe_within(probe, asset.kind, &asset.locator, timeout).await {
            Ok(dims) => {
                debug!(
                    index = asset.index,
                    width = dims.width,
                    height = dims.height,
                    "resolved"
                );
                Ok(dims)
            }
            Err(err) => {
                warn!(
                    index = asset.index,
                    locator = %asset.locator,
                    error = %err,
                    "resolution failed; keeping placeholder"
                );
                Err(Error::ResolutionFailed {
                    index: asset.index,
                    reason: err.to_string(),
                })
            }
        }
    }))
    .await
}
