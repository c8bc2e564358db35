use std::collections::HashMap;
use std::sync::Arc;

use futures::future::join_all;
use tracing::{debug, info, instrument};

use crate::asset::{LocatorPattern, MediaKind};
use crate::config::DiscoveryOptions;
use crate::probe::{AssetProbe, exists_within};

/// Probes `[1, max_index]` in batches of at most `opts.concurrency` and
/// returns the indices that exist, ascending.
///
/// Gaps are tolerated: once any asset was found the scan always runs to
/// `max_index`. If the first `opts.early_exit_window` indices are all absent
/// the scan stops there and reports nothing. Probe failures and timeouts
/// count as absent; discovery itself never fails.
#[instrument(skip(probe, pattern, opts), fields(pattern = %pattern))]
pub async fn discover(
    probe: &dyn AssetProbe,
    kind: MediaKind,
    pattern: &LocatorPattern,
    max_index: u32,
    opts: &DiscoveryOptions,
) -> Vec<u32> {
    let concurrency = opts.concurrency.max(1) as u32;
    let window = opts.early_exit_window;
    let mut found = Vec::new();
    let mut probed = 0u32;
    let mut start = 1u32;

    while start <= max_index {
        let mut end = start.saturating_add(concurrency - 1).min(max_index);
        let in_window = window > 0 && found.is_empty() && start <= window;
        if in_window {
            end = end.min(window);
        }

        let batch: Vec<u32> = (start..=end).collect();
        let answers = join_all(batch.iter().map(|&index| {
            let locator = pattern.locate(index);
            async move {
                let res = exists_within(probe, kind, &locator, opts.probe_timeout).await;
                if let Err(err) = &res {
                    debug!(index, error = %err, "absent");
                }
                res.is_ok()
            }
        }))
        .await;
        probed += batch.len() as u32;

        for (index, hit) in batch.into_iter().zip(answers) {
            if hit {
                debug!(index, "found");
                found.push(index);
            }
        }

        if in_window && end == window && found.is_empty() {
            info!(probed, "nothing in the early-exit window; stopping discovery");
            return found;
        }
        start = end + 1;
    }

    info!(found = found.len(), probed, "discovery complete");
    found
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct DiscoveryKey {
    pattern: String,
    max_index: u32,
}

/// Discovered index sets keyed by `(pattern, max_index)`.
///
/// Lives as long as its owner; nothing is written to disk.
#[derive(Debug, Clone, Default)]
pub struct DiscoveryCache {
    entries: HashMap<DiscoveryKey, Arc<[u32]>>,
}

impl DiscoveryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, pattern: &LocatorPattern, max_index: u32) -> Option<Arc<[u32]>> {
        self.entries.get(&Self::key(pattern, max_index)).cloned()
    }

    /// Records a discovery result. Empty results are not kept so that a
    /// later activation tries again.
    pub fn insert(&mut self, pattern: &LocatorPattern, max_index: u32, indices: &[u32]) {
        if indices.is_empty() {
            return;
        }
        self.entries.insert(Self::key(pattern, max_index), Arc::from(indices));
    }

    pub fn invalidate(&mut self, pattern: &LocatorPattern, max_index: u32) -> bool {
        self.entries.remove(&Self::key(pattern, max_index)).is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn key(pattern: &LocatorPattern, max_index: u32) -> DiscoveryKey {
        DiscoveryKey {
            pattern: pattern.to_string(),
            max_index,
        }
    }
}
