use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::Result;
use tokio::select;
use tokio::sync::mpsc::{Receiver, Sender};
use tokio::task::JoinSet;
use tokio::time::{Instant, sleep_until};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::asset::{Asset, Dimensions, MediaKind};
use crate::config::Configuration;
use crate::events::{GalleryEvent, HostCommand};
use crate::gallery::{MediaGallery, Phase};
use crate::probe::{AssetProbe, ProbeOutcome};
use crate::processing::visibility::visible_indices;
use crate::tasks::discovery::{DiscoveryCache, discover};
use crate::tasks::resolver::resolve_batch;

/// Result of one pipeline step, tagged with the generation it was started for.
#[derive(Debug)]
enum Step {
    Discovered {
        kind: MediaKind,
        generation: u64,
        indices: Vec<u32>,
    },
    Resolved {
        kind: MediaKind,
        generation: u64,
        results: Vec<(u32, Option<Dimensions>)>,
    },
}

/// Owns every media kind's gallery and drives discovery → placeholders →
/// batched resolution → settled.
///
/// All state is mutated from [`GalleryController::run`] only; probes run as
/// spawned steps whose results are applied back inside the loop.
pub struct GalleryController {
    cfg: Configuration,
    probe: Arc<dyn AssetProbe>,
    cache: DiscoveryCache,
    galleries: BTreeMap<MediaKind, MediaGallery>,
    container_width: f32,
    active: Option<MediaKind>,
    viewport: Option<(f32, f32)>,
    pending_width: Option<f32>,
    resize_deadline: Option<Instant>,
    events: Sender<GalleryEvent>,
    steps: JoinSet<Step>,
}

impl GalleryController {
    pub fn new(
        cfg: Configuration,
        probe: Arc<dyn AssetProbe>,
        container_width: f32,
        events: Sender<GalleryEvent>,
    ) -> Self {
        let galleries = MediaKind::ALL
            .into_iter()
            .map(|kind| (kind, MediaGallery::new(kind)))
            .collect();
        Self {
            cfg,
            probe,
            cache: DiscoveryCache::new(),
            galleries,
            container_width,
            active: None,
            viewport: None,
            pending_width: None,
            resize_deadline: None,
            events,
            steps: JoinSet::new(),
        }
    }

    /// Reuse discovery results from an earlier controller.
    pub fn with_cache(mut self, cache: DiscoveryCache) -> Self {
        self.cache = cache;
        self
    }

    pub fn cache(&self) -> &DiscoveryCache {
        &self.cache
    }

    pub fn gallery(&self, kind: MediaKind) -> Option<&MediaGallery> {
        self.galleries.get(&kind)
    }

    pub fn container_width(&self) -> f32 {
        self.container_width
    }

    /// Processes host commands until cancelled, or until the command channel
    /// closes and no pipeline step or pending resize is left.
    pub async fn run(
        &mut self,
        mut commands: Receiver<HostCommand>,
        cancel: CancellationToken,
    ) -> Result<()> {
        let mut commands_open = true;
        loop {
            if !commands_open && self.steps.is_empty() && self.resize_deadline.is_none() {
                break;
            }
            let deadline = self.resize_deadline;
            select! {
                _ = cancel.cancelled() => {
                    info!("cancel received; stopping gallery controller");
                    self.steps.abort_all();
                    break;
                }

                maybe_cmd = commands.recv(), if commands_open => match maybe_cmd {
                    Some(cmd) => self.handle_command(cmd).await,
                    None => {
                        debug!("host command channel closed");
                        commands_open = false;
                    }
                },

                _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    self.resize_deadline = None;
                    if let Some(width) = self.pending_width.take() {
                        self.apply_resize(width).await;
                    }
                }

                Some(joined) = self.steps.join_next(), if !self.steps.is_empty() => match joined {
                    Ok(Step::Discovered { kind, generation, indices }) => {
                        self.on_discovered(kind, generation, indices).await;
                    }
                    Ok(Step::Resolved { kind, generation, results }) => {
                        self.on_resolved(kind, generation, results).await;
                    }
                    Err(err) => error!("pipeline step failed: {err}"),
                },
            }
        }
        Ok(())
    }

    async fn handle_command(&mut self, cmd: HostCommand) {
        debug!(?cmd, "host command");
        match cmd {
            HostCommand::Activate(kind) => {
                self.active = Some(kind);
                self.activate(kind, true).await;
            }
            HostCommand::ScrollNearBottom(kind) => self.activate(kind, false).await,
            HostCommand::Resize { width } => {
                self.pending_width = Some(width);
                self.resize_deadline = Some(Instant::now() + self.cfg.resize_debounce);
            }
            HostCommand::Viewport { top, height } => {
                self.viewport = Some((top, height));
                if let Some(kind) = self.active {
                    self.refresh_visibility(kind).await;
                }
            }
            HostCommand::Refresh(kind) => {
                let source = self.cfg.source(kind);
                self.cache.invalidate(&source.pattern, source.max_index);
                if let Some(gallery) = self.galleries.get_mut(&kind) {
                    gallery.reset();
                }
                info!(%kind, "refreshing gallery");
                self.start(kind).await;
            }
        }
    }

    async fn activate(&mut self, kind: MediaKind, relayout_settled: bool) {
        let Some(phase) = self.galleries.get(&kind).map(MediaGallery::phase) else {
            return;
        };
        match phase {
            Phase::Idle => self.start(kind).await,
            Phase::Settled if relayout_settled => self.publish_layout(kind).await,
            _ => debug!(%kind, ?phase, "activation ignored"),
        }
    }

    async fn start(&mut self, kind: MediaKind) {
        let Some(generation) = self
            .galleries
            .get_mut(&kind)
            .and_then(MediaGallery::begin_discovery)
        else {
            return;
        };
        let source = self.cfg.source(kind).clone();

        if let Some(indices) = self.cache.get(&source.pattern, source.max_index) {
            info!(%kind, found = indices.len(), "using cached discovery");
            self.on_discovered(kind, generation, indices.to_vec()).await;
            return;
        }

        info!(%kind, pattern = %source.pattern, max_index = source.max_index, "discovering");
        let probe = Arc::clone(&self.probe);
        let opts = self.cfg.discovery.clone();
        self.steps.spawn(async move {
            let indices = discover(
                probe.as_ref(),
                kind,
                &source.pattern,
                source.max_index,
                &opts,
            )
            .await;
            Step::Discovered {
                kind,
                generation,
                indices,
            }
        });
    }

    async fn on_discovered(&mut self, kind: MediaKind, generation: u64, indices: Vec<u32>) {
        let source = self.cfg.source(kind).clone();
        let Some(gallery) = self.galleries.get_mut(&kind) else {
            return;
        };
        if gallery.generation() != generation || gallery.phase() != Phase::Discovering {
            debug!(%kind, generation, "discarding stale discovery result");
            return;
        }

        self.cache.insert(&source.pattern, source.max_index, &indices);

        if indices.is_empty() {
            gallery.discovery_empty();
            info!(%kind, pattern = %source.pattern, "no assets found");
            emit(
                &self.events,
                GalleryEvent::DiscoveryEmpty {
                    kind,
                    pattern: source.pattern.to_string(),
                },
            )
            .await;
            return;
        }

        let created = gallery.place_placeholders(
            &indices,
            &source.pattern,
            source.placeholder_aspect_ratio,
        );
        gallery.relayout(self.container_width, &self.cfg.layout);
        // Re-read so the emitted items carry their first placement.
        let created: Vec<_> = created
            .iter()
            .filter_map(|item| gallery.set().get(item.index()).cloned())
            .collect();
        info!(%kind, placeholders = created.len(), "placeholders placed");

        for item in created {
            emit(&self.events, GalleryEvent::PlaceholderCreated(item)).await;
        }
        self.publish_layout(kind).await;
        self.schedule_next_batch(kind).await;
    }

    async fn schedule_next_batch(&mut self, kind: MediaKind) {
        let batch_size = self.cfg.resolution.batch_size;
        let Some(gallery) = self.galleries.get_mut(&kind) else {
            return;
        };
        let generation = gallery.generation();
        let batch: Vec<Asset> = gallery.next_batch(batch_size);

        if batch.is_empty() {
            if gallery.try_settle() {
                let (settled, total) = gallery.progress();
                info!(%kind, settled, total, "gallery settled");
                emit(&self.events, GalleryEvent::AllSettled { kind }).await;
            }
            return;
        }

        debug!(%kind, first = batch[0].index, len = batch.len(), "resolving batch");
        let probe = Arc::clone(&self.probe);
        let timeout = self.cfg.resolution.probe_timeout;
        self.steps.spawn(async move {
            let answers = resolve_batch(probe.as_ref(), &batch, timeout).await;
            let results = batch
                .iter()
                .zip(answers)
                .map(|(asset, res)| {
                    let outcome = ProbeOutcome::from_result(&asset.locator, res);
                    (asset.index, outcome.dimensions())
                })
                .collect();
            Step::Resolved {
                kind,
                generation,
                results,
            }
        });
    }

    async fn on_resolved(
        &mut self,
        kind: MediaKind,
        generation: u64,
        results: Vec<(u32, Option<Dimensions>)>,
    ) {
        let Some(gallery) = self.galleries.get_mut(&kind) else {
            return;
        };
        if gallery.generation() != generation || gallery.phase() != Phase::Resolving {
            debug!(%kind, generation, "discarding stale resolution batch");
            return;
        }

        let resolved = gallery.apply_batch(results);
        gallery.relayout(self.container_width, &self.cfg.layout);
        let resolved: Vec<_> = resolved
            .iter()
            .filter_map(|item| gallery.set().get(item.index()).cloned())
            .collect();

        for item in resolved {
            emit(&self.events, GalleryEvent::ItemResolved(item)).await;
        }
        self.publish_layout(kind).await;
        self.schedule_next_batch(kind).await;
    }

    async fn apply_resize(&mut self, width: f32) {
        info!(width, "container resized");
        self.container_width = width;
        let kinds: Vec<MediaKind> = self
            .galleries
            .values_mut()
            .filter(|g| g.last_layout().is_some())
            .map(|g| {
                g.relayout(width, &self.cfg.layout);
                g.kind
            })
            .collect();
        for kind in kinds {
            self.publish_layout(kind).await;
        }
    }

    /// Emits the current layout (re-running it if none exists yet) and progress.
    async fn publish_layout(&mut self, kind: MediaKind) {
        let Some(gallery) = self.galleries.get_mut(&kind) else {
            return;
        };
        let layout = match gallery.last_layout() {
            Some(layout) => layout.clone(),
            None => gallery.relayout(self.container_width, &self.cfg.layout).clone(),
        };
        let (settled, total) = gallery.progress();
        emit(&self.events, GalleryEvent::LayoutComputed { kind, layout }).await;
        emit(
            &self.events,
            GalleryEvent::Progress {
                kind,
                settled,
                total,
            },
        )
        .await;
        if self.active == Some(kind) {
            self.refresh_visibility(kind).await;
        }
    }

    async fn refresh_visibility(&mut self, kind: MediaKind) {
        let Some((top, height)) = self.viewport else {
            return;
        };
        let threshold = self.cfg.visibility_threshold;
        let Some(gallery) = self.galleries.get_mut(&kind) else {
            return;
        };
        let Some(layout) = gallery.last_layout() else {
            return;
        };
        let visible = visible_indices(layout, top, height, threshold);
        let delta = gallery.visibility.update(visible);
        if !delta.is_empty() {
            emit(
                &self.events,
                GalleryEvent::VisibilityChanged {
                    kind,
                    entered: delta.entered,
                    left: delta.left,
                },
            )
            .await;
        }
    }
}

async fn emit(events: &Sender<GalleryEvent>, event: GalleryEvent) {
    let _ = events.send(event).await;
}
