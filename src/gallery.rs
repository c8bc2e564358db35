//! Per-kind gallery state: the item set and its lifecycle phase.

use std::collections::{BTreeMap, VecDeque};

use serde::Serialize;

use crate::asset::{Asset, Dimensions, LocatorPattern, MediaKind};
use crate::processing::layout::{self, LayoutParams, MasonryLayout, Placement};
use crate::processing::visibility::VisibilityTracker;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum PlacementState {
    Placeholder,
    Resolved,
    /// Resolution gave up; the placeholder geometry stays.
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Item {
    pub asset: Asset,
    /// `height / width`.
    pub aspect_ratio: f32,
    pub state: PlacementState,
    /// Written by every layout pass; `None` before the first one.
    pub placement: Option<Placement>,
}

impl Item {
    pub fn index(&self) -> u32 {
        self.asset.index
    }
}

/// Items of one media kind, ordered by asset index.
#[derive(Debug, Clone, Default)]
pub struct GallerySet {
    items: BTreeMap<u32, Item>,
}

impl GallerySet {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn get(&self, index: u32) -> Option<&Item> {
        self.items.get(&index)
    }

    pub fn items(&self) -> impl Iterator<Item = &Item> {
        self.items.values()
    }

    /// Adds a placeholder for `asset` unless that index is already present.
    pub fn insert_placeholder(&mut self, asset: Asset, aspect_ratio: f32) -> Option<&Item> {
        let index = asset.index;
        if self.items.contains_key(&index) {
            return None;
        }
        let item = Item {
            asset,
            aspect_ratio,
            state: PlacementState::Placeholder,
            placement: None,
        };
        Some(&*self.items.entry(index).or_insert(item))
    }

    /// Replaces a placeholder's ratio with the real one. Happens at most once
    /// per item; degenerate dimensions leave the item failed instead.
    pub fn resolve(&mut self, index: u32, dims: Dimensions) -> Option<&Item> {
        let item = self.items.get_mut(&index)?;
        if item.state != PlacementState::Placeholder {
            return None;
        }
        match dims.aspect_ratio() {
            Some(ratio) => {
                item.aspect_ratio = ratio;
                item.state = PlacementState::Resolved;
                Some(&*item)
            }
            None => {
                item.state = PlacementState::Failed;
                None
            }
        }
    }

    pub fn mark_failed(&mut self, index: u32) {
        if let Some(item) = self.items.get_mut(&index)
            && item.state == PlacementState::Placeholder
        {
            item.state = PlacementState::Failed;
        }
    }

    pub fn layout_inputs(&self) -> Vec<(u32, f32)> {
        self.items
            .values()
            .map(|item| (item.asset.index, item.aspect_ratio))
            .collect()
    }

    pub fn apply_layout(&mut self, layout: &MasonryLayout) {
        for placement in &layout.placements {
            if let Some(item) = self.items.get_mut(&placement.index) {
                item.placement = Some(*placement);
            }
        }
    }

    pub fn count(&self, state: PlacementState) -> usize {
        self.items.values().filter(|item| item.state == state).count()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Phase {
    Idle,
    Discovering,
    PlaceholdersPlaced,
    Resolving,
    Settled,
}

/// Lifecycle of one media kind, without any I/O.
///
/// The controller drives it: `begin_discovery` → `place_placeholders` →
/// (`next_batch` → `apply_batch`)* until settled.
#[derive(Debug, Clone)]
pub struct MediaGallery {
    pub kind: MediaKind,
    phase: Phase,
    /// Bumped whenever the set is rebuilt; stale pipeline results carry an old value.
    generation: u64,
    set: GallerySet,
    pending: VecDeque<u32>,
    in_flight: usize,
    last_layout: Option<MasonryLayout>,
    pub visibility: VisibilityTracker,
}

impl MediaGallery {
    pub fn new(kind: MediaKind) -> Self {
        Self {
            kind,
            phase: Phase::Idle,
            generation: 0,
            set: GallerySet::default(),
            pending: VecDeque::new(),
            in_flight: 0,
            last_layout: None,
            visibility: VisibilityTracker::default(),
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn set(&self) -> &GallerySet {
        &self.set
    }

    pub fn last_layout(&self) -> Option<&MasonryLayout> {
        self.last_layout.as_ref()
    }

    /// Whether a discovery or resolution pipeline is currently running.
    pub fn is_busy(&self) -> bool {
        matches!(
            self.phase,
            Phase::Discovering | Phase::PlaceholdersPlaced | Phase::Resolving
        )
    }

    /// Starts a fresh pass from `Idle`. Returns the generation the pass
    /// must report back with, or `None` if the kind is not idle.
    pub fn begin_discovery(&mut self) -> Option<u64> {
        if self.phase != Phase::Idle {
            return None;
        }
        self.set.clear();
        self.pending.clear();
        self.in_flight = 0;
        self.last_layout = None;
        self.visibility.clear();
        self.generation += 1;
        self.phase = Phase::Discovering;
        Some(self.generation)
    }

    /// Drops everything and returns to `Idle`; in-flight results become stale.
    pub fn reset(&mut self) {
        self.set.clear();
        self.pending.clear();
        self.in_flight = 0;
        self.last_layout = None;
        self.visibility.clear();
        self.generation += 1;
        self.phase = Phase::Idle;
    }

    /// Discovery produced nothing; go back to `Idle` so a later activation retries.
    pub fn discovery_empty(&mut self) {
        self.phase = Phase::Idle;
    }

    /// One placeholder per discovered index. Returns the new items.
    pub fn place_placeholders(
        &mut self,
        indices: &[u32],
        pattern: &LocatorPattern,
        aspect_ratio: f32,
    ) -> Vec<Item> {
        let mut created = Vec::with_capacity(indices.len());
        for &index in indices {
            let asset = Asset::new(self.kind, index, pattern);
            if let Some(item) = self.set.insert_placeholder(asset, aspect_ratio) {
                created.push(item.clone());
                self.pending.push_back(index);
            }
        }
        self.phase = Phase::PlaceholdersPlaced;
        created
    }

    /// Takes up to `size` unresolved assets, lowest index first.
    pub fn next_batch(&mut self, size: usize) -> Vec<Asset> {
        let mut batch = Vec::new();
        while batch.len() < size.max(1) {
            let Some(index) = self.pending.pop_front() else {
                break;
            };
            if let Some(item) = self.set.get(index) {
                batch.push(item.asset.clone());
            }
        }
        self.in_flight = batch.len();
        if !batch.is_empty() {
            self.phase = Phase::Resolving;
        }
        batch
    }

    /// Applies a finished batch. `None` marks a failed item. Returns the
    /// items that switched to resolved.
    pub fn apply_batch(&mut self, results: Vec<(u32, Option<Dimensions>)>) -> Vec<Item> {
        let mut resolved = Vec::new();
        for (index, dims) in results {
            match dims {
                Some(dims) => match self.set.resolve(index, dims) {
                    Some(item) => resolved.push(item.clone()),
                    None => self.set.mark_failed(index),
                },
                None => self.set.mark_failed(index),
            }
        }
        self.in_flight = 0;
        resolved
    }

    /// Settles once nothing is queued or in flight.
    pub fn try_settle(&mut self) -> bool {
        if self.is_busy() && self.pending.is_empty() && self.in_flight == 0 {
            self.phase = Phase::Settled;
        }
        self.phase == Phase::Settled
    }

    pub fn relayout(&mut self, container_width: f32, params: &LayoutParams) -> &MasonryLayout {
        let grid = layout::layout(self.set.layout_inputs(), container_width, params);
        self.set.apply_layout(&grid);
        self.last_layout.insert(grid)
    }

    /// `(settled, total)` counting resolved and failed items as settled.
    pub fn progress(&self) -> (usize, usize) {
        let total = self.set.len();
        (total - self.set.count(PlacementState::Placeholder), total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pattern() -> LocatorPattern {
        LocatorPattern::new("assets/img", "foto", "jpg")
    }

    #[test]
    fn begin_discovery_is_guarded() {
        let mut gallery = MediaGallery::new(MediaKind::Photos);
        assert_eq!(gallery.begin_discovery(), Some(1));
        assert_eq!(gallery.begin_discovery(), None);
        assert_eq!(gallery.phase(), Phase::Discovering);
    }

    #[test]
    fn resolve_happens_once() {
        let mut set = GallerySet::default();
        set.insert_placeholder(Asset::new(MediaKind::Photos, 3, &pattern()), 1.0);
        assert!(set.resolve(3, Dimensions::new(100, 150)).is_some());
        assert!(set.resolve(3, Dimensions::new(100, 300)).is_none());
        let item = set.get(3).unwrap();
        assert_eq!(item.index(), 3);
        assert!((item.aspect_ratio - 1.5).abs() < 1e-6);
    }

    #[test]
    fn degenerate_dimensions_keep_placeholder_ratio() {
        let mut set = GallerySet::default();
        set.insert_placeholder(Asset::new(MediaKind::Videos, 1, &pattern()), 0.75);
        assert!(set.resolve(1, Dimensions::new(0, 0)).is_none());
        let item = set.get(1).unwrap();
        assert_eq!(item.state, PlacementState::Failed);
        assert!((item.aspect_ratio - 0.75).abs() < 1e-6);
    }

    #[test]
    fn lifecycle_reaches_settled_with_failures() {
        let mut gallery = MediaGallery::new(MediaKind::Photos);
        gallery.begin_discovery().unwrap();
        let created = gallery.place_placeholders(&[1, 2, 5], &pattern(), 1.0);
        assert_eq!(created.len(), 3);
        assert_eq!(gallery.phase(), Phase::PlaceholdersPlaced);

        let batch = gallery.next_batch(2);
        assert_eq!(batch.iter().map(|a| a.index).collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(gallery.phase(), Phase::Resolving);
        let resolved = gallery.apply_batch(vec![(1, Some(Dimensions::new(10, 20))), (2, None)]);
        assert_eq!(resolved.len(), 1);
        assert!(!gallery.try_settle());

        let batch = gallery.next_batch(2);
        assert_eq!(batch.len(), 1);
        gallery.apply_batch(vec![(5, Some(Dimensions::new(10, 10)))]);
        assert!(gallery.try_settle());
        assert_eq!(gallery.progress(), (3, 3));
        assert_eq!(gallery.set().get(2).unwrap().state, PlacementState::Failed);
    }

    #[test]
    fn reset_bumps_generation() {
        let mut gallery = MediaGallery::new(MediaKind::Photos);
        let first = gallery.begin_discovery().unwrap();
        gallery.reset();
        assert_eq!(gallery.phase(), Phase::Idle);
        assert!(gallery.generation() > first);
        assert!(gallery.set().is_empty());
    }
}
