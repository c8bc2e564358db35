//! Which tiles of a laid-out grid intersect the viewport.

use std::collections::BTreeSet;

use super::layout::MasonryLayout;

/// Indices whose tiles have at least `threshold` of their height inside
/// `[viewport_top, viewport_top + viewport_height)`.
pub fn visible_indices(
    layout: &MasonryLayout,
    viewport_top: f32,
    viewport_height: f32,
    threshold: f32,
) -> BTreeSet<u32> {
    let bottom = viewport_top + viewport_height.max(0.0);
    layout
        .placements
        .iter()
        .filter(|p| {
            if p.height <= 0.0 {
                return false;
            }
            let overlap = (p.y + p.height).min(bottom) - p.y.max(viewport_top);
            overlap > 0.0 && overlap / p.height >= threshold
        })
        .map(|p| p.index)
        .collect()
}

/// Turns successive viewport snapshots into enter/leave deltas.
#[derive(Debug, Clone, Default)]
pub struct VisibilityTracker {
    visible: BTreeSet<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VisibilityDelta {
    pub entered: Vec<u32>,
    pub left: Vec<u32>,
}

impl VisibilityDelta {
    pub fn is_empty(&self) -> bool {
        self.entered.is_empty() && self.left.is_empty()
    }
}

impl VisibilityTracker {
    pub fn update(&mut self, now_visible: BTreeSet<u32>) -> VisibilityDelta {
        let delta = VisibilityDelta {
            entered: now_visible.difference(&self.visible).copied().collect(),
            left: self.visible.difference(&now_visible).copied().collect(),
        };
        self.visible = now_visible;
        delta
    }

    pub fn visible(&self) -> &BTreeSet<u32> {
        &self.visible
    }

    pub fn clear(&mut self) {
        self.visible.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processing::layout::{LayoutParams, layout};

    fn single_column() -> MasonryLayout {
        // 220px column: each square tile is 245 tall, spaced by 25.
        layout([(1, 1.0), (2, 1.0), (3, 1.0)], 220.0, &LayoutParams::default())
    }

    #[test]
    fn partial_overlap_respects_threshold() {
        let grid = single_column();
        // Tile 2 spans 270..515; a viewport ending at 370 covers 100/245 of it.
        let seen = visible_indices(&grid, 0.0, 370.0, 0.3);
        assert_eq!(seen.into_iter().collect::<Vec<_>>(), vec![1, 2]);
        let seen = visible_indices(&grid, 0.0, 330.0, 0.3);
        assert_eq!(seen.into_iter().collect::<Vec<_>>(), vec![1]);
    }

    #[test]
    fn tracker_reports_deltas() {
        let grid = single_column();
        let mut tracker = VisibilityTracker::default();
        let first = tracker.update(visible_indices(&grid, 0.0, 300.0, 0.3));
        assert_eq!(first.entered, vec![1]);
        assert!(first.left.is_empty());

        let second = tracker.update(visible_indices(&grid, 500.0, 300.0, 0.3));
        assert_eq!(second.entered, vec![3]);
        assert_eq!(second.left, vec![1]);
        assert!(tracker.update(visible_indices(&grid, 500.0, 300.0, 0.3)).is_empty());
    }
}
