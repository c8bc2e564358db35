use serde::Serialize;

use crate::asset::MediaKind;
use crate::gallery::Item;
use crate::processing::layout::MasonryLayout;

/// Host → controller.
#[derive(Debug, Clone, PartialEq)]
pub enum HostCommand {
    /// The user switched to this kind. Starts discovery the first time, re-lays out afterwards.
    Activate(MediaKind),
    /// The container width changed. Debounced; the last width wins.
    Resize { width: f32 },
    /// The section for this kind is about to scroll into view. Starts
    /// discovery if it has not run yet; otherwise ignored.
    ScrollNearBottom(MediaKind),
    /// Scroll position of the active grid, in grid coordinates.
    Viewport { top: f32, height: f32 },
    /// Forget the cached discovery for this kind and rebuild it.
    Refresh(MediaKind),
}

/// Controller → host. The core never renders; it only reports.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum GalleryEvent {
    PlaceholderCreated(Item),
    ItemResolved(Item),
    LayoutComputed {
        kind: MediaKind,
        layout: MasonryLayout,
    },
    Progress {
        kind: MediaKind,
        settled: usize,
        total: usize,
    },
    AllSettled {
        kind: MediaKind,
    },
    /// Shown once as an empty-state notice.
    DiscoveryEmpty {
        kind: MediaKind,
        pattern: String,
    },
    VisibilityChanged {
        kind: MediaKind,
        entered: Vec<u32>,
        left: Vec<u32>,
    },
}
