//! Greedy shortest-column masonry packing.

use serde::{Deserialize, Serialize};

/// Tilt (degrees) applied to a tile, indexed by `index % 10`.
const TILT_PATTERN: [i8; 10] = [-2, 1, 0, -1, 2, -2, 1, 0, -1, 2];

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct LayoutParams {
    /// Target width of a column before the container width is split evenly.
    pub column_width: f32,
    /// Horizontal and vertical spacing between tiles.
    pub gap: f32,
    /// Fixed strip added below every tile (caption / polaroid border).
    pub caption_padding: f32,
    /// Added once below the tallest column.
    pub outer_margin: f32,
}

impl Default for LayoutParams {
    fn default() -> Self {
        Self {
            column_width: 220.0,
            gap: 25.0,
            caption_padding: 25.0,
            outer_margin: 50.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Placement {
    pub index: u32,
    pub column: usize,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub tilt_deg: i8,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MasonryLayout {
    pub columns: usize,
    pub column_width: f32,
    /// One placement per input item, in ascending index order.
    pub placements: Vec<Placement>,
    /// Final running height of every column, trailing gap included.
    pub column_heights: Vec<f32>,
    pub content_height: f32,
}

impl MasonryLayout {
    pub fn placement(&self, index: u32) -> Option<&Placement> {
        self.placements
            .binary_search_by_key(&index, |p| p.index)
            .ok()
            .map(|pos| &self.placements[pos])
    }
}

/// Number of columns that fit `container_width`; never less than one.
pub fn column_count(container_width: f32, params: &LayoutParams) -> usize {
    let width = sanitize_width(container_width);
    let stride = params.column_width + params.gap;
    if stride <= 0.0 {
        return 1;
    }
    ((width / stride).floor() as usize).max(1)
}

/// Deterministic polaroid tilt for a tile; a pure function of the index.
pub fn tilt_for(index: u32) -> i8 {
    TILT_PATTERN[(index % TILT_PATTERN.len() as u32) as usize]
}

/// Pack `(index, aspect_ratio)` pairs into columns.
///
/// Items are sorted by index first, so the result does not depend on the
/// order they are passed in. Ties between equally short columns go to the
/// lowest column.
pub fn layout<I>(items: I, container_width: f32, params: &LayoutParams) -> MasonryLayout
where
    I: IntoIterator<Item = (u32, f32)>,
{
    let mut items: Vec<(u32, f32)> = items.into_iter().collect();
    items.sort_by_key(|(index, _)| *index);

    let width = sanitize_width(container_width);
    let columns = column_count(width, params);
    let column_width = ((width - (columns as f32 - 1.0) * params.gap) / columns as f32).max(0.0);
    let mut column_heights = vec![0.0_f32; columns];

    let placements = items
        .into_iter()
        .map(|(index, ratio)| {
            let height = column_width * sanitize_ratio(ratio) + params.caption_padding;
            let column = shortest_column(&column_heights);
            let placement = Placement {
                index,
                column,
                x: column as f32 * (column_width + params.gap),
                y: column_heights[column],
                width: column_width,
                height,
                tilt_deg: tilt_for(index),
            };
            column_heights[column] += height + params.gap;
            placement
        })
        .collect();

    let tallest = column_heights.iter().copied().fold(0.0_f32, f32::max);
    MasonryLayout {
        columns,
        column_width,
        placements,
        column_heights,
        content_height: tallest + params.outer_margin,
    }
}

// First minimum wins.
fn shortest_column(heights: &[f32]) -> usize {
    let mut best = 0;
    for (column, height) in heights.iter().enumerate().skip(1) {
        if *height < heights[best] {
            best = column;
        }
    }
    best
}

fn sanitize_width(width: f32) -> f32 {
    if width.is_finite() { width.max(0.0) } else { 0.0 }
}

fn sanitize_ratio(ratio: f32) -> f32 {
    if ratio.is_finite() && ratio > 0.0 { ratio } else { 1.0 }
}
