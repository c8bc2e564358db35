use masonry_gallery::processing::layout::{LayoutParams, MasonryLayout, column_count, layout};
use rand::SeedableRng;
use rand::seq::SliceRandom;

fn close(a: f32, b: f32) {
    assert!((a - b).abs() <= 0.01, "{a} vs {b}");
}

fn sample_items(n: u32) -> Vec<(u32, f32)> {
    // Ratios between 0.5 and 1.9, varied but reproducible.
    (1..=n).map(|i| (i, 0.5 + ((i * 37) % 15) as f32 / 10.0)).collect()
}

#[test]
fn first_row_fills_columns_left_to_right() {
    let params = LayoutParams::default();
    let grid = layout([(1, 1.0), (2, 1.5), (3, 0.8)], 900.0, &params);

    assert_eq!(grid.columns, 3);
    close(grid.column_width, 850.0 / 3.0);
    let cols: Vec<usize> = grid.placements.iter().map(|p| p.column).collect();
    assert_eq!(cols, vec![0, 1, 2]);
    for p in &grid.placements {
        close(p.y, 0.0);
        close(p.x, p.column as f32 * (grid.column_width + 25.0));
        close(p.width, grid.column_width);
    }
    close(grid.placements[0].height, 850.0 / 3.0 + 25.0);
    close(grid.placements[1].height, 850.0 / 3.0 * 1.5 + 25.0);
}

#[test]
fn next_item_goes_to_the_shortest_column() {
    let params = LayoutParams::default();
    let grid = layout([(1, 1.0), (2, 1.5), (3, 0.8), (4, 1.0)], 900.0, &params);
    let w = 850.0 / 3.0;

    // Column heights after the first row: 333.3, 475.0, 276.7.
    close(grid.column_heights[0], w + 50.0);
    let fourth = grid.placements[3];
    assert_eq!(fourth.index, 4);
    assert_eq!(fourth.column, 2);
    close(fourth.y, w * 0.8 + 50.0);
    close(fourth.x, 2.0 * (w + 25.0));
    close(
        grid.content_height,
        grid.column_heights.iter().cloned().fold(0.0, f32::max) + 50.0,
    );
}

#[test]
fn layout_is_deterministic() {
    let params = LayoutParams::default();
    let items = sample_items(40);
    let a = layout(items.clone(), 1234.0, &params);
    let b = layout(items, 1234.0, &params);
    assert_eq!(a, b);
}

#[test]
fn input_order_does_not_matter() {
    let params = LayoutParams::default();
    let items = sample_items(60);
    let expected = layout(items.clone(), 1000.0, &params);

    let mut rng = rand::rngs::StdRng::seed_from_u64(0xC0FFEE);
    for _ in 0..5 {
        let mut shuffled = items.clone();
        shuffled.shuffle(&mut rng);
        assert_eq!(layout(shuffled, 1000.0, &params), expected);
    }
}

#[test]
fn columns_stay_balanced() {
    let params = LayoutParams::default();
    for width in [245.0, 500.0, 900.0, 1600.0] {
        let grid = layout(sample_items(75), width, &params);
        let tallest_item = grid.placements.iter().map(|p| p.height).fold(0.0, f32::max);
        let max = grid.column_heights.iter().cloned().fold(f32::MIN, f32::max);
        let min = grid.column_heights.iter().cloned().fold(f32::MAX, f32::min);
        assert!(
            max - min <= tallest_item + params.gap + 1e-3,
            "width {width}: spread {} exceeds {}",
            max - min,
            tallest_item + params.gap
        );
    }
}

#[test]
fn resize_redistributes_and_is_stable() {
    let params = LayoutParams::default();
    let items = sample_items(20);
    let wide = layout(items.clone(), 1500.0, &params);
    let narrow = layout(items.clone(), 500.0, &params);

    assert_eq!(wide.columns, column_count(1500.0, &params));
    assert_eq!(narrow.columns, 2);
    assert_eq!(narrow.placements.len(), 20);
    assert!(narrow.content_height > wide.content_height);
    assert_eq!(layout(items, 500.0, &params), narrow);
}

#[test]
fn every_item_is_placed_once_in_index_order() {
    let grid: MasonryLayout = layout(
        [(9, 1.0), (2, 0.7), (5, 1.2), (1, 1.0)],
        800.0,
        &LayoutParams::default(),
    );
    let order: Vec<u32> = grid.placements.iter().map(|p| p.index).collect();
    assert_eq!(order, vec![1, 2, 5, 9]);
}
