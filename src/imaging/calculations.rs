//! Pure calculation functions for grid geometry.
//!
//! All functions here are pure and testable without any I/O or images.

/// Canvas size for `count` square tiles laid out `per_line` to a row.
///
/// The last row may be partially filled; the canvas is still as wide as a
/// full row.
///
/// ```
/// # use settings_gen::imaging::grid_dimensions;
/// // 9 tiles of 200px, 3 per row → 600x600
/// assert_eq!(grid_dimensions(9, 3, 200), (600, 600));
///
/// // 4 tiles, 3 per row → two rows
/// assert_eq!(grid_dimensions(4, 3, 100), (300, 200));
/// ```
pub fn grid_dimensions(count: usize, per_line: u32, tile_size: u32) -> (u32, u32) {
    if count == 0 || per_line == 0 {
        return (0, 0);
    }
    let count = count as u32;
    let columns = count.min(per_line);
    let rows = count.div_ceil(per_line);
    (columns * tile_size, rows * tile_size)
}

/// Top-left pixel of tile `index` (zero-based, row-major).
pub fn tile_origin(index: usize, per_line: u32, tile_size: u32) -> (u32, u32) {
    let index = index as u32;
    let column = index % per_line;
    let row = index / per_line;
    (column * tile_size, row * tile_size)
}
