//! Renders an ordered palette as a grid of solid color tiles.
//!
//! Composition happens in three steps:
//! 1. [`build_tiles`] (or [`build_tiles_par`]) creates one tile per palette color.
//! 2. [`concat_horizontal`] joins each group of `colors_per_row` tiles into a row.
//! 3. [`concat_vertical`] stacks the rows into the final image.
//!
//! [`compose`] and [`compose_par`] run all three steps.
//! The last row may hold fewer tiles than the others, in which case the rest of that row
//! is left as transparent black.

use crate::{types::rgba_bytes, ComposeError, Sample, TileLayout};
use image::{imageops, RgbaImage};
#[cfg(feature = "threads")]
use rayon::prelude::*;
use tracing::debug;

/// Creates a `tile_width` by `tile_height` tile filled with each color, in palette order.
#[must_use]
pub fn build_tiles(palette: &[Sample], layout: TileLayout) -> Vec<RgbaImage> {
    palette
        .iter()
        .map(|&color| RgbaImage::from_pixel(layout.tile_width(), layout.tile_height(), color))
        .collect()
}

/// Creates the tiles of [`build_tiles`] in parallel.
///
/// The returned tiles are still in palette order.
#[must_use]
#[cfg(feature = "threads")]
pub fn build_tiles_par(palette: &[Sample], layout: TileLayout) -> Vec<RgbaImage> {
    palette
        .par_iter()
        .map(|&color| RgbaImage::from_pixel(layout.tile_width(), layout.tile_height(), color))
        .collect()
}

/// Places `tiles` side by side, left to right, all at `y = 0`.
///
/// The output is `height` pixels tall and as wide as all the tiles together.
///
/// # Errors
/// Returns [`ComposeError::EmptyGroup`] if `tiles` is empty,
/// [`ComposeError::DegenerateTile`] if a tile has zero width or height,
/// and [`ComposeError::TooLarge`] if the summed width overflows a `u32` or the row's buffer a `usize`.
pub fn concat_horizontal(tiles: &[RgbaImage], height: u32) -> Result<RgbaImage, ComposeError> {
    if tiles.is_empty() {
        return Err(ComposeError::EmptyGroup);
    }

    let mut width = 0u32;
    for (index, tile) in tiles.iter().enumerate() {
        if tile.width() == 0 || tile.height() == 0 {
            return Err(ComposeError::DegenerateTile { index });
        }
        width = width.checked_add(tile.width()).ok_or(ComposeError::TooLarge)?;
    }
    rgba_bytes(width, height).ok_or(ComposeError::TooLarge)?;

    let mut row = RgbaImage::new(width, height);
    let mut x = 0;
    for tile in tiles {
        imageops::replace(&mut row, tile, i64::from(x), 0);
        x += tile.width();
    }

    Ok(row)
}

/// Stacks `rows` top to bottom, each starting at `x = 0`.
///
/// The output is `width` pixels wide and as tall as all the rows together.
/// Rows narrower than `width` leave the rest of their band transparent black.
///
/// # Errors
/// Returns [`ComposeError::EmptyGroup`] if `rows` is empty,
/// [`ComposeError::DegenerateRow`] if a row has zero width or height,
/// and [`ComposeError::TooLarge`] if the summed height overflows a `u32` or the grid's buffer a `usize`.
pub fn concat_vertical(rows: &[RgbaImage], width: u32) -> Result<RgbaImage, ComposeError> {
    if rows.is_empty() {
        return Err(ComposeError::EmptyGroup);
    }

    let mut height = 0u32;
    for (index, row) in rows.iter().enumerate() {
        if row.width() == 0 || row.height() == 0 {
            return Err(ComposeError::DegenerateRow { index });
        }
        height = height.checked_add(row.height()).ok_or(ComposeError::TooLarge)?;
    }
    rgba_bytes(width, height).ok_or(ComposeError::TooLarge)?;

    let mut grid = RgbaImage::new(width, height);
    let mut y = 0;
    for row in rows {
        imageops::replace(&mut grid, row, 0, i64::from(y));
        y += row.height();
    }

    Ok(grid)
}

/// Renders `palette` as a palette image with the given [`TileLayout`].
///
/// The output is `tile_width * colors_per_row` wide
/// and `tile_height * ceil(palette.len() / colors_per_row)` tall.
///
/// # Errors
/// Returns [`ComposeError::EmptyPalette`] if `palette` is empty and
/// [`ComposeError::TooLarge`] if the output dimensions overflow a `u32`
/// or its pixel buffer would overflow a `usize`.
/// No partial image is ever returned.
///
/// # Examples
/// ```
/// # use pixelforge::{compose::compose, TileLayout};
/// # use image::Rgba;
/// let palette = [Rgba([255, 0, 0, 255]), Rgba([0, 0, 255, 255])];
/// let layout = TileLayout::new(3, 10, 5).unwrap();
/// let image = compose(&palette, layout)?;
/// assert_eq!(image.dimensions(), (30, 5));
/// assert_eq!(image.get_pixel(25, 2), &Rgba([0, 0, 0, 0]));
/// # Ok::<(), pixelforge::ComposeError>(())
/// ```
pub fn compose(palette: &[Sample], layout: TileLayout) -> Result<RgbaImage, ComposeError> {
    check_dimensions(palette, layout)?;
    assemble(palette.len(), &build_tiles(palette, layout), layout)
}

/// Renders `palette` like [`compose`], but builds the tiles in parallel.
///
/// The output is identical to that of [`compose`].
#[cfg(feature = "threads")]
pub fn compose_par(palette: &[Sample], layout: TileLayout) -> Result<RgbaImage, ComposeError> {
    check_dimensions(palette, layout)?;
    assemble(palette.len(), &build_tiles_par(palette, layout), layout)
}

/// Fails before any tile is allocated if the palette is empty or the output would be too large.
fn check_dimensions(palette: &[Sample], layout: TileLayout) -> Result<(), ComposeError> {
    if palette.is_empty() {
        return Err(ComposeError::EmptyPalette);
    }
    let (width, height) = layout
        .image_dimensions(palette.len())
        .ok_or(ComposeError::TooLarge)?;
    let bytes = layout
        .tile_bytes()
        .and(layout.image_bytes(palette.len()))
        .ok_or(ComposeError::TooLarge)?;

    debug!(colors = palette.len(), width, height, bytes, %layout, "composing palette image");
    Ok(())
}

/// Joins `tiles` into rows of `colors_per_row` and stacks the rows.
fn assemble(
    expected: usize,
    tiles: &[RgbaImage],
    layout: TileLayout,
) -> Result<RgbaImage, ComposeError> {
    if tiles.len() != expected {
        return Err(ComposeError::MissingTiles { expected, actual: tiles.len() });
    }

    let (width, _) = layout.image_dimensions(expected).ok_or(ComposeError::TooLarge)?;

    let rows = tiles
        .chunks(layout.colors_per_row() as usize)
        .map(|group| concat_horizontal(group, layout.tile_height()))
        .collect::<Result<Vec<_>, _>>()?;

    concat_vertical(&rows, width)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::tests::*;
    use image::Rgba;

    fn layout(colors_per_row: u32, tile_width: u32, tile_height: u32) -> TileLayout {
        TileLayout::new(colors_per_row, tile_width, tile_height).unwrap()
    }

    fn assert_block(image: &RgbaImage, x: u32, y: u32, width: u32, height: u32, color: Sample) {
        for j in y..y + height {
            for i in x..x + width {
                assert_eq!(*image.get_pixel(i, j), color, "pixel ({i}, {j})");
            }
        }
    }

    #[test]
    fn tiles_keep_palette_order() {
        let tiles = build_tiles(&[RED, GREEN, BLUE], layout(3, 4, 2));
        assert_eq!(tiles.len(), 3);
        for (tile, color) in tiles.iter().zip([RED, GREEN, BLUE]) {
            assert_eq!(tile.dimensions(), (4, 2));
            assert!(tile.pixels().all(|&p| p == color));
        }
    }

    #[test]
    #[cfg(feature = "threads")]
    fn parallel_tiles_match() {
        let palette = (0..=255).map(|v| Rgba([v, 0, 255 - v, 255])).collect::<Vec<_>>();
        let layout = layout(7, 3, 5);
        assert_eq!(build_tiles(&palette, layout), build_tiles_par(&palette, layout));
        assert_eq!(compose(&palette, layout), compose_par(&palette, layout));
    }

    #[test]
    fn three_primaries_in_one_row() {
        let image = compose(&[RED, GREEN, BLUE], layout(3, 2, 2)).unwrap();
        assert_eq!(image.dimensions(), (6, 2));
        assert_block(&image, 0, 0, 2, 2, RED);
        assert_block(&image, 2, 0, 2, 2, GREEN);
        assert_block(&image, 4, 0, 2, 2, BLUE);
    }

    #[test]
    fn short_last_row_is_transparent() {
        let white = Rgba([255, 255, 255, 255]);
        let image = compose(&[RED, GREEN, BLUE, white], layout(3, 5, 4)).unwrap();
        assert_eq!(image.dimensions(), (15, 8));
        assert_block(&image, 0, 0, 5, 4, RED);
        assert_block(&image, 10, 0, 5, 4, BLUE);
        assert_block(&image, 0, 4, 5, 4, white);
        assert_block(&image, 5, 4, 10, 4, TRANSPARENT);
    }

    #[test]
    fn single_color() {
        let image = compose(&[RED], layout(3, 50, 50)).unwrap();
        assert_eq!(image.dimensions(), (150, 50));
        assert_block(&image, 0, 0, 50, 50, RED);
        assert_block(&image, 50, 0, 100, 50, TRANSPARENT);

        let image = compose(&[RED], layout(1, 50, 50)).unwrap();
        assert_eq!(image.dimensions(), (50, 50));
    }

    #[test]
    fn dimensions_follow_layout() {
        let palette = (0..40).map(|v| Rgba([v, v, v, 255])).collect::<Vec<_>>();
        for n in 1..=palette.len() {
            for colors_per_row in 1..=6 {
                let layout = layout(colors_per_row, 3, 2);
                let image = compose(&palette[..n], layout).unwrap();
                let rows = n.div_ceil(colors_per_row as usize) as u32;
                assert_eq!(image.dimensions(), (3 * colors_per_row, 2 * rows));
            }
        }
    }

    #[test]
    fn empty_palette() {
        assert_eq!(compose(&[], layout(3, 50, 50)), Err(ComposeError::EmptyPalette));
    }

    #[test]
    fn oversized_output() {
        assert_eq!(compose(&[RED], layout(u32::MAX, 2, 1)), Err(ComposeError::TooLarge));
    }

    #[test]
    fn oversized_buffer() {
        let huge = layout(1, u32::MAX, u32::MAX);
        assert_eq!(compose(&[RED], huge), Err(ComposeError::TooLarge));
        #[cfg(feature = "threads")]
        assert_eq!(compose_par(&[RED], huge), Err(ComposeError::TooLarge));
    }

    #[test]
    fn missing_tiles() {
        let layout = layout(2, 1, 1);
        let tiles = build_tiles(&[RED], layout);
        assert_eq!(
            assemble(2, &tiles, layout),
            Err(ComposeError::MissingTiles { expected: 2, actual: 1 })
        );
    }

    #[test]
    fn horizontal_errors() {
        assert_eq!(concat_horizontal(&[], 1), Err(ComposeError::EmptyGroup));

        let tiles = [RgbaImage::from_pixel(2, 2, RED), RgbaImage::new(0, 2)];
        assert_eq!(
            concat_horizontal(&tiles, 2),
            Err(ComposeError::DegenerateTile { index: 1 })
        );
    }

    #[test]
    fn vertical_errors() {
        assert_eq!(concat_vertical(&[], 1), Err(ComposeError::EmptyGroup));

        let rows = [RgbaImage::new(3, 0)];
        assert_eq!(concat_vertical(&rows, 3), Err(ComposeError::DegenerateRow { index: 0 }));
    }

    #[test]
    fn vertical_pads_narrow_rows() {
        let rows = [RgbaImage::from_pixel(4, 1, RED), RgbaImage::from_pixel(2, 3, BLUE)];
        let grid = concat_vertical(&rows, 4).unwrap();
        assert_eq!(grid.dimensions(), (4, 4));
        assert_block(&grid, 0, 0, 4, 1, RED);
        assert_block(&grid, 0, 1, 2, 3, BLUE);
        assert_block(&grid, 2, 1, 2, 3, TRANSPARENT);
    }
}
