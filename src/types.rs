//! Contains various types needed across the crate.

use image::Rgba;
use std::{fmt::Display, num::NonZeroU32};
use thiserror::Error;

/// One pixel's color reading.
///
/// Equality and hashing cover all four channels, alpha included,
/// so two samples are the same palette entry only if every channel matches.
pub type Sample = Rgba<u8>;

/// The reasons a palette image cannot be assembled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ComposeError {
    /// The palette has no colors, so there is nothing to draw.
    #[error("cannot assemble a palette image from an empty palette")]
    EmptyPalette,
    /// A concatenation step was given no images.
    #[error("cannot concatenate an empty group of images")]
    EmptyGroup,
    /// A tile with zero width or height was passed to row assembly.
    #[error("tile {index} has zero area")]
    DegenerateTile {
        /// The position of the tile within its group.
        index: usize,
    },
    /// A row with zero width or height was passed to grid assembly.
    #[error("row {index} has zero area")]
    DegenerateRow {
        /// The position of the row within the grid.
        index: usize,
    },
    /// Tile construction did not produce one tile per palette color.
    #[error("expected {expected} tiles but {actual} were built")]
    MissingTiles {
        /// The number of palette colors.
        expected: usize,
        /// The number of tiles that were built.
        actual: usize,
    },
    /// The output dimensions do not fit in a `u32`, or its pixel buffer does not fit in memory.
    #[error("palette image is too large")]
    TooLarge,
}

/// An error returned by the palette pipeline.
#[derive(Debug, Error)]
pub enum PaletteError {
    /// The palette image could not be assembled.
    #[error("cannot assemble palette image: {0}")]
    Compose(#[from] ComposeError),
    /// The scanner's worker pool could not be started.
    #[cfg(feature = "threads")]
    #[error("failed to start the scanner worker pool: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),
}

/// The geometry of a palette image: how many tiles per row and how large each tile is.
///
/// All three values are non-zero. Use [`TileLayout::new`] to validate raw values,
/// or let [`PalettePipeline`](crate::PalettePipeline) substitute defaults for zeros.
///
/// # Examples
/// ```
/// # use pixelforge::TileLayout;
/// let layout = TileLayout::new(3, 2, 2).unwrap();
/// assert_eq!(layout.rows_for(7), 3);
/// assert_eq!(layout.image_dimensions(7), Some((6, 6)));
///
/// assert!(TileLayout::new(0, 2, 2).is_none());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileLayout {
    /// The number of tiles in each full row.
    colors_per_row: NonZeroU32,
    /// The width of each tile in pixels.
    tile_width: NonZeroU32,
    /// The height of each tile in pixels.
    tile_height: NonZeroU32,
}

impl TileLayout {
    /// Creates a new [`TileLayout`], returning `None` if any value is zero.
    #[must_use]
    pub fn new(colors_per_row: u32, tile_width: u32, tile_height: u32) -> Option<Self> {
        Some(Self {
            colors_per_row: NonZeroU32::new(colors_per_row)?,
            tile_width: NonZeroU32::new(tile_width)?,
            tile_height: NonZeroU32::new(tile_height)?,
        })
    }

    /// Creates a new [`TileLayout`] from values that are already known to be non-zero.
    #[must_use]
    pub const fn from_non_zero(
        colors_per_row: NonZeroU32,
        tile_width: NonZeroU32,
        tile_height: NonZeroU32,
    ) -> Self {
        Self { colors_per_row, tile_width, tile_height }
    }

    /// The number of tiles in each full row.
    #[must_use]
    pub const fn colors_per_row(&self) -> u32 {
        self.colors_per_row.get()
    }

    /// The width of each tile in pixels.
    #[must_use]
    pub const fn tile_width(&self) -> u32 {
        self.tile_width.get()
    }

    /// The height of each tile in pixels.
    #[must_use]
    pub const fn tile_height(&self) -> u32 {
        self.tile_height.get()
    }

    /// The number of rows needed to lay out `colors` tiles.
    #[must_use]
    pub fn rows_for(&self, colors: usize) -> usize {
        colors.div_ceil(self.colors_per_row.get() as usize)
    }

    /// The width and height of the palette image for `colors` tiles,
    /// or `None` if they would not fit in a `u32`.
    #[must_use]
    pub fn image_dimensions(&self, colors: usize) -> Option<(u32, u32)> {
        let width = self.tile_width().checked_mul(self.colors_per_row())?;
        let rows = u32::try_from(self.rows_for(colors)).ok()?;
        let height = self.tile_height().checked_mul(rows)?;
        Some((width, height))
    }

    /// The number of bytes in one RGBA tile, or `None` if it does not fit in a `usize`.
    #[must_use]
    pub fn tile_bytes(&self) -> Option<usize> {
        rgba_bytes(self.tile_width(), self.tile_height())
    }

    /// The number of bytes in the RGBA palette image for `colors` tiles,
    /// or `None` if its dimensions or its byte length overflow.
    #[must_use]
    pub fn image_bytes(&self, colors: usize) -> Option<usize> {
        let (width, height) = self.image_dimensions(colors)?;
        rgba_bytes(width, height)
    }
}

/// `width * height * 4`, checked.
pub(crate) fn rgba_bytes(width: u32, height: u32) -> Option<usize> {
    usize::try_from(width)
        .ok()?
        .checked_mul(usize::try_from(height).ok()?)?
        .checked_mul(4)
}

impl Display for TileLayout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} per row, {}x{} tiles",
            self.colors_per_row, self.tile_width, self.tile_height
        )
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn zero_values_are_rejected() {
        assert!(TileLayout::new(0, 1, 1).is_none());
        assert!(TileLayout::new(1, 0, 1).is_none());
        assert!(TileLayout::new(1, 1, 0).is_none());
        assert!(TileLayout::new(1, 1, 1).is_some());
    }

    #[test]
    fn rows_round_up() {
        let layout = TileLayout::new(3, 50, 50).unwrap();
        assert_eq!(layout.rows_for(0), 0);
        assert_eq!(layout.rows_for(1), 1);
        assert_eq!(layout.rows_for(3), 1);
        assert_eq!(layout.rows_for(4), 2);
        assert_eq!(layout.image_dimensions(4), Some((150, 100)));
    }

    #[test]
    fn overflowing_dimensions() {
        let layout = TileLayout::new(u32::MAX, 2, 1).unwrap();
        assert_eq!(layout.image_dimensions(1), None);

        let layout = TileLayout::new(1, 1, u32::MAX).unwrap();
        assert_eq!(layout.image_dimensions(2), None);
    }

    #[test]
    fn overflowing_byte_length() {
        let layout = TileLayout::new(1, u32::MAX, u32::MAX).unwrap();
        assert_eq!(layout.image_dimensions(1), Some((u32::MAX, u32::MAX)));
        assert_eq!(layout.tile_bytes(), None);
        assert_eq!(layout.image_bytes(1), None);

        let layout = TileLayout::new(3, 2, 5).unwrap();
        assert_eq!(layout.tile_bytes(), Some(40));
        assert_eq!(layout.image_bytes(4), Some(6 * 10 * 4));
    }
}
