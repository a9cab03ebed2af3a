//! Contains the types and functions for the high level pipeline builder API.

mod palette_pipeline;

pub use palette_pipeline::PalettePipeline;

use crate::{scan::MAX_WORKERS, PaletteError, PaletteOrder, Sample, TileLayout};
use image::{GenericImageView, RgbaImage};
use std::num::NonZeroU32;

/// Unwraps a non-zero constant at compile time.
const fn non_zero(value: u32) -> NonZeroU32 {
    match NonZeroU32::new(value) {
        Some(value) => value,
        None => panic!("value must be non-zero"),
    }
}

/// The defaults used by a [`PalettePipeline`] for any parameter that is not set (or set to zero).
///
/// # Examples
/// ```
/// # use pixelforge::{PaletteConfig, PaletteOrder};
/// # use std::num::NonZeroU32;
/// let config = PaletteConfig {
///     colors_per_row: NonZeroU32::new(8).unwrap(),
///     order: PaletteOrder::LightnessSaturationHue,
///     ..PaletteConfig::default()
/// };
/// assert_eq!(config.layout().colors_per_row(), 8);
/// assert_eq!(config.layout().tile_width(), 50);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaletteConfig {
    /// The number of tiles in each row of the palette image.
    ///
    /// The default is `3`.
    pub colors_per_row: NonZeroU32,
    /// The width of each tile in pixels.
    ///
    /// The default is `50`.
    pub tile_width: NonZeroU32,
    /// The height of each tile in pixels.
    ///
    /// The default is `50`.
    pub tile_height: NonZeroU32,
    /// The upper bound on the number of scanner worker threads.
    ///
    /// The default is [`MAX_WORKERS`].
    pub max_workers: usize,
    /// The order of the palette.
    pub order: PaletteOrder,
}

impl PaletteConfig {
    /// Creates a new [`PaletteConfig`] with the default values.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            colors_per_row: non_zero(3),
            tile_width: non_zero(50),
            tile_height: non_zero(50),
            max_workers: MAX_WORKERS,
            order: PaletteOrder::HueLightness,
        }
    }

    /// The [`TileLayout`] described by this config.
    #[must_use]
    pub const fn layout(&self) -> TileLayout {
        TileLayout::from_non_zero(self.colors_per_row, self.tile_width, self.tile_height)
    }
}

impl Default for PaletteConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Extracts the palette of `image` and renders it as a palette image.
///
/// Zero values for `colors_per_row`, `tile_width` or `tile_height`
/// are replaced with the [`PaletteConfig`] defaults.
/// With the `threads` feature, the parallel pipeline is used.
///
/// # Errors
/// Returns an error if the image has no pixels or the output would be too large,
/// or if the scanner worker threads could not be started.
///
/// # Examples
/// ```
/// # use pixelforge::extract_palette;
/// # use image::{Rgba, RgbaImage};
/// let image = RgbaImage::from_pixel(4, 4, Rgba([10, 20, 30, 255]));
/// let palette = extract_palette(&image, 0, 8, 8)?;
/// assert_eq!(palette.dimensions(), (24, 8));
/// # Ok::<(), pixelforge::PaletteError>(())
/// ```
pub fn extract_palette<I>(
    image: &I,
    colors_per_row: u32,
    tile_width: u32,
    tile_height: u32,
) -> Result<RgbaImage, PaletteError>
where
    I: GenericImageView<Pixel = Sample> + Sync,
{
    extract_palette_capped(image, colors_per_row, tile_width, tile_height, 0)
}

/// Like [`extract_palette`], but keeps only the first `max_colors` palette entries.
///
/// A `max_colors` of `0` means no cap.
pub fn extract_palette_capped<I>(
    image: &I,
    colors_per_row: u32,
    tile_width: u32,
    tile_height: u32,
    max_colors: usize,
) -> Result<RgbaImage, PaletteError>
where
    I: GenericImageView<Pixel = Sample> + Sync,
{
    let pipeline = PalettePipeline::new(image)
        .colors_per_row(colors_per_row)
        .tile_size(tile_width, tile_height)
        .max_colors(max_colors);

    #[cfg(feature = "threads")]
    {
        pipeline.palette_image_par()
    }

    #[cfg(not(feature = "threads"))]
    {
        pipeline.palette_image()
    }
}
