use super::PaletteConfig;

use crate::{
    compose::compose,
    order::{order_palette, truncate_palette},
    scan::scan_ordered,
    DistinctColors, PaletteError, PaletteOrder, Sample, TileLayout,
};

#[cfg(feature = "threads")]
use crate::{compose::compose_par, scan::scan_parallel};

use image::{GenericImageView, RgbaImage};
use std::num::NonZeroU32;
use tracing::debug;

/// A builder struct to extract the palette of an image and render it as a palette image.
///
/// Each pixel of the image is read, every distinct RGBA value becomes one palette entry,
/// the entries are sorted (see [`PaletteOrder`]) and optionally capped,
/// and then drawn as a grid of solid color tiles.
///
/// Any parameter left unset or set to `0` takes its value from the [`PaletteConfig`]
/// (which is [`PaletteConfig::default`] unless [`PalettePipeline::config`] is called).
///
/// # Examples
/// ```
/// # use pixelforge::{PalettePipeline, PaletteOrder};
/// # use image::{Rgba, RgbaImage};
/// let image = RgbaImage::from_fn(4, 4, |x, _| Rgba([(x * 60) as u8, 0, 0, 255]));
///
/// let pipeline = PalettePipeline::new(&image)
///     .colors_per_row(2)
///     .tile_size(10, 10)
///     .order(PaletteOrder::LightnessSaturationHue);
///
/// let palette = pipeline.palette();
/// assert_eq!(palette.len(), 4);
///
/// let swatches = pipeline.palette_image()?;
/// assert_eq!(swatches.dimensions(), (20, 20));
/// # Ok::<(), pixelforge::PaletteError>(())
/// ```
#[derive(Debug, Clone)]
pub struct PalettePipeline<'a, I> {
    /// The image to extract the palette from.
    image: &'a I,
    /// The defaults for unset parameters.
    config: PaletteConfig,
    /// The number of tiles per row, `0` for the config default.
    colors_per_row: u32,
    /// The tile width, `0` for the config default.
    tile_width: u32,
    /// The tile height, `0` for the config default.
    tile_height: u32,
    /// The maximum number of palette entries, `0` for no cap.
    max_colors: usize,
    /// The palette order, `None` for the config default.
    order: Option<PaletteOrder>,
    /// The maximum number of scanner workers, `0` for the config default.
    max_workers: usize,
}

impl<'a, I> PalettePipeline<'a, I>
where
    I: GenericImageView<Pixel = Sample>,
{
    /// Creates a new [`PalettePipeline`] with default settings.
    #[must_use]
    pub const fn new(image: &'a I) -> Self {
        Self {
            image,
            config: PaletteConfig::new(),
            colors_per_row: 0,
            tile_width: 0,
            tile_height: 0,
            max_colors: 0,
            order: None,
            max_workers: 0,
        }
    }

    /// Sets the [`PaletteConfig`] used for any parameter that is unset or zero.
    #[must_use]
    pub fn config(mut self, config: PaletteConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the number of tiles in each row of the palette image.
    ///
    /// `0` means the config default, which is `3` unless changed.
    #[must_use]
    pub fn colors_per_row(mut self, colors_per_row: u32) -> Self {
        self.colors_per_row = colors_per_row;
        self
    }

    /// Sets the width of each tile in pixels.
    ///
    /// `0` means the config default, which is `50` unless changed.
    #[must_use]
    pub fn tile_width(mut self, tile_width: u32) -> Self {
        self.tile_width = tile_width;
        self
    }

    /// Sets the height of each tile in pixels.
    ///
    /// `0` means the config default, which is `50` unless changed.
    #[must_use]
    pub fn tile_height(mut self, tile_height: u32) -> Self {
        self.tile_height = tile_height;
        self
    }

    /// Sets both the width and height of each tile.
    #[must_use]
    pub fn tile_size(self, tile_width: u32, tile_height: u32) -> Self {
        self.tile_width(tile_width).tile_height(tile_height)
    }

    /// Keeps only the first `max_colors` entries of the ordered palette.
    ///
    /// The default of `0` means no cap.
    #[must_use]
    pub fn max_colors(mut self, max_colors: usize) -> Self {
        self.max_colors = max_colors;
        self
    }

    /// Sets the [`PaletteOrder`].
    #[must_use]
    pub fn order(mut self, order: PaletteOrder) -> Self {
        self.order = Some(order);
        self
    }

    /// Sets the maximum number of threads used to scan the image.
    ///
    /// The actual count is never more than the image height.
    /// `0` means the config default.
    #[must_use]
    pub fn max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = max_workers;
        self
    }

    /// The [`TileLayout`] after substituting defaults for zero values.
    #[must_use]
    pub fn layout(&self) -> TileLayout {
        let resolve = |value, default| NonZeroU32::new(value).unwrap_or(default);
        TileLayout::from_non_zero(
            resolve(self.colors_per_row, self.config.colors_per_row),
            resolve(self.tile_width, self.config.tile_width),
            resolve(self.tile_height, self.config.tile_height),
        )
    }

    /// The [`PaletteOrder`] that will be applied.
    fn resolved_order(&self) -> PaletteOrder {
        self.order.unwrap_or(self.config.order)
    }

    /// Orders and caps a set of distinct colors.
    fn finish(&self, colors: DistinctColors) -> Vec<Sample> {
        let distinct = colors.len();
        let palette = truncate_palette(order_palette(colors, self.resolved_order()), self.max_colors);
        debug!(distinct, kept = palette.len(), "palette ordered");
        palette
    }

    /// Computes the ordered (and capped) palette on the current thread.
    ///
    /// Pixels are read in raster order.
    #[must_use]
    pub fn palette(&self) -> Vec<Sample> {
        let samples = scan_ordered(self.image);
        debug!(samples = samples.len(), "image scanned");
        self.finish(DistinctColors::new(samples))
    }

    /// Computes the palette and renders it as a palette image on the current thread.
    ///
    /// # Errors
    /// Returns [`PaletteError::Compose`] if the image has no pixels
    /// or the palette image dimensions would overflow a `u32`.
    pub fn palette_image(&self) -> Result<RgbaImage, PaletteError> {
        Ok(compose(&self.palette(), self.layout())?)
    }
}

#[cfg(feature = "threads")]
impl<'a, I> PalettePipeline<'a, I>
where
    I: GenericImageView<Pixel = Sample> + Sync,
{
    /// The number of scanner workers to ask for.
    fn resolved_max_workers(&self) -> usize {
        if self.max_workers == 0 {
            self.config.max_workers
        } else {
            self.max_workers
        }
    }

    /// Computes the ordered (and capped) palette in parallel.
    ///
    /// The result is identical to [`PalettePipeline::palette`].
    ///
    /// # Errors
    /// Returns [`PaletteError::WorkerPool`] if the scanner threads could not be started.
    pub fn palette_par(&self) -> Result<Vec<Sample>, PaletteError> {
        let samples = scan_parallel(self.image, self.resolved_max_workers())?;
        debug!(samples = samples.len(), "image scanned");
        Ok(self.finish(DistinctColors::new_par(&samples)))
    }

    /// Computes the palette and renders it as a palette image in parallel.
    ///
    /// The result is identical to [`PalettePipeline::palette_image`].
    pub fn palette_image_par(&self) -> Result<RgbaImage, PaletteError> {
        Ok(compose_par(&self.palette_par()?, self.layout())?)
    }
}
