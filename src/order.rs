//! Deterministic ordering of palette colors.
//!
//! Colors are converted to HSL (from the red, green and blue channels only; alpha is ignored)
//! and sorted by an [`HslKey`]. Colors with equal keys differ only in alpha, and are finally
//! ordered by their raw channel values so that the output never depends on the order of the input.

use crate::Sample;
use ordered_float::OrderedFloat;
use palette::{encoding, Hsl, RgbHue};

/// The sort order applied to a palette.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PaletteOrder {
    /// Sort by hue ascending, then lightness ascending.
    ///
    /// This is the default.
    #[default]
    HueLightness,
    /// Sort by lightness ascending, then saturation ascending, then hue ascending.
    ///
    /// Useful to get dark-to-light swatches.
    LightnessSaturationHue,
}

/// The HSL coordinates of a color used for sorting.
///
/// `hue` is in degrees in `[0, 360)`, while `saturation` and `lightness` are in `[0, 1]`.
/// Achromatic colors (grays, black and white) have a hue and saturation of zero.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HslKey {
    /// The hue in degrees.
    pub hue: f64,
    /// The saturation.
    pub saturation: f64,
    /// The lightness.
    pub lightness: f64,
}

impl HslKey {
    /// Computes the [`HslKey`] of a [`Sample`], ignoring its alpha channel.
    ///
    /// Each component is a single correctly rounded division of two exact integers,
    /// so colors with the same true hue (or lightness, or saturation) get bit-identical keys.
    #[must_use]
    pub fn from_sample(sample: Sample) -> Self {
        let [r, g, b, _] = sample.0.map(i32::from);
        let max = r.max(g).max(b);
        let min = r.min(g).min(b);
        let delta = max - min;
        let sum = max + min;

        let lightness = f64::from(sum) / 510.0;
        if delta == 0 {
            return Self { hue: 0.0, saturation: 0.0, lightness };
        }

        // sixths of a turn, scaled by delta
        let sector = if max == r {
            (g - b).rem_euclid(6 * delta)
        } else if max == g {
            2 * delta + b - r
        } else {
            4 * delta + r - g
        };

        let saturation_denominator = if sum <= 255 { sum } else { 510 - sum };

        Self {
            hue: f64::from(60 * sector) / f64::from(delta),
            saturation: f64::from(delta) / f64::from(saturation_denominator),
            lightness,
        }
    }

    /// The sort key components for the given order, most significant first.
    fn components(self, order: PaletteOrder) -> [OrderedFloat<f64>; 3] {
        let Self { hue, saturation, lightness } = self;
        match order {
            PaletteOrder::HueLightness => [hue, lightness, saturation],
            PaletteOrder::LightnessSaturationHue => [lightness, saturation, hue],
        }
        .map(OrderedFloat)
    }
}

impl From<HslKey> for Hsl<encoding::Srgb, f64> {
    fn from(key: HslKey) -> Self {
        Hsl::new(RgbHue::from_degrees(key.hue), key.saturation, key.lightness)
    }
}

/// Sorts colors into the given [`PaletteOrder`].
///
/// The result has the same length and the same elements as the input.
/// Inputs containing the same colors always produce the same output, whatever their order.
///
/// # Examples
/// ```
/// # use pixelforge::{order::order_palette, PaletteOrder};
/// # use image::Rgba;
/// let blue = Rgba([0, 0, 255, 255]);
/// let green = Rgba([0, 255, 0, 255]);
/// let red = Rgba([255, 0, 0, 255]);
///
/// let palette = order_palette([blue, red, green], PaletteOrder::HueLightness);
/// assert_eq!(palette, vec![red, green, blue]);
/// ```
#[must_use]
pub fn order_palette(colors: impl IntoIterator<Item = Sample>, order: PaletteOrder) -> Vec<Sample> {
    let mut keyed = colors
        .into_iter()
        .map(|color| ((HslKey::from_sample(color).components(order), color.0), color))
        .collect::<Vec<_>>();

    keyed.sort_unstable_by(|(a, _), (b, _)| a.cmp(b));

    keyed.into_iter().map(|(_, color)| color).collect()
}

/// Keeps only the first `max_colors` colors of an ordered palette.
///
/// A `max_colors` of `0` means no limit.
#[must_use]
pub fn truncate_palette(mut palette: Vec<Sample>, max_colors: usize) -> Vec<Sample> {
    if max_colors > 0 {
        palette.truncate(max_colors);
    }
    palette
}
