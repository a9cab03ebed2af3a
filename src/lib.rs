//! A library for extracting the distinct color palette of an image and rendering it as a swatch image.
//!
//! Every distinct RGBA value in the image becomes one palette entry. No quantization or clustering
//! takes place, so colors that differ by a single unit in one channel are separate entries.
//! The palette is ordered by hue and lightness and then laid out as a grid of solid color tiles.
//!
//! # Features
//! `pixelforge` has several `cargo` features that can be turned off or on:
//! - `threads`: scans pixels, deduplicates colors and builds tiles in parallel via [`rayon`].
//! - `service`: exposes a streaming palette service over TCP, built on `tokio`.
//! - `cli`: builds the `pixelforge` command line tool.
//!
//! # High-Level API
//! To get started with the high-level API, see [`PalettePipeline`].
//! ```no_run
//! # use pixelforge::{PalettePipeline, PaletteOrder};
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let img = image::open("some image")?.into_rgba8();
//!
//! let swatches = PalettePipeline::new(&img)
//!     .colors_per_row(8)
//!     .tile_size(32, 32)
//!     .max_colors(64)
//!     .order(PaletteOrder::HueLightness)
//!     .palette_image()?;
//!
//! swatches.save("palette.png")?;
//! # Ok(())
//! # }
//! ```
//!
//! The individual stages ([`scan`], [`DistinctColors`], [`order`], [`compose`]) are public as well,
//! in case only part of the pipeline is needed.

#![deny(unsafe_code)]
#![warn(
    clippy::pedantic,
    clippy::cargo,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::todo,
    clippy::unimplemented,
    clippy::unwrap_used,
    clippy::unwrap_in_result,
    clippy::expect_used,
    clippy::unneeded_field_pattern,
    clippy::rest_pat_in_fully_bound_structs,
    clippy::unnecessary_self_imports,
    clippy::str_to_string,
    clippy::string_to_string,
    clippy::string_slice,
    missing_docs,
    rustdoc::all,
    clippy::float_cmp_const,
    clippy::lossy_float_literal
)]
#![allow(
    clippy::doc_markdown,
    clippy::module_name_repetitions,
    clippy::many_single_char_names,
    clippy::missing_panics_doc,
    clippy::missing_errors_doc,
    clippy::multiple_crate_versions
)]

mod api;
mod distinct;
mod types;

pub mod codec;
pub mod compose;
pub mod order;
pub mod scan;

#[cfg(feature = "service")]
pub mod service;

pub use api::*;
pub use distinct::DistinctColors;
pub use order::{HslKey, PaletteOrder};
pub use types::*;

#[cfg(test)]
pub(crate) mod tests {
    use crate::Sample;
    use image::{Rgba, RgbaImage};
    use rand::{Rng, SeedableRng};
    use rand_xoshiro::Xoroshiro128PlusPlus;

    pub const RED: Sample = Rgba([255, 0, 0, 255]);
    pub const GREEN: Sample = Rgba([0, 255, 0, 255]);
    pub const BLUE: Sample = Rgba([0, 0, 255, 255]);
    pub const TRANSPARENT: Sample = Rgba([0, 0, 0, 0]);

    /// A 3x3 image with a red, a green and a blue row (top to bottom).
    pub fn rgb_rows_3x3() -> RgbaImage {
        RgbaImage::from_fn(3, 3, |_, y| match y {
            0 => RED,
            1 => GREEN,
            _ => BLUE,
        })
    }

    /// A 100x100 gradient where (nearly) every pixel has its own color.
    #[allow(clippy::cast_possible_truncation)]
    pub fn gradient_100x100() -> RgbaImage {
        RgbaImage::from_fn(100, 100, |x, y| {
            Rgba([x as u8, y as u8, ((x + y) / 2) as u8, 255])
        })
    }

    /// A seeded random image with repeated colors drawn from a small pool.
    pub fn random_image(width: u32, height: u32, pool: usize, seed: u64) -> RgbaImage {
        let mut rng = Xoroshiro128PlusPlus::seed_from_u64(seed);
        let colors = (0..pool).map(|_| Rgba(rng.gen::<[u8; 4]>())).collect::<Vec<_>>();
        RgbaImage::from_fn(width, height, |_, _| colors[rng.gen_range(0..colors.len())])
    }
}
