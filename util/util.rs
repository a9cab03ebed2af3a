#![allow(dead_code)]

use std::sync::OnceLock;

use image::{Rgba, RgbaImage};
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoroshiro128PlusPlus;

/// (width, height, number of distinct colors)
pub const SIZES: [(u32, u32, usize); 3] = [(480, 270, 64), (960, 540, 1024), (1920, 1080, 16384)];

pub fn random_palette(len: usize, seed: u64) -> Vec<Rgba<u8>> {
    let mut rng = Xoroshiro128PlusPlus::seed_from_u64(seed);
    (0..len).map(|_| Rgba(rng.gen::<[u8; 4]>())).collect()
}

pub fn random_image(width: u32, height: u32, colors: usize, seed: u64) -> RgbaImage {
    let palette = random_palette(colors, seed);
    let mut rng = Xoroshiro128PlusPlus::seed_from_u64(seed.wrapping_add(1));
    RgbaImage::from_fn(width, height, |_, _| palette[rng.gen_range(0..palette.len())])
}

pub fn load_bench_images() -> Vec<(String, RgbaImage)> {
    SIZES
        .iter()
        .zip(0..)
        .map(|(&(width, height, colors), seed)| {
            (format!("random{colors}"), random_image(width, height, colors, seed))
        })
        .collect()
}

static BENCH_IMAGES: OnceLock<Vec<(String, RgbaImage)>> = OnceLock::new();

pub fn bench_images() -> &'static [(String, RgbaImage)] {
    BENCH_IMAGES.get_or_init(load_bench_images)
}
