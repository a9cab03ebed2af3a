//! Contains the code for color deduplication.

use crate::Sample;
#[cfg(feature = "threads")]
use rayon::prelude::*;
use std::collections::{hash_set, HashSet};

/// The set of distinct colors found in a stream of samples.
///
/// Colors are compared channel by channel, alpha included.
/// Inserting a color that is already present changes nothing.
/// The set has no order; see [`order_palette`](crate::order::order_palette) to sort it.
///
/// # Examples
/// ```
/// # use pixelforge::DistinctColors;
/// # use image::Rgba;
/// let samples = [Rgba([255, 0, 0, 255]), Rgba([255, 0, 0, 255]), Rgba([255, 0, 0, 254])];
/// let colors = DistinctColors::new(samples);
/// assert_eq!(colors.len(), 2);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DistinctColors {
    /// The unique colors.
    colors: HashSet<Sample>,
}

impl DistinctColors {
    /// Consumes every sample and collects the distinct colors.
    #[must_use]
    pub fn new(samples: impl IntoIterator<Item = Sample>) -> Self {
        samples.into_iter().collect()
    }

    /// Collects the distinct colors of `samples` in parallel.
    ///
    /// Each rayon task builds its own set, and the sets are merged pairwise.
    /// The result is the same set as [`DistinctColors::new`].
    #[must_use]
    #[cfg(feature = "threads")]
    pub fn new_par(samples: &[Sample]) -> Self {
        let colors = samples
            .par_iter()
            .fold(HashSet::new, |mut colors, &sample| {
                colors.insert(sample);
                colors
            })
            .reduce(HashSet::new, |mut a, mut b| {
                if a.len() < b.len() {
                    std::mem::swap(&mut a, &mut b);
                }
                a.extend(b);
                a
            });

        Self { colors }
    }

    /// Adds a color, returning whether it was new.
    pub fn insert(&mut self, sample: Sample) -> bool {
        self.colors.insert(sample)
    }

    /// Whether or not `sample` is one of the distinct colors.
    #[must_use]
    pub fn contains(&self, sample: &Sample) -> bool {
        self.colors.contains(sample)
    }

    /// The number of distinct colors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.colors.len()
    }

    /// Whether or not there are no colors at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    /// Iterates over the distinct colors in an unspecified order.
    pub fn iter(&self) -> impl Iterator<Item = &Sample> + '_ {
        self.colors.iter()
    }

    /// Returns the distinct colors as a `Vec` in an unspecified order.
    #[must_use]
    pub fn into_vec(self) -> Vec<Sample> {
        self.colors.into_iter().collect()
    }
}

impl FromIterator<Sample> for DistinctColors {
    fn from_iter<T: IntoIterator<Item = Sample>>(iter: T) -> Self {
        Self { colors: iter.into_iter().collect() }
    }
}

impl Extend<Sample> for DistinctColors {
    fn extend<T: IntoIterator<Item = Sample>>(&mut self, iter: T) {
        self.colors.extend(iter);
    }
}

impl IntoIterator for DistinctColors {
    type Item = Sample;
    type IntoIter = hash_set::IntoIter<Sample>;

    fn into_iter(self) -> Self::IntoIter {
        self.colors.into_iter()
    }
}
