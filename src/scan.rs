//! Enumerates the pixels of an image view.
//!
//! There are two scanning modes:
//! - [`scan_ordered`] produces samples in raster order (row by row, left to right) on the calling thread.
//!   Use it whenever pixel adjacency or raster fidelity matters.
//! - [`scan_parallel`] (needs the `threads` feature) spreads rows over a pool of worker threads.
//!   The output contains every pixel exactly once, but in no particular order.
//!
//! Both accept any [`GenericImageView`] with [`Rgba<u8>`](image::Rgba) pixels,
//! so sub-image views can be used to scan only part of an image.

use crate::Sample;
use image::GenericImageView;
#[cfg(feature = "threads")]
use {
    crate::PaletteError,
    rayon::ThreadPool,
    std::{
        collections::HashMap,
        ops::Range,
        sync::{
            mpsc::{self, SyncSender},
            Arc, Mutex, OnceLock, PoisonError,
        },
    },
    tracing::debug,
};

/// The default upper bound on the number of scanner worker threads.
pub const MAX_WORKERS: usize = 32;

/// Returns every pixel of `image` in raster order: `y` ascending, then `x` ascending within each row.
///
/// The length of the output is always `width * height` of the view.
#[must_use]
pub fn scan_ordered<I>(image: &I) -> Vec<Sample>
where
    I: GenericImageView<Pixel = Sample>,
{
    let (width, height) = image.dimensions();
    let mut samples = Vec::with_capacity(width as usize * height as usize);
    for y in 0..height {
        samples.extend((0..width).map(|x| image.get_pixel(x, y)));
    }
    samples
}

/// The number of scanner workers used for an image with `height` rows.
///
/// This is `min(height, max_workers)`, but never less than one.
#[must_use]
pub fn worker_count(height: u32, max_workers: usize) -> usize {
    usize::try_from(height)
        .unwrap_or(usize::MAX)
        .min(max_workers)
        .max(1)
}

/// Returns every pixel of `image`, scanning rows on a pool of [`worker_count`] threads.
///
/// The pool for each worker count is started on first use and reused by later calls.
/// Workers claim row indices from a shared queue and send each finished row through a bounded channel.
/// The calling thread drains that channel until the last worker hangs up.
/// The output is a permutation of [`scan_ordered`]'s output;
/// the order of rows (and so of samples) is unspecified and may differ between calls.
///
/// # Errors
/// Returns [`PaletteError::WorkerPool`] if the worker threads could not be spawned.
#[cfg(feature = "threads")]
pub fn scan_parallel<I>(image: &I, max_workers: usize) -> Result<Vec<Sample>, PaletteError>
where
    I: GenericImageView<Pixel = Sample> + Sync,
{
    let (width, height) = image.dimensions();
    let total = width as usize * height as usize;
    if total == 0 {
        return Ok(Vec::new());
    }

    let workers = worker_count(height, max_workers);
    let pool = scan_pool(workers)?;

    debug!(width, height, workers, "scanning rows in parallel");

    let rows = Mutex::new(0..height);
    let (row_tx, row_rx) = mpsc::sync_channel::<Vec<Sample>>(workers);
    let mut samples = Vec::with_capacity(total);

    pool.in_place_scope(|scope| {
        for _ in 0..workers {
            let row_tx = row_tx.clone();
            let rows = &rows;
            scope.spawn(move |_| scan_rows(image, rows, &row_tx));
        }

        // the channel closes once every worker has dropped its sender
        drop(row_tx);
        for row in row_rx {
            samples.extend(row);
        }
    });

    Ok(samples)
}

/// Returns the shared pool with `workers` threads, starting it on first use.
///
/// Pools live for the rest of the process, one per distinct worker count,
/// so repeated scans do not spawn threads again.
#[cfg(feature = "threads")]
fn scan_pool(workers: usize) -> Result<Arc<ThreadPool>, PaletteError> {
    static POOLS: OnceLock<Mutex<HashMap<usize, Arc<ThreadPool>>>> = OnceLock::new();

    let mut pools = POOLS
        .get_or_init(Mutex::default)
        .lock()
        .unwrap_or_else(PoisonError::into_inner);

    if let Some(pool) = pools.get(&workers) {
        return Ok(Arc::clone(pool));
    }

    let pool = Arc::new(
        rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(move |i| format!("pixelforge-scan-{workers}-{i}"))
            .build()?,
    );
    debug!(workers, "started scanner pool");
    pools.insert(workers, Arc::clone(&pool));
    Ok(pool)
}

/// Claims rows from `rows` until the queue is exhausted, sending the samples of each row to `output`.
#[cfg(feature = "threads")]
fn scan_rows<I>(image: &I, rows: &Mutex<Range<u32>>, output: &SyncSender<Vec<Sample>>)
where
    I: GenericImageView<Pixel = Sample>,
{
    let width = image.width();
    while let Some(y) = next_row(rows) {
        let row = (0..width).map(|x| image.get_pixel(x, y)).collect();
        if output.send(row).is_err() {
            break;
        }
    }
}

/// Pops the next unclaimed row index, or `None` once every row has been claimed.
#[cfg(feature = "threads")]
fn next_row(rows: &Mutex<Range<u32>>) -> Option<u32> {
    rows.lock().ok()?.next()
}
