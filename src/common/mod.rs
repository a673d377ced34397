pub const VALID_IMAGE_EXTENSIONS: &'static [&'static str] =
    &["jpg", "jpeg", "png", "webp", "gif", "bmp", "tiff", "tif"];

/// Files starting with this prefix belong to an unfinished batch and are never scanned.
pub const TEMP_FILE_PREFIX: &str = "temp_";

pub const OUTPUT_EXTENSION: &str = "png";

pub const DEFAULT_PORT: u16 = 5000;

/// Largest accepted `resize_size`, in pixels per side.
pub const MAX_RESIZE_SIZE: u32 = 8192;

/// Upper bound on the pixel count of any resize target.
pub const MAX_OUTPUT_PIXELS: u64 = MAX_RESIZE_SIZE as u64 * MAX_RESIZE_SIZE as u64;

use std::sync::LazyLock;

use tokio::runtime::{Builder, Runtime};

pub static CURRENT_NUM_THREADS: LazyLock<usize> = LazyLock::new(|| {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
});

// Rocket-specific Tokio Runtime
// Network requests run here; batches hop onto its blocking pool via spawn_blocking.
pub static ROCKET_RUNTIME: LazyLock<Runtime> = LazyLock::new(|| {
    Builder::new_multi_thread()
        .worker_threads(*CURRENT_NUM_THREADS)
        .thread_name("rocket-io-worker")
        .enable_all()
        .build()
        .expect("Failed to build Rocket Tokio runtime")
});
