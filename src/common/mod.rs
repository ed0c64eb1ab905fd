pub mod errors;

/// Fixed thumbnail renditions: (width, height, label).
pub const THUMBNAIL_SIZES: &'static [(u32, u32, &'static str)] = &[
    (150, 150, "small"),
    (300, 300, "medium"),
    (600, 600, "large"),
];

/// JPEG quality for the separate web-optimized rendition.
pub const WEB_VERSION_QUALITY: u8 = 85;

/// JPEG quality for the destructive in-place optimization.
pub const OPTIMIZE_QUALITY: u8 = 90;

/// Minimum fractional size reduction required to commit a destructive
/// optimization; anything below this is reverted.
pub const MIN_OPTIMIZE_REDUCTION: f64 = 0.05;

/// Stamped into `metadata.optimization_version` on every completed run.
pub const OPTIMIZATION_VERSION: &'static str = "2";

pub const VALID_IMAGE_EXTENSIONS: &'static [&'static str] = &[
    "jpg", "jpeg", "jfif", "jpe", "png", "tif", "tiff", "webp", "bmp",
];

pub const VALID_VIDEO_EXTENSIONS: &'static [&'static str] = &[
    "gif", "mp4", "webm", "mkv", "mov", "avi", "flv", "wmv", "mpeg",
];

pub const VALID_DOCUMENT_EXTENSIONS: &'static [&'static str] =
    &["pdf", "doc", "docx", "odt", "rtf", "txt", "csv", "xls", "xlsx"];

use std::sync::LazyLock;

use rayon::{ThreadPool, ThreadPoolBuilder};
use tokio::runtime::{Builder, Runtime};

pub static CURRENT_NUM_THREADS: LazyLock<usize> = LazyLock::new(|| rayon::current_num_threads());

// Dedicated Tokio runtime for asset processing.
// Heavy media work runs here, separate from whatever runtime serves
// interactive requests, so a burst of uploads cannot starve them.
pub static PIPELINE_RUNTIME: LazyLock<Runtime> = LazyLock::new(|| {
    Builder::new_multi_thread()
        .worker_threads(*CURRENT_NUM_THREADS)
        .thread_name("asset-pipeline-worker")
        .enable_all()
        .build()
        .expect("Failed to build pipeline Tokio runtime")
});

// Rayon thread pool for CPU-intensive codec work (thumbnail fan-out).
// Not the global Rayon pool, so it does not interfere with other threads.
pub static MEDIA_RAYON_POOL: LazyLock<ThreadPool> = LazyLock::new(|| {
    ThreadPoolBuilder::new()
        .num_threads(*CURRENT_NUM_THREADS)
        .thread_name(|i| format!("media-codec-worker-{}", i))
        .build()
        .expect("Failed to build media Rayon pool")
});

/// Initialize env_logger once; later calls are no-ops.
pub fn init_logging() {
    let _ =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
            .try_init();
}
