//! Media-introspection seam.
//!
//! Resize/reencode/dimension/EXIF primitives behind one trait, with two
//! codecs: [`ImageCodec`] (in-process, image crate) and [`FfmpegCodec`]
//! (ffmpeg/ffprobe subprocesses). A codec that cannot perform an
//! operation reports so instead of raising, so the calling step can
//! degrade to `skipped`.

pub mod ffmpeg;
pub mod image;

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Result;

pub use ffmpeg::FfmpegCodec;
pub use image::ImageCodec;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
    pub mime: String,
}

/// Media primitives. `Ok(false)` from the transform methods means the
/// codec does not support the operation for this input (caller skips);
/// `Err` means it tried and failed.
pub trait MediaProbe: Send + Sync {
    fn resize(&self, src: &Path, dst: &Path, width: u32, height: u32) -> Result<bool>;
    fn reencode(&self, src: &Path, dst: &Path, quality: u8) -> Result<bool>;
    /// Intrinsic width/height/mime, `None` when undeterminable.
    fn read_dimensions(&self, path: &Path) -> Option<Dimensions>;
    /// Best-effort EXIF map, `None` when the container has none.
    fn read_exif(&self, path: &Path) -> Option<BTreeMap<String, String>>;
}

/// Mime guess from the file extension alone, for inputs no codec can open.
pub fn mime_for_extension(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase());
    match ext.as_deref() {
        Some("jpg" | "jpeg" | "jfif" | "jpe") => "image/jpeg",
        Some("png") => "image/png",
        Some("tif" | "tiff") => "image/tiff",
        Some("webp") => "image/webp",
        Some("bmp") => "image/bmp",
        Some("gif") => "image/gif",
        Some("mp4") => "video/mp4",
        Some("webm") => "video/webm",
        Some("mkv") => "video/x-matroska",
        Some("mov") => "video/quicktime",
        Some("avi") => "video/x-msvideo",
        Some("pdf") => "application/pdf",
        Some("txt") => "text/plain",
        Some("csv") => "text/csv",
        Some("doc") => "application/msword",
        Some("docx") => {
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
        }
        _ => "application/octet-stream",
    }
}
