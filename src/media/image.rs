//! In-process image codec backed by the image crate.
//!
//! Includes:
//! - Decoding with a fallback decoder chain
//! - Exact-size thumbnail rendition
//! - JPEG re-encoding at a caller-chosen quality
//! - Intrinsic dimension and EXIF introspection

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::Path;

use anyhow::{Context, Result, anyhow, bail};
use exif::{In, Tag};
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageFormat};

use crate::common::VALID_IMAGE_EXTENSIONS;
use crate::media::{Dimensions, MediaProbe, mime_for_extension};

#[derive(Debug, Default)]
pub struct ImageCodec;

impl ImageCodec {
    fn is_supported(path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase())
            .is_some_and(|ext| VALID_IMAGE_EXTENSIONS.contains(&ext.as_str()))
    }
}

impl MediaProbe for ImageCodec {
    fn resize(&self, src: &Path, dst: &Path, width: u32, height: u32) -> Result<bool> {
        if !Self::is_supported(src) {
            return Ok(false);
        }
        let dynamic_image = decode_image(src)?;
        let rendition = dynamic_image.thumbnail_exact(width, height).to_rgb8();

        ensure_parent_dir(dst)?;
        rendition
            .save_with_format(dst, ImageFormat::Jpeg)
            .context(format!("failed to save JPEG rendition to {:?}", dst))?;
        Ok(true)
    }

    fn reencode(&self, src: &Path, dst: &Path, quality: u8) -> Result<bool> {
        if !Self::is_supported(src) {
            return Ok(false);
        }
        let dynamic_image = decode_image(src)?;
        ensure_parent_dir(dst)?;

        // The quality knob only exists for JPEG output; other formats are
        // re-encoded losslessly in their native container.
        match ImageFormat::from_path(dst) {
            Ok(ImageFormat::Jpeg) => {
                let file = File::create(dst)
                    .context(format!("failed to create {:?}", dst))?;
                let mut writer = BufWriter::new(file);
                let encoder = JpegEncoder::new_with_quality(&mut writer, quality);
                DynamicImage::ImageRgb8(dynamic_image.to_rgb8())
                    .write_with_encoder(encoder)
                    .context(format!("failed to encode JPEG to {:?}", dst))?;
            }
            Ok(format) => {
                dynamic_image
                    .save_with_format(dst, format)
                    .context(format!("failed to re-encode {:?}", dst))?;
            }
            Err(_) => bail!("no image format for destination {:?}", dst),
        }
        Ok(true)
    }

    fn read_dimensions(&self, path: &Path) -> Option<Dimensions> {
        let (width, height) = image::image_dimensions(path).ok()?;
        let mime = match ImageFormat::from_path(path) {
            Ok(format) => format.to_mime_type().to_string(),
            Err(_) => mime_for_extension(path).to_string(),
        };
        Some(Dimensions { width, height, mime })
    }

    fn read_exif(&self, path: &Path) -> Option<BTreeMap<String, String>> {
        // Only jpeg/tiff containers carry EXIF we care about.
        let ext = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase())?;
        if !matches!(ext.as_str(), "jpg" | "jpeg" | "jfif" | "jpe" | "tif" | "tiff") {
            return None;
        }

        let file = File::open(path).ok()?;
        let mut reader = BufReader::new(&file);
        let exif = exif::Reader::new().read_from_container(&mut reader).ok()?;

        let mut fields = BTreeMap::new();
        for tag in [Tag::Make, Tag::Model, Tag::DateTime, Tag::Orientation] {
            if let Some(field) = exif.get_field(tag, In::PRIMARY) {
                fields.insert(
                    tag.to_string(),
                    field.display_value().with_unit(&exif).to_string(),
                );
            }
        }
        Some(fields)
    }
}

// ────────────────────────────────────────────────────────────────
// Decoding
// ────────────────────────────────────────────────────────────────

/// Decode a file into a `DynamicImage`, trying each decoder in turn.
pub fn decode_image(path: &Path) -> Result<DynamicImage> {
    let file_in_memory =
        fs::read(path).context(format!("failed to read file into memory: {:?}", path))?;

    let decoders: Vec<fn(&[u8]) -> Result<DynamicImage>> = vec![image_crate_decoder];

    for decoder in decoders {
        if let Ok(decoded_image) = decoder(&file_in_memory) {
            return Ok(decoded_image);
        }
    }

    bail!("all decoders failed for file: {:?}", path);
}

fn image_crate_decoder(file_in_memory: &[u8]) -> Result<DynamicImage> {
    image::load_from_memory(file_in_memory)
        .context("image crate failed to decode image from memory")
}

fn ensure_parent_dir(path: &Path) -> Result<()> {
    let parent = path
        .parent()
        .ok_or_else(|| anyhow!("failed to determine parent directory of {:?}", path))?;
    fs::create_dir_all(parent)
        .context(format!("failed to create directory tree {:?}", parent))?;
    Ok(())
}
