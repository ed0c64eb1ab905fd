//! Video codec backed by ffmpeg/ffprobe subprocesses.
//!
//! Includes:
//! - Availability check (absent binaries degrade every operation)
//! - First-frame thumbnail extraction
//! - Whole-file re-encode with web streaming flags
//! - Dimension probing via ffprobe

use std::collections::BTreeMap;
use std::path::Path;
use std::process::{Command, Stdio};
use std::sync::OnceLock;

use anyhow::{Context, Result, anyhow};
use log::warn;

use crate::media::{Dimensions, MediaProbe, mime_for_extension};

#[derive(Debug, Default)]
pub struct FfmpegCodec;

static FFMPEG_AVAILABLE: OnceLock<bool> = OnceLock::new();

impl FfmpegCodec {
    /// Check once whether ffmpeg and ffprobe are both in PATH.
    pub fn available() -> bool {
        *FFMPEG_AVAILABLE.get_or_init(|| {
            for command in &["ffmpeg", "ffprobe"] {
                match Command::new(command).arg("-version").output() {
                    Ok(output) if output.status.success() => {}
                    _ => {
                        warn!(
                            "`{}` is not installed or not available in PATH; video operations will be skipped",
                            command
                        );
                        return false;
                    }
                }
            }
            true
        })
    }
}

impl MediaProbe for FfmpegCodec {
    /// Scaled JPEG taken from the first frame of the video.
    fn resize(&self, src: &Path, dst: &Path, width: u32, height: u32) -> Result<bool> {
        if !Self::available() {
            return Ok(false);
        }
        if let Some(parent) = dst.parent() {
            std::fs::create_dir_all(parent)
                .context("failed to create parent directory for video thumbnail")?;
        }

        let mut cmd = create_silent_ffmpeg_command();
        cmd.args([
            "-y",
            "-i",
            &path_arg(src)?,
            "-ss",
            "0",
            "-vframes",
            "1",
            "-vf",
            &format!("scale={}:{}", width, height),
            &path_arg(dst)?,
        ]);

        let status = cmd
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .context("failed to execute ffmpeg for video thumbnail generation")?;

        if !status.success() {
            return Err(anyhow!(
                "ffmpeg thumbnail generation failed with exit code: {}",
                status.code().unwrap_or(-1)
            ));
        }
        Ok(true)
    }

    /// Re-encode the whole file, scaled to at most 720p with even
    /// dimensions and faststart flags for web playback.
    fn reencode(&self, src: &Path, dst: &Path, quality: u8) -> Result<bool> {
        if !Self::available() {
            return Ok(false);
        }
        if let Some(parent) = dst.parent() {
            std::fs::create_dir_all(parent)
                .context("failed to create parent directory for re-encoded video")?;
        }

        // Map the 0-100 quality scale onto x264's 0-51 CRF range.
        let crf = (100u8.saturating_sub(quality)).min(51);

        let mut cmd = create_silent_ffmpeg_command();
        cmd.args([
            "-y",
            "-i",
            &path_arg(src)?,
            "-vf",
            "scale=trunc(oh*a/2)*2:'min(720,trunc(ih/2)*2)'",
            "-crf",
            &crf.to_string(),
            "-movflags",
            "faststart",
            &path_arg(dst)?,
        ]);

        let status = cmd
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .context("failed to execute ffmpeg for video re-encode")?;

        if !status.success() {
            return Err(anyhow!(
                "ffmpeg re-encode failed with exit code: {}",
                status.code().unwrap_or(-1)
            ));
        }
        Ok(true)
    }

    fn read_dimensions(&self, path: &Path) -> Option<Dimensions> {
        if !Self::available() {
            return None;
        }
        let file_path = path.to_str()?;
        let width = probe_stream_entry("stream=width", file_path).ok()?;
        let height = probe_stream_entry("stream=height", file_path).ok()?;
        Some(Dimensions {
            width,
            height,
            mime: mime_for_extension(path).to_string(),
        })
    }

    fn read_exif(&self, _path: &Path) -> Option<BTreeMap<String, String>> {
        // Video containers carry no EXIF worth persisting here.
        None
    }
}

// ────────────────────────────────────────────────────────────────
// FFmpeg/FFprobe Utilities
// ────────────────────────────────────────────────────────────────

/// Base `ffmpeg` command with flags to ensure it runs silently.
fn create_silent_ffmpeg_command() -> Command {
    let mut cmd = Command::new("ffmpeg");
    // These global options must come before the input/output options.
    cmd.args(["-v", "quiet", "-hide_banner", "-nostats", "-nostdin"]);
    cmd
}

fn probe_stream_entry(entry: &str, file_path: &str) -> Result<u32> {
    let output = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-show_entries",
            entry,
            "-of",
            "default=noprint_wrappers=1:nokey=1",
            file_path,
        ])
        .output()
        .context(format!("failed to spawn ffprobe for {:?}", file_path))?;
    if output.status.success() {
        Ok(String::from_utf8(output.stdout)?.trim().parse::<u32>()?)
    } else {
        Err(anyhow!(
            "ffprobe failed for {:?} with status code {:?}: {}",
            file_path,
            output.status.code().unwrap_or(-1),
            String::from_utf8_lossy(&output.stderr)
        ))
    }
}

fn path_arg(path: &Path) -> Result<String> {
    path.to_str()
        .map(str::to_string)
        .ok_or_else(|| anyhow!("non-UTF-8 path: {:?}", path))
}
