//! Video support through ffprobe and ffmpeg
//!
//! Both tools read from a scratch file holding the payload. Paths are checked for shell
//! metacharacters before they reach a command line.

use anyhow::{anyhow, Context, Result};
use bytes::Bytes;
use medialife_core::AppError;
use std::path::Path;
use tokio::process::Command;

use crate::metadata::VideoMetadata;

/// Reject paths carrying shell metacharacters or traversal sequences.
pub fn validate_path(path: &str) -> Result<()> {
    let dangerous_chars = [';', '|', '&', '$', '`', '(', ')', '<', '>', '\n', '\r'];
    if path.chars().any(|c| dangerous_chars.contains(&c)) {
        return Err(anyhow!("Path contains dangerous characters: {}", path));
    }

    if path.contains("..") {
        return Err(anyhow!("Path contains directory traversal: {}", path));
    }

    Ok(())
}

/// ffprobe living next to the configured ffmpeg binary.
pub fn ffprobe_path_for(ffmpeg_path: &str) -> String {
    match ffmpeg_path.rfind("ffmpeg") {
        Some(idx) => format!(
            "{}ffprobe{}",
            &ffmpeg_path[..idx],
            &ffmpeg_path[idx + "ffmpeg".len()..]
        ),
        None => "ffprobe".to_string(),
    }
}

async fn write_scratch(data: &[u8]) -> Result<tempfile::NamedTempFile> {
    let scratch = tempfile::NamedTempFile::new().context("Failed to create scratch file")?;
    tokio::fs::write(scratch.path(), data)
        .await
        .context("Failed to write scratch file")?;
    Ok(scratch)
}

fn path_arg(path: &Path) -> Result<String> {
    let path = path.to_string_lossy().to_string();
    validate_path(&path)?;
    Ok(path)
}

/// Parse `ffprobe -print_format json` output for the first video stream.
pub fn parse_probe_output(stdout: &[u8]) -> Result<VideoMetadata> {
    let probe_data: serde_json::Value =
        serde_json::from_slice(stdout).context("Failed to parse ffprobe output")?;

    let stream = probe_data["streams"]
        .get(0)
        .ok_or_else(|| anyhow!("No video stream found"))?;

    let duration = probe_data["format"]["duration"]
        .as_str()
        .and_then(|d| d.parse::<f64>().ok())
        .ok_or_else(|| anyhow!("Could not parse duration"))?;

    let width = stream["width"]
        .as_u64()
        .and_then(|w| u32::try_from(w).ok())
        .ok_or_else(|| anyhow!("Could not parse width"))?;

    let height = stream["height"]
        .as_u64()
        .and_then(|h| u32::try_from(h).ok())
        .ok_or_else(|| anyhow!("Could not parse height"))?;

    let codec = stream["codec_name"]
        .as_str()
        .unwrap_or("unknown")
        .to_string();

    Ok(VideoMetadata {
        duration,
        width,
        height,
        codec,
    })
}

/// Video metadata through ffprobe
#[derive(Debug, Clone)]
pub struct VideoProbe {
    ffprobe_path: String,
}

impl VideoProbe {
    pub fn new(ffprobe_path: String) -> Result<Self> {
        validate_path(&ffprobe_path).context("Invalid ffprobe_path")?;
        Ok(Self { ffprobe_path })
    }

    #[tracing::instrument(skip(self, data), fields(
        process.executable.name = "ffprobe",
        process.executable.path = %self.ffprobe_path,
        media.size = data.len()
    ))]
    pub async fn probe(&self, data: Bytes) -> Result<VideoMetadata, AppError> {
        self.probe_inner(&data)
            .await
            .map_err(|e| AppError::Extraction(format!("Failed to probe video: {:#}", e)))
    }

    async fn probe_inner(&self, data: &[u8]) -> Result<VideoMetadata> {
        let start = std::time::Instant::now();
        let scratch = write_scratch(data).await?;
        let input = path_arg(scratch.path())?;

        let output = Command::new(&self.ffprobe_path)
            .args([
                "-v",
                "quiet",
                "-print_format",
                "json",
                "-show_format",
                "-show_streams",
                "-select_streams",
                "v:0",
            ])
            .arg(&input)
            .output()
            .await
            .context("Failed to execute ffprobe")?;

        if !output.status.success() {
            return Err(anyhow!(
                "ffprobe failed: {}",
                String::from_utf8_lossy(&output.stderr)
            ));
        }

        let metadata = parse_probe_output(&output.stdout)?;

        tracing::info!(
            duration_ms = start.elapsed().as_millis(),
            video_duration = metadata.duration,
            width = metadata.width,
            height = metadata.height,
            codec = %metadata.codec,
            "Video probe completed"
        );

        Ok(metadata)
    }
}

/// Poster-frame extraction through ffmpeg
#[derive(Debug, Clone)]
pub struct VideoThumbnailer {
    ffmpeg_path: String,
}

impl VideoThumbnailer {
    pub fn new(ffmpeg_path: String) -> Result<Self> {
        validate_path(&ffmpeg_path).context("Invalid ffmpeg_path")?;
        Ok(Self { ffmpeg_path })
    }

    pub fn ffmpeg_path(&self) -> &str {
        &self.ffmpeg_path
    }

    /// A single JPEG frame taken `offset_secs` into the video.
    #[tracing::instrument(skip(self, data), fields(
        process.executable.name = "ffmpeg",
        process.executable.path = %self.ffmpeg_path,
        media.size = data.len()
    ))]
    pub async fn extract_frame(&self, data: Bytes, offset_secs: f64) -> Result<Bytes, AppError> {
        self.extract_frame_inner(&data, offset_secs)
            .await
            .map_err(|e| AppError::Processing(format!("Failed to extract video frame: {:#}", e)))
    }

    async fn extract_frame_inner(&self, data: &[u8], offset_secs: f64) -> Result<Bytes> {
        let scratch = write_scratch(data).await?;
        let output_dir = tempfile::tempdir().context("Failed to create output directory")?;
        let output_path = output_dir.path().join("frame.jpg");

        let input = path_arg(scratch.path())?;
        let output_arg = path_arg(&output_path)?;

        let output = Command::new(&self.ffmpeg_path)
            .args(["-ss", &format!("{:.3}", offset_secs.max(0.0)), "-i"])
            .arg(&input)
            .args(["-vframes", "1", "-q:v", "2", "-y"])
            .arg(&output_arg)
            .output()
            .await
            .context("Failed to execute ffmpeg")?;

        if !output.status.success() {
            return Err(anyhow!(
                "ffmpeg failed: {}",
                String::from_utf8_lossy(&output.stderr)
            ));
        }

        let frame = tokio::fs::read(&output_path)
            .await
            .context("ffmpeg produced no frame")?;
        if frame.is_empty() {
            return Err(anyhow!("ffmpeg produced an empty frame"));
        }

        Ok(Bytes::from(frame))
    }
}
