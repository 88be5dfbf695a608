use async_trait::async_trait;
use serde::Deserialize;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

use super::{sample_timestamps, sampling_progress, FrameSource, ProgressFn};
use crate::config::MediaConfig;
use crate::data_url;
use crate::error::{ReplicatorError, Result};
use crate::model::{format_time_range, ExtractedFrame, VideoMetadata};

/// Frame source that shells out to `ffprobe` and `ffmpeg`
#[derive(Debug, Clone)]
pub struct FfmpegFrameSource {
    ffmpeg_path: String,
    ffprobe_path: String,
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
    #[serde(default)]
    format: Option<ProbeFormat>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    #[serde(default)]
    codec_type: Option<String>,
    #[serde(default)]
    width: Option<u32>,
    #[serde(default)]
    height: Option<u32>,
    #[serde(default)]
    avg_frame_rate: Option<String>,
    #[serde(default)]
    r_frame_rate: Option<String>,
    #[serde(default)]
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProbeFormat {
    #[serde(default)]
    format_name: Option<String>,
    #[serde(default)]
    duration: Option<String>,
    #[serde(default)]
    size: Option<String>,
}

impl Default for FfmpegFrameSource {
    fn default() -> Self {
        Self::new("ffmpeg", "ffprobe")
    }
}

impl FfmpegFrameSource {
    pub fn new(ffmpeg_path: impl Into<String>, ffprobe_path: impl Into<String>) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
            ffprobe_path: ffprobe_path.into(),
        }
    }

    pub fn from_config(config: &MediaConfig) -> Self {
        Self::new(config.ffmpeg_path(), config.ffprobe_path())
    }

    pub fn ffmpeg_path(&self) -> &str {
        &self.ffmpeg_path
    }

    pub fn ffprobe_path(&self) -> &str {
        &self.ffprobe_path
    }

    /// First line of `<binary> -version`, for the doctor command
    pub async fn check_binary(binary: &str) -> Result<String> {
        let output = Command::new(binary)
            .arg("-version")
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| ReplicatorError::media(format!("Failed to run {}: {}", binary, e)))?;

        if !output.status.success() {
            return Err(ReplicatorError::media(format!(
                "{} -version exited with {}",
                binary, output.status
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(stdout.lines().next().unwrap_or_default().trim().to_string())
    }

    async fn run(&self, binary: &str, args: &[&str]) -> Result<Vec<u8>> {
        tracing::debug!("Running {} {}", binary, args.join(" "));

        let output = Command::new(binary)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| ReplicatorError::media(format!("Failed to spawn {}: {}", binary, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let last = stderr.lines().last().unwrap_or_default().trim().to_string();
            return Err(ReplicatorError::media(format!(
                "{} exited with {}: {}",
                binary, output.status, last
            )));
        }

        Ok(output.stdout)
    }

    async fn grab_frame(&self, path: &str, timestamp: f64) -> Result<String> {
        let seek = format!("{:.3}", timestamp);
        let jpeg = self
            .run(
                &self.ffmpeg_path,
                &[
                    "-v", "error", "-ss", seek.as_str(), "-i", path, "-frames:v", "1", "-f", "image2pipe",
                    "-vcodec", "mjpeg", "-q:v", "3", "-",
                ],
            )
            .await?;

        if jpeg.is_empty() {
            return Err(ReplicatorError::media(format!(
                "ffmpeg produced no image at {}s",
                seek
            )));
        }

        Ok(data_url::encode(data_url::DEFAULT_IMAGE_MIME, &jpeg))
    }
}

#[async_trait]
impl FrameSource for FfmpegFrameSource {
    async fn probe(&self, path: &Path) -> Result<VideoMetadata> {
        let file_size = tokio::fs::metadata(path)
            .await
            .map_err(|e| ReplicatorError::media(format!("Cannot read {}: {}", path.display(), e)))?
            .len();

        let path_str = path.to_string_lossy().to_string();
        let stdout = self
            .run(
                &self.ffprobe_path,
                &[
                    "-v", "error", "-print_format", "json", "-show_streams", "-show_format",
                    path_str.as_str(),
                ],
            )
            .await?;

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        parse_probe(&stdout, file_name, file_size)
    }

    async fn extract_frames(
        &self,
        path: &Path,
        interval: f64,
        progress: ProgressFn<'_>,
    ) -> Result<Vec<ExtractedFrame>> {
        progress(0);
        let metadata = self.probe(path).await?;
        progress(10);

        let timestamps = sample_timestamps(metadata.duration, interval);
        tracing::info!(
            "Extracting {} frames from {} ({:.1}s)",
            timestamps.len(),
            metadata.file_name,
            metadata.duration
        );
        progress(20);

        let path_str = path.to_string_lossy().to_string();
        let mut frames = Vec::with_capacity(timestamps.len());
        for (scene_index, timestamp) in timestamps.iter().copied().enumerate() {
            let image = self.grab_frame(&path_str, timestamp).await?;
            frames.push(ExtractedFrame {
                scene_index,
                timestamp,
                time_range: format_time_range(timestamp, timestamp + interval),
                image,
            });
            progress(sampling_progress(scene_index + 1, timestamps.len()));
        }

        progress(100);
        Ok(frames)
    }
}

fn parse_probe(stdout: &[u8], file_name: String, file_size: u64) -> Result<VideoMetadata> {
    let probe: ProbeOutput = serde_json::from_slice(stdout)
        .map_err(|e| ReplicatorError::media(format!("Failed to parse ffprobe output: {}", e)))?;

    let video = probe
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"))
        .ok_or_else(|| ReplicatorError::media(format!("No video stream in {}", file_name)))?;

    let duration = probe
        .format
        .as_ref()
        .and_then(|f| f.duration.as_deref())
        .or(video.duration.as_deref())
        .and_then(|d| d.parse::<f64>().ok())
        .filter(|d| d.is_finite() && *d > 0.0)
        .ok_or_else(|| ReplicatorError::media(format!("Unknown duration for {}", file_name)))?;

    let fps = video
        .avg_frame_rate
        .as_deref()
        .and_then(parse_rate)
        .or_else(|| video.r_frame_rate.as_deref().and_then(parse_rate))
        .unwrap_or(0.0);

    let format = probe
        .format
        .as_ref()
        .and_then(|f| f.format_name.as_deref())
        .and_then(|names| names.split(',').next())
        .unwrap_or("unknown")
        .to_string();

    let file_size = probe
        .format
        .as_ref()
        .and_then(|f| f.size.as_deref())
        .and_then(|s| s.parse().ok())
        .unwrap_or(file_size);

    Ok(VideoMetadata {
        duration,
        width: video.width.unwrap_or(0),
        height: video.height.unwrap_or(0),
        fps,
        format,
        file_name,
        file_size,
    })
}

/// `30000/1001` or `25`
fn parse_rate(rate: &str) -> Option<f64> {
    let value = match rate.split_once('/') {
        Some((num, den)) => {
            let den: f64 = den.trim().parse().ok()?;
            if den == 0.0 {
                return None;
            }
            num.trim().parse::<f64>().ok()? / den
        }
        None => rate.trim().parse().ok()?,
    };
    (value.is_finite() && value > 0.0).then_some(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROBE_JSON: &str = r#"{
        "streams": [
            { "codec_type": "audio", "duration": "41.2" },
            {
                "codec_type": "video",
                "width": 1920,
                "height": 1080,
                "avg_frame_rate": "30000/1001",
                "r_frame_rate": "30/1",
                "duration": "40.04"
            }
        ],
        "format": {
            "format_name": "mov,mp4,m4a,3gp,3g2,mj2",
            "duration": "40.100000",
            "size": "5242880"
        }
    }"#;

    #[test]
    fn parses_ffprobe_json() {
        let meta = parse_probe(PROBE_JSON.as_bytes(), "clip.mp4".into(), 1).unwrap();
        assert_eq!(meta.duration, 40.1);
        assert_eq!((meta.width, meta.height), (1920, 1080));
        assert!((meta.fps - 29.97).abs() < 0.01);
        assert_eq!(meta.format, "mov");
        assert_eq!(meta.file_size, 5_242_880);
        assert_eq!(meta.file_name, "clip.mp4");
    }

    #[test]
    fn audio_only_input_is_a_media_error() {
        let json = r#"{ "streams": [{ "codec_type": "audio" }], "format": { "duration": "3.0" } }"#;
        let err = parse_probe(json.as_bytes(), "song.m4a".into(), 0).unwrap_err();
        assert!(matches!(err, ReplicatorError::Media(_)));
    }

    #[test]
    fn frame_rates() {
        assert_eq!(parse_rate("25"), Some(25.0));
        assert_eq!(parse_rate("0/0"), None);
        assert_eq!(parse_rate("60/1"), Some(60.0));
    }

    #[tokio::test]
    async fn missing_binary_is_reported() {
        let err = FfmpegFrameSource::check_binary("definitely-not-ffmpeg-xyz")
            .await
            .unwrap_err();
        assert_eq!(err.code(), "MEDIA_ERROR");
    }
}
