pub mod ffmpeg;

use async_trait::async_trait;
use std::path::Path;

use crate::error::Result;
use crate::model::{ExtractedFrame, VideoMetadata};

pub use ffmpeg::FfmpegFrameSource;

/// Integer percentage callback, 0 to 100
pub type ProgressFn<'a> = &'a (dyn Fn(u8) + Send + Sync);

/// Where video metadata and sampled stills come from
#[async_trait]
pub trait FrameSource: Send + Sync {
    async fn probe(&self, path: &Path) -> Result<VideoMetadata>;

    /// One frame per whole `interval` window, in timestamp order
    async fn extract_frames(
        &self,
        path: &Path,
        interval: f64,
        progress: ProgressFn<'_>,
    ) -> Result<Vec<ExtractedFrame>>;
}

/// Sample timestamps for a video of `duration` seconds: the start of each whole window
pub fn sample_timestamps(duration: f64, interval: f64) -> Vec<f64> {
    if !interval.is_finite() || interval <= 0.0 || !duration.is_finite() || duration <= 0.0 {
        return Vec::new();
    }
    let count = (duration / interval).floor() as usize;
    (0..count).map(|i| i as f64 * interval).collect()
}

/// Progress after `done` of `total` frames have been grabbed
pub fn sampling_progress(done: usize, total: usize) -> u8 {
    if total == 0 {
        return 90;
    }
    (20 + 70 * done.min(total) / total) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamps_cover_whole_windows_only() {
        assert_eq!(sample_timestamps(40.0, 8.0), vec![0.0, 8.0, 16.0, 24.0, 32.0]);
        assert_eq!(sample_timestamps(47.9, 8.0).len(), 5);
        assert!(sample_timestamps(7.0, 8.0).is_empty());
        assert!(sample_timestamps(40.0, 0.0).is_empty());
    }

    #[test]
    fn progress_spans_twenty_to_ninety() {
        assert_eq!(sampling_progress(0, 4), 20);
        assert_eq!(sampling_progress(2, 4), 55);
        assert_eq!(sampling_progress(4, 4), 90);
    }
}
