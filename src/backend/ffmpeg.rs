//! Karaoke video rendering through the `ffmpeg` CLI.

use std::ffi::OsString;
use std::path::PathBuf;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::backend::{run_tool, RenderJob, VideoRenderer};
use crate::config::AppConfig;
use crate::error::AppError;
use crate::jobs::is_file;
use crate::karaoke::{CANVAS_HEIGHT, CANVAS_WIDTH};

const FRAME_RATE: &str = "30";
const AUDIO_BITRATE: &str = "128k";

/// Renders the filter script over a still image or a black canvas.
pub struct FfmpegRenderer {
    program: String,
    background_image: PathBuf,
}

impl FfmpegRenderer {
    pub fn new(cfg: &AppConfig) -> Self {
        Self {
            program: cfg.ffmpeg_bin.clone(),
            background_image: cfg.background_image.clone(),
        }
    }

    /// Background input arguments: the looped image if present, else black.
    async fn background_args(&self) -> Vec<OsString> {
        if is_file(&self.background_image).await {
            vec![
                "-loop".into(),
                "1".into(),
                "-i".into(),
                self.background_image.clone().into_os_string(),
            ]
        } else {
            vec![
                "-f".into(),
                "lavfi".into(),
                "-i".into(),
                format!("color=c=black:s={CANVAS_WIDTH}x{CANVAS_HEIGHT}").into(),
            ]
        }
    }

    /// Full encoder argument list for `job`.
    pub async fn build_args(&self, job: &RenderJob) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec!["-y".into()];
        args.extend(self.background_args().await);
        args.extend([
            "-i".into(),
            job.audio.clone().into_os_string(),
            "-filter_complex_script".into(),
            job.filter_script.clone().into_os_string(),
        ]);
        args.extend(
            [
                "-c:v", "libx264", "-preset", "veryfast", "-crf", "25", "-c:a", "aac", "-b:a",
                AUDIO_BITRATE, "-r", FRAME_RATE, "-pix_fmt", "yuv420p", "-shortest",
            ]
            .into_iter()
            .map(OsString::from),
        );
        args.push(job.output.clone().into_os_string());
        args
    }
}

#[async_trait]
impl VideoRenderer for FfmpegRenderer {
    async fn render(&self, job: &RenderJob) -> Result<(), AppError> {
        info!(
            audio = %job.audio.display(),
            output = %job.output.display(),
            "rendering karaoke video"
        );

        let args = self.build_args(job).await;
        let output = run_tool(&self.program, &args)
            .await
            .map_err(AppError::rendering)?;

        if !output.success {
            warn!(status = %output.status, "ffmpeg failed");
            return Err(AppError::rendering(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                tail(&output.diagnostics(), 40)
            )));
        }
        if !is_file(&job.output).await {
            return Err(AppError::rendering(format!(
                "{} finished without writing {}",
                self.program,
                job.output.display()
            )));
        }
        Ok(())
    }
}

/// Last `max_lines` lines of encoder output, which is where errors land.
fn tail(text: &str, max_lines: usize) -> String {
    let lines = text.lines().collect::<Vec<_>>();
    let start = lines.len().saturating_sub(max_lines);
    lines[start..].join("\n")
}
