//! Adapters for the external collaborators.
//!
//! The HTTP layer depends on the [`StemSeparator`], [`LyricsModel`] and
//! [`VideoRenderer`] traits instead of concrete tools, which keeps request
//! handling decoupled from process and network plumbing.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::config::AppConfig;
use crate::error::AppError;

pub mod ffmpeg;
pub mod gemini;
pub mod spleeter;

/// Audio attached to a transcription request.
#[derive(Debug, Clone)]
pub struct AudioClip {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

/// Inputs for one karaoke render.
#[derive(Debug, Clone)]
pub struct RenderJob {
    /// Audio track muxed into the video.
    pub audio: PathBuf,
    /// Filtergraph produced by the karaoke compiler.
    pub filter_script: PathBuf,
    /// Destination MP4.
    pub output: PathBuf,
}

/// Splits a song into per-instrument stems.
#[async_trait]
pub trait StemSeparator: Send + Sync {
    /// Separates `input` into `<output_root>/<input stem>/*.wav`.
    async fn separate(&self, input: &Path, output_root: &Path) -> Result<(), AppError>;
}

/// Remote generative model that answers a prompt about an audio clip.
#[async_trait]
pub trait LyricsModel: Send + Sync {
    /// Returns the raw text of the model's answer.
    async fn generate(&self, prompt: &str, audio: AudioClip) -> Result<String, AppError>;
}

/// Encodes a karaoke video.
#[async_trait]
pub trait VideoRenderer: Send + Sync {
    async fn render(&self, job: &RenderJob) -> Result<(), AppError>;
}

/// Concrete adapters selected from configuration.
#[derive(Clone)]
pub struct Backends {
    pub separator: Arc<dyn StemSeparator>,
    pub lyrics_model: Arc<dyn LyricsModel>,
    pub renderer: Arc<dyn VideoRenderer>,
}

/// Builds the configured adapter implementations.
pub fn build_backends(cfg: &AppConfig) -> Result<Backends, AppError> {
    Ok(Backends {
        separator: Arc::new(spleeter::SpleeterSeparator::new(cfg)),
        lyrics_model: Arc::new(gemini::GeminiModel::new(cfg)?),
        renderer: Arc::new(ffmpeg::FfmpegRenderer::new(cfg)),
    })
}

/// Captured result of an external tool run.
#[derive(Debug)]
pub struct ToolOutput {
    pub success: bool,
    pub status: String,
    pub stdout: String,
    pub stderr: String,
}

impl ToolOutput {
    /// Best available diagnostic text: stderr, then stdout, then the status.
    pub fn diagnostics(&self) -> String {
        let stderr = self.stderr.trim();
        if !stderr.is_empty() {
            return stderr.to_string();
        }
        let stdout = self.stdout.trim();
        if !stdout.is_empty() {
            return stdout.to_string();
        }
        self.status.clone()
    }
}

/// Runs `program` to completion and captures its output.
///
/// Spawn failures are returned as `Err` with a message naming the program.
pub async fn run_tool<I, S>(program: &str, args: I) -> Result<ToolOutput, String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let start = Instant::now();
    let output = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|err| format!("failed to execute {program}: {err}"))?;

    debug!(
        program,
        status = %output.status,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "external tool finished"
    );

    Ok(ToolOutput {
        success: output.status.success(),
        status: output.status.to_string(),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    })
}
