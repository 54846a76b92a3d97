//! Per-job folder layout under the upload and output roots.
//!
//! Layout:
//! - `uploads/<sanitized-name>`: raw upload handed to the separator
//! - `uploads/temp_<sanitized-name>`: transient transcription input
//! - `uploads/temp_video_<sanitized-name>/`: transient render job
//! - `separated/<job-id>/`: stems, filter script, rendered video

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::AppError;
use crate::sanitize::sanitize_filename;

/// Stems produced by the 4-stem preset, in response order.
pub const STEM_FILES: [&str; 4] = ["vocals.wav", "drums.wav", "bass.wav", "other.wav"];
/// Vocal stem read by the transcription adapter.
pub const VOCALS_FILE: &str = "vocals.wav";
/// Instrumental stem preferred for video rendering.
pub const INSTRUMENTAL_FILE: &str = "other.wav";
/// Instrumental produced by 2-stem presets.
pub const ACCOMPANIMENT_FILE: &str = "accompaniment.wav";
pub const FILTER_SCRIPT_FILE: &str = "filters_karaoke.txt";
pub const JOB_VIDEO_FILE: &str = "video_karaoke.mp4";

const TEMP_PREFIX: &str = "temp_";

/// Resolves job identifiers and paths under the two storage roots.
#[derive(Debug, Clone)]
pub struct JobStore {
    upload_root: PathBuf,
    output_root: PathBuf,
}

impl JobStore {
    pub fn new(upload_root: impl Into<PathBuf>, output_root: impl Into<PathBuf>) -> Self {
        Self {
            upload_root: upload_root.into(),
            output_root: output_root.into(),
        }
    }

    pub fn output_root(&self) -> &Path {
        &self.output_root
    }

    /// Creates both roots if they are missing.
    pub async fn ensure_roots(&self) -> Result<(), AppError> {
        for root in [&self.upload_root, &self.output_root] {
            tokio::fs::create_dir_all(root).await.map_err(|err| {
                AppError::internal(format!("failed to create directory {:?}: {err}", root))
            })?;
        }
        Ok(())
    }

    /// Path an upload named `filename` is saved to.
    pub fn upload_path(&self, filename: &str) -> PathBuf {
        self.upload_root.join(sanitize_filename(filename))
    }

    /// Path for a transient single-file input.
    pub fn temp_upload_path(&self, filename: &str) -> PathBuf {
        self.upload_root
            .join(format!("{TEMP_PREFIX}{}", sanitize_filename(filename)))
    }

    /// Directory for a transient render job.
    pub fn temp_job_dir(&self, filename: &str) -> PathBuf {
        self.upload_root
            .join(format!("{TEMP_PREFIX}video_{}", sanitize_filename(filename)))
    }

    /// Output directory for a job id produced by [`resolve_job_id`].
    pub fn output_dir(&self, job_id: &str) -> PathBuf {
        self.output_root.join(job_id)
    }

    /// Validates a caller-supplied folder name and returns its output directory.
    pub fn job_dir(&self, folder: &str) -> Result<PathBuf, AppError> {
        let folder = folder.trim();
        if folder.is_empty() {
            return Err(AppError::bad_request("missing folder"));
        }
        if sanitize_filename(folder) != folder || is_dot_name(folder) {
            return Err(AppError::bad_request(format!("invalid folder {folder:?}")));
        }
        Ok(self.output_dir(folder))
    }

    /// Removes any previous output for `job_id`. Missing directories are fine.
    pub async fn reset_output_dir(&self, job_id: &str) -> Result<(), AppError> {
        let dir = self.output_dir(job_id);
        match tokio::fs::remove_dir_all(&dir).await {
            Ok(()) => {
                info!(job_id, dir = %dir.display(), "removed previous job output");
                Ok(())
            }
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(AppError::internal(format!(
                "failed to reset output directory {:?}: {err}",
                dir
            ))),
        }
    }

    /// Expected stem paths for `job_id`, in [`STEM_FILES`] order.
    pub fn expected_stems(&self, job_id: &str) -> Vec<PathBuf> {
        let dir = self.output_dir(job_id);
        STEM_FILES.iter().map(|name| dir.join(name)).collect()
    }

    /// Fails with a processing error naming every stem that was not produced.
    pub async fn verify_stems(&self, job_id: &str) -> Result<(), AppError> {
        let mut missing = Vec::new();
        for path in self.expected_stems(job_id) {
            if !is_file(&path).await {
                missing.push(path.display().to_string());
            }
        }
        if missing.is_empty() {
            Ok(())
        } else {
            Err(AppError::processing(format!(
                "separation finished without producing: {}",
                missing.join(", ")
            )))
        }
    }
}

/// Sanitizes `filename` and strips its final extension.
///
/// `song.mp3` gives `song`, `a.b.mp3` gives `a.b`, `.hidden` stays `.hidden`.
pub fn resolve_job_id(filename: &str) -> Result<String, AppError> {
    let safe = sanitize_filename(filename);
    let stem = Path::new(&safe)
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or_default()
        .to_string();
    if stem.is_empty() || is_dot_name(&stem) {
        return Err(AppError::bad_request(format!(
            "cannot derive a job id from filename {filename:?}"
        )));
    }
    Ok(stem)
}

/// The instrumental stem in `dir`: `other.wav`, else `accompaniment.wav`.
pub async fn instrumental_track(dir: &Path) -> Option<PathBuf> {
    for name in [INSTRUMENTAL_FILE, ACCOMPANIMENT_FILE] {
        let path = dir.join(name);
        if is_file(&path).await {
            return Some(path);
        }
    }
    None
}

pub async fn is_file(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|meta| meta.is_file())
        .unwrap_or(false)
}

fn is_dot_name(name: &str) -> bool {
    name == "." || name == ".."
}
