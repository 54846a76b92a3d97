//! Stem separation through the `spleeter` CLI.

use std::ffi::OsStr;
use std::path::Path;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::backend::{run_tool, StemSeparator};
use crate::config::AppConfig;
use crate::error::AppError;

/// Runs `spleeter separate` with a fixed preset.
pub struct SpleeterSeparator {
    program: String,
    preset: String,
}

impl SpleeterSeparator {
    pub fn new(cfg: &AppConfig) -> Self {
        Self {
            program: cfg.spleeter_bin.clone(),
            preset: cfg.spleeter_preset.clone(),
        }
    }
}

#[async_trait]
impl StemSeparator for SpleeterSeparator {
    async fn separate(&self, input: &Path, output_root: &Path) -> Result<(), AppError> {
        info!(input = %input.display(), preset = %self.preset, "separating stems");

        let args: [&OsStr; 6] = [
            OsStr::new("separate"),
            OsStr::new("-p"),
            OsStr::new(&self.preset),
            OsStr::new("-o"),
            output_root.as_os_str(),
            input.as_os_str(),
        ];
        let output = run_tool(&self.program, args)
            .await
            .map_err(AppError::processing)?;

        if !output.success {
            warn!(status = %output.status, "spleeter failed");
            return Err(AppError::processing(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                output.diagnostics()
            )));
        }
        Ok(())
    }
}
