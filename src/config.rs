//! Configuration loading from environment variables.
//!
//! Values are validated early so startup fails fast with actionable errors.
//! Every adapter receives the parts it needs from [`AppConfig`] at
//! construction time.

use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::AppError;

pub const DEFAULT_TRANSCRIBE_TIMEOUT_SECS: usize = 300;
pub const MAX_TRANSCRIBE_TIMEOUT_SECS: usize = 3600;
pub const DEFAULT_MAX_UPLOAD_MB: usize = 512;
pub const MAX_UPLOAD_MB: usize = 4096;

/// Runtime configuration for the HTTP server and its external collaborators.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Host interface to bind, for example `127.0.0.1`.
    pub host: String,
    /// TCP port to bind.
    pub port: u16,
    /// Root for raw and temporary uploads.
    pub upload_dir: PathBuf,
    /// Root for per-job separation output.
    pub output_dir: PathBuf,
    /// Directory served for `/` and other static paths.
    pub static_dir: PathBuf,
    /// Image looped behind the lyrics when it exists.
    pub background_image: PathBuf,
    /// Optional font file passed to `drawtext`.
    pub karaoke_font: Option<String>,
    /// Credential for the transcription API. No default is embedded.
    pub gemini_api_key: Option<String>,
    /// Model used for lyric transcription.
    pub gemini_model: String,
    /// Base URL of the generative language API.
    pub gemini_base_url: String,
    /// Upper bound for one transcription call.
    pub transcribe_timeout: Duration,
    /// Separation CLI executable.
    pub spleeter_bin: String,
    /// Separation model preset.
    pub spleeter_preset: String,
    /// Encoder CLI executable.
    pub ffmpeg_bin: String,
    /// Hosting-sync command run after mutating requests, `None` when disabled.
    pub deploy_command: Option<Vec<String>>,
    /// Request body limit in bytes.
    pub max_upload_bytes: usize,
}

impl AppConfig {
    /// Builds configuration from environment variables, resolving directory
    /// defaults against `work_dir`.
    ///
    /// Variables:
    /// - `HOST` (default `127.0.0.1`)
    /// - `PORT` (default `8000`)
    /// - `WORK_DIR` is read by the CLI and passed in as `work_dir`
    /// - `UPLOAD_DIR` (default `$WORK_DIR/uploads`)
    /// - `OUTPUT_DIR` (default `$WORK_DIR/separated`)
    /// - `STATIC_DIR` (default `$WORK_DIR`)
    /// - `BACKGROUND_IMAGE` (default `$WORK_DIR/logo.png`)
    /// - `KARAOKE_FONT` (optional)
    /// - `GEMINI_API_KEY` (optional; transcription fails without it)
    /// - `GEMINI_MODEL` (default `gemini-1.5-flash`)
    /// - `GEMINI_BASE_URL` (default `https://generativelanguage.googleapis.com`)
    /// - `TRANSCRIBE_TIMEOUT_SECS` (default `300`, min `1`, max `3600`)
    /// - `SPLEETER_BIN` (default `spleeter`)
    /// - `SPLEETER_PRESET` (default `spleeter:4stems`)
    /// - `FFMPEG_BIN` (default `ffmpeg`)
    /// - `DEPLOY_ENABLED` (default `true`)
    /// - `DEPLOY_COMMAND` (default `firebase deploy --only hosting`)
    /// - `MAX_UPLOAD_MB` (default `512`, min `1`, max `4096`)
    pub fn from_env_with_work_dir(work_dir: &Path) -> Result<Self, AppError> {
        let host = env_str("HOST", "127.0.0.1");
        let port = env_u16("PORT", 8000)?;

        let upload_dir = env_path("UPLOAD_DIR", work_dir.join("uploads"));
        let output_dir = env_path("OUTPUT_DIR", work_dir.join("separated"));
        let static_dir = env_path("STATIC_DIR", work_dir.to_path_buf());
        let background_image = env_path("BACKGROUND_IMAGE", work_dir.join("logo.png"));

        let transcribe_timeout = Duration::from_secs(env_usize_bounded(
            "TRANSCRIBE_TIMEOUT_SECS",
            DEFAULT_TRANSCRIBE_TIMEOUT_SECS,
            1,
            MAX_TRANSCRIBE_TIMEOUT_SECS,
        )? as u64);
        let max_upload_bytes =
            env_usize_bounded("MAX_UPLOAD_MB", DEFAULT_MAX_UPLOAD_MB, 1, MAX_UPLOAD_MB)?
                * 1024
                * 1024;

        let deploy_command = if env_bool("DEPLOY_ENABLED", true)? {
            let raw = env_str("DEPLOY_COMMAND", "firebase deploy --only hosting");
            Some(parse_command_line("DEPLOY_COMMAND", &raw)?)
        } else {
            None
        };

        Ok(Self {
            host,
            port,
            upload_dir,
            output_dir,
            static_dir,
            background_image,
            karaoke_font: env_opt("KARAOKE_FONT"),
            gemini_api_key: env_opt("GEMINI_API_KEY"),
            gemini_model: env_str("GEMINI_MODEL", "gemini-1.5-flash"),
            gemini_base_url: env_str(
                "GEMINI_BASE_URL",
                "https://generativelanguage.googleapis.com",
            ),
            transcribe_timeout,
            spleeter_bin: env_str("SPLEETER_BIN", "spleeter"),
            spleeter_preset: env_str("SPLEETER_PRESET", "spleeter:4stems"),
            ffmpeg_bin: env_str("FFMPEG_BIN", "ffmpeg"),
            deploy_command,
            max_upload_bytes,
        })
    }
}

fn env_str(name: &str, default: &str) -> String {
    env_opt(name).unwrap_or_else(|| default.to_string())
}

fn env_opt(name: &str) -> Option<String> {
    match env::var(name) {
        Ok(value) => {
            let trimmed = value.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        }
        Err(_) => None,
    }
}

fn env_path(name: &str, default: PathBuf) -> PathBuf {
    env_opt(name).map(PathBuf::from).unwrap_or(default)
}

fn env_u16(name: &str, default: u16) -> Result<u16, AppError> {
    let raw = env::var(name).unwrap_or_else(|_| default.to_string());
    let parsed = raw.trim().parse::<u16>().map_err(|_| {
        AppError::internal(format!("invalid {name}={raw:?}; expected integer 1-65535"))
    })?;
    if parsed == 0 {
        return Err(AppError::internal(format!(
            "invalid {name}={raw:?}; expected > 0"
        )));
    }
    Ok(parsed)
}

fn env_bool(name: &str, default: bool) -> Result<bool, AppError> {
    let raw = env::var(name).unwrap_or_else(|_| default.to_string());
    parse_bool(name, &raw)
}

fn parse_bool(name: &str, raw: &str) -> Result<bool, AppError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(AppError::internal(format!(
            "invalid {name}={raw:?}; expected true/false"
        ))),
    }
}

fn env_usize_bounded(
    name: &str,
    default: usize,
    min: usize,
    max: usize,
) -> Result<usize, AppError> {
    let raw = env::var(name).unwrap_or_else(|_| default.to_string());
    parse_usize_bounded(name, &raw, min, max)
}

fn parse_usize_bounded(name: &str, raw: &str, min: usize, max: usize) -> Result<usize, AppError> {
    let trimmed = raw.trim();
    let parsed = trimmed.parse::<usize>().map_err(|_| {
        AppError::internal(format!(
            "invalid {name}={raw:?}; expected integer in range [{min}, {max}]"
        ))
    })?;
    if parsed < min || parsed > max {
        return Err(AppError::internal(format!(
            "invalid {name}={raw:?}; expected integer in range [{min}, {max}]"
        )));
    }
    Ok(parsed)
}

/// Splits a command line on whitespace into program and arguments.
fn parse_command_line(name: &str, raw: &str) -> Result<Vec<String>, AppError> {
    let argv = raw
        .split_whitespace()
        .map(ToOwned::to_owned)
        .collect::<Vec<_>>();
    if argv.is_empty() {
        return Err(AppError::internal(format!(
            "invalid {name}={raw:?}; expected a command"
        )));
    }
    Ok(argv)
}

#[cfg(test)]
mod tests {
    use super::{parse_bool, parse_command_line, parse_usize_bounded};

    #[test]
    fn parse_usize_bounded_accepts_in_range_values() {
        assert_eq!(parse_usize_bounded("MAX_UPLOAD_MB", "1", 1, 8).unwrap(), 1);
        assert_eq!(parse_usize_bounded("MAX_UPLOAD_MB", "8", 1, 8).unwrap(), 8);
    }

    #[test]
    fn parse_usize_bounded_rejects_non_numeric_value() {
        assert!(parse_usize_bounded("MAX_UPLOAD_MB", "abc", 1, 8).is_err());
    }

    #[test]
    fn parse_usize_bounded_rejects_out_of_range_values() {
        assert!(parse_usize_bounded("TRANSCRIBE_TIMEOUT_SECS", "0", 1, 8).is_err());
        assert!(parse_usize_bounded("TRANSCRIBE_TIMEOUT_SECS", "9", 1, 8).is_err());
    }

    #[test]
    fn parse_bool_accepts_common_spellings() {
        assert!(parse_bool("DEPLOY_ENABLED", " Yes ").unwrap());
        assert!(!parse_bool("DEPLOY_ENABLED", "off").unwrap());
        assert!(parse_bool("DEPLOY_ENABLED", "maybe").is_err());
    }

    #[test]
    fn parse_command_line_splits_program_and_args() {
        assert_eq!(
            parse_command_line("DEPLOY_COMMAND", "firebase  deploy --only hosting").unwrap(),
            vec!["firebase", "deploy", "--only", "hosting"]
        );
        assert!(parse_command_line("DEPLOY_COMMAND", "   ").is_err());
    }
}
