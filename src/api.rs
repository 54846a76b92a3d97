//! HTTP API consumed by the karaoke front-end.
//!
//! This module owns request parsing, path resolution, and response shaping
//! while delegating separation, transcription and rendering to the adapters
//! in [`crate::backend`].

use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::multipart::MultipartRejection;
use axum::extract::rejection::JsonRejection;
use axum::extract::{DefaultBodyLimit, FromRequest, Multipart, Request, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use http::HeaderValue;
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::audio::mime_type_for;
use crate::backend::{AudioClip, Backends, RenderJob};
use crate::config::AppConfig;
use crate::deploy::DeployNotifier;
use crate::error::AppError;
use crate::jobs::{
    instrumental_track, is_file, resolve_job_id, JobStore, JOB_VIDEO_FILE, VOCALS_FILE,
};
use crate::karaoke::{write_filter_script, LyricLine};
use crate::lyrics::{transcribe_lyrics, LyricsDocument};
use crate::projects::{list_projects, ProjectEntry};
use crate::sanitize::sanitize_filename;

/// Video returned by `/generate_video_from_file`.
pub const SERVER_VIDEO_FILE: &str = "karaoke_server.mp4";

/// Shared state injected into all route handlers.
pub struct AppState {
    /// Runtime configuration loaded at startup.
    pub cfg: AppConfig,
    pub jobs: JobStore,
    pub backends: Backends,
    pub deploy: DeployNotifier,
}

impl AppState {
    /// Constructs shared handler state.
    pub fn new(cfg: AppConfig, backends: Backends, deploy: DeployNotifier) -> Self {
        let jobs = JobStore::new(cfg.upload_dir.clone(), cfg.output_dir.clone());
        Self {
            cfg,
            jobs,
            backends,
            deploy,
        }
    }
}

/// Builds the Axum router for all public endpoints and static files.
pub fn build_router(state: Arc<AppState>) -> Router {
    let stems = Router::new()
        .nest_service("/stems", ServeDir::new(&state.cfg.output_dir))
        .layer(SetResponseHeaderLayer::overriding(
            header::ACCESS_CONTROL_ALLOW_ORIGIN,
            HeaderValue::from_static("*"),
        ));
    let static_files = ServeDir::new(&state.cfg.static_dir);
    let body_limit = state.cfg.max_upload_bytes;

    Router::new()
        .route("/process", post(process))
        .route("/lyrics", post(lyrics))
        .route("/generate_video", post(generate_video))
        .route("/generate_video_from_file", post(generate_video_from_file))
        .route("/list_projects", get(projects))
        .with_state(state)
        .merge(stems)
        .fallback_service(static_files)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Stem download URLs returned by `/process`.
#[derive(Debug, Serialize)]
pub struct ProcessResponse {
    pub success: bool,
    pub folder: String,
    pub vocals: String,
    pub coros: String,
    pub drums: String,
    pub bass: String,
    pub instrumental: String,
}

impl ProcessResponse {
    fn for_job(job_id: &str) -> Self {
        let url = |file: &str| stem_url(job_id, file);
        Self {
            success: true,
            folder: job_id.to_string(),
            vocals: url("vocals.wav"),
            coros: url("other.wav"),
            drums: url("drums.wav"),
            bass: url("bass.wav"),
            instrumental: url("other.wav"),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct VideoResponse {
    pub success: bool,
    pub video_url: String,
}

#[derive(Debug, Deserialize)]
struct FolderRequest {
    folder: Option<String>,
}

/// Body of `/generate_video`.
#[derive(Debug, Deserialize)]
pub struct GenerateVideoRequest {
    #[serde(default)]
    pub folder: String,
    #[serde(default)]
    pub lyrics: Vec<LyricLine>,
}

/// Separates an uploaded song into stems (`POST /process`).
pub async fn process(
    State(state): State<Arc<AppState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<ProcessResponse>, AppError> {
    let form = parse_upload_form(multipart?).await?;
    let file = form.require_file()?;

    let job_id = resolve_job_id(&file.filename)?;
    let upload_path = state.jobs.upload_path(&file.filename);
    save_upload(&upload_path, &file.bytes).await?;
    state.jobs.reset_output_dir(&job_id).await?;

    info!(job_id = %job_id, upload = %upload_path.display(), "processing upload");
    state
        .backends
        .separator
        .separate(&upload_path, state.jobs.output_root())
        .await?;
    state.jobs.verify_stems(&job_id).await?;

    state.deploy.notify("process");
    Ok(Json(ProcessResponse::for_job(&job_id)))
}

/// Where the audio for a transcription comes from.
enum AudioSource {
    /// Saved from this request; removed after a successful run.
    Uploaded(PathBuf),
    /// Vocal stem of an existing job; never removed.
    Job(PathBuf),
}

impl AudioSource {
    fn path(&self) -> &Path {
        match self {
            AudioSource::Uploaded(path) | AudioSource::Job(path) => path,
        }
    }
}

/// Transcribes lyrics from an upload or a job's vocal stem (`POST /lyrics`).
pub async fn lyrics(
    State(state): State<Arc<AppState>>,
    request: Request,
) -> Result<Json<LyricsDocument>, AppError> {
    let source = resolve_audio_source(&state, request).await?;
    let path = source.path();

    let bytes = tokio::fs::read(path)
        .await
        .map_err(|err| AppError::internal(format!("failed to read {:?}: {err}", path)))?;
    let clip = AudioClip {
        bytes,
        mime_type: mime_type_for(path).to_string(),
    };

    info!(audio = %path.display(), "transcribing lyrics");
    let document = transcribe_lyrics(state.backends.lyrics_model.as_ref(), clip).await?;

    if let AudioSource::Uploaded(path) = &source {
        if let Err(err) = tokio::fs::remove_file(path).await {
            warn!(path = %path.display(), error = %err, "failed to remove temporary upload");
        }
    }
    Ok(Json(document))
}

async fn resolve_audio_source(
    state: &Arc<AppState>,
    request: Request,
) -> Result<AudioSource, AppError> {
    let content_type = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_ascii_lowercase();

    if content_type.starts_with("multipart/form-data") {
        let multipart = Multipart::from_request(request, state).await?;
        let form = parse_upload_form(multipart).await?;
        if let Some(file) = form.file {
            let path = state.jobs.temp_upload_path(&file.filename);
            save_upload(&path, &file.bytes).await?;
            return Ok(AudioSource::Uploaded(path));
        }
    } else if content_type.contains("json") {
        let Json(body) = Json::<FolderRequest>::from_request(request, state).await?;
        if let Some(folder) = body.folder.filter(|folder| !folder.trim().is_empty()) {
            let vocals = state.jobs.job_dir(&folder)?.join(VOCALS_FILE);
            if is_file(&vocals).await {
                return Ok(AudioSource::Job(vocals));
            }
            return Err(AppError::bad_request(format!(
                "no vocal stem found for folder {folder:?}"
            )));
        }
    }

    Err(AppError::bad_request(
        "no vocal audio found: send a multipart file or JSON {\"folder\": ...}",
    ))
}

/// Renders a karaoke video for an existing job (`POST /generate_video`).
pub async fn generate_video(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<GenerateVideoRequest>, JsonRejection>,
) -> Result<Json<VideoResponse>, AppError> {
    let Json(request) = payload?;
    let folder = request.folder.trim();
    let dir = state.jobs.job_dir(folder)?;
    let audio = instrumental_track(&dir).await.ok_or_else(|| {
        AppError::bad_request(format!("no instrumental stem found for folder {folder:?}"))
    })?;

    let filter_script =
        write_filter_script(&dir, &request.lyrics, state.cfg.karaoke_font.as_deref()).await?;
    let job = RenderJob {
        audio,
        filter_script,
        output: dir.join(JOB_VIDEO_FILE),
    };
    state.backends.renderer.render(&job).await?;
    info!(folder, lines = request.lyrics.len(), "karaoke video rendered");

    state.deploy.notify("generate_video");
    Ok(Json(VideoResponse {
        success: true,
        video_url: stem_url(folder, JOB_VIDEO_FILE),
    }))
}

/// Renders a karaoke video from an uploaded track and returns the MP4
/// (`POST /generate_video_from_file`).
pub async fn generate_video_from_file(
    State(state): State<Arc<AppState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, AppError> {
    let form = parse_upload_form(multipart?).await?;
    let lyrics = parse_lyrics_field(form.lyrics.as_deref())?;
    let file = form.require_file()?;

    let dir = state.jobs.temp_job_dir(&file.filename);
    let audio = dir.join(sanitize_filename(&file.filename));
    save_upload(&audio, &file.bytes).await?;

    let filter_script =
        write_filter_script(&dir, &lyrics, state.cfg.karaoke_font.as_deref()).await?;
    let output = dir.join(SERVER_VIDEO_FILE);
    state
        .backends
        .renderer
        .render(&RenderJob {
            audio,
            filter_script,
            output: output.clone(),
        })
        .await?;

    let video = tokio::fs::read(&output)
        .await
        .map_err(|err| AppError::rendering(format!("failed to read {:?}: {err}", output)))?;
    info!(bytes = video.len(), lines = lyrics.len(), "karaoke video rendered from upload");

    Ok((
        [
            (header::CONTENT_TYPE, "video/mp4".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{SERVER_VIDEO_FILE}\""),
            ),
        ],
        video,
    )
        .into_response())
}

/// Lists job folders, newest first (`GET /list_projects`).
pub async fn projects(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<ProjectEntry>>, AppError> {
    Ok(Json(list_projects(state.jobs.output_root()).await?))
}

struct UploadedFile {
    filename: String,
    bytes: Bytes,
}

#[derive(Default)]
struct UploadForm {
    file: Option<UploadedFile>,
    lyrics: Option<String>,
}

impl UploadForm {
    fn require_file(self) -> Result<UploadedFile, AppError> {
        self.file
            .ok_or_else(|| AppError::bad_request("missing required multipart field: file"))
    }
}

/// Reads the `file` and `lyrics` fields; other fields are ignored.
async fn parse_upload_form(mut multipart: Multipart) -> Result<UploadForm, AppError> {
    let mut form = UploadForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| AppError::bad_multipart(format!("invalid multipart body: {err}")))?
    {
        let Some(name) = field.name().map(ToOwned::to_owned) else {
            continue;
        };

        match name.as_str() {
            "file" => {
                let filename = field
                    .file_name()
                    .map(ToOwned::to_owned)
                    .filter(|name| !name.trim().is_empty())
                    .ok_or_else(|| AppError::bad_multipart("file field is missing filename"))?;
                let bytes = field.bytes().await.map_err(|err| {
                    AppError::bad_multipart(format!("failed to read file bytes: {err}"))
                })?;
                if bytes.is_empty() {
                    return Err(AppError::bad_request("uploaded file is empty"));
                }
                form.file = Some(UploadedFile { filename, bytes });
            }
            "lyrics" => {
                form.lyrics = Some(field.text().await.map_err(|err| {
                    AppError::bad_multipart(format!("invalid lyrics field: {err}"))
                })?);
            }
            _ => {}
        }
    }

    Ok(form)
}

/// Parses the `lyrics` form field; absent or blank means no lines.
fn parse_lyrics_field(raw: Option<&str>) -> Result<Vec<LyricLine>, AppError> {
    match raw.map(str::trim).filter(|raw| !raw.is_empty()) {
        None => Ok(Vec::new()),
        Some(raw) => serde_json::from_str(raw)
            .map_err(|err| AppError::bad_request(format!("invalid lyrics JSON: {err}"))),
    }
}

async fn save_upload(path: &Path, bytes: &[u8]) -> Result<(), AppError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(|err| {
            AppError::internal(format!("failed to create directory {:?}: {err}", parent))
        })?;
    }
    tokio::fs::write(path, bytes)
        .await
        .map_err(|err| AppError::internal(format!("failed to save upload {:?}: {err}", path)))
}

fn stem_url(job_id: &str, file: &str) -> String {
    format!("/stems/{job_id}/{file}")
}
