use axum::{
    extract::{Json, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Router,
};
use base64::{prelude::BASE64_STANDARD, Engine};
use image::DynamicImage;
use lorasweep_core::{
    cmdargs, run_sweep, AggregateResult, GenerationRequest, Job, JobArgs, JobBuilder, Pipeline,
    SweepError, SweepSettings, Templates,
};
use serde::{Deserialize, Serialize};
use std::{io::Cursor, path::PathBuf, sync::Arc};
use tracing::{error, info};

// Application state shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<dyn Pipeline>,
    pub templates_dir: PathBuf,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/v1/sweeps", post(sweep_handler))
        .route("/v1/sweeps/preview", post(preview_handler))
        .route("/v1/cmdargs", post(cmdargs_handler))
        .with_state(Arc::new(state))
}

#[derive(Deserialize)]
struct SweepRequest {
    #[serde(default)]
    request: GenerationRequest,
    #[serde(flatten)]
    settings: SweepSettings,
    /// `--flag value` overrides applied to `request` before sweeping
    #[serde(default)]
    job_line: Option<String>,
}

#[derive(Serialize)]
struct SweepResponse {
    images: Vec<String>,
    all_prompts: Vec<String>,
    infotexts: Vec<String>,
    seeds: Vec<i64>,
}

#[derive(Serialize)]
struct JobPreview {
    index: usize,
    tag: String,
    weight: f64,
    request: GenerationRequest,
}

#[derive(Deserialize)]
struct CmdargsRequest {
    line: String,
}

enum ApiError {
    Sweep(SweepError),
    Internal(anyhow::Error),
}

impl From<SweepError> for ApiError {
    fn from(e: SweepError) -> Self {
        Self::Sweep(e)
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(e: anyhow::Error) -> Self {
        Self::Internal(e)
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(e: tokio::task::JoinError) -> Self {
        Self::Internal(e.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::Sweep(e) => {
                let status = match e {
                    SweepError::MalformedArgument(_)
                    | SweepError::UnknownOption(_)
                    | SweepError::InvalidValue { .. }
                    | SweepError::InvalidSweepRange { .. } => StatusCode::BAD_REQUEST,
                    SweepError::TemplateFileMissing { .. } => StatusCode::INTERNAL_SERVER_ERROR,
                    SweepError::Pipeline { .. } => StatusCode::BAD_GATEWAY,
                };
                (status, format!("{:#}", anyhow::Error::new(e)))
            }
            Self::Internal(e) => (StatusCode::INTERNAL_SERVER_ERROR, format!("{e:#}")),
        };
        if status.is_server_error() {
            error!("Error handling request: {}", message);
        }
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

fn prepare_jobs(state: &AppState, body: &SweepRequest) -> Result<Vec<Job>, ApiError> {
    let base = match &body.job_line {
        Some(line) => cmdargs(line)?.apply(&body.request)?,
        None => body.request.clone(),
    };
    let templates = Templates::load(&state.templates_dir)?;
    Ok(JobBuilder::new(&base, &body.settings, &templates).build()?)
}

async fn sweep_handler(
    State(state): State<Arc<AppState>>,
    Json(body): Json<SweepRequest>,
) -> Result<Json<SweepResponse>, ApiError> {
    let jobs = prepare_jobs(&state, &body)?;
    info!(lora = %body.settings.lora, jobs = jobs.len(), "starting sweep");

    // The pipeline blocks on HTTP, keep it off the async workers.
    let pipeline = Arc::clone(&state.pipeline);
    let result = tokio::task::spawn_blocking(move || {
        run_sweep(pipeline.as_ref(), &jobs, |progress| {
            info!(done = progress.done, total = progress.total, "sweep progress");
        })
    })
    .await??;

    Ok(Json(encode_result(result)?))
}

async fn preview_handler(
    State(state): State<Arc<AppState>>,
    Json(body): Json<SweepRequest>,
) -> Result<Json<Vec<JobPreview>>, ApiError> {
    let previews = prepare_jobs(&state, &body)?
        .into_iter()
        .map(|job| JobPreview {
            index: job.index,
            tag: job.tag.to_string(),
            weight: job.tag.weight,
            request: job.request,
        })
        .collect();
    Ok(Json(previews))
}

async fn cmdargs_handler(Json(body): Json<CmdargsRequest>) -> Result<Json<JobArgs>, ApiError> {
    Ok(Json(cmdargs(&body.line)?))
}

fn encode_result(result: AggregateResult) -> anyhow::Result<SweepResponse> {
    let images = result
        .images
        .iter()
        .map(image_to_base64_png)
        .collect::<anyhow::Result<Vec<_>>>()?;
    Ok(SweepResponse {
        images,
        all_prompts: result.all_prompts,
        infotexts: result.infotexts,
        seeds: result.seeds,
    })
}

/// Encodes an image as a base64 PNG.
fn image_to_base64_png(img: &DynamicImage) -> anyhow::Result<String> {
    let mut bytes = Vec::new();
    img.write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)?;
    Ok(BASE64_STANDARD.encode(&bytes))
}
