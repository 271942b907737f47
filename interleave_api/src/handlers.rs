use std::path::PathBuf;

use axum::{
    Json,
    extract::{Multipart, Path, Request, State},
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use interleave_job::MediaBackend;
use serde_json::json;
use tokio::io::AsyncWriteExt;
use tower::ServiceExt;
use tower_http::services::ServeFile;

use crate::{
    AppContext, Config,
    error::ApiError,
    session::{Session, is_safe_file_name, upload_file_name},
};

#[derive(Debug, Default)]
struct Upload {
    /// Number of `videos` fields received, including any beyond the limit
    /// that were not stored.
    video_fields: usize,
    videos: Vec<PathBuf>,
    duration: Option<String>,
}

pub async fn health() -> impl IntoResponse {
    Json(json!({ "status": "healthy" }))
}

/// Accepts `videos` file fields and a `duration` field, interleaves the
/// videos and answers with the download URL of the result.
pub async fn process<B: MediaBackend>(
    State(context): State<AppContext<B>>,
    multipart: Multipart,
) -> Response {
    let session = match Session::create(&context.config.temp_dir).await {
        Ok(session) => session,
        Err(e) => {
            tracing::error!("failed to create session directory: {e}");
            return ApiError::Io(e).into_response();
        }
    };

    let result = run_session(&context, &session, multipart).await;

    // the session directory goes away whatever the outcome
    session.dispose().await;

    match result {
        Ok(download_url) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "download_url": download_url,
            })),
        )
            .into_response(),
        Err(e) => {
            tracing::error!("Session {}: Error - {}", session.id(), e);
            e.into_response()
        }
    }
}

async fn run_session<B: MediaBackend>(
    context: &AppContext<B>,
    session: &Session,
    mut multipart: Multipart,
) -> Result<String, ApiError> {
    let config = &context.config;

    let upload = receive_upload(&mut multipart, session, config.max_videos).await?;
    let target_duration = validate(&upload, config)?;

    tracing::info!(
        "Session {}: Processing {} videos for {}s",
        session.id(),
        upload.videos.len(),
        target_duration
    );

    let file_name = session.output_file_name(&config.job.segment_extension);
    let output = config.output_dir.join(&file_name);

    context
        .pipeline
        .process(&upload.videos, target_duration, &output, session.dir())
        .await?;

    tracing::info!("Session {}: Processing completed", session.id());

    Ok(format!("/download/{file_name}"))
}

/// Streams the uploaded videos into the session directory.
async fn receive_upload(
    multipart: &mut Multipart,
    session: &Session,
    max_videos: usize,
) -> Result<Upload, ApiError> {
    let mut upload = Upload::default();

    while let Some(mut field) = multipart.next_field().await? {
        let name = field.name().map(ToString::to_string);

        match name.as_deref() {
            Some("videos") => {
                let index = upload.video_fields;
                upload.video_fields += 1;

                // counted for validation, but not worth storing
                if index >= max_videos {
                    while field.chunk().await?.is_some() {}
                    continue;
                }

                let path = session
                    .dir()
                    .join(upload_file_name(index, field.file_name()));
                let mut file = tokio::fs::File::create(&path).await?;
                while let Some(chunk) = field.chunk().await? {
                    file.write_all(&chunk).await?;
                }
                file.flush().await?;

                tracing::info!("Saved file: {}", path.display());
                upload.videos.push(path);
            }
            Some("duration") => upload.duration = Some(field.text().await?),
            _ => {}
        }
    }

    Ok(upload)
}

/// Checks the upload against the configured bounds and returns the target
/// duration in seconds.
#[allow(clippy::cast_precision_loss)]
fn validate(upload: &Upload, config: &Config) -> Result<f64, ApiError> {
    if upload.video_fields == 0 {
        return Err(ApiError::BadRequest("No videos provided".to_string()));
    }

    if upload.video_fields < config.min_videos {
        return Err(ApiError::BadRequest(format!(
            "Minimum {} videos required",
            config.min_videos
        )));
    }

    if upload.video_fields > config.max_videos {
        return Err(ApiError::BadRequest(format!(
            "Maximum {} videos allowed",
            config.max_videos
        )));
    }

    let duration: i64 = upload
        .duration
        .as_deref()
        .unwrap_or("0")
        .trim()
        .parse()
        .map_err(|_| ApiError::BadRequest("Invalid duration format".to_string()))?;

    if duration < config.min_duration || duration > config.max_duration {
        return Err(ApiError::BadRequest(format!(
            "Duration must be between {} and {} seconds",
            config.min_duration, config.max_duration
        )));
    }

    Ok(duration as f64)
}

/// Serves a finished video as an attachment.
pub async fn download<B: MediaBackend>(
    State(context): State<AppContext<B>>,
    Path(filename): Path<String>,
    request: Request,
) -> Response {
    if !is_safe_file_name(&filename) {
        return ApiError::BadRequest("Invalid filename".to_string()).into_response();
    }

    let path = context.config.output_dir.join(&filename);

    match tokio::fs::metadata(&path).await {
        Ok(metadata) if metadata.is_file() => {}
        _ => {
            return ApiError::NotFound("File not found".to_string()).into_response();
        }
    }

    let mut response = match ServeFile::new(&path).oneshot(request).await {
        Ok(response) => response.into_response(),
        Err(infallible) => match infallible {},
    };

    if let Ok(value) =
        HeaderValue::from_str(&format!("attachment; filename=\"{filename}\""))
    {
        response.headers_mut().insert(header::CONTENT_DISPOSITION, value);
    }

    response
}
