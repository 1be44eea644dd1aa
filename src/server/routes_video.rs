//! Video upload and multi-frame VLM analysis.

use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::AppContext;
use crate::error::{Error, Result};
use crate::video::{self, VideoMetadata};
use crate::vlm::{self, prompt, Message};

pub fn video_routes(ctx: &AppContext) -> Router<AppContext> {
    let max_body = ctx.config.video.max_upload_mb * 1024 * 1024;

    Router::new()
        .route(
            "/upload-video",
            post(upload_video).layer(DefaultBodyLimit::max(max_body as usize)),
        )
        .route("/analyze-video", post(analyze_video))
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub success: bool,
    pub video_id: String,
    pub filename: String,
    pub message: String,
}

/// Handle a multipart video upload (field name `video`).
async fn upload_video(
    State(ctx): State<AppContext>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>> {
    let uploads_dir = ctx.config.storage.uploads_dir();
    tokio::fs::create_dir_all(&uploads_dir).await?;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| Error::invalid_request(format!("Malformed multipart body: {e}")))?
    {
        if field.name() != Some("video") {
            continue;
        }

        let original_name = field
            .file_name()
            .map(video::sanitize_filename)
            .filter(|n| !n.is_empty())
            .ok_or_else(|| Error::invalid_request("No video file selected"))?;

        if !video::allowed_file(&original_name, &ctx.config.video.allowed_extensions) {
            return Err(Error::invalid_request(format!(
                "Invalid file type. Allowed: {}",
                ctx.config.video.allowed_extensions.join(", ")
            )));
        }

        let bytes = field
            .bytes()
            .await
            .map_err(|e| Error::invalid_request(format!("Failed to read upload: {e}")))?;

        let max_bytes = ctx.config.video.max_upload_mb * 1024 * 1024;
        if bytes.len() as u64 > max_bytes {
            return Err(Error::invalid_request(format!(
                "Video file exceeds {}MB limit",
                ctx.config.video.max_upload_mb
            )));
        }

        let video_id = video::new_video_id();
        let stored_name = format!("{video_id}_{original_name}");
        let path = uploads_dir.join(&stored_name);
        tokio::fs::write(&path, &bytes).await?;

        tracing::info!(
            %video_id,
            file = %original_name,
            size_mb = bytes.len() / (1024 * 1024),
            "video uploaded"
        );

        return Ok(Json(UploadResponse {
            success: true,
            video_id,
            filename: original_name,
            message: "Video uploaded successfully".to_string(),
        }));
    }

    Err(Error::invalid_request("No video file provided"))
}

#[derive(Debug, Deserialize)]
pub struct AnalyzeVideoRequest {
    pub video_id: String,
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(default)]
    pub sample_rate: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct AnalyzeVideoResponse {
    pub success: bool,
    pub video_id: String,
    pub analysis: String,
    pub video_metadata: VideoMetadata,
    pub frames_analyzed: usize,
}

/// Analyze an uploaded video: extract frames, sample them, and send the
/// sampled frames to the VLM in one multimodal message.
async fn analyze_video(
    State(ctx): State<AppContext>,
    Json(req): Json<AnalyzeVideoRequest>,
) -> Result<Json<AnalyzeVideoResponse>> {
    if !video::is_valid_video_id(&req.video_id) {
        return Err(Error::invalid_request(format!(
            "Invalid video_id: {}",
            req.video_id
        )));
    }

    let uploads_dir = ctx.config.storage.uploads_dir();
    let video_path = video::find_video(&uploads_dir, &req.video_id)
        .ok_or_else(|| Error::not_found(format!("Video not found: {}", req.video_id)))?;

    let frames_dir = ctx.config.storage.frames_dir().join(&req.video_id);

    let result = run_analysis(&ctx, &req, &video_path, &frames_dir).await;

    // Frames are scratch data; drop them whether or not the analysis worked.
    if frames_dir.exists() {
        if let Err(e) = tokio::fs::remove_dir_all(&frames_dir).await {
            tracing::warn!(error = %e, dir = %frames_dir.display(), "failed to clean frame dir");
        }
    }

    let (analysis, metadata, frames_analyzed) = result?;
    ctx.state.record_video_analysis();

    Ok(Json(AnalyzeVideoResponse {
        success: true,
        video_id: req.video_id,
        analysis,
        video_metadata: metadata,
        frames_analyzed,
    }))
}

async fn run_analysis(
    ctx: &AppContext,
    req: &AnalyzeVideoRequest,
    video_path: &PathBuf,
    frames_dir: &PathBuf,
) -> Result<(String, VideoMetadata, usize)> {
    let metadata = video::probe_video(video_path).await?;
    tracing::info!(
        video_id = %req.video_id,
        duration_secs = metadata.duration_secs,
        fps = metadata.fps,
        "starting frame extraction"
    );

    let frames = video::extract_frames(video_path, frames_dir, ctx.config.video.extract_fps).await?;
    if frames.is_empty() {
        return Err(Error::internal("No frames could be extracted from video"));
    }

    let sample_rate = req
        .sample_rate
        .filter(|&r| r > 0)
        .unwrap_or(ctx.config.video.sample_rate);
    let sampled = video::sample_frames(&frames, sample_rate);

    tracing::info!(
        extracted = frames.len(),
        sampled = sampled.len(),
        sample_rate,
        "encoding sampled frames"
    );

    let mut data_urls = Vec::with_capacity(sampled.len());
    for frame in &sampled {
        data_urls.push(vlm::encode_image_data_url(frame)?);
    }

    let user_prompt = prompt::build_video_prompt(req.prompt.as_deref());
    let messages = vec![Message::user_with_images(user_prompt, data_urls)];

    let model = &ctx.config.vlm.video_model;
    let analysis = ctx.vlm.complete(model, &messages).await?;

    Ok((analysis, metadata, sampled.len()))
}
