//! VLM analysis of cached satellite imagery.

use axum::{extract::State, routing::post, Json, Router};
use serde::{Deserialize, Serialize};

use super::AppContext;
use crate::copernicus::{DateRange, Layer, Region};
use crate::error::{Error, Result};
use crate::imagery::ImageMeta;
use crate::vlm::{self, prompt, Message};

pub fn analyze_routes() -> Router<AppContext> {
    Router::new().route("/analyze", post(analyze))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeRequest {
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(default)]
    pub region: Option<Region>,
    #[serde(default)]
    pub date_range: Option<DateRange>,
    #[serde(default)]
    pub layers: Vec<Layer>,
    #[serde(default)]
    pub conversation_history: Vec<Message>,
    /// Attach a before/after pair of the first requested layer instead of a
    /// single image.
    #[serde(default)]
    pub compare: bool,
}

#[derive(Debug, Serialize)]
pub struct AnalyzeResponse {
    pub success: bool,
    pub response: String,
    pub images_analyzed: Vec<String>,
}

/// Analyze cached satellite imagery with the vision-language model.
async fn analyze(
    State(ctx): State<AppContext>,
    Json(req): Json<AnalyzeRequest>,
) -> Result<Json<AnalyzeResponse>> {
    let user_prompt = req
        .prompt
        .as_deref()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .ok_or_else(|| Error::invalid_request("Prompt is required"))?;

    let region = req
        .region
        .ok_or_else(|| Error::invalid_request("Region is required"))?;

    let selected = select_images(&ctx, &req)?;
    if selected.is_empty() {
        return Err(Error::not_found(
            "No satellite images available for analysis. Please fetch data first.",
        ));
    }

    tracing::info!(
        images = ?selected.iter().map(|i| i.filename.as_str()).collect::<Vec<_>>(),
        compare = req.compare,
        "analyze request"
    );

    let mut enhanced = prompt::build_analysis_prompt(
        user_prompt,
        &region,
        req.date_range.as_ref(),
        &req.layers,
    );
    if req.compare && selected.len() == 2 {
        enhanced.push_str("\n\n");
        enhanced.push_str(prompt::comparison_note());
    }

    let mut data_urls = Vec::with_capacity(selected.len());
    for img in &selected {
        let path = ctx.store.path_for(&img.filename)?;
        data_urls.push(vlm::encode_image_data_url(&path)?);
    }

    let mut messages = req.conversation_history.clone();
    messages.push(Message::user_with_images(enhanced, data_urls));

    let model = &ctx.config.vlm.image_model;
    let mut response = ctx.vlm.complete_streaming(model, &messages).await?;

    if response.is_empty() {
        tracing::warn!("VLM returned an empty response");
        response =
            "I analyzed the image but couldn't generate a response. Please try again.".to_string();
    }

    ctx.state.record_analysis();

    Ok(Json(AnalyzeResponse {
        success: true,
        response,
        images_analyzed: selected.into_iter().map(|i| i.filename).collect(),
    }))
}

/// Pick which cached images to attach. In compare mode this is the
/// before/after pair of the first requested layer; otherwise the most
/// recently dated image matching a requested layer, falling back to the
/// newest cached image of any kind.
fn select_images(ctx: &AppContext, req: &AnalyzeRequest) -> Result<Vec<ImageMeta>> {
    if req.compare {
        let layer = req.layers.first().copied().unwrap_or(Layer::Truecolor);
        let Some(pair) = ctx.store.pair_before_after(layer)? else {
            return Err(Error::not_found(format!(
                "No before/after pair cached for layer '{layer}'"
            )));
        };
        return Ok(vec![pair.before, pair.after]);
    }

    let mut images = ctx.store.list()?;
    if images.is_empty() {
        return Ok(Vec::new());
    }

    if !req.layers.is_empty() {
        let matching: Vec<ImageMeta> = images
            .iter()
            .filter(|img| img.layer.map(|l| req.layers.contains(&l)).unwrap_or(false))
            .cloned()
            .collect();
        if !matching.is_empty() {
            images = matching;
        }
    }

    images.sort_by_key(|img| img.date);
    Ok(vec![images.pop().expect("non-empty image list")])
}
