//! Satellite data fetching: catalog search, tile rendering, cache write.

use axum::{extract::State, routing::post, Json, Router};
use serde::{Deserialize, Serialize};

use super::AppContext;
use crate::copernicus::{DateRange, Layer, Region};
use crate::error::{Error, Result};
use crate::imagery::ImageMeta;

pub fn imagery_routes() -> Router<AppContext> {
    Router::new().route("/fetch-data", post(fetch_data))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchDataRequest {
    pub region: Region,
    pub date_range: DateRange,
    #[serde(default)]
    pub layers: Vec<Layer>,
}

#[derive(Debug, Serialize)]
pub struct FetchDataResponse {
    pub success: bool,
    pub message: String,
    pub images: Vec<FetchedImage>,
}

/// Cached image metadata plus the bounds it was rendered for.
#[derive(Debug, Serialize)]
pub struct FetchedImage {
    #[serde(flatten)]
    pub meta: ImageMeta,
    pub bounds: Region,
}

/// Fetch satellite data for the selected region and date range.
///
/// Searches the Copernicus catalog for matching scenes, renders each
/// requested layer for the least cloudy scene, and caches the JPEGs. Falls
/// back to whatever the cache already holds when the catalog comes up empty.
async fn fetch_data(
    State(ctx): State<AppContext>,
    Json(req): Json<FetchDataRequest>,
) -> Result<Json<FetchDataResponse>> {
    validate_request(&req)?;

    let layers = if req.layers.is_empty() {
        vec![Layer::Truecolor]
    } else {
        req.layers.clone()
    };

    tracing::info!(
        north = req.region.north,
        south = req.region.south,
        east = req.region.east,
        west = req.region.west,
        start = %req.date_range.start,
        end = %req.date_range.end,
        ?layers,
        "fetch-data request"
    );

    let products = ctx.copernicus.search(&req.region, &req.date_range).await?;

    if products.is_empty() {
        // Nothing upstream; serve the cache if it has anything at all.
        let cached = ctx.store.list()?;
        if cached.is_empty() {
            return Err(Error::not_found(
                "No matching scenes in the catalog and no cached imagery available",
            ));
        }

        tracing::info!(cached = cached.len(), "catalog empty, serving cached imagery");
        return Ok(Json(FetchDataResponse {
            success: true,
            message: format!("No new scenes; {} cached image(s) available", cached.len()),
            images: attach_bounds(cached, req.region),
        }));
    }

    // Least cloudy scene wins; sensing order breaks ties.
    let best = products
        .iter()
        .min_by(|a, b| {
            let ca = a.cloud_cover.unwrap_or(f64::MAX);
            let cb = b.cloud_cover.unwrap_or(f64::MAX);
            ca.partial_cmp(&cb)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.sensing_start.cmp(&b.sensing_start))
        })
        .expect("non-empty product list");

    let date = best.sensing_start.date_naive();
    tracing::info!(
        scene = %best.name,
        %date,
        cloud_cover = ?best.cloud_cover,
        "rendering scene"
    );

    let mut images = Vec::with_capacity(layers.len());
    for layer in layers {
        let bytes = ctx.copernicus.render(&req.region, date, layer).await?;
        let meta = ctx.store.save(layer, date, &bytes)?;
        images.push(meta);
    }

    ctx.state.record_fetch();

    Ok(Json(FetchDataResponse {
        success: true,
        message: format!("Fetched {} image(s) for {}", images.len(), date),
        images: attach_bounds(images, req.region),
    }))
}

fn validate_request(req: &FetchDataRequest) -> Result<()> {
    if !req.region.is_valid() {
        return Err(Error::invalid_request(
            "Region bounds are invalid (check north/south and east/west ordering)",
        ));
    }
    if !req.date_range.is_valid() {
        return Err(Error::invalid_request("Date range start is after its end"));
    }
    Ok(())
}

fn attach_bounds(images: Vec<ImageMeta>, bounds: Region) -> Vec<FetchedImage> {
    images
        .into_iter()
        .map(|meta| FetchedImage { meta, bounds })
        .collect()
}
