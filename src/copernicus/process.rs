//! Sentinel Hub Process API client: renders a bounding box and sensing day
//! into a JPEG using a per-layer evalscript.

use std::time::Duration;

use bytes::Bytes;
use chrono::NaiveDate;
use serde_json::json;

use super::{Layer, Region};
use crate::config::CopernicusConfig;
use crate::error::{Error, Result};

// Tile rendering can take a while on large bounding boxes.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

pub struct ProcessClient {
    client: reqwest::Client,
    url: String,
    output_width: u32,
    output_height: u32,
}

impl ProcessClient {
    pub fn new(config: &CopernicusConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!("Failed to build HTTP client with timeout: {}", e);
                reqwest::Client::new()
            });

        Self {
            client,
            url: config.process_url.clone(),
            output_width: config.output_width,
            output_height: config.output_height,
        }
    }

    /// Request a rendered JPEG for one layer on one sensing day.
    pub async fn render(
        &self,
        token: &str,
        region: &Region,
        date: NaiveDate,
        layer: Layer,
        max_cloud_cover: f64,
    ) -> Result<Bytes> {
        let payload = build_payload(
            region,
            date,
            layer,
            max_cloud_cover,
            self.output_width,
            self.output_height,
        );

        tracing::debug!(%layer, %date, "requesting processed image");

        let resp = self
            .client
            .post(&self.url)
            .bearer_auth(token)
            .header(reqwest::header::ACCEPT, "image/jpeg")
            .json(&payload)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Upstream(format!(
                "process API returned {}: {}",
                status,
                body.chars().take(200).collect::<String>()
            )));
        }

        let bytes = resp.bytes().await?;
        tracing::debug!(%layer, size_kb = bytes.len() / 1024, "processed image received");
        Ok(bytes)
    }
}

fn build_payload(
    region: &Region,
    date: NaiveDate,
    layer: Layer,
    max_cloud_cover: f64,
    width: u32,
    height: u32,
) -> serde_json::Value {
    json!({
        "input": {
            "bounds": {
                "bbox": region.bbox()
            },
            "data": [{
                "type": "sentinel-2-l2a",
                "dataFilter": {
                    "timeRange": {
                        "from": format!("{date}T00:00:00Z"),
                        "to": format!("{date}T23:59:59Z")
                    },
                    "maxCloudCoverage": max_cloud_cover
                }
            }]
        },
        "output": {
            "width": width,
            "height": height,
            "responses": [{
                "identifier": "default",
                "format": { "type": "image/jpeg" }
            }]
        },
        "evalscript": layer.evalscript()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_shape() {
        let region = Region {
            north: 46.0,
            south: 45.5,
            east: 13.5,
            west: 13.0,
        };
        let date = NaiveDate::from_ymd_opt(2023, 10, 4).unwrap();
        let payload = build_payload(&region, date, Layer::Truecolor, 5.0, 2048, 2048);

        assert_eq!(
            payload["input"]["bounds"]["bbox"],
            json!([13.0, 45.5, 13.5, 46.0])
        );
        assert_eq!(payload["input"]["data"][0]["type"], "sentinel-2-l2a");
        assert_eq!(
            payload["input"]["data"][0]["dataFilter"]["timeRange"]["from"],
            "2023-10-04T00:00:00Z"
        );
        assert_eq!(
            payload["input"]["data"][0]["dataFilter"]["maxCloudCoverage"],
            5.0
        );
        assert_eq!(payload["output"]["width"], 2048);
        assert_eq!(
            payload["output"]["responses"][0]["format"]["type"],
            "image/jpeg"
        );
        assert!(payload["evalscript"]
            .as_str()
            .unwrap()
            .contains("//VERSION=3"));
    }
}
