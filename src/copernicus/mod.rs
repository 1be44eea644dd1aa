//! Copernicus Data Space integration.
//!
//! Two upstream surfaces are consumed as-is:
//! - the OData product catalog (public, paginated via continuation links)
//! - the Sentinel Hub Process API (bearer-authenticated, renders a JPEG from
//!   an evalscript and a bounding box)

pub mod auth;
pub mod catalog;
pub mod evalscript;
pub mod process;

pub use auth::TokenProvider;
pub use catalog::{CatalogClient, Product};
pub use evalscript::Layer;
pub use process::ProcessClient;

use crate::config::CopernicusConfig;
use crate::error::Result;
use bytes::Bytes;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Geographic bounding box as sent by the frontend.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct Region {
    pub north: f64,
    pub south: f64,
    pub east: f64,
    pub west: f64,
}

impl Region {
    /// `[min_lon, min_lat, max_lon, max_lat]`, the order the Process API wants.
    pub fn bbox(&self) -> [f64; 4] {
        [self.west, self.south, self.east, self.north]
    }

    /// WKT polygon ring (closed, counter-clockwise) for OData spatial filters.
    pub fn wkt_polygon(&self) -> String {
        format!(
            "POLYGON(({w} {s},{e} {s},{e} {n},{w} {n},{w} {s}))",
            w = self.west,
            s = self.south,
            e = self.east,
            n = self.north,
        )
    }

    pub fn is_valid(&self) -> bool {
        self.north > self.south
            && self.east > self.west
            && (-90.0..=90.0).contains(&self.south)
            && (-90.0..=90.0).contains(&self.north)
            && (-180.0..=180.0).contains(&self.west)
            && (-180.0..=180.0).contains(&self.east)
    }
}

/// Inclusive sensing date range.
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn is_valid(&self) -> bool {
        self.start <= self.end
    }
}

/// Facade over the catalog, token, and processing clients.
pub struct Copernicus {
    tokens: TokenProvider,
    catalog: CatalogClient,
    process: ProcessClient,
    max_cloud_cover: f64,
}

impl Copernicus {
    pub fn new(config: &CopernicusConfig) -> Self {
        Self {
            tokens: TokenProvider::new(config),
            catalog: CatalogClient::new(config),
            process: ProcessClient::new(config),
            max_cloud_cover: config.max_cloud_cover,
        }
    }

    /// Search the product catalog for Sentinel-2 L2A scenes covering the
    /// region within the date range, following pagination links.
    pub async fn search(&self, region: &Region, range: &DateRange) -> Result<Vec<Product>> {
        self.catalog
            .search(region, range, self.max_cloud_cover)
            .await
    }

    /// Render one layer of one sensing day as a JPEG via the Process API.
    pub async fn render(&self, region: &Region, date: NaiveDate, layer: Layer) -> Result<Bytes> {
        let token = self.tokens.token().await?;
        self.process
            .render(&token, region, date, layer, self.max_cloud_cover)
            .await
    }

    /// Whether catalog credentials for the Process API are configured.
    pub fn has_credentials(&self) -> bool {
        self.tokens.has_credentials()
    }
}
