//! OData product catalog search with continuation-link pagination.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Deserialize;

use super::{DateRange, Region};
use crate::config::CopernicusConfig;
use crate::error::{Error, Result};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// One catalog entry, reduced to the fields the backend actually uses.
#[derive(Debug, Clone)]
pub struct Product {
    pub id: String,
    pub name: String,
    pub sensing_start: DateTime<Utc>,
    pub cloud_cover: Option<f64>,
}

// OData response shapes. Field names follow the upstream casing.

#[derive(Debug, Deserialize)]
struct ODataPage {
    value: Vec<RawProduct>,
    #[serde(rename = "@odata.nextLink")]
    next_link: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawProduct {
    #[serde(rename = "Id")]
    id: String,
    #[serde(rename = "Name")]
    name: String,
    #[serde(rename = "ContentDate")]
    content_date: RawContentDate,
    #[serde(rename = "Attributes", default)]
    attributes: Vec<RawAttribute>,
}

#[derive(Debug, Deserialize)]
struct RawContentDate {
    #[serde(rename = "Start")]
    start: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct RawAttribute {
    #[serde(rename = "Name")]
    name: String,
    #[serde(rename = "Value")]
    value: serde_json::Value,
}

/// Client for the public OData product catalog.
pub struct CatalogClient {
    client: reqwest::Client,
    base_url: String,
    page_size: u32,
    max_pages: u32,
}

impl CatalogClient {
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
            base_url: config.catalog_url.trim_end_matches('/').to_string(),
            page_size: config.page_size,
            max_pages: config.max_pages,
        }
    }

    /// Search for Sentinel-2 L2A products. Follows `@odata.nextLink`
    /// continuation links up to the configured page cap.
    pub async fn search(
        &self,
        region: &Region,
        range: &DateRange,
        max_cloud_cover: f64,
    ) -> Result<Vec<Product>> {
        let filter = build_filter(region, range, max_cloud_cover);
        tracing::debug!(filter = %filter, "catalog search");

        let first_url = format!("{}/Products", self.base_url);
        let mut page: ODataPage = self
            .fetch_page(
                self.client.get(&first_url).query(&[
                    ("$filter", filter.as_str()),
                    ("$orderby", "ContentDate/Start asc"),
                    ("$expand", "Attributes"),
                    ("$top", &self.page_size.to_string()),
                ]),
            )
            .await?;

        let mut products: Vec<Product> = Vec::new();
        let mut pages_fetched = 1u32;
        loop {
            products.extend(page.value.into_iter().map(into_product));

            let Some(next) = page.next_link else {
                break;
            };
            if pages_fetched >= self.max_pages {
                tracing::warn!(
                    max_pages = self.max_pages,
                    "stopping catalog pagination at page cap"
                );
                break;
            }

            tracing::debug!(url = %next, "following catalog continuation link");
            page = self.fetch_page(self.client.get(&next)).await?;
            pages_fetched += 1;
        }

        tracing::info!(
            products = products.len(),
            pages = pages_fetched,
            "catalog search complete"
        );
        Ok(products)
    }

    async fn fetch_page(&self, request: reqwest::RequestBuilder) -> Result<ODataPage> {
        let resp = request.send().await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Upstream(format!(
                "catalog returned {}: {}",
                status,
                body.chars().take(200).collect::<String>()
            )));
        }

        Ok(resp.json().await?)
    }
}

fn into_product(raw: RawProduct) -> Product {
    let cloud_cover = raw
        .attributes
        .iter()
        .find(|a| a.name == "cloudCover")
        .and_then(|a| a.value.as_f64());

    Product {
        id: raw.id,
        name: raw.name,
        sensing_start: raw.content_date.start,
        cloud_cover,
    }
}

/// Build the OData `$filter` expression: collection, product type, spatial
/// intersection, sensing window, and cloud-cover attribute bound.
fn build_filter(region: &Region, range: &DateRange, max_cloud_cover: f64) -> String {
    format!(
        "Collection/Name eq 'SENTINEL-2' \
         and Attributes/OData.CSC.StringAttribute/any(att:att/Name eq 'productType' \
         and att/OData.CSC.StringAttribute/Value eq 'S2MSI2A') \
         and OData.CSC.Intersects(area=geography'SRID=4326;{wkt}') \
         and ContentDate/Start ge {start}T00:00:00.000Z \
         and ContentDate/Start le {end}T23:59:59.999Z \
         and Attributes/OData.CSC.DoubleAttribute/any(att:att/Name eq 'cloudCover' \
         and att/OData.CSC.DoubleAttribute/Value le {cc})",
        wkt = region.wkt_polygon(),
        start = range.start,
        end = range.end,
        cc = max_cloud_cover,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn region() -> Region {
        Region {
            north: 46.0,
            south: 45.5,
            east: 13.5,
            west: 13.0,
        }
    }

    fn range() -> DateRange {
        DateRange {
            start: NaiveDate::from_ymd_opt(2023, 10, 1).unwrap(),
            end: NaiveDate::from_ymd_opt(2023, 10, 31).unwrap(),
        }
    }

    #[test]
    fn filter_contains_all_clauses() {
        let filter = build_filter(&region(), &range(), 5.0);
        assert!(filter.contains("Collection/Name eq 'SENTINEL-2'"));
        assert!(filter.contains("S2MSI2A"));
        assert!(filter.contains("SRID=4326;POLYGON"));
        assert!(filter.contains("ContentDate/Start ge 2023-10-01T00:00:00.000Z"));
        assert!(filter.contains("ContentDate/Start le 2023-10-31T23:59:59.999Z"));
        assert!(filter.contains("'cloudCover'"));
        assert!(filter.contains("Value le 5"));
    }

    #[test]
    fn parses_odata_page() {
        let json = r#"{
            "value": [{
                "Id": "abc-123",
                "Name": "S2B_MSIL2A_20231004.SAFE",
                "ContentDate": { "Start": "2023-10-04T10:00:31.024Z" },
                "Attributes": [
                    { "Name": "cloudCover", "Value": 3.2 },
                    { "Name": "productType", "Value": "S2MSI2A" }
                ]
            }],
            "@odata.nextLink": "https://example.com/odata/v1/Products?$skip=20"
        }"#;

        let page: ODataPage = serde_json::from_str(json).unwrap();
        assert_eq!(page.value.len(), 1);
        assert!(page.next_link.is_some());

        let product = into_product(page.value.into_iter().next().unwrap());
        assert_eq!(product.id, "abc-123");
        assert_eq!(product.cloud_cover, Some(3.2));
        assert_eq!(
            product.sensing_start.date_naive(),
            NaiveDate::from_ymd_opt(2023, 10, 4).unwrap()
        );
    }

    #[test]
    fn parses_page_without_next_link() {
        let json = r#"{ "value": [] }"#;
        let page: ODataPage = serde_json::from_str(json).unwrap();
        assert!(page.value.is_empty());
        assert!(page.next_link.is_none());
    }
}
