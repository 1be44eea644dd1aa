//! Visualization layers and their Process API evalscripts.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Rendered visualization layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Layer {
    /// True color RGB (B04/B03/B02).
    Truecolor,
    /// Normalized burn ratio, highlights burn scars (B8A/B12).
    Nbr,
    /// Normalized difference vegetation index (B08/B04).
    Ndvi,
}

impl Layer {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Truecolor => "truecolor",
            Self::Nbr => "nbr",
            Self::Ndvi => "ndvi",
        }
    }

    /// Evalscript source sent to the Process API for this layer.
    pub fn evalscript(&self) -> &'static str {
        match self {
            Self::Truecolor => TRUECOLOR_EVALSCRIPT,
            Self::Nbr => NBR_EVALSCRIPT,
            Self::Ndvi => NDVI_EVALSCRIPT,
        }
    }
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Layer {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "truecolor" => Ok(Self::Truecolor),
            "nbr" => Ok(Self::Nbr),
            "ndvi" => Ok(Self::Ndvi),
            other => Err(format!("unknown layer: {other}")),
        }
    }
}

const TRUECOLOR_EVALSCRIPT: &str = r#"//VERSION=3
function setup() {
  return {
    input: ["B04", "B03", "B02"],
    output: { bands: 3, sampleType: "AUTO" }
  };
}

function evaluatePixel(sample) {
  return [2.5 * sample.B04, 2.5 * sample.B03, 2.5 * sample.B02];
}
"#;

const NBR_EVALSCRIPT: &str = r#"//VERSION=3
function setup() {
  return {
    input: ["B8A", "B12"],
    output: { bands: 3, sampleType: "AUTO" }
  };
}

function evaluatePixel(sample) {
  var nbr = (sample.B8A - sample.B12) / (sample.B8A + sample.B12);
  if (nbr < -0.25) return [0.6, 0.0, 0.0];
  if (nbr < -0.1) return [0.9, 0.4, 0.0];
  if (nbr < 0.1) return [1.0, 1.0, 0.4];
  if (nbr < 0.3) return [0.6, 0.8, 0.3];
  return [0.0, 0.5, 0.0];
}
"#;

const NDVI_EVALSCRIPT: &str = r#"//VERSION=3
function setup() {
  return {
    input: ["B08", "B04"],
    output: { bands: 3, sampleType: "AUTO" }
  };
}

function evaluatePixel(sample) {
  var ndvi = (sample.B08 - sample.B04) / (sample.B08 + sample.B04);
  if (ndvi < 0.0) return [0.8, 0.8, 0.8];
  if (ndvi < 0.2) return [0.9, 0.8, 0.4];
  if (ndvi < 0.5) return [0.4, 0.7, 0.2];
  return [0.0, 0.4, 0.0];
}
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_layer_names() {
        assert_eq!("truecolor".parse::<Layer>().unwrap(), Layer::Truecolor);
        assert_eq!("NBR".parse::<Layer>().unwrap(), Layer::Nbr);
        assert_eq!("ndvi".parse::<Layer>().unwrap(), Layer::Ndvi);
        assert!("thermal".parse::<Layer>().is_err());
    }

    #[test]
    fn serde_lowercase() {
        let layers: Vec<Layer> = serde_json::from_str(r#"["truecolor","nbr","ndvi"]"#).unwrap();
        assert_eq!(layers, vec![Layer::Truecolor, Layer::Nbr, Layer::Ndvi]);
        assert_eq!(serde_json::to_string(&Layer::Nbr).unwrap(), r#""nbr""#);
    }

    #[test]
    fn evalscripts_reference_expected_bands() {
        assert!(Layer::Truecolor.evalscript().contains("B04"));
        assert!(Layer::Nbr.evalscript().contains("B12"));
        assert!(Layer::Ndvi.evalscript().contains("B08"));
        for layer in [Layer::Truecolor, Layer::Nbr, Layer::Ndvi] {
            assert!(layer.evalscript().starts_with("//VERSION=3"));
        }
    }
}
