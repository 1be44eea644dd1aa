//! Prompt construction for satellite and video analysis.

use crate::copernicus::{DateRange, Layer, Region};

/// Default analysis prompt used when a video request carries no custom one.
pub const DEFAULT_WILDLIFE_PROMPT: &str = "Analyze this video for wildlife detection. For each frame:
1. Identify all animals visible
2. Note their species if recognizable
3. Describe their behavior
4. Estimate time of appearance
5. Note any notable patterns or behaviors

Provide a comprehensive summary of all wildlife observed.";

/// Wrap the user's question with region, date, and layer context for
/// burn-severity analysis.
pub fn build_analysis_prompt(
    user_prompt: &str,
    region: &Region,
    date_range: Option<&DateRange>,
    layers: &[Layer],
) -> String {
    let date_context = match date_range {
        Some(range) => format!("{} to {}", range.start, range.end),
        None => "not specified".to_string(),
    };

    let layer_context = if layers.is_empty() {
        "truecolor".to_string()
    } else {
        layers
            .iter()
            .map(Layer::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    };

    format!(
        "You are Burnsight, an expert AI assistant for analyzing satellite imagery \
to assess wildfire burn severity and environmental impact.

User's Question: {user_prompt}

Context:
- Image: Satellite imagery of the selected region
- Region Coordinates: North {north}\u{b0}, South {south}\u{b0}, East {east}\u{b0}, West {west}\u{b0}
- Date Range: {date_context}
- Data Layers: {layer_context}

Please analyze the image and provide a detailed, helpful response to the user's question. Focus on:
- Burn severity (if applicable)
- Vegetation health and recovery
- Environmental impact assessment
- Any visible patterns or anomalies

Be specific and use quantitative observations when possible.",
        north = region.north,
        south = region.south,
        east = region.east,
        west = region.west,
    )
}

/// Extra instruction appended when a before/after image pair is attached.
pub fn comparison_note() -> &'static str {
    "The first image was captured before the event and the second after it. \
Compare them and describe what changed."
}

/// Prompt for multi-frame video analysis; falls back to the wildlife default.
pub fn build_video_prompt(custom: Option<&str>) -> String {
    match custom {
        Some(p) if !p.trim().is_empty() => p.to_string(),
        _ => DEFAULT_WILDLIFE_PROMPT.to_string(),
    }
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

    #[test]
    fn prompt_embeds_question_and_context() {
        let range = DateRange {
            start: NaiveDate::from_ymd_opt(2023, 10, 1).unwrap(),
            end: NaiveDate::from_ymd_opt(2023, 10, 31).unwrap(),
        };
        let prompt = build_analysis_prompt(
            "What is the burn severity?",
            &region(),
            Some(&range),
            &[Layer::Truecolor, Layer::Nbr],
        );

        assert!(prompt.contains("What is the burn severity?"));
        assert!(prompt.contains("North 46°"));
        assert!(prompt.contains("2023-10-01 to 2023-10-31"));
        assert!(prompt.contains("truecolor, nbr"));
    }

    #[test]
    fn prompt_without_dates_or_layers() {
        let prompt = build_analysis_prompt("q", &region(), None, &[]);
        assert!(prompt.contains("Date Range: not specified"));
        assert!(prompt.contains("Data Layers: truecolor"));
    }

    #[test]
    fn video_prompt_fallback() {
        assert_eq!(build_video_prompt(None), DEFAULT_WILDLIFE_PROMPT);
        assert_eq!(build_video_prompt(Some("   ")), DEFAULT_WILDLIFE_PROMPT);
        assert_eq!(build_video_prompt(Some("count deer")), "count deer");
    }
}
