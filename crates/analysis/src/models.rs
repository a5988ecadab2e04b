//! Structured plate analysis.

use colonylab_tools::{ColonyOriginHypothesis, SpatialDistributionType};
use serde::{Deserialize, Serialize};

/// A tool the model called while looking at the plate, with its answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInteraction {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    pub function_name: String,
    pub arguments: serde_json::Value,
    pub response: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColonyGroup {
    pub morphotype: String,
    pub count: i64,
    #[serde(default)]
    pub probable_identity: Option<String>,
    #[serde(default)]
    pub pigment: Option<String>,
    #[serde(default)]
    pub diameter_range_mm: Option<(f64, f64)>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleInfo {
    pub substrate: String,
    pub origin: String,
    pub incubation_hours: i64,
    pub camera_distance_cm: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CfuAnalysis {
    pub estimated_total_cfu: i64,
    #[serde(default)]
    pub cfu_per_ml: Option<f64>,
    /// 0 to 1
    pub detection_confidence: f64,
    #[serde(default)]
    pub colony_groups: Vec<ColonyGroup>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportQuality {
    pub image_quality_score: f64,
    pub lighting_conditions: String,
    pub detection_completeness: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisMetadata {
    pub model_version: String,
    pub processed_by: String,
    pub review_recommended: bool,
}

/// Everything the model reports about one plate.
///
/// `image_id` and `analysis_timestamp` are filled in when the model leaves
/// them out. `shannon_diversity_index` is always recomputed from the colony
/// groups rather than trusted from the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacterialPlateAnalysis {
    pub image_id: String,
    pub analysis_timestamp: String,
    pub sample_info: SampleInfo,
    pub cfu_analysis: CfuAnalysis,
    pub diagnostic_hint: String,
    pub report_quality: ReportQuality,
    pub metadata: AnalysisMetadata,
    #[serde(default)]
    pub spatial_distribution_assessment: Option<SpatialDistributionType>,
    #[serde(default)]
    pub origin_hypothesis_assessment: Option<ColonyOriginHypothesis>,
    #[serde(default)]
    pub swarming_detected: Option<bool>,
    #[serde(default)]
    pub dominant_colony_average_rgb: Option<[u8; 3]>,
    #[serde(default)]
    pub shannon_diversity_index: Option<f64>,
    #[serde(default)]
    pub tool_interactions: Option<Vec<ToolInteraction>>,
}

impl BacterialPlateAnalysis {
    /// Field names and hints listed in the prompt that asks for this shape.
    pub const FIELD_HINTS: &'static [(&'static str, &'static str)] = &[
        ("image_id", "identifier of the image, may be left empty"),
        ("analysis_timestamp", "ISO 8601 timestamp, may be left empty"),
        (
            "sample_info",
            "object with substrate, origin, incubation_hours, camera_distance_cm",
        ),
        (
            "cfu_analysis",
            "object with estimated_total_cfu, cfu_per_ml, detection_confidence (0-1) and colony_groups \
             (list of morphotype, count, probable_identity, pigment, diameter_range_mm [min, max])",
        ),
        ("diagnostic_hint", "one sentence on what the plate suggests"),
        (
            "report_quality",
            "object with image_quality_score (0-1), lighting_conditions, detection_completeness",
        ),
        (
            "metadata",
            "object with model_version, processed_by, review_recommended (bool)",
        ),
        ("spatial_distribution_assessment", "one of the spatial distribution values or null"),
        ("origin_hypothesis_assessment", "one of the origin hypothesis values or null"),
        ("swarming_detected", "bool or null"),
        ("dominant_colony_average_rgb", "[r, g, b] or null"),
        ("shannon_diversity_index", "provide value"),
    ];
}
