//! Classification tools: the model looks at the plate and records a choice
//! from a closed vocabulary. The tool validates the choice and echoes it back
//! as structured data for the next analysis pass.

use async_trait::async_trait;
use colonylab_core::error::ToolError;
use colonylab_core::tool::{Tool, ToolResult};

use crate::vocab::{ColonyColor, ColonyOriginHypothesis, SpatialDistributionType};

/// Read a required string argument and parse it into a vocabulary value.
fn choice<T>(arguments: &serde_json::Value, key: &str) -> Result<T, ToolError>
where
    T: std::str::FromStr<Err = String>,
{
    arguments[key]
        .as_str()
        .ok_or_else(|| ToolError::InvalidArguments(format!("Missing '{key}' argument")))?
        .parse()
        .map_err(ToolError::InvalidArguments)
}

fn enum_schema(key: &str, values: &[&str], description: &str) -> serde_json::Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            key: {
                "type": "string",
                "enum": values,
                "description": format!("{description} Can be one of: {}.", values.join(", ")),
            }
        },
        "required": [key]
    })
}

pub struct AnalyzeColonyDistributionTool;

#[async_trait]
impl Tool for AnalyzeColonyDistributionTool {
    fn name(&self) -> &str {
        "analyze_colony_distribution"
    }

    fn description(&self) -> &str {
        "Detect spatial distribution pattern from the plate image."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        enum_schema(
            "distribution",
            &SpatialDistributionType::values(),
            "The distribution of colonies on the plate.",
        )
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let distribution: SpatialDistributionType = choice(&arguments, "distribution")?;
        Ok(ToolResult::json(serde_json::json!({ "distribution": distribution })))
    }
}

pub struct AverageColonyRgbTool;

#[async_trait]
impl Tool for AverageColonyRgbTool {
    fn name(&self) -> &str {
        "average_colony_rgb"
    }

    fn description(&self) -> &str {
        "Get average RGB pigment value of dominant colonies."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        enum_schema(
            "color",
            &ColonyColor::values(),
            "The pigment of the dominant colonies.",
        )
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let color: ColonyColor = choice(&arguments, "color")?;
        Ok(ToolResult::json(serde_json::json!({ "color": color })))
    }
}

pub struct InferOriginHypothesisTool;

#[async_trait]
impl Tool for InferOriginHypothesisTool {
    fn name(&self) -> &str {
        "infer_origin_hypothesis"
    }

    fn description(&self) -> &str {
        "Suggest origin hypothesis based on distribution and morphotype."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        enum_schema(
            "origin",
            &ColonyOriginHypothesis::values(),
            "Observed colony origin hypothesis.",
        )
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let origin: ColonyOriginHypothesis = choice(&arguments, "origin")?;
        Ok(ToolResult::json(serde_json::json!({ "origin_hypothesis": origin })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn distribution_is_echoed() {
        let result = AnalyzeColonyDistributionTool
            .execute(serde_json::json!({"distribution": "clustered"}))
            .await
            .unwrap();
        assert!(result.success);
        assert_eq!(result.output, r#"{"distribution":"clustered"}"#);
    }

    #[tokio::test]
    async fn origin_uses_hypothesis_key() {
        let result = InferOriginHypothesisTool
            .execute(serde_json::json!({"origin": "airborne_contamination"}))
            .await
            .unwrap();
        assert_eq!(
            result.data.unwrap()["origin_hypothesis"],
            "airborne_contamination"
        );
    }

    #[tokio::test]
    async fn value_outside_vocabulary_is_rejected() {
        let err = AverageColonyRgbTool
            .execute(serde_json::json!({"color": "plaid"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(ref m) if m.contains("plaid")));
    }

    #[tokio::test]
    async fn missing_argument_is_rejected() {
        let err = AnalyzeColonyDistributionTool
            .execute(serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(ref m) if m.contains("distribution")));
    }

    #[test]
    fn schema_lists_every_value() {
        let schema = AnalyzeColonyDistributionTool.parameters_schema();
        let values = schema["properties"]["distribution"]["enum"].as_array().unwrap();
        assert_eq!(values.len(), SpatialDistributionType::ALL.len());
        assert_eq!(schema["required"][0], "distribution");
        assert!(
            schema["properties"]["distribution"]["description"]
                .as_str()
                .unwrap()
                .contains("biaxial")
        );
    }
}
