//! Shannon diversity index over colony morphotype counts.
//!
//! `H = -Σ p_i ln p_i` with `p_i = count_i / total`. Groups with a count of
//! zero contribute nothing; an empty or all-zero plate scores 0. Negative
//! counts and totals past `i64::MAX` are rejected.

use async_trait::async_trait;
use colonylab_core::error::ToolError;
use colonylab_core::tool::{Tool, ToolResult};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// One morphotype and how many colonies of it were counted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MorphotypeCount {
    pub morphotype: String,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShannonSummary {
    /// Rounded to four decimal places
    pub shannon_index: f64,
    pub total_colonies: i64,
    pub group_count: usize,
}

pub fn shannon_index(groups: &[MorphotypeCount]) -> Result<ShannonSummary, ToolError> {
    let mut total: i64 = 0;
    for group in groups {
        if group.count < 0 {
            return Err(ToolError::InvalidArguments(format!(
                "Negative count {} for morphotype '{}'",
                group.count, group.morphotype
            )));
        }
        total = total.checked_add(group.count).ok_or_else(|| {
            ToolError::InvalidArguments("Colony counts overflow the total".into())
        })?;
    }

    let index = if total == 0 {
        0.0
    } else {
        let total = total as f64;
        -groups
            .iter()
            .filter(|g| g.count > 0)
            .map(|g| {
                let p = g.count as f64 / total;
                p * p.ln()
            })
            .sum::<f64>()
    };

    Ok(ShannonSummary {
        // Adding 0.0 turns -0.0 into 0.0.
        shannon_index: round4(index) + 0.0,
        total_colonies: total,
        group_count: groups.len(),
    })
}

fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

pub struct ComputeShannonIndexTool;

#[async_trait]
impl Tool for ComputeShannonIndexTool {
    fn name(&self) -> &str {
        "compute_shannon_index"
    }

    fn description(&self) -> &str {
        "Calculate the Shannon diversity index from colony group distribution."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "colony_groups": {
                    "type": "array",
                    "description": "List of colony groups with counts.",
                    "items": {
                        "type": "object",
                        "properties": {
                            "morphotype": { "type": "string" },
                            "count": { "type": "integer" }
                        },
                        "required": ["morphotype", "count"]
                    }
                }
            },
            "required": ["colony_groups"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let groups = match arguments.get("colony_groups") {
            None | Some(serde_json::Value::Null) => Vec::new(),
            Some(raw) => serde_json::from_value::<Vec<MorphotypeCount>>(raw.clone())
                .map_err(|e| ToolError::InvalidArguments(format!("Invalid 'colony_groups': {e}")))?,
        };

        let summary = shannon_index(&groups)?;
        debug!(
            groups = summary.group_count,
            total = summary.total_colonies,
            index = summary.shannon_index,
            "Shannon index computed"
        );
        let data = serde_json::to_value(&summary).map_err(|e| ToolError::ExecutionFailed {
            tool_name: self.name().into(),
            reason: e.to_string(),
        })?;
        Ok(ToolResult::json(data))
    }
}
