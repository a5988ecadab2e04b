//! Built-in plate tools for colonylab.
//!
//! The model calls these during the first look at a plate: three of them
//! record a classification from a closed vocabulary, and one computes the
//! Shannon diversity index from morphotype counts.

pub mod plate;
pub mod shannon;
pub mod vocab;

use colonylab_core::tool::ToolRegistry;

pub use plate::{AnalyzeColonyDistributionTool, AverageColonyRgbTool, InferOriginHypothesisTool};
pub use shannon::{ComputeShannonIndexTool, MorphotypeCount, ShannonSummary, shannon_index};
pub use vocab::{ColonyColor, ColonyOriginHypothesis, SpatialDistributionType};

/// Create a tool registry with every plate tool.
pub fn default_registry() -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Box::new(AnalyzeColonyDistributionTool));
    registry.register(Box::new(AverageColonyRgbTool));
    registry.register(Box::new(InferOriginHypothesisTool));
    registry.register(Box::new(ComputeShannonIndexTool));
    registry
}
