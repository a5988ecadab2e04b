//! # colonylab analysis
//!
//! Turns an uploaded plate photo into a report: image preparation, the
//! multi-pass [`PlatePipeline`] that drives the model and the callbacks, and
//! the single-prompt structured [`PlateAnalyzer`].

pub mod models;
pub mod pipeline;
pub mod signs;
pub mod structured;
pub mod upload;

#[cfg(test)]
mod testing;

pub use models::{BacterialPlateAnalysis, ColonyGroup, ToolInteraction};
pub use pipeline::{PlatePipeline, PlateReport};
pub use signs::{Action, SignDetection, parse_signs};
pub use structured::PlateAnalyzer;
pub use upload::{ImageMimeType, PreparedImage, digest, prepare_image};
