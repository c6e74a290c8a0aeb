//! Price prediction

mod inference;
mod output;

pub use inference::{InferenceStats, PredictionService};
pub use output::{OutputConfig, OutputFormatter, DEFAULT_BAND_FRACTION, DEFAULT_CONFIDENCE};
