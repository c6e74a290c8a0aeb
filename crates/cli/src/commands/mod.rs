//! CLI subcommands

pub mod model;
pub mod predict;
pub mod retrain;
pub mod train;
pub mod zones;
