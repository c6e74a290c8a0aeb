//! Price estimator HTTP service

pub mod api;
pub mod config;
