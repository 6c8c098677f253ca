//! Shared types for tagscale: printer/reference geometry and scale results.

mod types;

pub use types::{ConfigError, RoundingPolicy, ScaleResult, ScalerConfig, TagFamily, MM_PER_INCH};
