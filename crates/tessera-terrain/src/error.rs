//! Error types for terrain generation.

use thiserror::Error;

/// Invalid pipeline or layer configuration. Raised at construction time and
/// never silently clamped.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ConfigurationError {
    #[error("land_ratio must be between 1 and 10, got {0}")]
    InvalidLandRatio(i32),

    #[error("unsupported lands_and_seas algorithm '{0}'")]
    UnknownAlgorithm(String),

    #[error("{name} must be within 0.0..=1.0, got {value}")]
    InvalidProbability { name: &'static str, value: f64 },

    #[error("subdivision_factor must be >= 2, got {0}")]
    InvalidSubdivisionFactor(u32),

    #[error("invalid value for {name}: {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    #[error("unknown pipeline layer '{0}'")]
    UnknownLayer(String),

    #[error("layer '{name}' cannot take {params} parameters")]
    LayerParamsMismatch { name: String, params: &'static str },

    #[error("pipeline has no layers configured")]
    EmptyPipeline,

    #[error("base chunk size {base} cannot be subdivided {scale} times per axis")]
    SubdivisionBelowTile { base: u32, scale: u64 },

    #[error("base chunk size {base} is not divisible by the subdivision scale {scale}")]
    IndivisibleChunkSize { base: u32, scale: u64 },

    #[error("chunk size must be non-zero, got {0}")]
    InvalidChunkSize(u32),
}

/// Failure while generating one chunk. Recoverable: the streaming worker turns
/// it into a failed response and keeps running.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GenerationError {
    #[error("tier coordinator has no world tier configured")]
    TierNotConfigured,

    #[error("pipeline has no layers configured")]
    EmptyPipeline,

    #[error("chunk ({x}, {y}) does not exist in generation data")]
    MissingChunk { x: i64, y: i64 },

    #[error("chunk ({x}, {y}) has no land type after the pipeline ran")]
    MissingLandType { x: i64, y: i64 },
}
