use crate::config::ConfigError;

/// Everything that can go wrong when building or driving a swarm
#[derive(Debug, thiserror::Error)]
pub enum SwarmError {
    #[error("Canvas dimensions must be non-zero (got {width}x{height})")]
    EmptyCanvas { width: u32, height: u32 },

    #[error("Target image is {actual:?} but the swarm was built for {expected:?}")]
    TargetSize {
        expected: (u32, u32),
        actual: (u32, u32),
    },

    #[error("No target image set; call set_target before stepping")]
    NoTarget,

    #[error("Position holds {actual} triangles but {expected} were expected")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error(transparent)]
    Config(#[from] ConfigError),
}
