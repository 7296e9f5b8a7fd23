// ----------------------------------------------------------------------------
use thiserror::Error;
// ----------------------------------------------------------------------------
/// Fatal errors produced by the terrain core.
///
/// Out-of-range world coordinates passed to sampling routines are *not*
/// represented here — per the core's error handling design that is a soft
/// condition, surfaced as `0.0`/`None` return values rather than an `Err`.
#[derive(Error, Debug)]
pub enum TerrainError {
    #[error("heightfield resolution {resolution} is not 2^k + 1")]
    BadResolution { resolution: u32 },

    #[error("patch catalog texture size {texture_size} is not a power of two >= 16")]
    BadTextureSize { texture_size: u32 },

    #[error("heightfield asset truncated: expected {expected} bytes of sample data, got {got}")]
    IoTruncated { expected: usize, got: usize },

    #[error("frame allocator returned no handle for {what}")]
    AllocationFailure { what: &'static str },
}
// ----------------------------------------------------------------------------
pub type Result<T> = std::result::Result<T, TerrainError>;
