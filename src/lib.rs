// ----------------------------------------------------------------------------
//! Geometry clipmap terrain core: a heightfield pyramid, a collision surface
//! adapter, a fixed catalog of instanced mesh patches, and a per-camera
//! clipmap view that streams toroidal elevation/normal textures and selects
//! the patch instances visible each frame.
//!
//! The crate renders nothing itself. It produces vertex/index/instance/
//! indirect-draw byte spans through the [`frame::FrameAllocator`] contract
//! and leaves the GPU submission, shading, and scene-graph integration to the
//! host.
// ----------------------------------------------------------------------------
pub mod clipmap;
pub mod collision;
pub mod config;
pub mod error;
pub mod frame;
pub mod geom;
pub mod heightfield;
pub mod patch_catalog;

pub use clipmap::{ClipmapView, InteriorTrim, LodLevel};
pub use collision::{CollisionSurface, CollisionTriangle, TriangleVisitor};
pub use config::TerrainConfig;
pub use error::{Result, TerrainError};
pub use frame::{FrameAllocator, FrameHandle, IndirectDraw, NullFrameAllocator, PatchInstance, ResolvedAllocation};
pub use geom::{Aabb, Frustum};
pub use heightfield::{Heightfield, HeightfieldListener, RayHit};
pub use patch_catalog::{PatchCatalog, PatchKind, PatchRange, PatchVertex, RESET_INDEX};
