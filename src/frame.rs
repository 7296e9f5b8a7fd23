// ----------------------------------------------------------------------------
// Frame Allocator Interface: a narrow, back-end-neutral contract with the
// host's transient GPU allocator, plus the two record types the Patch
// Selector streams through it. The core never frees the handles it gets back
// from this trait; the host recycles them per frame.
//
// A narrow seam between core logic and a render backend, synchronous
// throughout since the core has no scheduler of its own to extract/prepare
// across.
// ----------------------------------------------------------------------------
use crate::error::{Result, TerrainError};
use bytemuck::{Pod, Zeroable};
// ----------------------------------------------------------------------------
/// Opaque handle into a transient per-frame allocation. Hosts may define this
/// however suits their backend; the core only ever stores and resolves it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FrameHandle(pub u64);
// ----------------------------------------------------------------------------
/// `(gpuBufferId, byteOffset)`, as returned by [`FrameAllocator::resolve`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ResolvedAllocation {
    pub buffer_id: u64,
    pub byte_offset: u64,
}
// ----------------------------------------------------------------------------
/// A streamed GPU allocator providing transient vertex/index/indirect/
/// uniform spans. The core holds no opinions about how this is implemented.
pub trait FrameAllocator {
    fn allocate_vertex(&mut self, size: usize, data: Option<&[u8]>) -> Option<FrameHandle>;
    fn allocate_index(&mut self, size: usize, data: Option<&[u8]>) -> Option<FrameHandle>;
    fn allocate_indirect(&mut self, size: usize, data: Option<&[u8]>) -> Option<FrameHandle>;
    fn allocate_constant(&mut self, size: usize, data: Option<&[u8]>) -> Option<FrameHandle>;
    fn map(&mut self, handle: FrameHandle) -> Option<&mut [u8]>;
    fn resolve(&self, handle: FrameHandle) -> Option<ResolvedAllocation>;
}
// ----------------------------------------------------------------------------
/// Allocates `size` bytes of `kind` via `alloc`, returning
/// [`TerrainError::AllocationFailure`] if the host allocator is exhausted.
pub(crate) fn allocate_or_fail(
    handle: Option<FrameHandle>,
    what: &'static str,
) -> Result<FrameHandle> {
    handle.ok_or(TerrainError::AllocationFailure { what })
}
// ----------------------------------------------------------------------------
/// `{ vertexScale: (gridScale, lodIndex), vertexTranslate, texcoordOffset,
/// quadColor }`, one per visible patch instance.
#[derive(Clone, Copy, Debug, Pod, Zeroable, PartialEq)]
#[repr(C)]
pub struct PatchInstance {
    pub vertex_scale: [i16; 2],
    pub vertex_translate: [i32; 2],
    pub texcoord_offset: [i32; 2],
    pub quad_color: [f32; 4],
}
// ----------------------------------------------------------------------------
/// One indirect draw record per emitted patch kind group.
#[derive(Clone, Copy, Debug, Pod, Zeroable, PartialEq, Eq)]
#[repr(C)]
pub struct IndirectDraw {
    pub index_count_per_instance: u32,
    pub instance_count: u32,
    pub start_index: u32,
    pub base_vertex: i32,
    pub start_instance_location: u32,
}
// ----------------------------------------------------------------------------
/// An in-memory [`FrameAllocator`] for tests and headless callers: every
/// allocation succeeds and is backed by a growable byte buffer, keeping
/// CPU-side logic testable without a real GPU upload path.
#[derive(Default)]
pub struct NullFrameAllocator {
    buffers: Vec<Vec<u8>>,
}
// ----------------------------------------------------------------------------
impl NullFrameAllocator {
    pub fn new() -> Self {
        Self::default()
    }
    // ------------------------------------------------------------------------
    fn push(&mut self, size: usize, data: Option<&[u8]>) -> FrameHandle {
        let mut buffer = vec![0u8; size];
        if let Some(data) = data {
            let n = data.len().min(size);
            buffer[..n].copy_from_slice(&data[..n]);
        }
        let handle = FrameHandle(self.buffers.len() as u64);
        self.buffers.push(buffer);
        handle
    }
}
// ----------------------------------------------------------------------------
impl FrameAllocator for NullFrameAllocator {
    fn allocate_vertex(&mut self, size: usize, data: Option<&[u8]>) -> Option<FrameHandle> {
        Some(self.push(size, data))
    }
    // ------------------------------------------------------------------------
    fn allocate_index(&mut self, size: usize, data: Option<&[u8]>) -> Option<FrameHandle> {
        Some(self.push(size, data))
    }
    // ------------------------------------------------------------------------
    fn allocate_indirect(&mut self, size: usize, data: Option<&[u8]>) -> Option<FrameHandle> {
        Some(self.push(size, data))
    }
    // ------------------------------------------------------------------------
    fn allocate_constant(&mut self, size: usize, data: Option<&[u8]>) -> Option<FrameHandle> {
        Some(self.push(size, data))
    }
    // ------------------------------------------------------------------------
    fn map(&mut self, handle: FrameHandle) -> Option<&mut [u8]> {
        self.buffers.get_mut(handle.0 as usize).map(|b| b.as_mut_slice())
    }
    // ------------------------------------------------------------------------
    fn resolve(&self, handle: FrameHandle) -> Option<ResolvedAllocation> {
        if (handle.0 as usize) < self.buffers.len() {
            Some(ResolvedAllocation {
                buffer_id: 0,
                byte_offset: 0,
            })
        } else {
            None
        }
    }
}
