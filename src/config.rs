// ----------------------------------------------------------------------------
/// Number of clipmap levels a [`crate::clipmap::ClipmapView`] can hold.
pub const MAX_LODS: u8 = 10;
// ----------------------------------------------------------------------------
/// Per-view knobs passed into [`crate::clipmap::ClipmapView::update`]
/// instead of global console variables.
#[derive(Clone, Copy, Debug)]
pub struct TerrainConfig {
    /// `terrain.minLod` — clamp minimum visible lod.
    min_lod: u8,
    /// `terrain.maxLod` — clamp maximum visible lod.
    max_lod: u8,
    /// `terrain.showMemoryUsage` — log instance/indirect buffer byte sizes.
    show_memory_usage: bool,
}
// ----------------------------------------------------------------------------
impl Default for TerrainConfig {
    fn default() -> Self {
        Self {
            min_lod: 0,
            max_lod: 5,
            show_memory_usage: false,
        }
    }
}
// ----------------------------------------------------------------------------
impl TerrainConfig {
    pub fn new(min_lod: u8, max_lod: u8, show_memory_usage: bool) -> Self {
        Self {
            min_lod,
            max_lod,
            show_memory_usage,
        }
    }
    // ------------------------------------------------------------------------
    pub fn min_lod(&self) -> u8 {
        self.min_lod
    }
    // ------------------------------------------------------------------------
    pub fn max_lod(&self) -> u8 {
        self.max_lod
    }
    // ------------------------------------------------------------------------
    pub fn show_memory_usage(&self) -> bool {
        self.show_memory_usage
    }
}
