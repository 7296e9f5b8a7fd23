// ----------------------------------------------------------------------------
// Collision Surface Adapter: exposes the finest heightfield level to an
// external physics engine without copying it, through a plain "process
// triangles" visitor trait a physics integrator implements.
// ----------------------------------------------------------------------------
use crate::geom::Aabb;
use crate::heightfield::Heightfield;
use bevy_math::Vec3;
use std::sync::Arc;
// ----------------------------------------------------------------------------
/// One triangle reported to a [`TriangleVisitor`], in the adapter's local
/// frame (see [`CollisionSurface::origin_offset`]).
#[derive(Debug, Clone, Copy)]
pub struct CollisionTriangle {
    pub vertices: [Vec3; 3],
    pub normal: Vec3,
    /// Always `false`: the heightfield never flips a quad's diagonal split.
    pub edge_flipped: bool,
}
// ----------------------------------------------------------------------------
/// Consumes triangles yielded by an AABB or ray query.
pub trait TriangleVisitor {
    fn visit(&mut self, triangle: CollisionTriangle);
}
// ----------------------------------------------------------------------------
impl<F: FnMut(CollisionTriangle)> TriangleVisitor for F {
    fn visit(&mut self, triangle: CollisionTriangle) {
        self(triangle)
    }
}
// ----------------------------------------------------------------------------
/// A non-owning view over a heightfield's finest level, suitable for handing
/// to a physics broadphase. Invalidated by any `reload` of the heightfield;
/// the host must rebuild or drop it when `onModified` fires.
pub struct CollisionSurface {
    heightfield: Arc<Heightfield>,
}
// ----------------------------------------------------------------------------
impl CollisionSurface {
    pub fn new(heightfield: Arc<Heightfield>) -> Self {
        Self { heightfield }
    }
    // ------------------------------------------------------------------------
    /// The adapter's local origin offset: callers add this back to interpret
    /// any triangle or hit in world space.
    pub fn origin_offset(&self) -> Vec3 {
        Vec3::new(
            0.0,
            (self.heightfield.min_height() + self.heightfield.max_height()) * 0.5,
            0.0,
        )
    }
    // ------------------------------------------------------------------------
    pub fn local_bounding_box(&self) -> Aabb {
        let world = self.heightfield.bounding_box();
        let offset = self.origin_offset();
        Aabb::new(world.min - offset, world.max - offset)
    }
    // ------------------------------------------------------------------------
    /// Reports every finest-level triangle overlapping `local_aabb` (in the
    /// adapter's local frame).
    pub fn process_in_aabb(&self, local_aabb: &Aabb, visitor: &mut dyn TriangleVisitor) {
        let offset = self.origin_offset();
        let world_aabb = Aabb::new(local_aabb.min + offset, local_aabb.max + offset);

        let bbox = self.heightfield.bounding_box();
        let min_x = (world_aabb.min.x.floor() as i32).max(bbox.min.x as i32);
        let max_x = (world_aabb.max.x.ceil() as i32).min(bbox.max.x as i32);
        let min_z = (world_aabb.min.z.floor() as i32).max(bbox.min.z as i32);
        let max_z = (world_aabb.max.z.ceil() as i32).min(bbox.max.z as i32);

        let mut x = min_x;
        while x < max_x {
            let mut z = min_z;
            while z < max_z {
                if let Some((v0, v1, v2, normal, _)) = self.heightfield.triangle_at(x as f32 + 0.5, z as f32 + 0.5) {
                    visitor.visit(CollisionTriangle {
                        vertices: [v0 - offset, v1 - offset, v2 - offset],
                        normal,
                        edge_flipped: false,
                    });
                }
                z += 1;
            }
            x += 1;
        }
    }
    // ------------------------------------------------------------------------
    /// Reports every triangle the ray (in local space) crosses, delegating to
    /// the heightfield's own ray cast and translating hits back to local
    /// space.
    pub fn process_along_ray(
        &self,
        local_origin: Vec3,
        dir: Vec3,
        max_dist: f32,
        cull_back_face: bool,
        visitor: &mut dyn TriangleVisitor,
    ) {
        let offset = self.origin_offset();
        let world_origin = local_origin + offset;
        for hit in self.heightfield.ray_cast(world_origin, dir, max_dist, cull_back_face) {
            if let Some((v0, v1, v2, normal, _)) = self
                .heightfield
                .triangle_at(hit.position.x, hit.position.z)
            {
                visitor.visit(CollisionTriangle {
                    vertices: [v0 - offset, v1 - offset, v2 - offset],
                    normal,
                    edge_flipped: false,
                });
            }
        }
    }
}
// ----------------------------------------------------------------------------
#[cfg(test)]
mod tests {
    use super::*;
    use crate::heightfield::tests::flat_heightfield;
    // ------------------------------------------------------------------------
    #[test]
    fn origin_offset_is_average_of_min_and_max_height() {
        let h = flat_heightfield(9, 4.0);
        let adapter = CollisionSurface::new(h);
        assert_eq!(adapter.origin_offset(), Vec3::new(0.0, 4.0, 0.0));
    }
    // ------------------------------------------------------------------------
    #[test]
    fn process_in_aabb_visits_at_least_one_triangle_over_the_whole_surface() {
        let h = flat_heightfield(9, 0.0);
        let adapter = CollisionSurface::new(h);
        let bbox = adapter.local_bounding_box();

        let mut count = 0;
        adapter.process_in_aabb(&bbox, &mut |_t: CollisionTriangle| count += 1);
        assert!(count > 0);
    }
}
