//! Synchronous scene queries.
//!
//! Every hit comes back as a weak reference resolved from the shape's
//! stored owner tag, so a result read after its target was destroyed
//! degrades to a dead pointer instead of dangling.

use crate::backend::{PhysicsBackend, ShapeGeometry};
use crate::components::Collider;
use crate::registry::{Handle, Ptr};
use crate::scene::SceneId;
use crate::transform::{Quat, Vec3};

use super::PhysicsContext;

/// A raycast result.
#[derive(Copy, Clone, Debug)]
pub struct RayHit {
    pub collider: Ptr<Collider>,
    pub distance: f32,
    pub point: Vec3,
    pub normal: Vec3,
}

/// A swept-shape result.
#[derive(Copy, Clone, Debug)]
pub struct SweepHit {
    pub collider: Ptr<Collider>,
    /// Fraction (0..1) of the sweep at which the hit occurred.
    pub fraction: f32,
    pub normal: Vec3,
}

fn ptr_from_tag(tag: u64) -> Option<Ptr<Collider>> {
    Handle::from_bits(tag).map(Ptr::new)
}

impl<B: PhysicsBackend> PhysicsContext<B> {
    /// First shape hit by a ray. `mask` selects the layers tested against.
    pub fn raycast(
        &self,
        scene: SceneId,
        origin: Vec3,
        dir: Vec3,
        max_dist: f32,
        mask: u32,
    ) -> Option<RayHit> {
        let sp = self.scene(scene)?;
        let hit = self
            .backend()
            .cast_ray(sp.world, origin, dir, max_dist, mask)?;
        Some(RayHit {
            collider: ptr_from_tag(hit.tag)?,
            distance: hit.distance,
            point: hit.point,
            normal: hit.normal,
        })
    }

    /// Earliest shape hit by a sphere swept along `translation`.
    pub fn sphere_cast(
        &self,
        scene: SceneId,
        origin: Vec3,
        radius: f32,
        translation: Vec3,
        mask: u32,
    ) -> Option<SweepHit> {
        let sp = self.scene(scene)?;
        let hit = self.backend().cast_shape(
            sp.world,
            &ShapeGeometry::Sphere { radius },
            origin,
            translation,
            mask,
            None,
        )?;
        Some(SweepHit {
            collider: ptr_from_tag(hit.tag)?,
            fraction: hit.fraction,
            normal: hit.normal,
        })
    }

    /// Every collider overlapping a sphere.
    pub fn overlap_sphere(
        &self,
        scene: SceneId,
        center: Vec3,
        radius: f32,
        mask: u32,
    ) -> Vec<Ptr<Collider>> {
        let Some(sp) = self.scene(scene) else {
            return Vec::new();
        };
        self.backend()
            .overlap(
                sp.world,
                &ShapeGeometry::Sphere { radius },
                center,
                Quat::identity(),
                mask,
            )
            .into_iter()
            .filter_map(ptr_from_tag)
            .collect()
    }

    /// Every collider overlapping an oriented box.
    pub fn overlap_box(
        &self,
        scene: SceneId,
        center: Vec3,
        half_extents: Vec3,
        rotation: Quat,
        mask: u32,
    ) -> Vec<Ptr<Collider>> {
        let Some(sp) = self.scene(scene) else {
            return Vec::new();
        };
        self.backend()
            .overlap(
                sp.world,
                &ShapeGeometry::Cuboid { half_extents },
                center,
                rotation,
                mask,
            )
            .into_iter()
            .filter_map(ptr_from_tag)
            .collect()
    }
}
