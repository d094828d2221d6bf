//! Collider adapter.

use crate::backend::{BodyId, ShapeGeometry, ShapeId};
use crate::events::attack::AttackId;
use crate::events::PRIORITY_DEFAULT;
use crate::layers::{LayerFilter, LayerMask, NamedLayer};
use crate::transform::Vec3;

/// One collision shape bound to a native shape.
///
/// Shape ownership is arbitrated at registration time: with a sibling
/// [`super::RigidBody`] on the same object the shape attaches to that
/// body's actor; without one the collider owns a private fixed actor that
/// tracks the Transform. Attaching or detaching a body later moves the
/// shape between the two owners without recreating geometry.
#[derive(Debug)]
pub struct Collider {
    pub geometry: ShapeGeometry,
    /// Local offset from the owning object's origin.
    pub offset: Vec3,
    /// Sensors overlap instead of colliding and feed the trigger queue.
    pub is_trigger: bool,
    pub filter: LayerFilter,
    pub friction: f32,
    pub restitution: f32,
    pub density: f32,
    /// Priority stamped on collision events this shape produces.
    pub contact_priority: i32,
    /// While set, contacts from this shape belong to that attack.
    pub attack: Option<AttackId>,
    pub(crate) native: Option<ShapeId>,
    /// Private fixed actor, present only while no sibling body owns the shape.
    pub(crate) static_body: Option<BodyId>,
}

impl Collider {
    pub fn new(geometry: ShapeGeometry) -> Self {
        Self {
            geometry,
            offset: Vec3::zeros(),
            is_trigger: false,
            filter: LayerFilter::default(),
            friction: 0.5,
            restitution: 0.0,
            density: 1.0,
            contact_priority: PRIORITY_DEFAULT,
            attack: None,
            native: None,
            static_body: None,
        }
    }

    pub fn sphere(radius: f32) -> Self {
        Self::new(ShapeGeometry::Sphere { radius })
    }

    pub fn cuboid(half_extents: Vec3) -> Self {
        Self::new(ShapeGeometry::Cuboid { half_extents })
    }

    pub fn capsule(radius: f32, half_height: f32) -> Self {
        Self::new(ShapeGeometry::CapsuleY {
            radius,
            half_height,
        })
    }

    pub fn with_trigger(mut self, is_trigger: bool) -> Self {
        self.is_trigger = is_trigger;
        self
    }

    pub fn with_filter(mut self, filter: LayerFilter) -> Self {
        self.filter = filter;
        self
    }

    /// Place the shape on a named layer colliding with the given set.
    pub fn with_layers<L: NamedLayer<Bits = u32>>(
        mut self,
        layer: L,
        collides_with: LayerMask<u32>,
    ) -> Self {
        self.filter = LayerFilter::from_layers(layer, collides_with);
        self
    }

    pub fn with_offset(mut self, offset: Vec3) -> Self {
        self.offset = offset;
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.contact_priority = priority;
        self
    }

    pub fn native(&self) -> Option<ShapeId> {
        self.native
    }

    /// Whether the shape currently rides its own private fixed actor.
    pub fn owns_static_body(&self) -> bool {
        self.static_body.is_some()
    }
}
