/*!
Gameplay-facing collision and trigger events.

Raw native notifications are translated into these types inside the step
phase, queued, then sorted, deduplicated and dispatched once per frame by
[`pipeline::EventPipeline`]. Everything here carries weak references, never
borrows: an event outlives the step that produced it by up to one frame, and
either endpoint may be destroyed in between. A stale endpoint makes the
event undeliverable, not unsound.
*/

pub mod attack;
pub mod pipeline;

use crate::components::Collider;
use crate::registry::{Handle, Ptr};
use crate::scene::ObjectRegistry;
use crate::transform::Vec3;

use attack::AttackId;

/// Contact priority of an ordinary, non-combat collision.
pub const PRIORITY_DEFAULT: i32 = 0;
/// Contact priority of a plain attack hit.
pub const PRIORITY_ATTACK: i32 = 50;
/// Priority at or above which an event consumes its attack, suppressing
/// later lower-priority reactions to the same attack (e.g. a parry beats
/// the plain hit it intercepts).
pub const PRIORITY_BLOCK: i32 = 100;

/// Lifecycle of a collision or trigger pair, as seen by gameplay.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ContactPhase {
    Enter,
    Stay,
    Exit,
}

/// One world-space contact point between two shapes.
#[derive(Copy, Clone, Debug)]
pub struct ContactPoint {
    pub point: Vec3,
    /// Normal on `this_collider`'s surface, pointing towards the other shape.
    pub normal: Vec3,
    /// Signed separation (negative while penetrating).
    pub separation: f32,
}

impl ContactPoint {
    /// The same contact seen from the other shape.
    pub fn flipped(&self) -> Self {
        Self {
            point: self.point,
            normal: -self.normal,
            separation: self.separation,
        }
    }
}

/// A solid-contact event, delivered once per involved side.
#[derive(Clone, Debug)]
pub struct CollisionEvent {
    pub phase: ContactPhase,
    /// The receiving side.
    pub this_collider: Ptr<Collider>,
    /// The side it collided with.
    pub other_collider: Ptr<Collider>,
    /// Contact points with normals oriented for the receiving side.
    pub contacts: Vec<ContactPoint>,
    pub priority: i32,
    /// Set when the contact belongs to a gameplay attack.
    pub attack: Option<AttackId>,
}

/// A sensor-overlap event. `Stay` is synthesized by the pipeline; the
/// native engine only reports transitions.
#[derive(Copy, Clone, Debug)]
pub struct TriggerEvent {
    pub phase: ContactPhase,
    pub trigger: Ptr<Collider>,
    pub other: Ptr<Collider>,
}

/// Gameplay's receiving end of the pipeline.
///
/// Called strictly after simulation, never from inside a native callback.
/// Implementations get mutable registry access so reactions (impulses,
/// despawns) can be applied immediately; destroying an object mid-dispatch
/// is safe, later events referencing it are skipped.
///
/// Implementations must not panic across this boundary; the pipeline clears
/// its queues regardless, so an unwound frame does not replay stale events.
pub trait CollisionListener {
    fn on_collision(&mut self, objects: &mut ObjectRegistry, event: &CollisionEvent);
    fn on_trigger(&mut self, objects: &mut ObjectRegistry, event: &TriggerEvent);
}

/// An overlapping trigger pair retained across frames.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct TriggerPair {
    pub trigger: Handle,
    pub other: Handle,
}
