/*!
Physics backend seam.

The wrapped native engine is only reached through the [`PhysicsBackend`]
trait: create worlds/bodies/shapes, step, and run scene queries. Keeping the
foreign calls behind one interface keeps the handle and event design
backend-agnostic, and lets the binding and event pipeline be unit-tested
against a scripted fake instead of the real solver.

Identity across the boundary is deliberately thin:
- [`WorldId`]/[`BodyId`]/[`ShapeId`] are opaque per-backend indices.
- Every shape carries an opaque `tag` word (a packed [`crate::registry::Handle`])
  that the backend stores in the native object's user data and echoes back in
  step events and query hits. The binding unpacks it into weak references, so
  results degrade gracefully when the referent has since been destroyed.

Raw step events are pure translations of what the native engine reported:
no ordering, no dedup, no gameplay meaning. That is the event pipeline's job.
*/

pub mod rapier;

#[cfg(test)]
pub mod fake;

use crate::layers::LayerFilter;
use crate::transform::{Iso, Quat, Vec3};

/// Index of a native world owned by the backend.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct WorldId(pub u32);

/// Index of a native rigid body within one world.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct BodyId(pub u32);

/// Index of a native collision shape within one world.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ShapeId(pub u32);

/// Errors surfaced by native object creation.
///
/// Creation failures are logged once at the binding boundary and converted
/// into a degraded (null-native) component state; they never propagate as
/// panics across the physics boundary.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("failed to create native world: {0}")]
    WorldCreation(String),
    #[error("failed to create native {what}: {reason}")]
    ObjectCreation {
        what: &'static str,
        reason: String,
    },
    #[error("unknown world id {0:?}")]
    UnknownWorld(WorldId),
    #[error("unknown body id {0:?}")]
    UnknownBody(BodyId),
}

/// Settings for a newly created native world.
#[derive(Clone, Copy, Debug)]
pub struct WorldSettings {
    /// World gravity (m/s^2), applied to dynamic bodies.
    pub gravity: Vec3,
}

impl Default for WorldSettings {
    fn default() -> Self {
        Self {
            gravity: Vec3::new(0.0, -crate::world::GRAVITY_MPS2, 0.0),
        }
    }
}

/// Motion regime of a native body.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BodyKind {
    /// Simulated by the solver; pose is engine-authoritative.
    Dynamic,
    /// Position-driven: gameplay pushes a target pose every frame.
    Kinematic,
    /// Never moves. Used for the private actors owned by body-less colliders.
    Fixed,
}

/// Creation parameters for a native body.
#[derive(Clone, Copy, Debug)]
pub struct BodyDesc {
    pub kind: BodyKind,
    pub pose: Iso,
    pub linear_damping: f32,
    pub gravity_scale: f32,
}

impl BodyDesc {
    pub fn new(kind: BodyKind, pose: Iso) -> Self {
        Self {
            kind,
            pose,
            linear_damping: 0.0,
            gravity_scale: 1.0,
        }
    }
}

/// Supported collision geometries.
///
/// Kept intentionally small; extend as gameplay needs new shapes.
#[derive(Clone, Copy, Debug)]
pub enum ShapeGeometry {
    /// Sphere/ball (meters).
    Sphere { radius: f32 },
    /// Oriented cuboid with given half-extents (meters).
    Cuboid { half_extents: Vec3 },
    /// Y-aligned capsule (meters).
    CapsuleY { radius: f32, half_height: f32 },
}

/// Creation parameters for a native shape attached to a body.
#[derive(Clone, Copy, Debug)]
pub struct ShapeDesc {
    pub geometry: ShapeGeometry,
    /// Local translation offset from the owning body's origin.
    pub offset: Vec3,
    pub filter: LayerFilter,
    /// Sensors generate pair events but no solid contacts.
    pub is_trigger: bool,
    pub friction: f32,
    pub restitution: f32,
    pub density: f32,
    /// Opaque owner back-pointer (packed handle), echoed in events/queries.
    pub tag: u64,
}

impl ShapeDesc {
    pub fn new(geometry: ShapeGeometry, filter: LayerFilter, tag: u64) -> Self {
        Self {
            geometry,
            offset: Vec3::zeros(),
            filter,
            is_trigger: false,
            friction: 0.5,
            restitution: 0.0,
            density: 1.0,
            tag,
        }
    }
}

/// Lifecycle of one raw contact pair as reported by the native engine.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RawContactPhase {
    /// The pair started touching during this step.
    Started,
    /// The pair kept touching (already touching before this step).
    Persisted,
    /// The pair stopped touching during this step.
    Stopped,
}

/// One native contact point in world space.
#[derive(Copy, Clone, Debug)]
pub struct RawContactPoint {
    pub point: Vec3,
    /// Normal on the first shape, pointing towards the second.
    pub normal: Vec3,
    /// Signed separation distance (negative while penetrating).
    pub separation: f32,
}

/// A raw solid-contact notification for one shape pair.
#[derive(Clone, Debug)]
pub struct RawContact {
    pub a: ShapeId,
    pub b: ShapeId,
    pub tag_a: u64,
    pub tag_b: u64,
    pub phase: RawContactPhase,
    pub points: Vec<RawContactPoint>,
}

/// A raw sensor-overlap transition for one shape pair.
///
/// The native engine reports transitions only; persistence ("stay") is
/// synthesized downstream by the event pipeline.
#[derive(Copy, Clone, Debug)]
pub struct RawTrigger {
    /// Tag of the sensor shape.
    pub trigger_tag: u64,
    /// Tag of the shape overlapping it.
    pub other_tag: u64,
    pub started: bool,
}

/// Everything one simulation step produced, collected synchronously after
/// the step call returns.
#[derive(Default)]
pub struct StepEvents {
    pub contacts: Vec<RawContact>,
    pub triggers: Vec<RawTrigger>,
    /// Bodies the solver moved during this step ("active set"); bounds the
    /// cost of the pose write-back.
    pub active_bodies: Vec<BodyId>,
}

impl StepEvents {
    pub fn clear(&mut self) {
        self.contacts.clear();
        self.triggers.clear();
        self.active_bodies.clear();
    }
}

/// Result of one kinematic character move against the world.
#[derive(Copy, Clone, Debug)]
pub struct CharacterMove {
    /// Collision-corrected translation actually applied.
    pub translation: Vec3,
    /// Whether the mover ended the step supported from below.
    pub grounded: bool,
    /// Whether upward motion was cut short by a ceiling.
    pub hit_above: bool,
    /// Whether horizontal motion was cut short by walls.
    pub hit_sides: bool,
}

/// A ray query hit.
#[derive(Copy, Clone, Debug)]
pub struct RawRayHit {
    pub shape: ShapeId,
    pub tag: u64,
    pub distance: f32,
    pub point: Vec3,
    pub normal: Vec3,
}

/// A swept-shape query hit.
#[derive(Copy, Clone, Debug)]
pub struct RawSweepHit {
    pub shape: ShapeId,
    pub tag: u64,
    /// Fraction (0..1) of the tested translation where the hit occurred.
    pub fraction: f32,
    /// World-space contact normal on the swept shape.
    pub normal: Vec3,
}

/// The native engine, behind an explicit interface.
///
/// All calls are synchronous; the backend may use worker threads internally
/// but results are only observable after each call returns. Operations on
/// unknown ids are no-ops (or `None`), matching the degraded-state error
/// model: a component whose native object failed to create simply stops
/// affecting the world.
pub trait PhysicsBackend {
    fn create_world(&mut self, settings: &WorldSettings) -> Result<WorldId, BackendError>;
    fn destroy_world(&mut self, world: WorldId);

    fn create_body(&mut self, world: WorldId, desc: &BodyDesc) -> Result<BodyId, BackendError>;
    fn destroy_body(&mut self, world: WorldId, body: BodyId);
    fn body_pose(&self, world: WorldId, body: BodyId) -> Option<Iso>;
    /// Hard pose write (teleport). Wakes the body.
    fn set_body_pose(&mut self, world: WorldId, body: BodyId, pose: &Iso);
    /// Target pose for a kinematic body; the solver interpolates velocities.
    fn set_kinematic_target(&mut self, world: WorldId, body: BodyId, pose: &Iso);
    fn linear_velocity(&self, world: WorldId, body: BodyId) -> Option<Vec3>;
    fn set_linear_velocity(&mut self, world: WorldId, body: BodyId, velocity: Vec3);
    fn apply_force(&mut self, world: WorldId, body: BodyId, force: Vec3);
    fn apply_impulse(&mut self, world: WorldId, body: BodyId, impulse: Vec3);

    fn create_shape(
        &mut self,
        world: WorldId,
        body: BodyId,
        desc: &ShapeDesc,
    ) -> Result<ShapeId, BackendError>;
    fn destroy_shape(&mut self, world: WorldId, shape: ShapeId);
    /// Move an existing shape to another body without recreating geometry.
    /// Returns false if either id is unknown.
    fn reattach_shape(&mut self, world: WorldId, shape: ShapeId, new_body: BodyId) -> bool;
    fn shape_tag(&self, world: WorldId, shape: ShapeId) -> Option<u64>;

    /// Advance the world by `dt` and collect everything the step produced.
    /// `events` is cleared by the callee before filling.
    fn step(&mut self, world: WorldId, dt: f32, events: &mut StepEvents);

    fn cast_ray(
        &self,
        world: WorldId,
        origin: Vec3,
        dir: Vec3,
        max_dist: f32,
        mask: u32,
    ) -> Option<RawRayHit>;

    /// Sweep `geometry` from `from` along `translation`, returning the
    /// earliest hit. `exclude` removes one shape from consideration (a
    /// character controller never hits its own capsule).
    fn cast_shape(
        &self,
        world: WorldId,
        geometry: &ShapeGeometry,
        from: Vec3,
        translation: Vec3,
        mask: u32,
        exclude: Option<ShapeId>,
    ) -> Option<RawSweepHit>;

    /// One swept kinematic capsule move: combine collision resolution,
    /// sliding and grounding in a single call. Returns `None` for an
    /// unknown world.
    #[allow(clippy::too_many_arguments)]
    fn move_capsule(
        &self,
        world: WorldId,
        radius: f32,
        half_height: f32,
        position: Vec3,
        desired: Vec3,
        dt: f32,
        mask: u32,
        exclude: Option<ShapeId>,
    ) -> Option<CharacterMove>;

    /// Tags of every shape overlapping `geometry` placed at `center` with
    /// `rotation` (rotation only meaningful for boxes).
    fn overlap(
        &self,
        world: WorldId,
        geometry: &ShapeGeometry,
        center: Vec3,
        rotation: Quat,
        mask: u32,
    ) -> Vec<u64>;
}
