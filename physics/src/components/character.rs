//! Character controller adapter.

use crate::backend::{BodyId, ShapeId};
use crate::layers::{LayerFilter, LayerMask, NamedLayer};
use crate::transform::Vec3;

/// A capsule-sweep kinematic mover.
///
/// The controller owns a kinematic native body carrying its capsule shape,
/// so other objects can collide with and query it, but its own motion comes
/// from swept moves, not the solver. Gameplay feeds velocity (gravity,
/// knockback) through [`add_velocity`](Self::add_velocity) and calls the
/// world binding's move operation once per frame; the binding resolves the
/// sweep and updates [`grounded`](Self::grounded) and the velocity state.
#[derive(Debug)]
pub struct CharacterController {
    pub radius: f32,
    pub half_height: f32,
    pub filter: LayerFilter,
    /// Fraction of horizontal velocity kept per second after a move.
    pub horizontal_damping: f32,
    /// Maximum downward cast distance (meters) used to latch onto ground
    /// after a move. Zero disables snapping.
    pub snap_distance: f32,
    /// Offset along the surface normal kept after a ground snap (meters).
    pub hover_height: f32,
    /// Velocity accumulated by gameplay between moves.
    velocity: Vec3,
    grounded: bool,
    hit_sides: bool,
    pub(crate) native_body: Option<BodyId>,
    pub(crate) native_shape: Option<ShapeId>,
}

impl CharacterController {
    pub fn new(radius: f32, half_height: f32) -> Self {
        Self {
            radius,
            half_height,
            filter: LayerFilter::default(),
            horizontal_damping: 0.1,
            snap_distance: 0.30,
            hover_height: 0.02,
            velocity: Vec3::zeros(),
            grounded: false,
            hit_sides: false,
            native_body: None,
            native_shape: None,
        }
    }

    pub fn with_filter(mut self, filter: LayerFilter) -> Self {
        self.filter = filter;
        self
    }

    /// Place the capsule on a named layer colliding with the given set.
    pub fn with_layers<L: NamedLayer<Bits = u32>>(
        mut self,
        layer: L,
        collides_with: LayerMask<u32>,
    ) -> Self {
        self.filter = LayerFilter::from_layers(layer, collides_with);
        self
    }

    pub fn velocity(&self) -> Vec3 {
        self.velocity
    }

    pub fn set_velocity(&mut self, velocity: Vec3) {
        self.velocity = velocity;
    }

    pub fn add_velocity(&mut self, delta: Vec3) {
        self.velocity += delta;
    }

    /// Whether the last move ended supported from below.
    pub fn grounded(&self) -> bool {
        self.grounded
    }

    /// Whether the last move had horizontal motion cut short by walls.
    pub fn hit_sides(&self) -> bool {
        self.hit_sides
    }

    pub fn native_body(&self) -> Option<BodyId> {
        self.native_body
    }

    /// Post-move bookkeeping: grounding, ceiling response, damping.
    pub(crate) fn settle_after_move(
        &mut self,
        grounded: bool,
        hit_above: bool,
        hit_sides: bool,
        dt: f32,
    ) {
        self.grounded = grounded;
        self.hit_sides = hit_sides;
        if grounded && self.velocity.y < 0.0 {
            self.velocity.y = 0.0;
        }
        if hit_above && self.velocity.y > 0.0 {
            self.velocity.y = 0.0;
        }
        let keep = (1.0 - self.horizontal_damping * dt).clamp(0.0, 1.0);
        self.velocity.x *= keep;
        self.velocity.z *= keep;
    }
}
