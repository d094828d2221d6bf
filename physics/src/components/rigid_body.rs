//! Rigid body adapter.

use crate::backend::BodyId;
use crate::transform::{Quat, Vec3};

/// How a body moves through the world.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MotionKind {
    /// Solver-driven. The simulated pose overwrites the Transform each
    /// frame the body is active.
    Dynamic,
    /// Gameplay-driven. The Transform is pushed into the solver as a target
    /// every frame and is never overwritten by sync-out.
    Kinematic,
}

/// One rigid body bound to a native actor.
///
/// Force, impulse, velocity and teleport requests are buffered here and
/// flushed into the native body at the next sync-in, so gameplay can call
/// them at any point in the frame without ordering against the step.
#[derive(Debug)]
pub struct RigidBody {
    pub kind: MotionKind,
    pub linear_damping: f32,
    pub gravity_scale: f32,
    /// Velocity read back at the last sync-out.
    cached_velocity: Vec3,
    pending_force: Vec3,
    pending_impulse: Vec3,
    pending_velocity: Option<Vec3>,
    pending_teleport: Option<(Vec3, Quat)>,
    pub(crate) native: Option<BodyId>,
}

impl RigidBody {
    pub fn new(kind: MotionKind) -> Self {
        Self {
            kind,
            linear_damping: 0.0,
            gravity_scale: 1.0,
            cached_velocity: Vec3::zeros(),
            pending_force: Vec3::zeros(),
            pending_impulse: Vec3::zeros(),
            pending_velocity: None,
            pending_teleport: None,
            native: None,
        }
    }

    pub fn dynamic() -> Self {
        Self::new(MotionKind::Dynamic)
    }

    pub fn kinematic() -> Self {
        Self::new(MotionKind::Kinematic)
    }

    pub fn is_kinematic(&self) -> bool {
        self.kind == MotionKind::Kinematic
    }

    /// Continuous force for the next stepped frame. Accumulates across
    /// calls, resets once stepped.
    pub fn add_force(&mut self, force: Vec3) {
        self.pending_force += force;
    }

    /// Instantaneous velocity change, applied at the next sync-in.
    pub fn apply_impulse(&mut self, impulse: Vec3) {
        self.pending_impulse += impulse;
    }

    /// Overwrite the linear velocity at the next sync-in.
    pub fn set_velocity(&mut self, velocity: Vec3) {
        self.pending_velocity = Some(velocity);
    }

    /// Velocity as of the last completed simulation step.
    pub fn velocity(&self) -> Vec3 {
        self.cached_velocity
    }

    /// One-shot hard pose write, bypassing simulated motion. Consumed at
    /// the next sync-in.
    pub fn teleport(&mut self, position: Vec3, rotation: Quat) {
        self.pending_teleport = Some((position, rotation));
    }

    pub fn native(&self) -> Option<BodyId> {
        self.native
    }

    pub(crate) fn take_pending_teleport(&mut self) -> Option<(Vec3, Quat)> {
        self.pending_teleport.take()
    }

    pub(crate) fn take_pending_force(&mut self) -> Vec3 {
        std::mem::replace(&mut self.pending_force, Vec3::zeros())
    }

    pub(crate) fn take_pending_impulse(&mut self) -> Vec3 {
        std::mem::replace(&mut self.pending_impulse, Vec3::zeros())
    }

    pub(crate) fn take_pending_velocity(&mut self) -> Option<Vec3> {
        self.pending_velocity.take()
    }

    pub(crate) fn store_velocity(&mut self, velocity: Vec3) {
        self.cached_velocity = velocity;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_requests_accumulate_and_drain() {
        let mut rb = RigidBody::dynamic();
        rb.add_force(Vec3::new(1.0, 0.0, 0.0));
        rb.add_force(Vec3::new(1.0, 2.0, 0.0));
        rb.apply_impulse(Vec3::new(0.0, 0.0, 3.0));

        assert_eq!(rb.take_pending_force(), Vec3::new(2.0, 2.0, 0.0));
        assert_eq!(rb.take_pending_force(), Vec3::zeros());
        assert_eq!(rb.take_pending_impulse(), Vec3::new(0.0, 0.0, 3.0));
        assert!(rb.take_pending_velocity().is_none());
    }

    #[test]
    fn teleport_is_one_shot() {
        let mut rb = RigidBody::dynamic();
        rb.teleport(Vec3::new(5.0, 0.0, 0.0), Quat::identity());
        assert!(rb.take_pending_teleport().is_some());
        assert!(rb.take_pending_teleport().is_none());
    }
}
