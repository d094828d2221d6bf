/*!
World transform consumed by the physics binding.

This is the only surface the binding needs from the wider engine's transform
system: pose getters, pose setters, and a "changed this frame" flag. Gameplay
writes go through [`Transform::set_position`]/[`Transform::set_rotation`] and
raise the flag; simulated pose write-back uses
[`Transform::write_simulated_pose`] so that engine-authored motion does not
re-trigger a sync into the native world on the next frame.
*/

use nalgebra as na;

/// Common math aliases for clarity and consistency.
pub type Vec3 = na::Vector3<f32>;
pub type Quat = na::UnitQuaternion<f32>;
pub type Iso = na::Isometry3<f32>;

/// A rigid world-space transform with change tracking.
#[derive(Clone, Copy, Debug)]
pub struct Transform {
    translation: Vec3,
    rotation: Quat,
    changed: bool,
}

impl Default for Transform {
    fn default() -> Self {
        Self::identity()
    }
}

impl Transform {
    pub fn identity() -> Self {
        Self {
            translation: Vec3::zeros(),
            rotation: Quat::identity(),
            changed: false,
        }
    }

    pub fn new(translation: Vec3, rotation: Quat) -> Self {
        Self {
            translation,
            rotation,
            changed: false,
        }
    }

    #[inline]
    pub fn position(&self) -> Vec3 {
        self.translation
    }

    #[inline]
    pub fn rotation(&self) -> Quat {
        self.rotation
    }

    /// Gameplay-side write; raises the changed flag.
    pub fn set_position(&mut self, position: Vec3) {
        self.translation = position;
        self.changed = true;
    }

    /// Gameplay-side write; raises the changed flag.
    pub fn set_rotation(&mut self, rotation: Quat) {
        self.rotation = rotation;
        self.changed = true;
    }

    /// Write-back from the simulation. Does not raise the changed flag:
    /// simulated motion is already native-side, syncing it back in would
    /// fight the solver.
    pub fn write_simulated_pose(&mut self, pose: &Iso) {
        self.translation = pose.translation.vector;
        self.rotation = pose.rotation;
    }

    /// Whether gameplay moved this transform since the flag was last taken.
    #[inline]
    pub fn changed_this_frame(&self) -> bool {
        self.changed
    }

    /// Consume the changed flag. The sync-in pass is the single consumer.
    #[inline]
    pub fn take_changed(&mut self) -> bool {
        std::mem::take(&mut self.changed)
    }

    /// Convert to an isometry for the native engine.
    #[inline]
    pub fn iso(&self) -> Iso {
        Iso::from_parts(
            na::Translation3::new(self.translation.x, self.translation.y, self.translation.z),
            self.rotation,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gameplay_writes_raise_the_changed_flag_once() {
        let mut t = Transform::identity();
        assert!(!t.changed_this_frame());

        t.set_position(Vec3::new(1.0, 2.0, 3.0));
        assert!(t.changed_this_frame());
        assert!(t.take_changed());
        assert!(!t.changed_this_frame());
    }

    #[test]
    fn simulated_write_back_does_not_raise_the_flag() {
        let mut t = Transform::identity();
        let pose = Iso::translation(4.0, 5.0, 6.0);
        t.write_simulated_pose(&pose);

        assert_eq!(t.position(), Vec3::new(4.0, 5.0, 6.0));
        assert!(!t.changed_this_frame());
    }

    #[test]
    fn iso_round_trips_position_and_rotation() {
        let rot = Quat::from_euler_angles(0.0, 1.0, 0.0);
        let t = Transform::new(Vec3::new(1.0, 0.0, -1.0), rot);
        let iso = t.iso();
        assert_eq!(iso.translation.vector, t.position());
        assert_eq!(iso.rotation, t.rotation());
    }
}
