//! Physics component adapters.
//!
//! Each adapter owns at most one native object per concern. Native ids are
//! `None` until the world binding registers the component (creation is lazy,
//! tied to simulation relevance, not construction) and return to `None` on
//! unregistration or creation failure. Every operation tolerates a missing
//! native object by doing nothing; a component that failed to create simply
//! stops affecting the world.

mod character;
mod collider;
mod rigid_body;

pub use character::CharacterController;
pub use collider::Collider;
pub use rigid_body::{MotionKind, RigidBody};
