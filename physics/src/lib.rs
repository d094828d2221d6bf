pub mod backend;
pub mod components;
pub mod events;
pub mod layers;
pub mod registry;
pub mod scene;
pub mod transform;
pub mod world;

pub use backend::{PhysicsBackend, ShapeGeometry};
pub use backend::rapier::RapierBackend;
pub use components::{CharacterController, Collider, MotionKind, RigidBody};
pub use events::attack::AttackId;
pub use events::{
    CollisionEvent, CollisionListener, ContactPhase, ContactPoint, TriggerEvent, PRIORITY_ATTACK,
    PRIORITY_BLOCK, PRIORITY_DEFAULT,
};
pub use layers::{LayerFilter, LayerMask, NamedLayer};
pub use registry::{Handle, Ptr, Registry};
pub use scene::{GameObject, ObjectRegistry, Scene, SceneId};
pub use transform::{Quat, Transform, Vec3};
pub use world::{PhysicsContext, PhysicsSettings, RayHit, SweepHit, GRAVITY_MPS2};
