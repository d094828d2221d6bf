/*!
Per-scene physics world binding.

Owns one native world per scene, the registration of bodies, colliders and
controllers on that world, the fixed-timestep loop, and the bidirectional
transform sync. Frame order is fixed: sync-in, zero or more fixed steps,
sync-out, event processing, and only then does gameplay read collision
state. All of it runs on one logical thread; the native engine may solve on
workers internally but nothing is observable until each call returns.
*/

mod query;

pub use query::{RayHit, SweepHit};

use std::collections::HashMap;

use log::{debug, error, warn};

use crate::backend::{
    BodyDesc, BodyId, BodyKind, PhysicsBackend, RawContact, RawContactPhase, RawTrigger,
    ShapeDesc, ShapeGeometry, StepEvents, WorldId, WorldSettings,
};
use crate::components::{Collider, MotionKind, RigidBody};
use crate::events::attack::AttackId;
use crate::events::pipeline::{EventPipeline, QueuedCollision, QueuedTrigger};
use crate::events::{CollisionListener, ContactPhase, ContactPoint};
use crate::registry::{Handle, Ptr};
use crate::scene::{ObjectRegistry, Scene, SceneId};
use crate::transform::{Iso, Vec3};

/// Default downward gravity magnitude (m/s^2).
pub const GRAVITY_MPS2: f32 = 9.81;

/// Simulation pacing.
#[derive(Clone, Copy, Debug)]
pub struct PhysicsSettings {
    pub gravity: Vec3,
    /// Fixed simulation step (seconds).
    pub fixed_dt: f32,
    /// Hard cap on steps per `update`; a lag spike never stalls the frame.
    pub max_substeps: u32,
    /// Incoming frame dt is clamped to this before accumulation.
    pub max_frame_dt: f32,
}

impl Default for PhysicsSettings {
    fn default() -> Self {
        Self {
            gravity: Vec3::new(0.0, -GRAVITY_MPS2, 0.0),
            fixed_dt: 1.0 / 60.0,
            max_substeps: 4,
            max_frame_dt: 0.25,
        }
    }
}

/// One scene's binding state.
struct ScenePhysics {
    world: WorldId,
    accumulator: f32,
    // Flat, unordered: removal is swap-and-pop.
    bodies: Vec<Handle>,
    colliders: Vec<Handle>,
    controllers: Vec<Handle>,
    /// Native body -> owning object, for active-set write-back and event
    /// attribution.
    body_owners: HashMap<BodyId, Handle>,
    /// Per-frame forces, reapplied before every substep of the frame.
    frame_forces: Vec<(BodyId, Vec3)>,
    pipeline: EventPipeline,
    events: StepEvents,
}

impl ScenePhysics {
    fn new(world: WorldId) -> Self {
        Self {
            world,
            accumulator: 0.0,
            bodies: Vec::new(),
            colliders: Vec::new(),
            controllers: Vec::new(),
            body_owners: HashMap::new(),
            frame_forces: Vec::new(),
            pipeline: EventPipeline::new(),
            events: StepEvents::default(),
        }
    }
}

fn remove_handle(list: &mut Vec<Handle>, handle: Handle) -> bool {
    if let Some(i) = list.iter().position(|&h| h == handle) {
        list.swap_remove(i);
        true
    } else {
        false
    }
}

/// The physics system: one backend, one binding per scene.
///
/// Constructed once and passed by reference into the update loop; nothing
/// here is global. Scenes not created through
/// [`create_scene_physics`](Self::create_scene_physics) (or whose native
/// world failed to create) are simply absent and every call on them is a
/// checked no-op.
pub struct PhysicsContext<B: PhysicsBackend> {
    backend: B,
    settings: PhysicsSettings,
    scenes: HashMap<SceneId, ScenePhysics>,
}

impl<B: PhysicsBackend> PhysicsContext<B> {
    pub fn new(backend: B, settings: PhysicsSettings) -> Self {
        Self {
            backend,
            settings,
            scenes: HashMap::new(),
        }
    }

    pub fn settings(&self) -> &PhysicsSettings {
        &self.settings
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn has_scene(&self, scene: SceneId) -> bool {
        self.scenes.contains_key(&scene)
    }

    /// Seconds of unsimulated time carried into the next update.
    pub fn accumulated(&self, scene: SceneId) -> f32 {
        self.scenes.get(&scene).map_or(0.0, |s| s.accumulator)
    }

    /// Create the native world for `scene` and register every physics
    /// component already present on its objects. Idempotent: a scene that
    /// already has a world is left untouched.
    ///
    /// Objects often exist before physics does; the eager registration pass
    /// closes that ordering gap.
    pub fn create_scene_physics(&mut self, scene: &Scene, objects: &mut ObjectRegistry) {
        let id = scene.id();
        if self.scenes.contains_key(&id) {
            debug!("scene {:?} already has a physics world", id);
            return;
        }
        let world_settings = WorldSettings {
            gravity: self.settings.gravity,
        };
        let world = match self.backend.create_world(&world_settings) {
            Ok(world) => world,
            Err(err) => {
                // Fatal for this scene: it stays uninitialized and every
                // dependent call no-ops.
                error!("failed to create physics world for {:?}: {}", id, err);
                return;
            }
        };
        self.scenes.insert(id, ScenePhysics::new(world));
        debug!("created physics world for {:?}", id);

        // Bodies first so colliders attach to them instead of private actors.
        let handles: Vec<Handle> = scene.objects().to_vec();
        for &handle in &handles {
            if objects.get(handle).is_some_and(|o| o.body().is_some()) {
                self.register_body(id, objects, handle);
            }
        }
        for &handle in &handles {
            if objects.get(handle).is_some_and(|o| o.collider().is_some()) {
                self.register_collider(id, objects, handle);
            }
        }
        for &handle in &handles {
            if objects.get(handle).is_some_and(|o| o.controller().is_some()) {
                self.register_controller(id, objects, handle);
            }
        }
    }

    /// Tear down a scene's world and release every native object. Safe to
    /// call for scenes that were never created.
    pub fn destroy_scene_physics(&mut self, scene: SceneId, objects: &mut ObjectRegistry) {
        let Some(mut sp) = self.scenes.remove(&scene) else {
            return;
        };
        for handle in std::mem::take(&mut sp.controllers) {
            release_controller(&mut self.backend, &mut sp, objects, handle);
        }
        for handle in std::mem::take(&mut sp.colliders) {
            release_collider(&mut self.backend, &mut sp, objects, handle);
        }
        for handle in std::mem::take(&mut sp.bodies) {
            release_body(&mut self.backend, &mut sp, objects, handle);
        }
        self.backend.destroy_world(sp.world);
        debug!("destroyed physics world for {:?}", scene);
    }

    /// Bind an object's rigid body to a native actor. Duplicate
    /// registration is a no-op.
    pub fn register_body(&mut self, scene: SceneId, objects: &mut ObjectRegistry, handle: Handle) {
        let Some(sp) = self.scenes.get_mut(&scene) else {
            return;
        };
        if sp.bodies.contains(&handle) {
            return;
        }
        let Some(object) = objects.get_mut(handle) else {
            return;
        };
        let pose = object.transform.iso();
        let Some(body) = object.body_mut() else {
            return;
        };
        let kind = match body.kind {
            MotionKind::Dynamic => BodyKind::Dynamic,
            MotionKind::Kinematic => BodyKind::Kinematic,
        };
        let mut desc = BodyDesc::new(kind, pose);
        desc.linear_damping = body.linear_damping;
        desc.gravity_scale = body.gravity_scale;

        let native = match self.backend.create_body(sp.world, &desc) {
            Ok(native) => native,
            Err(err) => {
                warn!("failed to create body for {:?}: {}", handle, err);
                return;
            }
        };
        body.native = Some(native);
        sp.bodies.push(handle);
        sp.body_owners.insert(native, handle);

        // A sibling collider that has been riding a private fixed actor now
        // hands its shape to the real body.
        if let Some(collider) = objects.get_mut(handle).and_then(|o| o.collider_mut()) {
            if let (Some(shape), Some(static_body)) = (collider.native, collider.static_body) {
                if self.backend.reattach_shape(sp.world, shape, native) {
                    self.backend.destroy_body(sp.world, static_body);
                    collider.static_body = None;
                } else {
                    warn!("failed to reattach shape of {:?} to its new body", handle);
                }
            }
        }
    }

    /// Release an object's native body. A sibling collider keeps its shape
    /// by moving it onto a fresh private fixed actor.
    pub fn unregister_body(&mut self, scene: SceneId, objects: &mut ObjectRegistry, handle: Handle) {
        let Some(sp) = self.scenes.get_mut(&scene) else {
            return;
        };
        if remove_handle(&mut sp.bodies, handle) {
            release_body(&mut self.backend, sp, objects, handle);
        }
    }

    /// Bind an object's collider to a native shape, attached to the sibling
    /// body's actor when one is registered, otherwise to a private fixed
    /// actor. Duplicate registration is a no-op.
    pub fn register_collider(
        &mut self,
        scene: SceneId,
        objects: &mut ObjectRegistry,
        handle: Handle,
    ) {
        let Some(sp) = self.scenes.get_mut(&scene) else {
            return;
        };
        if sp.colliders.contains(&handle) {
            return;
        }
        let Some(object) = objects.get(handle) else {
            return;
        };
        let pose = object.transform.iso();
        let sibling = object.body().and_then(RigidBody::native);
        let Some(collider) = object.collider() else {
            return;
        };

        let mut desc = ShapeDesc::new(collider.geometry, collider.filter, handle.to_bits());
        desc.offset = collider.offset;
        desc.is_trigger = collider.is_trigger;
        desc.friction = collider.friction;
        desc.restitution = collider.restitution;
        desc.density = collider.density;

        let (owner, static_body) = match sibling {
            Some(body) => (body, None),
            None => {
                let body_desc = BodyDesc::new(BodyKind::Fixed, pose);
                match self.backend.create_body(sp.world, &body_desc) {
                    Ok(body) => (body, Some(body)),
                    Err(err) => {
                        warn!("failed to create static actor for {:?}: {}", handle, err);
                        return;
                    }
                }
            }
        };
        let shape = match self.backend.create_shape(sp.world, owner, &desc) {
            Ok(shape) => shape,
            Err(err) => {
                warn!("failed to create shape for {:?}: {}", handle, err);
                if let Some(body) = static_body {
                    self.backend.destroy_body(sp.world, body);
                }
                return;
            }
        };
        if let Some(collider) = objects.get_mut(handle).and_then(|o| o.collider_mut()) {
            collider.native = Some(shape);
            collider.static_body = static_body;
        }
        sp.colliders.push(handle);
    }

    /// Release an object's native shape (and private actor, if any) and
    /// purge it from the event pipeline.
    pub fn unregister_collider(
        &mut self,
        scene: SceneId,
        objects: &mut ObjectRegistry,
        handle: Handle,
    ) {
        let Some(sp) = self.scenes.get_mut(&scene) else {
            return;
        };
        if remove_handle(&mut sp.colliders, handle) {
            release_collider(&mut self.backend, sp, objects, handle);
        }
    }

    /// Bind an object's character controller: a kinematic actor carrying
    /// its capsule, so other objects can hit and query it.
    pub fn register_controller(
        &mut self,
        scene: SceneId,
        objects: &mut ObjectRegistry,
        handle: Handle,
    ) {
        let Some(sp) = self.scenes.get_mut(&scene) else {
            return;
        };
        if sp.controllers.contains(&handle) {
            return;
        }
        let Some(object) = objects.get(handle) else {
            return;
        };
        let pose = object.transform.iso();
        let Some(controller) = object.controller() else {
            return;
        };
        let radius = controller.radius;
        let half_height = controller.half_height;
        let filter = controller.filter;

        let body = match self
            .backend
            .create_body(sp.world, &BodyDesc::new(BodyKind::Kinematic, pose))
        {
            Ok(body) => body,
            Err(err) => {
                warn!("failed to create controller body for {:?}: {}", handle, err);
                return;
            }
        };
        let desc = ShapeDesc::new(
            ShapeGeometry::CapsuleY {
                radius,
                half_height,
            },
            filter,
            handle.to_bits(),
        );
        let shape = match self.backend.create_shape(sp.world, body, &desc) {
            Ok(shape) => shape,
            Err(err) => {
                warn!("failed to create controller shape for {:?}: {}", handle, err);
                self.backend.destroy_body(sp.world, body);
                return;
            }
        };
        if let Some(controller) = objects.get_mut(handle).and_then(|o| o.controller_mut()) {
            controller.native_body = Some(body);
            controller.native_shape = Some(shape);
        }
        sp.controllers.push(handle);
        sp.body_owners.insert(body, handle);
    }

    pub fn unregister_controller(
        &mut self,
        scene: SceneId,
        objects: &mut ObjectRegistry,
        handle: Handle,
    ) {
        let Some(sp) = self.scenes.get_mut(&scene) else {
            return;
        };
        if remove_handle(&mut sp.controllers, handle) {
            release_controller(&mut self.backend, sp, objects, handle);
        }
    }

    /// Advance a scene's simulation by one frame.
    ///
    /// Sync-in, up to `max_substeps` fixed steps (leftover time carries in
    /// the accumulator), sync-out of the active set, then event dispatch.
    pub fn update(
        &mut self,
        scene: SceneId,
        objects: &mut ObjectRegistry,
        dt: f32,
        listener: &mut dyn CollisionListener,
    ) {
        let Some(sp) = self.scenes.get_mut(&scene) else {
            return;
        };

        sync_in(&mut self.backend, sp, objects);

        sp.accumulator += dt.clamp(0.0, self.settings.max_frame_dt);
        let mut steps = 0;
        while sp.accumulator >= self.settings.fixed_dt && steps < self.settings.max_substeps {
            for &(body, force) in &sp.frame_forces {
                self.backend.apply_force(sp.world, body, force);
            }
            self.backend
                .step(sp.world, self.settings.fixed_dt, &mut sp.events);
            feed_step_events(sp, objects);
            sync_out(&mut self.backend, sp, objects);
            sp.accumulator -= self.settings.fixed_dt;
            steps += 1;
        }
        // Requested forces survive frames that ran no step; they act on the
        // next stepped frame instead of vanishing.
        if steps > 0 {
            sp.frame_forces.clear();
        }

        sp.pipeline.process(objects, listener);
    }

    /// Perform one swept capsule move for a registered controller, writing
    /// the corrected result back into its Transform and native actor.
    pub fn move_controller(
        &mut self,
        scene: SceneId,
        objects: &mut ObjectRegistry,
        handle: Handle,
        motion: Vec3,
        dt: f32,
    ) {
        let Some(sp) = self.scenes.get_mut(&scene) else {
            return;
        };
        let Some(object) = objects.get(handle) else {
            return;
        };
        let Some(controller) = object.controller() else {
            return;
        };
        let Some(body) = controller.native_body else {
            return;
        };
        let position = object.transform.position();
        let desired = motion + controller.velocity() * dt;

        let Some(result) = self.backend.move_capsule(
            sp.world,
            controller.radius,
            controller.half_height,
            position,
            desired,
            dt,
            controller.filter.mask,
            controller.native_shape,
        ) else {
            return;
        };

        let mut new_position = position + result.translation;
        let mut grounded = result.grounded;
        // Latch onto nearby ground when not moving upward, keeping the
        // capsule hovering a small gap above the hit surface.
        if desired.y <= 0.0 && controller.snap_distance > 0.0 {
            let capsule = ShapeGeometry::CapsuleY {
                radius: controller.radius,
                half_height: controller.half_height,
            };
            let drop = Vec3::new(0.0, -controller.snap_distance, 0.0);
            if let Some(hit) = self.backend.cast_shape(
                sp.world,
                &capsule,
                new_position,
                drop,
                controller.filter.mask,
                controller.native_shape,
            ) {
                let impact = new_position + drop * hit.fraction;
                let mut normal = hit.normal;
                if normal.dot(&drop) > 0.0 {
                    normal = -normal;
                }
                new_position = impact + normal * controller.hover_height;
                grounded = true;
            }
        }
        let Some(object) = objects.get_mut(handle) else {
            return;
        };
        // Simulated write: must not trip the changed flag, or sync-in would
        // re-teleport the actor next frame.
        let pose = Iso::from_parts(new_position.into(), object.transform.rotation());
        object.transform.write_simulated_pose(&pose);
        if let Some(controller) = object.controller_mut() {
            controller.settle_after_move(grounded, result.hit_above, result.hit_sides, dt);
        }
        self.backend.set_kinematic_target(sp.world, body, &pose);
    }

    /// Open an attack attributed to `attacker`; contacts from colliders
    /// tagged with the returned id group into one gameplay hit.
    pub fn begin_attack(&mut self, scene: SceneId, attacker: Handle) -> Option<AttackId> {
        self.scenes
            .get_mut(&scene)
            .map(|sp| sp.pipeline.begin_attack(attacker))
    }

    pub fn end_attack(&mut self, scene: SceneId, id: AttackId) {
        if let Some(sp) = self.scenes.get_mut(&scene) {
            sp.pipeline.end_attack(id);
        }
    }

    /// Whether the two objects were in solid contact last frame.
    pub fn is_colliding(&self, scene: SceneId, a: Handle, b: Handle) -> bool {
        self.scenes
            .get(&scene)
            .is_some_and(|sp| sp.pipeline.is_colliding(a, b))
    }

    fn scene(&self, scene: SceneId) -> Option<&ScenePhysics> {
        self.scenes.get(&scene)
    }
}

/// Push gameplay state into the native world before stepping.
fn sync_in<B: PhysicsBackend>(backend: &mut B, sp: &mut ScenePhysics, objects: &mut ObjectRegistry) {
    for &handle in &sp.bodies {
        let Some(object) = objects.get_mut(handle) else {
            continue;
        };
        let pose = object.transform.iso();
        let changed = object.transform.take_changed();
        let Some(body) = object.body_mut() else {
            continue;
        };
        let Some(native) = body.native else {
            continue;
        };
        match body.kind {
            MotionKind::Kinematic => {
                // Gameplay-authoritative: the target pose goes in every call.
                backend.set_kinematic_target(sp.world, native, &pose);
            }
            MotionKind::Dynamic => {
                if let Some((position, rotation)) = body.take_pending_teleport() {
                    let target = Iso::from_parts(position.into(), rotation);
                    backend.set_body_pose(sp.world, native, &target);
                } else if changed {
                    // Direct transform writes on a dynamic body behave as a
                    // teleport too.
                    backend.set_body_pose(sp.world, native, &pose);
                }
                if let Some(velocity) = body.take_pending_velocity() {
                    backend.set_linear_velocity(sp.world, native, velocity);
                }
                let impulse = body.take_pending_impulse();
                if impulse != Vec3::zeros() {
                    backend.apply_impulse(sp.world, native, impulse);
                }
                let force = body.take_pending_force();
                if force != Vec3::zeros() {
                    sp.frame_forces.push((native, force));
                }
            }
        }
    }

    // Body-less colliders follow their Transform only when it moved.
    for &handle in &sp.colliders {
        let Some(object) = objects.get_mut(handle) else {
            continue;
        };
        let Some(static_body) = object.collider().and_then(|c| c.static_body) else {
            continue;
        };
        if object.transform.take_changed() {
            let pose = object.transform.iso();
            backend.set_body_pose(sp.world, static_body, &pose);
        }
    }

    // Controller teleports: an explicit transform write moves the actor.
    for &handle in &sp.controllers {
        let Some(object) = objects.get_mut(handle) else {
            continue;
        };
        if object.transform.take_changed() {
            let pose = object.transform.iso();
            if let Some(body) = object.controller().and_then(|c| c.native_body) {
                backend.set_body_pose(sp.world, body, &pose);
            }
        }
    }
}

/// Translate one step's raw events into queued gameplay events.
fn feed_step_events(sp: &mut ScenePhysics, objects: &ObjectRegistry) {
    let events = std::mem::take(&mut sp.events);

    for raw in &events.contacts {
        let Some(event) = translate_contact(raw, objects) else {
            continue;
        };
        sp.pipeline.queue_collision(event);
    }
    for raw in &events.triggers {
        let Some(event) = translate_trigger(raw, objects) else {
            continue;
        };
        sp.pipeline.queue_trigger(event);
    }

    sp.events = events;
}

fn collider_ptr(tag: u64, objects: &ObjectRegistry) -> Option<Ptr<Collider>> {
    let handle = Handle::from_bits(tag)?;
    let ptr = Ptr::<Collider>::new(handle);
    ptr.is_live(objects).then_some(ptr)
}

fn translate_contact(raw: &RawContact, objects: &ObjectRegistry) -> Option<QueuedCollision> {
    // Pairs referencing already-destroyed objects never enter the queue.
    let a = collider_ptr(raw.tag_a, objects)?;
    let b = collider_ptr(raw.tag_b, objects)?;
    let ca = a.get(objects)?;
    let cb = b.get(objects)?;

    let phase = match raw.phase {
        RawContactPhase::Started => ContactPhase::Enter,
        RawContactPhase::Persisted => ContactPhase::Stay,
        RawContactPhase::Stopped => ContactPhase::Exit,
    };
    Some(QueuedCollision {
        a,
        b,
        phase,
        contacts: raw
            .points
            .iter()
            .map(|p| ContactPoint {
                point: p.point,
                normal: p.normal,
                separation: p.separation,
            })
            .collect(),
        priority: ca.contact_priority.max(cb.contact_priority),
        attack: ca.attack.or(cb.attack),
    })
}

fn translate_trigger(raw: &RawTrigger, objects: &ObjectRegistry) -> Option<QueuedTrigger> {
    Some(QueuedTrigger {
        trigger: collider_ptr(raw.trigger_tag, objects)?,
        other: collider_ptr(raw.other_tag, objects)?,
        entered: raw.started,
    })
}

/// Write simulated poses back into Transforms after a step.
///
/// Only the active set is touched, and kinematic actors are skipped: their
/// Transforms are gameplay-authoritative and must never be overwritten.
fn sync_out<B: PhysicsBackend>(backend: &mut B, sp: &mut ScenePhysics, objects: &mut ObjectRegistry) {
    for i in 0..sp.events.active_bodies.len() {
        let native = sp.events.active_bodies[i];
        let Some(&owner) = sp.body_owners.get(&native) else {
            continue;
        };
        let Some(object) = objects.get_mut(owner) else {
            continue;
        };
        if object.body().is_some_and(RigidBody::is_kinematic) || object.controller().is_some() {
            continue;
        }
        let Some(pose) = backend.body_pose(sp.world, native) else {
            continue;
        };
        object.transform.write_simulated_pose(&pose);
        if let Some(body) = object.body_mut() {
            if let Some(velocity) = backend.linear_velocity(sp.world, native) {
                body.store_velocity(velocity);
            }
        }
    }
}

/// Teardown helpers, shared between explicit unregistration and scene
/// destruction. They null the component's native ids, so a later
/// re-registration starts clean.
fn release_body<B: PhysicsBackend>(
    backend: &mut B,
    sp: &mut ScenePhysics,
    objects: &mut ObjectRegistry,
    handle: Handle,
) {
    let Some(object) = objects.get_mut(handle) else {
        return;
    };
    let Some(body) = object.body_mut() else {
        return;
    };
    let Some(native) = body.native.take() else {
        return;
    };
    sp.body_owners.remove(&native);

    // Keep a sibling collider's shape alive on a fresh private actor.
    let pose = object.transform.iso();
    if let Some(collider) = object.collider_mut() {
        if let Some(shape) = collider.native {
            match backend.create_body(sp.world, &BodyDesc::new(BodyKind::Fixed, pose)) {
                Ok(static_body) if backend.reattach_shape(sp.world, shape, static_body) => {
                    collider.static_body = Some(static_body);
                }
                Ok(static_body) => {
                    warn!("failed to move shape of {:?} off its body", handle);
                    backend.destroy_body(sp.world, static_body);
                }
                Err(err) => {
                    warn!("failed to create static actor for {:?}: {}", handle, err);
                }
            }
        }
    }
    backend.destroy_body(sp.world, native);
}

fn release_collider<B: PhysicsBackend>(
    backend: &mut B,
    sp: &mut ScenePhysics,
    objects: &mut ObjectRegistry,
    handle: Handle,
) {
    if let Some(collider) = objects.get_mut(handle).and_then(|o| o.collider_mut()) {
        if let Some(shape) = collider.native.take() {
            backend.destroy_shape(sp.world, shape);
        }
        if let Some(body) = collider.static_body.take() {
            backend.destroy_body(sp.world, body);
        }
    }
    sp.pipeline.on_collider_destroyed(handle);
}

fn release_controller<B: PhysicsBackend>(
    backend: &mut B,
    sp: &mut ScenePhysics,
    objects: &mut ObjectRegistry,
    handle: Handle,
) {
    if let Some(controller) = objects.get_mut(handle).and_then(|o| o.controller_mut()) {
        if let Some(shape) = controller.native_shape.take() {
            backend.destroy_shape(sp.world, shape);
        }
        if let Some(body) = controller.native_body.take() {
            sp.body_owners.remove(&body);
            backend.destroy_body(sp.world, body);
        }
    }
}
