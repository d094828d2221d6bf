/*!
Rapier 3D implementation of the physics backend.

Design
- One [`RapierWorld`] per scene, each a full dynamics pipeline (islands,
  BVH broad phase, narrow phase, CCD) with its own event channel.
- Backend ids are dense per-world indices mapped to rapier handles; the
  binding's packed object handle rides in each collider's `user_data` word
  and is echoed back in raw events and query hits.
- Step events are drained synchronously right after the pipeline step, so
  no rapier callback ever runs concurrently with gameplay code. "Persisted"
  contacts are derived from the narrow-phase pair graph, since the event
  channel only reports transitions.
- Scene queries use the borrowed query-pipeline view over the broad phase;
  shape sweeps run parry's `cast_shapes` per candidate collider, keeping the
  earliest time of impact.
*/

use std::collections::{HashMap, HashSet};
use std::sync::mpsc;

use rapier3d::control::{CharacterAutostep, CharacterLength, KinematicCharacterController};
use rapier3d::geometry::InteractionTestMode;
use rapier3d::parry::query::{self, ShapeCastOptions};
use rapier3d::parry::shape::{Ball, Capsule, Cuboid, Shape};
use rapier3d::prelude::*;

use crate::layers::LayerFilter;
use crate::transform::{Iso, Quat, Vec3};

use super::{
    BackendError, BodyDesc, BodyId, BodyKind, CharacterMove, PhysicsBackend, RawContact,
    RawContactPhase, RawContactPoint, RawRayHit, RawSweepHit, RawTrigger, ShapeDesc,
    ShapeGeometry, ShapeId, StepEvents, WorldId, WorldSettings,
};

/// Minimum fraction of requested motion that must be lost before a move is
/// classified as blocked along that axis.
const MOVE_BLOCK_EPS: f32 = 1.0e-4;

struct RapierWorld {
    gravity: Vector<Real>,
    params: IntegrationParameters,
    pipeline: PhysicsPipeline,
    islands: IslandManager,
    broad_phase: BroadPhaseBvh,
    narrow_phase: NarrowPhase,
    bodies: RigidBodySet,
    colliders: ColliderSet,
    impulse_joints: ImpulseJointSet,
    multibody_joints: MultibodyJointSet,
    ccd: CCDSolver,
    character: KinematicCharacterController,
    event_handler: ChannelEventCollector,
    collision_recv: mpsc::Receiver<CollisionEvent>,
    force_recv: mpsc::Receiver<ContactForceEvent>,
    // Dense id -> rapier handle maps. Slots are not reused; worlds hold few
    // enough objects that monotonic growth is fine.
    body_handles: Vec<Option<RigidBodyHandle>>,
    body_ids: HashMap<RigidBodyHandle, BodyId>,
    shape_handles: Vec<Option<ColliderHandle>>,
    shape_ids: HashMap<ColliderHandle, ShapeId>,
}

impl RapierWorld {
    fn new(settings: &WorldSettings) -> Self {
        let (collision_send, collision_recv) = mpsc::channel();
        let (force_send, force_recv) = mpsc::channel();

        Self {
            gravity: settings.gravity,
            params: IntegrationParameters::default(),
            pipeline: PhysicsPipeline::new(),
            islands: IslandManager::new(),
            broad_phase: BroadPhaseBvh::new(),
            narrow_phase: NarrowPhase::new(),
            bodies: RigidBodySet::new(),
            colliders: ColliderSet::new(),
            impulse_joints: ImpulseJointSet::new(),
            multibody_joints: MultibodyJointSet::new(),
            ccd: CCDSolver::new(),
            character: KinematicCharacterController {
                autostep: Some(CharacterAutostep {
                    include_dynamic_bodies: false,
                    max_height: CharacterLength::Relative(0.4),
                    ..CharacterAutostep::default()
                }),
                offset: CharacterLength::Relative(0.025),
                ..KinematicCharacterController::default()
            },
            event_handler: ChannelEventCollector::new(collision_send, force_send),
            collision_recv,
            force_recv,
            body_handles: Vec::new(),
            body_ids: HashMap::new(),
            shape_handles: Vec::new(),
            shape_ids: HashMap::new(),
        }
    }

    fn body(&self, id: BodyId) -> Option<&RigidBody> {
        let handle = (*self.body_handles.get(id.0 as usize)?)?;
        self.bodies.get(handle)
    }

    fn body_mut(&mut self, id: BodyId) -> Option<&mut RigidBody> {
        let handle = (*self.body_handles.get(id.0 as usize)?)?;
        self.bodies.get_mut(handle)
    }

    fn collider_handle(&self, id: ShapeId) -> Option<ColliderHandle> {
        *self.shape_handles.get(id.0 as usize)?
    }

    /// Borrowed query view over the current broad/narrow phase state.
    fn query_pipeline<'a>(&'a self, filter: QueryFilter<'a>) -> QueryPipeline<'a> {
        self.broad_phase.as_query_pipeline(
            self.narrow_phase.query_dispatcher(),
            &self.bodies,
            &self.colliders,
            filter,
        )
    }

    fn query_filter(&self, mask: u32, exclude: Option<ShapeId>) -> QueryFilter<'_> {
        let mut filter = QueryFilter::default();
        // Query memberships are "all": one-way layer filtering against the
        // candidate shape's membership bit.
        filter.groups = Some(InteractionGroups::new(
            Group::ALL,
            Group::from_bits_truncate(mask),
            InteractionTestMode::And,
        ));
        if let Some(shape) = exclude {
            filter.exclude_collider = self.collider_handle(shape);
        }
        filter
    }

    fn tag_of(&self, handle: ColliderHandle) -> Option<u64> {
        self.colliders.get(handle).map(|c| c.user_data as u64)
    }

    /// World-space contact points of a narrow-phase pair.
    fn gather_points(&self, pair: &ContactPair) -> Vec<RawContactPoint> {
        let mut out = Vec::new();
        for manifold in &pair.manifolds {
            let normal: Vector<Real> = manifold.data.normal;
            if !manifold.data.solver_contacts.is_empty() {
                for sc in &manifold.data.solver_contacts {
                    out.push(RawContactPoint {
                        point: sc.point.coords,
                        normal,
                        separation: sc.dist,
                    });
                }
            } else if let Some(co1) = self.colliders.get(pair.collider1) {
                // Pairs that are not solved (e.g. kinematic vs fixed) have no
                // solver contacts; fall back to the tracked manifold points.
                let pos1 = *co1.position();
                for pt in &manifold.points {
                    out.push(RawContactPoint {
                        point: (pos1 * pt.local_p1).coords,
                        normal,
                        separation: pt.dist,
                    });
                }
            }
        }
        out
    }

    fn raw_contact(
        &self,
        c1: ColliderHandle,
        c2: ColliderHandle,
        phase: RawContactPhase,
        with_points: bool,
    ) -> Option<RawContact> {
        // Either side may already be gone (removal-triggered stop events);
        // such pairs are dropped here and resolved by the binding's own
        // destruction purge.
        let a = *self.shape_ids.get(&c1)?;
        let b = *self.shape_ids.get(&c2)?;
        let tag_a = self.tag_of(c1)?;
        let tag_b = self.tag_of(c2)?;
        let points = if with_points {
            self.narrow_phase
                .contact_pair(c1, c2)
                .map(|pair| self.gather_points(pair))
                .unwrap_or_default()
        } else {
            Vec::new()
        };
        Some(RawContact {
            a,
            b,
            tag_a,
            tag_b,
            phase,
            points,
        })
    }

    fn raw_trigger(&self, c1: ColliderHandle, c2: ColliderHandle, started: bool) -> Option<RawTrigger> {
        let sensor_first = self.colliders.get(c1).is_some_and(|c| c.is_sensor());
        let (trigger, other) = if sensor_first { (c1, c2) } else { (c2, c1) };
        Some(RawTrigger {
            trigger_tag: self.tag_of(trigger)?,
            other_tag: self.tag_of(other)?,
            started,
        })
    }
}

/// Backend wrapping rapier3d.
#[derive(Default)]
pub struct RapierBackend {
    worlds: Vec<Option<RapierWorld>>,
}

impl RapierBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn world(&self, id: WorldId) -> Option<&RapierWorld> {
        self.worlds.get(id.0 as usize)?.as_ref()
    }

    fn world_mut(&mut self, id: WorldId) -> Option<&mut RapierWorld> {
        self.worlds.get_mut(id.0 as usize)?.as_mut()
    }
}

fn interaction_groups(filter: &LayerFilter) -> InteractionGroups {
    InteractionGroups::new(
        Group::from_bits_truncate(filter.memberships()),
        Group::from_bits_truncate(filter.mask),
        InteractionTestMode::And,
    )
}

fn build_collider(desc: &ShapeDesc) -> Collider {
    let builder = match desc.geometry {
        ShapeGeometry::Sphere { radius } => ColliderBuilder::ball(radius),
        ShapeGeometry::Cuboid { half_extents } => {
            ColliderBuilder::cuboid(half_extents.x, half_extents.y, half_extents.z)
        }
        ShapeGeometry::CapsuleY {
            radius,
            half_height,
        } => ColliderBuilder::capsule_y(half_height, radius),
    };
    builder
        .translation(desc.offset)
        .sensor(desc.is_trigger)
        .collision_groups(interaction_groups(&desc.filter))
        .active_events(ActiveEvents::COLLISION_EVENTS)
        // Kinematic-vs-fixed and kinematic-vs-kinematic pairs must still
        // produce contact/trigger events for gameplay.
        .active_collision_types(ActiveCollisionTypes::all())
        .friction(desc.friction)
        .restitution(desc.restitution)
        .density(desc.density)
        .user_data(desc.tag as u128)
        .build()
}

/// Build a parry shape usable for sweeps and overlap tests.
fn parry_shape(geometry: &ShapeGeometry) -> Box<dyn Shape> {
    match *geometry {
        ShapeGeometry::Sphere { radius } => Box::new(Ball::new(radius)),
        ShapeGeometry::Cuboid { half_extents } => Box::new(Cuboid::new(half_extents)),
        ShapeGeometry::CapsuleY {
            radius,
            half_height,
        } => Box::new(Capsule::new_y(half_height, radius)),
    }
}

impl PhysicsBackend for RapierBackend {
    fn create_world(&mut self, settings: &WorldSettings) -> Result<WorldId, BackendError> {
        let id = WorldId(self.worlds.len() as u32);
        self.worlds.push(Some(RapierWorld::new(settings)));
        Ok(id)
    }

    fn destroy_world(&mut self, world: WorldId) {
        if let Some(slot) = self.worlds.get_mut(world.0 as usize) {
            *slot = None;
        }
    }

    fn create_body(&mut self, world: WorldId, desc: &BodyDesc) -> Result<BodyId, BackendError> {
        let w = self
            .world_mut(world)
            .ok_or(BackendError::UnknownWorld(world))?;

        let builder = match desc.kind {
            BodyKind::Dynamic => RigidBodyBuilder::dynamic(),
            BodyKind::Kinematic => RigidBodyBuilder::kinematic_position_based(),
            BodyKind::Fixed => RigidBodyBuilder::fixed(),
        };
        let rb = builder
            .pose(desc.pose)
            .linear_damping(desc.linear_damping)
            .gravity_scale(desc.gravity_scale)
            .build();

        let handle = w.bodies.insert(rb);
        let id = BodyId(w.body_handles.len() as u32);
        w.body_handles.push(Some(handle));
        w.body_ids.insert(handle, id);
        Ok(id)
    }

    fn destroy_body(&mut self, world: WorldId, body: BodyId) {
        let Some(w) = self.world_mut(world) else {
            return;
        };
        let Some(slot) = w.body_handles.get_mut(body.0 as usize) else {
            return;
        };
        let Some(handle) = slot.take() else {
            return;
        };
        w.body_ids.remove(&handle);
        // The binding detaches/destroys shapes first; removing any leftovers
        // here keeps the native sets consistent either way.
        w.bodies.remove(
            handle,
            &mut w.islands,
            &mut w.colliders,
            &mut w.impulse_joints,
            &mut w.multibody_joints,
            true,
        );
    }

    fn body_pose(&self, world: WorldId, body: BodyId) -> Option<Iso> {
        Some(*self.world(world)?.body(body)?.position())
    }

    fn set_body_pose(&mut self, world: WorldId, body: BodyId, pose: &Iso) {
        if let Some(rb) = self.world_mut(world).and_then(|w| w.body_mut(body)) {
            rb.set_position(*pose, true);
        }
    }

    fn set_kinematic_target(&mut self, world: WorldId, body: BodyId, pose: &Iso) {
        if let Some(rb) = self.world_mut(world).and_then(|w| w.body_mut(body)) {
            rb.set_next_kinematic_position(*pose);
        }
    }

    fn linear_velocity(&self, world: WorldId, body: BodyId) -> Option<Vec3> {
        Some(*self.world(world)?.body(body)?.linvel())
    }

    fn set_linear_velocity(&mut self, world: WorldId, body: BodyId, velocity: Vec3) {
        if let Some(rb) = self.world_mut(world).and_then(|w| w.body_mut(body)) {
            rb.set_linvel(velocity, true);
        }
    }

    fn apply_force(&mut self, world: WorldId, body: BodyId, force: Vec3) {
        if let Some(rb) = self.world_mut(world).and_then(|w| w.body_mut(body)) {
            rb.add_force(force, true);
        }
    }

    fn apply_impulse(&mut self, world: WorldId, body: BodyId, impulse: Vec3) {
        if let Some(rb) = self.world_mut(world).and_then(|w| w.body_mut(body)) {
            rb.apply_impulse(impulse, true);
        }
    }

    fn create_shape(
        &mut self,
        world: WorldId,
        body: BodyId,
        desc: &ShapeDesc,
    ) -> Result<ShapeId, BackendError> {
        let w = self
            .world_mut(world)
            .ok_or(BackendError::UnknownWorld(world))?;
        let body_handle = w
            .body_handles
            .get(body.0 as usize)
            .copied()
            .flatten()
            .ok_or(BackendError::UnknownBody(body))?;

        let collider = build_collider(desc);
        let handle = w
            .colliders
            .insert_with_parent(collider, body_handle, &mut w.bodies);
        let id = ShapeId(w.shape_handles.len() as u32);
        w.shape_handles.push(Some(handle));
        w.shape_ids.insert(handle, id);
        Ok(id)
    }

    fn destroy_shape(&mut self, world: WorldId, shape: ShapeId) {
        let Some(w) = self.world_mut(world) else {
            return;
        };
        let Some(slot) = w.shape_handles.get_mut(shape.0 as usize) else {
            return;
        };
        let Some(handle) = slot.take() else {
            return;
        };
        w.shape_ids.remove(&handle);
        w.colliders
            .remove(handle, &mut w.islands, &mut w.bodies, true);
    }

    fn reattach_shape(&mut self, world: WorldId, shape: ShapeId, new_body: BodyId) -> bool {
        let Some(w) = self.world_mut(world) else {
            return false;
        };
        let Some(collider) = w.shape_handles.get(shape.0 as usize).copied().flatten() else {
            return false;
        };
        let Some(body) = w.body_handles.get(new_body.0 as usize).copied().flatten() else {
            return false;
        };
        w.colliders.set_parent(collider, Some(body), &mut w.bodies);
        true
    }

    fn shape_tag(&self, world: WorldId, shape: ShapeId) -> Option<u64> {
        let w = self.world(world)?;
        w.tag_of(w.collider_handle(shape)?)
    }

    fn step(&mut self, world: WorldId, dt: f32, events: &mut StepEvents) {
        events.clear();
        let Some(w) = self.world_mut(world) else {
            return;
        };

        w.params.dt = dt;
        w.pipeline.step(
            &w.gravity,
            &w.params,
            &mut w.islands,
            &mut w.broad_phase,
            &mut w.narrow_phase,
            &mut w.bodies,
            &mut w.colliders,
            &mut w.impulse_joints,
            &mut w.multibody_joints,
            &mut w.ccd,
            &(),
            &w.event_handler,
        );

        // Drain the transition events the step produced. Contact points are
        // read from the narrow phase now, while the pair data is fresh.
        let mut started: HashSet<(ColliderHandle, ColliderHandle)> = HashSet::new();
        while let Ok(event) = w.collision_recv.try_recv() {
            match event {
                CollisionEvent::Started(c1, c2, flags) => {
                    if flags.contains(CollisionEventFlags::SENSOR) {
                        if let Some(raw) = w.raw_trigger(c1, c2, true) {
                            events.triggers.push(raw);
                        }
                    } else {
                        started.insert((c1, c2));
                        if let Some(raw) = w.raw_contact(c1, c2, RawContactPhase::Started, true) {
                            events.contacts.push(raw);
                        }
                    }
                }
                CollisionEvent::Stopped(c1, c2, flags) => {
                    if flags.contains(CollisionEventFlags::SENSOR) {
                        if let Some(raw) = w.raw_trigger(c1, c2, false) {
                            events.triggers.push(raw);
                        }
                    } else if let Some(raw) =
                        w.raw_contact(c1, c2, RawContactPhase::Stopped, false)
                    {
                        events.contacts.push(raw);
                    }
                }
            }
        }
        // Contact force events are unused; keep the channel drained.
        while w.force_recv.try_recv().is_ok() {}

        // The channel only reports transitions; pairs still touching from a
        // previous step surface as Persisted.
        let mut persisted = Vec::new();
        for pair in w.narrow_phase.contact_pairs() {
            if !pair.has_any_active_contact {
                continue;
            }
            if started.contains(&(pair.collider1, pair.collider2))
                || started.contains(&(pair.collider2, pair.collider1))
            {
                continue;
            }
            if let Some(raw) =
                w.raw_contact(pair.collider1, pair.collider2, RawContactPhase::Persisted, true)
            {
                persisted.push(raw);
            }
        }
        events.contacts.extend(persisted);

        // Active set: only bodies the solver actually moved this step.
        for handle in w.islands.active_bodies() {
            if let Some(id) = w.body_ids.get(handle) {
                events.active_bodies.push(*id);
            }
        }

        // Forces accumulated by gameplay act for one stepped frame only.
        for (_, rb) in w.bodies.iter_mut() {
            rb.reset_forces(false);
        }
    }

    fn cast_ray(
        &self,
        world: WorldId,
        origin: Vec3,
        dir: Vec3,
        max_dist: f32,
        mask: u32,
    ) -> Option<RawRayHit> {
        let w = self.world(world)?;
        let qp = w.query_pipeline(w.query_filter(mask, None));

        let ray = Ray::new(origin.into(), dir);
        let (handle, hit) = qp.cast_ray_and_get_normal(&ray, max_dist.max(0.0), true)?;
        Some(RawRayHit {
            shape: *w.shape_ids.get(&handle)?,
            tag: w.tag_of(handle)?,
            distance: hit.time_of_impact,
            point: origin + dir * hit.time_of_impact,
            normal: hit.normal,
        })
    }

    fn cast_shape(
        &self,
        world: WorldId,
        geometry: &ShapeGeometry,
        from: Vec3,
        translation: Vec3,
        mask: u32,
        exclude: Option<ShapeId>,
    ) -> Option<RawSweepHit> {
        let w = self.world(world)?;
        let excluded = exclude.and_then(|s| w.collider_handle(s));
        let shape = parry_shape(geometry);
        let pose = Isometry::translation(from.x, from.y, from.z);

        let mut opts = ShapeCastOptions::with_max_time_of_impact(1.0);
        opts.stop_at_penetration = true;

        // Sweep against each matching collider, keeping the earliest hit.
        let mut best: Option<RawSweepHit> = None;
        for (handle, collider) in w.colliders.iter() {
            if Some(handle) == excluded {
                continue;
            }
            let Some(&shape_id) = w.shape_ids.get(&handle) else {
                continue;
            };
            if collider.collision_groups().memberships.bits() & mask == 0 {
                continue;
            }
            let Ok(Some(hit)) = query::cast_shapes(
                &pose,
                &translation,
                shape.as_ref(),
                collider.position(),
                &Vec3::zeros(),
                collider.shape(),
                opts,
            ) else {
                continue;
            };
            if best
                .as_ref()
                .is_none_or(|b| hit.time_of_impact < b.fraction)
            {
                // Normal on the moving shape; ensure it opposes the motion.
                let mut normal = hit.normal1.into_inner();
                if normal.dot(&translation) > 0.0 {
                    normal = -normal;
                }
                best = Some(RawSweepHit {
                    shape: shape_id,
                    tag: collider.user_data as u64,
                    fraction: hit.time_of_impact,
                    normal,
                });
            }
        }
        best
    }

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
    ) -> Option<CharacterMove> {
        let w = self.world(world)?;
        let qp = w.query_pipeline(w.query_filter(mask, exclude));

        let correction = w.character.move_shape(
            dt.max(1.0e-6),
            &qp,
            &Capsule::new_y(half_height, radius),
            &Isometry::translation(position.x, position.y, position.z),
            desired,
            |_| {},
        );

        let applied = correction.translation;
        // Blocked-axis classification from lost motion: cheaper and more
        // robust than interpreting per-collision normals.
        let hit_above = desired.y > 0.0 && applied.y < desired.y - MOVE_BLOCK_EPS;
        let planar_desired = Vec3::new(desired.x, 0.0, desired.z);
        let planar_applied = Vec3::new(applied.x, 0.0, applied.z);
        let hit_sides =
            (planar_desired - planar_applied).norm_squared() > MOVE_BLOCK_EPS * MOVE_BLOCK_EPS;

        Some(CharacterMove {
            translation: applied,
            grounded: correction.grounded,
            hit_above,
            hit_sides,
        })
    }

    fn overlap(
        &self,
        world: WorldId,
        geometry: &ShapeGeometry,
        center: Vec3,
        rotation: Quat,
        mask: u32,
    ) -> Vec<u64> {
        let Some(w) = self.world(world) else {
            return Vec::new();
        };
        let shape = parry_shape(geometry);
        let pose = Isometry::from_parts(
            rapier3d::na::Translation3::new(center.x, center.y, center.z),
            rotation,
        );

        // Narrow-phase intersection test per matching collider.
        let mut tags = Vec::new();
        for (_, collider) in w.colliders.iter() {
            if collider.collision_groups().memberships.bits() & mask == 0 {
                continue;
            }
            if let Ok(true) =
                query::intersection_test(&pose, shape.as_ref(), collider.position(), collider.shape())
            {
                tags.push(collider.user_data as u64);
            }
        }
        tags
    }
}
