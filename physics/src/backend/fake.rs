//! Scripted in-memory backend for unit tests.
//!
//! Bodies integrate trivially (gravity on dynamics, straight-line velocity),
//! which is enough to observe sync-in/sync-out authority. Step events and
//! query results are scripted by the test beforehand.

use std::collections::VecDeque;

use crate::transform::{Iso, Quat, Vec3};

use super::{
    BackendError, BodyDesc, BodyId, BodyKind, CharacterMove, PhysicsBackend, RawRayHit,
    RawSweepHit, ShapeDesc, ShapeGeometry, ShapeId, StepEvents, WorldId, WorldSettings,
};

pub struct FakeBody {
    pub kind: BodyKind,
    pub pose: Iso,
    pub velocity: Vec3,
    pub force: Vec3,
    pub gravity_scale: f32,
    pub alive: bool,
}

pub struct FakeShape {
    pub body: BodyId,
    pub desc: ShapeDesc,
    pub alive: bool,
}

#[derive(Default)]
struct FakeWorld {
    gravity: Vec3,
    bodies: Vec<FakeBody>,
    shapes: Vec<FakeShape>,
    alive: bool,
}

/// Test double: records every mutation, replays scripted step events.
#[derive(Default)]
pub struct FakeBackend {
    worlds: Vec<FakeWorld>,
    /// Events handed out by successive `step` calls, front first.
    pub scripted_steps: VecDeque<StepEvents>,
    pub scripted_ray: Option<RawRayHit>,
    pub scripted_sweep: Option<RawSweepHit>,
    pub scripted_move: Option<CharacterMove>,
    pub scripted_overlap: Vec<u64>,
    pub steps_taken: usize,
    pub last_dt: f32,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_step(&mut self, events: StepEvents) {
        self.scripted_steps.push_back(events);
    }

    pub fn body(&self, world: WorldId, body: BodyId) -> &FakeBody {
        &self.worlds[world.0 as usize].bodies[body.0 as usize]
    }

    pub fn body_mut(&mut self, world: WorldId, body: BodyId) -> &mut FakeBody {
        &mut self.worlds[world.0 as usize].bodies[body.0 as usize]
    }

    pub fn shape(&self, world: WorldId, shape: ShapeId) -> &FakeShape {
        &self.worlds[world.0 as usize].shapes[shape.0 as usize]
    }

    pub fn live_bodies(&self, world: WorldId) -> usize {
        self.worlds[world.0 as usize]
            .bodies
            .iter()
            .filter(|b| b.alive)
            .count()
    }

    pub fn live_shapes(&self, world: WorldId) -> usize {
        self.worlds[world.0 as usize]
            .shapes
            .iter()
            .filter(|s| s.alive)
            .count()
    }

    fn world(&self, id: WorldId) -> Option<&FakeWorld> {
        self.worlds.get(id.0 as usize).filter(|w| w.alive)
    }

    fn world_mut(&mut self, id: WorldId) -> Option<&mut FakeWorld> {
        self.worlds.get_mut(id.0 as usize).filter(|w| w.alive)
    }
}

impl PhysicsBackend for FakeBackend {
    fn create_world(&mut self, settings: &WorldSettings) -> Result<WorldId, BackendError> {
        let id = WorldId(self.worlds.len() as u32);
        self.worlds.push(FakeWorld {
            gravity: settings.gravity,
            alive: true,
            ..FakeWorld::default()
        });
        Ok(id)
    }

    fn destroy_world(&mut self, world: WorldId) {
        if let Some(w) = self.worlds.get_mut(world.0 as usize) {
            w.alive = false;
        }
    }

    fn create_body(&mut self, world: WorldId, desc: &BodyDesc) -> Result<BodyId, BackendError> {
        let w = self
            .world_mut(world)
            .ok_or(BackendError::UnknownWorld(world))?;
        let id = BodyId(w.bodies.len() as u32);
        w.bodies.push(FakeBody {
            kind: desc.kind,
            pose: desc.pose,
            velocity: Vec3::zeros(),
            force: Vec3::zeros(),
            gravity_scale: desc.gravity_scale,
            alive: true,
        });
        Ok(id)
    }

    fn destroy_body(&mut self, world: WorldId, body: BodyId) {
        if let Some(b) = self
            .world_mut(world)
            .and_then(|w| w.bodies.get_mut(body.0 as usize))
        {
            b.alive = false;
        }
    }

    fn body_pose(&self, world: WorldId, body: BodyId) -> Option<Iso> {
        let b = self.world(world)?.bodies.get(body.0 as usize)?;
        b.alive.then_some(b.pose)
    }

    fn set_body_pose(&mut self, world: WorldId, body: BodyId, pose: &Iso) {
        if let Some(b) = self
            .world_mut(world)
            .and_then(|w| w.bodies.get_mut(body.0 as usize))
        {
            b.pose = *pose;
        }
    }

    fn set_kinematic_target(&mut self, world: WorldId, body: BodyId, pose: &Iso) {
        // Good enough for tests: the target is reached instantly.
        self.set_body_pose(world, body, pose);
    }

    fn linear_velocity(&self, world: WorldId, body: BodyId) -> Option<Vec3> {
        let b = self.world(world)?.bodies.get(body.0 as usize)?;
        b.alive.then_some(b.velocity)
    }

    fn set_linear_velocity(&mut self, world: WorldId, body: BodyId, velocity: Vec3) {
        if let Some(b) = self
            .world_mut(world)
            .and_then(|w| w.bodies.get_mut(body.0 as usize))
        {
            b.velocity = velocity;
        }
    }

    fn apply_force(&mut self, world: WorldId, body: BodyId, force: Vec3) {
        if let Some(b) = self
            .world_mut(world)
            .and_then(|w| w.bodies.get_mut(body.0 as usize))
        {
            b.force += force;
        }
    }

    fn apply_impulse(&mut self, world: WorldId, body: BodyId, impulse: Vec3) {
        // Unit mass.
        if let Some(b) = self
            .world_mut(world)
            .and_then(|w| w.bodies.get_mut(body.0 as usize))
        {
            b.velocity += impulse;
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
        if !w.bodies.get(body.0 as usize).is_some_and(|b| b.alive) {
            return Err(BackendError::UnknownBody(body));
        }
        let id = ShapeId(w.shapes.len() as u32);
        w.shapes.push(FakeShape {
            body,
            desc: *desc,
            alive: true,
        });
        Ok(id)
    }

    fn destroy_shape(&mut self, world: WorldId, shape: ShapeId) {
        if let Some(s) = self
            .world_mut(world)
            .and_then(|w| w.shapes.get_mut(shape.0 as usize))
        {
            s.alive = false;
        }
    }

    fn reattach_shape(&mut self, world: WorldId, shape: ShapeId, new_body: BodyId) -> bool {
        let Some(w) = self.world_mut(world) else {
            return false;
        };
        if !w.bodies.get(new_body.0 as usize).is_some_and(|b| b.alive) {
            return false;
        }
        match w.shapes.get_mut(shape.0 as usize) {
            Some(s) if s.alive => {
                s.body = new_body;
                true
            }
            _ => false,
        }
    }

    fn shape_tag(&self, world: WorldId, shape: ShapeId) -> Option<u64> {
        let s = self.world(world)?.shapes.get(shape.0 as usize)?;
        s.alive.then_some(s.desc.tag)
    }

    fn step(&mut self, world: WorldId, dt: f32, events: &mut StepEvents) {
        events.clear();
        self.steps_taken += 1;
        self.last_dt = dt;

        let scripted = self.scripted_steps.pop_front();

        if let Some(w) = self.world_mut(world) {
            let gravity = w.gravity;
            for (index, b) in w.bodies.iter_mut().enumerate() {
                if !b.alive || b.kind != BodyKind::Dynamic {
                    continue;
                }
                b.velocity += (gravity * b.gravity_scale + b.force) * dt;
                b.force = Vec3::zeros();
                let moved = b.velocity * dt;
                b.pose.translation.vector += moved;
                if moved != Vec3::zeros() {
                    events.active_bodies.push(BodyId(index as u32));
                }
            }
        }

        if let Some(s) = scripted {
            events.contacts = s.contacts;
            events.triggers = s.triggers;
            events.active_bodies.extend(s.active_bodies);
        }
    }

    fn cast_ray(
        &self,
        _world: WorldId,
        _origin: Vec3,
        _dir: Vec3,
        _max_dist: f32,
        _mask: u32,
    ) -> Option<RawRayHit> {
        self.scripted_ray
    }

    fn cast_shape(
        &self,
        _world: WorldId,
        _geometry: &ShapeGeometry,
        _from: Vec3,
        _translation: Vec3,
        _mask: u32,
        _exclude: Option<ShapeId>,
    ) -> Option<RawSweepHit> {
        self.scripted_sweep
    }

    fn move_capsule(
        &self,
        _world: WorldId,
        _radius: f32,
        _half_height: f32,
        _position: Vec3,
        desired: Vec3,
        _dt: f32,
        _mask: u32,
        _exclude: Option<ShapeId>,
    ) -> Option<CharacterMove> {
        Some(self.scripted_move.unwrap_or(CharacterMove {
            translation: desired,
            grounded: false,
            hit_above: false,
            hit_sides: false,
        }))
    }

    fn overlap(
        &self,
        _world: WorldId,
        _geometry: &ShapeGeometry,
        _center: Vec3,
        _rotation: Quat,
        _mask: u32,
    ) -> Vec<u64> {
        self.scripted_overlap.clone()
    }
}
