//! Queueing, ordering and dispatch of collision and trigger events.
//!
//! Feeders enqueue during the step phase; [`EventPipeline::process`] runs
//! once per frame, strictly after simulation and before gameplay reads
//! collision state. Everything queued is consumed that same frame.

use std::collections::HashSet;
use std::mem;

use log::trace;

use crate::components::Collider;
use crate::registry::{Handle, Ptr};
use crate::scene::ObjectRegistry;

use super::attack::{AttackBook, AttackId};
use super::{
    CollisionEvent, CollisionListener, ContactPhase, ContactPoint, TriggerEvent, TriggerPair,
    PRIORITY_BLOCK,
};

/// A queued solid-contact pair, not yet oriented to either side.
#[derive(Clone, Debug)]
pub struct QueuedCollision {
    pub a: Ptr<Collider>,
    pub b: Ptr<Collider>,
    pub phase: ContactPhase,
    /// Contact points with normals oriented for side `a`.
    pub contacts: Vec<ContactPoint>,
    pub priority: i32,
    pub attack: Option<AttackId>,
}

/// A queued sensor transition.
#[derive(Copy, Clone, Debug)]
pub struct QueuedTrigger {
    pub trigger: Ptr<Collider>,
    pub other: Ptr<Collider>,
    pub entered: bool,
}

/// Order-independent key for a pair of objects.
fn pair_key(a: Handle, b: Handle) -> (u64, u64) {
    let (a, b) = (a.to_bits(), b.to_bits());
    if a <= b { (a, b) } else { (b, a) }
}

/// Per-scene event state: pending queues, persisted trigger pairs, live
/// attacks, and the per-frame colliding set.
#[derive(Default)]
pub struct EventPipeline {
    collision_queue: Vec<QueuedCollision>,
    trigger_queue: Vec<QueuedTrigger>,
    /// Overlapping sensor pairs carried across frames for Stay synthesis.
    trigger_pairs: HashSet<TriggerPair>,
    attacks: AttackBook,
    /// Pairs that collided during the last processed frame.
    colliding_now: HashSet<(u64, u64)>,
}

impl EventPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue_collision(&mut self, event: QueuedCollision) {
        self.collision_queue.push(event);
    }

    pub fn queue_trigger(&mut self, event: QueuedTrigger) {
        self.trigger_queue.push(event);
    }

    pub fn attacks(&self) -> &AttackBook {
        &self.attacks
    }

    /// Open an attack attributed to `attacker`.
    pub fn begin_attack(&mut self, attacker: Handle) -> AttackId {
        self.attacks.begin(attacker)
    }

    pub fn end_attack(&mut self, id: AttackId) {
        self.attacks.end(id);
    }

    /// Whether the two objects were in solid contact last frame.
    pub fn is_colliding(&self, a: Handle, b: Handle) -> bool {
        self.colliding_now.contains(&pair_key(a, b))
    }

    /// Drop every queued or persisted entry referencing `owner`.
    ///
    /// Weak references would make the stale entries inert anyway; purging
    /// eagerly bounds queue growth on churn-heavy scenes.
    pub fn on_collider_destroyed(&mut self, owner: Handle) {
        self.collision_queue
            .retain(|e| e.a.handle() != owner && e.b.handle() != owner);
        self.trigger_queue
            .retain(|e| e.trigger.handle() != owner && e.other.handle() != owner);
        self.trigger_pairs
            .retain(|p| p.trigger != owner && p.other != owner);
        let bits = owner.to_bits();
        self.colliding_now.retain(|&(a, b)| a != bits && b != bits);
    }

    /// Sort, deduplicate and deliver everything queued since the last call.
    ///
    /// Queues are taken up front, so a panicking listener cannot cause
    /// replay of this frame's events on the next one.
    pub fn process(&mut self, objects: &mut ObjectRegistry, listener: &mut dyn CollisionListener) {
        self.colliding_now.clear();

        let mut collisions = mem::take(&mut self.collision_queue);
        // Stable: ties keep arrival order.
        collisions.sort_by(|x, y| y.priority.cmp(&x.priority));
        for event in collisions {
            self.dispatch_collision(objects, listener, event);
        }

        let triggers = mem::take(&mut self.trigger_queue);
        for event in triggers {
            self.dispatch_trigger_transition(objects, listener, event);
        }
        self.dispatch_trigger_stays(objects, listener);
    }

    fn dispatch_collision(
        &mut self,
        objects: &mut ObjectRegistry,
        listener: &mut dyn CollisionListener,
        event: QueuedCollision,
    ) {
        // Either side may have died between the step and now.
        if !event.a.is_live(objects) || !event.b.is_live(objects) {
            return;
        }
        let owner_a = event.a.handle();
        let owner_b = event.b.handle();

        if let Some(attack_id) = event.attack {
            let Some(attack) = self.attacks.get(attack_id) else {
                // The swing ended before its contacts were processed.
                return;
            };
            if attack.is_consumed_against(event.priority) {
                trace!(
                    "collision suppressed: attack {:?} consumed above priority {}",
                    attack_id, event.priority
                );
                return;
            }
            // One hit per target per attack, however many raw contacts the
            // overlap produced.
            if attack.hit.contains(&owner_a) || attack.hit.contains(&owner_b) {
                return;
            }
        }

        if event.phase != ContactPhase::Exit {
            self.colliding_now.insert(pair_key(owner_a, owner_b));
        }

        let forward = CollisionEvent {
            phase: event.phase,
            this_collider: event.a,
            other_collider: event.b,
            contacts: event.contacts.clone(),
            priority: event.priority,
            attack: event.attack,
        };
        listener.on_collision(objects, &forward);

        let reverse = CollisionEvent {
            phase: event.phase,
            this_collider: event.b,
            other_collider: event.a,
            contacts: event.contacts.iter().map(ContactPoint::flipped).collect(),
            priority: event.priority,
            attack: event.attack,
        };
        listener.on_collision(objects, &reverse);

        if let Some(attack) = event.attack.and_then(|id| self.attacks.get_mut(id)) {
            for owner in [owner_a, owner_b] {
                if owner != attack.attacker {
                    attack.hit.insert(owner);
                }
            }
            if event.priority >= PRIORITY_BLOCK {
                let at = attack.consumed_at.map_or(event.priority, |prev| {
                    prev.max(event.priority)
                });
                attack.consumed_at = Some(at);
            }
        }
    }

    fn dispatch_trigger_transition(
        &mut self,
        objects: &mut ObjectRegistry,
        listener: &mut dyn CollisionListener,
        event: QueuedTrigger,
    ) {
        let pair = TriggerPair {
            trigger: event.trigger.handle(),
            other: event.other.handle(),
        };
        let phase = if event.entered {
            self.trigger_pairs.insert(pair);
            ContactPhase::Enter
        } else {
            self.trigger_pairs.remove(&pair);
            ContactPhase::Exit
        };
        if event.trigger.is_live(objects) && event.other.is_live(objects) {
            listener.on_trigger(
                objects,
                &TriggerEvent {
                    phase,
                    trigger: event.trigger,
                    other: event.other,
                },
            );
        }
    }

    /// Walk the whole persisted set: Stay for every pair that still
    /// resolves, pruning the rest. This is where "still overlapping" is
    /// synthesized from an engine that only reports transitions.
    fn dispatch_trigger_stays(
        &mut self,
        objects: &mut ObjectRegistry,
        listener: &mut dyn CollisionListener,
    ) {
        let pairs: Vec<TriggerPair> = self.trigger_pairs.iter().copied().collect();
        for pair in pairs {
            let trigger = Ptr::<Collider>::new(pair.trigger);
            let other = Ptr::<Collider>::new(pair.other);
            if trigger.is_live(objects) && other.is_live(objects) {
                listener.on_trigger(
                    objects,
                    &TriggerEvent {
                        phase: ContactPhase::Stay,
                        trigger,
                        other,
                    },
                );
            } else {
                self.trigger_pairs.remove(&pair);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::Collider;
    use crate::events::PRIORITY_ATTACK;
    use crate::scene::GameObject;
    use crate::transform::Vec3;

    /// Records every delivered event for assertions.
    #[derive(Default)]
    struct Recorder {
        collisions: Vec<(ContactPhase, Handle, Handle, i32)>,
        triggers: Vec<(ContactPhase, Handle, Handle)>,
    }

    impl CollisionListener for Recorder {
        fn on_collision(&mut self, _objects: &mut ObjectRegistry, event: &CollisionEvent) {
            self.collisions.push((
                event.phase,
                event.this_collider.handle(),
                event.other_collider.handle(),
                event.priority,
            ));
        }

        fn on_trigger(&mut self, _objects: &mut ObjectRegistry, event: &TriggerEvent) {
            self.triggers
                .push((event.phase, event.trigger.handle(), event.other.handle()));
        }
    }

    fn spawn_collider(objects: &mut ObjectRegistry, name: &str) -> Ptr<Collider> {
        let handle = objects.register(GameObject::new(name).with_collider(Collider::sphere(0.5)));
        Ptr::new(handle)
    }

    fn queued(
        a: Ptr<Collider>,
        b: Ptr<Collider>,
        priority: i32,
        attack: Option<AttackId>,
    ) -> QueuedCollision {
        QueuedCollision {
            a,
            b,
            phase: ContactPhase::Enter,
            contacts: vec![ContactPoint {
                point: Vec3::zeros(),
                normal: Vec3::new(0.0, 1.0, 0.0),
                separation: -0.01,
            }],
            priority,
            attack,
        }
    }

    #[test]
    fn events_dispatch_in_descending_priority_order() {
        let mut objects = ObjectRegistry::new();
        let a = spawn_collider(&mut objects, "a");
        let b = spawn_collider(&mut objects, "b");
        let c = spawn_collider(&mut objects, "c");

        let mut pipeline = EventPipeline::new();
        pipeline.queue_collision(queued(a, b, 10, None));
        pipeline.queue_collision(queued(b, c, 90, None));
        pipeline.queue_collision(queued(a, c, 50, None));

        let mut rec = Recorder::default();
        pipeline.process(&mut objects, &mut rec);

        // Two dispatches per pair, one per side.
        let priorities: Vec<i32> = rec.collisions.iter().map(|e| e.3).collect();
        assert_eq!(priorities, vec![90, 90, 50, 50, 10, 10]);
    }

    #[test]
    fn ties_keep_arrival_order() {
        let mut objects = ObjectRegistry::new();
        let a = spawn_collider(&mut objects, "a");
        let b = spawn_collider(&mut objects, "b");
        let c = spawn_collider(&mut objects, "c");

        let mut pipeline = EventPipeline::new();
        pipeline.queue_collision(queued(a, b, 50, None));
        pipeline.queue_collision(queued(a, c, 50, None));

        let mut rec = Recorder::default();
        pipeline.process(&mut objects, &mut rec);
        assert_eq!(rec.collisions[0].2, b.handle());
        assert_eq!(rec.collisions[2].2, c.handle());
    }

    #[test]
    fn stale_endpoint_drops_the_event() {
        let mut objects = ObjectRegistry::new();
        let a = spawn_collider(&mut objects, "a");
        let b = spawn_collider(&mut objects, "b");

        let mut pipeline = EventPipeline::new();
        pipeline.queue_collision(queued(a, b, 10, None));
        objects.unregister(b.handle());

        let mut rec = Recorder::default();
        pipeline.process(&mut objects, &mut rec);
        assert!(rec.collisions.is_empty());
    }

    #[test]
    fn attack_hits_each_target_once() {
        let mut objects = ObjectRegistry::new();
        let sword = spawn_collider(&mut objects, "sword");
        let target = spawn_collider(&mut objects, "target");

        let mut pipeline = EventPipeline::new();
        let attack = pipeline.begin_attack(sword.handle());

        // Same pair reported twice in one frame, once more next frame.
        pipeline.queue_collision(queued(sword, target, PRIORITY_ATTACK, Some(attack)));
        pipeline.queue_collision(queued(sword, target, PRIORITY_ATTACK, Some(attack)));
        let mut rec = Recorder::default();
        pipeline.process(&mut objects, &mut rec);
        assert_eq!(rec.collisions.len(), 2);

        pipeline.queue_collision(queued(sword, target, PRIORITY_ATTACK, Some(attack)));
        let mut rec = Recorder::default();
        pipeline.process(&mut objects, &mut rec);
        assert!(rec.collisions.is_empty());

        let hits = &pipeline.attacks().get(attack).unwrap().hit;
        assert_eq!(hits.len(), 1);
        assert!(hits.contains(&target.handle()));
    }

    #[test]
    fn attack_can_still_hit_other_targets_after_first() {
        let mut objects = ObjectRegistry::new();
        let sword = spawn_collider(&mut objects, "sword");
        let first = spawn_collider(&mut objects, "first");
        let second = spawn_collider(&mut objects, "second");

        let mut pipeline = EventPipeline::new();
        let attack = pipeline.begin_attack(sword.handle());
        pipeline.queue_collision(queued(sword, first, PRIORITY_ATTACK, Some(attack)));
        pipeline.queue_collision(queued(sword, second, PRIORITY_ATTACK, Some(attack)));

        let mut rec = Recorder::default();
        pipeline.process(&mut objects, &mut rec);
        assert_eq!(rec.collisions.len(), 4);
        assert_eq!(pipeline.attacks().get(attack).unwrap().hit.len(), 2);
    }

    #[test]
    fn consumed_attack_suppresses_lower_priority_events() {
        let mut objects = ObjectRegistry::new();
        let sword = spawn_collider(&mut objects, "sword");
        let shield = spawn_collider(&mut objects, "shield");
        let body = spawn_collider(&mut objects, "body");

        let mut pipeline = EventPipeline::new();
        let attack = pipeline.begin_attack(sword.handle());

        // The parry outranks the plain hit; sorting puts it first, and its
        // consumption suppresses the hit in the same pass.
        pipeline.queue_collision(queued(sword, body, PRIORITY_ATTACK, Some(attack)));
        pipeline.queue_collision(queued(sword, shield, PRIORITY_BLOCK, Some(attack)));

        let mut rec = Recorder::default();
        pipeline.process(&mut objects, &mut rec);

        let partners: Vec<Handle> = rec.collisions.iter().map(|e| e.2).collect();
        assert!(partners.contains(&shield.handle()));
        assert!(!partners.contains(&body.handle()));

        // And on a later frame too.
        pipeline.queue_collision(queued(sword, body, PRIORITY_ATTACK, Some(attack)));
        let mut rec = Recorder::default();
        pipeline.process(&mut objects, &mut rec);
        assert!(rec.collisions.is_empty());
    }

    #[test]
    fn ended_attack_drops_pending_events() {
        let mut objects = ObjectRegistry::new();
        let sword = spawn_collider(&mut objects, "sword");
        let target = spawn_collider(&mut objects, "target");

        let mut pipeline = EventPipeline::new();
        let attack = pipeline.begin_attack(sword.handle());
        pipeline.queue_collision(queued(sword, target, PRIORITY_ATTACK, Some(attack)));
        pipeline.end_attack(attack);

        let mut rec = Recorder::default();
        pipeline.process(&mut objects, &mut rec);
        assert!(rec.collisions.is_empty());
    }

    #[test]
    fn trigger_stay_synthesized_until_exit() {
        let mut objects = ObjectRegistry::new();
        let zone = spawn_collider(&mut objects, "zone");
        let player = spawn_collider(&mut objects, "player");

        let mut pipeline = EventPipeline::new();
        pipeline.queue_trigger(QueuedTrigger {
            trigger: zone,
            other: player,
            entered: true,
        });
        let mut rec = Recorder::default();
        pipeline.process(&mut objects, &mut rec);
        assert_eq!(rec.triggers[0].0, ContactPhase::Enter);

        // Three quiet frames: one Stay each.
        for _ in 0..3 {
            let mut rec = Recorder::default();
            pipeline.process(&mut objects, &mut rec);
            assert_eq!(rec.triggers.len(), 1);
            assert_eq!(rec.triggers[0].0, ContactPhase::Stay);
        }

        pipeline.queue_trigger(QueuedTrigger {
            trigger: zone,
            other: player,
            entered: false,
        });
        let mut rec = Recorder::default();
        pipeline.process(&mut objects, &mut rec);
        assert_eq!(rec.triggers[0].0, ContactPhase::Exit);

        // Pair removed; no more Stay.
        let mut rec = Recorder::default();
        pipeline.process(&mut objects, &mut rec);
        assert!(rec.triggers.is_empty());
    }

    #[test]
    fn dead_pair_is_pruned_instead_of_staying() {
        let mut objects = ObjectRegistry::new();
        let zone = spawn_collider(&mut objects, "zone");
        let player = spawn_collider(&mut objects, "player");

        let mut pipeline = EventPipeline::new();
        pipeline.queue_trigger(QueuedTrigger {
            trigger: zone,
            other: player,
            entered: true,
        });
        let mut rec = Recorder::default();
        pipeline.process(&mut objects, &mut rec);

        objects.unregister(player.handle());
        let mut rec = Recorder::default();
        pipeline.process(&mut objects, &mut rec);
        assert!(rec.triggers.is_empty());

        // Pruned: even if the object slot is reused, nothing resumes.
        spawn_collider(&mut objects, "replacement");
        let mut rec = Recorder::default();
        pipeline.process(&mut objects, &mut rec);
        assert!(rec.triggers.is_empty());
    }

    #[test]
    fn destroyed_collider_is_purged_from_queues_and_pairs() {
        let mut objects = ObjectRegistry::new();
        let zone = spawn_collider(&mut objects, "zone");
        let player = spawn_collider(&mut objects, "player");
        let wall = spawn_collider(&mut objects, "wall");

        let mut pipeline = EventPipeline::new();
        pipeline.queue_trigger(QueuedTrigger {
            trigger: zone,
            other: player,
            entered: true,
        });
        let mut rec = Recorder::default();
        pipeline.process(&mut objects, &mut rec);

        pipeline.queue_collision(queued(player, wall, 10, None));
        pipeline.on_collider_destroyed(player.handle());

        let mut rec = Recorder::default();
        pipeline.process(&mut objects, &mut rec);
        assert!(rec.collisions.is_empty());
        assert!(rec.triggers.is_empty());
    }

    #[test]
    fn colliding_now_reflects_last_processed_frame() {
        let mut objects = ObjectRegistry::new();
        let a = spawn_collider(&mut objects, "a");
        let b = spawn_collider(&mut objects, "b");

        let mut pipeline = EventPipeline::new();
        pipeline.queue_collision(queued(a, b, 10, None));
        let mut rec = Recorder::default();
        pipeline.process(&mut objects, &mut rec);
        assert!(pipeline.is_colliding(a.handle(), b.handle()));
        assert!(pipeline.is_colliding(b.handle(), a.handle()));

        pipeline.process(&mut objects, &mut rec);
        assert!(!pipeline.is_colliding(a.handle(), b.handle()));
    }
}
