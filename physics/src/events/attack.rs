//! Attack instances: grouping raw contacts into single gameplay hits.
//!
//! One swing of a weapon produces many raw contact events while the shapes
//! stay overlapped, possibly across several frames. An [`AttackInstance`]
//! collapses them: each target counts once, and a consuming reaction (a
//! parry, a block) suppresses every later lower-priority reaction to the
//! same attack.

use std::collections::{HashMap, HashSet};

use crate::registry::Handle;

/// Identifier of one live attack, unique for the lifetime of the pipeline.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct AttackId(u64);

/// One in-flight gameplay attack.
#[derive(Debug)]
pub struct AttackInstance {
    pub id: AttackId,
    /// Object performing the attack; its own shapes never count as targets.
    pub attacker: Handle,
    /// Objects already hit by this attack.
    pub hit: HashSet<Handle>,
    /// Highest priority this attack was consumed at, if any. Events with a
    /// strictly lower priority are suppressed from then on.
    pub consumed_at: Option<i32>,
}

impl AttackInstance {
    pub fn is_consumed_against(&self, priority: i32) -> bool {
        self.consumed_at.is_some_and(|at| at > priority)
    }
}

/// The set of currently live attacks.
///
/// Events referencing an attack that has already ended are dropped; by then
/// the swing is over and its contacts are gameplay noise.
#[derive(Default)]
pub struct AttackBook {
    next_id: u64,
    active: HashMap<AttackId, AttackInstance>,
}

impl AttackBook {
    /// Open a new attack for `attacker`. Gameplay tags the attacker's
    /// colliders with the returned id for the duration of the swing.
    pub fn begin(&mut self, attacker: Handle) -> AttackId {
        let id = AttackId(self.next_id);
        self.next_id += 1;
        self.active.insert(
            id,
            AttackInstance {
                id,
                attacker,
                hit: HashSet::new(),
                consumed_at: None,
            },
        );
        id
    }

    /// Close an attack. Unknown ids are a no-op (ending twice is fine).
    pub fn end(&mut self, id: AttackId) {
        self.active.remove(&id);
    }

    pub fn get(&self, id: AttackId) -> Option<&AttackInstance> {
        self.active.get(&id)
    }

    pub fn get_mut(&mut self, id: AttackId) -> Option<&mut AttackInstance> {
        self.active.get_mut(&id)
    }

    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle(n: u32) -> Handle {
        Handle::from_bits(u64::from(n) | (1u64 << u32::BITS)).unwrap()
    }

    #[test]
    fn begin_end_lifecycle() {
        let mut book = AttackBook::default();
        let a = book.begin(handle(1));
        let b = book.begin(handle(2));
        assert_ne!(a, b);
        assert_eq!(book.len(), 2);

        book.end(a);
        assert!(book.get(a).is_none());
        assert!(book.get(b).is_some());

        // Double-end is harmless.
        book.end(a);
        assert_eq!(book.len(), 1);
    }

    #[test]
    fn consumption_outranks_lower_priorities_only() {
        let mut book = AttackBook::default();
        let id = book.begin(handle(1));
        let attack = book.get_mut(id).unwrap();

        assert!(!attack.is_consumed_against(10));
        attack.consumed_at = Some(100);
        assert!(attack.is_consumed_against(50));
        assert!(!attack.is_consumed_against(100));
        assert!(!attack.is_consumed_against(150));
    }
}
