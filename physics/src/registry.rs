/*!
Generational object registry and weak references.

Every live game object is registered in a single growable slot table and is
identified by a [`Handle`] (slot index + generation). Unregistering a slot
bumps its generation and queues the index for reuse, so a stale handle can
never resolve to a later occupant of the same slot. [`Ptr`] layers a typed
component projection on top of a handle; a stale `Ptr` degrades to `None`
instead of touching freed memory, which is what makes deferred event
processing (dispatching one frame after the native callback fired) safe.

Handles also pack into a single `u64` so they can ride through the native
engine's opaque per-shape user word and come back out as weak references.
*/

use std::collections::VecDeque;
use std::marker::PhantomData;

/// Identifies one slot in the object registry.
///
/// A handle resolves iff the slot still holds the same generation it was
/// created with and the slot is occupied. Handles are plain data: copying
/// them never extends the referent's lifetime.
///
/// # Bit layout (packed form)
/// - bits 0..=31  : slot index
/// - bits 32..=63 : generation
///
/// Generations start at 1, so a packed value of zero never denotes a live
/// handle. Treat the layout as a storage format: it is written into the
/// native engine's per-shape user data and unpacked in the event feeders.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Handle {
    index: u32,
    generation: u32,
}

impl Handle {
    #[inline]
    pub fn index(&self) -> u32 {
        self.index
    }

    #[inline]
    pub fn generation(&self) -> u32 {
        self.generation
    }

    /// A handle that never resolves. Placeholder for objects that have not
    /// been registered yet.
    pub const fn dangling() -> Self {
        Self {
            index: u32::MAX,
            generation: u32::MAX,
        }
    }

    /// Pack into a single `u64` for storage in an opaque native user word.
    #[inline]
    pub fn to_bits(self) -> u64 {
        (self.index as u64) | ((self.generation as u64) << u32::BITS)
    }

    /// Unpack a handle previously stored with [`Handle::to_bits`].
    ///
    /// Returns `None` for the zero word (no valid handle has generation 0).
    /// A structurally valid handle may still be stale; only resolution
    /// against the registry decides liveness.
    #[inline]
    pub fn from_bits(bits: u64) -> Option<Self> {
        let generation = (bits >> u32::BITS) as u32;
        if generation == 0 {
            return None;
        }
        Some(Self {
            index: bits as u32,
            generation,
        })
    }
}

struct Slot<T> {
    occupant: Option<T>,
    generation: u32,
}

/// Growable generational slot table owning the registered objects.
///
/// - `register` is O(1) amortized: reuses a free index or grows the table.
/// - `unregister` is O(1) and is the only operation that invalidates a
///   handle. The slot's generation is bumped immediately, so every copy of
///   the old handle stops resolving at once.
/// - `get`/`get_mut` are O(1) lookups that return `None` on generation
///   mismatch or a vacant slot.
pub struct Registry<T> {
    slots: Vec<Slot<T>>,
    free: VecDeque<u32>,
    len: usize,
}

impl<T> Default for Registry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Registry<T> {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: VecDeque::new(),
            len: 0,
        }
    }

    /// Register an object, returning its stable handle.
    pub fn register(&mut self, value: T) -> Handle {
        self.register_with(|_| value)
    }

    /// Register an object built from its own handle.
    ///
    /// Useful when the object wants to remember the handle it was assigned
    /// (e.g. so components can hand out weak references to their owner).
    pub fn register_with(&mut self, make: impl FnOnce(Handle) -> T) -> Handle {
        let handle = match self.free.pop_front() {
            Some(index) => Handle {
                index,
                generation: self.slots[index as usize].generation,
            },
            None => {
                // Grow: new slots start at generation 1 so the packed zero
                // word stays reserved.
                self.slots.push(Slot {
                    occupant: None,
                    generation: 1,
                });
                Handle {
                    index: (self.slots.len() - 1) as u32,
                    generation: 1,
                }
            }
        };

        self.slots[handle.index as usize].occupant = Some(make(handle));
        self.len += 1;
        handle
    }

    /// Remove the object behind `handle`, invalidating every copy of it.
    ///
    /// Returns the removed object, or `None` if the handle was already
    /// stale (double unregister is a no-op).
    pub fn unregister(&mut self, handle: Handle) -> Option<T> {
        let slot = self.slots.get_mut(handle.index as usize)?;
        if slot.generation != handle.generation || slot.occupant.is_none() {
            return None;
        }

        let removed = slot.occupant.take();
        // Bump now rather than on reuse: stale handles must stop resolving
        // immediately, not only once the index is recycled.
        slot.generation = slot.generation.wrapping_add(1).max(1);
        self.free.push_back(handle.index);
        self.len -= 1;
        removed
    }

    /// Resolve a handle. `None` on generation mismatch or vacant slot.
    #[inline]
    pub fn get(&self, handle: Handle) -> Option<&T> {
        let slot = self.slots.get(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        slot.occupant.as_ref()
    }

    /// Mutable resolution with the same liveness rules as [`Registry::get`].
    #[inline]
    pub fn get_mut(&mut self, handle: Handle) -> Option<&mut T> {
        let slot = self.slots.get_mut(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        slot.occupant.as_mut()
    }

    #[inline]
    pub fn contains(&self, handle: Handle) -> bool {
        self.get(handle).is_some()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Iterate live entries in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (Handle, &T)> {
        self.slots.iter().enumerate().filter_map(|(i, slot)| {
            let value = slot.occupant.as_ref()?;
            Some((
                Handle {
                    index: i as u32,
                    generation: slot.generation,
                },
                value,
            ))
        })
    }
}

/// Projection from a registered owner object to one of its components.
///
/// This is the closed, tag-style replacement for runtime type identification:
/// the set of projectable component types is fixed at compile time by the
/// impls on the owner.
pub trait ComponentOf<O>: Sized {
    fn project(owner: &O) -> Option<&Self>;
    fn project_mut(owner: &mut O) -> Option<&mut Self>;
}

/// Non-owning, auto-invalidating typed reference to a component of a
/// registered object.
///
/// Resolution goes handle -> registry slot -> component projection; every
/// copy of a `Ptr` becomes dead the moment the referent is unregistered,
/// regardless of how many copies exist. Code that holds a `Ptr` across a
/// frame boundary (the event queues do) must treat `None` as "referent is
/// gone" and skip, never as an error.
pub struct Ptr<T> {
    handle: Handle,
    _marker: PhantomData<fn() -> T>,
}

// Manual impls: derived ones would put unnecessary bounds on `T`.
impl<T> Copy for Ptr<T> {}
impl<T> Clone for Ptr<T> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<T> PartialEq for Ptr<T> {
    fn eq(&self, other: &Self) -> bool {
        self.handle == other.handle
    }
}
impl<T> Eq for Ptr<T> {}
impl<T> std::hash::Hash for Ptr<T> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.handle.hash(state);
    }
}
impl<T> std::fmt::Debug for Ptr<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Ptr").field(&self.handle).finish()
    }
}

impl<T> Ptr<T> {
    #[inline]
    pub fn new(handle: Handle) -> Self {
        Self {
            handle,
            _marker: PhantomData,
        }
    }

    /// The owning object's handle (valid for dispatch even while the typed
    /// projection is what callers usually want).
    #[inline]
    pub fn handle(&self) -> Handle {
        self.handle
    }

    /// Resolve to the component, or `None` once the referent is destroyed.
    #[inline]
    pub fn get<'a, O>(&self, registry: &'a Registry<O>) -> Option<&'a T>
    where
        T: ComponentOf<O>,
    {
        registry.get(self.handle).and_then(T::project)
    }

    #[inline]
    pub fn get_mut<'a, O>(&self, registry: &'a mut Registry<O>) -> Option<&'a mut T>
    where
        T: ComponentOf<O>,
    {
        registry.get_mut(self.handle).and_then(T::project_mut)
    }

    /// Whether the referent (and its projected component) still exists.
    #[inline]
    pub fn is_live<O>(&self, registry: &Registry<O>) -> bool
    where
        T: ComponentOf<O>,
    {
        self.get(registry).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    impl ComponentOf<&'static str> for &'static str {
        fn project<'a>(owner: &'a &'static str) -> Option<&'a Self> {
            Some(owner)
        }
        fn project_mut<'a>(owner: &'a mut &'static str) -> Option<&'a mut Self> {
            Some(owner)
        }
    }

    #[test]
    fn register_then_resolve_round_trips() {
        let mut reg = Registry::new();
        let h = reg.register("alpha");
        assert_eq!(reg.get(h), Some(&"alpha"));
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn unregister_invalidates_every_copy_of_the_handle() {
        let mut reg = Registry::new();
        let h = reg.register("alpha");
        let copy = h;

        assert_eq!(reg.unregister(h), Some("alpha"));
        assert_eq!(reg.get(h), None);
        assert_eq!(reg.get(copy), None);
        // Double unregister is a no-op.
        assert_eq!(reg.unregister(h), None);
    }

    #[test]
    fn slot_reuse_yields_a_different_generation() {
        let mut reg = Registry::new();
        let old = reg.register("alpha");
        reg.unregister(old);

        // The freed index is reused for the next registration.
        let new = reg.register("beta");
        assert_eq!(new.index(), old.index());
        assert_ne!(new.generation(), old.generation());

        // The stale handle must not resolve to the new occupant.
        assert_eq!(reg.get(old), None);
        assert_eq!(reg.get(new), Some(&"beta"));
    }

    #[test]
    fn free_indices_are_reused_fifo() {
        let mut reg = Registry::new();
        let a = reg.register("a");
        let b = reg.register("b");
        reg.unregister(a);
        reg.unregister(b);

        // Oldest freed index comes back first.
        let c = reg.register("c");
        assert_eq!(c.index(), a.index());
    }

    #[test]
    fn handle_bits_round_trip_and_zero_word_is_reserved() {
        let mut reg = Registry::new();
        let h = reg.register("alpha");

        let bits = h.to_bits();
        assert_eq!(Handle::from_bits(bits), Some(h));
        assert_eq!(Handle::from_bits(0), None);
    }

    #[test]
    fn ptr_degrades_to_none_after_destruction() {
        let mut reg = Registry::new();
        let h = reg.register("alpha");
        let p: Ptr<&'static str> = Ptr::new(h);

        assert!(p.is_live(&reg));
        assert_eq!(p.get(&reg), Some(&"alpha"));

        reg.unregister(h);
        assert!(!p.is_live(&reg));
        assert_eq!(p.get(&reg), None);

        // Liveness is permanent even after the slot is reused.
        reg.register("beta");
        assert!(!p.is_live(&reg));
    }

    #[test]
    fn iter_visits_only_live_entries() {
        let mut reg = Registry::new();
        let a = reg.register("a");
        let _b = reg.register("b");
        reg.unregister(a);

        let names: Vec<_> = reg.iter().map(|(_, v)| *v).collect();
        assert_eq!(names, vec!["b"]);
    }
}
