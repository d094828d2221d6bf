/*!
Collision layer filtering.

Every shape carries a 32-bit `{layer index, collision mask}` pair. The layer
index selects the single membership bit of the shape; the mask lists the
layers the shape is willing to collide with. The world binding translates the
pair into the native engine's two interaction-group words, and scene queries
take a plain mask that is matched against shape memberships.

Gameplay declares its layers once with [`define_layers!`] and builds filters
from the named variants instead of hand-writing shifts.
*/

use num_traits::{One, PrimInt};

/// Number of usable layer indices (one membership bit each).
pub const LAYER_COUNT: u8 = 32;

/// A named collision layer backed by one bit of `Bits`.
///
/// Implemented through [`define_layers!`]; the enum discriminant is the bit
/// index, so a layer set fits any primitive width with enough bits.
pub trait NamedLayer: Copy {
    type Bits: PrimInt;

    fn index(self) -> u8;

    fn bit(self) -> Self::Bits {
        Self::Bits::one() << usize::from(self.index())
    }
}

/// A set of named layers, the collides-with half of a filter.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct LayerMask<T: PrimInt> {
    pub bits: T,
}

impl<T: PrimInt> LayerMask<T> {
    pub fn none() -> Self {
        Self { bits: T::zero() }
    }

    pub fn all() -> Self {
        Self { bits: !T::zero() }
    }

    /// The union of the given layers' bits.
    pub fn of<L: NamedLayer<Bits = T>>(layers: &[L]) -> Self {
        Self {
            bits: layers.iter().fold(T::zero(), |acc, l| acc | l.bit()),
        }
    }

    pub fn with<L: NamedLayer<Bits = T>>(mut self, layer: L) -> Self {
        self.bits = self.bits | layer.bit();
        self
    }

    pub fn contains<L: NamedLayer<Bits = T>>(&self, layer: L) -> bool {
        self.bits & layer.bit() != T::zero()
    }
}

/// Declare a layer enum and implement [`NamedLayer`] for it.
///
/// Example:
/// ```rust
/// use physics::define_layers;
/// define_layers!(Layer, u32, {
///     Default,
///     WorldStatic,
///     Player,
///     Enemy,
///     Projectile,
/// });
/// ```
#[macro_export]
macro_rules! define_layers {
    ($name:ident, $bits:ty, { $($variant:ident),* $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        #[repr(u8)]
        pub enum $name {
            $($variant),*
        }

        impl $crate::layers::NamedLayer for $name {
            type Bits = $bits;

            fn index(self) -> u8 {
                self as u8
            }
        }
    };
}

/// Per-shape filter: the shape's own layer plus the set of layers it
/// collides with.
///
/// Translated to the native engine as two interaction-group words:
/// memberships = `1 << layer`, filter = `mask`. Two shapes generate contacts
/// iff each one's memberships intersect the other's mask.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct LayerFilter {
    /// Layer index of the shape itself (0..[`LAYER_COUNT`]).
    pub layer: u8,
    /// Mask of layer bits this shape interacts with.
    pub mask: u32,
}

impl Default for LayerFilter {
    fn default() -> Self {
        // Layer 0, collides with everything.
        Self {
            layer: 0,
            mask: u32::MAX,
        }
    }
}

impl LayerFilter {
    pub fn new(layer: u8, mask: u32) -> Self {
        debug_assert!(layer < LAYER_COUNT, "layer index out of range");
        Self { layer, mask }
    }

    /// Build a filter from a named layer and the set it collides with.
    pub fn from_layers<L: NamedLayer<Bits = u32>>(layer: L, collides_with: LayerMask<u32>) -> Self {
        Self::new(layer.index(), collides_with.bits)
    }

    /// The single membership bit of this shape.
    #[inline]
    pub fn memberships(&self) -> u32 {
        1u32 << (self.layer as u32 % LAYER_COUNT as u32)
    }

    /// Symmetric interaction test, matching the native filtering rule.
    #[inline]
    pub fn interacts_with(&self, other: &LayerFilter) -> bool {
        (self.memberships() & other.mask) != 0 && (other.memberships() & self.mask) != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    define_layers!(TestLayer, u32, {
        Default,
        WorldStatic,
        Player,
        Enemy,
    });

    #[test]
    fn layer_masks_compose_from_named_bits() {
        let mask = LayerMask::of(&[TestLayer::Player, TestLayer::Enemy]);

        assert!(mask.contains(TestLayer::Player));
        assert!(!mask.contains(TestLayer::WorldStatic));
        assert_eq!(mask.bits, (1 << 2) | (1 << 3));
    }

    #[test]
    fn filters_built_from_named_layers_match_hand_written_bits() {
        let f = LayerFilter::from_layers(
            TestLayer::Player,
            LayerMask::none().with(TestLayer::WorldStatic),
        );
        assert_eq!(f, LayerFilter::new(2, 1 << 1));
        assert_eq!(f.memberships(), 1 << 2);
    }

    #[test]
    fn filter_interaction_is_symmetric_and_respects_both_masks() {
        // Player collides with world, world collides with everything.
        let player =
            LayerFilter::from_layers(TestLayer::Player, LayerMask::of(&[TestLayer::WorldStatic]));
        let world = LayerFilter::from_layers(TestLayer::WorldStatic, LayerMask::all());
        // Enemy ignores players entirely.
        let enemy =
            LayerFilter::from_layers(TestLayer::Enemy, LayerMask::of(&[TestLayer::WorldStatic]));

        assert!(player.interacts_with(&world));
        assert!(world.interacts_with(&player));
        assert!(!player.interacts_with(&enemy));
    }
}
