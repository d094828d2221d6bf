/*!
Scene and game-object surface consumed by the physics binding.

The binding does not own scene management; it only needs three things from
it: enumeration of a scene's objects (for late physics initialization), a
stable per-scene key (one native world per scene), and typed component
lookup on an object (a collider finding its sibling rigid body). The types
here are the minimal concrete shape of that contract.

Component lookup is a closed tag enumeration ([`ComponentKind`]) plus typed
projections, not runtime type identification: the set of physics-relevant
components is fixed at compile time.
*/

use crate::components::{CharacterController, Collider, RigidBody};
use crate::registry::{ComponentOf, Handle, Registry};
use crate::transform::Transform;

/// Identifies one scene; keys the per-scene native physics world.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct SceneId(pub u32);

/// Registry owning every live [`GameObject`].
pub type ObjectRegistry = Registry<GameObject>;

/// Closed set of physics-relevant component slots on a game object.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ComponentKind {
    RigidBody,
    Collider,
    CharacterController,
}

/// One live engine entity: a transform plus optional physics components.
///
/// Objects live in the [`ObjectRegistry`]; everything else refers to them by
/// [`Handle`] or [`crate::registry::Ptr`]. The object remembers its own
/// handle so components can stamp it into native user data.
pub struct GameObject {
    name: String,
    handle: Handle,
    pub transform: Transform,
    body: Option<RigidBody>,
    collider: Option<Collider>,
    controller: Option<CharacterController>,
}

impl GameObject {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            // Placeholder until spawned; `Scene::spawn` stamps the real one.
            handle: Handle::dangling(),
            transform: Transform::identity(),
            body: None,
            collider: None,
            controller: None,
        }
    }

    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    pub fn with_body(mut self, body: RigidBody) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_collider(mut self, collider: Collider) -> Self {
        self.collider = Some(collider);
        self
    }

    pub fn with_controller(mut self, controller: CharacterController) -> Self {
        self.controller = Some(controller);
        self
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The handle this object was registered under.
    #[inline]
    pub fn handle(&self) -> Handle {
        self.handle
    }

    pub fn has(&self, kind: ComponentKind) -> bool {
        match kind {
            ComponentKind::RigidBody => self.body.is_some(),
            ComponentKind::Collider => self.collider.is_some(),
            ComponentKind::CharacterController => self.controller.is_some(),
        }
    }

    /// Typed component lookup (sibling lookup goes through this).
    #[inline]
    pub fn component<T: ComponentOf<GameObject>>(&self) -> Option<&T> {
        T::project(self)
    }

    #[inline]
    pub fn component_mut<T: ComponentOf<GameObject>>(&mut self) -> Option<&mut T> {
        T::project_mut(self)
    }

    #[inline]
    pub fn body(&self) -> Option<&RigidBody> {
        self.body.as_ref()
    }

    #[inline]
    pub fn body_mut(&mut self) -> Option<&mut RigidBody> {
        self.body.as_mut()
    }

    #[inline]
    pub fn collider(&self) -> Option<&Collider> {
        self.collider.as_ref()
    }

    #[inline]
    pub fn collider_mut(&mut self) -> Option<&mut Collider> {
        self.collider.as_mut()
    }

    #[inline]
    pub fn controller(&self) -> Option<&CharacterController> {
        self.controller.as_ref()
    }

    #[inline]
    pub fn controller_mut(&mut self) -> Option<&mut CharacterController> {
        self.controller.as_mut()
    }

    /// Attach a rigid body after spawn. Returns the previous one, if any.
    pub fn set_body(&mut self, body: Option<RigidBody>) -> Option<RigidBody> {
        std::mem::replace(&mut self.body, body)
    }
}

impl ComponentOf<GameObject> for GameObject {
    fn project(owner: &GameObject) -> Option<&Self> {
        Some(owner)
    }
    fn project_mut(owner: &mut GameObject) -> Option<&mut Self> {
        Some(owner)
    }
}

impl ComponentOf<GameObject> for RigidBody {
    fn project(owner: &GameObject) -> Option<&Self> {
        owner.body.as_ref()
    }
    fn project_mut(owner: &mut GameObject) -> Option<&mut Self> {
        owner.body.as_mut()
    }
}

impl ComponentOf<GameObject> for Collider {
    fn project(owner: &GameObject) -> Option<&Self> {
        owner.collider.as_ref()
    }
    fn project_mut(owner: &mut GameObject) -> Option<&mut Self> {
        owner.collider.as_mut()
    }
}

impl ComponentOf<GameObject> for CharacterController {
    fn project(owner: &GameObject) -> Option<&Self> {
        owner.controller.as_ref()
    }
    fn project_mut(owner: &mut GameObject) -> Option<&mut Self> {
        owner.controller.as_mut()
    }
}

/// A scene: an identifier plus the handles of the objects living in it.
pub struct Scene {
    id: SceneId,
    objects: Vec<Handle>,
}

impl Scene {
    pub fn new(id: SceneId) -> Self {
        Self {
            id,
            objects: Vec::new(),
        }
    }

    #[inline]
    pub fn id(&self) -> SceneId {
        self.id
    }

    /// Register an object and add it to this scene.
    pub fn spawn(&mut self, registry: &mut ObjectRegistry, mut object: GameObject) -> Handle {
        let handle = registry.register_with(|h| {
            object.handle = h;
            object
        });
        self.objects.push(handle);
        handle
    }

    /// Remove an object from this scene and unregister it.
    ///
    /// Returns the object so callers can run physics teardown on its
    /// components before dropping it.
    pub fn despawn(&mut self, registry: &mut ObjectRegistry, handle: Handle) -> Option<GameObject> {
        if let Some(i) = self.objects.iter().position(|&h| h == handle) {
            self.objects.swap_remove(i);
        }
        registry.unregister(handle)
    }

    /// Enumerate the scene's object handles.
    #[inline]
    pub fn objects(&self) -> &[Handle] {
        &self.objects
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::RigidBody;
    use crate::registry::Ptr;

    #[test]
    fn spawn_stamps_the_object_with_its_own_handle() {
        let mut reg = ObjectRegistry::new();
        let mut scene = Scene::new(SceneId(0));

        let h = scene.spawn(&mut reg, GameObject::new("crate"));
        let obj = reg.get(h).unwrap();
        assert_eq!(obj.handle(), h);
        assert_eq!(obj.name(), "crate");
        assert_eq!(scene.objects(), &[h]);
    }

    #[test]
    fn typed_component_lookup_finds_the_sibling_body() {
        let mut reg = ObjectRegistry::new();
        let mut scene = Scene::new(SceneId(0));

        let h = scene.spawn(
            &mut reg,
            GameObject::new("crate").with_body(RigidBody::dynamic()),
        );

        let obj = reg.get(h).unwrap();
        assert!(obj.has(ComponentKind::RigidBody));
        assert!(!obj.has(ComponentKind::Collider));
        assert!(obj.component::<RigidBody>().is_some());

        let p: Ptr<RigidBody> = Ptr::new(h);
        assert!(p.is_live(&reg));
    }

    #[test]
    fn despawn_removes_from_scene_and_registry() {
        let mut reg = ObjectRegistry::new();
        let mut scene = Scene::new(SceneId(0));

        let h = scene.spawn(&mut reg, GameObject::new("crate"));
        let obj = scene.despawn(&mut reg, h);
        assert!(obj.is_some());
        assert!(scene.objects().is_empty());
        assert!(!reg.contains(h));
    }
}
