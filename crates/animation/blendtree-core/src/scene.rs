//! Collaborator interfaces onto the host scene.
//!
//! The runtime never owns entities. It walks hierarchies through
//! [`SceneGraph`], reads and writes typed properties through
//! [`PropertyAccess`] and hands script events to a [`ScriptInvoker`].
//! [`MemoryScene`] is a self-contained implementation for tools and tests.

use hashbrown::{HashMap, HashSet};

use crate::error::AnimError;
use crate::ids::{fnv1a, EntityId};
use crate::keyframe::ScriptFunctionInfo;
use crate::timeline::PropertyDescriptor;
use crate::value::Value;

pub trait SceneGraph {
    /// Direct children of `entity`, in a stable order.
    fn children(&self, entity: EntityId) -> Vec<EntityId>;
}

pub trait PropertyAccess {
    fn has_component(&self, entity: EntityId, component_hash: u64) -> bool;

    fn get_property(&self, entity: EntityId, target: &PropertyDescriptor) -> Option<Value>;

    fn set_property(
        &mut self,
        entity: EntityId,
        target: &PropertyDescriptor,
        value: Value,
    ) -> Result<(), AnimError>;
}

/// Everything the per-frame update needs from the host.
pub trait Scene: SceneGraph + PropertyAccess {}

impl<T: SceneGraph + PropertyAccess> Scene for T {}

pub trait ScriptInvoker {
    fn invoke(&mut self, entity: EntityId, function: &ScriptFunctionInfo);
}

/// Invoker that ignores every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoScripts;

impl ScriptInvoker for NoScripts {
    fn invoke(&mut self, _entity: EntityId, _function: &ScriptFunctionInfo) {}
}

/// Records invocations in order.
#[derive(Debug, Default, Clone)]
pub struct ScriptLog {
    pub calls: Vec<(EntityId, ScriptFunctionInfo)>,
}

impl ScriptInvoker for ScriptLog {
    fn invoke(&mut self, entity: EntityId, function: &ScriptFunctionInfo) {
        self.calls.push((entity, function.clone()));
    }
}

/// Depth-first search for `target` below `root`, returning the child index
/// taken at each level. An empty path means `target == root`.
pub fn resolve_child_path<S: SceneGraph + ?Sized>(
    scene: &S,
    root: EntityId,
    target: EntityId,
) -> Option<Vec<usize>> {
    fn dfs<S: SceneGraph + ?Sized>(
        scene: &S,
        current: EntityId,
        target: EntityId,
        path: &mut Vec<usize>,
    ) -> bool {
        if current == target {
            return true;
        }
        for (index, child) in scene.children(current).into_iter().enumerate() {
            path.push(index);
            if dfs(scene, child, target, path) {
                return true;
            }
            path.pop();
        }
        false
    }

    let mut path = Vec::new();
    dfs(scene, root, target, &mut path).then_some(path)
}

/// Follow a child index path from `root`. None if any step is missing.
pub fn walk_child_path<S: SceneGraph + ?Sized>(
    scene: &S,
    root: EntityId,
    path: &[usize],
) -> Option<EntityId> {
    path.iter().try_fold(root, |entity, &index| {
        scene.children(entity).get(index).copied()
    })
}

/// In-memory scene: parent/child lists, component presence and property
/// values keyed by `(entity, component hash, property)`.
#[derive(Debug, Default, Clone)]
pub struct MemoryScene {
    children: HashMap<EntityId, Vec<EntityId>>,
    components: HashSet<(EntityId, u64)>,
    properties: HashMap<(EntityId, u64, String), Value>,
    next_entity: u64,
}

impl MemoryScene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spawn(&mut self) -> EntityId {
        self.next_entity += 1;
        let entity = EntityId(self.next_entity);
        self.children.insert(entity, Vec::new());
        entity
    }

    pub fn spawn_child(&mut self, parent: EntityId) -> EntityId {
        let child = self.spawn();
        self.children.entry(parent).or_default().push(child);
        child
    }

    /// Remove an entity and its subtree.
    pub fn despawn(&mut self, entity: EntityId) {
        if let Some(children) = self.children.remove(&entity) {
            for child in children {
                self.despawn(child);
            }
        }
        for list in self.children.values_mut() {
            list.retain(|c| *c != entity);
        }
        self.components.retain(|(e, _)| *e != entity);
        self.properties.retain(|(e, _, _), _| *e != entity);
    }

    pub fn add_component(&mut self, entity: EntityId, component: &str) {
        self.components.insert((entity, fnv1a(component)));
    }

    /// Read without a descriptor; convenient for assertions.
    pub fn value(&self, entity: EntityId, component: &str, property: &str) -> Option<&Value> {
        self.properties
            .get(&(entity, fnv1a(component), property.to_string()))
    }
}

impl SceneGraph for MemoryScene {
    fn children(&self, entity: EntityId) -> Vec<EntityId> {
        self.children.get(&entity).cloned().unwrap_or_default()
    }
}

impl PropertyAccess for MemoryScene {
    fn has_component(&self, entity: EntityId, component_hash: u64) -> bool {
        self.components.contains(&(entity, component_hash))
    }

    fn get_property(&self, entity: EntityId, target: &PropertyDescriptor) -> Option<Value> {
        self.properties
            .get(&(entity, target.component_hash(), target.property.clone()))
            .cloned()
    }

    fn set_property(
        &mut self,
        entity: EntityId,
        target: &PropertyDescriptor,
        value: Value,
    ) -> Result<(), AnimError> {
        let hash = target.component_hash();
        if !self.has_component(entity, hash) {
            return Err(AnimError::not_found(
                "component",
                format!("{} on {entity}", target.component),
            ));
        }
        if value.kind() != target.kind {
            return Err(AnimError::type_mismatch(target.kind, value.kind()));
        }
        self.properties
            .insert((entity, hash, target.property.clone()), value);
        Ok(())
    }
}
