//! Asset tables for animations and trees, resolvable by name or id.

use std::collections::BTreeSet;

use hashbrown::HashMap;
use log::{debug, warn};

use crate::animation::{AnimRef, Animation};
use crate::error::AnimError;
use crate::graph::AnimationTree;
use crate::handle::{Keyed, Store};
use crate::ids::Uid;

pub const EMPTY_ANIMATION_NAME: &str = "empty animation";

/// Name-indexed store with modified-set tracking, shared by both tables.
#[derive(Clone, Debug)]
struct Catalog<T> {
    store: Store<T>,
    names: HashMap<String, Uid>,
    modified: BTreeSet<String>,
}

impl<T: Keyed> Catalog<T> {
    fn new() -> Self {
        Self {
            store: Store::new(Uid::generate()),
            names: HashMap::new(),
            modified: BTreeSet::new(),
        }
    }

    /// Insert, replacing any entry with the same name or the same id.
    /// Returns the id.
    fn insert(&mut self, item: T) -> Uid {
        let name = item.name().to_string();
        if let Some(old) = self.names.get(&name).copied() {
            if old != item.uid() {
                debug!("replacing {} {name} ({old})", T::KIND);
                self.store.remove(old);
            }
        }
        let shadowed = self
            .store
            .get(item.uid())
            .map(|existing| existing.name().to_string())
            .filter(|existing| *existing != name);
        if let Some(shadowed) = shadowed {
            warn!(
                "{} {name} reuses id {} of {shadowed}; {shadowed} is replaced",
                T::KIND,
                item.uid()
            );
            self.names.remove(&shadowed);
            self.modified.remove(&shadowed);
        }
        let id = self.store.insert(item);
        self.names.insert(name.clone(), id);
        self.modified.insert(name);
        id
    }

    fn id_of(&self, name: &str) -> Result<Uid, AnimError> {
        self.names
            .get(name)
            .copied()
            .ok_or_else(|| AnimError::not_found(T::KIND, name))
    }

    fn get(&self, name: &str) -> Result<&T, AnimError> {
        let id = self.id_of(name)?;
        self.store
            .get(id)
            .ok_or_else(|| AnimError::not_found(T::KIND, name))
    }

    fn get_mut(&mut self, name: &str) -> Result<&mut T, AnimError> {
        let id = self.id_of(name)?;
        self.modified.insert(name.to_string());
        self.store
            .get_mut(id)
            .ok_or_else(|| AnimError::not_found(T::KIND, name))
    }

    fn remove(&mut self, name: &str) -> Result<T, AnimError> {
        let id = self.id_of(name)?;
        self.names.remove(name);
        self.modified.remove(name);
        self.store
            .remove(id)
            .ok_or_else(|| AnimError::not_found(T::KIND, name))
    }

    fn take_modified(&mut self) -> Vec<String> {
        std::mem::take(&mut self.modified).into_iter().collect()
    }

    fn clear_modified(&mut self, name: &str) {
        self.modified.remove(name);
    }
}

/// All animations known to the system. The empty animation is always
/// present under [`Uid::EMPTY_ANIMATION`].
#[derive(Clone, Debug)]
pub struct AnimationLibrary {
    catalog: Catalog<Animation>,
    empty_name: String,
}

impl Default for AnimationLibrary {
    fn default() -> Self {
        Self::new(EMPTY_ANIMATION_NAME)
    }
}

impl AnimationLibrary {
    pub fn new(empty_name: &str) -> Self {
        let mut catalog = Catalog::new();
        catalog.insert(Animation::with_id(Uid::EMPTY_ANIMATION, empty_name));
        catalog.modified.clear();
        Self {
            catalog,
            empty_name: empty_name.to_string(),
        }
    }

    #[inline]
    pub fn store(&self) -> &Store<Animation> {
        &self.catalog.store
    }

    pub fn empty_ref(&self) -> AnimRef {
        self.catalog.store.handle(Uid::EMPTY_ANIMATION)
    }

    #[inline]
    pub fn empty_name(&self) -> &str {
        &self.empty_name
    }

    /// Add an animation, replacing any animation with the same name.
    pub fn insert(&mut self, mut animation: Animation) -> AnimRef {
        if animation.id == Uid::EMPTY_ANIMATION && animation.name != self.empty_name {
            warn!(
                "animation {} uses the reserved empty id; assigning a fresh one",
                animation.name
            );
            animation.id = Uid::generate();
        }
        let id = self.catalog.insert(animation);
        self.catalog.store.handle(id)
    }

    /// Create an empty animation under `name`.
    pub fn create(&mut self, name: &str) -> AnimRef {
        self.insert(Animation::new(name))
    }

    pub fn get(&self, id: Uid) -> Option<&Animation> {
        self.catalog.store.get(id)
    }

    pub fn get_by_name(&self, name: &str) -> Result<&Animation, AnimError> {
        self.catalog.get(name)
    }

    /// Mutable access; marks the animation modified.
    pub fn get_mut_by_name(&mut self, name: &str) -> Result<&mut Animation, AnimError> {
        self.catalog.get_mut(name)
    }

    pub fn handle_by_name(&self, name: &str) -> Result<AnimRef, AnimError> {
        let id = self.catalog.id_of(name)?;
        Ok(self.catalog.store.handle(id))
    }

    pub fn remove(&mut self, name: &str) -> Result<Animation, AnimError> {
        if name == self.empty_name {
            return Err(AnimError::invalid_operation(
                "the empty animation cannot be removed",
            ));
        }
        self.catalog.remove(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Animation> {
        self.catalog.store.iter()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.catalog.store.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.catalog.store.is_empty()
    }

    pub fn recalculate_lengths(&mut self) {
        for animation in self.catalog.store.iter_mut() {
            animation.recalculate_length();
        }
    }

    pub fn mark_modified(&mut self, name: &str) {
        self.catalog.modified.insert(name.to_string());
    }

    pub fn is_modified(&self, name: &str) -> bool {
        self.catalog.modified.contains(name)
    }

    /// Drain the names modified since the last call, sorted.
    pub fn take_modified(&mut self) -> Vec<String> {
        self.catalog.take_modified()
    }

    /// Mark an animation as in sync with its persisted document.
    pub fn clear_modified(&mut self, name: &str) {
        self.catalog.clear_modified(name);
    }
}

/// All trees known to the system.
#[derive(Clone, Debug)]
pub struct TreeLibrary {
    catalog: Catalog<AnimationTree>,
}

impl Default for TreeLibrary {
    fn default() -> Self {
        Self {
            catalog: Catalog::new(),
        }
    }
}

impl TreeLibrary {
    /// Add a tree, replacing any tree with the same name.
    pub fn insert(&mut self, tree: AnimationTree) -> Uid {
        self.catalog.insert(tree)
    }

    /// Create an empty tree under `name`, or return the existing one.
    pub fn create(&mut self, name: &str) -> Result<&mut AnimationTree, AnimError> {
        if self.catalog.id_of(name).is_err() {
            self.catalog.insert(AnimationTree::new(name));
        }
        self.catalog.get_mut(name)
    }

    pub fn get(&self, id: Uid) -> Option<&AnimationTree> {
        self.catalog.store.get(id)
    }

    pub fn get_by_name(&self, name: &str) -> Result<&AnimationTree, AnimError> {
        self.catalog.get(name)
    }

    /// Mutable access; marks the tree modified.
    pub fn get_mut_by_name(&mut self, name: &str) -> Result<&mut AnimationTree, AnimError> {
        self.catalog.get_mut(name)
    }

    pub fn id_of(&self, name: &str) -> Result<Uid, AnimError> {
        self.catalog.id_of(name)
    }

    pub fn remove(&mut self, name: &str) -> Result<AnimationTree, AnimError> {
        self.catalog.remove(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &AnimationTree> {
        self.catalog.store.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut AnimationTree> {
        self.catalog.store.iter_mut()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.catalog.store.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.catalog.store.is_empty()
    }

    pub fn mark_modified(&mut self, name: &str) {
        self.catalog.modified.insert(name.to_string());
    }

    pub fn take_modified(&mut self) -> Vec<String> {
        self.catalog.take_modified()
    }

    pub fn clear_modified(&mut self, name: &str) {
        self.catalog.clear_modified(name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_animation_is_always_present() {
        let mut library = AnimationLibrary::default();
        assert!(library.empty_ref().valid(library.store()));
        assert_eq!(library.get(Uid::EMPTY_ANIMATION).unwrap().name, EMPTY_ANIMATION_NAME);
        assert!(library.remove(EMPTY_ANIMATION_NAME).is_err());
        assert!(library.take_modified().is_empty());
    }

    #[test]
    fn insert_replaces_by_name() {
        let mut library = AnimationLibrary::default();
        let first = library.create("walk");
        let second = library.insert(Animation::new("walk").looping(true));
        assert_ne!(first.id(), second.id());
        assert!(!first.valid(library.store()));
        assert!(library.get_by_name("walk").unwrap().looping);
        assert_eq!(library.len(), 2);
    }

    /// it should forget the old name when another animation reuses its id
    #[test]
    fn insert_with_shared_id_drops_the_old_name() {
        let mut library = AnimationLibrary::default();
        let old = library.create("old");
        let mut copy = Animation::new("new");
        copy.id = old.id();
        library.insert(copy);

        assert!(matches!(
            library.get_by_name("old"),
            Err(AnimError::NotFound { .. })
        ));
        assert_eq!(library.get_by_name("new").unwrap().id, old.id());
        assert_eq!(library.len(), 2);
        assert_eq!(library.take_modified(), vec!["new".to_string()]);

        assert!(library.remove("old").is_err());
        library.remove("new").unwrap();
        assert_eq!(library.len(), 1);
    }

    /// it should forget the old name when another tree reuses its id
    #[test]
    fn tree_insert_with_shared_id_drops_the_old_name() {
        let mut trees = TreeLibrary::default();
        let id = trees.create("hero").unwrap().id;
        let mut copy = AnimationTree::new("hero copy");
        copy.id = id;
        trees.insert(copy);
        assert!(trees.get_by_name("hero").is_err());
        assert_eq!(trees.get_by_name("hero copy").unwrap().id, id);
        assert_eq!(trees.len(), 1);
    }

    #[test]
    fn modified_set_drains_sorted() {
        let mut library = AnimationLibrary::default();
        library.create("b");
        library.create("a");
        assert_eq!(library.take_modified(), vec!["a".to_string(), "b".to_string()]);
        assert!(library.take_modified().is_empty());
        library.get_mut_by_name("a").unwrap().looping = true;
        assert!(library.is_modified("a"));
    }

    #[test]
    fn tree_create_is_idempotent() {
        let mut trees = TreeLibrary::default();
        let id = trees.create("hero").unwrap().id;
        assert_eq!(trees.create("hero").unwrap().id, id);
        assert_eq!(trees.len(), 1);
        assert!(trees.get_by_name("villain").is_err());
    }
}
