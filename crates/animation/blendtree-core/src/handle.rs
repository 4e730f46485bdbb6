//! ID-keyed containers and the non-owning handles that point into them.
//!
//! A [`Store`] owns authored entities keyed by [`Uid`] and remembers the id
//! of whatever owns the store (a group owns its nodes and links, a tree its
//! groups, the library its animations). A [`Handle`] is `(owner, id)`: it
//! never borrows the store, so stores can be edited freely while handles
//! exist. Handles must be [`Handle::reload`]ed against their store after
//! structural edits or deserialization before they report valid.

use std::collections::BTreeMap;
use std::fmt;
use std::marker::PhantomData;

use crate::error::AnimError;
use crate::ids::Uid;

/// Authored entity stored in a [`Store`].
pub trait Keyed {
    /// Entity kind used in diagnostics and reference documents.
    const KIND: &'static str;

    fn uid(&self) -> Uid;
    fn name(&self) -> &str;
}

#[derive(Clone, Debug, PartialEq)]
pub struct Store<T> {
    owner: Uid,
    items: BTreeMap<Uid, T>,
}

impl<T> Default for Store<T> {
    fn default() -> Self {
        Self {
            owner: Uid::INVALID,
            items: BTreeMap::new(),
        }
    }
}

impl<T: Keyed> Store<T> {
    pub fn new(owner: Uid) -> Self {
        Self {
            owner,
            items: BTreeMap::new(),
        }
    }

    #[inline]
    pub fn owner(&self) -> Uid {
        self.owner
    }

    pub(crate) fn set_owner(&mut self, owner: Uid) {
        self.owner = owner;
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[inline]
    pub fn contains(&self, id: Uid) -> bool {
        self.items.contains_key(&id)
    }

    #[inline]
    pub fn get(&self, id: Uid) -> Option<&T> {
        self.items.get(&id)
    }

    #[inline]
    pub fn get_mut(&mut self, id: Uid) -> Option<&mut T> {
        self.items.get_mut(&id)
    }

    /// Insert or replace the entity stored under its own id.
    pub fn insert(&mut self, item: T) -> Uid {
        let id = item.uid();
        self.items.insert(id, item);
        id
    }

    pub fn remove(&mut self, id: Uid) -> Option<T> {
        self.items.remove(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.items.values_mut()
    }

    pub fn ids(&self) -> impl Iterator<Item = Uid> + '_ {
        self.items.keys().copied()
    }

    pub fn find_by_name(&self, name: &str) -> Option<&T> {
        self.items.values().find(|item| item.name() == name)
    }

    pub fn find_by_name_mut(&mut self, name: &str) -> Option<&mut T> {
        self.items.values_mut().find(|item| item.name() == name)
    }

    pub fn find_id(&self, name: &str) -> Option<Uid> {
        self.find_by_name(name).map(Keyed::uid)
    }

    /// Bound handle to `id`; valid only if the store holds it.
    pub fn handle(&self, id: Uid) -> Handle<T> {
        let mut handle = Handle::unbound(id);
        handle.reload(self);
        handle
    }
}

/// Non-owning `(owner, id)` reference into a [`Store`].
pub struct Handle<T> {
    owner: Uid,
    id: Uid,
    bound: bool,
    _kind: PhantomData<fn() -> T>,
}

impl<T> Clone for Handle<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Handle<T> {}

impl<T> PartialEq for Handle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.owner == other.owner
    }
}

impl<T> Default for Handle<T> {
    fn default() -> Self {
        Self::unbound(Uid::INVALID)
    }
}

impl<T: Keyed> fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(T::KIND)
            .field("owner", &self.owner)
            .field("id", &self.id)
            .field("bound", &self.bound)
            .finish()
    }
}

impl<T> Handle<T> {
    /// Handle known only by id, as read from a document.
    pub fn unbound(id: Uid) -> Self {
        Self {
            owner: Uid::INVALID,
            id,
            bound: false,
            _kind: PhantomData,
        }
    }

    /// Handle already attached to the store owned by `owner`.
    pub(crate) fn attached(owner: Uid, id: Uid) -> Self {
        Self {
            owner,
            id,
            bound: true,
            _kind: PhantomData,
        }
    }

    #[inline]
    pub fn id(&self) -> Uid {
        self.id
    }

    #[inline]
    pub fn owner(&self) -> Uid {
        self.owner
    }

    #[inline]
    pub fn is_bound(&self) -> bool {
        self.bound
    }
}

impl<T: Keyed> Handle<T> {
    /// True iff the handle was reloaded against this store and the store
    /// still holds the id.
    #[inline]
    pub fn valid(&self, store: &Store<T>) -> bool {
        self.bound && self.owner == store.owner() && store.contains(self.id)
    }

    /// Re-attach to `store` and revalidate. Returns the new validity.
    pub fn reload(&mut self, store: &Store<T>) -> bool {
        self.owner = store.owner();
        self.bound = store.contains(self.id);
        self.bound
    }

    pub fn resolve<'a>(&self, store: &'a Store<T>) -> Result<&'a T, AnimError> {
        if self.valid(store) {
            if let Some(item) = store.get(self.id) {
                return Ok(item);
            }
        }
        Err(AnimError::InvalidReference {
            kind: T::KIND,
            id: self.id,
        })
    }

    pub fn resolve_mut<'a>(&self, store: &'a mut Store<T>) -> Result<&'a mut T, AnimError> {
        if self.valid(store) {
            if let Some(item) = store.get_mut(self.id) {
                return Ok(item);
            }
        }
        Err(AnimError::InvalidReference {
            kind: T::KIND,
            id: self.id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Item {
        id: Uid,
        name: String,
    }

    impl Keyed for Item {
        const KIND: &'static str = "item";
        fn uid(&self) -> Uid {
            self.id
        }
        fn name(&self) -> &str {
            &self.name
        }
    }

    fn mk_item(id: u64, name: &str) -> Item {
        Item {
            id: Uid(id),
            name: name.to_string(),
        }
    }

    #[test]
    fn handle_tracks_container_membership() {
        let mut store = Store::new(Uid(7));
        store.insert(mk_item(1, "a"));
        let handle = store.handle(Uid(1));
        assert!(handle.valid(&store));
        assert_eq!(handle.resolve(&store).unwrap().name, "a");

        store.remove(Uid(1));
        assert!(!handle.valid(&store));
        assert!(matches!(
            handle.resolve(&store),
            Err(AnimError::InvalidReference { kind: "item", .. })
        ));
    }

    #[test]
    fn unbound_handles_need_reload() {
        let mut store = Store::new(Uid(7));
        store.insert(mk_item(3, "c"));
        let mut handle: Handle<Item> = Handle::unbound(Uid(3));
        assert!(!handle.valid(&store));
        assert!(handle.reload(&store));
        assert!(handle.valid(&store));
    }

    #[test]
    fn handle_from_other_owner_is_invalid() {
        let mut first = Store::new(Uid(1));
        let mut second = Store::new(Uid(2));
        first.insert(mk_item(5, "x"));
        second.insert(mk_item(5, "x"));
        let handle = first.handle(Uid(5));
        assert!(handle.valid(&first));
        assert!(!handle.valid(&second));
    }

    #[test]
    fn lookup_by_name() {
        let mut store = Store::new(Uid(1));
        store.insert(mk_item(10, "walk"));
        store.insert(mk_item(11, "run"));
        assert_eq!(store.find_id("run"), Some(Uid(11)));
        assert!(store.find_by_name("jump").is_none());
    }
}
