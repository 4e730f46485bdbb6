//! Animation trees: the authored asset holding groups and parameters.
//!
//! Every operation that names a group, node, link or parameter fails with
//! [`AnimError::NotFound`] when the name is absent. Adding an entity that
//! already exists by name returns the existing one, so authoring scripts can
//! be re-run. Removals cascade to the links and conditions that reference
//! the removed entity.

use hashbrown::HashMap;
use log::{debug, warn};

use crate::condition::{Condition, ConditionInfo};
use crate::error::AnimError;
use crate::graph::group::{Group, GroupRef};
use crate::graph::link::LinkRef;
use crate::graph::node::{NodeInfo, NodeRef};
use crate::handle::{Keyed, Store};
use crate::ids::Uid;
use crate::library::AnimationLibrary;
use crate::parameter::{Parameter, ParameterInfo};

#[derive(Clone, Debug)]
pub struct AnimationTree {
    pub id: Uid,
    pub name: String,
    /// Group new trackers start in.
    pub entry_group: GroupRef,
    pub groups: Store<Group>,
    parameters: Vec<Parameter>,
    param_index: HashMap<Uid, usize>,
}

impl Keyed for AnimationTree {
    const KIND: &'static str = "tree";

    fn uid(&self) -> Uid {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl AnimationTree {
    pub fn new(name: impl Into<String>) -> Self {
        Self::from_parts(
            Uid::generate(),
            name.into(),
            GroupRef::default(),
            Vec::new(),
            Vec::new(),
        )
    }

    pub(crate) fn from_parts(
        id: Uid,
        name: String,
        entry_group: GroupRef,
        groups: Vec<Group>,
        parameters: Vec<Parameter>,
    ) -> Self {
        let mut store = Store::new(id);
        for group in groups {
            store.insert(group);
        }
        let mut tree = Self {
            id,
            name,
            entry_group,
            groups: store,
            parameters,
            param_index: HashMap::new(),
        };
        tree.rebuild_param_index();
        tree
    }

    #[inline]
    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    /// Array slot of a parameter id, as of the last rebuild.
    #[inline]
    pub fn param_index_of(&self, id: Uid) -> Option<usize> {
        self.param_index.get(&id).copied()
    }

    pub fn group(&self, name: &str) -> Result<&Group, AnimError> {
        self.groups
            .find_by_name(name)
            .ok_or_else(|| AnimError::not_found("group", name))
    }

    pub fn group_mut(&mut self, name: &str) -> Result<&mut Group, AnimError> {
        self.groups
            .find_by_name_mut(name)
            .ok_or_else(|| AnimError::not_found("group", name))
    }

    pub fn entry_group(&self) -> Result<&Group, AnimError> {
        self.entry_group.resolve(&self.groups)
    }

    /// Add a group with its start node playing the empty animation. The
    /// first group added becomes the entry group.
    pub fn add_group(
        &mut self,
        name: &str,
        library: &AnimationLibrary,
    ) -> Result<GroupRef, AnimError> {
        if let Some(existing) = self.groups.find_id(name) {
            warn!("group {name} already exists in tree {}", self.name);
            return Ok(self.groups.handle(existing));
        }
        let id = self
            .groups
            .insert(Group::new(name, self.id, library.empty_ref()));
        let group_ref = self.groups.handle(id);
        if !self.entry_group.valid(&self.groups) {
            self.entry_group = group_ref;
        }
        Ok(group_ref)
    }

    pub fn set_entry_group(&mut self, name: &str) -> Result<(), AnimError> {
        let id = self.group(name)?.id;
        self.entry_group = self.groups.handle(id);
        Ok(())
    }

    pub fn remove_group(&mut self, name: &str) -> Result<Group, AnimError> {
        let id = self.group(name)?.id;
        let removed = self
            .groups
            .remove(id)
            .ok_or_else(|| AnimError::not_found("group", name))?;
        if self.entry_group.id() == id {
            self.entry_group = match self.groups.ids().next() {
                Some(first) => self.groups.handle(first),
                None => GroupRef::default(),
            };
        }
        Ok(removed)
    }

    pub fn add_node(
        &mut self,
        group: &str,
        info: NodeInfo,
        library: &AnimationLibrary,
    ) -> Result<NodeRef, AnimError> {
        let anim = match &info.animation {
            Some(name) => library.handle_by_name(name)?,
            None => library.empty_ref(),
        };
        let tree = self.id;
        let group = self.group_mut(group)?;
        let self_ref = GroupRef::attached(tree, group.id);
        Ok(group.add_node(&info, self_ref, anim))
    }

    pub fn remove_node(&mut self, group: &str, node: &str) -> Result<(), AnimError> {
        self.group_mut(group)?.remove_node(node).map(|_| ())
    }

    pub fn add_link(&mut self, group: &str, src: &str, dst: &str) -> Result<LinkRef, AnimError> {
        self.group_mut(group)?.add_link(src, dst)
    }

    pub fn remove_link(&mut self, group: &str, link: &str) -> Result<(), AnimError> {
        self.group_mut(group)?.remove_link(link).map(|_| ())
    }

    pub fn set_node_animation(
        &mut self,
        group: &str,
        node: &str,
        animation: &str,
        library: &AnimationLibrary,
    ) -> Result<(), AnimError> {
        let anim = library.handle_by_name(animation)?;
        self.group_mut(group)?.node_mut(node)?.anim = anim;
        Ok(())
    }

    pub fn set_start_node(&mut self, group: &str, node: &str) -> Result<(), AnimError> {
        self.group_mut(group)?.set_start_node(node)
    }

    /// Add a parameter, or return the existing one with the same name.
    /// Re-adding under a different type is a type mismatch.
    pub fn add_parameter(&mut self, info: ParameterInfo) -> Result<&Parameter, AnimError> {
        if let Some(index) = self.parameters.iter().position(|p| p.name == info.name) {
            let existing = &self.parameters[index];
            if existing.kind != info.kind {
                return Err(AnimError::type_mismatch(existing.kind, info.kind));
            }
            warn!("parameter {} already exists in tree {}", info.name, self.name);
            return Ok(existing);
        }
        let parameter = Parameter::new(info)?;
        let index = self.parameters.len();
        self.param_index.insert(parameter.id, index);
        self.parameters.push(parameter);
        Ok(&self.parameters[index])
    }

    pub fn parameter(&self, name: &str) -> Result<&Parameter, AnimError> {
        self.parameters
            .iter()
            .find(|p| p.name == name)
            .ok_or_else(|| AnimError::not_found("parameter", name))
    }

    /// Authored default value access; trackers copy parameters at bind.
    pub fn parameter_mut(&mut self, name: &str) -> Result<&mut Parameter, AnimError> {
        self.parameters
            .iter_mut()
            .find(|p| p.name == name)
            .ok_or_else(|| AnimError::not_found("parameter", name))
    }

    pub fn rename_parameter(&mut self, name: &str, new_name: &str) -> Result<(), AnimError> {
        if self.parameters.iter().any(|p| p.name == new_name) {
            return Err(AnimError::invalid_operation(format!(
                "parameter {new_name} already exists in tree {}",
                self.name
            )));
        }
        self.parameter_mut(name)?.name = new_name.to_string();
        Ok(())
    }

    /// Remove a parameter and every condition that reads it.
    pub fn remove_parameter(&mut self, name: &str) -> Result<Parameter, AnimError> {
        let index = self
            .parameters
            .iter()
            .position(|p| p.name == name)
            .ok_or_else(|| AnimError::not_found("parameter", name))?;
        let removed = self.parameters.remove(index);
        for group in self.groups.iter_mut() {
            for link in group.links.iter_mut() {
                link.conditions.retain(|c| c.param_id != removed.id);
            }
        }
        self.rebuild_param_index();
        self.bind_conditions();
        Ok(removed)
    }

    /// Add a condition on the named parameter to a link. The parameter id
    /// and array slot are bound immediately.
    pub fn add_condition(
        &mut self,
        group: &str,
        link: &str,
        info: ConditionInfo,
    ) -> Result<&Condition, AnimError> {
        let index = self
            .parameters
            .iter()
            .position(|p| p.name == info.parameter)
            .ok_or_else(|| AnimError::not_found("parameter", info.parameter.clone()))?;
        let mut condition = Condition::new(&self.parameters[index], info)?;
        condition.bind(Some(index));

        let link = self.group_mut(group)?.link_mut(link)?;
        let at = link.conditions.len();
        link.conditions.push(condition);
        Ok(&link.conditions[at])
    }

    pub fn remove_condition(
        &mut self,
        group: &str,
        link: &str,
        condition: Uid,
    ) -> Result<Condition, AnimError> {
        let link = self.group_mut(group)?.link_mut(link)?;
        let index = link
            .conditions
            .iter()
            .position(|c| c.id == condition)
            .ok_or_else(|| AnimError::not_found("condition", condition.to_string()))?;
        Ok(link.conditions.remove(index))
    }

    pub fn rebuild_param_index(&mut self) {
        self.param_index = self
            .parameters
            .iter()
            .enumerate()
            .map(|(index, p)| (p.id, index))
            .collect();
    }

    /// Point every condition at its parameter's array slot. Returns the
    /// number of conditions whose parameter is missing.
    pub fn bind_conditions(&mut self) -> usize {
        let mut unbound = 0;
        let index = &self.param_index;
        for group in self.groups.iter_mut() {
            for link in group.links.iter_mut() {
                for condition in link.conditions.iter_mut() {
                    let slot = index.get(&condition.param_id).copied();
                    if slot.is_none() {
                        warn!(
                            "condition on link {} reads unknown parameter {}",
                            link.name, condition.param_id
                        );
                        unbound += 1;
                    }
                    condition.bind(slot);
                }
            }
        }
        unbound
    }

    /// Re-attach every group, node and link handle. Returns the number of
    /// handles that did not resolve.
    pub fn reload_references(&mut self) -> usize {
        self.groups.set_owner(self.id);
        let mut dangling = 0;
        if !self.entry_group.reload(&self.groups) {
            match self.groups.ids().next() {
                Some(first) => {
                    debug!("tree {} entry group reset to first group", self.name);
                    self.entry_group = self.groups.handle(first);
                }
                None => self.entry_group = GroupRef::default(),
            }
        }
        for group in self.groups.iter_mut() {
            dangling += group.reload_references(self.id);
        }
        dangling
    }

    /// Re-attach node animation handles to `library`. Returns the number of
    /// nodes whose animation is missing; their handles are left unbound.
    pub fn reload_animations(&mut self, library: &AnimationLibrary) -> usize {
        let mut missing = 0;
        for group in self.groups.iter_mut() {
            for node in group.nodes.iter_mut() {
                if !node.anim.reload(library.store()) {
                    missing += 1;
                }
            }
        }
        missing
    }

    /// Bind pass: parameter slots, node animations and all handles. Nodes
    /// whose animation is missing fall back to the empty animation.
    pub fn bind(&mut self, library: &AnimationLibrary) -> usize {
        self.rebuild_param_index();
        let mut problems = self.bind_conditions();
        for group in self.groups.iter_mut() {
            for node in group.nodes.iter_mut() {
                if !node.anim.reload(library.store()) {
                    warn!(
                        "node {}/{} plays missing animation {}; using the empty animation",
                        group.name,
                        node.name,
                        node.anim.id()
                    );
                    node.anim = library.empty_ref();
                    problems += 1;
                }
            }
        }
        problems + self.reload_references()
    }
}
