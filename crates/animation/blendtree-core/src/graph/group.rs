//! Groups: named subgraphs with a designated start node.

use log::warn;

use crate::animation::AnimRef;
use crate::error::AnimError;
use crate::graph::link::{link_name, Link, LinkRef};
use crate::graph::node::{Node, NodeInfo, NodeRef, START_NODE_NAME};
use crate::handle::{Handle, Keyed, Store};
use crate::ids::Uid;

pub type GroupRef = Handle<Group>;

#[derive(Clone, Debug, PartialEq)]
pub struct Group {
    pub id: Uid,
    pub name: String,
    pub start_node: NodeRef,
    pub nodes: Store<Node>,
    pub links: Store<Link>,
}

impl Keyed for Group {
    const KIND: &'static str = "group";

    fn uid(&self) -> Uid {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl Group {
    /// New group holding only its start node, which plays `empty`.
    pub(crate) fn new(name: impl Into<String>, tree: Uid, empty: AnimRef) -> Self {
        let id = Uid::generate();
        let mut group = Self {
            id,
            name: name.into(),
            start_node: NodeRef::default(),
            nodes: Store::new(id),
            links: Store::new(id),
        };
        let self_ref = GroupRef::attached(tree, id);
        group.start_node = group.add_node(&NodeInfo::new(START_NODE_NAME), self_ref, empty);
        group
    }

    pub(crate) fn from_parts(id: Uid, name: String, start_node: NodeRef) -> Self {
        Self {
            id,
            name,
            start_node,
            nodes: Store::new(id),
            links: Store::new(id),
        }
    }

    pub fn node(&self, name: &str) -> Result<&Node, AnimError> {
        self.nodes
            .find_by_name(name)
            .ok_or_else(|| AnimError::not_found("node", format!("{}/{name}", self.name)))
    }

    pub fn node_mut(&mut self, name: &str) -> Result<&mut Node, AnimError> {
        let group = &self.name;
        self.nodes
            .find_by_name_mut(name)
            .ok_or_else(|| AnimError::not_found("node", format!("{group}/{name}")))
    }

    pub fn node_ref(&self, name: &str) -> Result<NodeRef, AnimError> {
        self.node(name).map(|n| self.nodes.handle(n.id))
    }

    pub fn start_node(&self) -> Result<&Node, AnimError> {
        self.start_node.resolve(&self.nodes)
    }

    pub fn link(&self, name: &str) -> Result<&Link, AnimError> {
        self.links
            .find_by_name(name)
            .ok_or_else(|| AnimError::not_found("link", format!("{}/{name}", self.name)))
    }

    pub fn link_mut(&mut self, name: &str) -> Result<&mut Link, AnimError> {
        let group = &self.name;
        self.links
            .find_by_name_mut(name)
            .ok_or_else(|| AnimError::not_found("link", format!("{group}/{name}")))
    }

    /// Add a node, or return the existing one with the same name.
    pub(crate) fn add_node(&mut self, info: &NodeInfo, self_ref: GroupRef, anim: AnimRef) -> NodeRef {
        if let Some(existing) = self.nodes.find_id(&info.name) {
            warn!("node {} already exists in group {}", info.name, self.name);
            return self.nodes.handle(existing);
        }
        let id = self.nodes.insert(Node::new(info, self_ref, anim));
        self.nodes.handle(id)
    }

    /// Add `src -> dst`, or return the existing link. Both nodes must exist.
    pub fn add_link(&mut self, src: &str, dst: &str) -> Result<LinkRef, AnimError> {
        let src_ref = self.node_ref(src)?;
        let dst_ref = self.node_ref(dst)?;
        let name = link_name(src, dst);
        if let Some(existing) = self.links.find_id(&name) {
            warn!("link {name} already exists in group {}", self.name);
            return Ok(self.links.handle(existing));
        }
        let id = self.links.insert(Link::new(name, src_ref, dst_ref));
        let link_ref = self.links.handle(id);
        src_ref.resolve_mut(&mut self.nodes)?.outgoing_links.push(link_ref);
        Ok(link_ref)
    }

    /// Remove a link and strip it from its source node's outgoing list.
    pub fn remove_link(&mut self, name: &str) -> Result<Link, AnimError> {
        let id = self.link(name)?.id;
        self.remove_link_by_id(id)
            .ok_or_else(|| AnimError::not_found("link", name))
    }

    fn remove_link_by_id(&mut self, id: Uid) -> Option<Link> {
        let link = self.links.remove(id)?;
        if let Some(src) = self.nodes.get_mut(link.src.id()) {
            src.outgoing_links.retain(|l| l.id() != id);
        }
        Some(link)
    }

    /// Remove a node and every link entering or leaving it. The start node
    /// cannot be removed.
    pub fn remove_node(&mut self, name: &str) -> Result<Node, AnimError> {
        let id = self.node(name)?.id;
        if id == self.start_node.id() {
            return Err(AnimError::invalid_operation(format!(
                "cannot remove the start node of group {}",
                self.name
            )));
        }
        let attached: Vec<Uid> = self
            .links
            .iter()
            .filter(|l| l.src.id() == id || l.dst.id() == id)
            .map(|l| l.id)
            .collect();
        for link in attached {
            self.remove_link_by_id(link);
        }
        self.nodes
            .remove(id)
            .ok_or_else(|| AnimError::not_found("node", name))
    }

    pub fn set_start_node(&mut self, name: &str) -> Result<(), AnimError> {
        self.start_node = self.node_ref(name)?;
        Ok(())
    }

    /// Re-attach every handle in the group to its container. Returns the
    /// number of handles that did not resolve.
    pub(crate) fn reload_references(&mut self, tree: Uid) -> usize {
        let Self {
            id,
            name,
            start_node,
            nodes,
            links,
        } = self;
        nodes.set_owner(*id);
        links.set_owner(*id);

        let mut dangling = 0;
        if !start_node.reload(nodes) {
            dangling += 1;
        }
        for node in nodes.iter_mut() {
            node.group = GroupRef::attached(tree, *id);
            for link in node.outgoing_links.iter_mut() {
                if !link.reload(links) {
                    dangling += 1;
                }
            }
        }
        for link in links.iter_mut() {
            if !link.src.reload(nodes) {
                dangling += 1;
            }
            if !link.dst.reload(nodes) {
                dangling += 1;
            }
        }
        if dangling > 0 {
            warn!("group {name} has {dangling} dangling reference(s)");
        }
        dangling
    }
}
