//! States of the graph: each node plays one animation.

use crate::animation::AnimRef;
use crate::graph::group::GroupRef;
use crate::graph::link::LinkRef;
use crate::handle::{Handle, Keyed};
use crate::ids::Uid;

pub type NodeRef = Handle<Node>;

pub const START_NODE_NAME: &str = "Start Node";

#[derive(Clone, Debug, PartialEq)]
pub struct Node {
    pub id: Uid,
    pub name: String,
    pub group: GroupRef,
    pub anim: AnimRef,
    /// Multiplier on per-frame time advance.
    pub speed: f32,
    /// Editor canvas position.
    pub position: [f32; 3],
    /// Transitions out of this node, in authored order.
    pub outgoing_links: Vec<LinkRef>,
}

impl Keyed for Node {
    const KIND: &'static str = "node";

    fn uid(&self) -> Uid {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl Node {
    pub(crate) fn new(info: &NodeInfo, group: GroupRef, anim: AnimRef) -> Self {
        Self {
            id: Uid::generate(),
            name: info.name.clone(),
            group,
            anim,
            speed: info.speed,
            position: info.position,
            outgoing_links: Vec::new(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct NodeInfo {
    pub name: String,
    /// Animation by name; `None` plays the empty animation.
    pub animation: Option<String>,
    pub speed: f32,
    pub position: [f32; 3],
}

impl NodeInfo {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            animation: None,
            speed: 1.0,
            position: [0.0; 3],
        }
    }

    pub fn with_animation(mut self, animation: impl Into<String>) -> Self {
        self.animation = Some(animation.into());
        self
    }

    pub fn with_speed(mut self, speed: f32) -> Self {
        self.speed = speed;
        self
    }

    pub fn at(mut self, position: [f32; 3]) -> Self {
        self.position = position;
        self
    }
}
