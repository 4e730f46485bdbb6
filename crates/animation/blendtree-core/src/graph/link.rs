//! Directed transitions between two nodes of the same group.

use crate::condition::Condition;
use crate::graph::node::NodeRef;
use crate::handle::{Handle, Keyed};
use crate::ids::Uid;
use crate::parameter::Parameter;

pub type LinkRef = Handle<Link>;

#[derive(Clone, Debug, PartialEq)]
pub struct Link {
    pub id: Uid,
    /// `"<src> -> <dst>"`.
    pub name: String,
    pub src: NodeRef,
    pub dst: NodeRef,
    pub has_exit_time: bool,
    /// Normalized time of the source animation after which the link may fire.
    pub exit_time: f32,
    // Blend timing is persisted for the editor but not evaluated.
    pub fixed_duration: bool,
    pub transition_duration: f32,
    pub transition_offset: f32,
    pub conditions: Vec<Condition>,
}

impl Keyed for Link {
    const KIND: &'static str = "link";

    fn uid(&self) -> Uid {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }
}

pub fn link_name(src: &str, dst: &str) -> String {
    format!("{src} -> {dst}")
}

impl Link {
    pub(crate) fn new(name: String, src: NodeRef, dst: NodeRef) -> Self {
        Self {
            id: Uid::generate(),
            name,
            src,
            dst,
            has_exit_time: false,
            exit_time: 0.0,
            fixed_duration: true,
            transition_duration: 0.0,
            transition_offset: 0.0,
            conditions: Vec::new(),
        }
    }

    /// `Some(t)` requires the source to reach normalized time `t`;
    /// `None` lets the link fire at any time.
    pub fn set_exit_time(&mut self, exit_time: Option<f32>) {
        match exit_time {
            Some(t) => {
                self.has_exit_time = true;
                self.exit_time = t;
            }
            None => self.has_exit_time = false,
        }
    }

    #[inline]
    pub fn exit_time_reached(&self, normalized_timer: f32) -> bool {
        !self.has_exit_time || normalized_timer >= self.exit_time
    }

    #[inline]
    pub fn conditions_hold(&self, params: &[Parameter]) -> bool {
        self.conditions.iter().all(|c| c.evaluate(params))
    }

    #[inline]
    pub fn is_eligible(&self, normalized_timer: f32, params: &[Parameter]) -> bool {
        self.exit_time_reached(normalized_timer) && self.conditions_hold(params)
    }

    pub fn condition(&self, id: Uid) -> Option<&Condition> {
        self.conditions.iter().find(|c| c.id == id)
    }
}
