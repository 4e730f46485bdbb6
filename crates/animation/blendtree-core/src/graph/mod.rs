//! The authored state graph: trees own groups and parameters, groups own
//! nodes and links.

pub mod group;
pub mod link;
pub mod node;
pub mod tree;

pub use group::{Group, GroupRef};
pub use link::{link_name, Link, LinkRef};
pub use node::{Node, NodeInfo, NodeRef, START_NODE_NAME};
pub use tree::AnimationTree;
