//! Blend-tree animation runtime (engine-agnostic).
//!
//! Authored data lives in [`AnimationTree`]s (groups of nodes joined by
//! conditional links, plus typed parameters) and [`Animation`]s (property
//! timelines and script events). The [`AnimationSystem`] binds trees to
//! entities once, then advances one [`AnimationTracker`] per entity every
//! frame, writing interpolated values into the host scene through the
//! [`scene`] collaborator traits.

pub mod animation;
pub mod condition;
pub mod config;
pub mod document;
pub mod error;
pub mod graph;
pub mod handle;
pub mod ids;
pub mod interp;
pub mod keyframe;
pub mod library;
pub mod outputs;
pub mod parameter;
pub mod scene;
pub mod serialization;
pub mod system;
pub mod timeline;
pub mod tracker;
pub mod value;

// Re-exports for hosts and editors
pub use animation::{AnimRef, Animation, DEFAULT_FRAMES_PER_SECOND};
pub use condition::{CompareType, Condition, ConditionInfo};
pub use config::SystemConfig;
pub use document::{
    animation_from_document, animation_to_document, tree_from_document, tree_to_document,
};
pub use error::AnimError;
pub use graph::{
    link_name, AnimationTree, Group, GroupRef, Link, LinkRef, Node, NodeInfo, NodeRef,
    START_NODE_NAME,
};
pub use handle::{Handle, Keyed, Store};
pub use ids::{fnv1a, EntityId, Uid};
pub use keyframe::{KeyFrame, ScriptEvent, ScriptFunctionInfo};
pub use library::{AnimationLibrary, TreeLibrary, EMPTY_ANIMATION_NAME};
pub use outputs::{CoreEvent, Outputs};
pub use parameter::{ParamType, Parameter, ParameterInfo};
pub use scene::{
    resolve_child_path, walk_child_path, MemoryScene, NoScripts, PropertyAccess, Scene,
    SceneGraph, ScriptInvoker, ScriptLog,
};
pub use serialization::{Property, PropertyRegistry, RefKind, TypeTag};
pub use system::{AnimationComponent, AnimationSystem};
pub use timeline::{PropertyDescriptor, Timeline, TimelineHierarchy, TimelineInfo, TimelineKind};
pub use tracker::{AnimationTracker, FrameContext, ProgressTracker};
pub use value::{Value, ValueKind};

pub type Result<T> = core::result::Result<T, AnimError>;
