//! Timelines: time-sorted keyframes bound to one property of one entity in
//! the animated hierarchy.

use serde::{Deserialize, Serialize};

use crate::error::AnimError;
use crate::ids::{fnv1a, EntityId};
use crate::keyframe::{insert_by_time, KeyFrame};
use crate::scene::{resolve_child_path, SceneGraph};
use crate::value::ValueKind;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TimelineKind {
    /// Hand-authored property track.
    Property,
    /// Track produced by the FBX import pipeline.
    FbxAnim,
    /// Marker track; script events live on the animation itself.
    ScriptEvent,
}

impl TimelineKind {
    /// Whether the runtime writes keyframe values for this kind.
    #[inline]
    pub fn drives_property(self) -> bool {
        matches!(self, TimelineKind::Property | TimelineKind::FbxAnim)
    }
}

/// Which property a timeline writes: a component type, one of its declared
/// properties and the property's value kind.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PropertyDescriptor {
    pub component: String,
    pub property: String,
    pub kind: ValueKind,
}

impl PropertyDescriptor {
    pub fn new(component: impl Into<String>, property: impl Into<String>, kind: ValueKind) -> Self {
        Self {
            component: component.into(),
            property: property.into(),
            kind,
        }
    }

    #[inline]
    pub fn component_hash(&self) -> u64 {
        fnv1a(&self.component)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Timeline {
    pub name: String,
    pub kind: TimelineKind,
    pub target: PropertyDescriptor,
    pub component_hash: u64,
    /// Child index taken at each level from the animated root to the target.
    pub child_path: Vec<usize>,
    keyframes: Vec<KeyFrame>,
}

impl Timeline {
    pub fn new(
        name: impl Into<String>,
        kind: TimelineKind,
        target: PropertyDescriptor,
        child_path: Vec<usize>,
    ) -> Self {
        let component_hash = target.component_hash();
        Self {
            name: name.into(),
            kind,
            target,
            component_hash,
            child_path,
            keyframes: Vec::new(),
        }
    }

    #[inline]
    pub fn value_kind(&self) -> ValueKind {
        self.target.kind
    }

    #[inline]
    pub fn keyframes(&self) -> &[KeyFrame] {
        &self.keyframes
    }

    /// Insert at its time-sorted position. The value must match the
    /// timeline's declared property kind. Returns the insertion index.
    pub fn add_keyframe(&mut self, keyframe: KeyFrame) -> Result<usize, AnimError> {
        if keyframe.value.kind() != self.target.kind {
            return Err(AnimError::type_mismatch(
                self.target.kind,
                keyframe.value.kind(),
            ));
        }
        if !keyframe.time.is_finite() {
            return Err(AnimError::invalid_operation(format!(
                "keyframe time {} on timeline {} is not finite",
                keyframe.time, self.name
            )));
        }
        Ok(insert_by_time(&mut self.keyframes, keyframe, |k| k.time))
    }

    pub fn remove_keyframe(&mut self, index: usize) -> Result<KeyFrame, AnimError> {
        if index >= self.keyframes.len() {
            return Err(AnimError::not_found(
                "keyframe",
                format!("{}[{index}]", self.name),
            ));
        }
        Ok(self.keyframes.remove(index))
    }

    /// Time of the last keyframe, 0 when empty.
    #[inline]
    pub fn end_time(&self) -> f32 {
        self.keyframes.last().map_or(0.0, |k| k.time)
    }

    pub(crate) fn from_parts(
        name: String,
        kind: TimelineKind,
        target: PropertyDescriptor,
        component_hash: u64,
        child_path: Vec<usize>,
        keyframes: Vec<KeyFrame>,
    ) -> Self {
        Self {
            name,
            kind,
            target,
            component_hash,
            child_path,
            keyframes,
        }
    }
}

/// Where the target entity sits relative to the animated root.
#[derive(Clone, Debug, PartialEq)]
pub enum TimelineHierarchy {
    /// The animated root itself.
    Root,
    /// A known child index path, as emitted by the FBX importer.
    Path(Vec<usize>),
    /// Resolve the path once by searching from `root` for `target`.
    Entities { root: EntityId, target: EntityId },
}

#[derive(Clone, Debug)]
pub struct TimelineInfo {
    pub name: String,
    pub kind: TimelineKind,
    pub target: PropertyDescriptor,
    pub hierarchy: TimelineHierarchy,
}

impl TimelineInfo {
    pub fn property(name: impl Into<String>, target: PropertyDescriptor) -> Self {
        Self {
            name: name.into(),
            kind: TimelineKind::Property,
            target,
            hierarchy: TimelineHierarchy::Root,
        }
    }

    pub fn with_kind(mut self, kind: TimelineKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_hierarchy(mut self, hierarchy: TimelineHierarchy) -> Self {
        self.hierarchy = hierarchy;
        self
    }

    pub(crate) fn resolve_path(
        &self,
        scene: Option<&dyn SceneGraph>,
    ) -> Result<Vec<usize>, AnimError> {
        match &self.hierarchy {
            TimelineHierarchy::Root => Ok(Vec::new()),
            TimelineHierarchy::Path(path) => Ok(path.clone()),
            TimelineHierarchy::Entities { root, target } if root == target => Ok(Vec::new()),
            TimelineHierarchy::Entities { root, target } => {
                let scene = scene.ok_or_else(|| {
                    AnimError::invalid_operation(format!(
                        "timeline {} needs a scene to resolve {target} below {root}",
                        self.name
                    ))
                })?;
                resolve_child_path(scene, *root, *target).ok_or_else(|| {
                    AnimError::not_found("entity", format!("{target} below {root}"))
                })
            }
        }
    }
}
