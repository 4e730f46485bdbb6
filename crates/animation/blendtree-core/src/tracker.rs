//! Per-entity runtime state and the per-frame update.
//!
//! Each frame an [`AnimationTracker`]:
//! 1. scans the current node's outgoing links in authored order and takes
//!    the first eligible one (exit time reached and every condition holds),
//!    consuming the triggers it used and restarting on the destination;
//! 2. advances `timer`, `global_timer` and `normalized_timer` by
//!    `speed * dt`;
//! 3. advances one [`ProgressTracker`] per property timeline plus one for
//!    the script events, writing interpolated values into the scene;
//! 4. wraps `timer` and bumps `iterations` when a looping animation passes
//!    its length.

use log::{debug, warn};

use crate::animation::Animation;
use crate::error::AnimError;
use crate::graph::{AnimationTree, Group, Link, Node, NodeRef};
use crate::ids::{EntityId, Uid};
use crate::interp::interpolate_value;
use crate::keyframe::{KeyFrame, ScriptEvent};
use crate::library::AnimationLibrary;
use crate::outputs::{CoreEvent, Outputs};
use crate::parameter::{ParamType, Parameter};
use crate::scene::{walk_child_path, Scene, ScriptInvoker};
use crate::timeline::{Timeline, TimelineKind};
use crate::value::Value;

/// Cursor over a timeline's keyframes.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct KeyframeCursor {
    /// Index of the timeline within its animation.
    pub timeline: usize,
    /// Keyframe at or before the timer.
    pub index: usize,
    /// Set once a non-looping timeline has written its last value.
    pub held: bool,
}

impl KeyframeCursor {
    pub fn new(timeline: usize) -> Self {
        Self {
            timeline,
            index: 0,
            held: false,
        }
    }

    #[inline]
    fn reset(&mut self) {
        self.index = 0;
        self.held = false;
    }

    /// Move forward while the next keyframe's time is at or before `timer`.
    #[inline]
    fn seek(&mut self, keys: &[KeyFrame], timer: f32) {
        while self.index + 1 < keys.len() && keys[self.index + 1].time <= timer {
            self.index += 1;
        }
    }

    /// Value at `timer`, or None when there is nothing (more) to write.
    pub fn sample(&mut self, keys: &[KeyFrame], timer: f32, looping: bool) -> Option<Value> {
        if self.held || keys.is_empty() {
            return None;
        }
        self.seek(keys, timer);
        let prev = &keys[self.index];
        match keys.get(self.index + 1) {
            None => {
                if !looping {
                    self.held = true;
                }
                Some(prev.value.clone())
            }
            Some(next) => {
                let span = next.time - prev.time;
                let percentage = if span > 0.0 {
                    ((timer - prev.time) / span).clamp(0.0, 1.0)
                } else {
                    1.0
                };
                Some(interpolate_value(&prev.value, &next.value, percentage))
            }
        }
    }
}

/// Cursor over an animation's script events.
///
/// Each event fires once per pass over the animation. A looping animation
/// resets the cursor when it wraps, so its events fire again on every
/// iteration; a non-looping one fires each event exactly once.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct EventCursor {
    /// Index of the next event to fire.
    pub next: usize,
}

impl EventCursor {
    /// Events crossed since the last call. Each event is returned once.
    pub fn due<'e>(&mut self, events: &'e [ScriptEvent], timer: f32) -> &'e [ScriptEvent] {
        let start = self.next.min(events.len());
        let end = start
            + events[start..]
                .iter()
                .take_while(|e| e.time <= timer)
                .count();
        self.next = end;
        &events[start..end]
    }
}

/// Progress through one stream of the current animation.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ProgressTracker {
    Property(KeyframeCursor),
    FbxAnim(KeyframeCursor),
    ScriptEvent(EventCursor),
}

impl ProgressTracker {
    /// One event tracker, then one tracker per property-driving timeline.
    pub fn for_animation(animation: &Animation) -> Vec<Self> {
        let mut trackers = Vec::with_capacity(animation.timelines().len() + 1);
        trackers.push(ProgressTracker::ScriptEvent(EventCursor::default()));
        let driving = animation
            .timelines()
            .iter()
            .enumerate()
            .filter(|(_, timeline)| timeline.kind.drives_property());
        for (index, timeline) in driving {
            let cursor = KeyframeCursor::new(index);
            trackers.push(match timeline.kind {
                TimelineKind::FbxAnim => ProgressTracker::FbxAnim(cursor),
                _ => ProgressTracker::Property(cursor),
            });
        }
        trackers
    }

    pub fn reset(&mut self) {
        match self {
            ProgressTracker::Property(cursor) | ProgressTracker::FbxAnim(cursor) => cursor.reset(),
            ProgressTracker::ScriptEvent(cursor) => cursor.next = 0,
        }
    }
}

/// Collaborators and sinks for one entity's update.
pub struct FrameContext<'a> {
    /// Animated root entity.
    pub entity: EntityId,
    pub animations: &'a AnimationLibrary,
    pub scene: &'a mut dyn Scene,
    pub scripts: &'a mut dyn ScriptInvoker,
    pub outputs: &'a mut Outputs,
}

#[inline]
fn normalize(timer: f32, length: f32) -> f32 {
    // Zero-length animations count as already complete.
    if length > 0.0 {
        timer / length
    } else {
        f32::INFINITY
    }
}

fn animation_of<'a>(node: &Node, animations: &'a AnimationLibrary) -> Result<&'a Animation, AnimError> {
    node.anim.resolve(animations.store())
}

#[derive(Clone, Debug, PartialEq)]
pub struct AnimationTracker {
    group: Uid,
    pub current_node: NodeRef,
    pub timer: f32,
    pub normalized_timer: f32,
    pub global_timer: f32,
    pub iterations: u32,
    pub trackers: Vec<ProgressTracker>,
    /// Private copy of the tree's parameters.
    pub parameters: Vec<Parameter>,
}

impl AnimationTracker {
    /// Start at the entry group's start node with a copy of the tree's
    /// parameters. The tree must be bound.
    pub fn new(tree: &AnimationTree, animations: &AnimationLibrary) -> Result<Self, AnimError> {
        let group = tree.entry_group()?;
        let mut tracker = Self {
            group: group.id,
            current_node: group.start_node,
            timer: 0.0,
            normalized_timer: 0.0,
            global_timer: 0.0,
            iterations: 0,
            trackers: Vec::new(),
            parameters: tree.parameters().to_vec(),
        };
        tracker.enter_node(group, group.start_node, animations)?;
        Ok(tracker)
    }

    #[inline]
    pub fn group_id(&self) -> Uid {
        self.group
    }

    pub fn current_group<'t>(&self, tree: &'t AnimationTree) -> Result<&'t Group, AnimError> {
        tree.groups.get(self.group).ok_or(AnimError::InvalidReference {
            kind: "group",
            id: self.group,
        })
    }

    pub fn current_node<'t>(&self, tree: &'t AnimationTree) -> Result<&'t Node, AnimError> {
        self.current_node.resolve(&self.current_group(tree)?.nodes)
    }

    /// Switch to `node`, resetting timers and rebuilding progress trackers.
    fn enter_node(
        &mut self,
        group: &Group,
        node: NodeRef,
        animations: &AnimationLibrary,
    ) -> Result<(), AnimError> {
        let animation = animation_of(node.resolve(&group.nodes)?, animations)?;
        self.current_node = node;
        self.timer = 0.0;
        self.normalized_timer = 0.0;
        self.global_timer = 0.0;
        self.iterations = 0;
        self.trackers = ProgressTracker::for_animation(animation);
        Ok(())
    }

    pub fn parameter(&self, name: &str) -> Result<&Parameter, AnimError> {
        self.parameters
            .iter()
            .find(|p| p.name == name)
            .ok_or_else(|| AnimError::not_found("parameter", name))
    }

    pub fn set_parameter(&mut self, name: &str, value: Value) -> Result<(), AnimError> {
        self.parameters
            .iter_mut()
            .find(|p| p.name == name)
            .ok_or_else(|| AnimError::not_found("parameter", name))?
            .set(value)
    }

    pub fn set_parameter_by_id(&mut self, id: Uid, value: Value) -> Result<(), AnimError> {
        self.parameters
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| AnimError::not_found("parameter", id.to_string()))?
            .set(value)
    }

    pub fn set_parameter_by_index(&mut self, index: usize, value: Value) -> Result<(), AnimError> {
        self.parameters
            .get_mut(index)
            .ok_or_else(|| AnimError::not_found("parameter", format!("#{index}")))?
            .set(value)
    }

    /// First eligible outgoing link in authored order.
    fn select_transition<'g>(&self, group: &'g Group, node: &Node) -> Option<&'g Link> {
        node.outgoing_links
            .iter()
            .filter_map(|link| link.resolve(&group.links).ok())
            .find(|link| link.is_eligible(self.normalized_timer, &self.parameters))
    }

    fn consume_triggers(&mut self, link: &Link) {
        for condition in &link.conditions {
            if condition.kind != ParamType::Trigger {
                continue;
            }
            if let Some(param) = condition
                .param_index()
                .and_then(|index| self.parameters.get_mut(index))
            {
                param.consume();
            }
        }
    }

    /// Advance one frame. Structural failures (dangling group/node/animation
    /// references) abort the update and leave the last pose in place;
    /// failures writing individual properties are reported and skipped.
    pub fn update(
        &mut self,
        tree: &AnimationTree,
        dt: f32,
        ctx: &mut FrameContext<'_>,
    ) -> Result<(), AnimError> {
        let group = self.current_group(tree)?;
        let mut node = self.current_node.resolve(&group.nodes)?;

        if let Some(link) = self.select_transition(group, node) {
            let dst = link.dst.resolve(&group.nodes)?;
            self.enter_node(group, link.dst, ctx.animations)?;
            self.consume_triggers(link);
            debug!("{}: {} -> {} via {}", ctx.entity, node.name, dst.name, link.name);
            ctx.outputs.push_event(CoreEvent::TransitionTaken {
                entity: ctx.entity,
                from: node.name.clone(),
                to: dst.name.clone(),
                link: link.name.clone(),
            });
            node = dst;
        }

        let animation = animation_of(node, ctx.animations)?;
        let step = node.speed * dt;
        self.timer += step;
        self.global_timer += step;
        self.normalized_timer = normalize(self.timer, animation.length());

        self.advance_progress(animation, ctx);

        let length = animation.length();
        if animation.looping && length > 0.0 && self.timer > length {
            if !self.timer.is_finite() {
                warn!(
                    "{}: timer of {} is not finite; holding the last pose",
                    ctx.entity, node.name
                );
                return Ok(());
            }
            let wraps = self.wrap_timer(length);
            self.iterations = self.iterations.saturating_add(wraps);
            self.normalized_timer = normalize(self.timer, length);
            for tracker in self.trackers.iter_mut() {
                tracker.reset();
            }
            ctx.outputs.push_event(CoreEvent::LoopCompleted {
                entity: ctx.entity,
                node: node.name.clone(),
                iterations: self.iterations,
            });
        }
        Ok(())
    }

    /// Bring a finite `timer > length` back into `(0, length]`. Returns the
    /// number of whole lengths removed, saturating at `u32::MAX`.
    fn wrap_timer(&mut self, length: f32) -> u32 {
        let wraps = ((self.timer / length).ceil() - 1.0).max(1.0);
        self.timer = (self.timer - wraps * length).clamp(0.0, length);
        // float-to-int casts saturate
        wraps as u32
    }

    fn advance_progress(&mut self, animation: &Animation, ctx: &mut FrameContext<'_>) {
        let timer = self.timer;
        for tracker in self.trackers.iter_mut() {
            match tracker {
                ProgressTracker::Property(cursor) | ProgressTracker::FbxAnim(cursor) => {
                    let Some(timeline) = animation.timelines().get(cursor.timeline) else {
                        continue;
                    };
                    let Some(value) = cursor.sample(timeline.keyframes(), timer, animation.looping)
                    else {
                        continue;
                    };
                    if let Err(err) = write_property(ctx, timeline, value) {
                        warn!(
                            "{}: timeline {} of {} not applied: {err}",
                            ctx.entity, timeline.name, animation.name
                        );
                        ctx.outputs.push_event(CoreEvent::Error {
                            entity: Some(ctx.entity),
                            message: err.to_string(),
                        });
                    }
                }
                ProgressTracker::ScriptEvent(cursor) => {
                    for event in cursor.due(animation.events(), timer) {
                        debug!(
                            "{}: script event {} at {}",
                            ctx.entity,
                            event.function.qualified_name(),
                            event.time
                        );
                        ctx.scripts.invoke(ctx.entity, &event.function);
                        ctx.outputs.push_event(CoreEvent::ScriptEventFired {
                            entity: ctx.entity,
                            function: event.function.clone(),
                            time: event.time,
                        });
                    }
                }
            }
        }
    }
}

/// Walk from the animated root to the timeline's target and set the value.
fn write_property(ctx: &mut FrameContext<'_>, timeline: &Timeline, value: Value) -> Result<(), AnimError> {
    let target = walk_child_path(&*ctx.scene, ctx.entity, &timeline.child_path).ok_or_else(|| {
        AnimError::not_found(
            "entity",
            format!("{:?} below {}", timeline.child_path, ctx.entity),
        )
    })?;
    if !ctx.scene.has_component(target, timeline.component_hash) {
        return Err(AnimError::not_found(
            "component",
            format!("{} on {target}", timeline.target.component),
        ));
    }
    ctx.scene.set_property(target, &timeline.target, value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::{CompareType, ConditionInfo};
    use crate::graph::{link_name, NodeInfo, START_NODE_NAME};
    use crate::keyframe::ScriptFunctionInfo;
    use crate::parameter::ParameterInfo;
    use crate::scene::{MemoryScene, NoScripts};

    fn keys(pairs: &[(f32, f32)]) -> Vec<KeyFrame> {
        pairs.iter().map(|(t, v)| KeyFrame::new(*t, *v)).collect()
    }

    #[test]
    fn cursor_interpolates_between_bracketing_keys() {
        let keys = keys(&[(0.0, 0.0), (2.0, 10.0)]);
        let mut cursor = KeyframeCursor::new(0);
        assert_eq!(cursor.sample(&keys, 1.0, false), Some(Value::Float(5.0)));
        assert_eq!(cursor.index, 0);
        assert_eq!(cursor.sample(&keys, 2.5, false), Some(Value::Float(10.0)));
        assert!(cursor.held);
        assert_eq!(cursor.sample(&keys, 3.0, false), None);
    }

    #[test]
    fn cursor_before_first_key_holds_first_value() {
        let keys = keys(&[(1.0, 4.0), (2.0, 8.0)]);
        let mut cursor = KeyframeCursor::new(0);
        assert_eq!(cursor.sample(&keys, 0.25, false), Some(Value::Float(4.0)));
    }

    #[test]
    fn single_key_writes_once_when_not_looping() {
        let keys = keys(&[(0.0, 3.0)]);
        let mut cursor = KeyframeCursor::new(0);
        assert_eq!(cursor.sample(&keys, 0.1, false), Some(Value::Float(3.0)));
        assert_eq!(cursor.sample(&keys, 0.2, false), None);
    }

    #[test]
    fn events_fire_once_each() {
        let f = ScriptFunctionInfo::new("", "Hero", "Step");
        let events = vec![
            ScriptEvent::new(0.25, f.clone()),
            ScriptEvent::new(0.5, f.clone()),
            ScriptEvent::new(0.5, f),
        ];
        let mut cursor = EventCursor::default();
        assert!(cursor.due(&events, 0.1).is_empty());
        assert_eq!(cursor.due(&events, 0.3).len(), 1);
        assert_eq!(cursor.due(&events, 0.6).len(), 2);
        assert!(cursor.due(&events, 0.9).is_empty());
    }

    /// it should leave the node, its triggers and the event stream alone
    /// when the destination of a winning link cannot be entered
    #[test]
    fn failed_transition_changes_nothing() {
        let mut library = AnimationLibrary::default();
        library.create("a");
        let mut tree = AnimationTree::new("t");
        tree.add_group("g", &library).unwrap();
        tree.add_node("g", NodeInfo::new("A").with_animation("a"), &library)
            .unwrap();
        tree.add_link("g", START_NODE_NAME, "A").unwrap();
        tree.add_parameter(ParameterInfo::new("go", ParamType::Trigger))
            .unwrap();
        tree.add_condition(
            "g",
            &link_name(START_NODE_NAME, "A"),
            ConditionInfo::new("go", CompareType::Equal),
        )
        .unwrap();
        tree.bind(&library);

        let mut tracker = AnimationTracker::new(&tree, &library).unwrap();
        let start = tracker.current_node.id();
        tracker.set_parameter("go", Value::Bool(true)).unwrap();
        library.remove("a").unwrap();

        let mut scene = MemoryScene::new();
        let mut outputs = Outputs::default();
        let mut ctx = FrameContext {
            entity: EntityId(1),
            animations: &library,
            scene: &mut scene,
            scripts: &mut NoScripts,
            outputs: &mut outputs,
        };
        assert!(tracker.update(&tree, 0.1, &mut ctx).is_err());

        assert_eq!(tracker.current_node.id(), start);
        assert_eq!(tracker.parameter("go").unwrap().value, Value::Bool(true));
        assert_eq!(outputs.transitions().count(), 0);
    }

    /// it should remove every whole length in one step and report the count
    #[test]
    fn wrap_timer_is_closed_form() {
        let mut tracker = AnimationTracker {
            group: Uid::generate(),
            current_node: NodeRef::default(),
            timer: 7.0,
            normalized_timer: 0.0,
            global_timer: 7.0,
            iterations: 0,
            trackers: Vec::new(),
            parameters: Vec::new(),
        };
        assert_eq!(tracker.wrap_timer(2.0), 3);
        assert_eq!(tracker.timer, 1.0);

        tracker.timer = 4.0;
        assert_eq!(tracker.wrap_timer(2.0), 1);
        assert_eq!(tracker.timer, 2.0);

        tracker.timer = 1.0e30;
        assert_eq!(tracker.wrap_timer(1.0), u32::MAX);
        assert!((0.0..=1.0).contains(&tracker.timer));
    }
}
