//! Animation assets: a named bundle of timelines and script events.

use log::warn;

use crate::error::AnimError;
use crate::handle::{Handle, Keyed};
use crate::ids::Uid;
use crate::keyframe::{insert_by_time, KeyFrame, ScriptEvent};
use crate::scene::SceneGraph;
use crate::timeline::{Timeline, TimelineInfo};

pub type AnimRef = Handle<Animation>;

pub const DEFAULT_FRAMES_PER_SECOND: f32 = 60.0;

#[derive(Clone, Debug, PartialEq)]
pub struct Animation {
    pub id: Uid,
    pub name: String,
    pub looping: bool,
    pub frames_per_second: f32,
    length: f32,
    timelines: Vec<Timeline>,
    events: Vec<ScriptEvent>,
}

impl Keyed for Animation {
    const KIND: &'static str = "animation";

    fn uid(&self) -> Uid {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl Animation {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_id(Uid::generate(), name)
    }

    pub(crate) fn with_id(id: Uid, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            looping: false,
            frames_per_second: DEFAULT_FRAMES_PER_SECOND,
            length: 0.0,
            timelines: Vec::new(),
            events: Vec::new(),
        }
    }

    pub fn looping(mut self, looping: bool) -> Self {
        self.looping = looping;
        self
    }

    /// Playback length in seconds, as of the last recalculation.
    #[inline]
    pub fn length(&self) -> f32 {
        self.length
    }

    pub(crate) fn set_length(&mut self, length: f32) {
        self.length = length;
    }

    #[inline]
    pub fn timelines(&self) -> &[Timeline] {
        &self.timelines
    }

    #[inline]
    pub fn events(&self) -> &[ScriptEvent] {
        &self.events
    }

    /// Add a timeline, or return the existing one with the same name.
    ///
    /// When the info addresses the target by entity, the child index path
    /// from the animated root is resolved here once and cached on the
    /// timeline; the runtime re-walks it every frame.
    pub fn add_timeline(
        &mut self,
        info: TimelineInfo,
        scene: Option<&dyn SceneGraph>,
    ) -> Result<&mut Timeline, AnimError> {
        if let Some(index) = self.timelines.iter().position(|t| t.name == info.name) {
            warn!(
                "timeline {} already exists in animation {}",
                info.name, self.name
            );
            return Ok(&mut self.timelines[index]);
        }
        let path = info.resolve_path(scene)?;
        self.timelines
            .push(Timeline::new(info.name, info.kind, info.target, path));
        let last = self.timelines.len() - 1;
        Ok(&mut self.timelines[last])
    }

    pub(crate) fn push_timeline(&mut self, timeline: Timeline) {
        self.timelines.push(timeline);
    }

    pub fn timeline(&self, name: &str) -> Result<&Timeline, AnimError> {
        self.timelines
            .iter()
            .find(|t| t.name == name)
            .ok_or_else(|| AnimError::not_found("timeline", name))
    }

    pub fn timeline_mut(&mut self, name: &str) -> Result<&mut Timeline, AnimError> {
        self.timelines
            .iter_mut()
            .find(|t| t.name == name)
            .ok_or_else(|| AnimError::not_found("timeline", name))
    }

    pub fn remove_timeline(&mut self, name: &str) -> Result<Timeline, AnimError> {
        let index = self
            .timelines
            .iter()
            .position(|t| t.name == name)
            .ok_or_else(|| AnimError::not_found("timeline", name))?;
        Ok(self.timelines.remove(index))
    }

    pub fn add_keyframe(&mut self, timeline: &str, keyframe: KeyFrame) -> Result<usize, AnimError> {
        self.timeline_mut(timeline)?.add_keyframe(keyframe)
    }

    /// Insert at its time-sorted position; returns the index.
    pub fn add_script_event(&mut self, event: ScriptEvent) -> Result<usize, AnimError> {
        if !event.time.is_finite() {
            return Err(AnimError::invalid_operation(format!(
                "script event time {} is not finite",
                event.time
            )));
        }
        Ok(insert_by_time(&mut self.events, event, |e| e.time))
    }

    pub fn remove_script_event(&mut self, index: usize) -> Result<ScriptEvent, AnimError> {
        if index >= self.events.len() {
            return Err(AnimError::not_found(
                "script event",
                format!("{}[{index}]", self.name),
            ));
        }
        Ok(self.events.remove(index))
    }

    /// Latest keyframe or event time across the whole animation.
    pub fn calculate_length(&self) -> f32 {
        let keys = self.timelines.iter().map(Timeline::end_time);
        let events = self.events.last().map(|e| e.time);
        keys.chain(events).fold(0.0, f32::max)
    }

    pub fn recalculate_length(&mut self) -> f32 {
        self.length = self.calculate_length();
        self.length
    }

    #[inline]
    pub fn time_from_frame(&self, frame: u32) -> f32 {
        if self.frames_per_second > 0.0 {
            frame as f32 / self.frames_per_second
        } else {
            0.0
        }
    }

    /// Copy the `[start, end]` window into a new animation rebased to 0.
    /// A timeline with no keyframe inside the window keeps the last
    /// keyframe before `start`, placed at 0.
    pub fn extract(&self, name: impl Into<String>, start: f32, end: f32) -> Result<Self, AnimError> {
        if !(start.is_finite() && end.is_finite()) || start > end {
            return Err(AnimError::invalid_operation(format!(
                "cannot extract [{start}, {end}] from {}",
                self.name
            )));
        }
        let mut out = Animation::new(name);
        out.looping = self.looping;
        out.frames_per_second = self.frames_per_second;

        for timeline in &self.timelines {
            let mut keyframes: Vec<KeyFrame> = timeline
                .keyframes()
                .iter()
                .filter(|k| k.time >= start && k.time <= end)
                .map(|k| KeyFrame::new(k.time - start, k.value.clone()))
                .collect();
            if keyframes.is_empty() {
                if let Some(held) = timeline.keyframes().iter().rev().find(|k| k.time < start) {
                    keyframes.push(KeyFrame::new(0.0, held.value.clone()));
                }
            }
            out.timelines.push(Timeline::from_parts(
                timeline.name.clone(),
                timeline.kind,
                timeline.target.clone(),
                timeline.component_hash,
                timeline.child_path.clone(),
                keyframes,
            ));
        }

        out.events = self
            .events
            .iter()
            .filter(|e| e.time >= start && e.time <= end)
            .map(|e| ScriptEvent::new(e.time - start, e.function.clone()))
            .collect();
        out.recalculate_length();
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keyframe::ScriptFunctionInfo;
    use crate::timeline::PropertyDescriptor;
    use crate::value::{Value, ValueKind};

    fn mk_info(name: &str) -> TimelineInfo {
        TimelineInfo::property(
            name,
            PropertyDescriptor::new("Transform", "position", ValueKind::Float),
        )
    }

    #[test]
    fn add_timeline_is_idempotent() {
        let mut anim = Animation::new("walk");
        anim.add_timeline(mk_info("x"), None).unwrap();
        anim.add_keyframe("x", KeyFrame::new(1.0, 1.0)).unwrap();
        let again = anim.add_timeline(mk_info("x"), None).unwrap();
        assert_eq!(again.keyframes().len(), 1);
        assert_eq!(anim.timelines().len(), 1);
    }

    #[test]
    fn length_covers_keyframes_and_events() {
        let mut anim = Animation::new("walk");
        anim.add_timeline(mk_info("x"), None).unwrap();
        anim.add_keyframe("x", KeyFrame::new(1.5, 0.0)).unwrap();
        assert_eq!(anim.recalculate_length(), 1.5);
        anim.add_script_event(ScriptEvent::new(2.25, ScriptFunctionInfo::default()))
            .unwrap();
        assert_eq!(anim.recalculate_length(), 2.25);
    }

    #[test]
    fn missing_timeline_is_not_found() {
        let mut anim = Animation::new("walk");
        let err = anim.add_keyframe("nope", KeyFrame::new(0.0, 1.0)).unwrap_err();
        assert_eq!(err, AnimError::not_found("timeline", "nope"));
    }

    #[test]
    fn time_from_frame_uses_fps() {
        let anim = Animation::new("walk");
        assert!((anim.time_from_frame(30) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn extract_rebases_window() {
        let mut anim = Animation::new("combo");
        anim.add_timeline(mk_info("x"), None).unwrap();
        anim.add_timeline(mk_info("y"), None).unwrap();
        for (t, v) in [(0.0, 0.0), (1.0, 10.0), (2.0, 20.0), (3.0, 30.0)] {
            anim.add_keyframe("x", KeyFrame::new(t, v)).unwrap();
        }
        anim.add_keyframe("y", KeyFrame::new(0.5, 5.0)).unwrap();

        let part = anim.extract("combo_b", 1.0, 2.0).unwrap();
        let x = part.timeline("x").unwrap().keyframes();
        assert_eq!(x.len(), 2);
        assert_eq!(x[0].time, 0.0);
        assert_eq!(x[1].value, Value::Float(20.0));
        let y = part.timeline("y").unwrap().keyframes();
        assert_eq!(y, &[KeyFrame::new(0.0, 5.0)]);
        assert_eq!(part.length(), 1.0);
        assert!(anim.extract("bad", 2.0, 1.0).is_err());
    }
}
