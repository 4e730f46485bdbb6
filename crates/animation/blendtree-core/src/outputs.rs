//! Output contracts from the animation system.
//!
//! Property values are written straight into the host scene during
//! [`crate::system::AnimationSystem::run`]; outputs only carry the semantic
//! events of the tick so adapters can forward them.

use serde::{Deserialize, Serialize};

use crate::ids::EntityId;
use crate::keyframe::ScriptFunctionInfo;

/// Discrete semantic signals emitted during a run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum CoreEvent {
    TransitionTaken {
        entity: EntityId,
        from: String,
        to: String,
        link: String,
    },
    ScriptEventFired {
        entity: EntityId,
        function: ScriptFunctionInfo,
        time: f32,
    },
    LoopCompleted {
        entity: EntityId,
        node: String,
        iterations: u32,
    },
    Error {
        entity: Option<EntityId>,
        message: String,
    },
}

/// Outputs returned by `AnimationSystem::run()`.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Outputs {
    #[serde(default)]
    pub events: Vec<CoreEvent>,
    /// Events discarded this tick because the per-tick cap was reached.
    #[serde(default)]
    pub dropped_events: usize,
    #[serde(skip)]
    max_events: Option<usize>,
}

impl Outputs {
    pub fn with_capacity_limit(max_events: usize) -> Self {
        Self {
            max_events: Some(max_events),
            ..Self::default()
        }
    }

    #[inline]
    pub fn clear(&mut self) {
        self.events.clear();
        self.dropped_events = 0;
    }

    #[inline]
    pub fn push_event(&mut self, event: CoreEvent) {
        match self.max_events {
            Some(max) if self.events.len() >= max => self.dropped_events += 1,
            _ => self.events.push(event),
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn transitions(&self) -> impl Iterator<Item = &CoreEvent> {
        self.events
            .iter()
            .filter(|e| matches!(e, CoreEvent::TransitionTaken { .. }))
    }
}
