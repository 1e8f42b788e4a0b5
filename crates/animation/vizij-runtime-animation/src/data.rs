//! Track data model: keys, data type tag, loop mode, blending defaults,
//! property path, events and the live-instance registry.
//!
//! A track is shared by every runtime instance playing it, so it is handed out
//! as a [`TrackRef`] (`Rc<RefCell<Track>>`); evaluation is single-threaded.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use vizij_api_core::{Value, ValueKind};

use crate::ids::{IdAllocator, InstId};

/// Shared handle to a track.
pub type TrackRef = Rc<RefCell<Track>>;

/// Semantic data type of a track's key values.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    Float,
    Vector2,
    Vector3,
    Quaternion,
    Matrix,
    Color3,
    Color4,
    Size,
}

impl DataType {
    #[inline]
    pub fn value_kind(self) -> ValueKind {
        match self {
            DataType::Float => ValueKind::Float,
            DataType::Vector2 => ValueKind::Vec2,
            DataType::Vector3 => ValueKind::Vec3,
            DataType::Quaternion => ValueKind::Quat,
            DataType::Matrix => ValueKind::Matrix,
            DataType::Color3 => ValueKind::Color3,
            DataType::Color4 => ValueKind::ColorRgba,
            DataType::Size => ValueKind::Size,
        }
    }

    /// Whether looping modes accumulate a per-window offset for this type.
    /// All of these share the `value(to) - value(from)` formula.
    #[inline]
    pub fn supports_offset(self) -> bool {
        matches!(
            self,
            DataType::Float
                | DataType::Quaternion
                | DataType::Vector2
                | DataType::Vector3
                | DataType::Size
                | DataType::Color3
        )
    }

    /// Offset used when none was computed for the current window:
    /// 0, zero quaternion, zero vector, zero size, black.
    pub fn default_offset(self) -> Option<Value> {
        if self.supports_offset() {
            self.value_kind().additive_identity()
        } else {
            None
        }
    }
}

/// Policy for playback past the end of the `[from, to]` window.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoopMode {
    /// Repeat, adding the window's end-minus-start offset on every pass.
    Relative,
    /// Repeat from the start without offset.
    #[default]
    Cycle,
    /// Hold the end value once the window has been passed.
    Constant,
    /// Bounce back and forth inside the window.
    Yoyo,
    /// Like `Relative`; direct writes are added on top of the captured original value.
    RelativeFromCurrent,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Keyframe {
    pub frame: f32,
    pub value: Value,
}

impl Keyframe {
    pub fn new(frame: f32, value: Value) -> Self {
        Self { frame, value }
    }
}

/// Callback invoked with the frame at which an event fired.
pub type EventAction = Rc<dyn Fn(f32)>;

/// A frame-triggered callback. Runtime instances keep their own copy of the
/// track's events, so `is_done` is per instance.
#[derive(Clone)]
pub struct TrackEvent {
    pub frame: f32,
    pub only_once: bool,
    pub is_done: bool,
    action: EventAction,
}

impl TrackEvent {
    /// Repeatable event: fires once per loop pass.
    pub fn new(frame: f32, action: impl Fn(f32) + 'static) -> Self {
        Self {
            frame,
            only_once: false,
            is_done: false,
            action: Rc::new(action),
        }
    }

    /// One-shot event: fires at most once, then is dropped.
    pub fn once(frame: f32, action: impl Fn(f32) + 'static) -> Self {
        Self {
            only_once: true,
            ..Self::new(frame, action)
        }
    }

    #[inline]
    pub fn action(&self) -> EventAction {
        Rc::clone(&self.action)
    }

    /// Fresh copy with `is_done` cleared, sharing the same action.
    pub(crate) fn rearmed(&self) -> Self {
        Self {
            is_done: false,
            ..self.clone()
        }
    }
}

impl fmt::Debug for TrackEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrackEvent")
            .field("frame", &self.frame)
            .field("only_once", &self.only_once)
            .field("is_done", &self.is_done)
            .finish_non_exhaustive()
    }
}

/// Declarative keyframe data for one animated property.
#[derive(Debug)]
pub struct Track {
    pub name: String,
    /// Dotted property name (e.g. "position.x"), reported to `mark_dirty`.
    pub target_property: String,
    /// `target_property` split on '.'.
    pub property_path: Vec<String>,
    pub data_type: DataType,
    pub fps: f32,
    pub loop_mode: LoopMode,
    pub enable_blending: bool,
    pub blending_speed: f32,
    keys: Vec<Keyframe>,
    events: Vec<TrackEvent>,
    ids: IdAllocator,
    runtime_instances: Vec<InstId>,
}

impl Track {
    pub fn new(
        name: impl Into<String>,
        target_property: impl Into<String>,
        fps: f32,
        data_type: DataType,
        loop_mode: LoopMode,
    ) -> Self {
        let target_property = target_property.into();
        let property_path = target_property
            .split('.')
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        Self {
            name: name.into(),
            target_property,
            property_path,
            data_type,
            fps,
            loop_mode,
            enable_blending: false,
            blending_speed: 0.01,
            keys: Vec::new(),
            events: Vec::new(),
            ids: IdAllocator::new(),
            runtime_instances: Vec::new(),
        }
    }

    pub fn with_keys(mut self, keys: Vec<Keyframe>) -> Self {
        self.set_keys(keys);
        self
    }

    pub fn with_blending(mut self, speed: f32) -> Self {
        self.enable_blending = true;
        self.blending_speed = speed;
        self
    }

    pub fn into_shared(self) -> TrackRef {
        Rc::new(RefCell::new(self))
    }

    /// Replace all keys; keys are kept sorted ascending by frame.
    pub fn set_keys(&mut self, mut keys: Vec<Keyframe>) {
        keys.sort_by(|a, b| a.frame.total_cmp(&b.frame));
        self.keys = keys;
    }

    #[inline]
    pub fn keys(&self) -> &[Keyframe] {
        &self.keys
    }

    #[inline]
    pub fn first_frame(&self) -> Option<f32> {
        self.keys.first().map(|k| k.frame)
    }

    #[inline]
    pub fn last_frame(&self) -> Option<f32> {
        self.keys.last().map(|k| k.frame)
    }

    /// Insert a frame-0 key cloned from the first key when the first authored
    /// key starts later, so playback before it extrapolates without a gap.
    /// Returns true when a key was inserted.
    pub fn ensure_frame_zero_key(&mut self) -> bool {
        match self.keys.first() {
            Some(first) if first.frame > 0.0 => {
                let value = first.value.clone();
                self.keys.insert(0, Keyframe::new(0.0, value));
                true
            }
            _ => false,
        }
    }

    /// Add an event, keeping the list ordered by frame (stable for equal frames).
    pub fn add_event(&mut self, event: TrackEvent) {
        let pos = self.events.partition_point(|e| e.frame <= event.frame);
        self.events.insert(pos, event);
    }

    /// Remove every event scheduled at `frame`.
    pub fn remove_events(&mut self, frame: f32) {
        self.events.retain(|e| e.frame != frame);
    }

    #[inline]
    pub fn events(&self) -> &[TrackEvent] {
        &self.events
    }

    pub(crate) fn register_instance(&mut self) -> InstId {
        let id = self.ids.alloc_inst();
        self.runtime_instances.push(id);
        id
    }

    pub(crate) fn unregister_instance(&mut self, id: InstId) -> bool {
        let before = self.runtime_instances.len();
        self.runtime_instances.retain(|i| *i != id);
        before != self.runtime_instances.len()
    }

    /// Ids of the runtime instances currently playing this track.
    #[inline]
    pub fn runtime_instances(&self) -> &[InstId] {
        &self.runtime_instances
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn float_track(keys: &[(f32, f32)]) -> Track {
        Track::new("t", "alpha", 30.0, DataType::Float, LoopMode::Cycle).with_keys(
            keys.iter()
                .map(|(f, v)| Keyframe::new(*f, Value::Float(*v)))
                .collect(),
        )
    }

    #[test]
    fn keys_are_sorted_on_insert() {
        let track = float_track(&[(10.0, 1.0), (0.0, 0.0), (5.0, 0.5)]);
        let frames: Vec<f32> = track.keys().iter().map(|k| k.frame).collect();
        assert_eq!(frames, vec![0.0, 5.0, 10.0]);
    }

    #[test]
    fn frame_zero_key_inserted_once() {
        let mut track = float_track(&[(4.0, 2.0), (8.0, 3.0)]);
        assert!(track.ensure_frame_zero_key());
        assert!(!track.ensure_frame_zero_key());
        assert_eq!(track.keys()[0], Keyframe::new(0.0, Value::Float(2.0)));
        assert_eq!(track.keys().len(), 3);
    }

    #[test]
    fn property_path_splits_on_dots() {
        let track = Track::new("t", "material.diffuse.r", 30.0, DataType::Float, LoopMode::Cycle);
        assert_eq!(track.property_path, vec!["material", "diffuse", "r"]);
    }

    #[test]
    fn events_stay_ordered_by_frame() {
        let mut track = float_track(&[(0.0, 0.0)]);
        track.add_event(TrackEvent::new(5.0, |_| {}));
        track.add_event(TrackEvent::once(1.0, |_| {}));
        track.add_event(TrackEvent::new(3.0, |_| {}));
        let frames: Vec<f32> = track.events().iter().map(|e| e.frame).collect();
        assert_eq!(frames, vec![1.0, 3.0, 5.0]);
        track.remove_events(3.0);
        assert_eq!(track.events().len(), 2);
    }

    #[test]
    fn registry_tracks_live_instances() {
        let mut track = float_track(&[(0.0, 0.0)]);
        let a = track.register_instance();
        let b = track.register_instance();
        assert_ne!(a, b);
        assert!(track.unregister_instance(a));
        assert!(!track.unregister_instance(a));
        assert_eq!(track.runtime_instances(), &[b]);
    }
}
