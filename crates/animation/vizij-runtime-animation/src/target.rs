//! Animation targets: the live objects whose properties a runtime instance writes.
//!
//! Hosts implement [`Animatable`] for their scene objects. [`SceneNode`] is an
//! in-memory implementation with dynamic named slots, used by tools and tests.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};
use vizij_api_core::Value;

use crate::data::LoopMode;
use crate::error::{Result, RuntimeError};

/// Shared handle to an animatable object.
pub type TargetRef = Rc<RefCell<dyn Animatable>>;

/// Leaf name of a bone's local transform matrix. Baseline capture for this
/// slot prefers the owner's rest pose.
pub const TRANSFORM_MATRIX_PROPERTY: &str = "matrix";

/// Per-target playback overrides; take precedence over the track defaults.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnimationOverrides {
    pub enable_blending: bool,
    pub blending_speed: f32,
    #[serde(default)]
    pub loop_mode: Option<LoopMode>,
}

/// A live object exposing named property slots.
pub trait Animatable {
    /// Current value of a leaf slot.
    fn get_property(&self, name: &str) -> Option<Value>;

    /// Store a value into a leaf slot.
    fn set_property(&mut self, name: &str, value: Value) -> Result<()>;

    /// Nested object reached through an intermediate path segment.
    fn child(&self, name: &str) -> Option<TargetRef>;

    /// Skeletal rest pose, for bone-like targets.
    fn rest_pose(&self) -> Option<Value> {
        None
    }

    /// Invalidate cached derived state after `property` changed.
    fn mark_dirty(&mut self, _property: &str) {}

    fn animation_overrides(&self) -> Option<AnimationOverrides> {
        None
    }
}

/// What a runtime instance animates: one object, or a list of objects that all
/// receive the same value (fan-out).
#[derive(Clone)]
pub enum AnimationTarget {
    Single(TargetRef),
    Many(Vec<TargetRef>),
}

impl AnimationTarget {
    #[inline]
    pub fn targets(&self) -> &[TargetRef] {
        match self {
            AnimationTarget::Single(t) => std::slice::from_ref(t),
            AnimationTarget::Many(ts) => ts,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.targets().len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.targets().is_empty()
    }
}

impl From<TargetRef> for AnimationTarget {
    fn from(t: TargetRef) -> Self {
        AnimationTarget::Single(t)
    }
}

impl From<Vec<TargetRef>> for AnimationTarget {
    fn from(ts: Vec<TargetRef>) -> Self {
        AnimationTarget::Many(ts)
    }
}

impl fmt::Debug for AnimationTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnimationTarget::Single(_) => f.write_str("AnimationTarget::Single"),
            AnimationTarget::Many(ts) => write!(f, "AnimationTarget::Many({})", ts.len()),
        }
    }
}

/// In-memory animatable object.
///
/// Slots are typed by their first value: writing a value of another kind into
/// an occupied slot is rejected.
#[derive(Default)]
pub struct SceneNode {
    pub name: String,
    slots: HashMap<String, Value>,
    children: HashMap<String, TargetRef>,
    rest_pose: Option<Value>,
    overrides: Option<AnimationOverrides>,
    dirty: Vec<String>,
    writes: usize,
}

impl SceneNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_property(mut self, name: impl Into<String>, value: Value) -> Self {
        self.slots.insert(name.into(), value);
        self
    }

    pub fn with_child(mut self, name: impl Into<String>, child: TargetRef) -> Self {
        self.children.insert(name.into(), child);
        self
    }

    pub fn with_rest_pose(mut self, pose: Value) -> Self {
        self.rest_pose = Some(pose);
        self
    }

    pub fn with_overrides(mut self, overrides: AnimationOverrides) -> Self {
        self.overrides = Some(overrides);
        self
    }

    pub fn into_shared(self) -> Rc<RefCell<SceneNode>> {
        Rc::new(RefCell::new(self))
    }

    #[inline]
    pub fn property(&self, name: &str) -> Option<&Value> {
        self.slots.get(name)
    }

    /// Properties passed to `mark_dirty`, oldest first.
    #[inline]
    pub fn dirty_log(&self) -> &[String] {
        &self.dirty
    }

    /// Number of successful `set_property` calls.
    #[inline]
    pub fn write_count(&self) -> usize {
        self.writes
    }
}

impl Animatable for SceneNode {
    fn get_property(&self, name: &str) -> Option<Value> {
        self.slots.get(name).cloned()
    }

    fn set_property(&mut self, name: &str, value: Value) -> Result<()> {
        if let Some(existing) = self.slots.get(name) {
            if existing.kind() != value.kind() {
                return Err(RuntimeError::PropertyAssignment {
                    property: name.to_string(),
                    reason: format!(
                        "slot holds {:?}, got {:?}",
                        existing.kind(),
                        value.kind()
                    ),
                });
            }
        }
        self.slots.insert(name.to_string(), value);
        self.writes += 1;
        Ok(())
    }

    fn child(&self, name: &str) -> Option<TargetRef> {
        self.children.get(name).cloned()
    }

    fn rest_pose(&self) -> Option<Value> {
        self.rest_pose.clone()
    }

    fn mark_dirty(&mut self, property: &str) {
        self.dirty.push(property.to_string());
    }

    fn animation_overrides(&self) -> Option<AnimationOverrides> {
        self.overrides
    }
}

impl fmt::Debug for SceneNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SceneNode")
            .field("name", &self.name)
            .field("slots", &self.slots)
            .field("children", &self.children.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}
