//! Vizij Runtime Animation (engine-agnostic)
//!
//! Per-(track, target) playback state. A [`RuntimeInstance`] turns elapsed
//! time into a frame, evaluates the track's curve, cross-fades from the
//! captured baseline, writes the result into the target (directly or through
//! a late-binding aggregator) and fires the track's events.

pub mod aggregate;
pub mod blend;
pub mod config;
pub mod controller;
pub mod data;
pub mod error;
pub mod evaluator;
pub mod events;
pub mod host;
pub mod ids;
pub mod instance;
pub mod path;
pub mod scratch;
pub mod target;

// Re-exports for hosts
pub use aggregate::{AggregatorRef, Contribution, LateBindingAccumulator, LateBindingAggregator};
pub use blend::{BlendEngine, BlendStrategy};
pub use config::{MatrixBlendMode, RuntimeConfig};
pub use controller::{FramePlan, FrameRequest, LoopController};
pub use data::{DataType, EventAction, Keyframe, LoopMode, Track, TrackEvent, TrackRef};
pub use error::{Result, RuntimeError};
pub use evaluator::{AnimationState, CurveEvaluator, KeyframeEvaluator};
pub use events::EventDispatcher;
pub use host::{HostClock, PlaybackHost, SyncWindow};
pub use ids::InstId;
pub use instance::{LoopObserver, RuntimeInstance, DIRECT_WRITE};
pub use path::{resolve_property_path, ResolvedPath};
pub use scratch::Scratch;
pub use target::{
    Animatable, AnimationOverrides, AnimationTarget, SceneNode, TargetRef,
    TRANSFORM_MATRIX_PROPERTY,
};
pub use vizij_api_core::{Value, ValueKind};
