//! Runtime instance: the live evaluation state for one (track, target) pair.
//!
//! Each `animate` tick runs the loop controller, the curve evaluator, the
//! blend/apply step and the event dispatcher, in that order.

use std::fmt;
use std::rc::Rc;

use log::{debug, trace, warn};
use vizij_api_core::Value;

use crate::aggregate::{AggregatorRef, Contribution};
use crate::blend::BlendEngine;
use crate::config::RuntimeConfig;
use crate::controller::{FramePlan, FrameRequest, LoopController};
use crate::data::{LoopMode, TrackEvent, TrackRef};
use crate::error::Result;
use crate::evaluator::{AnimationState, CurveEvaluator, KeyframeEvaluator};
use crate::events::EventDispatcher;
use crate::host::PlaybackHost;
use crate::ids::InstId;
use crate::path::resolve_property_path;
use crate::scratch::Scratch;
use crate::target::{AnimationTarget, TargetRef, TRANSFORM_MATRIX_PROPERTY};

/// Weight sentinel: write the value straight into the slot, skipping the
/// late-binding aggregator.
pub const DIRECT_WRITE: f32 = -1.0;

/// Called with the new repeat count whenever playback wraps.
pub type LoopObserver = Box<dyn FnMut(i32)>;

pub struct RuntimeInstance {
    id: InstId,
    registered: bool,
    track: TrackRef,
    target: AnimationTarget,
    config: RuntimeConfig,
    property_path: Vec<String>,
    target_property: String,

    evaluator: Box<dyn CurveEvaluator>,
    scratch: Scratch,
    controller: LoopController,
    blend: BlendEngine,
    events: EventDispatcher,
    host: Option<Rc<dyn PlaybackHost>>,
    aggregator: Option<AggregatorRef>,
    on_loop: Option<LoopObserver>,

    current_frame: f32,
    stopped: bool,
    weight: f32,
    original_values: Vec<Option<Value>>,
    current_value: Option<Value>,
    target_path: String,
    active_target: Option<TargetRef>,
    /// Frame and repeat count of the previous tick, for wrap detection.
    last_tick: Option<(f32, i32)>,
    warned_unaggregated: bool,
}

impl RuntimeInstance {
    /// Create an instance and register it with the track's live-instance list.
    pub fn new(track: &TrackRef, target: impl Into<AnimationTarget>, config: RuntimeConfig) -> Self {
        let target = target.into();
        let targets = target.len();
        let (id, property_path, target_property, events) = {
            let mut t = track.borrow_mut();
            let id = t.register_instance();
            (
                id,
                t.property_path.clone(),
                t.target_property.clone(),
                EventDispatcher::from_track(&t),
            )
        };
        Self {
            id,
            registered: true,
            track: Rc::clone(track),
            original_values: vec![None; targets],
            target,
            property_path,
            target_property,
            evaluator: Box::new(KeyframeEvaluator::new(&config)),
            scratch: Scratch::new(),
            controller: LoopController::new(config.cache_warn_threshold),
            blend: BlendEngine::new(config.matrix_blend, targets),
            events,
            host: None,
            aggregator: None,
            on_loop: None,
            current_frame: 0.0,
            stopped: false,
            weight: 1.0,
            current_value: None,
            target_path: String::new(),
            active_target: None,
            last_tick: None,
            warned_unaggregated: false,
            config,
        }
    }

    pub fn with_host(mut self, host: Rc<dyn PlaybackHost>) -> Self {
        self.host = Some(host);
        self
    }

    pub fn with_evaluator(mut self, evaluator: Box<dyn CurveEvaluator>) -> Self {
        self.evaluator = evaluator;
        self
    }

    pub fn with_aggregator(mut self, aggregator: AggregatorRef) -> Self {
        self.aggregator = Some(aggregator);
        self
    }

    pub fn set_on_loop(&mut self, observer: impl FnMut(i32) + 'static) {
        self.on_loop = Some(Box::new(observer));
    }

    /// Advance playback to `delay` milliseconds since start and apply the
    /// resulting value. Returns `Ok(false)` once playback has ended; further
    /// calls do nothing until [`reset`](Self::reset).
    pub fn animate(
        &mut self,
        delay: f32,
        from: f32,
        to: f32,
        looping: bool,
        speed_ratio: f32,
        weight: f32,
    ) -> Result<bool> {
        if self.stopped {
            return Ok(false);
        }

        let loop_mode = self.effective_loop_mode();
        let request = FrameRequest {
            delay,
            from,
            to,
            looping,
            speed_ratio,
        };
        let plan = {
            let mut track = self.track.borrow_mut();
            self.controller.compute_frame(
                &mut track,
                &request,
                loop_mode,
                self.evaluator.as_ref(),
                &mut self.scratch,
                self.host.as_deref(),
            )
        };
        let Some(plan) = plan else {
            debug!(
                "track '{}': empty property path or no keys, stopping",
                self.track.borrow().name
            );
            self.stopped = true;
            return Ok(false);
        };

        if self.wrapped(&plan) {
            trace!(
                "instance {:?} wrapped at frame {} (repeat {})",
                self.id,
                plan.frame,
                plan.repeat_count
            );
            if let Some(observer) = self.on_loop.as_mut() {
                observer(plan.repeat_count);
            }
            self.events.rearm_repeatable();
        }
        self.current_frame = plan.frame;
        self.last_tick = Some((plan.frame, plan.repeat_count));

        let state = plan.animation_state(loop_mode);
        let value = {
            let track = self.track.borrow();
            self.evaluator
                .evaluate(&track, plan.frame, &state, &mut self.scratch)
        };
        self.apply(value, weight, true, loop_mode)?;
        self.events.dispatch(plan.frame, plan.from, plan.range);

        if plan.ended {
            debug!(
                "instance {:?} ended at frame {} on track '{}'",
                self.id,
                plan.frame,
                self.track.borrow().name
            );
            self.stopped = true;
        }
        Ok(!plan.ended)
    }

    fn wrapped(&self, plan: &FramePlan) -> bool {
        let Some((frame, repeat)) = self.last_tick else {
            return false;
        };
        if plan.synced {
            (plan.range > 0.0 && plan.frame < frame) || (plan.range < 0.0 && plan.frame > frame)
        } else {
            !plan.ended && plan.repeat_count != repeat
        }
    }

    /// Jump to `frame` (clamped to the key range) and write its value
    /// directly. Repeatable events before `frame` count as fired.
    pub fn go_to_frame(&mut self, frame: f32) -> Result<()> {
        let bounds = if self.property_path.is_empty() {
            None
        } else {
            let mut track = self.track.borrow_mut();
            track.ensure_frame_zero_key();
            track.first_frame().zip(track.last_frame())
        };
        let Some((first, last)) = bounds else {
            debug!("instance {:?}: nothing to seek", self.id);
            return Ok(());
        };

        let frame = frame.clamp(first, last);
        self.events.seek(frame);
        self.current_frame = frame;

        let loop_mode = self.effective_loop_mode();
        let state = AnimationState::single_pass(loop_mode);
        let value = {
            let track = self.track.borrow();
            self.evaluator.evaluate(&track, frame, &state, &mut self.scratch)
        };
        self.apply(value, DIRECT_WRITE, false, loop_mode)
    }

    /// Apply an externally computed value, with the same blending, capture
    /// and write policy as an `animate` tick.
    pub fn set_value(&mut self, value: Value, weight: f32) -> Result<()> {
        let loop_mode = self.effective_loop_mode();
        self.apply(value, weight, true, loop_mode)
    }

    /// Write or register `value` on every target. A failing target does not
    /// stop the others; the first error is returned after the blend factor
    /// and weight have been updated.
    fn apply(&mut self, value: Value, weight: f32, allow_blend: bool, loop_mode: LoopMode) -> Result<()> {
        let (track_blending, track_speed) = {
            let track = self.track.borrow();
            (track.enable_blending, track.blending_speed)
        };
        let direct = weight == DIRECT_WRITE;
        let needs_original = !direct || loop_mode == LoopMode::RelativeFromCurrent;

        let mut advance_by = None;
        let mut last_value = None;
        let mut first_error = None;
        for index in 0..self.target.len() {
            let target = Rc::clone(&self.target.targets()[index]);
            let resolved = match resolve_property_path(&target, &self.property_path) {
                Ok(resolved) => resolved,
                Err(err) => {
                    if first_error.is_none() {
                        first_error = Some(err);
                    }
                    continue;
                }
            };
            let (container, leaf) = (resolved.container, resolved.leaf);
            self.target_path.clear();
            self.target_path.push_str(leaf);
            self.active_target = Some(Rc::clone(&container));

            let overrides = target.borrow().animation_overrides();
            let (enable_blending, blending_speed) = overrides
                .map_or((track_blending, track_speed), |o| {
                    (o.enable_blending, o.blending_speed)
                });
            let blending = allow_blend && enable_blending && self.blend.is_active();
            let capture_original = needs_original && self.original_values[index].is_none();

            if blending || capture_original {
                let live = container.borrow().get_property(leaf);
                if blending {
                    self.blend.capture(index, live.as_ref());
                }
                if capture_original {
                    self.original_values[index] = baseline(&container, leaf, live);
                }
            }

            let out = if blending {
                if advance_by.is_none() {
                    advance_by = Some(blending_speed);
                }
                self.blend.blend(index, &value)
            } else {
                value.clone()
            };

            if direct {
                let written = match (&self.original_values[index], loop_mode) {
                    (Some(original), LoopMode::RelativeFromCurrent) => {
                        out.add(original).unwrap_or_else(|| out.clone())
                    }
                    _ => out.clone(),
                };
                let stored = container.borrow_mut().set_property(leaf, written);
                if let Err(err) = stored {
                    if first_error.is_none() {
                        first_error = Some(err);
                    }
                    continue;
                }
            } else if let Some(aggregator) = &self.aggregator {
                aggregator.borrow_mut().register(Contribution {
                    instance: self.id,
                    container: Rc::clone(&container),
                    property: leaf.to_string(),
                    value: out.clone(),
                    weight,
                    original: self.original_values[index].clone(),
                });
            } else if !self.warned_unaggregated {
                self.warned_unaggregated = true;
                warn!(
                    "instance {:?}: weighted value for '{}' dropped, no late-binding aggregator",
                    self.id, self.target_property
                );
            }

            target.borrow_mut().mark_dirty(&self.target_property);
            last_value = Some(out);
        }

        if let Some(speed) = advance_by {
            self.blend.advance(speed);
        }
        self.weight = weight;
        if last_value.is_some() {
            self.current_value = last_value;
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Clear frame, caches, baselines and blend progress for a fresh pass.
    /// With `restore_original`, captured originals are written back first.
    pub fn reset(&mut self, restore_original: bool) -> Result<()> {
        if restore_original {
            for index in 0..self.target.len() {
                let Some(original) = self.original_values[index].clone() else {
                    continue;
                };
                let target = Rc::clone(&self.target.targets()[index]);
                let resolved = resolve_property_path(&target, &self.property_path)?;
                resolved
                    .container
                    .borrow_mut()
                    .set_property(resolved.leaf, original)?;
                target.borrow_mut().mark_dirty(&self.target_property);
            }
        }

        self.controller.reset();
        self.blend.reset();
        self.events.reset();
        self.scratch.clear();
        self.original_values.iter_mut().for_each(|v| *v = None);
        self.current_frame = 0.0;
        self.current_value = None;
        self.stopped = false;
        self.last_tick = None;
        Ok(())
    }

    /// Deregister from the track. Idempotent; also runs on drop.
    pub fn dispose(&mut self) {
        if !self.registered {
            return;
        }
        match self.track.try_borrow_mut() {
            Ok(mut track) => {
                track.unregister_instance(self.id);
                self.registered = false;
            }
            Err(_) => warn!(
                "instance {:?}: track is borrowed, deregistration deferred",
                self.id
            ),
        }
    }

    /// Keep playback continuous when the speed ratio is about to change.
    /// `animate` also does this on its own when it sees a new speed ratio.
    pub fn prepare_for_speed_ratio_change(&mut self, new_speed_ratio: f32) {
        let fps = self.track.borrow().fps;
        self.controller
            .prepare_for_speed_ratio_change(fps, new_speed_ratio);
    }

    /// Loop mode in effect: the first target's override, else the track's.
    pub fn effective_loop_mode(&self) -> LoopMode {
        self.target
            .targets()
            .first()
            .and_then(|t| t.borrow().animation_overrides())
            .and_then(|o| o.loop_mode)
            .unwrap_or_else(|| self.track.borrow().loop_mode)
    }

    #[inline]
    pub fn id(&self) -> InstId {
        self.id
    }

    #[inline]
    pub fn current_frame(&self) -> f32 {
        self.current_frame
    }

    #[inline]
    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    #[inline]
    pub fn is_disposed(&self) -> bool {
        !self.registered
    }

    /// Last applied weight; [`DIRECT_WRITE`] after a seek.
    #[inline]
    pub fn weight(&self) -> f32 {
        self.weight
    }

    /// Captured original value of the first target.
    pub fn original_value(&self) -> Option<&Value> {
        self.original_values.first().and_then(Option::as_ref)
    }

    /// Captured original value per target, in target order.
    #[inline]
    pub fn original_values(&self) -> &[Option<Value>] {
        &self.original_values
    }

    #[inline]
    pub fn current_value(&self) -> Option<&Value> {
        self.current_value.as_ref()
    }

    /// Leaf slot name of the last resolved property path.
    #[inline]
    pub fn target_path(&self) -> &str {
        &self.target_path
    }

    /// Container of the last resolved slot.
    #[inline]
    pub fn active_target(&self) -> Option<&TargetRef> {
        self.active_target.as_ref()
    }

    #[inline]
    pub fn target(&self) -> &AnimationTarget {
        &self.target
    }

    #[inline]
    pub fn track(&self) -> &TrackRef {
        &self.track
    }

    #[inline]
    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    #[inline]
    pub fn blend_factor(&self) -> f32 {
        self.blend.factor()
    }

    /// This instance's copy of the track events.
    #[inline]
    pub fn events(&self) -> &[TrackEvent] {
        self.events.events()
    }

    #[inline]
    pub fn cached_windows(&self) -> usize {
        self.controller.cached_windows()
    }

    pub fn offset_for(&self, from: f32, to: f32) -> Option<&Value> {
        self.controller.offset_for(from, to)
    }

    pub fn high_limit_for(&self, from: f32, to: f32) -> Option<&Value> {
        self.controller.high_limit_for(from, to)
    }
}

/// Baseline for a slot: a bone's rest pose for its transform matrix,
/// otherwise the live value.
fn baseline(container: &TargetRef, leaf: &str, live: Option<Value>) -> Option<Value> {
    if leaf == TRANSFORM_MATRIX_PROPERTY {
        if let Some(rest) = container.borrow().rest_pose() {
            return Some(rest);
        }
    }
    live
}

impl Drop for RuntimeInstance {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl fmt::Debug for RuntimeInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuntimeInstance")
            .field("id", &self.id)
            .field("target", &self.target)
            .field("current_frame", &self.current_frame)
            .field("stopped", &self.stopped)
            .field("weight", &self.weight)
            .field("blend_factor", &self.blend.factor())
            .finish_non_exhaustive()
    }
}
