//! Loop/ratio controller: elapsed time and speed to frame position, repeat
//! count and loop-relative offset, with per-window memoization.

use hashbrown::HashMap;
use log::{trace, warn};
use vizij_api_core::Value;

use crate::data::{LoopMode, Track};
use crate::evaluator::{AnimationState, CurveEvaluator};
use crate::host::PlaybackHost;
use crate::scratch::Scratch;

/// Cache key for a `(from, to)` window. `+ 0.0` folds -0.0 into 0.0.
type WindowKey = (u32, u32);

#[inline]
fn window_key(from: f32, to: f32) -> WindowKey {
    ((from + 0.0).to_bits(), (to + 0.0).to_bits())
}

/// Euclidean-style modulo that never returns a value with the opposite sign of `b`.
#[inline]
fn fmod(a: f32, b: f32) -> f32 {
    if b == 0.0 {
        return 0.0;
    }
    let m = a % b;
    if (m < 0.0 && b > 0.0) || (m > 0.0 && b < 0.0) {
        m + b
    } else {
        m
    }
}

/// Reflect t into [0, span] with ping-pong behavior (period = 2 * span).
#[inline]
fn ping_pong(t: f32, span: f32) -> f32 {
    if span <= 0.0 {
        return 0.0;
    }
    let m = fmod(t, 2.0 * span);
    if m <= span {
        m
    } else {
        2.0 * span - m
    }
}

/// One tick's playback request.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrameRequest {
    /// Elapsed time since playback start, in milliseconds.
    pub delay: f32,
    pub from: f32,
    pub to: f32,
    pub looping: bool,
    pub speed_ratio: f32,
}

/// Result of [`LoopController::compute_frame`]: the evaluator inputs plus the
/// resolved window.
#[derive(Clone, Debug, PartialEq)]
pub struct FramePlan {
    /// Window after clamping and the zero-length nudge.
    pub from: f32,
    pub to: f32,
    pub range: f32,
    pub ratio: f32,
    pub frame: f32,
    pub repeat_count: i32,
    pub offset_value: Option<Value>,
    pub high_limit_value: Option<Value>,
    pub ended: bool,
    /// The frame was overridden by the host's sync root.
    pub synced: bool,
}

impl FramePlan {
    pub fn animation_state(&self, loop_mode: LoopMode) -> AnimationState {
        AnimationState {
            repeat_count: self.repeat_count,
            loop_mode,
            offset_value: self.offset_value.clone(),
            high_limit_value: self.high_limit_value.clone(),
        }
    }
}

#[derive(Debug, Default)]
pub struct LoopController {
    offsets: HashMap<WindowKey, Value>,
    high_limits: HashMap<WindowKey, Value>,
    ratio_offset: f32,
    previous_delay: f32,
    previous_ratio: f32,
    previous_speed: Option<f32>,
    warn_threshold: usize,
    warned: bool,
}

impl LoopController {
    pub fn new(warn_threshold: usize) -> Self {
        Self {
            warn_threshold,
            ..Self::default()
        }
    }

    /// Resolve the frame for one tick. `None` when there is nothing to animate
    /// (empty property path or no keys).
    ///
    /// May insert a frame-0 key into `track` when its first key starts later.
    pub fn compute_frame(
        &mut self,
        track: &mut Track,
        req: &FrameRequest,
        loop_mode: LoopMode,
        evaluator: &dyn CurveEvaluator,
        scratch: &mut Scratch,
        host: Option<&dyn PlaybackHost>,
    ) -> Option<FramePlan> {
        if track.property_path.is_empty() {
            return None;
        }
        track.ensure_frame_zero_key();
        let (min_frame, max_frame) = (track.first_frame()?, track.last_frame()?);

        let mut from = req.from.clamp(min_frame, max_frame);
        let mut to = req.to.clamp(min_frame, max_frame);
        if from == to {
            if from > min_frame {
                from = (from - 1.0).max(min_frame);
            } else if to < max_frame {
                to = (to + 1.0).min(max_frame);
            }
        }
        let range = to - from;

        if let Some(previous) = self.previous_speed {
            if previous != req.speed_ratio {
                self.prepare_for_speed_ratio_change(track.fps, req.speed_ratio);
            }
        }
        self.previous_speed = Some(req.speed_ratio);

        let ratio = req.delay * track.fps * req.speed_ratio / 1000.0 + self.ratio_offset;
        self.previous_delay = req.delay;
        self.previous_ratio = ratio;

        let ended = !req.looping && ratio.abs() >= range.abs();
        let mut offset_value = None;
        let mut high_limit_value = None;
        if ended {
            let probe = AnimationState::single_pass(LoopMode::Cycle);
            high_limit_value = Some(evaluator.evaluate(track, max_frame, &probe, scratch));
        } else if loop_mode != LoopMode::Cycle {
            let key = window_key(from, to);
            if !self.high_limits.contains_key(&key) {
                self.cache_window(key, track, from, to, evaluator, scratch);
            }
            offset_value = self.offsets.get(&key).cloned();
            high_limit_value = self.high_limits.get(&key).cloned();
        }
        if offset_value.is_none() {
            offset_value = track.data_type.default_offset();
        }

        // The sign of `range` is the window direction; a negative ratio
        // travels it backwards, from `to` toward `from`.
        let repeat_count = if range == 0.0 {
            0
        } else {
            (ratio / range.abs()).trunc() as i32
        };
        let backwards = ratio < 0.0;
        let progress = if range == 0.0 {
            0.0
        } else if loop_mode == LoopMode::Yoyo {
            ping_pong(ratio.abs(), range.abs())
        } else {
            ratio.abs() % range.abs()
        };
        let mut frame = if range == 0.0 {
            from
        } else if ended {
            if backwards {
                from
            } else {
                to
            }
        } else if backwards {
            to - range.signum() * progress
        } else {
            from + range.signum() * progress
        };

        let sync = host.and_then(|h| h.sync_root());
        if let Some(root) = sync {
            frame = root.map_into(from, to);
        }

        Some(FramePlan {
            from,
            to,
            range,
            ratio,
            frame,
            repeat_count,
            offset_value,
            high_limit_value,
            ended,
            synced: sync.is_some(),
        })
    }

    fn cache_window(
        &mut self,
        key: WindowKey,
        track: &Track,
        from: f32,
        to: f32,
        evaluator: &dyn CurveEvaluator,
        scratch: &mut Scratch,
    ) {
        trace!("offset cache miss for window [{from}, {to}] on track '{}'", track.name);
        let probe = AnimationState::single_pass(LoopMode::Cycle);
        let from_value = evaluator.evaluate(track, from, &probe, scratch);
        let to_value = evaluator.evaluate(track, to, &probe, scratch);
        if track.data_type.supports_offset() {
            if let Some(offset) = to_value.sub(&from_value) {
                self.offsets.insert(key, offset);
            }
        }
        self.high_limits.insert(key, to_value);

        if !self.warned && self.high_limits.len() > self.warn_threshold {
            self.warned = true;
            warn!(
                "track '{}': {} distinct (from, to) windows cached; caches are only cleared by reset()",
                track.name,
                self.high_limits.len()
            );
        }
    }

    /// Keep the next frame continuous with the last rendered one when the
    /// speed ratio changes mid-playback.
    pub fn prepare_for_speed_ratio_change(&mut self, fps: f32, new_speed_ratio: f32) {
        let new_ratio = self.previous_delay * fps * new_speed_ratio / 1000.0;
        self.ratio_offset = self.previous_ratio - new_ratio;
        self.previous_speed = Some(new_speed_ratio);
    }

    pub fn reset(&mut self) {
        self.offsets.clear();
        self.high_limits.clear();
        self.ratio_offset = 0.0;
        self.previous_delay = 0.0;
        self.previous_ratio = 0.0;
        self.previous_speed = None;
        self.warned = false;
    }

    pub fn offset_for(&self, from: f32, to: f32) -> Option<&Value> {
        self.offsets.get(&window_key(from, to))
    }

    pub fn high_limit_for(&self, from: f32, to: f32) -> Option<&Value> {
        self.high_limits.get(&window_key(from, to))
    }

    /// Number of distinct windows currently memoized.
    #[inline]
    pub fn cached_windows(&self) -> usize {
        self.high_limits.len()
    }

    #[inline]
    pub fn ratio_offset(&self) -> f32 {
        self.ratio_offset
    }
}
