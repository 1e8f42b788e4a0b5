//! Curve evaluation: turn (frame, repeat count, loop state) into a typed value.
//!
//! [`CurveEvaluator`] is the seam a host plugs its own curve math into.
//! [`KeyframeEvaluator`] is the default: linear interpolation between the
//! surrounding keys, shortest-arc slerp for quaternions, and the matrix
//! strategy selected in [`RuntimeConfig`].

use vizij_api_core::blend::{lerp_value, matrix_lerp, slerp};
use vizij_api_core::Value;

use crate::config::{MatrixBlendMode, RuntimeConfig};
use crate::data::{LoopMode, Track};
use crate::scratch::Scratch;

/// Loop-relative inputs handed to the evaluator alongside the frame.
#[derive(Clone, Debug, PartialEq)]
pub struct AnimationState {
    pub repeat_count: i32,
    pub loop_mode: LoopMode,
    /// Per-pass offset for relative looping.
    pub offset_value: Option<Value>,
    /// Value at the end of the window (or at the last key once ended).
    pub high_limit_value: Option<Value>,
}

impl AnimationState {
    /// State for sampling a single pass: no repeat, no offset.
    pub fn single_pass(loop_mode: LoopMode) -> Self {
        Self {
            repeat_count: 0,
            loop_mode,
            offset_value: None,
            high_limit_value: None,
        }
    }
}

pub trait CurveEvaluator {
    fn evaluate(&self, track: &Track, frame: f32, state: &AnimationState, scratch: &mut Scratch)
        -> Value;
}

#[derive(Clone, Copy, Debug)]
pub struct KeyframeEvaluator {
    matrix_blend: MatrixBlendMode,
    matrix_interpolation: bool,
}

impl KeyframeEvaluator {
    pub fn new(config: &RuntimeConfig) -> Self {
        Self {
            matrix_blend: config.matrix_blend,
            matrix_interpolation: config.matrix_interpolation,
        }
    }

    fn interpolate(&self, a: &Value, b: &Value, t: f32, scratch: &mut Scratch) -> Value {
        match (a, b) {
            (Value::Quat(x), Value::Quat(y)) => Value::Quat(slerp(*x, *y, t)),
            (Value::Matrix(x), Value::Matrix(y)) => {
                if !self.matrix_interpolation {
                    return a.clone();
                }
                match self.matrix_blend {
                    MatrixBlendMode::RawLerp => Value::Matrix(matrix_lerp(x, y, t)),
                    MatrixBlendMode::DecomposeLerp => {
                        Value::Matrix(scratch.matrix_decompose_lerp(x, y, t))
                    }
                }
            }
            // Step kinds and mismatched keys hold the left key.
            _ => lerp_value(a, b, t).unwrap_or_else(|| a.clone()),
        }
    }
}

impl CurveEvaluator for KeyframeEvaluator {
    fn evaluate(
        &self,
        track: &Track,
        frame: f32,
        state: &AnimationState,
        scratch: &mut Scratch,
    ) -> Value {
        if state.loop_mode == LoopMode::Constant && state.repeat_count > 0 {
            if let Some(high) = &state.high_limit_value {
                return high.clone();
            }
        }

        let keys = track.keys();
        let (Some(first), Some(last)) = (keys.first(), keys.last()) else {
            let kind = track.data_type.value_kind();
            return kind.additive_identity().unwrap_or_else(Value::identity_matrix);
        };

        let idx = keys.partition_point(|k| k.frame <= frame);
        let base = if idx == 0 {
            first.value.clone()
        } else if idx >= keys.len() {
            last.value.clone()
        } else {
            let (left, right) = (&keys[idx - 1], &keys[idx]);
            let span = right.frame - left.frame;
            let t = if span > 0.0 {
                (frame - left.frame) / span
            } else {
                0.0
            };
            self.interpolate(&left.value, &right.value, t, scratch)
        };

        match state.loop_mode {
            LoopMode::Relative | LoopMode::RelativeFromCurrent if state.repeat_count != 0 => state
                .offset_value
                .as_ref()
                .and_then(|offset| offset.scale(state.repeat_count as f32))
                .and_then(|shift| base.add(&shift))
                .unwrap_or(base),
            _ => base,
        }
    }
}
