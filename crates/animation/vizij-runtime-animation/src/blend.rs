//! Cross-fade from a captured baseline to the freshly computed value.

use log::debug;
use vizij_api_core::blend::{lerp_value, matrix_decompose_lerp, matrix_lerp, slerp};
use vizij_api_core::{Value, ValueKind};

use crate::config::MatrixBlendMode;

/// Accumulated speed steps that land within rounding of 1.0 count as 1.0.
const FACTOR_SNAP: f32 = 1e-5;

/// Blend strategy, resolved once per value kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlendStrategy {
    Matrix(MatrixBlendMode),
    Lerp,
    Slerp,
    Scalar,
    /// No blend for this kind: the computed value passes through.
    Unsupported,
}

impl BlendStrategy {
    pub fn for_kind(kind: ValueKind, matrix_blend: MatrixBlendMode) -> Self {
        match kind {
            ValueKind::Matrix => BlendStrategy::Matrix(matrix_blend),
            ValueKind::Vec2
            | ValueKind::Vec3
            | ValueKind::Color3
            | ValueKind::ColorRgba
            | ValueKind::Size => BlendStrategy::Lerp,
            ValueKind::Quat => BlendStrategy::Slerp,
            ValueKind::Float => BlendStrategy::Scalar,
            ValueKind::Bool | ValueKind::Text => BlendStrategy::Unsupported,
        }
    }

    /// Blend `from` toward `to` by `t`. Mismatched kinds pass `to` through.
    pub fn blend(self, from: &Value, to: &Value, t: f32) -> Value {
        let blended = match (self, from, to) {
            (BlendStrategy::Matrix(mode), Value::Matrix(a), Value::Matrix(b)) => {
                Some(Value::Matrix(match mode {
                    MatrixBlendMode::DecomposeLerp => matrix_decompose_lerp(a, b, t),
                    MatrixBlendMode::RawLerp => matrix_lerp(a, b, t),
                }))
            }
            (BlendStrategy::Slerp, Value::Quat(a), Value::Quat(b)) => {
                Some(Value::Quat(slerp(*a, *b, t)))
            }
            (BlendStrategy::Lerp | BlendStrategy::Scalar, _, _) => lerp_value(from, to, t),
            _ => None,
        };
        blended.unwrap_or_else(|| to.clone())
    }
}

/// Blend factor plus one baseline per target, captured at the first blended
/// tick. The factor is shared; each target fades from its own baseline.
#[derive(Debug, Clone, Default)]
pub struct BlendEngine {
    factor: f32,
    originals: Vec<Option<Value>>,
    matrix_blend: MatrixBlendMode,
    reported_unsupported: bool,
}

impl BlendEngine {
    pub fn new(matrix_blend: MatrixBlendMode, targets: usize) -> Self {
        Self {
            matrix_blend,
            originals: vec![None; targets],
            ..Self::default()
        }
    }

    /// Blending runs while the factor has not passed 1.0.
    #[inline]
    pub fn is_active(&self) -> bool {
        self.factor <= 1.0
    }

    #[inline]
    pub fn factor(&self) -> f32 {
        self.factor
    }

    #[inline]
    pub fn original(&self, target: usize) -> Option<&Value> {
        self.originals.get(target).and_then(Option::as_ref)
    }

    /// Capture the baseline of `target` once; later calls keep the first capture.
    pub fn capture(&mut self, target: usize, current: Option<&Value>) {
        if target >= self.originals.len() {
            self.originals.resize(target + 1, None);
        }
        let slot = &mut self.originals[target];
        if slot.is_none() {
            *slot = current.cloned();
        }
    }

    /// Cross-fade from `target`'s baseline toward `computed` at the current
    /// factor. Without a baseline the computed value passes through.
    pub fn blend(&mut self, target: usize, computed: &Value) -> Value {
        let Some(original) = self.originals.get(target).and_then(Option::as_ref) else {
            return computed.clone();
        };
        let strategy = BlendStrategy::for_kind(computed.kind(), self.matrix_blend);
        if strategy == BlendStrategy::Unsupported && !self.reported_unsupported {
            self.reported_unsupported = true;
            debug!(
                "no blend strategy for {:?} values; passing through",
                computed.kind()
            );
        }
        let t = if self.factor >= 1.0 - FACTOR_SNAP {
            1.0
        } else {
            self.factor
        };
        strategy.blend(original, computed, t)
    }

    #[inline]
    pub fn advance(&mut self, speed: f32) {
        self.factor += speed;
    }

    pub fn reset(&mut self) {
        self.factor = 0.0;
        self.originals.iter_mut().for_each(|o| *o = None);
        self.reported_unsupported = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn strategy_per_kind() {
        let m = MatrixBlendMode::RawLerp;
        assert_eq!(
            BlendStrategy::for_kind(ValueKind::Matrix, m),
            BlendStrategy::Matrix(MatrixBlendMode::RawLerp)
        );
        assert_eq!(BlendStrategy::for_kind(ValueKind::Quat, m), BlendStrategy::Slerp);
        assert_eq!(BlendStrategy::for_kind(ValueKind::Size, m), BlendStrategy::Lerp);
        assert_eq!(BlendStrategy::for_kind(ValueKind::Float, m), BlendStrategy::Scalar);
        assert_eq!(
            BlendStrategy::for_kind(ValueKind::Text, m),
            BlendStrategy::Unsupported
        );
    }

    #[test]
    fn unsupported_and_mismatched_pass_through() {
        let text = BlendStrategy::Unsupported.blend(
            &Value::Text("a".into()),
            &Value::Text("b".into()),
            0.1,
        );
        assert_eq!(text, Value::Text("b".into()));
        let mismatch = BlendStrategy::Lerp.blend(&Value::Float(0.0), &Value::Vec2([1.0, 1.0]), 0.5);
        assert_eq!(mismatch, Value::Vec2([1.0, 1.0]));
    }

    #[test]
    fn factor_reaches_computed_value_exactly() {
        let mut engine = BlendEngine::new(MatrixBlendMode::DecomposeLerp, 1);
        engine.capture(0, Some(&Value::Float(10.0)));
        engine.capture(0, Some(&Value::Float(99.0)));
        assert_eq!(engine.original(0), Some(&Value::Float(10.0)));

        let target = Value::Float(20.0);
        let mut outputs = Vec::new();
        while engine.is_active() {
            outputs.push(engine.blend(0, &target));
            engine.advance(0.25);
        }
        assert_eq!(outputs.len(), 5);
        assert_eq!(outputs.first(), Some(&Value::Float(10.0)));
        assert_eq!(outputs.last(), Some(&target));
        assert_relative_eq!(outputs[2].as_float().unwrap(), 15.0, epsilon = 1e-5);
    }

    #[test]
    fn reset_clears_factor_and_baseline() {
        let mut engine = BlendEngine::new(MatrixBlendMode::DecomposeLerp, 1);
        engine.capture(0, Some(&Value::Float(1.0)));
        engine.advance(0.5);
        engine.reset();
        assert_eq!(engine.factor(), 0.0);
        assert!(engine.original(0).is_none());
        assert_eq!(engine.blend(0, &Value::Float(3.0)), Value::Float(3.0));
    }

    #[test]
    fn each_target_fades_from_its_own_baseline() {
        let mut engine = BlendEngine::new(MatrixBlendMode::DecomposeLerp, 2);
        engine.capture(0, Some(&Value::Float(0.0)));
        engine.capture(1, Some(&Value::Float(200.0)));
        engine.advance(0.5);

        let computed = Value::Float(100.0);
        assert_eq!(engine.blend(0, &computed), Value::Float(50.0));
        assert_eq!(engine.blend(1, &computed), Value::Float(150.0));
        assert_eq!(engine.blend(2, &computed), computed);
    }
}
