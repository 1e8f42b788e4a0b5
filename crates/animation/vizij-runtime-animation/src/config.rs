//! Runtime configuration for vizij-runtime-animation.
//!
//! Passed explicitly into every [`RuntimeInstance`](crate::RuntimeInstance); nothing
//! in this crate reads global flags.

use serde::{Deserialize, Serialize};

/// How matrix-valued properties are cross-faded (blend engine and late-binding
/// accumulator).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatrixBlendMode {
    /// Decompose into translation/rotation/scale, lerp T and S, slerp R, recompose.
    #[default]
    DecomposeLerp,
    /// Component-wise lerp of the 16 raw elements.
    RawLerp,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub matrix_blend: MatrixBlendMode,

    /// When false the reference evaluator holds the left key for matrix
    /// tracks instead of interpolating between keys.
    pub matrix_interpolation: bool,

    /// Distinct `(from, to)` windows cached per instance before a warning is
    /// logged. Caches are only cleared by `reset()`.
    pub cache_warn_threshold: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            matrix_blend: MatrixBlendMode::DecomposeLerp,
            matrix_interpolation: true,
            cache_warn_threshold: 64,
        }
    }
}
