//! Value: typed property values written into animation targets.
//! All numeric types use f32.

use serde::{Deserialize, Serialize};

/// Coarse kind of a [`Value`], used for quick dispatch (blend strategy,
/// additive identity, accumulation buckets).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueKind {
    Float,
    Vec2,
    Vec3,
    Quat,
    Matrix,
    Color3,
    ColorRgba,
    Size,
    Bool,
    Text,
}

impl ValueKind {
    /// Additive identity for kinds that support offset arithmetic.
    ///
    /// Quaternions use the all-zero quaternion (not the identity rotation)
    /// because offsets are added component-wise.
    pub fn additive_identity(self) -> Option<Value> {
        match self {
            ValueKind::Float => Some(Value::Float(0.0)),
            ValueKind::Vec2 => Some(Value::Vec2([0.0; 2])),
            ValueKind::Vec3 => Some(Value::Vec3([0.0; 3])),
            ValueKind::Quat => Some(Value::Quat([0.0; 4])),
            ValueKind::Color3 => Some(Value::Color3([0.0; 3])),
            ValueKind::ColorRgba => Some(Value::ColorRgba([0.0; 4])),
            ValueKind::Size => Some(Value::Size([0.0; 2])),
            ValueKind::Matrix | ValueKind::Bool | ValueKind::Text => None,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "data")]
pub enum Value {
    /// Scalar float
    Float(f32),

    /// 2D vector
    Vec2([f32; 2]),

    /// 3D vector
    Vec3([f32; 3]),

    /// Quaternion (x, y, z, w)
    Quat([f32; 4]),

    /// 4x4 matrix, column-major; translation in elements 12..15
    Matrix([f32; 16]),

    /// RGB color
    Color3([f32; 3]),

    /// RGBA color (linear by convention)
    ColorRgba([f32; 4]),

    /// Width / height
    Size([f32; 2]),

    /// Boolean (step)
    Bool(bool),

    /// Text / string; step-only
    Text(String),
}

pub const IDENTITY_MATRIX: [f32; 16] = [
    1.0, 0.0, 0.0, 0.0, //
    0.0, 1.0, 0.0, 0.0, //
    0.0, 0.0, 1.0, 0.0, //
    0.0, 0.0, 0.0, 1.0,
];

#[inline]
fn zip_map<const N: usize>(a: &[f32; N], b: &[f32; N], f: impl Fn(f32, f32) -> f32) -> [f32; N] {
    let mut out = [0.0f32; N];
    for i in 0..N {
        out[i] = f(a[i], b[i]);
    }
    out
}

#[inline]
fn map<const N: usize>(a: &[f32; N], f: impl Fn(f32) -> f32) -> [f32; N] {
    let mut out = [0.0f32; N];
    for i in 0..N {
        out[i] = f(a[i]);
    }
    out
}

impl Value {
    /// Return the coarse kind of this value.
    #[inline]
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Float(_) => ValueKind::Float,
            Value::Vec2(_) => ValueKind::Vec2,
            Value::Vec3(_) => ValueKind::Vec3,
            Value::Quat(_) => ValueKind::Quat,
            Value::Matrix(_) => ValueKind::Matrix,
            Value::Color3(_) => ValueKind::Color3,
            Value::ColorRgba(_) => ValueKind::ColorRgba,
            Value::Size(_) => ValueKind::Size,
            Value::Bool(_) => ValueKind::Bool,
            Value::Text(_) => ValueKind::Text,
        }
    }

    /// Convenience constructors
    pub fn f(v: f32) -> Self {
        Value::Float(v)
    }

    pub fn vec3(x: f32, y: f32, z: f32) -> Self {
        Value::Vec3([x, y, z])
    }

    pub fn quat(x: f32, y: f32, z: f32, w: f32) -> Self {
        Value::Quat([x, y, z, w])
    }

    pub fn identity_matrix() -> Self {
        Value::Matrix(IDENTITY_MATRIX)
    }

    pub fn as_float(&self) -> Option<f32> {
        match self {
            Value::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// Component-wise sum. `None` when the kinds differ or the kind has no
    /// additive form (matrix, bool, text).
    pub fn add(&self, other: &Value) -> Option<Value> {
        match (self, other) {
            (Value::Float(a), Value::Float(b)) => Some(Value::Float(a + b)),
            (Value::Vec2(a), Value::Vec2(b)) => Some(Value::Vec2(zip_map(a, b, |x, y| x + y))),
            (Value::Vec3(a), Value::Vec3(b)) => Some(Value::Vec3(zip_map(a, b, |x, y| x + y))),
            (Value::Quat(a), Value::Quat(b)) => Some(Value::Quat(zip_map(a, b, |x, y| x + y))),
            (Value::Color3(a), Value::Color3(b)) => {
                Some(Value::Color3(zip_map(a, b, |x, y| x + y)))
            }
            (Value::ColorRgba(a), Value::ColorRgba(b)) => {
                Some(Value::ColorRgba(zip_map(a, b, |x, y| x + y)))
            }
            (Value::Size(a), Value::Size(b)) => Some(Value::Size(zip_map(a, b, |x, y| x + y))),
            _ => None,
        }
    }

    /// Component-wise difference `self - other`.
    pub fn sub(&self, other: &Value) -> Option<Value> {
        match (self, other) {
            (Value::Float(a), Value::Float(b)) => Some(Value::Float(a - b)),
            (Value::Vec2(a), Value::Vec2(b)) => Some(Value::Vec2(zip_map(a, b, |x, y| x - y))),
            (Value::Vec3(a), Value::Vec3(b)) => Some(Value::Vec3(zip_map(a, b, |x, y| x - y))),
            (Value::Quat(a), Value::Quat(b)) => Some(Value::Quat(zip_map(a, b, |x, y| x - y))),
            (Value::Color3(a), Value::Color3(b)) => {
                Some(Value::Color3(zip_map(a, b, |x, y| x - y)))
            }
            (Value::ColorRgba(a), Value::ColorRgba(b)) => {
                Some(Value::ColorRgba(zip_map(a, b, |x, y| x - y)))
            }
            (Value::Size(a), Value::Size(b)) => Some(Value::Size(zip_map(a, b, |x, y| x - y))),
            _ => None,
        }
    }

    /// Multiply every component by `s`.
    pub fn scale(&self, s: f32) -> Option<Value> {
        match self {
            Value::Float(a) => Some(Value::Float(a * s)),
            Value::Vec2(a) => Some(Value::Vec2(map(a, |x| x * s))),
            Value::Vec3(a) => Some(Value::Vec3(map(a, |x| x * s))),
            Value::Quat(a) => Some(Value::Quat(map(a, |x| x * s))),
            Value::Color3(a) => Some(Value::Color3(map(a, |x| x * s))),
            Value::ColorRgba(a) => Some(Value::ColorRgba(map(a, |x| x * s))),
            Value::Size(a) => Some(Value::Size(map(a, |x| x * s))),
            Value::Matrix(_) | Value::Bool(_) | Value::Text(_) => None,
        }
    }

    /// Flat numeric components, or `None` for step-only kinds.
    pub fn components(&self) -> Option<&[f32]> {
        match self {
            Value::Float(v) => Some(std::slice::from_ref(v)),
            Value::Vec2(a) | Value::Size(a) => Some(a.as_slice()),
            Value::Vec3(a) | Value::Color3(a) => Some(a.as_slice()),
            Value::Quat(a) | Value::ColorRgba(a) => Some(a.as_slice()),
            Value::Matrix(m) => Some(m.as_slice()),
            Value::Bool(_) | Value::Text(_) => None,
        }
    }

    /// Rebuild a numeric value of `kind` from flat components. `None` when the
    /// length does not match or the kind is step-only.
    pub fn from_components(kind: ValueKind, c: &[f32]) -> Option<Value> {
        Some(match kind {
            ValueKind::Float => Value::Float(*c.first().filter(|_| c.len() == 1)?),
            ValueKind::Vec2 => Value::Vec2(c.try_into().ok()?),
            ValueKind::Vec3 => Value::Vec3(c.try_into().ok()?),
            ValueKind::Quat => Value::Quat(c.try_into().ok()?),
            ValueKind::Matrix => Value::Matrix(c.try_into().ok()?),
            ValueKind::Color3 => Value::Color3(c.try_into().ok()?),
            ValueKind::ColorRgba => Value::ColorRgba(c.try_into().ok()?),
            ValueKind::Size => Value::Size(c.try_into().ok()?),
            ValueKind::Bool | ValueKind::Text => return None,
        })
    }
}
