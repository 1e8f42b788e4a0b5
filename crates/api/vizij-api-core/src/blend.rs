//! Blending utilities for Value types.
//! - f32 linear interpolation for floats and vector/color/size components
//! - quaternion slerp (shortest-arc)
//! - matrix blending, either raw component lerp or decompose → TRS lerp → compose
//!
//! Interpolants are exact at the endpoints: `t <= 0` yields `a`, `t >= 1` yields `b`.

use crate::Value;

/// Linear interpolation for f32, exact at t == 0 and t == 1.
#[inline]
pub fn lerp_f(a: f32, b: f32, t: f32) -> f32 {
    a * (1.0 - t) + b * t
}

/// Lerp for fixed-size arrays
pub fn lerp_array<const N: usize>(a: &[f32; N], b: &[f32; N], t: f32) -> [f32; N] {
    let mut out = [0.0f32; N];
    for i in 0..N {
        out[i] = lerp_f(a[i], b[i], t);
    }
    out
}

#[inline]
fn dot4(a: [f32; 4], b: [f32; 4]) -> f32 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2] + a[3] * b[3]
}

/// Normalize a quaternion represented as [x,y,z,w]
pub fn normalize_quat(q: [f32; 4]) -> [f32; 4] {
    let mag = dot4(q, q).sqrt();
    if mag == 0.0 {
        [0.0, 0.0, 0.0, 1.0]
    } else {
        [q[0] / mag, q[1] / mag, q[2] / mag, q[3] / mag]
    }
}

/// Slerp between two unit quaternions q1, q2
pub fn slerp(q1: [f32; 4], q2: [f32; 4], t: f32) -> [f32; 4] {
    if t <= 0.0 {
        return q1;
    }
    if t >= 1.0 {
        return q2;
    }
    let qa = normalize_quat(q1);
    let mut qb = normalize_quat(q2);

    let mut dot = dot4(qa, qb);

    // If the dot product is negative, slerp won't take the short path.
    if dot < 0.0 {
        qb = [-qb[0], -qb[1], -qb[2], -qb[3]];
        dot = -dot;
    }

    // Nearly parallel: lerp is accurate enough and avoids dividing by ~0.
    const DOT_THRESHOLD: f32 = 0.9995;
    if dot > DOT_THRESHOLD {
        return normalize_quat(lerp_array(&qa, &qb, t));
    }

    let theta_0 = dot.clamp(-1.0, 1.0).acos();
    let theta = theta_0 * t;
    let sin_theta_0 = theta_0.sin();

    let s0 = (theta_0 - theta).sin() / sin_theta_0;
    let s1 = theta.sin() / sin_theta_0;

    [
        s0 * qa[0] + s1 * qb[0],
        s0 * qa[1] + s1 * qb[1],
        s0 * qa[2] + s1 * qb[2],
        s0 * qa[3] + s1 * qb[3],
    ]
}

/// Translation / rotation (x,y,z,w) / scale split of an affine matrix.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Trs {
    pub translation: [f32; 3],
    pub rotation: [f32; 4],
    pub scale: [f32; 3],
}

#[inline]
fn column(m: &[f32; 16], c: usize) -> [f32; 3] {
    [m[c * 4], m[c * 4 + 1], m[c * 4 + 2]]
}

#[inline]
fn length3(v: [f32; 3]) -> f32 {
    (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt()
}

#[inline]
fn cross3(a: [f32; 3], b: [f32; 3]) -> [f32; 3] {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

/// Quaternion from a pure rotation matrix given as rows `r[row][col]`.
fn quat_from_rotation(r: [[f32; 3]; 3]) -> [f32; 4] {
    let trace = r[0][0] + r[1][1] + r[2][2];
    let q = if trace > 0.0 {
        let s = 0.5 / (trace + 1.0).sqrt();
        [
            (r[2][1] - r[1][2]) * s,
            (r[0][2] - r[2][0]) * s,
            (r[1][0] - r[0][1]) * s,
            0.25 / s,
        ]
    } else if r[0][0] > r[1][1] && r[0][0] > r[2][2] {
        let s = 2.0 * (1.0 + r[0][0] - r[1][1] - r[2][2]).sqrt();
        [
            0.25 * s,
            (r[0][1] + r[1][0]) / s,
            (r[0][2] + r[2][0]) / s,
            (r[2][1] - r[1][2]) / s,
        ]
    } else if r[1][1] > r[2][2] {
        let s = 2.0 * (1.0 + r[1][1] - r[0][0] - r[2][2]).sqrt();
        [
            (r[0][1] + r[1][0]) / s,
            0.25 * s,
            (r[1][2] + r[2][1]) / s,
            (r[0][2] - r[2][0]) / s,
        ]
    } else {
        let s = 2.0 * (1.0 + r[2][2] - r[0][0] - r[1][1]).sqrt();
        [
            (r[0][2] + r[2][0]) / s,
            (r[1][2] + r[2][1]) / s,
            0.25 * s,
            (r[1][0] - r[0][1]) / s,
        ]
    };
    normalize_quat(q)
}

/// Split a column-major affine matrix into TRS. Negative determinants are
/// folded into the x scale. Degenerate (zero-scale) axes yield an identity rotation.
pub fn decompose(m: &[f32; 16]) -> Trs {
    let translation = [m[12], m[13], m[14]];
    let (c0, c1, c2) = (column(m, 0), column(m, 1), column(m, 2));
    let mut scale = [length3(c0), length3(c1), length3(c2)];

    let n = cross3(c1, c2);
    let det = c0[0] * n[0] + c0[1] * n[1] + c0[2] * n[2];
    if det < 0.0 {
        scale[0] = -scale[0];
    }

    if scale.iter().any(|s| s.abs() <= f32::EPSILON) {
        return Trs {
            translation,
            rotation: [0.0, 0.0, 0.0, 1.0],
            scale,
        };
    }

    let cols = [c0, c1, c2];
    let mut r = [[0.0f32; 3]; 3];
    for (col, c) in cols.iter().enumerate() {
        for row in 0..3 {
            r[row][col] = c[row] / scale[col];
        }
    }

    Trs {
        translation,
        rotation: quat_from_rotation(r),
        scale,
    }
}

/// Build a column-major matrix from TRS (M = T * R * S).
pub fn compose(trs: &Trs) -> [f32; 16] {
    let [x, y, z, w] = normalize_quat(trs.rotation);
    let r = [
        [
            1.0 - 2.0 * (y * y + z * z),
            2.0 * (x * y - z * w),
            2.0 * (x * z + y * w),
        ],
        [
            2.0 * (x * y + z * w),
            1.0 - 2.0 * (x * x + z * z),
            2.0 * (y * z - x * w),
        ],
        [
            2.0 * (x * z - y * w),
            2.0 * (y * z + x * w),
            1.0 - 2.0 * (x * x + y * y),
        ],
    ];
    let mut m = [0.0f32; 16];
    for col in 0..3 {
        for row in 0..3 {
            m[col * 4 + row] = r[row][col] * trs.scale[col];
        }
    }
    m[12] = trs.translation[0];
    m[13] = trs.translation[1];
    m[14] = trs.translation[2];
    m[15] = 1.0;
    m
}

/// Raw component-wise matrix lerp.
pub fn matrix_lerp(a: &[f32; 16], b: &[f32; 16], t: f32) -> [f32; 16] {
    lerp_array(a, b, t)
}

/// Decompose both matrices, lerp translation/scale, slerp rotation, recompose.
pub fn matrix_decompose_lerp(a: &[f32; 16], b: &[f32; 16], t: f32) -> [f32; 16] {
    if t <= 0.0 {
        return *a;
    }
    if t >= 1.0 {
        return *b;
    }
    let da = decompose(a);
    let db = decompose(b);
    compose(&Trs {
        translation: lerp_array(&da.translation, &db.translation, t),
        rotation: slerp(da.rotation, db.rotation, t),
        scale: lerp_array(&da.scale, &db.scale, t),
    })
}

/// Component-wise lerp for every kind that supports it (floats, vectors,
/// colors, sizes). Quaternions, matrices and step kinds return `None`; callers
/// pick slerp / matrix blending / pass-through for those.
pub fn lerp_value(a: &Value, b: &Value, t: f32) -> Option<Value> {
    match (a, b) {
        (Value::Float(x), Value::Float(y)) => Some(Value::Float(lerp_f(*x, *y, t))),
        (Value::Vec2(x), Value::Vec2(y)) => Some(Value::Vec2(lerp_array(x, y, t))),
        (Value::Vec3(x), Value::Vec3(y)) => Some(Value::Vec3(lerp_array(x, y, t))),
        (Value::Color3(x), Value::Color3(y)) => Some(Value::Color3(lerp_array(x, y, t))),
        (Value::ColorRgba(x), Value::ColorRgba(y)) => Some(Value::ColorRgba(lerp_array(x, y, t))),
        (Value::Size(x), Value::Size(y)) => Some(Value::Size(lerp_array(x, y, t))),
        _ => None,
    }
}
