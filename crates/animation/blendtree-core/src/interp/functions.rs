//! Interpolation helpers:
//! - lerp for scalars and vectors
//! - quaternion SLERP with shortest-arc correction (NLERP when nearly parallel)
//! - step semantics for booleans, integers and text

use crate::value::Value;

/// Above this |dot| the arc is too short for a stable SLERP.
const SLERP_DOT_THRESHOLD: f32 = 0.9995;

/// Linear interpolation of scalars.
#[inline]
pub fn lerp_f32(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

#[inline]
pub fn lerp_vec3(a: [f32; 3], b: [f32; 3], t: f32) -> [f32; 3] {
    [
        lerp_f32(a[0], b[0], t),
        lerp_f32(a[1], b[1], t),
        lerp_f32(a[2], b[2], t),
    ]
}

#[inline]
fn dot4(a: [f32; 4], b: [f32; 4]) -> f32 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2] + a[3] * b[3]
}

#[inline]
fn normalize4(mut q: [f32; 4]) -> [f32; 4] {
    let len2 = dot4(q, q);
    if len2 > 0.0 {
        let inv_len = len2.sqrt().recip();
        q[0] *= inv_len;
        q[1] *= inv_len;
        q[2] *= inv_len;
        q[3] *= inv_len;
    }
    q
}

#[inline]
fn blend4(a: [f32; 4], wa: f32, b: [f32; 4], wb: f32) -> [f32; 4] {
    [
        a[0] * wa + b[0] * wb,
        a[1] * wa + b[1] * wb,
        a[2] * wa + b[2] * wb,
        a[3] * wa + b[3] * wb,
    ]
}

/// Quaternion NLERP: component lerp then normalize. Assumes `b` is already
/// on the same hemisphere as `a`.
#[inline]
fn nlerp_quat(a: [f32; 4], b: [f32; 4], t: f32) -> [f32; 4] {
    normalize4(blend4(a, 1.0 - t, b, t))
}

/// Quaternion SLERP (x, y, z, w). If dot < 0, negate the second quaternion
/// to take the shortest path. Returns a normalized quaternion.
pub fn slerp_quat(a: [f32; 4], mut b: [f32; 4], t: f32) -> [f32; 4] {
    let mut d = dot4(a, b);
    if d < 0.0 {
        b = [-b[0], -b[1], -b[2], -b[3]];
        d = -d;
    }
    if d > SLERP_DOT_THRESHOLD {
        return nlerp_quat(a, b, t);
    }
    let theta0 = d.min(1.0).acos();
    let sin0 = theta0.sin();
    let wa = ((1.0 - t) * theta0).sin() / sin0;
    let wb = (t * theta0).sin() / sin0;
    normalize4(blend4(a, wa, b, wb))
}

/// Step interpolation: choose left value.
#[inline]
pub fn step_value(a: &Value) -> Value {
    a.clone()
}

/// Boolean step: switches to the right value past the midpoint.
#[inline]
pub fn step_bool(a: bool, b: bool, t: f32) -> bool {
    if t > 0.5 {
        b
    } else {
        a
    }
}

/// Interpolate between two keyframe values of the same kind.
pub fn interpolate_value(a: &Value, b: &Value, t: f32) -> Value {
    match (a, b) {
        (Value::Float(va), Value::Float(vb)) => Value::Float(lerp_f32(*va, *vb, t)),
        (Value::Vec3(va), Value::Vec3(vb)) => Value::Vec3(lerp_vec3(*va, *vb, t)),
        (Value::Quat(qa), Value::Quat(qb)) => Value::Quat(slerp_quat(*qa, *qb, t)),
        (Value::Bool(ba), Value::Bool(bb)) => Value::Bool(step_bool(*ba, *bb, t)),
        // Int, text and mismatched kinds hold the left value.
        _ => step_value(a),
    }
}
