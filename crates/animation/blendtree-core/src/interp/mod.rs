//! Keyframe interpolation by value kind.

pub mod functions;

pub use functions::{interpolate_value, lerp_f32, lerp_vec3, slerp_quat, step_bool};
