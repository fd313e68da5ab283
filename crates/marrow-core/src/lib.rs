//! Marrow Core - Core types and utilities for the Marrow engine
//!
//! This crate provides the foundational pieces shared by every other crate:
//! - Mathematical primitives (re-exported from glam)
//! - Euler-degree rotation helpers used by transform components
//! - The frame clock that hands each system its delta time

pub mod math;
pub mod time;

pub use glam::{EulerRot, Mat4, Quat, Vec3, Vec4};
pub use math::{euler_degrees_to_quat, quat_to_euler_degrees, WEIGHT_EPSILON};
pub use time::{GameTime, TimeConfig};
