//! Shared test utilities for the fews-jdbc workspace.
//!
//! This crate provides common testing infrastructure including:
//! - An in-memory FEWS dataset with a small filter tree and two stations
//! - Value series generators
//! - Temporary file helpers for configuration tests
//!
//! # Usage
//!
//! Add to your crate's `Cargo.toml`:
//!
//! ```toml
//! [dev-dependencies]
//! test-utils = { path = "../test-utils" }
//! ```
//!
//! Then import in your tests:
//!
//! ```ignore
//! use test_utils::{fixtures, memory_source};
//! ```

pub mod fixtures;
pub mod generators;
pub mod paths;

// Re-export commonly used items at the crate root
pub use fixtures::*;
pub use generators::*;
pub use paths::*;

/// Macro for approximate floating-point equality assertions.
///
/// # Usage
///
/// ```ignore
/// use test_utils::assert_approx_eq;
///
/// assert_approx_eq!(52.0001, 52.0, 0.001); // passes
/// assert_approx_eq!(4.9, 5.0, 0.001);      // fails
/// ```
#[macro_export]
macro_rules! assert_approx_eq {
    ($left:expr, $right:expr, $epsilon:expr) => {{
        let left: f64 = $left as f64;
        let right: f64 = $right as f64;
        let epsilon: f64 = $epsilon as f64;
        let diff = (left - right).abs();
        if diff > epsilon {
            panic!(
                "assertion failed: `(left ≈ right)`\n  left: `{:?}`,\n right: `{:?}`,\n  diff: `{:?}` > epsilon `{:?}`",
                left, right, diff, epsilon
            );
        }
    }};
}

/// Approximate equality of a bounding box given as `[min_x, min_y, max_x, max_y]`.
///
/// ```ignore
/// use test_utils::assert_extent_approx_eq;
///
/// assert_extent_approx_eq!(extent.to_array(), [4.9, 51.9, 5.6, 52.6], 1e-9);
/// ```
#[macro_export]
macro_rules! assert_extent_approx_eq {
    ($left:expr, $right:expr, $epsilon:expr) => {{
        let left: [f64; 4] = $left;
        let right: [f64; 4] = $right;
        for i in 0..4 {
            $crate::assert_approx_eq!(left[i], right[i], $epsilon);
        }
    }};
}
