//! Math types for tile transforms, built on the SIMD-accelerated [`glam`]
//! crate.
//!
//! # Common Types
//!
//! - [`Vec2`]: destination positions and animation offsets
//! - [`Affine2`]: a layer's 2D world transform (the `a b c d tx ty` affine)
//! - [`Mat3`]: projection matrices and composed projection x world transforms
//!
//! # Examples
//!
//! ```
//! use tesserae_core::math::{Affine2, Mat3, Vec2};
//!
//! let world = Affine2::from_scale_angle_translation(Vec2::splat(2.0), 0.0, Vec2::new(64.0, 0.0));
//! let projection = Mat3::IDENTITY;
//! let composed = projection * Mat3::from(world);
//! assert_eq!(composed.x_axis.x, 2.0);
//! ```
//!
//! [`glam`]: https://docs.rs/glam

pub use glam::*;
