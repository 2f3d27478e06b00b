//! Tesserae Core
//!
//! This crate contains the foundation types shared by the Tesserae tile
//! batching toolkit: logging setup, math re-exports, and geometry primitives.

pub mod geometry;
pub mod logging;
pub mod math;
