//! Rendering
//!
//! The renderer only ever sees a `RenderSnapshot`. Painting uses Canvas 2D on
//! the web; native builds stop at the snapshot.

pub mod snapshot;

#[cfg(target_arch = "wasm32")]
pub mod canvas;

pub use snapshot::{RenderSnapshot, Rgba, Sprite, color_for, to_css};

#[cfg(target_arch = "wasm32")]
pub use canvas::CanvasPainter;
