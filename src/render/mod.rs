//! Rendering: the paint surface controls draw into.

pub mod surface;

pub use surface::GraphicsSurface;
