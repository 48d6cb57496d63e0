//! Text layout for scrollable text views.

pub mod layout;

pub use layout::{TextLayout, WrapMode};
