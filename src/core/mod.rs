//! Core types: geometry, colors, the console boundary, input events and the
//! control model.

pub mod color;
pub mod console;
pub mod control;
pub mod geometry;
pub mod input_event;
pub mod keybindings;
pub mod output;
pub mod text;
