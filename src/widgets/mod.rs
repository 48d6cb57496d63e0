//! Built-in controls.

pub mod button;
pub mod panel;
pub mod text_block;

pub use button::Button;
pub use panel::Panel;
pub use text_block::TextBlock;
