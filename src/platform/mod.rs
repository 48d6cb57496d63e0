//! Console backends and terminal input decoding.

pub mod input_decoder;
pub mod memory_console;
#[cfg(unix)]
pub mod process_console;

pub use input_decoder::InputDecoder;
pub use memory_console::MemoryConsole;
#[cfg(unix)]
pub use process_console::{encode_cells, ProcessConsole};
